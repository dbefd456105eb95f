//! Hook into the external presence-poll service.

use crate::primitives::NodeId;

/// Notified whenever a peer comes online.
///
/// Implementations must return quickly; they run on the peer event runner.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait PresenceTrigger: Send + Sync {
    fn poll(&self, peer: &NodeId);
}
