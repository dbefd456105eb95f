//! Value types shared across the adapter.

mod message;
mod node_id;
mod preimage;
mod scid;

pub use message::{InboundMessage, MessageType};
pub use node_id::{NODE_ID_LEN, NodeId};
pub use preimage::{PREIMAGE_LEN, Preimage};
pub use scid::ShortChannelId;
