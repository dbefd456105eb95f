//! The adapter session handed to the swap coordinator.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::LndConfig;
use crate::dispatch::{MessageHandler, Registry};
use crate::error::{IdentityError, LndError, Result};
use crate::grpc::GrpcNode;
use crate::listener::{Listener, ListenerHandle};
use crate::metrics::LndMetrics;
use crate::node::{ChannelInfo, INVOICE_CLTV_EXPIRY, InvoiceRequest, NodeClient};
use crate::payment;
use crate::presence::PresenceTrigger;
use crate::primitives::{MessageType, NodeId, Preimage};

/// Connected adapter: the node handle, the local identity, and the handler
/// registry shared with the subscription runners.
pub struct Lnd<N = GrpcNode> {
    node: Arc<N>,
    node_id: NodeId,
    registry: Registry,
    presence: Option<Arc<dyn PresenceTrigger>>,
    cancel: CancellationToken,
    metrics: LndMetrics,
}

impl Lnd<GrpcNode> {
    /// Dials the node described by `config` and learns its identity.
    pub async fn connect(config: &LndConfig) -> Result<Self> {
        let node = GrpcNode::connect(config).await?;
        Self::with_node(node).await
    }
}

impl<N: NodeClient + 'static> Lnd<N> {
    /// Wraps an already connected node and learns its identity.
    pub async fn with_node(node: N) -> Result<Self> {
        let pubkey = node.get_identity().await.map_err(IdentityError::Rpc)?;
        let node_id: NodeId = pubkey.parse().map_err(IdentityError::InvalidPubkey)?;
        info!(%node_id, "lnd session established");

        Ok(Self {
            node: Arc::new(node),
            node_id,
            registry: Registry::new(),
            presence: None,
            cancel: CancellationToken::new(),
            metrics: LndMetrics::default(),
        })
    }

    /// Installs the trigger notified when peers come online.
    ///
    /// Only affects listeners started afterwards.
    pub fn with_presence<P: PresenceTrigger + 'static>(mut self, presence: P) -> Self {
        self.presence = Some(Arc::new(presence));
        self
    }

    /// Identity key of the local node.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    /// Token cancelled by [`Lnd::shutdown`]. Listeners and payments in
    /// progress observe it.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stops every listener and aborts payments in progress.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Appends a handler for inbound custom messages.
    pub fn register_message_handler<F>(&self, handler: F)
    where
        F: Fn(&NodeId, &str, &[u8]) -> eyre::Result<()> + Send + Sync + 'static,
    {
        self.registry.register_message_handler(handler);
    }

    pub fn register_handler<H: MessageHandler + 'static>(&self, handler: H) {
        self.registry.register_handler(handler);
    }

    /// Sets the callback invoked with the memo of every settled invoice.
    pub fn register_payment_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.registry.register_payment_callback(callback);
    }

    /// Starts the invoice, custom message and peer event subscriptions.
    ///
    /// The runners share a child of the session token: [`Lnd::shutdown`]
    /// stops them, [`ListenerHandle::shutdown`] stops only these runners.
    pub fn start_listening(&self) -> ListenerHandle {
        Listener::new(
            self.node.clone(),
            self.registry.clone(),
            self.presence.clone(),
            self.metrics.clone(),
        )
        .start(self.cancel.child_token())
    }

    /// Payment hash and amount in millisatoshi of a payment request.
    pub async fn decode_payreq(&self, pay_req: &str) -> Result<(String, u64)> {
        let decoded = self.node.decode_pay_req(pay_req).await?;
        Ok((decoded.payment_hash, decoded.amount_msat))
    }

    /// Pays `pay_req` and returns the preimage as hex.
    pub async fn pay_invoice(&self, pay_req: &str) -> Result<String> {
        payment::pay_invoice(self.node.as_ref(), pay_req).await
    }

    /// Pays `pay_req` through one channel only and returns the preimage as hex.
    pub async fn rebalance_payment(&self, pay_req: &str, short_channel_id: &str) -> Result<String> {
        let result =
            payment::rebalance_payment(self.node.as_ref(), pay_req, short_channel_id, &self.cancel)
                .await;
        match &result {
            Ok(_) => self.metrics.inc_payments_succeeded(),
            Err(LndError::PaymentFailed(_)) => self.metrics.inc_payments_failed(),
            Err(_) => {}
        }
        result
    }

    /// Finds an active channel able to send `amount_sat`.
    pub async fn check_channel(&self, short_channel_id: &str, amount_sat: u64) -> Result<ChannelInfo> {
        payment::check_channel(self.node.as_ref(), short_channel_id, amount_sat).await
    }

    /// Creates an invoice for a preimage given as hex and returns its payment
    /// request.
    pub async fn get_payreq(
        &self,
        amount_msat: u64,
        preimage: &str,
        label: &str,
        expiry: u64,
    ) -> Result<String> {
        let preimage: Preimage = preimage.parse()?;
        self.add_invoice(amount_msat, preimage, label, expiry).await
    }

    /// Creates an invoice and returns its payment request.
    pub async fn add_invoice(
        &self,
        amount_msat: u64,
        preimage: Preimage,
        label: &str,
        expiry: u64,
    ) -> Result<String> {
        let pay_req = self
            .node
            .add_invoice(InvoiceRequest {
                value_msat: amount_msat,
                memo: label.to_string(),
                preimage,
                expiry,
                cltv_expiry: INVOICE_CLTV_EXPIRY,
            })
            .await?;
        debug!(amount_msat, label, "invoice added");
        Ok(pay_req)
    }

    /// Identity keys of the connected peers. Keys that do not parse are
    /// skipped.
    pub async fn get_peers(&self) -> Result<Vec<NodeId>> {
        let peers = self.node.list_peers().await?;
        Ok(peers
            .into_iter()
            .filter_map(|pub_key| match pub_key.parse::<NodeId>() {
                Ok(peer) => Some(peer),
                Err(err) => {
                    warn!(%pub_key, %err, "skipping peer with malformed key");
                    None
                }
            })
            .collect())
    }

    /// Sends a custom message to `peer`, given as hex.
    pub async fn send_message(
        &self,
        peer: &str,
        message: Vec<u8>,
        msg_type: impl Into<MessageType>,
    ) -> Result<()> {
        let peer: NodeId = peer.parse()?;
        let msg_type = msg_type.into();
        debug!(%peer, %msg_type, payload = %hex::encode(&message), "sending custom message");
        self.node.send_custom_message(&peer, msg_type, message).await?;
        Ok(())
    }
}

impl<N> std::fmt::Debug for Lnd<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lnd")
            .field("node_id", &self.node_id)
            .field("registry", &self.registry)
            .field("presence", &self.presence.is_some())
            .finish_non_exhaustive()
    }
}
