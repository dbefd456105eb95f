//! Scripted in-memory node for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_stream::StreamExt;
use tonic_lnd::tonic::Status;

use crate::node::{
    ChannelInfo, InvoiceRequest, InvoiceUpdate, NodeClient, NodeStream, PayReqInfo, PaymentParams,
    PaymentUpdate, PeerEventUpdate, RawCustomMessage, RpcResult, SyncPayment,
};
use crate::primitives::{MessageType, NodeId};

pub(crate) const LOCAL_ID: &str =
    "03a1f3b6c7c8d5e2f40112233445566778899aabbccddeeff00112233445566778";
pub(crate) const PEER_ID: &str =
    "02eec7245d6b7d2ccb30380bfbe2a3648cd7a942653f5aa340edcea1f283686619";

/// Builds a stream yielding `items`, then either ending or staying open.
pub(crate) fn scripted<T: Send + 'static>(
    items: Vec<RpcResult<T>>,
    keep_open: bool,
) -> NodeStream<T> {
    let items = tokio_stream::iter(items);
    if keep_open {
        Box::pin(items.chain(tokio_stream::pending()))
    } else {
        Box::pin(items)
    }
}

/// A [`NodeClient`] whose responses are set up front.
///
/// Subscriptions hand out their scripted stream once; a second subscribe
/// call fails with `unavailable`.
#[derive(Default)]
pub(crate) struct MockNode {
    pub(crate) identity: Mutex<Option<RpcResult<String>>>,
    pub(crate) pay_reqs: Mutex<HashMap<String, PayReqInfo>>,
    pub(crate) sync_payment: Mutex<Option<RpcResult<SyncPayment>>>,
    pub(crate) channels: Mutex<Vec<ChannelInfo>>,
    pub(crate) peers: Mutex<Vec<String>>,
    pub(crate) invoices: Mutex<Option<NodeStream<InvoiceUpdate>>>,
    pub(crate) custom_messages: Mutex<Option<NodeStream<RawCustomMessage>>>,
    pub(crate) peer_events: Mutex<Option<NodeStream<PeerEventUpdate>>>,
    pub(crate) payment_updates: Mutex<Option<NodeStream<PaymentUpdate>>>,

    pub(crate) added_invoices: Mutex<Vec<InvoiceRequest>>,
    pub(crate) sent_messages: Mutex<Vec<(NodeId, MessageType, Vec<u8>)>>,
    pub(crate) payment_calls: Mutex<Vec<PaymentParams>>,
    pub(crate) list_channels_calls: Mutex<Vec<bool>>,
}

impl MockNode {
    pub(crate) fn new() -> Self {
        let node = Self::default();
        *node.identity.lock() = Some(Ok(LOCAL_ID.to_string()));
        node
    }

    pub(crate) fn with_channel(self, channel: ChannelInfo) -> Self {
        self.channels.lock().push(channel);
        self
    }

    pub(crate) fn with_pay_req(self, pay_req: &str, info: PayReqInfo) -> Self {
        self.pay_reqs.lock().insert(pay_req.to_string(), info);
        self
    }

    pub(crate) fn with_invoices(self, stream: NodeStream<InvoiceUpdate>) -> Self {
        *self.invoices.lock() = Some(stream);
        self
    }

    pub(crate) fn with_custom_messages(self, stream: NodeStream<RawCustomMessage>) -> Self {
        *self.custom_messages.lock() = Some(stream);
        self
    }

    pub(crate) fn with_peer_events(self, stream: NodeStream<PeerEventUpdate>) -> Self {
        *self.peer_events.lock() = Some(stream);
        self
    }

    pub(crate) fn with_payment_updates(self, stream: NodeStream<PaymentUpdate>) -> Self {
        *self.payment_updates.lock() = Some(stream);
        self
    }

    fn take<T>(slot: &Mutex<Option<NodeStream<T>>>) -> RpcResult<NodeStream<T>> {
        slot.lock()
            .take()
            .ok_or_else(|| Status::unavailable("subscription not scripted"))
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn get_identity(&self) -> RpcResult<String> {
        self.identity
            .lock()
            .clone()
            .unwrap_or_else(|| Err(Status::unavailable("identity not scripted")))
    }

    async fn decode_pay_req(&self, pay_req: &str) -> RpcResult<PayReqInfo> {
        self.pay_reqs
            .lock()
            .get(pay_req)
            .cloned()
            .ok_or_else(|| Status::invalid_argument("invalid payment request"))
    }

    async fn pay(&self, _pay_req: &str) -> RpcResult<SyncPayment> {
        self.sync_payment
            .lock()
            .clone()
            .unwrap_or_else(|| Err(Status::unavailable("payment not scripted")))
    }

    async fn list_channels(&self, active_only: bool) -> RpcResult<Vec<ChannelInfo>> {
        self.list_channels_calls.lock().push(active_only);
        Ok(self
            .channels
            .lock()
            .iter()
            .filter(|channel| channel.active || !active_only)
            .cloned()
            .collect())
    }

    async fn list_peers(&self) -> RpcResult<Vec<String>> {
        Ok(self.peers.lock().clone())
    }

    async fn add_invoice(&self, invoice: InvoiceRequest) -> RpcResult<String> {
        let pay_req = format!("lnbcrt{}", invoice.value_msat / 1000);
        self.added_invoices.lock().push(invoice);
        Ok(pay_req)
    }

    async fn send_custom_message(
        &self,
        peer: &NodeId,
        msg_type: MessageType,
        data: Vec<u8>,
    ) -> RpcResult<()> {
        self.sent_messages.lock().push((*peer, msg_type, data));
        Ok(())
    }

    async fn subscribe_invoices(&self) -> RpcResult<NodeStream<InvoiceUpdate>> {
        Self::take(&self.invoices)
    }

    async fn subscribe_custom_messages(&self) -> RpcResult<NodeStream<RawCustomMessage>> {
        Self::take(&self.custom_messages)
    }

    async fn subscribe_peer_events(&self) -> RpcResult<NodeStream<PeerEventUpdate>> {
        Self::take(&self.peer_events)
    }

    async fn send_payment(&self, params: PaymentParams) -> RpcResult<NodeStream<PaymentUpdate>> {
        self.payment_calls.lock().push(params);
        Self::take(&self.payment_updates)
    }
}
