//! The RPC surface of the remote node as seen by the adapter.
//!
//! [`NodeClient`] is the seam between the adapter's logic and the transport.
//! [`GrpcNode`](crate::GrpcNode) implements it over LND's gRPC API; tests
//! script it in memory.

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;
use tonic_lnd::tonic::Status;

use crate::primitives::{MessageType, NodeId, Preimage, ShortChannelId};

/// Result of a single call to the node. The status is passed on verbatim.
pub type RpcResult<T> = Result<T, Status>;

/// Server-streaming response.
pub type NodeStream<T> = Pin<Box<dyn Stream<Item = RpcResult<T>> + Send>>;

/// CLTV delta of every invoice the adapter creates.
pub const INVOICE_CLTV_EXPIRY: u64 = 144;

/// Decoded BOLT11 payment request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayReqInfo {
    pub destination: String,
    pub payment_hash: String,
    pub amount_sat: u64,
    pub amount_msat: u64,
    pub description: String,
    pub timestamp: i64,
    pub expiry: u64,
    pub cltv_expiry: u64,
}

impl PayReqInfo {
    /// Amount in whole satoshis, rounding a sub-satoshi remainder up.
    pub fn amount_sat_ceil(&self) -> u64 {
        self.amount_msat.div_ceil(1000).max(self.amount_sat)
    }
}

/// An open channel as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub chan_id: u64,
    pub short_channel_id: ShortChannelId,
    pub remote_pubkey: String,
    pub channel_point: String,
    pub capacity: u64,
    pub local_balance: u64,
    pub remote_balance: u64,
    pub active: bool,
}

/// Outcome of a synchronous payment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPayment {
    /// Set when the node reports the failure in-band instead of as an error.
    pub payment_error: String,
    pub preimage: Vec<u8>,
}

/// Parameters of a new invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    pub value_msat: u64,
    pub memo: String,
    pub preimage: Preimage,
    pub expiry: u64,
    pub cltv_expiry: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceState {
    Open,
    Settled,
    Canceled,
    Accepted,
    Unknown(i32),
}

/// Invoice event from the invoice subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceUpdate {
    pub memo: String,
    pub state: InvoiceState,
}

/// Custom message as delivered by the node, before the sender key is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCustomMessage {
    pub peer: Vec<u8>,
    pub msg_type: MessageType,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEventKind {
    Online,
    Offline,
    Unknown(i32),
}

/// Peer connectivity event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEventUpdate {
    pub pub_key: String,
    pub kind: PeerEventKind,
}

/// Status of an outgoing payment.
///
/// `Succeeded` and `Failed` are terminal; the node keeps streaming updates
/// for every other status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    InFlight,
    Succeeded,
    Failed { reason: String },
    /// Any other wire status, such as `INITIATED`.
    Other(i32),
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

/// One update of the payment status stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUpdate {
    pub payment_hash: String,
    /// Hex preimage, set once the payment succeeded.
    pub preimage: String,
    pub status: PaymentStatus,
}

/// Parameters of a streaming multi-part payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentParams {
    pub payment_request: String,
    pub timeout_seconds: u32,
    pub outgoing_chan_ids: Vec<u64>,
    pub max_parts: u32,
}

/// Calls the adapter issues against the remote node.
#[async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait NodeClient: Send + Sync {
    /// Identity public key of the node, as hex.
    async fn get_identity(&self) -> RpcResult<String>;

    async fn decode_pay_req(&self, pay_req: &str) -> RpcResult<PayReqInfo>;

    /// Pays a request and waits for the outcome in a single call.
    async fn pay(&self, pay_req: &str) -> RpcResult<SyncPayment>;

    async fn list_channels(&self, active_only: bool) -> RpcResult<Vec<ChannelInfo>>;

    /// Identity keys of the connected peers.
    async fn list_peers(&self) -> RpcResult<Vec<String>>;

    /// Adds an invoice, returning its payment request.
    async fn add_invoice(&self, invoice: InvoiceRequest) -> RpcResult<String>;

    async fn send_custom_message(
        &self,
        peer: &NodeId,
        msg_type: MessageType,
        data: Vec<u8>,
    ) -> RpcResult<()>;

    async fn subscribe_invoices(&self) -> RpcResult<NodeStream<InvoiceUpdate>>;

    async fn subscribe_custom_messages(&self) -> RpcResult<NodeStream<RawCustomMessage>>;

    async fn subscribe_peer_events(&self) -> RpcResult<NodeStream<PeerEventUpdate>>;

    /// Starts a payment and streams its status updates.
    async fn send_payment(&self, params: PaymentParams) -> RpcResult<NodeStream<PaymentUpdate>>;
}
