//! [`NodeClient`] over LND's gRPC API.

use async_trait::async_trait;
use tokio_stream::StreamExt;
use tonic_lnd::tonic::Streaming;
use tonic_lnd::{Client, LightningClient, RouterClient, lnrpc, routerrpc};

use crate::config::LndConfig;
use crate::connection::{self, MAX_MESSAGE_SIZE};
use crate::error::ConnectionError;
use crate::node::{
    ChannelInfo, InvoiceRequest, InvoiceState, InvoiceUpdate, NodeClient, NodeStream, PayReqInfo,
    PaymentParams, PaymentStatus, PaymentUpdate, PeerEventKind, PeerEventUpdate,
    RawCustomMessage, RpcResult, SyncPayment,
};
use crate::primitives::{MessageType, NodeId, ShortChannelId};

/// Authenticated gRPC connection to an LND node.
///
/// Cloning is cheap; clones share the underlying channel.
#[derive(Clone)]
pub struct GrpcNode {
    lightning: LightningClient,
    router: RouterClient,
}

impl GrpcNode {
    /// Wraps a connected client. Responses up to [`MAX_MESSAGE_SIZE`] are
    /// accepted.
    pub fn new(mut client: Client) -> Self {
        let lightning = client
            .lightning()
            .clone()
            .max_decoding_message_size(MAX_MESSAGE_SIZE);
        let router = client
            .router()
            .clone()
            .max_decoding_message_size(MAX_MESSAGE_SIZE);
        Self { lightning, router }
    }

    /// Loads credentials from `config` and dials the node.
    pub async fn connect(config: &LndConfig) -> Result<Self, ConnectionError> {
        let client = connection::connect(config).await?;
        Ok(Self::new(client))
    }
}

impl std::fmt::Debug for GrpcNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcNode").finish_non_exhaustive()
    }
}

fn into_node_stream<T, U>(stream: Streaming<T>) -> NodeStream<U>
where
    T: Send + 'static,
    U: From<T> + Send + 'static,
{
    Box::pin(stream.map(|item| item.map(U::from)))
}

#[async_trait]
impl NodeClient for GrpcNode {
    async fn get_identity(&self) -> RpcResult<String> {
        let info = self
            .lightning
            .clone()
            .get_info(lnrpc::GetInfoRequest {})
            .await?
            .into_inner();
        Ok(info.identity_pubkey)
    }

    async fn decode_pay_req(&self, pay_req: &str) -> RpcResult<PayReqInfo> {
        let decoded = self
            .lightning
            .clone()
            .decode_pay_req(lnrpc::PayReqString {
                pay_req: pay_req.to_string(),
            })
            .await?
            .into_inner();
        Ok(decoded.into())
    }

    // SendPaymentSync is marked deprecated in recent lnrpc protos.
    #[allow(deprecated)]
    async fn pay(&self, pay_req: &str) -> RpcResult<SyncPayment> {
        let response = self
            .lightning
            .clone()
            .send_payment_sync(lnrpc::SendRequest {
                payment_request: pay_req.to_string(),
                ..Default::default()
            })
            .await?
            .into_inner();
        Ok(SyncPayment {
            payment_error: response.payment_error,
            preimage: response.payment_preimage,
        })
    }

    async fn list_channels(&self, active_only: bool) -> RpcResult<Vec<ChannelInfo>> {
        let response = self
            .lightning
            .clone()
            .list_channels(lnrpc::ListChannelsRequest {
                active_only,
                ..Default::default()
            })
            .await?
            .into_inner();
        Ok(response.channels.into_iter().map(Into::into).collect())
    }

    async fn list_peers(&self) -> RpcResult<Vec<String>> {
        let response = self
            .lightning
            .clone()
            .list_peers(lnrpc::ListPeersRequest::default())
            .await?
            .into_inner();
        Ok(response.peers.into_iter().map(|peer| peer.pub_key).collect())
    }

    async fn add_invoice(&self, invoice: InvoiceRequest) -> RpcResult<String> {
        let response = self
            .lightning
            .clone()
            .add_invoice(lnrpc::Invoice {
                memo: invoice.memo,
                r_preimage: invoice.preimage.as_bytes().to_vec(),
                value_msat: saturating_i64(invoice.value_msat),
                expiry: saturating_i64(invoice.expiry),
                cltv_expiry: invoice.cltv_expiry,
                ..Default::default()
            })
            .await?
            .into_inner();
        Ok(response.payment_request)
    }

    async fn send_custom_message(
        &self,
        peer: &NodeId,
        msg_type: MessageType,
        data: Vec<u8>,
    ) -> RpcResult<()> {
        self.lightning
            .clone()
            .send_custom_message(lnrpc::SendCustomMessageRequest {
                peer: peer.to_vec(),
                r#type: msg_type.code(),
                data,
            })
            .await?;
        Ok(())
    }

    async fn subscribe_invoices(&self) -> RpcResult<NodeStream<InvoiceUpdate>> {
        let stream = self
            .lightning
            .clone()
            .subscribe_invoices(lnrpc::InvoiceSubscription::default())
            .await?
            .into_inner();
        Ok(into_node_stream(stream))
    }

    async fn subscribe_custom_messages(&self) -> RpcResult<NodeStream<RawCustomMessage>> {
        let stream = self
            .lightning
            .clone()
            .subscribe_custom_messages(lnrpc::SubscribeCustomMessagesRequest {})
            .await?
            .into_inner();
        Ok(into_node_stream(stream))
    }

    async fn subscribe_peer_events(&self) -> RpcResult<NodeStream<PeerEventUpdate>> {
        let stream = self
            .lightning
            .clone()
            .subscribe_peer_events(lnrpc::PeerEventSubscription {})
            .await?
            .into_inner();
        Ok(into_node_stream(stream))
    }

    async fn send_payment(&self, params: PaymentParams) -> RpcResult<NodeStream<PaymentUpdate>> {
        let stream = self
            .router
            .clone()
            .send_payment_v2(routerrpc::SendPaymentRequest {
                payment_request: params.payment_request,
                timeout_seconds: i32::try_from(params.timeout_seconds).unwrap_or(i32::MAX),
                max_parts: params.max_parts,
                outgoing_chan_ids: params.outgoing_chan_ids,
                ..Default::default()
            })
            .await?
            .into_inner();
        Ok(into_node_stream(stream))
    }
}

/// Amounts are never negative; a negative value from the wire reads as zero.
fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl From<lnrpc::PayReq> for PayReqInfo {
    fn from(req: lnrpc::PayReq) -> Self {
        Self {
            destination: req.destination,
            payment_hash: req.payment_hash,
            amount_sat: non_negative(req.num_satoshis),
            amount_msat: non_negative(req.num_msat),
            description: req.description,
            timestamp: req.timestamp,
            expiry: non_negative(req.expiry),
            cltv_expiry: non_negative(req.cltv_expiry),
        }
    }
}

impl From<lnrpc::Channel> for ChannelInfo {
    fn from(channel: lnrpc::Channel) -> Self {
        Self {
            chan_id: channel.chan_id,
            short_channel_id: ShortChannelId::from(channel.chan_id),
            remote_pubkey: channel.remote_pubkey,
            channel_point: channel.channel_point,
            capacity: non_negative(channel.capacity),
            local_balance: non_negative(channel.local_balance),
            remote_balance: non_negative(channel.remote_balance),
            active: channel.active,
        }
    }
}

impl From<lnrpc::Invoice> for InvoiceUpdate {
    fn from(invoice: lnrpc::Invoice) -> Self {
        use lnrpc::invoice::InvoiceState as Wire;

        let state = match Wire::try_from(invoice.state) {
            Ok(Wire::Open) => InvoiceState::Open,
            Ok(Wire::Settled) => InvoiceState::Settled,
            Ok(Wire::Canceled) => InvoiceState::Canceled,
            Ok(Wire::Accepted) => InvoiceState::Accepted,
            Err(_) => InvoiceState::Unknown(invoice.state),
        };
        Self {
            memo: invoice.memo,
            state,
        }
    }
}

impl From<lnrpc::CustomMessage> for RawCustomMessage {
    fn from(msg: lnrpc::CustomMessage) -> Self {
        Self {
            peer: msg.peer,
            msg_type: MessageType::new(msg.r#type),
            data: msg.data,
        }
    }
}

impl From<lnrpc::PeerEvent> for PeerEventUpdate {
    fn from(event: lnrpc::PeerEvent) -> Self {
        use lnrpc::peer_event::EventType;

        let kind = match EventType::try_from(event.r#type) {
            Ok(EventType::PeerOnline) => PeerEventKind::Online,
            Ok(EventType::PeerOffline) => PeerEventKind::Offline,
            Err(_) => PeerEventKind::Unknown(event.r#type),
        };
        Self {
            pub_key: event.pub_key,
            kind,
        }
    }
}

impl From<lnrpc::Payment> for PaymentUpdate {
    fn from(payment: lnrpc::Payment) -> Self {
        use lnrpc::payment::PaymentStatus as Wire;

        let status = match Wire::try_from(payment.status) {
            Ok(Wire::InFlight) => PaymentStatus::InFlight,
            Ok(Wire::Succeeded) => PaymentStatus::Succeeded,
            Ok(Wire::Failed) => PaymentStatus::Failed {
                reason: lnrpc::PaymentFailureReason::try_from(payment.failure_reason)
                    .map(|reason| reason.as_str_name().to_string())
                    .unwrap_or_else(|_| format!("FAILURE_REASON_{}", payment.failure_reason)),
            },
            _ => PaymentStatus::Other(payment.status),
        };
        Self {
            payment_hash: payment.payment_hash,
            preimage: payment.payment_preimage,
            status,
        }
    }
}
