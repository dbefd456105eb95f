//! LND adapter for the swap coordinator.
//!
//! Connects to an LND node over authenticated gRPC and exposes what the
//! coordinator needs from it:
//!
//! - custom peer messages, fanned out to registered [`MessageHandler`]s
//! - settled invoices, reported to a single payment callback
//! - peers coming online, reported to a [`PresenceTrigger`]
//! - plain and channel-scoped payments, invoices and peer listing
//!
//! ```no_run
//! # async fn run() -> eyre::Result<()> {
//! use peerswap_lnd::{Lnd, LndConfig};
//!
//! let lnd = Lnd::connect(&LndConfig::default()).await?;
//! lnd.register_message_handler(|peer, msg_type, payload| {
//!     tracing::info!(%peer, msg_type, len = payload.len(), "message");
//!     Ok(())
//! });
//! let listener = lnd.start_listening();
//! lnd.shutdown();
//! listener.join().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod dispatch;
mod error;
mod grpc;
mod listener;
mod lnd;
mod metrics;
mod node;
mod payment;
mod presence;
pub mod primitives;

#[cfg(test)]
mod mock;

pub use config::{DEFAULT_ADDRESS, DEFAULT_MACAROON, DEFAULT_TLS_CERT, LndConfig};
pub use connection::{MAX_MESSAGE_SIZE, connect, load_macaroon, load_tls_certificate};
pub use dispatch::{MessageHandler, PaymentCallback, Registry};
pub use error::{
    ConfigError, ConnectionError, IdentityError, ListenError, LndError, ParseError, Result,
};
pub use grpc::GrpcNode;
pub use listener::{ListenerHandle, Runner, RunnerOutcome};
pub use lnd::Lnd;
pub use metrics::LndMetrics;
pub use node::{
    ChannelInfo, INVOICE_CLTV_EXPIRY, InvoiceRequest, InvoiceState, InvoiceUpdate, NodeClient,
    NodeStream, PayReqInfo, PaymentParams, PaymentStatus, PaymentUpdate, PeerEventKind,
    PeerEventUpdate, RawCustomMessage, RpcResult, SyncPayment,
};
pub use payment::{
    MAX_PAYMENT_PARTS, PAYMENT_TIMEOUT_SECS, POLL_INTERVAL, await_payment, check_channel,
    pay_invoice, rebalance_payment,
};
pub use presence::PresenceTrigger;
pub use primitives::{InboundMessage, MessageType, NodeId, Preimage, ShortChannelId};
