//! Error types for the LND adapter.

use std::path::PathBuf;

use tonic_lnd::tonic::Status;

use crate::listener::Runner;

/// Failure to parse a value received from a caller or from the node.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid public key prefix: 0x{0:02x}")]
    InvalidPublicKeyPrefix(u8),
    #[error("invalid message type tag: {0:?}")]
    InvalidMessageType(String),
    #[error("invalid short channel id: {0:?}")]
    InvalidShortChannelId(String),
}

/// Failure to load or resolve the adapter configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to expand path {path:?}: {source}")]
    Expand {
        path: String,
        #[source]
        source: shellexpand::LookupError<std::env::VarError>,
    },
}

/// Failure while establishing the connection to the node.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read TLS certificate {}: {source}", path.display())]
    ReadCertificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a PEM certificate", path.display())]
    InvalidCertificate { path: PathBuf },
    #[error("failed to read macaroon {}: {source}", path.display())]
    ReadMacaroon {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid macaroon: {0}")]
    InvalidMacaroon(String),
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: tonic_lnd::ConnectError,
    },
}

/// Failure to learn the local node's identity after connecting.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("get info call failed: {0}")]
    Rpc(#[source] Status),
    #[error("node returned a malformed identity key: {0}")]
    InvalidPubkey(#[source] ParseError),
}

/// Reason a subscription runner stopped.
#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    #[error("{runner}: failed to open subscription: {status}")]
    Subscribe { runner: Runner, status: Status },
    #[error("{runner}: stream receive failed: {status}")]
    Stream { runner: Runner, status: Status },
    #[error("{runner}: stream closed by the node")]
    StreamEnded { runner: Runner },
    #[error("{runner}: task aborted: {reason}")]
    Aborted { runner: Runner, reason: String },
}

impl ListenError {
    /// The runner that produced this error.
    pub fn runner(&self) -> Runner {
        match self {
            Self::Subscribe { runner, .. }
            | Self::Stream { runner, .. }
            | Self::StreamEnded { runner }
            | Self::Aborted { runner, .. } => *runner,
        }
    }
}

/// Errors returned by [`Lnd`](crate::Lnd) operations.
#[derive(Debug, thiserror::Error)]
pub enum LndError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("rpc call failed: {0}")]
    Rpc(#[from] Status),
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
    #[error(
        "not enough outbound capacity on channel {short_channel_id}: local balance {local_balance} sat, required {required} sat"
    )]
    InsufficientCapacity {
        short_channel_id: String,
        local_balance: u64,
        required: u64,
    },
    #[error("payment failure: {0}")]
    PaymentFailed(String),
    #[error("payment stream failed: {0}")]
    Stream(#[source] Status),
    #[error("payment stream closed before a terminal status")]
    StreamEnded,
    #[error("operation cancelled")]
    Cancelled,
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ParseError),
}

pub type Result<T, E = LndError> = std::result::Result<T, E>;
