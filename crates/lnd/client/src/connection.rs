//! Dialing the node with its TLS certificate and macaroon.

use std::path::Path;

use tonic_lnd::Client;
use tracing::{debug, info};

use crate::config::LndConfig;
use crate::error::ConnectionError;

/// Maximum size of a single decoded response (500 MiB).
pub const MAX_MESSAGE_SIZE: usize = 500 * 1024 * 1024;

/// First byte of a binary v2 macaroon.
const MACAROON_V2: u8 = 0x02;

const PEM_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";

/// Reads the node's PEM certificate.
pub async fn load_tls_certificate(path: &Path) -> Result<Vec<u8>, ConnectionError> {
    let pem = tokio::fs::read(path)
        .await
        .map_err(|source| ConnectionError::ReadCertificate {
            path: path.to_path_buf(),
            source,
        })?;
    if !String::from_utf8_lossy(&pem).contains(PEM_CERTIFICATE) {
        return Err(ConnectionError::InvalidCertificate {
            path: path.to_path_buf(),
        });
    }
    Ok(pem)
}

/// Reads a binary macaroon and checks its format.
pub async fn load_macaroon(path: &Path) -> Result<Vec<u8>, ConnectionError> {
    let macaroon = tokio::fs::read(path)
        .await
        .map_err(|source| ConnectionError::ReadMacaroon {
            path: path.to_path_buf(),
            source,
        })?;
    match macaroon.first() {
        None => Err(ConnectionError::InvalidMacaroon("empty file".to_string())),
        Some(&MACAROON_V2) => Ok(macaroon),
        Some(version) => Err(ConnectionError::InvalidMacaroon(format!(
            "unsupported format, first byte 0x{version:02x}"
        ))),
    }
}

/// Checks the credentials and dials the node.
///
/// The certificate is pinned: the node must present exactly this certificate,
/// so LND's self-signed `tls.cert` is accepted even though it is marked as a
/// certificate authority. Every call carries the macaroon. Resolves once the
/// connection is established; there is no retry.
pub async fn connect(config: &LndConfig) -> Result<Client, ConnectionError> {
    let cert_path = config.tls_cert_path()?;
    let macaroon_path = config.macaroon_path()?;
    load_tls_certificate(&cert_path).await?;
    load_macaroon(&macaroon_path).await?;

    let address = config.endpoint_uri();
    debug!(%address, cert = %cert_path.display(), "dialing lnd");
    let client = tonic_lnd::connect(address.clone(), cert_path, macaroon_path)
        .await
        .map_err(|source| ConnectionError::Connect {
            address: address.clone(),
            source,
        })?;
    info!(%address, "connected to lnd");

    Ok(client)
}
