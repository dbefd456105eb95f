//! Connection settings for the LND node.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default TLS certificate written by LND.
pub const DEFAULT_TLS_CERT: &str = "~/.lnd/tls.cert";

/// Default admin macaroon of a mainnet LND node.
pub const DEFAULT_MACAROON: &str = "~/.lnd/data/chain/bitcoin/mainnet/admin.macaroon";

/// Default gRPC listen address of LND.
pub const DEFAULT_ADDRESS: &str = "localhost:10009";

/// How to reach and authenticate against the node.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "LND")]
#[serde(default)]
pub struct LndConfig {
    /// Path to the node's TLS certificate.
    #[arg(
        long = "lnd.tlscert",
        env = "LND_TLS_CERT",
        default_value = DEFAULT_TLS_CERT,
        value_name = "PATH"
    )]
    pub tls_cert_path: String,

    /// Path to the macaroon used to authenticate calls.
    #[arg(
        long = "lnd.macaroon",
        env = "LND_MACAROON",
        default_value = DEFAULT_MACAROON,
        value_name = "PATH"
    )]
    pub macaroon_path: String,

    /// gRPC address of the node, `host:port` or a full URI.
    #[arg(
        long = "lnd.address",
        env = "LND_ADDRESS",
        default_value = DEFAULT_ADDRESS,
        value_name = "ADDR"
    )]
    pub address: String,
}

impl Default for LndConfig {
    fn default() -> Self {
        Self {
            tls_cert_path: DEFAULT_TLS_CERT.to_string(),
            macaroon_path: DEFAULT_MACAROON.to_string(),
            address: DEFAULT_ADDRESS.to_string(),
        }
    }
}

impl LndConfig {
    /// Reads a TOML config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// TLS certificate path with `~` and environment variables expanded.
    pub fn tls_cert_path(&self) -> Result<PathBuf, ConfigError> {
        expand_path(&self.tls_cert_path)
    }

    /// Macaroon path with `~` and environment variables expanded.
    pub fn macaroon_path(&self) -> Result<PathBuf, ConfigError> {
        expand_path(&self.macaroon_path)
    }

    /// URI to dial. A bare `host:port` is dialed over `https`.
    pub fn endpoint_uri(&self) -> String {
        if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("https://{}", self.address)
        }
    }
}

fn expand_path(path: &str) -> Result<PathBuf, ConfigError> {
    let expanded = shellexpand::full(path).map_err(|source| ConfigError::Expand {
        path: path.to_string(),
        source,
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        lnd: LndConfig,
    }

    #[test]
    fn test_cli_defaults_match_default() {
        let cli = Cli::try_parse_from(["peerswap-lnd"]).unwrap();
        // Env overrides would make this flaky.
        if std::env::var_os("LND_ADDRESS").is_none()
            && std::env::var_os("LND_TLS_CERT").is_none()
            && std::env::var_os("LND_MACAROON").is_none()
        {
            assert_eq!(cli.lnd, LndConfig::default());
        }
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "peerswap-lnd",
            "--lnd.tlscert",
            "/tmp/tls.cert",
            "--lnd.macaroon",
            "/tmp/admin.macaroon",
            "--lnd.address",
            "10.0.0.2:10009",
        ])
        .unwrap();
        assert_eq!(cli.lnd.tls_cert_path, "/tmp/tls.cert");
        assert_eq!(cli.lnd.macaroon_path, "/tmp/admin.macaroon");
        assert_eq!(cli.lnd.address, "10.0.0.2:10009");
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "address = \"node.example:10009\"").unwrap();

        let config = LndConfig::load(file.path()).unwrap();
        assert_eq!(config.address, "node.example:10009");
        assert_eq!(config.tls_cert_path, DEFAULT_TLS_CERT);
        assert_eq!(config.macaroon_path, DEFAULT_MACAROON);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            LndConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        );

        let path = dir.path().join("bad.toml");
        fs::write(&path, "address = [").unwrap();
        assert_matches!(LndConfig::load(&path), Err(ConfigError::Parse { .. }));
    }

    #[test]
    fn test_tilde_is_expanded() {
        let config = LndConfig::default();
        let path = config.tls_cert_path().unwrap();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with(".lnd/tls.cert"));
    }

    #[test]
    fn test_endpoint_uri() {
        let mut config = LndConfig::default();
        assert_eq!(config.endpoint_uri(), "https://localhost:10009");

        config.address = "https://node.example:10009".to_string();
        assert_eq!(config.endpoint_uri(), "https://node.example:10009");
    }
}
