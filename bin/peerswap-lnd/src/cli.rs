//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use peerswap_lnd::{Lnd, LndConfig, MessageType, NodeId, PresenceTrigger, RunnerOutcome};
use tracing::{info, warn};

use crate::logging::LogArgs;

/// Talk to an LND node through the peerswap adapter.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration (applies to all subcommands).
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    /// Read the LND connection settings from a TOML file instead of flags.
    #[arg(long, value_name = "FILE", global = true)]
    pub(crate) config: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) lnd: LndConfig,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Subscribe to invoices, custom messages and peer events until Ctrl-C.
    Listen,

    /// Print the identity key of the node.
    Info,

    /// List the identity keys of connected peers.
    Peers,

    /// Decode a payment request.
    Decode {
        /// BOLT11 payment request.
        pay_req: String,
    },

    /// Check that a channel can send the given amount.
    CheckChannel {
        /// Short channel id, as `BxTxO`, `B:T:O` or the numeric id.
        short_channel_id: String,
        /// Amount to send, in satoshi.
        amount_sat: u64,
    },

    /// Send a custom message to a peer.
    SendMessage {
        /// Identity key of the peer, as hex.
        peer: String,
        /// Message type tag, the type code in lowercase hex.
        msg_type: MessageType,
        /// Payload, as hex.
        payload: String,
    },
}

impl Cli {
    fn lnd_config(&self) -> Result<LndConfig> {
        match &self.config {
            Some(path) => LndConfig::load(path).wrap_err("failed to load lnd config"),
            None => Ok(self.lnd.clone()),
        }
    }

    pub(crate) async fn run(self) -> Result<()> {
        let config = self.lnd_config()?;
        let lnd = Lnd::connect(&config)
            .await
            .wrap_err_with(|| format!("failed to connect to lnd at {}", config.address))?;

        match self.command {
            Commands::Listen => listen(lnd).await?,
            Commands::Info => println!("{}", lnd.node_id()),
            Commands::Peers => {
                for peer in lnd.get_peers().await? {
                    println!("{peer}");
                }
            }
            Commands::Decode { pay_req } => {
                let (payment_hash, amount_msat) = lnd.decode_payreq(&pay_req).await?;
                println!("payment_hash: {payment_hash}");
                println!("amount_msat:  {amount_msat}");
            }
            Commands::CheckChannel {
                short_channel_id,
                amount_sat,
            } => {
                let channel = lnd.check_channel(&short_channel_id, amount_sat).await?;
                println!("short_channel_id: {}", channel.short_channel_id);
                println!("chan_id:          {}", channel.chan_id);
                println!("remote_pubkey:    {}", channel.remote_pubkey);
                println!("capacity:         {}", channel.capacity);
                println!("local_balance:    {}", channel.local_balance);
                println!("remote_balance:   {}", channel.remote_balance);
            }
            Commands::SendMessage {
                peer,
                msg_type,
                payload,
            } => {
                let payload = hex::decode(&payload).wrap_err("payload is not valid hex")?;
                lnd.send_message(&peer, payload, msg_type).await?;
                info!(%peer, %msg_type, "message sent");
            }
        }
        Ok(())
    }
}

/// Logs peers coming online in place of a presence poll service.
struct LogPresence;

impl PresenceTrigger for LogPresence {
    fn poll(&self, peer: &NodeId) {
        info!(%peer, "peer online");
    }
}

async fn listen(lnd: Lnd) -> Result<()> {
    let lnd = lnd.with_presence(LogPresence);
    lnd.register_message_handler(|peer, msg_type, payload| {
        info!(%peer, msg_type, payload = %hex::encode(payload), "custom message");
        Ok(())
    });
    lnd.register_payment_callback(|memo| info!(memo, "invoice settled"));

    let handle = lnd.start_listening();
    info!(node_id = %lnd.node_id(), "listening, press Ctrl-C to stop");

    let join = handle.join();
    tokio::pin!(join);
    let outcomes = tokio::select! {
        outcomes = &mut join => outcomes,
        res = tokio::signal::ctrl_c() => {
            res.wrap_err("failed to listen for Ctrl-C")?;
            info!("shutting down");
            lnd.shutdown();
            join.await
        }
    };

    report(&outcomes)
}

fn report(outcomes: &[RunnerOutcome]) -> Result<()> {
    let mut failed = 0;
    for outcome in outcomes {
        if let Err(err) = &outcome.result {
            warn!(runner = %outcome.runner, "{err}");
            failed += 1;
        }
    }
    if failed > 0 {
        eyre::bail!("{failed} subscription(s) terminated with an error");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send_message() {
        let cli = Cli::try_parse_from([
            "peerswap-lnd",
            "--lnd.address",
            "127.0.0.1:10010",
            "send-message",
            "02eec7245d6b7d2ccb30380bfbe2a3648cd7a942653f5aa340edcea1f283686619",
            "a455",
            "cafe",
        ])
        .unwrap();
        assert_eq!(cli.lnd.address, "127.0.0.1:10010");
        match cli.command {
            Commands::SendMessage {
                msg_type, payload, ..
            } => {
                assert_eq!(msg_type, MessageType::new(42069));
                assert_eq!(payload, "cafe");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_rejects_non_canonical_type_tag() {
        assert!(
            Cli::try_parse_from([
                "peerswap-lnd",
                "send-message",
                "02eec7245d6b7d2ccb30380bfbe2a3648cd7a942653f5aa340edcea1f283686619",
                "A455",
                "cafe",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_parse_check_channel_with_global_flags() {
        let cli =
            Cli::try_parse_from(["peerswap-lnd", "check-channel", "700000x1234x1", "50000", "-vv"])
                .unwrap();
        assert_eq!(cli.logs.verbosity, 2);
        assert!(matches!(
            cli.command,
            Commands::CheckChannel { amount_sat: 50000, .. }
        ));
    }

    #[test]
    fn test_config_file_overrides_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lnd.toml");
        std::fs::write(&path, "address = \"node.example:10009\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "peerswap-lnd",
            "--config",
            path.to_str().unwrap(),
            "--lnd.address",
            "ignored:1",
            "info",
        ])
        .unwrap();
        assert_eq!(cli.lnd_config().unwrap().address, "node.example:10009");
    }
}
