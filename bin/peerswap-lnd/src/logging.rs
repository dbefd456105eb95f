//! Logging setup.

use clap::Args;
use eyre::Result;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Logging configuration.
#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Logging")]
#[serde(default)]
pub(crate) struct LogArgs {
    /// Silence all output except errors.
    #[arg(short, long, global = true)]
    pub(crate) quiet: bool,

    /// Verbose mode (-v, -vv). Raises the default level set by `RUST_LOG`.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    #[serde(skip)]
    pub(crate) verbosity: u8,

    /// Log filter directive (e.g., "peerswap_lnd=debug,h2=info").
    #[arg(long = "log.filter", value_name = "DIRECTIVE", global = true)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) filter: Option<String>,

    /// Use JSON format for log output.
    #[arg(long = "log.json", global = true)]
    pub(crate) json: bool,
}

impl LogArgs {
    fn verbosity_level(&self) -> Option<LevelFilter> {
        match self.verbosity {
            0 => None,
            1 => Some(LevelFilter::DEBUG),
            _ => Some(LevelFilter::TRACE),
        }
    }

    /// `RUST_LOG` (or `info`), then `-v`, then `--log.filter`. `--quiet`
    /// replaces all of them with `error`.
    fn env_filter(&self) -> EnvFilter {
        if self.quiet {
            return EnvFilter::new(LevelFilter::ERROR.to_string());
        }

        let mut filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy();
        if let Some(level) = self.verbosity_level() {
            filter = filter.add_directive(level.into());
        }

        let directives = self.filter.as_deref().unwrap_or_default();
        for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
            match directive.trim().parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(err) => eprintln!("ignoring log directive {directive:?}: {err}"),
            }
        }
        filter
    }
}

/// Installs the global subscriber.
pub(crate) fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = args.env_filter();
    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
            .map_err(|err| eyre::eyre!("failed to install log subscriber: {err}"))?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
            .map_err(|err| eyre::eyre!("failed to install log subscriber: {err}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_overrides_everything() {
        let args = LogArgs {
            quiet: true,
            verbosity: 2,
            filter: Some("peerswap_lnd=trace".to_string()),
            json: false,
        };
        assert_eq!(args.env_filter().to_string(), "error");
    }

    #[test]
    fn test_verbosity_applies_over_env() {
        let args = LogArgs {
            verbosity: 2,
            ..Default::default()
        };
        assert_eq!(args.verbosity_level(), Some(LevelFilter::TRACE));
        assert!(args.env_filter().to_string().contains("trace"));
        assert_eq!(LogArgs::default().verbosity_level(), None);
    }

    #[test]
    fn test_custom_directives_are_added() {
        let args = LogArgs {
            filter: Some("peerswap_lnd=trace,not a directive".to_string()),
            ..Default::default()
        };
        assert!(args.env_filter().to_string().contains("peerswap_lnd=trace"));
    }
}
