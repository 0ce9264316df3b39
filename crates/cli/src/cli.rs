//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// gzrelay - deliver gzip payloads to a pool of HTTP hosts
#[derive(Parser, Debug)]
#[command(
    name = "gzrelay",
    author,
    version,
    about = "Relay gzip payloads to one of several HTTP hosts",
    long_about = "Decompresses gzip payloads and delivers each one over HTTP to one of the\n\
                  configured hosts, failing over round-robin until a host accepts it."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "GZRELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "GZRELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deliver payloads to the configured hosts
    Send(SendArgs),

    /// Validate configuration file without sending
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `send` command
#[derive(Parser, Debug, Clone)]
pub struct SendArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "relay.toml", env = "GZRELAY_CONFIG")]
    pub config: PathBuf,

    /// gzip payload files, delivered in order ("-" or none reads stdin)
    #[arg(value_name = "PAYLOAD")]
    pub payloads: Vec<PathBuf>,

    /// Replace the configured host list (repeatable)
    #[arg(long = "host", value_name = "HOST[:PORT]")]
    pub hosts: Vec<String>,

    /// Give up on a payload after this many attempts
    #[arg(long, env = "GZRELAY_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Per-payload deadline in seconds (0 = wait until delivered)
    #[arg(long, default_value = "0", env = "GZRELAY_TIMEOUT")]
    pub timeout: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "GZRELAY_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without sending
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml", env = "GZRELAY_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml", env = "GZRELAY_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_args() {
        let cli = Cli::try_parse_from([
            "gzrelay",
            "-v",
            "send",
            "-c",
            "relay.json",
            "--host",
            "a:80",
            "--host",
            "b:81",
            "--max-attempts",
            "5",
            "one.gz",
            "-",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Send(args) => {
                assert_eq!(args.config, PathBuf::from("relay.json"));
                assert_eq!(args.hosts, vec!["a:80", "b:81"]);
                assert_eq!(args.max_attempts, Some(5));
                assert_eq!(
                    args.payloads,
                    vec![PathBuf::from("one.gz"), PathBuf::from("-")]
                );
                assert!(!args.dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["gzrelay", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }
}
