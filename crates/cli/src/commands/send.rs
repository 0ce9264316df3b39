//! `send` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::RelayBlueprint;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::SendArgs;
use crate::error::CliError;
use crate::relay::{PayloadSource, Relay, RelayConfig};

/// Execute the `send` command
pub async fn run_send(args: &SendArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args)?;

    info!(
        hosts = blueprint.target.hosts.len(),
        path = %blueprint.target.context_path,
        method = %blueprint.target.method,
        max_attempts = ?blueprint.retry.max_attempts,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let relay_config = RelayConfig {
        blueprint,
        payloads: PayloadSource::from_args(&args.payloads),
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let relay = Relay::new(relay_config);
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting relay...");

    tokio::select! {
        result = relay.run() => {
            let stats = result.context("Relay execution failed")?;
            info!(
                delivered = stats.deliveries.delivered,
                failed = stats.failed(),
                duration_secs = stats.duration.as_secs_f64(),
                "Relay finished"
            );
            stats.print_summary();

            if stats.failed() > 0 {
                return Err(CliError::Undelivered {
                    failed: stats.failed(),
                    total: stats.total(),
                }
                .into());
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping relay...");
        }
    }

    Ok(())
}

/// Apply command-line overrides, then re-validate
fn apply_overrides(blueprint: &mut RelayBlueprint, args: &SendArgs) -> Result<(), CliError> {
    if !args.hosts.is_empty() {
        info!(hosts = ?args.hosts, "Overriding host list from CLI");
        blueprint.target.hosts = args.hosts.clone();
    }
    if let Some(max_attempts) = args.max_attempts {
        info!(max_attempts, "Overriding max attempts from CLI");
        blueprint.retry.max_attempts = Some(max_attempts);
    }

    ConfigLoader::validate(blueprint).map_err(|e| CliError::config_validation(e.to_string()))
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &RelayBlueprint) {
    let target = &blueprint.target;
    println!("\n=== Configuration Summary ===\n");
    println!("Target: {} {}", target.method, target.context_path);
    println!("Hosts ({}):", target.hosts.len());
    for host in &target.hosts {
        println!("  - {}", host);
    }
    println!("Success codes: {:?}", target.success_codes);

    let retry = &blueprint.retry;
    println!("\nRetry:");
    println!(
        "  Backoff: {}ms after {} failures",
        retry.backoff_ms, retry.backoff_after
    );
    match (retry.max_attempts, retry.max_elapsed_ms) {
        (None, None) => println!("  Limit: none (retry until delivered)"),
        (attempts, elapsed) => {
            if let Some(n) = attempts {
                println!("  Max attempts: {}", n);
            }
            if let Some(ms) = elapsed {
                println!("  Max elapsed: {}ms", ms);
            }
        }
    }
    println!();
}
