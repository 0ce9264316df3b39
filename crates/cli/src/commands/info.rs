//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::RelayBlueprint;
use dispatcher::RequestTemplate;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    target: TargetInfo,
    retry: RetryInfo,
    pool: PoolInfo,
}

#[derive(Serialize)]
struct TargetInfo {
    method: String,
    context_path: String,
    /// Resolved request URL per host, in round-robin order
    urls: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, Vec<String>>,
    success_codes: Vec<u16>,
}

#[derive(Serialize)]
struct RetryInfo {
    backoff_after: u32,
    backoff_ms: u64,
    max_attempts: Option<u32>,
    max_elapsed_ms: Option<u64>,
    unbounded: bool,
}

#[derive(Serialize)]
struct PoolInfo {
    max_idle_per_host: usize,
    idle_timeout_secs: u64,
    connect_timeout_ms: u64,
    request_timeout_ms: Option<u64>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &RelayBlueprint) -> Result<ConfigInfo> {
    let target = &blueprint.target;
    let template = RequestTemplate::new(
        &target.hosts,
        &target.context_path,
        &target.method,
        &target.headers,
    )
    .context("Invalid request target")?;

    let urls = (0..target.hosts.len())
        .filter_map(|i| template.target(i).map(|url| url.to_string()))
        .collect();

    Ok(ConfigInfo {
        version: format!("{:?}", blueprint.version),
        target: TargetInfo {
            method: template.method().to_string(),
            context_path: target.context_path.clone(),
            urls,
            headers: target.headers.clone(),
            success_codes: target.success_codes.clone(),
        },
        retry: RetryInfo {
            backoff_after: blueprint.retry.backoff_after,
            backoff_ms: blueprint.retry.backoff_ms,
            max_attempts: blueprint.retry.max_attempts,
            max_elapsed_ms: blueprint.retry.max_elapsed_ms,
            unbounded: blueprint.retry.is_unbounded(),
        },
        pool: PoolInfo {
            max_idle_per_host: blueprint.pool.max_idle_per_host,
            idle_timeout_secs: blueprint.pool.idle_timeout_secs,
            connect_timeout_ms: blueprint.pool.connect_timeout_ms,
            request_timeout_ms: blueprint.pool.request_timeout_ms,
        },
    })
}

fn print_config_info(info: &ConfigInfo) {
    println!("gzrelay configuration ({})\n", info.version);

    let target = &info.target;
    println!("Target");
    println!("   ├─ Request: {} {}", target.method, target.context_path);
    println!("   ├─ Success codes: {:?}", target.success_codes);
    if !target.headers.is_empty() {
        println!("   ├─ Headers:");
        for (name, values) in &target.headers {
            println!("   │    {}: {}", name, values.join(", "));
        }
    }
    println!("   └─ Hosts ({}):", target.urls.len());
    for (i, url) in target.urls.iter().enumerate() {
        let prefix = if i == target.urls.len() - 1 { "└─" } else { "├─" };
        println!("        {} [{}] {}", prefix, i, url);
    }

    let retry = &info.retry;
    println!("\nRetry");
    println!(
        "   ├─ Backoff: {}ms after {} consecutive failures",
        retry.backoff_ms, retry.backoff_after
    );
    println!(
        "   ├─ Max attempts: {}",
        retry
            .max_attempts
            .map_or_else(|| "unlimited".to_string(), |n| n.to_string())
    );
    println!(
        "   └─ Max elapsed: {}",
        retry
            .max_elapsed_ms
            .map_or_else(|| "unlimited".to_string(), |ms| format!("{}ms", ms))
    );

    let pool = &info.pool;
    println!("\nConnection pool");
    println!("   ├─ Idle per host: {}", pool.max_idle_per_host);
    println!("   ├─ Idle timeout: {}s", pool.idle_timeout_secs);
    println!("   ├─ Connect timeout: {}ms", pool.connect_timeout_ms);
    println!(
        "   └─ Request timeout: {}",
        pool.request_timeout_ms
            .map_or_else(|| "none".to_string(), |ms| format!("{}ms", ms))
    );

    println!();
}
