//! # gzrelay CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 负载逐个投递与统计
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod relay;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_send, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Metrics exporter is started by `send` when requested
    let observability_config = ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        ..ObservabilityConfig::default()
    }
    .with_verbosity(cli.verbose, cli.quiet);
    observability::init_with_config(observability_config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "gzrelay starting");

    let result = match &cli.command {
        Commands::Send(args) => run_send(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
