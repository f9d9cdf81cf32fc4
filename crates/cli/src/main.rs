//! # Scout Sync CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证 (含环境变量覆盖)
//! - 单次同步运行
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{load_blueprint, run_info, run_sync, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run(args) => {
            // the log file location lives in the config
            let blueprint = match load_blueprint(&cli) {
                Ok(blueprint) => blueprint,
                Err(e) => {
                    init_logging(&cli, None)?;
                    tracing::error!(error = %format!("{e:#}"), "Command failed");
                    return Err(e);
                }
            };
            init_logging(&cli, blueprint.common.log_file.clone())?;
            info!(version = env!("CARGO_PKG_VERSION"), "Scout Sync starting");
            run_sync(args, blueprint).await
        }
        Commands::Validate(args) => {
            init_logging(&cli, None)?;
            run_validate(&cli, args)
        }
        Commands::Info(args) => {
            init_logging(&cli, None)?;
            run_info(&cli, args)
        }
    };

    if let Err(ref e) = result {
        tracing::error!(error = %format!("{e:#}"), "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli, log_file: Option<std::path::PathBuf>) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: cli.metrics_port,
        default_log_level: default_log_level.to_string(),
        log_file,
    })
}
