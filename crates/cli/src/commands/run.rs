//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::SyncBlueprint;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_sync(args: &RunArgs, mut blueprint: SyncBlueprint) -> Result<()> {
    let stores = match (args.from, args.to) {
        (Some(from), Some(to)) => Some((from, to)),
        (None, None) if args.refresh_credentials => None,
        (None, None) => {
            return Err(CliError::usage(
                "nothing to do: pass --from and --to, or --refresh-credentials",
            )
            .into())
        }
        _ => return Err(CliError::usage("--from and --to must be given together").into()),
    };

    if args.refresh_credentials {
        let refreshed =
            providers::refresh_credentials(&blueprint.google, blueprint.request_timeout())
                .await
                .context("Failed to refresh Google credentials")?;
        info!("Google credentials refreshed");

        if stores.is_none() {
            let json = serde_json::to_string_pretty(&refreshed)
                .context("Failed to serialize credentials")?;
            println!("{json}");
            return Ok(());
        }
        blueprint.google = refreshed;
    }

    let Some((from, to)) = stores else {
        return Ok(());
    };

    if args.simulate {
        info!("Simulate mode: changes are logged, not written");
        blueprint.common.simulate = true;
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        from,
        to,
    });

    tokio::select! {
        result = pipeline.run() => {
            let summary = result?;
            info!(
                changes = summary.report.changes(),
                duration_secs = summary.report.elapsed.as_secs_f64(),
                "Sync completed successfully"
            );
            summary.print_summary();
            Ok(())
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, abandoning run");
            Err(CliError::Interrupted.into())
        }
    }
}

/// Ctrl+C and SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
