mod telemetry;

use anyhow::Context;
use mr_digest::{Notifier, Settings, run_every};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file when one exists.
    let dotenv = dotenvy::dotenv();

    telemetry::init();
    if let Err(err) = dotenv {
        if !err.not_found() {
            warn!(error = %err, ".env file ignored");
        }
    }

    let settings = Settings::from_env().context("failed to load configuration")?;
    info!(
        config = %settings.config_path.display(),
        groups = settings.config.groups.len(),
        projects = settings.config.projects.len(),
        "configuration loaded"
    );

    let notifier = Notifier::from_settings(&settings).context("failed to create gitlab client")?;
    let schedule = settings.config.schedule.clone();

    if schedule.once {
        notifier.run_cycle().await;
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    info!(interval_secs = schedule.interval_secs, "scheduler started");
    let notifier = &notifier;
    run_every(
        schedule.interval(),
        schedule.run_on_start,
        shutdown,
        move || async move {
            notifier.run_cycle().await;
        },
    )
    .await;

    Ok(())
}

/// Cancels `token` on Ctrl+C, or SIGTERM on unix.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
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

    info!("shutdown signal received");
    token.cancel();
}
