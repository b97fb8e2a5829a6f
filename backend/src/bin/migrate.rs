//! One-shot schema bootstrap.
//!
//! Connects with the same environment settings as the server, applies the
//! idempotent schema, releases the pools, and exits.

use std::process::ExitCode;

use mockable::DefaultEnv;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use birthday::outbound::persistence::{ConnectionManager, DatabaseSettings};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = match DatabaseSettings::from_env(&DefaultEnv::new()) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "invalid database configuration");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let manager = ConnectionManager::new(&settings);
    let outcome = manager.initialize(&cancel).await;
    if let Err(e) = manager.close().await {
        warn!(error = %e, "failed to release database pools");
    }

    match outcome {
        Ok(()) => {
            info!("schema is up to date");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "schema bootstrap failed");
            ExitCode::FAILURE
        }
    }
}
