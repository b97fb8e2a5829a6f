//! Backend entry-point: connects the database, wires the birthday and health
//! endpoints (plus `/metrics` when the `metrics` feature is on), and drains
//! the pools on shutdown.

mod server;

use std::process::ExitCode;
use std::sync::Arc;

use actix_web::web;
use mockable::{Clock, DefaultClock, DefaultEnv};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use birthday::domain::BirthdayService;
use birthday::inbound::http::health::HealthState;
use birthday::inbound::http::state::HttpState;
use birthday::outbound::persistence::{ConnectionManager, DatabaseSettings, PostgresUserRepository};
use server::{ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> ExitCode {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let env = DefaultEnv::new();
    let settings = match DatabaseSettings::from_env(&env) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "invalid database configuration");
            return ExitCode::FAILURE;
        }
    };
    let server_config = match ServerConfig::from_env(&env) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid server configuration");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let manager = Arc::new(ConnectionManager::new(&settings));
    if let Err(e) = manager.initialize(&shutdown).await {
        error!(error = %e, "database initialisation failed");
        return ExitCode::FAILURE;
    }

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let repository = Arc::new(PostgresUserRepository::new(manager.clone()));
    let service = Arc::new(BirthdayService::new(repository, clock.clone()));
    let http_state = web::Data::new(HttpState::new(service.clone(), service, clock.clone()));
    let health_state = web::Data::new(HealthState::new(
        manager.clone(),
        clock,
        server_config.environment(),
    ));

    #[cfg(feature = "metrics")]
    let server_config = server_config.with_metrics(match server::prometheus_metrics() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            warn!(error = %e, "metrics disabled");
            None
        }
    });

    let bind_addr = server_config.bind_addr();
    let status = match create_server(health_state.clone(), http_state, server_config) {
        Ok(server) => {
            info!(addr = %bind_addr, "listening");
            let handle = server.handle();
            let stopper = shutdown.clone();
            tokio::spawn(async move {
                stopper.cancelled().await;
                handle.stop(true).await;
            });
            match server.await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "server terminated with an error");
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            error!(error = %e, addr = %bind_addr, "failed to bind");
            ExitCode::FAILURE
        }
    };

    health_state.mark_unhealthy();
    if let Err(e) = manager.close().await {
        error!(error = %e, "failed to release database pools");
    }
    info!("shutdown complete");
    status
}

/// Cancel `token` on Ctrl-C or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
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
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C"),
        () = terminate => info!("received SIGTERM"),
    }
    token.cancel();
}
