use anyhow::anyhow;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockwatch::app::schedules::ScheduleService;
use stockwatch::config::AppConfig;
use stockwatch::infra::db::Db;
use stockwatch::jobs::scheduler;
use stockwatch::{http, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;
    db.migrate("migrations").await?;

    let state = AppState::build(db, &config)?;

    match config.app_mode.as_str() {
        "api" => {
            let app: Router = http::router(state).layer(TraceLayer::new_for_http());
            let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
            tracing::info!("listening on {}", config.http_addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        "worker" => {
            tracing::info!("starting worker mode");
            let schedules = Arc::new(ScheduleService::new(state.db.clone()));
            let executor = Arc::new(state.alerts.clone());
            let poll_interval = Duration::from_secs(config.scheduler_poll_seconds.max(1));
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                shutdown_signal().await;
                tracing::info!("shutdown requested, finishing current schedules");
                let _ = shutdown_tx.send(true);
            });
            scheduler::run(schedules, executor, poll_interval, shutdown_rx).await?;
        }
        "scan-expiring" => {
            let result = state.alerts.check_expiring_products().await?;
            tracing::info!(result = %result, "expiring products scan finished");
            println!("{}", result);
        }
        "scan-low-stock" => {
            let result = state
                .alerts
                .check_low_stock(state.alerts.default_min_quantity())
                .await?;
            tracing::info!(result = %result, "low stock scan finished");
            println!("{}", result);
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
