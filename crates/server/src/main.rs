use anyhow::Result;
use axum::serve;
use server::{create_app, AppState};
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use watch_core::{config::AppConfig, metrics, runtime::WatchRuntime};

/// Installs the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.logging.level.as_str();
        EnvFilter::new(format!("warn,watch_core={level},server={level}"))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;
    config.validate().map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

    init_logging(&config);
    info!("Starting upgrade watch server");
    debug!(
        registry_source = ?config.registry.source,
        refresh_interval_secs = config.refresh.interval_seconds,
        watch_list = !config.watch_list().is_empty(),
        "Configuration loaded"
    );

    let metrics_handle = config.metrics.enabled.then(metrics::install_recorder);

    let runtime = WatchRuntime::from_config(&config)?;
    let state = AppState::new(Arc::clone(runtime.scheduler()), metrics_handle, config.request_timeout());
    let app = create_app(state, &config);

    let addr = config.socket_addr().map_err(|e| anyhow::anyhow!("Invalid bind address: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Upgrade watch server listening");

    if let Err(e) = serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!(error = %e, "Server error occurred");
    }

    runtime.shutdown().await;
    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
