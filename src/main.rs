use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::info;

use ruleprov::api::routes::{create_router, AppState};
use ruleprov::config::Config;
use ruleprov::observability::{init_tracing, MetricsRegistry};
use ruleprov::provision::{ProvisionService, RuleProvisioner};
use ruleprov::reload::HttpReloader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();
    config.validate()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting ruleprov provisioning agent"
    );

    if let Some(ref rules_dir) = config.rules_dir {
        std::fs::create_dir_all(rules_dir)
            .with_context(|| format!("create rules directory {}", rules_dir.display()))?;
        info!(path = %rules_dir.display(), "Per-mixin rule files enabled");
    }
    if let Some(ref rule_file) = config.rule_file {
        info!(path = %rule_file.display(), "Fixed rule file enabled");
    }
    if let Some(ref prometheus_config) = config.prometheus_config {
        info!(
            path = %prometheus_config.display(),
            field = %config.rule_files_field,
            "Registering rule files in Prometheus config"
        );
    }

    let reloader = HttpReloader::new(&config.prometheus_reload_url, config.reload_timeout())?;
    info!(url = %config.prometheus_reload_url, "Reloads go to Prometheus");

    // Lock keys and registration entries both rely on canonical paths.
    let settings = config
        .provisioner_settings()
        .canonicalize()
        .context("resolve provisioning paths")?;

    let service = ProvisionService::new(
        RuleProvisioner::new(settings),
        Arc::new(reloader),
        Arc::new(MetricsRegistry::new()),
    );

    // Create application state
    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        max_body_bytes: config.max_body_bytes,
    });

    // Create router
    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    if config.graceful_shutdown {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        axum::serve(listener, app).await?;
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
