// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

use registry_service::config::Config;
use registry_service::error::ServiceError;
use registry_service::service::RegistryService;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    let config = Config::load()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting registry-store");
    info!("Database path: {}", config.database.path.display());

    let service = RegistryService::open(&config).await?;
    let cancel = CancellationToken::new();

    if let Some(seed) = &config.seed_file {
        service.import_seed(seed, &cancel).await?;
    }

    let versions = service.count_versions(&cancel).await?;
    let stats = service.pool_stats();
    info!(
        "{versions} server versions stored; pool idle={} active={} capacity={}",
        stats.idle, stats.active, stats.capacity
    );

    shutdown_signal().await;
    info!("Received shutdown signal");

    cancel.cancel();
    service.close();

    info!("registry-store stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
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
