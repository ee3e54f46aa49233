//! Proxygate - Entry Point
//!
//! Starts the pool refresher and the gateway server with graceful shutdown support.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use proxygate::config::LogConfig;
use proxygate::gateway::{GatewayServer, StaticCredentials};
use proxygate::pool::{
    CandidateFeed, FileFeed, HttpProbe, PoolManager, PoolRefresher, ProbeConfig, ProxyPool,
    StaticFeed,
};
use proxygate::shutdown::ShutdownHandle;
use proxygate::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    init_tracing(&config.log);
    info!("Starting Proxygate");

    // Build the pool and its refresher
    let pool = Arc::new(ProxyPool::new());
    let probe = HttpProbe::new(ProbeConfig {
        probe_url: config.pool.probe_url.clone(),
        timeout: config.pool.probe_timeout,
    });
    let manager = Arc::new(PoolManager::new(pool.clone(), Arc::new(probe)));

    let feed: Arc<dyn CandidateFeed> = match &config.pool.candidates_file {
        Some(path) => {
            info!("Reading candidates from {}", path.display());
            Arc::new(FileFeed::new(path.clone()))
        }
        None => {
            if config.pool.candidates.is_empty() {
                warn!("No proxy candidates configured; every request will fail with 502");
            }
            Arc::new(StaticFeed::new(config.pool.candidates.clone()))
        }
    };
    let refresher = PoolRefresher::new(manager, feed, config.pool.refresh_interval);

    // Create gateway server
    let credentials = Arc::new(StaticCredentials::new(
        config.gateway.auth_username.clone(),
        config.gateway.auth_password.clone(),
    ));
    let server = GatewayServer::new(config.gateway.clone(), pool, credentials)
        .context("Failed to create gateway server")?;

    // Bind before starting tasks
    let listener = server
        .bind()
        .await
        .with_context(|| format!("Failed to bind gateway listener on {}", config.gateway_addr()))?;

    // Start tasks
    let shutdown = ShutdownHandle::new();

    let refresher_shutdown = shutdown.subscribe();
    let refresher_task = tokio::spawn(async move {
        refresher.run(refresher_shutdown).await;
    });

    let server_shutdown = shutdown.subscribe();
    let mut server_task =
        tokio::spawn(async move { server.serve(listener, server_shutdown).await });

    info!("Gateway started on {}", config.gateway_addr());

    // Wait for shutdown signal, or for the server to stop on its own
    let server_exit = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            None
        }
        result = &mut server_task => {
            error!("Gateway server stopped unexpectedly");
            Some(result)
        }
    };

    shutdown.shutdown();

    // Wait for all tasks to complete
    let server_result = match server_exit {
        Some(result) => result,
        None => server_task.await,
    };
    if let Err(e) = refresher_task.await {
        error!("Pool refresher task failed: {}", e);
    }

    match server_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("Gateway server error: {}", e);
            return Err(e).context("Gateway server failed");
        }
        Err(e) => {
            error!("Gateway server task failed: {}", e);
            return Err(e).context("Gateway server task failed");
        }
    }

    info!("Proxygate stopped");
    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("proxygate={}", log.level).into());

    if log.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
