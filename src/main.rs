//! TreeHub reconciler: periodically compares every owner's namespace index
//! with the owner's file tree, and optionally repairs the index.

use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use treehub_core::config::AppConfig;
use treehub_core::error::AppError;
use treehub_service::ServiceContext;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Reconciler error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    match std::env::var("TREEHUB_CONFIG") {
        Ok(path) => AppConfig::load_file(&path),
        Err(_) => {
            let env = std::env::var("TREEHUB_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main reconciler loop
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting TreeHub reconciler v{}", env!("CARGO_PKG_VERSION"));

    if !config.reconcile.enabled {
        tracing::info!("Reconciliation is disabled in configuration; exiting");
        return Ok(());
    }

    // ── Step 1: Database, migrations and physical store ──────────
    let (ctx, db) = ServiceContext::connect(&config).await?;

    // ── Step 2: Shutdown wiring ──────────────────────────────────
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, finishing current pass...");
        let _ = shutdown_tx.send(true);
    });

    // ── Step 3: Periodic passes ──────────────────────────────────
    let period = Duration::from_secs(config.reconcile.interval_seconds.max(1));
    let mut ticker = tokio::time::interval(period);
    tracing::info!(
        interval_seconds = period.as_secs(),
        repair = config.reconcile.repair,
        "Reconciler running"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_pass(&ctx, config.reconcile.repair).await;
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    // ── Step 4: Graceful shutdown ────────────────────────────────
    db.close().await;
    tracing::info!("TreeHub reconciler stopped");
    Ok(())
}

/// Reconcile every owner once, logging a summary
async fn run_pass(ctx: &ServiceContext, repair: bool) {
    match ctx.reconciler.run_all(repair).await {
        Ok(reports) => {
            let diverged = reports.iter().filter(|r| !r.is_consistent()).count();
            tracing::info!(owners = reports.len(), diverged, repair, "Reconciliation pass complete");
        }
        Err(e) => tracing::error!(error = %e, "Reconciliation pass failed"),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
