use anyhow::Result;
use bekci_alerter::{AlertDispatcher, ResendClient};
use bekci_engine::RuleEngine;
use bekci_server::api;
use bekci_server::config::ServerConfig;
use bekci_server::scheduler::Scheduler;
use bekci_server::state::AppState;
use bekci_storage::Store;
use chrono::Utc;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install default CryptoProvider: {e:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("bekci_server=info".parse()?)
                .add_directive("bekci_storage=info".parse()?)
                .add_directive("bekci_engine=info".parse()?)
                .add_directive("bekci_alerter=info".parse()?)
                .add_directive("bekci_probe=info".parse()?),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/bekci.toml".to_string());
    let config = ServerConfig::load(&config_path)?;

    bekci_common::id::init(config.machine_id, config.node_id);

    tracing::info!(
        host = %config.host,
        port = config.port,
        db_path = %config.db_path,
        machine_id = config.machine_id,
        node_id = config.node_id,
        "bekci starting"
    );

    // Build components: store -> mailer -> dispatcher -> engine -> scheduler
    let store = Arc::new(Store::open(Path::new(&config.db_path)).await?);
    let mailer = Arc::new(ResendClient::new());
    let alerter = Arc::new(AlertDispatcher::new(store.clone(), mailer));
    let engine = Arc::new(RuleEngine::new(store.clone(), alerter.clone()));
    let scheduler = Arc::new(Scheduler::new(store.clone(), engine));

    scheduler.start().await;

    // Hourly cleanup: old results and alert history per history_days.
    let cleanup_store = store.clone();
    let cleanup_handle = tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(3600));
        loop {
            tick.tick().await;
            // Re-read each time so setting changes apply without restart.
            let history_days = cleanup_store.get_setting_i64("history_days", 90).await.max(1);
            match cleanup_store.purge_old_results(history_days).await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, history_days, "Purged old check results")
                }
                Err(e) => tracing::error!(error = %e, "Results cleanup failed"),
                _ => {}
            }
            match cleanup_store.purge_old_alert_history(history_days).await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, history_days, "Purged old alert history")
                }
                Err(e) => tracing::error!(error = %e, "Alert history cleanup failed"),
                _ => {}
            }
        }
    });

    // Re-alert tick: repeat still-firing alerts once alert_realert_s allows.
    let realert_alerter = alerter.clone();
    let realert_handle = tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(60));
        tick.tick().await;
        loop {
            tick.tick().await;
            realert_alerter.check_realerts().await;
        }
    });

    let state = AppState {
        store,
        scheduler: scheduler.clone(),
        alerter,
        start_time: Utc::now(),
    };
    let app = api::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "bekci started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
        })
        .await?;

    tracing::info!("Shutting down");
    scheduler.stop();
    cleanup_handle.abort();
    realert_handle.abort();
    tracing::info!("Shutdown complete");

    Ok(())
}
