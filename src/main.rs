use std::sync::Arc;
use std::time::Duration;

use scenesync::config::EngineConfig;
use scenesync::db;
use scenesync::error::now_ms;
use scenesync::services::lock::sweep_expired;
use scenesync::services::presence::{PresenceRegistry, spawn_presence_sweeper};
use scenesync::services::sync::resync;
use scenesync::state::SessionState;
use scenesync::store::{DocumentStore, InMemoryDocumentStore, PgDocumentStore, StoreError};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    if let Err(e) = dotenv {
        tracing::debug!(error = %e, "no .env file loaded");
    }

    let config = EngineConfig::from_env();
    let store: Arc<dyn DocumentStore> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = db::init_pool(&database_url).await?;
            tracing::info!("using postgres document store");
            Arc::new(PgDocumentStore::new(pool))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory document store");
            Arc::new(InMemoryDocumentStore::new())
        }
    };

    // This process has no user directory, so only age-based eviction applies.
    let presence = Arc::new(PresenceRegistry::new());
    let presence_sweeper = spawn_presence_sweeper(
        presence,
        config.presence_sweep_interval_ms,
        config.presence_stale_ms,
        |_| true,
    );

    tracing::info!(interval_ms = config.lock_sweep_interval_ms, "scenesync maintenance running");
    let mut interval = tokio::time::interval(Duration::from_millis(config.lock_sweep_interval_ms.max(1)));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = sweep_all(&store, &config).await {
                    tracing::warn!(error = %e, "maintenance: listing documents failed");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    presence_sweeper.abort();
    tracing::info!("scenesync maintenance stopped");
    Ok(())
}

/// Reclaim expired locks in every stored document.
async fn sweep_all(store: &Arc<dyn DocumentStore>, config: &EngineConfig) -> Result<(), StoreError> {
    for doc_id in store.list_documents().await? {
        let session = SessionState::new(store.clone(), doc_id, Uuid::nil(), *config);
        if let Err(e) = resync(&session).await {
            tracing::warn!(%doc_id, error = %e, "maintenance: resync failed");
            continue;
        }
        if let Err(e) = sweep_expired(&session, now_ms()).await {
            tracing::warn!(%doc_id, error = %e, "maintenance: lock sweep failed");
        }
    }
    Ok(())
}
