//! Startup wiring: configured backend, loaded registry, command handler.

use crate::commands::CommandHandler;
use crate::config::{Backend, Config};
use crate::quota::RoleTierQuota;
use anyhow::Context;
use lucky_draw_core::allocator::NumberAllocator;
use lucky_draw_core::persistence::EventRepository;
use lucky_draw_core::registry::EventRegistry;
use lucky_draw_core::snapshot::FileSnapshotStore;
use lucky_draw_postgres::PostgresEventRepository;
use std::sync::Arc;

/// Construct the configured persistence backend.
///
/// For `postgres` this connects and creates the tables if needed.
///
/// # Errors
///
/// Fails if the database is unreachable or the schema cannot be created.
pub async fn repository(config: &Config) -> anyhow::Result<Arc<dyn EventRepository>> {
    match config.storage.backend {
        Backend::Snapshot => {
            let path = &config.storage.snapshot_path;
            tracing::info!(path = %path.display(), "Using snapshot backend");
            Ok(Arc::new(FileSnapshotStore::new(path.clone())))
        }
        Backend::Postgres => {
            tracing::info!("Connecting to postgres...");
            let repository = PostgresEventRepository::connect(
                &config.postgres.url,
                config.postgres.max_connections,
                config.postgres.connect_timeout(),
            )
            .await
            .context("connecting to postgres")?;
            repository
                .migrate()
                .await
                .context("creating lucky draw schema")?;
            tracing::info!("Postgres backend ready");
            Ok(Arc::new(repository))
        }
    }
}

/// Load the registry from `repository` and wrap it in a command handler.
///
/// # Errors
///
/// Fails if the configuration is inconsistent or the stored state cannot be
/// loaded. Either is fatal: serving from a partial registry would let numbers
/// be claimed twice.
pub async fn handler(
    config: &Config,
    repository: Arc<dyn EventRepository>,
) -> anyhow::Result<CommandHandler> {
    let pool = config.number_pool()?;
    let registry = EventRegistry::load(repository, NumberAllocator::new(pool))
        .await
        .context("loading persisted events")?;
    let quotas = RoleTierQuota::new(config.draw.role_prefix.clone(), config.draw.max_tier);
    Ok(CommandHandler::new(Arc::new(registry), Arc::new(quotas)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn snapshot_config(path: &std::path::Path) -> Config {
        let vars: HashMap<&str, String> = HashMap::from([
            ("LUCKY_DRAW_SNAPSHOT_PATH", path.display().to_string()),
            ("LUCKY_DRAW_NUMBER_MAX", "20".to_string()),
        ]);
        Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    #[tokio::test]
    async fn missing_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = snapshot_config(&dir.path().join("events.json"));

        let repository = repository(&config).await.unwrap();
        assert_eq!(repository.backend(), "snapshot");

        let handler = handler(&config, repository).await.unwrap();
        assert!(handler.registry().list_events().await.is_empty());
        assert_eq!(handler.registry().allocator().pool().max(), 20);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, b"{\"broken\": ").unwrap();
        let config = snapshot_config(&path);

        let repository = repository(&config).await.unwrap();
        assert!(handler(&config, repository).await.is_err());
    }
}
