//! One-shot cache administration commands

use anyhow::{bail, Context};

use crate::api::middleware::{invalidate_cache, invalidate_endpoint_cache, invalidate_user_cache};
use crate::config::AppConfig;
use crate::infrastructure::logging;
use crate::infrastructure::services::CacheService;

use super::Command;

/// Runs an administration command against the configured store
pub async fn run(command: Command) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    logging::init_logging(&config.logging);

    let cache = crate::create_cache_service(&config).await;

    let result = execute(&cache, command).await;
    cache.disconnect().await;

    result
}

async fn execute(cache: &CacheService, command: Command) -> anyhow::Result<()> {
    if let Command::Stats = command {
        let stats = cache.get_stats().await;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    if !cache.is_connected() {
        bail!("cache store is not reachable");
    }

    match command {
        Command::Invalidate { pattern } => {
            let deleted = invalidate_cache(cache, &pattern).await;
            println!("Deleted {} entries matching {}", deleted, pattern);
        }
        Command::InvalidateUser { user_id } => {
            let deleted = invalidate_user_cache(cache, &user_id).await;
            println!("Deleted {} entries for user {}", deleted, user_id);
        }
        Command::InvalidateEndpoint { endpoint } => {
            let deleted = invalidate_endpoint_cache(cache, &endpoint).await;
            println!("Deleted {} entries under {}", deleted, endpoint);
        }
        Command::Flush => {
            if !cache.clear().await {
                bail!("failed to flush cache");
            }
            println!("Cache flushed");
        }
        Command::Serve | Command::Stats => bail!("not a cache administration command"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::cache::MockCache;

    async fn connected(mock: MockCache) -> (CacheService, Arc<MockCache>) {
        let mock = Arc::new(mock);
        let cache = CacheService::with_backend(mock.clone());
        cache.connect().await;
        (cache, mock)
    }

    #[tokio::test]
    async fn test_invalidate_endpoint_command() {
        let (cache, mock) = connected(
            MockCache::new()
                .with_raw_entry("GET:anonymous:/api/products", "1")
                .with_raw_entry("GET:u1:/api/orders", "2"),
        )
        .await;

        execute(
            &cache,
            Command::InvalidateEndpoint {
                endpoint: "/api/products".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(mock.keys(), vec!["GET:u1:/api/orders".to_string()]);
    }

    #[tokio::test]
    async fn test_flush_command() {
        let (cache, mock) = connected(MockCache::new().with_raw_entry("a", "1")).await;

        execute(&cache, Command::Flush).await.unwrap();

        assert!(mock.keys().is_empty());
    }

    #[tokio::test]
    async fn test_commands_fail_when_disconnected() {
        let cache = CacheService::with_backend(Arc::new(MockCache::new()));

        assert!(execute(&cache, Command::Flush).await.is_err());
        assert!(execute(&cache, Command::Stats).await.is_ok());
    }
}
