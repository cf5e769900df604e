//! Provider registrations
//!
//! Providers are declared in configuration and mirrored into the catalogue
//! at startup so scoring reads weights from one place. Field-weight
//! override maps are stored as JSON text.

use super::{parse_uuid, StoreResult};
use crate::models::ProviderRegistration;
use curator_common::config::ProviderConfig;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

/// Mirror configured providers into the catalogue
///
/// Existing registrations keep their id; weights and the enabled flag
/// follow the configuration.
pub async fn sync_providers(pool: &SqlitePool, configured: &[ProviderConfig]) -> StoreResult<()> {
    for provider in configured {
        let field_weights = serde_json::to_string(&provider.field_weights)
            .map_err(|e| super::StoreError::InvalidRow(format!("field_weights: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO providers (id, name, enabled, default_weight, field_weights)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                enabled = excluded.enabled,
                default_weight = excluded.default_weight,
                field_weights = excluded.field_weights
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&provider.name)
        .bind(provider.enabled as i64)
        .bind(provider.weight)
        .bind(field_weights)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Load all enabled provider registrations
pub async fn list_enabled(pool: &SqlitePool) -> StoreResult<Vec<ProviderRegistration>> {
    let rows = sqlx::query(
        "SELECT id, name, enabled, default_weight, field_weights FROM providers \
         WHERE enabled = 1 ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let id: String = row.get("id");
            let enabled: i64 = row.get("enabled");
            let field_weights: String = row.get("field_weights");

            Ok(ProviderRegistration {
                id: parse_uuid(&id)?,
                name: row.get("name"),
                enabled: enabled != 0,
                default_weight: row.get("default_weight"),
                field_weights: serde_json::from_str(&field_weights).unwrap_or_default(),
            })
        })
        .collect()
}

/// Provider weight maps in the shape the scoring engine consumes
///
/// Returns (provider → default weight, provider → field → weight).
pub async fn load_weight_maps(
    pool: &SqlitePool,
) -> StoreResult<(HashMap<String, f64>, HashMap<String, HashMap<String, f64>>)> {
    let registrations = list_enabled(pool).await?;

    let mut weights = HashMap::new();
    let mut field_weights = HashMap::new();

    for reg in registrations {
        weights.insert(reg.name.clone(), reg.default_weight);
        if !reg.field_weights.is_empty() {
            field_weights.insert(reg.name, reg.field_weights);
        }
    }

    Ok((weights, field_weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;
    use curator_common::config::{ProviderConfig, ProviderDomain};

    fn provider(name: &str, weight: f64, enabled: bool) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            version: "1.0".to_string(),
            enabled,
            weight,
            domain: ProviderDomain::Universal,
            capability_tags: vec![],
            field_weights: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_sync_and_load_weights() {
        let pool = store::init_memory_store().await.unwrap();

        let mut external = provider("openlibrary", 0.7, true);
        external
            .field_weights
            .insert("isbn".to_string(), 0.95);

        sync_providers(
            &pool,
            &[provider("local-filesystem", 1.0, true), external],
        )
        .await
        .unwrap();

        let (weights, field_weights) = load_weight_maps(&pool).await.unwrap();
        assert_eq!(weights.get("local-filesystem"), Some(&1.0));
        assert_eq!(weights.get("openlibrary"), Some(&0.7));
        assert_eq!(
            field_weights.get("openlibrary").and_then(|m| m.get("isbn")),
            Some(&0.95)
        );
    }

    #[tokio::test]
    async fn test_disabled_providers_are_excluded() {
        let pool = store::init_memory_store().await.unwrap();
        sync_providers(&pool, &[provider("dormant", 0.5, false)])
            .await
            .unwrap();

        let (weights, _) = load_weight_maps(&pool).await.unwrap();
        assert!(weights.is_empty());
    }

    #[tokio::test]
    async fn test_resync_keeps_provider_id() {
        let pool = store::init_memory_store().await.unwrap();
        sync_providers(&pool, &[provider("local-filesystem", 1.0, true)])
            .await
            .unwrap();
        let before = list_enabled(&pool).await.unwrap();

        sync_providers(&pool, &[provider("local-filesystem", 0.9, true)])
            .await
            .unwrap();
        let after = list_enabled(&pool).await.unwrap();

        assert_eq!(before[0].id, after[0].id);
        assert_eq!(after[0].default_weight, 0.9);
    }
}
