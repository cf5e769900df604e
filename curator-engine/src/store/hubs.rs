//! Hub, Work and Edition persistence
//!
//! The catalogue view is loaded in two queries to avoid N+1: one composite
//! join for hubs with their works and editions, then a single IN-list query
//! for canonical values over the collected entity ids.

use super::{parse_timestamp, parse_uuid, StoreResult};
use crate::models::{CanonicalPair, Edition, Hub, HubView, MediaType, Work, WorkView};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

pub async fn insert_hub(pool: &SqlitePool, hub: &Hub) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO hubs (id, universe_id, display_name, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(hub.id.to_string())
    .bind(hub.universe_id.map(|u| u.to_string()))
    .bind(&hub.display_name)
    .bind(hub.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Case-insensitive lookup on display_name
///
/// Returns the oldest matching hub when collisions exist, so repeated
/// ingestions converge on one hub instead of ping-ponging.
pub async fn find_hub_by_display_name(
    pool: &SqlitePool,
    display_name: &str,
) -> StoreResult<Option<Hub>> {
    let row = sqlx::query(
        r#"
        SELECT id, universe_id, display_name, created_at
        FROM hubs
        WHERE display_name = ? COLLATE NOCASE
        ORDER BY created_at
        LIMIT 1
        "#,
    )
    .bind(display_name)
    .fetch_optional(pool)
    .await?;

    row.map(hub_from_row).transpose()
}

pub async fn insert_work(pool: &SqlitePool, work: &Work) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO works (id, hub_id, media_type, sequence_index, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(work.id.to_string())
    .bind(work.hub_id.map(|h| h.to_string()))
    .bind(work.media_type.as_str())
    .bind(work.sequence_index)
    .bind(work.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_edition(pool: &SqlitePool, edition: &Edition) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO editions (id, work_id, format_label, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(edition.id.to_string())
    .bind(edition.work_id.to_string())
    .bind(&edition.format_label)
    .bind(edition.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Ids of every hub in the catalogue, oldest first
pub async fn list_hub_ids(pool: &SqlitePool) -> StoreResult<Vec<Uuid>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT id FROM hubs ORDER BY created_at")
            .fetch_all(pool)
            .await?;

    rows.iter().map(|(id,)| parse_uuid(id)).collect()
}

/// Works currently in a hub, optionally excluding one work id
pub async fn works_in_hub(
    pool: &SqlitePool,
    hub_id: Uuid,
    exclude: Option<Uuid>,
) -> StoreResult<Vec<Work>> {
    let rows = sqlx::query(
        r#"
        SELECT id, hub_id, media_type, sequence_index, created_at
        FROM works
        WHERE hub_id = ?
        ORDER BY created_at
        "#,
    )
    .bind(hub_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut works = Vec::with_capacity(rows.len());
    for row in rows {
        let work = work_from_row(row)?;
        if Some(work.id) == exclude {
            continue;
        }
        works.push(work);
    }

    Ok(works)
}

/// Full catalogue view: hubs with works and canonical values
///
/// Two-query load:
/// 1. hubs LEFT JOIN works LEFT JOIN editions, ordered by creation
/// 2. one IN-list query for canonical values over the collected work and
///    edition ids (claims are scoped to editions during ingestion; values
///    found on either level surface on the work)
pub async fn list_hubs(pool: &SqlitePool) -> StoreResult<Vec<HubView>> {
    let rows = sqlx::query(
        r#"
        SELECT h.id            AS hub_id,
               h.display_name  AS display_name,
               h.created_at    AS hub_created_at,
               w.id            AS work_id,
               w.media_type    AS media_type,
               w.sequence_index AS sequence_index,
               e.id            AS edition_id
        FROM hubs h
        LEFT JOIN works w ON w.hub_id = h.id
        LEFT JOIN editions e ON e.work_id = w.id
        ORDER BY h.created_at, w.created_at, e.created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut hubs: Vec<HubView> = Vec::new();
    // entity id (work or edition) → index of owning work in (hub_idx, work_idx)
    let mut entity_owner: HashMap<String, (usize, usize)> = HashMap::new();

    for row in rows {
        let hub_id: String = row.get("hub_id");
        let work_id: Option<String> = row.get("work_id");
        let edition_id: Option<String> = row.get("edition_id");

        let hub_idx = match hubs.iter().position(|h| h.id.to_string() == hub_id) {
            Some(idx) => idx,
            None => {
                let created_at: String = row.get("hub_created_at");
                hubs.push(HubView {
                    id: parse_uuid(&hub_id)?,
                    display_name: row.get("display_name"),
                    created_at: parse_timestamp(&created_at)?,
                    works: Vec::new(),
                });
                hubs.len() - 1
            }
        };

        if let Some(work_id) = work_id {
            let work_idx = match hubs[hub_idx]
                .works
                .iter()
                .position(|w| w.id.to_string() == work_id)
            {
                Some(idx) => idx,
                None => {
                    let media_type: String = row.get("media_type");
                    hubs[hub_idx].works.push(WorkView {
                        id: parse_uuid(&work_id)?,
                        media_type: MediaType::parse(&media_type),
                        sequence_index: row.get("sequence_index"),
                        canonical_values: Vec::new(),
                    });
                    hubs[hub_idx].works.len() - 1
                }
            };

            entity_owner.insert(work_id, (hub_idx, work_idx));
            if let Some(edition_id) = edition_id {
                entity_owner.insert(edition_id, (hub_idx, work_idx));
            }
        }
    }

    if !entity_owner.is_empty() {
        let placeholders = vec!["?"; entity_owner.len()].join(", ");
        let sql = format!(
            "SELECT entity_id, key, value FROM canonical_values \
             WHERE entity_id IN ({placeholders}) ORDER BY entity_id, key"
        );

        let mut query = sqlx::query(&sql);
        for entity_id in entity_owner.keys() {
            query = query.bind(entity_id.clone());
        }

        for row in query.fetch_all(pool).await? {
            let entity_id: String = row.get("entity_id");
            if let Some(&(hub_idx, work_idx)) = entity_owner.get(&entity_id) {
                hubs[hub_idx].works[work_idx].canonical_values.push(CanonicalPair {
                    key: row.get("key"),
                    value: row.get("value"),
                });
            }
        }
    }

    Ok(hubs)
}

/// Case-insensitive substring search over hub display names
pub async fn search_hubs(pool: &SqlitePool, query: &str, limit: i64) -> StoreResult<Vec<Hub>> {
    let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));

    let rows = sqlx::query(
        r#"
        SELECT id, universe_id, display_name, created_at
        FROM hubs
        WHERE display_name LIKE ? ESCAPE '\'
        ORDER BY created_at
        LIMIT ?
        "#,
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(hub_from_row).collect()
}

fn hub_from_row(row: sqlx::sqlite::SqliteRow) -> StoreResult<Hub> {
    let id: String = row.get("id");
    let universe_id: Option<String> = row.get("universe_id");
    let created_at: String = row.get("created_at");

    Ok(Hub {
        id: parse_uuid(&id)?,
        universe_id: universe_id.as_deref().map(parse_uuid).transpose()?,
        display_name: row.get("display_name"),
        created_at: parse_timestamp(&created_at)?,
    })
}

fn work_from_row(row: sqlx::sqlite::SqliteRow) -> StoreResult<Work> {
    let id: String = row.get("id");
    let hub_id: Option<String> = row.get("hub_id");
    let media_type: String = row.get("media_type");
    let created_at: String = row.get("created_at");

    Ok(Work {
        id: parse_uuid(&id)?,
        hub_id: hub_id.as_deref().map(parse_uuid).transpose()?,
        media_type: MediaType::parse(&media_type),
        sequence_index: row.get("sequence_index"),
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{self, claims};
    use chrono::Utc;

    async fn seed_hub_with_work(pool: &SqlitePool, name: &str) -> (Hub, Work, Edition) {
        let hub = Hub::new(name);
        insert_hub(pool, &hub).await.unwrap();

        let work = Work {
            id: Uuid::new_v4(),
            hub_id: Some(hub.id),
            media_type: MediaType::Epub,
            sequence_index: None,
            created_at: Utc::now(),
        };
        insert_work(pool, &work).await.unwrap();

        let edition = Edition {
            id: Uuid::new_v4(),
            work_id: work.id,
            format_label: Some("epub".to_string()),
            created_at: Utc::now(),
        };
        insert_edition(pool, &edition).await.unwrap();

        (hub, work, edition)
    }

    #[tokio::test]
    async fn test_find_hub_case_insensitive() {
        let pool = store::init_memory_store().await.unwrap();
        let hub = Hub::new("Dune");
        insert_hub(&pool, &hub).await.unwrap();

        let found = find_hub_by_display_name(&pool, "dUnE").await.unwrap();
        assert_eq!(found.unwrap().id, hub.id);

        let missing = find_hub_by_display_name(&pool, "Hyperion").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_list_hubs_two_query_load() {
        let pool = store::init_memory_store().await.unwrap();
        let (_, work, edition) = seed_hub_with_work(&pool, "Dune").await;
        seed_hub_with_work(&pool, "Hyperion").await;

        claims::upsert_canonical(&pool, edition.id, "title", "Dune", Utc::now())
            .await
            .unwrap();
        claims::upsert_canonical(&pool, edition.id, "isbn", "9780441013593", Utc::now())
            .await
            .unwrap();

        let hubs = list_hubs(&pool).await.unwrap();
        assert_eq!(hubs.len(), 2);

        let dune = hubs.iter().find(|h| h.display_name == "Dune").unwrap();
        assert_eq!(dune.works.len(), 1);
        assert_eq!(dune.works[0].id, work.id);
        assert_eq!(dune.works[0].canonical_values.len(), 2);
    }

    #[tokio::test]
    async fn test_hub_without_works_appears_empty() {
        let pool = store::init_memory_store().await.unwrap();
        insert_hub(&pool, &Hub::new("Lonely")).await.unwrap();

        let hubs = list_hubs(&pool).await.unwrap();
        assert_eq!(hubs.len(), 1);
        assert!(hubs[0].works.is_empty());
    }

    #[tokio::test]
    async fn test_works_in_hub_excludes_self() {
        let pool = store::init_memory_store().await.unwrap();
        let (hub, work, _) = seed_hub_with_work(&pool, "Dune").await;

        let other = Work {
            id: Uuid::new_v4(),
            hub_id: Some(hub.id),
            media_type: MediaType::Audiobook,
            sequence_index: None,
            created_at: Utc::now(),
        };
        insert_work(&pool, &other).await.unwrap();

        let members = works_in_hub(&pool, hub.id, Some(work.id)).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, other.id);
    }

    #[tokio::test]
    async fn test_search_hubs_limit() {
        let pool = store::init_memory_store().await.unwrap();
        for i in 0..25 {
            insert_hub(&pool, &Hub::new(format!("Series Volume {i}")))
                .await
                .unwrap();
        }

        let hits = search_hubs(&pool, "series", 20).await.unwrap();
        assert_eq!(hits.len(), 20);

        let none = search_hubs(&pool, "zzz", 20).await.unwrap();
        assert!(none.is_empty());
    }
}
