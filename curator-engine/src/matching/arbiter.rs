//! Hub arbiter
//!
//! Decides how a work joins candidate hubs: for each candidate the arbiter
//! compares the work's canonical values against every member work and keeps
//! the hub's best similarity; the best hub overall determines the
//! disposition. The arbiter journals its verdict before returning and
//! never creates hubs or mutates works.

use super::matcher::{Disposition, IdentityMatcher, MatchThresholds};
use crate::store::{claims, hubs, journal, StoreResult};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// The arbiter's verdict for a proposed hub link
#[derive(Debug, Clone)]
pub struct ArbiterDecision {
    pub work_id: Uuid,
    /// None when the disposition is Rejected
    pub hub_id: Option<Uuid>,
    pub score: f64,
    pub disposition: Disposition,
    pub reason: String,
    pub decided_at: DateTime<Utc>,
}

/// Arbitrates work placement against candidate hubs
pub struct HubArbiter {
    matcher: IdentityMatcher,
    thresholds: MatchThresholds,
}

impl HubArbiter {
    pub fn new(thresholds: MatchThresholds) -> Self {
        Self {
            matcher: IdentityMatcher::new(),
            thresholds,
        }
    }

    /// Decide placement of `work_id` (with the given canonical values)
    /// against the candidate hubs
    ///
    /// Hubs already containing the work are skipped (circular-link guard).
    /// A journal row is written before returning.
    pub async fn decide(
        &self,
        pool: &SqlitePool,
        work_id: Uuid,
        work_values: &HashMap<String, String>,
        candidate_hubs: &[Uuid],
    ) -> StoreResult<ArbiterDecision> {
        let mut best_hub: Option<Uuid> = None;
        let mut best_score = 0.0_f64;
        let mut best_reason = String::new();

        for &hub_id in candidate_hubs {
            let members = hubs::works_in_hub(pool, hub_id, Some(work_id)).await?;

            // Circular-link guard: skip hubs the work already belongs to
            let already_member = {
                let all = hubs::works_in_hub(pool, hub_id, None).await?;
                all.iter().any(|w| w.id == work_id)
            };
            if already_member {
                debug!(%hub_id, %work_id, "Work already a member, skipping hub");
                continue;
            }

            let mut hub_score = 0.0_f64;
            let mut hub_reason = String::new();

            for member in &members {
                let member_values = claims::canonical_map_for_work(pool, member.id).await?;
                let outcome = self.matcher.compare(work_values, &member_values);

                if outcome.similarity > hub_score {
                    hub_score = outcome.similarity;
                    hub_reason = if outcome.hard {
                        format!(
                            "hard identifier match on {} with work {}",
                            outcome.matched_identifiers.join(", "),
                            member.id
                        )
                    } else {
                        format!(
                            "fuzzy similarity {:.3} with work {}",
                            outcome.similarity, member.id
                        )
                    };
                }
            }

            if hub_score > best_score {
                best_score = hub_score;
                best_hub = Some(hub_id);
                best_reason = hub_reason;
            }
        }

        let disposition = Disposition::from_similarity(best_score, &self.thresholds);

        let (hub_id, reason) = match disposition {
            Disposition::Rejected => {
                let reason = if best_reason.is_empty() {
                    "no candidate hub shares identifying metadata".to_string()
                } else {
                    format!("best candidate below review threshold: {best_reason}")
                };
                (None, reason)
            }
            _ => (best_hub, best_reason),
        };

        let event = match disposition {
            Disposition::AutoLinked => "WORK_AUTO_LINKED",
            Disposition::NeedsReview => "WORK_NEEDS_REVIEW",
            Disposition::Rejected => "WORK_LINK_REJECTED",
        };
        journal::log_event(pool, event, "work", work_id).await?;

        Ok(ArbiterDecision {
            work_id,
            hub_id,
            score: best_score,
            disposition,
            reason,
            decided_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Edition, Hub, MediaType, Work};
    use crate::store::{self, claims, hubs, journal};

    async fn seed_work_with_values(
        pool: &SqlitePool,
        hub_id: Uuid,
        values: &[(&str, &str)],
    ) -> Uuid {
        let work = Work {
            id: Uuid::new_v4(),
            hub_id: Some(hub_id),
            media_type: MediaType::Epub,
            sequence_index: None,
            created_at: Utc::now(),
        };
        hubs::insert_work(pool, &work).await.unwrap();

        let edition = Edition {
            id: Uuid::new_v4(),
            work_id: work.id,
            format_label: None,
            created_at: Utc::now(),
        };
        hubs::insert_edition(pool, &edition).await.unwrap();

        for (key, value) in values {
            claims::upsert_canonical(pool, edition.id, key, value, Utc::now())
                .await
                .unwrap();
        }

        work.id
    }

    fn value_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_isbn_short_circuit_auto_links() {
        let pool = store::init_memory_store().await.unwrap();

        let hub = Hub::new("Dune");
        hubs::insert_hub(&pool, &hub).await.unwrap();
        seed_work_with_values(
            &pool,
            hub.id,
            &[("title", "Dune"), ("isbn", "9780441013593")],
        )
        .await;

        let arbiter = HubArbiter::new(MatchThresholds::default());
        let incoming = Uuid::new_v4();
        let decision = arbiter
            .decide(
                &pool,
                incoming,
                &value_map(&[("title", "Dune Deluxe"), ("isbn", "978-0441013593")]),
                &[hub.id],
            )
            .await
            .unwrap();

        assert_eq!(decision.disposition, Disposition::AutoLinked);
        assert_eq!(decision.hub_id, Some(hub.id));
        assert_eq!(decision.score, 1.0);
        assert!(decision.reason.contains("isbn"));

        assert_eq!(
            journal::count_events(&pool, "WORK_AUTO_LINKED", incoming)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_unrelated_work_is_rejected() {
        let pool = store::init_memory_store().await.unwrap();

        let hub = Hub::new("Dune");
        hubs::insert_hub(&pool, &hub).await.unwrap();
        seed_work_with_values(&pool, hub.id, &[("title", "Dune")]).await;

        let arbiter = HubArbiter::new(MatchThresholds::default());
        let incoming = Uuid::new_v4();
        let decision = arbiter
            .decide(
                &pool,
                incoming,
                &value_map(&[("title", "A Completely Different Saga")]),
                &[hub.id],
            )
            .await
            .unwrap();

        assert_eq!(decision.disposition, Disposition::Rejected);
        assert!(decision.hub_id.is_none());

        assert_eq!(
            journal::count_events(&pool, "WORK_LINK_REJECTED", incoming)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_existing_member_hub_is_skipped() {
        let pool = store::init_memory_store().await.unwrap();

        let hub = Hub::new("Dune");
        hubs::insert_hub(&pool, &hub).await.unwrap();
        let member = seed_work_with_values(&pool, hub.id, &[("title", "Dune")]).await;

        let arbiter = HubArbiter::new(MatchThresholds::default());
        let decision = arbiter
            .decide(&pool, member, &value_map(&[("title", "Dune")]), &[hub.id])
            .await
            .unwrap();

        // The only candidate hub already contains the work, so nothing scores
        assert_eq!(decision.disposition, Disposition::Rejected);
    }

    #[tokio::test]
    async fn test_best_hub_wins_across_candidates() {
        let pool = store::init_memory_store().await.unwrap();

        let hub_a = Hub::new("Dune");
        let hub_b = Hub::new("Hyperion");
        hubs::insert_hub(&pool, &hub_a).await.unwrap();
        hubs::insert_hub(&pool, &hub_b).await.unwrap();
        seed_work_with_values(&pool, hub_a.id, &[("title", "Dune")]).await;
        seed_work_with_values(&pool, hub_b.id, &[("title", "Hyperion")]).await;

        let arbiter = HubArbiter::new(MatchThresholds::default());
        let decision = arbiter
            .decide(
                &pool,
                Uuid::new_v4(),
                &value_map(&[("title", "Dune")]),
                &[hub_a.id, hub_b.id],
            )
            .await
            .unwrap();

        assert_eq!(decision.hub_id, Some(hub_a.id));
        assert_eq!(decision.disposition, Disposition::AutoLinked);
    }
}
