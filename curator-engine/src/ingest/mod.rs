//! Ingestion orchestrator
//!
//! Drives each candidate through the pipeline:
//! hash → duplicate check → processor dispatch → claim append → scoring →
//! canonical upsert → hub arbitration → chain creation → asset insert →
//! organise → enrichment enqueue → event publication.
//!
//! Candidates run in parallel up to the bounded worker's cap; steps within
//! one candidate are sequential. A failure in one candidate never touches
//! the others.

pub mod inhale;
pub mod organiser;
pub mod scan;
pub mod sidecar;

use crate::chain;
use crate::hasher::FileHasher;
use crate::matching::{Disposition, HubArbiter, MatchThresholds};
use crate::models::{
    AssetStatus, CandidateState, EntityKind, IngestCandidate, MediaAsset, MetadataClaim,
};
use crate::processors::{ProcessorRegistry, ProcessorResult};
use crate::scoring::{ScoringContext, ScoringEngine};
use crate::store::{assets, claims, hubs, journal, providers};
use crate::watch::FileEventKind;
use crate::worker::BoundedWorker;
use chrono::{Datelike, Utc};
use curator_common::events::{CuratorEvent, EventPublisher};
use organiser::{OrganiseContext, Organiser};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Provider id attached to claims extracted from the file itself
pub const LOCAL_PROVIDER: &str = "local-filesystem";

/// Request handed to the background enrichment collaborator
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    pub edition_id: Uuid,
    pub path: std::path::PathBuf,
}

/// The per-candidate pipeline driver
pub struct IngestOrchestrator {
    db: SqlitePool,
    scoring: ScoringEngine,
    hasher: FileHasher,
    registry: Arc<ProcessorRegistry>,
    organiser: Organiser,
    arbiter: HubArbiter,
    publisher: Arc<dyn EventPublisher>,
    /// Enrichment is fire-and-forget: a full or closed channel is ignored
    enrichment: Option<mpsc::Sender<EnrichmentRequest>>,
    max_journal_entries: i64,
}

impl IngestOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SqlitePool,
        scoring: ScoringEngine,
        registry: Arc<ProcessorRegistry>,
        organiser: Organiser,
        publisher: Arc<dyn EventPublisher>,
        enrichment: Option<mpsc::Sender<EnrichmentRequest>>,
        max_journal_entries: i64,
    ) -> Self {
        let thresholds = MatchThresholds {
            auto_link: scoring.config().auto_link_threshold,
            review: scoring.config().conflict_threshold,
        };

        Self {
            db,
            scoring,
            hasher: FileHasher::new(),
            registry,
            organiser,
            arbiter: HubArbiter::new(thresholds),
            publisher,
            enrichment,
            max_journal_entries,
        }
    }

    /// Consume candidates until the channel closes or cancellation fires
    ///
    /// Candidates fan out onto a bounded worker; cancelling the master
    /// token stops intake, and each in-flight candidate gets a child token
    /// so cancelling one never disturbs the rest.
    pub async fn run(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<IngestCandidate>,
        concurrency: usize,
        cancel: CancellationToken,
    ) {
        let orchestrator = Arc::clone(&self);
        let master = cancel.clone();

        let worker = BoundedWorker::spawn(
            concurrency.max(1) * 2,
            concurrency.max(1),
            move |candidate: IngestCandidate| {
                let orchestrator = Arc::clone(&orchestrator);
                let token = master.child_token();
                async move {
                    orchestrator.handle_candidate(candidate, token).await;
                    Ok(())
                }
            },
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                candidate = rx.recv() => match candidate {
                    Some(candidate) => {
                        if worker.enqueue(candidate).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        worker.drain().await;
        info!("Ingestion orchestrator stopped");
    }

    /// Run one candidate, reporting failures instead of propagating them
    async fn handle_candidate(&self, candidate: IngestCandidate, cancel: CancellationToken) {
        let path = candidate.path.clone();
        match self.process_candidate(candidate, &cancel).await {
            Ok(state) => {
                debug!(path = %path.display(), state = state.as_str(), "Candidate finished");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Candidate failed");
                let _ = journal::log_event(&self.db, "CANDIDATE_FAILED", "asset", Uuid::nil())
                    .await;
                self.publisher.publish(CuratorEvent::IngestFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }

    /// The pipeline for a single candidate
    pub async fn process_candidate(
        &self,
        candidate: IngestCandidate,
        cancel: &CancellationToken,
    ) -> anyhow::Result<CandidateState> {
        // Deletions reconcile instead of ingesting
        if candidate.kind == FileEventKind::Deleted {
            return self.handle_deletion(&candidate).await;
        }

        // Failed probes and vanished files are recorded, not processed
        if candidate.is_failed {
            let reason = candidate
                .failure_reason
                .clone()
                .unwrap_or_else(|| "lock probe failed".to_string());
            self.record_failure(&candidate, &reason).await?;
            return Ok(CandidateState::LockTimeout);
        }

        if !candidate.path.exists() {
            self.record_failure(&candidate, "file missing at ingestion time")
                .await?;
            return Ok(CandidateState::Rejected);
        }

        // Staging: hash first; content identity gates everything else
        let hash = self.hasher.hash_file(&candidate.path, cancel).await?;

        if let Some(existing) = assets::find_asset_by_hash(&self.db, &hash.hex).await? {
            debug!(path = %candidate.path.display(), hash = %hash.hex, "Duplicate hash, skipping");
            journal::log_event(&self.db, "ASSET_DUPLICATE", "asset", existing.id).await?;
            self.publisher.publish(CuratorEvent::DuplicateSkipped {
                path: candidate.path.display().to_string(),
                content_hash: hash.hex,
                existing_asset_id: existing.id,
                timestamp: Utc::now(),
            });
            return Ok(CandidateState::Rejected);
        }

        let extraction = self.registry.process(&candidate.path).await?;

        if extraction.is_corrupt {
            return self.handle_corrupt(&candidate, &extraction).await;
        }

        // Claims scope to the pre-assigned edition id; the work id exists
        // before its row so the arbiter can journal against it.
        let work_id = Uuid::new_v4();
        let edition_id = Uuid::new_v4();

        for extracted in &extraction.claims {
            claims::append_claim(
                &self.db,
                &MetadataClaim {
                    id: Uuid::new_v4(),
                    entity_id: edition_id,
                    entity_kind: EntityKind::Edition,
                    provider_id: LOCAL_PROVIDER.to_string(),
                    claim_key: extracted.key.clone(),
                    claim_value: extracted.value.clone(),
                    confidence: extracted.confidence,
                    claimed_at: Utc::now(),
                    is_user_locked: false,
                },
            )
            .await?;
        }

        // Score from the store, not from memory: the claim log is the
        // source of truth for re-scoring later.
        let scoring_result = self.score_entity(edition_id).await?;

        for field in &scoring_result.field_scores {
            claims::upsert_canonical(
                &self.db,
                edition_id,
                &field.key,
                &field.value,
                scoring_result.scored_at,
            )
            .await?;
        }

        self.publisher.publish(CuratorEvent::MetadataHarvested {
            entity_id: edition_id,
            field_count: scoring_result.field_scores.len(),
            overall_confidence: scoring_result.overall_confidence,
            conflicted_fields: scoring_result.conflicted_fields(),
            timestamp: Utc::now(),
        });

        // Arbitrate against every existing hub; an auto-link overrides the
        // display-name reuse inside the chain factory.
        let canonical = claims::canonical_map(&self.db, edition_id).await?;
        let hub_ids = hubs::list_hub_ids(&self.db).await?;
        let decision = self
            .arbiter
            .decide(&self.db, work_id, &canonical, &hub_ids)
            .await?;

        let chain = match (decision.disposition, decision.hub_id) {
            (Disposition::AutoLinked, Some(hub_id)) => {
                debug!(%hub_id, score = decision.score, "Arbiter auto-linked work");
                chain::ensure_chain_in_hub(
                    &self.db,
                    hub_id,
                    work_id,
                    edition_id,
                    extraction.detected_type,
                    &canonical,
                )
                .await?
            }
            _ => {
                chain::ensure_chain(
                    &self.db,
                    work_id,
                    edition_id,
                    extraction.detected_type,
                    &canonical,
                )
                .await?
            }
        };

        let any_locked = claims::list_claims(&self.db, edition_id)
            .await?
            .iter()
            .any(|c| c.is_user_locked);
        let conflicted = !scoring_result.conflicted_fields().is_empty();

        let asset = MediaAsset {
            id: Uuid::new_v4(),
            edition_id,
            content_hash: hash.hex.clone(),
            file_path_root: candidate.path.display().to_string(),
            status: if conflicted {
                AssetStatus::Conflicted
            } else {
                AssetStatus::Normal
            },
            manifest: None,
            created_at: Utc::now(),
        };
        assets::insert_asset(&self.db, &asset).await?;
        journal::log_event(&self.db, "ASSET_INGESTED", "asset", asset.id).await?;

        // Auto-organise only confident (or user-curated) assets
        let mut final_path = candidate.path.clone();
        let auto_organise = scoring_result.overall_confidence
            >= self.scoring.config().auto_link_threshold
            || any_locked;

        if auto_organise {
            final_path = self
                .organise_asset(&candidate.path, &asset, &chain, &extraction, &canonical)
                .await?;
            assets::update_asset_path(&self.db, asset.id, &final_path.display().to_string())
                .await?;
        }

        // Enrichment never blocks or fails ingestion
        if let Some(enrichment) = &self.enrichment {
            if enrichment
                .try_send(EnrichmentRequest {
                    edition_id,
                    path: final_path.clone(),
                })
                .is_err()
            {
                debug!("Enrichment queue unavailable, skipping");
            }
        }

        self.publisher.publish(CuratorEvent::MediaAdded {
            asset_id: asset.id,
            hub_id: chain.hub_id,
            work_id: chain.work_id,
            edition_id: chain.edition_id,
            path: final_path.display().to_string(),
            timestamp: Utc::now(),
        });

        journal::prune_log(&self.db, self.max_journal_entries).await?;

        Ok(CandidateState::Library)
    }

    /// Re-score an entity from its stored claims
    pub async fn score_entity(
        &self,
        entity_id: Uuid,
    ) -> anyhow::Result<crate::scoring::ScoringResult> {
        let stored = claims::list_claims(&self.db, entity_id).await?;
        let (provider_weights, provider_field_weights) =
            providers::load_weight_maps(&self.db).await?;

        Ok(self.scoring.score(&ScoringContext {
            entity_id,
            claims: stored,
            provider_weights,
            provider_field_weights,
            config: self.scoring.config().clone(),
        }))
    }

    async fn handle_deletion(&self, candidate: &IngestCandidate) -> anyhow::Result<CandidateState> {
        let path = candidate.path.display().to_string();
        let orphaned = assets::mark_orphaned_by_path(&self.db, &path).await?;

        for asset in &orphaned {
            journal::log_event(&self.db, "ASSET_ORPHANED", "asset", asset.id).await?;
            self.publisher.publish(CuratorEvent::AssetOrphaned {
                asset_id: asset.id,
                path: path.clone(),
                timestamp: Utc::now(),
            });
        }

        if orphaned.is_empty() {
            debug!(%path, "Deletion for uncatalogued path, nothing to orphan");
        }

        Ok(CandidateState::Rejected)
    }

    async fn handle_corrupt(
        &self,
        candidate: &IngestCandidate,
        extraction: &ProcessorResult,
    ) -> anyhow::Result<CandidateState> {
        let reason = extraction
            .corrupt_reason
            .clone()
            .unwrap_or_else(|| "processor reported corrupt input".to_string());

        // Quarantine, never delete; claims are not stored for corrupt input
        let quarantined_to = match self.organiser.quarantine(&candidate.path).await {
            Ok(path) => Some(path.display().to_string()),
            Err(e) => {
                warn!(path = %candidate.path.display(), error = %e, "Quarantine failed");
                None
            }
        };

        journal::log_event(&self.db, "ASSET_CORRUPT", "asset", Uuid::nil()).await?;
        self.publisher.publish(CuratorEvent::AssetCorrupt {
            path: candidate.path.display().to_string(),
            reason,
            quarantined_to,
            timestamp: Utc::now(),
        });

        Ok(CandidateState::Rejected)
    }

    async fn record_failure(
        &self,
        candidate: &IngestCandidate,
        reason: &str,
    ) -> anyhow::Result<()> {
        journal::log_event(&self.db, "CANDIDATE_FAILED", "asset", Uuid::nil()).await?;
        self.publisher.publish(CuratorEvent::IngestFailed {
            path: candidate.path.display().to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Move the asset into the library and write its sidecar and cover
    async fn organise_asset(
        &self,
        source: &Path,
        asset: &MediaAsset,
        chain: &chain::ChainIds,
        extraction: &ProcessorResult,
        canonical: &std::collections::HashMap<String, String>,
    ) -> anyhow::Result<std::path::PathBuf> {
        let hub_name = canonical
            .get("title")
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string());

        let year = canonical.get("year").cloned().or_else(|| {
            canonical
                .get("published")
                .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
                .map(|d| d.year().to_string())
        });

        let format_label = canonical.get("format").cloned();

        let extension = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let destination = self
            .organiser
            .organise(
                source,
                &OrganiseContext {
                    category: extraction.detected_type.as_str().to_string(),
                    hub_name: hub_name.clone(),
                    year,
                    format: format_label
                        .clone()
                        .map(|f| capitalise(&f)),
                    edition_label: format_label.clone(),
                    extension,
                },
            )
            .await?;

        let doc = sidecar::SidecarDoc {
            asset_id: asset.id,
            content_hash: asset.content_hash.clone(),
            hub_id: chain.hub_id,
            hub_name,
            work_id: chain.work_id,
            media_type: extraction.detected_type,
            edition_id: chain.edition_id,
            format_label,
            canonical_values: {
                let mut pairs: Vec<_> = canonical
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                pairs.sort();
                pairs
            },
        };
        sidecar::write_sidecar(&destination, &doc).await?;

        if let Some(cover) = &extraction.cover_bytes {
            let name = match extraction.cover_mime.as_deref() {
                Some("image/png") => "cover.png",
                _ => "cover.jpg",
            };
            if let Some(parent) = destination.parent() {
                tokio::fs::write(parent.join(name), cover).await?;
            }
        }

        Ok(destination)
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
