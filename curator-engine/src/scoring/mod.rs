//! Claim scoring engine
//!
//! Performs per-field weighted arbitration of metadata claims into
//! canonical values. Each field is resolved independently: a user-locked
//! claim short-circuits the resolver entirely; otherwise claims vote with
//! `confidence × effective provider weight × staleness factor`, votes are
//! normalised per field, and value groups (trim + lowercase) compete for
//! the win. A runner-up inside the conflict epsilon flags the field.
//!
//! Deterministic by construction: no I/O, no randomness, and every
//! aggregation is permutation-invariant (ties between value groups break
//! on the normalised value key).

use crate::models::MetadataClaim;
use chrono::{DateTime, Utc};
use curator_common::config::ScoringSettings;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use uuid::Uuid;

/// Scoring thresholds and decay configuration
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub auto_link_threshold: f64,
    pub conflict_threshold: f64,
    pub conflict_epsilon: f64,
    /// Claims older than this many days are decayed; 0 disables decay
    pub stale_decay_days: i64,
    pub stale_decay_factor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            auto_link_threshold: 0.85,
            conflict_threshold: 0.60,
            conflict_epsilon: 0.05,
            stale_decay_days: 90,
            stale_decay_factor: 0.8,
        }
    }
}

impl From<&ScoringSettings> for ScoringConfig {
    fn from(settings: &ScoringSettings) -> Self {
        Self {
            auto_link_threshold: settings.auto_link_threshold,
            conflict_threshold: settings.conflict_threshold,
            conflict_epsilon: settings.conflict_epsilon,
            stale_decay_days: settings.stale_claim_decay_days,
            stale_decay_factor: settings.stale_claim_decay_factor,
        }
    }
}

/// Input to one scoring run
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub entity_id: Uuid,
    pub claims: Vec<MetadataClaim>,
    /// provider → default weight
    pub provider_weights: HashMap<String, f64>,
    /// provider → claim key → weight override
    pub provider_field_weights: HashMap<String, HashMap<String, f64>>,
    pub config: ScoringConfig,
}

/// Scored winner for one field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldScore {
    pub key: String,
    pub value: String,
    /// Winning value group's normalised vote share (1.0 for user locks)
    pub confidence: f64,
    pub winning_provider_id: Option<String>,
    /// True when the runner-up came within the conflict epsilon
    pub conflicted: bool,
}

/// Result of scoring one entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringResult {
    pub entity_id: Uuid,
    pub field_scores: Vec<FieldScore>,
    /// Arithmetic mean of winning field confidences; 0 when no fields
    pub overall_confidence: f64,
    pub scored_at: DateTime<Utc>,
}

impl ScoringResult {
    /// Keys of fields flagged as conflicted
    pub fn conflicted_fields(&self) -> Vec<String> {
        self.field_scores
            .iter()
            .filter(|fs| fs.conflicted)
            .map(|fs| fs.key.clone())
            .collect()
    }
}

/// Why a single field could not be resolved
///
/// Field-level failures are isolated: the engine logs and skips the field,
/// never aborting the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldResolveError {
    /// No claims survived filtering for this field
    NoClaims,
}

/// The per-field weighted voter
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score every field of an entity
    ///
    /// Field order in the output follows the case-insensitive key ordering,
    /// so identical inputs produce identical outputs regardless of claim
    /// permutation.
    pub fn score(&self, ctx: &ScoringContext) -> ScoringResult {
        let now = Utc::now();

        // Group claims by case-insensitive key. BTreeMap keeps field order
        // stable across permutations of the input.
        let mut by_field: BTreeMap<String, Vec<&MetadataClaim>> = BTreeMap::new();
        for claim in &ctx.claims {
            by_field
                .entry(claim.claim_key.trim().to_lowercase())
                .or_default()
                .push(claim);
        }

        let mut field_scores = Vec::with_capacity(by_field.len());
        for (key, claims) in &by_field {
            match self.resolve_field(key, claims, ctx, now) {
                Ok(score) => field_scores.push(score),
                Err(e) => {
                    debug!(field = %key, ?e, "Skipping unresolvable field");
                }
            }
        }

        let overall_confidence = if field_scores.is_empty() {
            0.0
        } else {
            field_scores.iter().map(|fs| fs.confidence).sum::<f64>()
                / field_scores.len() as f64
        };

        ScoringResult {
            entity_id: ctx.entity_id,
            field_scores,
            overall_confidence,
            scored_at: now,
        }
    }

    /// Resolve a single field
    ///
    /// Public so the scoring laws can be exercised directly from
    /// integration tests.
    pub fn resolve_field(
        &self,
        key: &str,
        claims: &[&MetadataClaim],
        ctx: &ScoringContext,
        now: DateTime<Utc>,
    ) -> Result<FieldScore, FieldResolveError> {
        if claims.is_empty() {
            return Err(FieldResolveError::NoClaims);
        }

        // User locks short-circuit the resolver: most recent locked claim
        // wins unconditionally. Two locked claims on one field is not an
        // error; latest wins and we log it.
        let locked: Vec<&&MetadataClaim> =
            claims.iter().filter(|c| c.is_user_locked).collect();
        if !locked.is_empty() {
            if locked.len() > 1 {
                debug!(
                    field = %key,
                    count = locked.len(),
                    "Multiple user-locked claims; most recent wins"
                );
            }
            let winner = locked
                .iter()
                .max_by_key(|c| (c.claimed_at, c.id))
                .expect("non-empty locked set");

            return Ok(FieldScore {
                key: key.to_string(),
                value: winner.claim_value.trim().to_string(),
                confidence: 1.0,
                winning_provider_id: Some(winner.provider_id.clone()),
                conflicted: false,
            });
        }

        let normalised = self.normalised_weights(claims, ctx, now);
        let raw_total: f64 = claims
            .iter()
            .map(|c| self.raw_weight(c, ctx, now))
            .sum();

        // Group by normalised value; sums are permutation-invariant.
        let mut groups: BTreeMap<String, ValueGroup> = BTreeMap::new();
        for (claim, weight) in claims.iter().zip(normalised.iter()) {
            let norm_value = claim.claim_value.trim().to_lowercase();
            let group = groups.entry(norm_value).or_default();
            group.total += *weight;

            let raw = self.raw_weight(claim, ctx, now);
            let display = claim.claim_value.trim();
            // Strongest claim names the group's display value and provider;
            // exact ties break on value then provider so the choice is
            // permutation-invariant.
            let replace = match &group.best {
                None => true,
                Some((best_raw, best_display, best_provider)) => {
                    match raw
                        .partial_cmp(best_raw)
                        .unwrap_or(std::cmp::Ordering::Equal)
                    {
                        std::cmp::Ordering::Greater => true,
                        std::cmp::Ordering::Less => false,
                        std::cmp::Ordering::Equal => {
                            (display, claim.provider_id.as_str())
                                < (best_display.as_str(), best_provider.as_str())
                        }
                    }
                }
            };
            if replace {
                group.best = Some((raw, display.to_string(), claim.provider_id.clone()));
            }
        }

        // Rank groups by total descending; the BTreeMap key breaks exact
        // ties deterministically.
        let mut ranked: Vec<(&String, &ValueGroup)> = groups.iter().collect();
        ranked.sort_by(|a, b| {
            b.1.total
                .partial_cmp(&a.1.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        let (_, winner) = ranked.first().expect("non-empty claim set");
        let (_, display_value, provider) =
            winner.best.clone().expect("group holds at least one claim");

        // No raw signal at all (all weights zero): uniform distribution,
        // and the conflict flag stays off.
        let conflicted = if raw_total > 0.0 && ranked.len() > 1 {
            let runner_up = ranked[1].1.total;
            winner.total > 0.0
                && (runner_up / winner.total) >= (1.0 - ctx.config.conflict_epsilon)
        } else {
            false
        };

        Ok(FieldScore {
            key: key.to_string(),
            value: display_value,
            confidence: winner.total,
            winning_provider_id: Some(provider),
            conflicted,
        })
    }

    /// Normalised per-claim weights for one field
    ///
    /// Sums to 1.0 for any non-empty claim set; when the total raw weight
    /// is zero the distribution is uniform. Public for the property tests.
    pub fn normalised_weights(
        &self,
        claims: &[&MetadataClaim],
        ctx: &ScoringContext,
        now: DateTime<Utc>,
    ) -> Vec<f64> {
        let raws: Vec<f64> = claims
            .iter()
            .map(|c| self.raw_weight(c, ctx, now))
            .collect();

        let total: f64 = raws.iter().sum();
        if total > 0.0 {
            raws.iter().map(|r| r / total).collect()
        } else {
            let uniform = 1.0 / claims.len() as f64;
            vec![uniform; claims.len()]
        }
    }

    /// `confidence × effective weight × stale factor`, clamped at zero
    fn raw_weight(&self, claim: &MetadataClaim, ctx: &ScoringContext, now: DateTime<Utc>) -> f64 {
        let key = claim.claim_key.trim().to_lowercase();

        let effective_weight = ctx
            .provider_field_weights
            .get(&claim.provider_id)
            .and_then(|fields| fields.get(&key))
            .copied()
            .or_else(|| ctx.provider_weights.get(&claim.provider_id).copied())
            .unwrap_or(1.0);

        let stale_factor = if ctx.config.stale_decay_days > 0 {
            let age_days = (now - claim.claimed_at).num_days();
            if age_days > ctx.config.stale_decay_days {
                ctx.config.stale_decay_factor
            } else {
                1.0
            }
        } else {
            1.0
        };

        (claim.confidence * effective_weight * stale_factor).max(0.0)
    }
}

#[derive(Debug, Clone, Default)]
struct ValueGroup {
    total: f64,
    /// (raw weight, display value, provider) of the strongest claim
    best: Option<(f64, String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;
    use chrono::Duration;

    fn claim(provider: &str, key: &str, value: &str, confidence: f64) -> MetadataClaim {
        MetadataClaim {
            id: Uuid::new_v4(),
            entity_id: Uuid::nil(),
            entity_kind: EntityKind::Edition,
            provider_id: provider.to_string(),
            claim_key: key.to_string(),
            claim_value: value.to_string(),
            confidence,
            claimed_at: Utc::now(),
            is_user_locked: false,
        }
    }

    fn ctx(claims: Vec<MetadataClaim>, weights: &[(&str, f64)]) -> ScoringContext {
        ScoringContext {
            entity_id: Uuid::new_v4(),
            claims,
            provider_weights: weights
                .iter()
                .map(|(p, w)| (p.to_string(), *w))
                .collect(),
            provider_field_weights: HashMap::new(),
            config: ScoringConfig::default(),
        }
    }

    #[test]
    fn test_empty_claim_set() {
        let engine = ScoringEngine::default();
        let result = engine.score(&ctx(vec![], &[]));
        assert_eq!(result.overall_confidence, 0.0);
        assert!(result.field_scores.is_empty());
    }

    #[test]
    fn test_single_claim_full_confidence() {
        let engine = ScoringEngine::default();
        let result = engine.score(&ctx(
            vec![claim("local-filesystem", "title", "Dune", 1.0)],
            &[("local-filesystem", 1.0)],
        ));

        assert_eq!(result.field_scores.len(), 1);
        let fs = &result.field_scores[0];
        assert_eq!(fs.value, "Dune");
        assert_eq!(fs.confidence, 1.0);
        assert!(!fs.conflicted);
        assert_eq!(result.overall_confidence, 1.0);
    }

    #[test]
    fn test_provider_disagreement_below_epsilon() {
        // Local claim weight 1.0 vs external 0.7: runner-up share
        // 0.7/1.7 ≈ 0.412 is far below 0.95 of the winner's 0.588.
        let engine = ScoringEngine::default();
        let result = engine.score(&ctx(
            vec![
                claim("local-filesystem", "title", "Dune", 1.0),
                claim("openlibrary", "title", "Dune: Book One", 1.0),
            ],
            &[("local-filesystem", 1.0), ("openlibrary", 0.7)],
        ));

        let fs = &result.field_scores[0];
        assert_eq!(fs.value, "Dune");
        assert!(!fs.conflicted);
        assert!((fs.confidence - 1.0 / 1.7).abs() < 1e-9);
    }

    #[test]
    fn test_user_lock_dominates() {
        let engine = ScoringEngine::default();

        let mut locked = claim("user", "title", "Dune (Special Edition)", 0.1);
        locked.is_user_locked = true;

        let result = engine.score(&ctx(
            vec![
                claim("local-filesystem", "title", "Dune", 1.0),
                claim("openlibrary", "title", "Dune: Book One", 1.0),
                locked,
            ],
            &[("local-filesystem", 1.0), ("openlibrary", 0.7)],
        ));

        let fs = &result.field_scores[0];
        assert_eq!(fs.value, "Dune (Special Edition)");
        assert_eq!(fs.confidence, 1.0);
        assert!(!fs.conflicted);
    }

    #[test]
    fn test_two_user_locks_most_recent_wins() {
        let engine = ScoringEngine::default();

        let mut older = claim("user", "title", "First Lock", 1.0);
        older.is_user_locked = true;
        older.claimed_at = Utc::now() - Duration::hours(1);

        let mut newer = claim("user", "title", "Second Lock", 1.0);
        newer.is_user_locked = true;

        let result = engine.score(&ctx(vec![older, newer], &[("user", 1.0)]));
        assert_eq!(result.field_scores[0].value, "Second Lock");
    }

    #[test]
    fn test_all_zero_weights_uniform_no_conflict() {
        let engine = ScoringEngine::default();
        let result = engine.score(&ctx(
            vec![
                claim("a", "title", "One", 0.0),
                claim("b", "title", "Two", 0.0),
            ],
            &[("a", 1.0), ("b", 1.0)],
        ));

        let fs = &result.field_scores[0];
        assert!(!fs.conflicted, "zero-signal fields never conflict");
        assert!((fs.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_runner_up_exactly_at_epsilon_boundary_conflicts() {
        // With epsilon 0.5 the boundary ratio is exactly 0.5, and a
        // runner-up at half the winner's raw weight hits it exactly
        // (doubling is exact in binary floating point).
        let mut config = ScoringConfig::default();
        config.conflict_epsilon = 0.5;
        let engine = ScoringEngine::new(config.clone());

        let mut context = ctx(
            vec![
                claim("a", "title", "Alpha", 1.0),
                claim("b", "title", "Beta", 0.5),
            ],
            &[("a", 1.0), ("b", 1.0)],
        );
        context.config = config;

        let result = engine.score(&context);
        let fs = &result.field_scores[0];
        assert_eq!(fs.value, "Alpha");
        assert!(fs.conflicted, "ratio at exactly 1 - epsilon must conflict");
    }

    #[test]
    fn test_runner_up_below_epsilon_boundary_does_not_conflict() {
        let mut config = ScoringConfig::default();
        config.conflict_epsilon = 0.5;
        let engine = ScoringEngine::new(config.clone());

        let mut context = ctx(
            vec![
                claim("a", "title", "Alpha", 1.0),
                claim("b", "title", "Beta", 0.25),
            ],
            &[("a", 1.0), ("b", 1.0)],
        );
        context.config = config;

        let result = engine.score(&context);
        assert!(!result.field_scores[0].conflicted);
    }

    #[test]
    fn test_value_grouping_is_case_and_whitespace_insensitive() {
        let engine = ScoringEngine::default();
        let result = engine.score(&ctx(
            vec![
                claim("a", "title", "  Dune ", 0.6),
                claim("b", "title", "dune", 0.6),
                claim("c", "title", "Hyperion", 0.7),
            ],
            &[("a", 1.0), ("b", 1.0), ("c", 1.0)],
        ));

        // "Dune"+"dune" pool 1.2 raw vs 0.7 for Hyperion
        let fs = &result.field_scores[0];
        assert_eq!(fs.value.to_lowercase(), "dune");
        assert!(!fs.conflicted);
    }

    #[test]
    fn test_stale_decay_applies_after_window() {
        let engine = ScoringEngine::default();

        let mut stale = claim("a", "title", "Old Title", 1.0);
        stale.claimed_at = Utc::now() - Duration::days(120);
        let fresh = claim("b", "title", "New Title", 0.9);

        let result = engine.score(&ctx(
            vec![stale, fresh],
            &[("a", 1.0), ("b", 1.0)],
        ));

        // Stale raw = 1.0 × 0.8 = 0.8 < fresh 0.9
        assert_eq!(result.field_scores[0].value, "New Title");
    }

    #[test]
    fn test_stale_decay_disabled_when_days_zero() {
        let mut config = ScoringConfig::default();
        config.stale_decay_days = 0;
        let engine = ScoringEngine::new(config);

        let mut ancient = claim("a", "title", "Old Title", 1.0);
        ancient.claimed_at = Utc::now() - Duration::days(5000);
        let fresh = claim("b", "title", "New Title", 0.9);

        let mut context = ctx(vec![ancient, fresh], &[("a", 1.0), ("b", 1.0)]);
        context.config = engine.config().clone();

        let result = engine.score(&context);
        // No decay: 1.0 beats 0.9
        assert_eq!(result.field_scores[0].value, "Old Title");
    }

    #[test]
    fn test_field_weight_override_beats_default() {
        let mut context = ctx(
            vec![
                claim("a", "isbn", "1111", 1.0),
                claim("b", "isbn", "2222", 1.0),
            ],
            &[("a", 0.5), ("b", 0.6)],
        );
        context
            .provider_field_weights
            .insert("a".to_string(), HashMap::from([("isbn".to_string(), 0.9)]));

        let engine = ScoringEngine::default();
        let result = engine.score(&context);

        // a's override 0.9 beats b's default 0.6
        assert_eq!(result.field_scores[0].value, "1111");
    }

    #[test]
    fn test_keys_group_case_insensitively() {
        let engine = ScoringEngine::default();
        let result = engine.score(&ctx(
            vec![
                claim("a", "Title", "Dune", 0.8),
                claim("b", "title", "Dune", 0.8),
            ],
            &[("a", 1.0), ("b", 1.0)],
        ));

        assert_eq!(result.field_scores.len(), 1, "Title/title is one field");
    }

    #[test]
    fn test_overall_confidence_is_mean() {
        let engine = ScoringEngine::default();
        let result = engine.score(&ctx(
            vec![
                claim("a", "title", "Dune", 1.0),
                claim("a", "author", "Frank Herbert", 1.0),
                claim("a", "isbn", "9780441013593", 1.0),
            ],
            &[("a", 1.0)],
        ));

        assert_eq!(result.field_scores.len(), 3);
        assert!((result.overall_confidence - 1.0).abs() < 1e-9);
    }
}
