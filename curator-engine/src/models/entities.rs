//! Catalogue entities
//!
//! Ownership is parent-owned composition with child→parent id
//! back-references: Hub owns Works, Work owns Editions, Edition owns
//! Assets. Loaders build parents first and attach children by id lookup,
//! so no reference cycles are ever constructed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Media type of a Work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[default]
    Unknown,
    Movie,
    Epub,
    Audiobook,
    Comic,
    TvShow,
    Podcast,
    Music,
}

impl MediaType {
    /// Stable string form used in the database and in organised paths
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Unknown => "Unknown",
            MediaType::Movie => "Movie",
            MediaType::Epub => "Epub",
            MediaType::Audiobook => "Audiobook",
            MediaType::Comic => "Comic",
            MediaType::TvShow => "TvShow",
            MediaType::Podcast => "Podcast",
            MediaType::Music => "Music",
        }
    }

    /// Parse the stable string form; unknown strings map to `Unknown`
    pub fn parse(s: &str) -> Self {
        match s {
            "Movie" => MediaType::Movie,
            "Epub" => MediaType::Epub,
            "Audiobook" => MediaType::Audiobook,
            "Comic" => MediaType::Comic,
            "TvShow" => MediaType::TvShow,
            "Podcast" => MediaType::Podcast,
            "Music" => MediaType::Music,
            _ => MediaType::Unknown,
        }
    }
}

/// Asset lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetStatus {
    Normal,
    Conflicted,
    Orphaned,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Normal => "Normal",
            AssetStatus::Conflicted => "Conflicted",
            AssetStatus::Orphaned => "Orphaned",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Conflicted" => AssetStatus::Conflicted,
            "Orphaned" => AssetStatus::Orphaned,
            _ => AssetStatus::Normal,
        }
    }
}

/// Which table a metadata claim targets
///
/// The database cannot enforce the polymorphic `entity_id` reference, so
/// claims carry this discriminator. The scoring engine never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Work,
    Edition,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Work => "work",
            EntityKind::Edition => "edition",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "work" => EntityKind::Work,
            _ => EntityKind::Edition,
        }
    }
}

/// The narrative identity grouping every format of one intellectual property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hub {
    pub id: Uuid,
    /// Back-reference only; a Hub never requires a universe
    pub universe_id: Option<Uuid>,
    /// Case-insensitive lookup key for hub reuse during ingestion.
    /// No uniqueness constraint: collisions are tolerated and left for the
    /// arbiter to merge later.
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl Hub {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            universe_id: None,
            display_name: display_name.into(),
            created_at: Utc::now(),
        }
    }
}

/// One title (book, film, episode) within a Hub
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    pub id: Uuid,
    /// Required at creation; set to None only when a Hub is deleted and the
    /// Work is kept around for recovery.
    pub hub_id: Option<Uuid>,
    pub media_type: MediaType,
    /// Set when the Hub is conceptually a series
    pub sequence_index: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A physical manifestation of a Work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edition {
    pub id: Uuid,
    pub work_id: Uuid,
    pub format_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A file on disk (or a manifest of files treated as one)
///
/// `content_hash` is the identity anchor: renames and moves reconcile
/// through it. Binaries never live in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: Uuid,
    pub edition_id: Uuid,
    /// Lowercase hex SHA-256, UNIQUE in the store
    pub content_hash: String,
    pub file_path_root: String,
    pub status: AssetStatus,
    /// Additional file paths when several files form one logical asset
    pub manifest: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// One append-only metadata assertion from one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataClaim {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub entity_kind: EntityKind,
    /// Provider name as registered in configuration
    pub provider_id: String,
    pub claim_key: String,
    pub claim_value: String,
    /// In [0, 1]
    pub confidence: f64,
    pub claimed_at: DateTime<Utc>,
    /// Only ever set by an explicit user override
    pub is_user_locked: bool,
}

/// The scored winner per (entity, key); replaced on each re-scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalValue {
    pub entity_id: Uuid,
    pub key: String,
    pub value: String,
    pub last_scored_at: DateTime<Utc>,
}

/// A metadata provider as registered in the catalogue
#[derive(Debug, Clone)]
pub struct ProviderRegistration {
    pub id: Uuid,
    pub name: String,
    pub enabled: bool,
    pub default_weight: f64,
    /// claim key → weight override
    pub field_weights: std::collections::HashMap<String, f64>,
}

/// Hub with its works and their canonical values, as returned by the
/// two-query catalogue loader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubView {
    pub id: Uuid,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub works: Vec<WorkView>,
}

/// Work summary inside a [`HubView`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkView {
    pub id: Uuid,
    pub media_type: MediaType,
    pub sequence_index: Option<f64>,
    pub canonical_values: Vec<CanonicalPair>,
}

/// Key/value pair in API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalPair {
    pub key: String,
    pub value: String,
}
