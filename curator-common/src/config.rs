//! Configuration loading and saving
//!
//! Curator reads one JSON configuration file. Load order is: primary file,
//! then its `.bak` sibling (restoring the primary on success), then a
//! first-run default that is created and persisted. Saving rotates the
//! primary to `.bak` before overwriting so there is always one good copy
//! on disk.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Current configuration schema version
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Provider domain classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderDomain {
    Ebook,
    Audiobook,
    Video,
    Universal,
}

/// One registered metadata provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub version: String,
    pub enabled: bool,
    /// Default weight applied to every claim from this provider
    pub weight: f64,
    pub domain: ProviderDomain,
    #[serde(default)]
    pub capability_tags: Vec<String>,
    /// Per-field weight overrides (claim key → weight)
    #[serde(default)]
    pub field_weights: HashMap<String, f64>,
}

/// Maintenance knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    pub max_transaction_log_entries: i64,
    pub vacuum_on_startup: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            max_transaction_log_entries: 100_000,
            vacuum_on_startup: false,
        }
    }
}

/// Scoring thresholds and decay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSettings {
    pub auto_link_threshold: f64,
    pub conflict_threshold: f64,
    pub conflict_epsilon: f64,
    /// Claims older than this many days are decayed; 0 disables decay
    pub stale_claim_decay_days: i64,
    pub stale_claim_decay_factor: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            auto_link_threshold: 0.85,
            conflict_threshold: 0.60,
            conflict_epsilon: 0.05,
            stale_claim_decay_days: 90,
            stale_claim_decay_factor: 0.8,
        }
    }
}

/// Top-level Curator configuration
///
/// Loaded once at startup and passed around as an immutable struct.
/// Mutations (e.g. toggling a provider) go through [`save_config`] and a
/// `ConfigChanged` broadcast, never through in-place mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratorConfig {
    pub schema_version: u32,
    /// Catalogue database file (WAL sibling lives next to it)
    pub database_path: PathBuf,
    /// Root under which organised media, sidecars and covers are placed
    pub data_root: PathBuf,
    /// Inbox directory observed by the file watcher
    pub watch_root: PathBuf,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub provider_endpoints: HashMap<String, String>,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub scoring: ScoringSettings,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            database_path: PathBuf::from("curator.db"),
            data_root: PathBuf::from("library"),
            watch_root: PathBuf::from("inbox"),
            providers: vec![ProviderConfig {
                name: "local-filesystem".to_string(),
                version: "1.0".to_string(),
                enabled: true,
                weight: 1.0,
                domain: ProviderDomain::Universal,
                capability_tags: vec!["embedded-metadata".to_string()],
                field_weights: HashMap::new(),
            }],
            provider_endpoints: HashMap::new(),
            maintenance: MaintenanceConfig::default(),
            scoring: ScoringSettings::default(),
        }
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".bak");
    PathBuf::from(os)
}

fn parse_config(raw: &str) -> Result<CuratorConfig> {
    serde_json::from_str(raw).map_err(|e| Error::Config(format!("invalid config JSON: {e}")))
}

/// Load configuration with backup fallback
///
/// 1. Primary file, if it parses.
/// 2. `.bak` sibling; on success the primary is restored from it.
/// 3. Neither exists: first run. A default config is created and persisted.
///
/// Both files existing but unreadable is fatal (`ConfigInvalid`).
pub fn load_config(path: &Path) -> Result<CuratorConfig> {
    let bak = backup_path(path);

    match std::fs::read_to_string(path) {
        Ok(raw) => match parse_config(&raw) {
            Ok(config) => {
                info!("Loaded configuration: {}", path.display());
                return Ok(config);
            }
            Err(e) => warn!("Primary config unreadable ({e}), trying backup"),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Primary config unreadable ({e}), trying backup"),
    }

    match std::fs::read_to_string(&bak) {
        Ok(raw) => match parse_config(&raw) {
            Ok(config) => {
                // Restore the primary from the surviving backup
                std::fs::copy(&bak, path)?;
                warn!(
                    "Restored configuration from backup: {} -> {}",
                    bak.display(),
                    path.display()
                );
                return Ok(config);
            }
            Err(e) => warn!("Backup config unreadable ({e})"),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Backup config unreadable ({e})"),
    }

    // First run: neither file exists. Anything else is fatal.
    if path.exists() || bak.exists() {
        return Err(Error::Config(format!(
            "configuration at {} is unreadable and no usable backup exists",
            path.display()
        )));
    }

    let config = CuratorConfig::default();
    save_config(path, &config)?;
    info!("Created first-run configuration: {}", path.display());
    Ok(config)
}

/// Persist configuration, rotating the current primary to `.bak` first
pub fn save_config(path: &Path, config: &CuratorConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    if path.exists() {
        std::fs::rename(path, backup_path(path))?;
    }

    let raw = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;
    std::fs::write(path, raw)?;

    Ok(())
}
