//! On-disk organiser
//!
//! Resolves the templated destination for an ingested asset, moves it
//! there collision-safely (suffixing ` (2)`, ` (3)`, … rather than ever
//! overwriting), and retries transient I/O a bounded number of times.
//! Corrupt files are quarantined into a rejection directory with the same
//! collision handling; nothing is ever deleted.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Default destination template
pub const DEFAULT_TEMPLATE: &str =
    "{Category}/{HubName} ({Year})/{Format}/{HubName} ({Edition}){Ext}";

/// Rename attempts before giving up on transient I/O
const MAX_MOVE_ATTEMPTS: u32 = 3;

/// Pause between retry attempts
const RETRY_PAUSE: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum OrganiseError {
    #[error("organise move failed after {attempts} attempts: {source}")]
    MoveExhausted {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Values substituted into the destination template
#[derive(Debug, Clone)]
pub struct OrganiseContext {
    /// Media-type category segment
    pub category: String,
    pub hub_name: String,
    pub year: Option<String>,
    /// Format directory segment (falls back to the category)
    pub format: Option<String>,
    /// Edition qualifier in the file name
    pub edition_label: Option<String>,
    /// File extension including the dot, e.g. `.epub`
    pub extension: String,
}

/// Template-driven file organiser
pub struct Organiser {
    data_root: PathBuf,
    template: String,
}

impl Organiser {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    pub fn with_template(data_root: impl Into<PathBuf>, template: impl Into<String>) -> Self {
        Self {
            data_root: data_root.into(),
            template: template.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Render the template into a relative destination path
    ///
    /// Empty placeholders collapse: a missing year turns
    /// `Dune (YYYY)` into `Dune`, and empty directory segments disappear
    /// entirely.
    pub fn render_template(&self, ctx: &OrganiseContext) -> PathBuf {
        let rendered = self
            .template
            .replace("{Category}", &ctx.category)
            .replace("{HubName}", &ctx.hub_name)
            .replace("{Year}", ctx.year.as_deref().unwrap_or(""))
            .replace(
                "{Format}",
                ctx.format.as_deref().unwrap_or(ctx.category.as_str()),
            )
            .replace("{Edition}", ctx.edition_label.as_deref().unwrap_or(""))
            .replace("{Ext}", &ctx.extension);

        let mut path = PathBuf::new();
        for segment in rendered.split('/') {
            let cleaned = clean_segment(segment);
            if !cleaned.is_empty() {
                path.push(cleaned);
            }
        }

        path
    }

    /// Move a file to its templated destination
    ///
    /// Returns the final path, which may carry a collision suffix.
    pub async fn organise(
        &self,
        source: &Path,
        ctx: &OrganiseContext,
    ) -> Result<PathBuf, OrganiseError> {
        let destination = self.data_root.join(self.render_template(ctx));
        move_collision_safe(source, &destination).await
    }

    /// Move a corrupt file into the rejection directory
    pub async fn quarantine(&self, source: &Path) -> Result<PathBuf, OrganiseError> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());

        let destination = self.data_root.join("rejected").join(name);
        let path = move_collision_safe(source, &destination).await?;
        info!(from = %source.display(), to = %path.display(), "Quarantined corrupt file");
        Ok(path)
    }
}

/// Strip characters that cannot appear in path segments and collapse the
/// ` ()` artifacts left by empty placeholders
fn clean_segment(segment: &str) -> String {
    let sanitized: String = segment
        .chars()
        .filter(|c| !matches!(c, '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();

    sanitized
        .replace(" ()", "")
        .replace("()", "")
        .trim()
        .to_string()
}

/// Rename with bounded retry, never overwriting an existing file
///
/// The destination name is claimed atomically with a create-exclusive
/// placeholder before the move, so two candidates racing toward the same
/// rendered path cannot both pick it: the loser's `create_new` fails with
/// AlreadyExists and it claims the next suffix instead.
async fn move_collision_safe(source: &Path, destination: &Path) -> Result<PathBuf, OrganiseError> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut last_error: Option<std::io::Error> = None;

    for attempt in 1..=MAX_MOVE_ATTEMPTS {
        let target = reserve_free_path(destination).await?;

        // The placeholder at `target` is ours, so a rename replacing it
        // loses nothing. Filesystems that refuse to rename over an
        // existing file fall through to the copy, which truncates it.
        match tokio::fs::rename(source, &target).await {
            Ok(()) => {
                debug!(from = %source.display(), to = %target.display(), "Organised file");
                return Ok(target);
            }
            Err(rename_err) => {
                // Cross-device moves need copy + remove
                match tokio::fs::copy(source, &target).await {
                    Ok(_) => {
                        tokio::fs::remove_file(source).await?;
                        debug!(from = %source.display(), to = %target.display(), "Organised file (copy)");
                        return Ok(target);
                    }
                    Err(_) => {
                        // Release the claimed name before retrying
                        let _ = tokio::fs::remove_file(&target).await;
                        last_error = Some(rename_err);
                        if attempt < MAX_MOVE_ATTEMPTS {
                            tokio::time::sleep(RETRY_PAUSE).await;
                        }
                    }
                }
            }
        }
    }

    Err(OrganiseError::MoveExhausted {
        attempts: MAX_MOVE_ATTEMPTS,
        source: last_error
            .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "unknown")),
    })
}

/// Atomically claim the first free variant of the destination: as-is,
/// then ` (2)`, ` (3)`, …
///
/// Claiming creates an empty placeholder with `create_new`, which is
/// atomic at the filesystem level; a plain existence probe would race
/// against concurrent candidates organising into the same directory.
async fn reserve_free_path(destination: &Path) -> Result<PathBuf, OrganiseError> {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = destination
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = destination.parent().unwrap_or_else(|| Path::new(""));

    let mut counter = 1u32;
    loop {
        let candidate = if counter == 1 {
            destination.to_path_buf()
        } else {
            parent.join(format!("{stem} ({counter}){extension}"))
        };

        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_placeholder) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                counter += 1;
            }
            Err(e) => return Err(OrganiseError::Io(e)),
        }
    }
}
