//! Fallback processor
//!
//! Handles every file nothing else claims: detects the media type from the
//! extension and derives a low-confidence title claim from the file stem.
//! Registered at the minimum priority so it is unconditionally last.

use super::{ExtractedClaim, MediaProcessor, ProcessorError, ProcessorResult};
use crate::models::MediaType;
use async_trait::async_trait;
use std::path::Path;

/// Confidence attached to filename-derived claims
const FILENAME_CONFIDENCE: f64 = 0.25;

pub struct FallbackProcessor;

impl FallbackProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Extension-based media type detection, shared with the dry-run scan
    pub fn type_from_extension(path: &Path) -> MediaType {
        let Some(ext) = path.extension() else {
            return MediaType::Unknown;
        };

        match ext.to_string_lossy().to_lowercase().as_str() {
            "epub" => MediaType::Epub,
            "m4b" | "aax" => MediaType::Audiobook,
            "cbz" | "cbr" | "cb7" => MediaType::Comic,
            "mkv" | "mp4" | "avi" | "m4v" | "webm" => MediaType::Movie,
            "mp3" | "flac" | "ogg" | "m4a" | "opus" | "wav" => MediaType::Music,
            _ => MediaType::Unknown,
        }
    }
}

impl Default for FallbackProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaProcessor for FallbackProcessor {
    fn supported_type(&self) -> MediaType {
        MediaType::Unknown
    }

    fn priority(&self) -> i32 {
        i32::MIN
    }

    fn can_process(&self, _path: &Path) -> bool {
        true
    }

    async fn process(&self, path: &Path) -> Result<ProcessorResult, ProcessorError> {
        let detected_type = Self::type_from_extension(path);

        let mut claims = Vec::new();
        if let Some(stem) = path.file_stem() {
            let title = stem.to_string_lossy().replace(['_', '.'], " ");
            let title = title.trim();
            if !title.is_empty() {
                claims.push(ExtractedClaim::new("title", title, FILENAME_CONFIDENCE));
            }
        }

        if let Some(ext) = path.extension() {
            claims.push(ExtractedClaim::new(
                "format",
                ext.to_string_lossy().to_lowercase(),
                FILENAME_CONFIDENCE,
            ));
        }

        Ok(ProcessorResult {
            detected_type,
            claims,
            ..Default::default()
        })
    }
}
