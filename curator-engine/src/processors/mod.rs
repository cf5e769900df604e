//! Processor registry
//!
//! Format-specific parsers live outside the engine; the pipeline only
//! depends on the [`MediaProcessor`] trait and this registry. Processors
//! are consulted by descending priority via a cheap magic-byte sniff; the
//! fallback (registered at the minimum priority) always handles whatever
//! nothing else claims, without its `can_process` ever being asked.
//! Dispatch runs under a semaphore so parallel parsing cannot exhaust
//! memory.

mod fallback;

pub use fallback::FallbackProcessor;

use crate::models::MediaType;
use async_trait::async_trait;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Bytes read for magic-byte inspection
pub const MAGIC_SNIFF_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("IO error processing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One extracted key/value assertion with the processor's confidence
#[derive(Debug, Clone)]
pub struct ExtractedClaim {
    pub key: String,
    pub value: String,
    pub confidence: f64,
}

impl ExtractedClaim {
    pub fn new(key: impl Into<String>, value: impl Into<String>, confidence: f64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Everything a processor learned from one file
#[derive(Debug, Clone, Default)]
pub struct ProcessorResult {
    pub detected_type: MediaType,
    pub claims: Vec<ExtractedClaim>,
    pub cover_bytes: Option<Vec<u8>>,
    pub cover_mime: Option<String>,
    pub is_corrupt: bool,
    pub corrupt_reason: Option<String>,
}

/// A format handler
///
/// Implementations must be stateless and must never modify the file.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    fn supported_type(&self) -> MediaType;

    /// Higher priority is consulted first
    fn priority(&self) -> i32;

    /// Cheap format check; reads at most [`MAGIC_SNIFF_LEN`] bytes
    fn can_process(&self, path: &Path) -> bool;

    async fn process(&self, path: &Path) -> Result<ProcessorResult, ProcessorError>;
}

/// Read the first bytes of a file for magic-byte inspection
pub fn read_magic(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; MAGIC_SNIFF_LEN];
    let read = file.read(&mut buffer)?;
    Ok(buffer[..read].to_vec())
}

/// Priority-ordered processor dispatch
pub struct ProcessorRegistry {
    /// Sorted descending by priority; never contains the fallback
    processors: Vec<Arc<dyn MediaProcessor>>,
    fallback: Arc<dyn MediaProcessor>,
    semaphore: Arc<Semaphore>,
}

impl ProcessorRegistry {
    /// Build a registry from concrete handlers
    ///
    /// `max_concurrency` caps parallel `process` invocations; pass the host
    /// parallelism for the default behaviour.
    pub fn new(
        mut processors: Vec<Arc<dyn MediaProcessor>>,
        fallback: Arc<dyn MediaProcessor>,
        max_concurrency: usize,
    ) -> Self {
        processors.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        Self {
            processors,
            fallback,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Registry with only the fallback processor
    pub fn with_fallback_only(max_concurrency: usize) -> Self {
        Self::new(
            Vec::new(),
            Arc::new(FallbackProcessor::new()),
            max_concurrency,
        )
    }

    /// First processor (by descending priority) whose `can_process` accepts
    /// the file; the fallback when none do
    ///
    /// The fallback's `can_process` is never invoked.
    pub fn resolve(&self, path: &Path) -> Arc<dyn MediaProcessor> {
        for processor in &self.processors {
            if processor.can_process(path) {
                return Arc::clone(processor);
            }
        }
        Arc::clone(&self.fallback)
    }

    /// Resolve and run the processor for a file under the concurrency cap
    pub async fn process(&self, path: &Path) -> Result<ProcessorResult, ProcessorError> {
        let processor = self.resolve(path);

        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("registry semaphore never closed");

        processor.process(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProcessor {
        media_type: MediaType,
        priority: i32,
        accepts: bool,
        can_process_calls: AtomicUsize,
    }

    impl StubProcessor {
        fn new(media_type: MediaType, priority: i32, accepts: bool) -> Self {
            Self {
                media_type,
                priority,
                accepts,
                can_process_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaProcessor for StubProcessor {
        fn supported_type(&self) -> MediaType {
            self.media_type
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn can_process(&self, _path: &Path) -> bool {
            self.can_process_calls.fetch_add(1, Ordering::SeqCst);
            self.accepts
        }

        async fn process(&self, _path: &Path) -> Result<ProcessorResult, ProcessorError> {
            Ok(ProcessorResult {
                detected_type: self.media_type,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_highest_priority_wins() {
        let low = Arc::new(StubProcessor::new(MediaType::Music, 1, true));
        let high = Arc::new(StubProcessor::new(MediaType::Epub, 10, true));

        let registry = ProcessorRegistry::new(
            vec![low.clone(), high.clone()],
            Arc::new(FallbackProcessor::new()),
            4,
        );

        let result = registry.process(Path::new("anything.bin")).await.unwrap();
        assert_eq!(result.detected_type, MediaType::Epub);
        // The lower-priority processor was never consulted
        assert_eq!(low.can_process_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_can_process_never_invoked() {
        let fallback = Arc::new(StubProcessor::new(MediaType::Unknown, i32::MIN, false));
        let registry = ProcessorRegistry::new(Vec::new(), fallback.clone(), 4);

        let resolved = registry.resolve(Path::new("mystery.bin"));
        assert_eq!(resolved.supported_type(), MediaType::Unknown);
        assert_eq!(fallback.can_process_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejecting_processors_fall_through() {
        let picky = Arc::new(StubProcessor::new(MediaType::Comic, 5, false));
        let registry = ProcessorRegistry::new(
            vec![picky],
            Arc::new(StubProcessor::new(MediaType::Unknown, i32::MIN, false)),
            4,
        );

        let result = registry.process(Path::new("file.xyz")).await.unwrap();
        assert_eq!(result.detected_type, MediaType::Unknown);
    }
}
