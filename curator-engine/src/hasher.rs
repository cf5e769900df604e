//! Streaming content hasher
//!
//! Computes the SHA-256 content digest of a file by streaming fixed-size
//! chunks through an incremental hasher. Chunk buffers come from a shared
//! pool and are returned on every exit path, so steady-state hashing
//! allocates nothing per call. Cancellation aborts between chunks.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// Read chunk size (~80 KB)
const CHUNK_SIZE: usize = 80 * 1024;

/// Buffers kept in the pool at rest
const POOL_CAPACITY: usize = 8;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error hashing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("hashing cancelled: {0}")]
    Cancelled(PathBuf),
}

/// Result of hashing one file
#[derive(Debug, Clone)]
pub struct HashOutcome {
    pub file_path: PathBuf,
    /// Lowercase hex SHA-256 digest
    pub hex: String,
    pub byte_count: u64,
    pub elapsed: Duration,
}

/// Shared-pool streaming hasher
#[derive(Clone)]
pub struct FileHasher {
    pool: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Default for FileHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl FileHasher {
    pub fn new() -> Self {
        Self {
            pool: Arc::new(Mutex::new(Vec::with_capacity(POOL_CAPACITY))),
        }
    }

    /// Hash a file, streaming in chunks
    ///
    /// The file is opened for shared read; no full-file buffering happens.
    /// Cancellation is checked between chunks and aborts promptly.
    pub async fn hash_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<HashOutcome, HashError> {
        let started = Instant::now();

        let mut file = tokio::fs::File::open(path).await.map_err(|source| {
            HashError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let mut lease = BufferLease::take(&self.pool);
        let mut hasher = Sha256::new();
        let mut byte_count = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(HashError::Cancelled(path.to_path_buf()));
            }

            let bytes_read =
                file.read(lease.buf()).await.map_err(|source| HashError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;

            if bytes_read == 0 {
                break;
            }

            hasher.update(&lease.buf()[..bytes_read]);
            byte_count += bytes_read as u64;
        }

        let hex = format!("{:x}", hasher.finalize());

        tracing::debug!(
            path = %path.display(),
            byte_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Hashed file"
        );

        Ok(HashOutcome {
            file_path: path.to_path_buf(),
            hex,
            byte_count,
            elapsed: started.elapsed(),
        })
    }
}

/// RAII lease on a pool buffer; Drop returns it on every exit path
struct BufferLease<'a> {
    pool: &'a Mutex<Vec<Vec<u8>>>,
    buf: Option<Vec<u8>>,
}

impl<'a> BufferLease<'a> {
    fn take(pool: &'a Mutex<Vec<Vec<u8>>>) -> Self {
        let buf = pool
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0u8; CHUNK_SIZE]);
        Self {
            pool,
            buf: Some(buf),
        }
    }

    fn buf(&mut self) -> &mut [u8] {
        self.buf.as_mut().expect("buffer held until drop")
    }
}

impl Drop for BufferLease<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            let mut pool = self.pool.lock();
            if pool.len() < POOL_CAPACITY {
                pool.push(buf);
            }
        }
    }
}
