//! Bounded worker
//!
//! A bounded channel of typed work items drained by one consumer loop that
//! fans handlers out onto background tasks under a concurrency semaphore.
//! Enqueue back-pressures when the channel is full; handler failures are
//! logged and never stop the worker; `drain` closes the writer, waits for
//! the consumer, then waits out every in-flight handler.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

/// Back-pressured worker over items of type `T`
pub struct BoundedWorker<T: Send + 'static> {
    tx: Option<mpsc::Sender<T>>,
    pending: Arc<AtomicUsize>,
    consumer: Option<tokio::task::JoinHandle<()>>,
}

impl<T: Send + 'static> BoundedWorker<T> {
    /// Spawn the consumer loop
    ///
    /// `concurrency` caps simultaneously running handlers; items beyond the
    /// cap wait inside the consumer on the semaphore, items beyond
    /// `capacity` wait inside `enqueue` on the channel.
    pub fn spawn<F, Fut>(capacity: usize, concurrency: usize, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<T>(capacity.max(1));
        let pending = Arc::new(AtomicUsize::new(0));
        let concurrency = concurrency.max(1);

        let handler = Arc::new(handler);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let pending_consumer = Arc::clone(&pending);

        let consumer = tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                let permit = Arc::clone(&semaphore)
                    .acquire_owned()
                    .await
                    .expect("worker semaphore never closed");

                let handler = Arc::clone(&handler);
                let pending = Arc::clone(&pending_consumer);

                tokio::spawn(async move {
                    if let Err(e) = handler.as_ref()(item).await {
                        warn!(error = %e, "Worker handler failed");
                    }
                    pending.fetch_sub(1, Ordering::SeqCst);
                    drop(permit);
                });
            }

            // Channel closed: wait for every in-flight handler by taking
            // back all permits.
            let _all = semaphore
                .acquire_many(concurrency as u32)
                .await
                .expect("worker semaphore never closed");
            debug!("Worker consumer drained");
        });

        Self {
            tx: Some(tx),
            pending,
            consumer: Some(consumer),
        }
    }

    /// Submit an item, waiting while the channel is full
    pub async fn enqueue(&self, item: T) -> anyhow::Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("worker already drained"))?;

        self.pending.fetch_add(1, Ordering::SeqCst);
        if tx.send(item).await.is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            anyhow::bail!("worker channel closed");
        }

        Ok(())
    }

    /// Items queued plus in flight
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Close the writer, await the consumer loop, await in-flight handlers
    pub async fn drain(mut self) {
        drop(self.tx.take());
        if let Some(consumer) = self.consumer.take() {
            if let Err(e) = consumer.await {
                warn!(error = %e, "Worker consumer join failed");
            }
        }
    }
}
