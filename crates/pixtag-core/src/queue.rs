//! Serial worker for photo-library asset decodes.
//!
//! Full-resolution asset data is large, so at most one asset decode runs at a
//! time across the whole process. Waiters are served in arrival order.

use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::Semaphore;

use crate::error::LoadError;

static SHARED: OnceLock<Arc<DecodeQueue>> = OnceLock::new();

pub struct DecodeQueue {
    permit: Arc<Semaphore>,
}

impl DecodeQueue {
    /// The process-wide queue, created on first use.
    pub fn shared() -> Arc<Self> {
        SHARED.get_or_init(|| Arc::new(Self::new())).clone()
    }

    /// A private queue, for isolating tests or embedders.
    pub fn new() -> Self {
        Self {
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    /// Run `job` on a blocking thread once no other job holds the queue.
    ///
    /// The slot stays held until `job` returns, even if the caller stops
    /// waiting.
    pub async fn run<T, F>(&self, tag: &str, job: F) -> Result<T, LoadError>
    where
        F: FnOnce() -> Result<T, LoadError> + Send + 'static,
        T: Send + 'static,
    {
        let queued = Instant::now();
        let permit = self
            .permit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LoadError::decode(tag, "Decode queue closed"))?;
        tracing::trace!("  Queue wait: {:?}", queued.elapsed());

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| LoadError::decode(tag, format!("Task join error: {}", e)))?
    }
}

impl Default for DecodeQueue {
    fn default() -> Self {
        Self::new()
    }
}
