//! Cancellation handles and the exactly-once completion slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::AbortHandle;

use crate::error::LoadError;
use crate::scheduler::CallbackScheduler;
use crate::source::ProgressFn;
use crate::types::DecodedImage;

/// Terminal callback of a load request.
pub type CompletionFn = Box<dyn FnOnce(Result<DecodedImage, LoadError>) + Send + 'static>;

/// Something that can abandon in-flight work. `cancel` must be idempotent.
pub trait Cancel: Send + Sync {
    fn cancel(&self);
}

/// Handle returned by every load. Cloning shares the same request.
///
/// Cancelling is best effort: only remote loads stop their work and complete
/// with [`LoadError::Cancelled`]. For every other source it does nothing.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<dyn Cancel>,
}

impl CancellationToken {
    pub fn new(cancel: impl Cancel + 'static) -> Self {
        Self {
            inner: Arc::new(cancel),
        }
    }

    /// A token whose `cancel` does nothing.
    pub fn noop() -> Self {
        Self::new(NoopCancel)
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken").finish_non_exhaustive()
    }
}

/// Cancel capability for sources that cannot stop their work.
pub struct NoopCancel;

impl Cancel for NoopCancel {
    fn cancel(&self) {}
}

/// Aborts the request task and completes the request as cancelled.
pub(crate) struct AbortOnCancel {
    abort: AbortHandle,
    completion: Arc<Completion>,
}

impl AbortOnCancel {
    pub(crate) fn new(abort: AbortHandle, completion: Arc<Completion>) -> Self {
        Self { abort, completion }
    }
}

impl Cancel for AbortOnCancel {
    fn cancel(&self) {
        self.abort.abort();
        let tag = self.completion.tag().to_string();
        if self.completion.finish(Err(LoadError::Cancelled { tag })) {
            tracing::debug!("Cancelled {}", self.completion.tag());
        }
    }
}

/// Holds the completion callback until the first terminal result arrives.
///
/// Whoever calls [`finish`](Completion::finish) first wins; later results are
/// discarded, so the callback fires exactly once.
pub(crate) struct Completion {
    tag: String,
    callback: Mutex<Option<CompletionFn>>,
    finished: AtomicBool,
    scheduler: CallbackScheduler,
}

impl Completion {
    pub(crate) fn new(tag: String, callback: CompletionFn, scheduler: CallbackScheduler) -> Arc<Self> {
        Arc::new(Self {
            tag,
            callback: Mutex::new(Some(callback)),
            finished: AtomicBool::new(false),
            scheduler,
        })
    }

    pub(crate) fn tag(&self) -> &str {
        &self.tag
    }

    /// Deliver `result` through the scheduler. Returns `false` if the request
    /// had already finished.
    pub(crate) fn finish(&self, result: Result<DecodedImage, LoadError>) -> bool {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(callback) = callback else {
            return false;
        };
        self.finished.store(true, Ordering::Release);
        self.scheduler.deliver(move || callback(result));
        true
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Wrap `progress` so events reach the home context and stop once the
    /// request has finished.
    pub(crate) fn forward_progress(self: &Arc<Self>, progress: ProgressFn) -> ProgressFn {
        let completion = Arc::clone(self);
        Arc::new(move |loaded, total| {
            if completion.is_finished() {
                return;
            }
            let progress = progress.clone();
            let check = completion.clone();
            completion.scheduler.deliver(move || {
                if !check.is_finished() {
                    progress(loaded, total);
                }
            });
        })
    }
}

/// Owned by the request task. If the task is dropped before it finishes,
/// as when the runtime shuts down, the request completes as cancelled.
pub(crate) struct FinishOnDrop(pub(crate) Arc<Completion>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        if self.0.is_finished() {
            return;
        }
        let tag = self.0.tag().to_string();
        if self.0.finish(Err(LoadError::Cancelled { tag })) {
            tracing::debug!("Request task for {} dropped before finishing", self.0.tag());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::HomeExecutor;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    fn completion() -> (Arc<Completion>, std_mpsc::Receiver<Result<DecodedImage, LoadError>>) {
        let home = HomeExecutor::spawn("test-home").unwrap();
        let (tx, rx) = std_mpsc::channel();
        let completion = Completion::new(
            "https://example.com/a.png".into(),
            Box::new(move |result| tx.send(result).unwrap()),
            CallbackScheduler::new(home),
        );
        (completion, rx)
    }

    #[test]
    fn test_finish_is_exactly_once() {
        let (completion, rx) = completion();
        assert!(completion.finish(Err(LoadError::not_found("a"))));
        assert!(!completion.finish(Err(LoadError::decode("a", "late"))));
        assert!(completion.is_finished());

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(first, Err(LoadError::NotFound { .. })));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_progress_stops_after_finish() {
        let (completion, rx) = completion();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let progress = completion.forward_progress(Arc::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        completion.finish(Err(LoadError::not_found("a")));
        progress(10, Some(100));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_finish_on_drop_cancels_unfinished() {
        let (completion, rx) = completion();
        drop(FinishOnDrop(completion));
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(result, Err(LoadError::Cancelled { .. })));
    }

    #[test]
    fn test_finish_on_drop_after_finish_is_silent() {
        let (completion, rx) = completion();
        let guard = FinishOnDrop(completion);
        assert!(guard.0.finish(Err(LoadError::not_found("a"))));
        drop(guard);

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(first, Err(LoadError::NotFound { .. })));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_noop_token_is_idempotent() {
        let token = CancellationToken::noop();
        token.cancel();
        token.clone().cancel();
    }

    #[tokio::test]
    async fn test_abort_on_cancel_delivers_cancelled_once() {
        let (completion, rx) = completion();
        let task = tokio::spawn(std::future::pending::<()>());
        let token = CancellationToken::new(AbortOnCancel::new(task.abort_handle(), completion));

        token.cancel();
        token.cancel();
        assert!(task.await.unwrap_err().is_cancelled());

        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(result, Err(LoadError::Cancelled { .. })));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
