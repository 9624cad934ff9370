//! Delivery of load callbacks onto one home execution context.
//!
//! Collaborators finish on whatever thread they like. Every progress and
//! completion callback still runs on the home context, in the order it was
//! handed to [`CallbackScheduler::deliver`].

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tokio::sync::mpsc;

/// A callback ready to run on the home context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// An execution context callbacks can be sent to.
pub trait Executor: Send + Sync {
    /// Whether the calling thread is this executor's context.
    fn is_current(&self) -> bool;

    /// Queue `job` to run on this context. Must not wait for it.
    fn execute(&self, job: Job);
}

/// A dedicated OS thread that runs queued jobs one at a time.
///
/// The thread exits once the executor is dropped and its queue drains.
pub struct HomeExecutor {
    sender: mpsc::UnboundedSender<Job>,
    thread_id: ThreadId,
}

impl HomeExecutor {
    /// Start the home thread under `name`.
    pub fn spawn(name: &str) -> io::Result<Arc<Self>> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    // A panicking callback must not take the home thread down.
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::error!("Callback panicked on home thread");
                    }
                }
                tracing::trace!("Home thread exiting");
            })?;

        Ok(Arc::new(Self {
            sender,
            thread_id: handle.thread().id(),
        }))
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }
}

impl Executor for HomeExecutor {
    fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn execute(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::warn!("Home thread is gone, dropping callback");
        }
    }
}

/// Routes callbacks to the home context.
#[derive(Clone)]
pub struct CallbackScheduler {
    executor: Arc<dyn Executor>,
}

impl CallbackScheduler {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Run `callback` now if already on the home context, otherwise queue it
    /// there and return immediately.
    pub fn deliver(&self, callback: impl FnOnce() + Send + 'static) {
        if self.executor.is_current() {
            callback();
        } else {
            self.executor.execute(Box::new(callback));
        }
    }

    pub fn is_home(&self) -> bool {
        self.executor.is_current()
    }
}
