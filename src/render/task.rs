//! Cancellable background tasks
//!
//! A task runs once on an [`Executor`] and hands its result back through its own
//! channel. Dropping or cancelling the handle flips the task's token; a task
//! that observes the token skips its work or throws its result away, so a stale
//! result never reaches the interactive side.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use flume::{Receiver, TryRecvError};
use log::debug;

use super::executor::{Executor, Job};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for background tasks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

impl TaskId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Cooperative cancellation flag shared between a handle and its task
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of polling a task
#[derive(Debug, PartialEq, Eq)]
pub enum TaskPoll<T> {
    Ready(T),
    Pending,
    /// The task finished without a result (cancelled, or the worker went away)
    Abandoned,
}

/// Interactive-side handle to a spawned task; cancels the task when dropped
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: TaskId,
    token: CancelToken,
    result: Receiver<T>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Take the result if the task has delivered it
    pub fn try_take(&self) -> TaskPoll<T> {
        match self.result.try_recv() {
            Ok(value) => TaskPoll::Ready(value),
            Err(TryRecvError::Empty) => TaskPoll::Pending,
            Err(TryRecvError::Disconnected) => TaskPoll::Abandoned,
        }
    }
}

impl<T> Drop for TaskHandle<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Run `work` on `executor` and return a handle to its result
pub fn spawn<T, F>(executor: &dyn Executor, work: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> T + Send + 'static,
{
    let id = TaskId::next();
    let token = CancelToken::new();
    let (tx, rx) = flume::bounded(1);

    let task_token = token.clone();
    let job: Job = Box::new(move || {
        if task_token.is_cancelled() {
            debug!("Task {id:?} cancelled before start");
            return;
        }
        let result = work(&task_token);
        if task_token.is_cancelled() {
            debug!("Dropping stale result of task {id:?}");
            return;
        }
        let _ = tx.send(result);
    });
    executor.execute(job);

    TaskHandle {
        id,
        token,
        result: rx,
    }
}
