//! Executors that run background jobs

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::thread::JoinHandle;

use flume::{Receiver, Sender};
use log::{debug, error};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere to run jobs off the interactive thread
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

enum WorkerMessage {
    Run(Job),
    Shutdown,
}

/// Fixed pool of worker threads pulling from one shared queue
pub struct ThreadPoolExecutor {
    requests: Sender<WorkerMessage>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPoolExecutor {
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        // flume receivers can be cloned, so every worker pulls from the same queue
        let (requests, rx) = flume::unbounded();
        let workers = (0..num_workers.max(1))
            .map(|n| {
                let rx = rx.clone();
                std::thread::spawn(move || worker_loop(n, rx))
            })
            .collect();
        Self { requests, workers }
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Stop the workers after the queued jobs and wait for them
    pub fn shutdown(mut self) {
        self.signal_shutdown();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Render worker exited with a panic");
            }
        }
    }

    fn signal_shutdown(&self) {
        for _ in &self.workers {
            let _ = self.requests.send(WorkerMessage::Shutdown);
        }
    }
}

impl Default for ThreadPoolExecutor {
    fn default() -> Self {
        Self::new(super::DEFAULT_WORKERS)
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute(&self, job: Job) {
        let _ = self.requests.send(WorkerMessage::Run(job));
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

impl std::fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolExecutor")
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

fn worker_loop(n: usize, requests: Receiver<WorkerMessage>) {
    debug!("Render worker {n} started");
    for message in requests {
        match message {
            WorkerMessage::Run(job) => {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!("Render job panicked on worker {n}");
                }
            }
            WorkerMessage::Shutdown => break,
        }
    }
    debug!("Render worker {n} stopped");
}

/// Holds jobs until the host runs them, for single-threaded hosts and tests
#[derive(Default)]
pub struct QueuedExecutor {
    jobs: Mutex<VecDeque<Job>>,
}

impl QueuedExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Run the oldest queued job; false when the queue was empty
    pub fn run_next(&self) -> bool {
        // Pop before running so a job may queue more work
        let job = self.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until the queue is empty, including jobs queued meanwhile
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Job>> {
        self.jobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Executor for QueuedExecutor {
    fn execute(&self, job: Job) {
        self.lock().push_back(job);
    }
}

impl std::fmt::Debug for QueuedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedExecutor")
            .field("pending", &self.pending())
            .finish()
    }
}
