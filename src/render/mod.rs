//! Background rendering: executors, cancellable tasks and page surfaces

pub mod executor;
pub mod surface;
pub mod task;

pub use executor::{Executor, Job, QueuedExecutor, ThreadPoolExecutor};
pub use surface::{
    HighQualityPatch, LoadState, PageSurface, PatchState, PostProcessors, SurfaceConfig,
};
pub use task::{CancelToken, TaskHandle, TaskId, TaskPoll};

/// Default number of render worker threads
pub const DEFAULT_WORKERS: usize = 2;
