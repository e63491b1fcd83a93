//! Job orchestration: the worker pool and the end-to-end sorting job.

pub mod job;
pub mod scheduler;

pub use job::{
    JobResult,
    JobState,
    JobTracker,
    SortJob,
};
pub use scheduler::Scheduler;
