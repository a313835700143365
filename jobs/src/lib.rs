/// Batch scheduler abstraction and its Slurm/SGE backends.
mod scheduler;
pub use scheduler::{JobScheduler, SchedulerKind, SgeScheduler, SlurmScheduler, SubmitProc, SubmitRequest};

/// One submitted docking job and its completion sentinel.
mod job;
pub use job::{DockingJob, SubmitOutcome, SENTINEL_FILE_NAME};

/// Fair FIFO polling loop with bounded reattempts.
mod queue;
pub use queue::{JobQueue, ProcessedJob};

#[cfg(test)]
pub(crate) mod test_util;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Environment variable {1} is required to use the {0} scheduler")]
    MissingEnv(&'static str, &'static str),
    #[error("Unknown scheduler \"{0}\" (expected one of: slurm, sge)")]
    UnknownScheduler(String),
}
