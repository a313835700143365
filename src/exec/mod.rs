/// Lazily realizes build graph nodes by running the steps that produce them.
mod executor;
pub use executor::GraphExecutor;

/// Runs a step's shell script, teeing output to log files.
mod run_cmd;
use run_cmd::run_script;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Step program failed in \"{0}\"")]
    SubprocessFailed(String),
    #[error("Expected file not found after running its step: {0}")]
    ExpectedFileNotFound(String),
    #[error("Artifact \"{0}\" is missing but its producing step reports done (internal consistency violation)")]
    DoneButMissing(String),
    #[error("Externally supplied input file is missing from the working directory: {0}")]
    ExternalInputMissing(String),
}
