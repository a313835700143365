/// Typed view of the YAML job config.
pub mod config;

/// Multivalued parameter grids -> resolved flat dicts.
mod expand;

/// Dock-file bundles, INDOCK control files, configuration cross product.
mod assemble;
pub use assemble::{DockFilesSet, DockingConfiguration};

/// Matching-spheres perturbation expansion.
mod perturb;

/// Sphere file parsing and rendering.
mod sph;

/// OUTDOCK sentinel-file parsing.
mod outdock;

/// Ranked results table and molecule ranking.
mod results;
pub use results::ResultsTable;

/// The ranking criterion.
mod score;

/// Runs the pipeline components in order.
mod component;
pub use component::{run_pipeline, PipelineCtx};

/// Docking executable used when the config names no custom one.
pub const DEFAULT_DOCK_EXECUTABLE: &str = "/opt/dockopt/dock3/dock64";
pub const DOCK_EXECUTABLE_ENV_VAR: &str = "DOCKOPT_DOCK_EXECUTABLE";

/// Script handed to the batch scheduler; stages inputs and runs the docking
/// executable in each task slot.
pub const DEFAULT_DOCK_RUN_SCRIPT: &str = "/opt/dockopt/rundock.bash";
pub const DOCK_RUN_SCRIPT_ENV_VAR: &str = "DOCKOPT_DOCK_RUN_SCRIPT";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("matching_spheres_perturbation.use cannot be both true and false in one run")]
    InconsistentPerturbationFlag,
    #[error("Required modification parameter \"{0}\" is missing")]
    MissingModificationParam(String),
    #[error("Required indock parameter \"{0}\" is missing")]
    MissingIndockParam(String),
    #[error("Electrostatics phi size file \"{0}\" does not hold an integer")]
    MalformedPhiSizeFile(String),
    #[error("Malformed sphere line (bad {0} coordinate)")]
    MalformedSphereLine(&'static str),
    #[error("Malformed outdock file: {0}")]
    MalformedOutdock(String),
    #[error("Ranking needs both actives and decoys (got {0} actives, {1} decoys)")]
    DegenerateRanking(usize, usize),
    #[error("Unknown numerical operator \"{0}\" (expected +, -, * or /)")]
    UnknownOperator(String),
    #[error("\"{0}\" references the previous component's best value, but this is the first component")]
    ReferenceWithoutPrevious(String),
    #[error("\"{0}\" is not a column of the previous component's results table")]
    ReferenceNotInResults(String),
    #[error("Unknown criterion \"{0}\" (expected enrichment_score)")]
    UnknownCriterion(String),
    #[error("Custom dock executable entries must be strings")]
    BadDockExecutable,
    #[error("Input file \"{0}\" was not found in the job directory")]
    InputFileMissing(String),
    #[error("All {0} docking jobs failed; something is wrong, check the logs")]
    AllJobsFailed(usize),
    #[error("Pipeline has no components")]
    EmptyPipeline,
    #[error("Results table is empty or has no header")]
    EmptyResultsTable,
}
