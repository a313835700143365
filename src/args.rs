use clap::Parser;

const CMD_NAME: &str = "dopt";
const DEFAULT_JOB_DIR: &str = ".";
const DEFAULT_INIT_JOB_DIR: &str = "dockopt_job";

/// Stores our command-line args format.
#[derive(Parser)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Scaffold a new job directory (with a template config) and exit
    #[arg(short, long)]
    pub init: bool,

    /// Job directory
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_JOB_DIR)]
    #[arg(env = "DOCKOPT_JOB_DIR")]
    pub job_dir: String,

    /// Config file (defaults to dockopt_config.yaml in the job directory)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Batch scheduler to submit docking jobs to (slurm or sge)
    #[arg(short, long, value_name = "SCHEDULER")]
    #[arg(env = "DOCKOPT_SCHEDULER")]
    pub scheduler: Option<String>,

    /// Actives tarball (defaults to actives.tgz in the job directory)
    #[arg(long, value_name = "FILE")]
    pub actives_tgz: Option<String>,

    /// Decoys tarball (defaults to decoys.tgz in the job directory)
    #[arg(long, value_name = "FILE")]
    pub decoys_tgz: Option<String>,

    /// Times a failed docking job is resubmitted before it is abandoned
    #[arg(short = 'r', long, value_name = "N", default_value_t = 0)]
    pub max_reattempts: u32,

    /// Per-job wall-clock timeout passed to the scheduler
    #[arg(short, long, value_name = "MINUTES")]
    pub timeout_minutes: Option<u32>,

    /// Seconds slept between job queue poll iterations
    #[arg(long, value_name = "SECONDS", default_value_t = 1)]
    pub poll_interval_seconds: u64,

    /// Bypass user confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Print additional debugging info
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Dry run; print info but don't modify anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

impl Args {
    /// An unspecified job dir means "here" for a run, but a fresh scaffold
    /// dir for --init.
    pub fn effective_job_dir(&self) -> &str {
        if self.init && self.job_dir == DEFAULT_JOB_DIR {
            DEFAULT_INIT_JOB_DIR
        } else {
            &self.job_dir
        }
    }
}
