use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use jobs::SchedulerKind;

use crate::args::Args;
use crate::fs::paths;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("No scheduler specified; use --scheduler (slurm or sge)")]
    NoSchedulerSpecified,
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. defaults are added in.
#[derive(Debug)]
pub struct Settings {
    pub job_dir: PathBuf,
    pub config: PathBuf,
    pub scheduler: Option<SchedulerKind>,
    pub actives_tgz: PathBuf,
    pub decoys_tgz: PathBuf,
    pub max_reattempts: u32,
    pub timeout_minutes: Option<u32>,
    pub poll_interval: Duration,
    pub yes: bool,
    pub verbose: u8,
    pub dry_run: bool,

    pub init: bool,
    pub run: bool,
}

impl Settings {
    /// Fail unless a scheduler was picked on the command line.
    pub fn require_scheduler(&self) -> Result<SchedulerKind, Error> {
        self.scheduler.ok_or(Error::NoSchedulerSpecified)
    }
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let job_dir = PathBuf::from(args.effective_job_dir());

        let config = match &args.config {
            Some(path) => PathBuf::from(path),
            None => job_dir.join(paths::CONFIG_FILE_NAME),
        };
        let actives_tgz = match &args.actives_tgz {
            Some(path) => PathBuf::from(path),
            None => job_dir.join(paths::ACTIVES_TGZ_FILE_NAME),
        };
        let decoys_tgz = match &args.decoys_tgz {
            Some(path) => PathBuf::from(path),
            None => job_dir.join(paths::DECOYS_TGZ_FILE_NAME),
        };

        let scheduler = match &args.scheduler {
            Some(name) => Some(SchedulerKind::parse(name)?),
            None => None,
        };

        // for now, we scaffold if init is specified, run otherwise.
        let init = args.init;
        let run = !args.init;

        Ok(Self {
            job_dir,
            config,
            scheduler,
            actives_tgz,
            decoys_tgz,
            max_reattempts: args.max_reattempts,
            timeout_minutes: args.timeout_minutes,
            poll_interval: Duration::from_secs(args.poll_interval_seconds),
            yes: args.yes,
            verbose: args.verbose,
            dry_run: args.dry_run,

            init,
            run,
        })
    }
}
