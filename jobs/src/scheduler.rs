use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

use crate::Error;

/// Everything one submission needs. Task ids address slots of an array job;
/// log file names are derived from the job name inside the log dirs.
#[derive(Debug)]
pub struct SubmitRequest<'a> {
    pub job_name: &'a str,
    pub script_path: &'a Path,
    pub env_vars: &'a [(String, String)],
    pub out_log_dir: &'a Path,
    pub err_log_dir: &'a Path,
    pub task_ids: &'a [String],
    pub timeout_minutes: Option<u32>,
    pub extra_params: Option<&'a str>,
}

/// Outcome of one scheduler-level submission command. A non-empty stderr
/// means the scheduler rejected the submission.
#[derive(Debug)]
pub struct SubmitProc {
    pub stdout: String,
    pub stderr: String,
}

impl SubmitProc {
    pub fn rejected(&self) -> bool {
        !self.stderr.trim().is_empty()
    }
}

/// Capability interface over the external batch scheduler. Injected at
/// startup; the two cluster backends are interchangeable behind it, and
/// tests substitute their own.
pub trait JobScheduler {
    fn submit(&self, req: &SubmitRequest) -> Result<Vec<SubmitProc>>;
    fn job_is_on_queue(&self, job_name: &str) -> Result<bool>;
}

/// Which backend the user picked on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    Slurm,
    Sge,
}

impl SchedulerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Slurm => "slurm",
            Self::Sge => "sge",
        }
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "slurm" => Ok(Self::Slurm),
            "sge" => Ok(Self::Sge),
            _ => Err(Error::UnknownScheduler(s.to_owned())),
        }
    }

    /// Construct the backend, failing fast if its environment is incomplete.
    pub fn from_env(&self) -> Result<Box<dyn JobScheduler>, Error> {
        match self {
            Self::Slurm => Ok(Box::new(SlurmScheduler::from_env()?)),
            Self::Sge => Ok(Box::new(SgeScheduler::from_env()?)),
        }
    }
}

fn required_env(scheduler: &'static str, var: &'static str) -> Result<PathBuf, Error> {
    std::env::var(var)
        .map(PathBuf::from)
        .map_err(|_| Error::MissingEnv(scheduler, var))
}

fn run_captured(cmd: &mut Command) -> Result<SubmitProc> {
    let output = cmd
        .output()
        .with_context(|| format!("running scheduler command {:?}", cmd.get_program()))?;
    Ok(SubmitProc {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Slurm backend: submits with `sbatch`, polls with `squeue`.
pub struct SlurmScheduler {
    sbatch: PathBuf,
    squeue: PathBuf,
}

impl SlurmScheduler {
    pub const SBATCH_ENV_VAR: &'static str = "SBATCH_EXEC";
    pub const SQUEUE_ENV_VAR: &'static str = "SQUEUE_EXEC";

    pub fn from_env() -> Result<Self, Error> {
        Ok(Self {
            sbatch: required_env("slurm", Self::SBATCH_ENV_VAR)?,
            squeue: required_env("slurm", Self::SQUEUE_ENV_VAR)?,
        })
    }
}

impl JobScheduler for SlurmScheduler {
    fn submit(&self, req: &SubmitRequest) -> Result<Vec<SubmitProc>> {
        let mut cmd = Command::new(&self.sbatch);
        cmd.arg("-J").arg(req.job_name);
        cmd.arg("-o")
            .arg(req.out_log_dir.join(format!("{}_%a.out", req.job_name)));
        cmd.arg("-e")
            .arg(req.err_log_dir.join(format!("{}_%a.err", req.job_name)));
        cmd.arg(format!("--array={}", req.task_ids.join(",")));
        if let Some(minutes) = req.timeout_minutes {
            cmd.arg("-t").arg(minutes.to_string());
        }
        let env_assignments: Vec<String> = req
            .env_vars
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        cmd.arg(format!("--export=ALL,{}", env_assignments.join(",")));
        if let Some(extra) = req.extra_params {
            for arg in extra.split_whitespace() {
                cmd.arg(arg);
            }
        }
        cmd.arg(req.script_path);

        log::debug!("submitting slurm job: {cmd:?}");
        Ok(vec![run_captured(&mut cmd)?])
    }

    fn job_is_on_queue(&self, job_name: &str) -> Result<bool> {
        let mut cmd = Command::new(&self.squeue);
        cmd.arg("-h").arg("--name").arg(job_name);
        let proc = run_captured(&mut cmd)?;
        Ok(!proc.stdout.trim().is_empty())
    }
}

/// SGE backend: submits with `qsub`, polls with `qstat`.
pub struct SgeScheduler {
    qsub: PathBuf,
    qstat: PathBuf,
}

impl SgeScheduler {
    pub const QSUB_ENV_VAR: &'static str = "QSUB_EXEC";
    pub const QSTAT_ENV_VAR: &'static str = "QSTAT_EXEC";

    pub fn from_env() -> Result<Self, Error> {
        Ok(Self {
            qsub: required_env("sge", Self::QSUB_ENV_VAR)?,
            qstat: required_env("sge", Self::QSTAT_ENV_VAR)?,
        })
    }
}

impl JobScheduler for SgeScheduler {
    fn submit(&self, req: &SubmitRequest) -> Result<Vec<SubmitProc>> {
        // qsub has no sparse task lists, so submit each task separately.
        let mut procs = Vec::with_capacity(req.task_ids.len());
        for task_id in req.task_ids {
            let mut cmd = Command::new(&self.qsub);
            cmd.arg("-N").arg(req.job_name);
            cmd.arg("-o").arg(req.out_log_dir);
            cmd.arg("-e").arg(req.err_log_dir);
            cmd.arg("-t").arg(format!("{task_id}-{task_id}"));
            if let Some(minutes) = req.timeout_minutes {
                cmd.arg("-l").arg(format!("h_rt={}:00", minutes));
            }
            for (k, v) in req.env_vars {
                cmd.arg("-v").arg(format!("{k}={v}"));
            }
            if let Some(extra) = req.extra_params {
                for arg in extra.split_whitespace() {
                    cmd.arg(arg);
                }
            }
            cmd.arg(req.script_path);

            log::debug!("submitting sge task: {cmd:?}");
            procs.push(run_captured(&mut cmd)?);
        }
        Ok(procs)
    }

    fn job_is_on_queue(&self, job_name: &str) -> Result<bool> {
        let mut cmd = Command::new(&self.qstat);
        let proc = run_captured(&mut cmd)?;
        Ok(proc
            .stdout
            .lines()
            .any(|line| line.split_whitespace().any(|field| field == job_name)))
    }
}
