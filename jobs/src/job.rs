use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::{JobScheduler, SubmitRequest};

/// A task is complete when this file exists in its task directory. Its mere
/// existence is the completion signal; its contents are parsed downstream.
pub const SENTINEL_FILE_NAME: &str = "OUTDOCK.0";

const OUT_LOG_DIR_NAME: &str = "out_logs";
const ERR_LOG_DIR_NAME: &str = "err_logs";

/// What happened when we asked the scheduler to take a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted,
    /// rejected at submission time, distinct from later execution failure
    SubmitFailed,
    SkippedAlreadyComplete,
    SkippedOnQueue,
}

/// One unit of work against the external scheduler. All status is derived by
/// polling scheduler state and sentinel files; nothing is cached past a poll.
#[derive(Debug)]
pub struct DockingJob {
    pub name: String,
    pub dir: PathBuf,
    pub task_ids: Vec<String>,
    pub script_path: PathBuf,
    pub env_vars: Vec<(String, String)>,
    pub timeout_minutes: Option<u32>,
    /// submissions so far, including the first
    pub attempts: u32,
}

impl DockingJob {
    /// Create the job, its task directories, and its log directories.
    pub fn create(
        name: String,
        dir: &Path,
        task_ids: Vec<String>,
        script_path: PathBuf,
        env_vars: Vec<(String, String)>,
        timeout_minutes: Option<u32>,
    ) -> Result<Self> {
        for task_id in &task_ids {
            fs::create_dir_all(dir.join(task_id))
                .with_context(|| format!("creating task dir for job \"{name}\""))?;
        }
        fs::create_dir_all(dir.join(OUT_LOG_DIR_NAME)).context("creating out log dir")?;
        fs::create_dir_all(dir.join(ERR_LOG_DIR_NAME)).context("creating err log dir")?;
        Ok(Self {
            name,
            dir: dir.to_path_buf(),
            task_ids,
            script_path,
            env_vars,
            timeout_minutes,
            attempts: 0,
        })
    }

    pub fn task_sentinel_path(&self, task_id: &str) -> PathBuf {
        self.dir.join(task_id).join(SENTINEL_FILE_NAME)
    }

    pub fn task_is_complete(&self, task_id: &str) -> bool {
        self.task_sentinel_path(task_id).exists()
    }

    /// All tasks' sentinel files exist.
    pub fn is_complete(&self) -> bool {
        self.task_ids.iter().all(|id| self.task_is_complete(id))
    }

    pub fn is_on_queue(&self, scheduler: &dyn JobScheduler) -> Result<bool> {
        scheduler.job_is_on_queue(&self.name)
    }

    /// Submit (or resubmit) this job. Incomplete task directories are reset
    /// so a rerun starts clean; complete tasks are left alone when
    /// `skip_if_complete` is set.
    pub fn submit(
        &mut self,
        scheduler: &dyn JobScheduler,
        skip_if_complete: bool,
    ) -> Result<SubmitOutcome> {
        if self.is_on_queue(scheduler)? {
            return Ok(SubmitOutcome::SkippedOnQueue);
        }
        if skip_if_complete && self.is_complete() {
            return Ok(SubmitOutcome::SkippedAlreadyComplete);
        }

        let mut task_ids_to_submit = Vec::with_capacity(self.task_ids.len());
        for task_id in &self.task_ids {
            if self.task_is_complete(task_id) && skip_if_complete {
                continue;
            }
            let task_dir = self.dir.join(task_id);
            if task_dir.exists() {
                fs::remove_dir_all(&task_dir)
                    .with_context(|| format!("resetting task dir for job \"{}\"", self.name))?;
            }
            fs::create_dir_all(&task_dir).context("recreating task dir")?;
            task_ids_to_submit.push(task_id.clone());
        }

        self.attempts += 1;

        let procs = scheduler.submit(&SubmitRequest {
            job_name: &self.name,
            script_path: &self.script_path,
            env_vars: &self.env_vars,
            out_log_dir: &self.dir.join(OUT_LOG_DIR_NAME),
            err_log_dir: &self.dir.join(ERR_LOG_DIR_NAME),
            task_ids: &task_ids_to_submit,
            timeout_minutes: self.timeout_minutes,
            extra_params: None,
        })?;

        if procs.iter().any(|p| p.rejected()) {
            for p in procs.iter().filter(|p| p.rejected()) {
                log::warn!("scheduler rejected job \"{}\": {}", self.name, p.stderr.trim());
            }
            Ok(SubmitOutcome::SubmitFailed)
        } else {
            Ok(SubmitOutcome::Submitted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::FakeScheduler;

    fn job_in(dir: &Path) -> DockingJob {
        DockingJob::create(
            "j".into(),
            dir,
            vec!["1".into(), "2".into()],
            "/bin/true".into(),
            vec![],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_submit_counts_attempts_and_submits_all_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let sched = FakeScheduler::new();
        let mut job = job_in(dir.path());

        let outcome = job.submit(&sched, true).unwrap();
        assert_eq!(outcome, SubmitOutcome::Submitted);
        assert_eq!(job.attempts, 1);
        assert_eq!(sched.submissions.borrow()[0].1, vec!["1", "2"]);
    }

    #[test]
    fn test_submit_skips_when_sentinels_exist() {
        let dir = tempfile::tempdir().unwrap();
        let sched = FakeScheduler::new();
        let mut job = job_in(dir.path());
        for task_id in ["1", "2"] {
            fs::write(job.task_sentinel_path(task_id), "done").unwrap();
        }

        let outcome = job.submit(&sched, true).unwrap();
        assert_eq!(outcome, SubmitOutcome::SkippedAlreadyComplete);
        assert_eq!(job.attempts, 0);
        assert!(sched.submissions.borrow().is_empty());
    }

    #[test]
    fn test_resubmit_resets_incomplete_tasks_only() {
        let dir = tempfile::tempdir().unwrap();
        let sched = FakeScheduler::new();
        let mut job = job_in(dir.path());
        fs::write(job.task_sentinel_path("1"), "done").unwrap();

        let outcome = job.submit(&sched, true).unwrap();
        assert_eq!(outcome, SubmitOutcome::Submitted);
        assert_eq!(sched.submissions.borrow()[0].1, vec!["2"]);
        // the complete task's sentinel survives:
        assert!(job.task_is_complete("1"));
    }

    #[test]
    fn test_full_resubmit_resets_everything() {
        let dir = tempfile::tempdir().unwrap();
        let sched = FakeScheduler::new();
        let mut job = job_in(dir.path());
        fs::write(job.task_sentinel_path("1"), "done").unwrap();

        job.submit(&sched, false).unwrap();
        assert!(!job.task_is_complete("1"));
        assert_eq!(sched.submissions.borrow()[0].1, vec!["1", "2"]);
    }

    #[test]
    fn test_rejected_submission_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = FakeScheduler::new();
        sched.reject = true;
        let mut job = job_in(dir.path());

        let outcome = job.submit(&sched, true).unwrap();
        assert_eq!(outcome, SubmitOutcome::SubmitFailed);
        // the attempt still counts against the reattempt budget:
        assert_eq!(job.attempts, 1);
    }

    #[test]
    fn test_submit_skipped_while_on_scheduler_queue() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = FakeScheduler::new();
        sched.on_queue = true;
        let mut job = job_in(dir.path());

        let outcome = job.submit(&sched, true).unwrap();
        assert_eq!(outcome, SubmitOutcome::SkippedOnQueue);
        assert_eq!(job.attempts, 0);
    }
}
