use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;

use crate::{DockingJob, JobScheduler};

/// A job that made it all the way to a parsed result row.
#[derive(Debug)]
pub struct ProcessedJob<T> {
    /// position of the job in the submitted list
    pub index: usize,
    pub job: DockingJob,
    pub row: T,
}

/// Fair round-robin processing of submitted jobs.
///
/// Jobs live in a FIFO queue: the head job is popped, still-running jobs go
/// back to the tail (after a short sleep to bound CPU spin), and a job whose
/// sentinel is missing after a grace re-check is treated as failed and
/// resubmitted until its reattempt budget runs out. FIFO discipline means
/// every pending job is revisited within one full queue cycle, so none
/// starves.
pub struct JobQueue {
    max_reattempts: u32,
    poll_interval: Duration,
}

impl JobQueue {
    pub fn new(max_reattempts: u32, poll_interval: Duration) -> Self {
        Self {
            max_reattempts,
            poll_interval,
        }
    }

    /// Drive every job to completion or permanent abandonment. `parse` turns
    /// a complete job's output into a result row; a parse error counts as an
    /// execution failure and burns a reattempt.
    ///
    /// A job whose sentinel never appears is submitted `max_reattempts + 1`
    /// times in total (counting the submission that happened before this
    /// call) and then dropped, contributing no row.
    pub fn process<T, F>(
        &self,
        scheduler: &dyn JobScheduler,
        jobs: Vec<DockingJob>,
        mut parse: F,
    ) -> Result<Vec<ProcessedJob<T>>>
    where
        F: FnMut(&DockingJob) -> Result<T>,
    {
        let mut results = Vec::with_capacity(jobs.len());
        let mut queue: VecDeque<(usize, DockingJob)> = jobs.into_iter().enumerate().collect();

        while let Some((index, mut job)) = queue.pop_front() {
            if job.is_on_queue(scheduler)? {
                // still running; revisit after everyone else gets a turn
                queue.push_back((index, job));
                thread::sleep(self.poll_interval);
                continue;
            }

            if !job.is_complete() {
                // grace re-check in case the job finished just now:
                thread::sleep(self.poll_interval);
                if !job.is_complete() {
                    log::warn!("job failure / time out witnessed for job: {}", job.name);
                    if self.give_up(&mut job, scheduler)? {
                        continue;
                    }
                    queue.push_back((index, job));
                    continue;
                }
            }

            match parse(&job) {
                Ok(row) => {
                    log::info!("job \"{}\" completed", job.name.cyan());
                    results.push(ProcessedJob { index, job, row });
                }
                Err(e) => {
                    log::warn!("failed to parse output of job \"{}\": {e:#}", job.name);
                    if self.give_up(&mut job, scheduler)? {
                        continue;
                    }
                    queue.push_back((index, job));
                }
            }
        }

        Ok(results)
    }

    /// True if the job's reattempt budget is spent (the job is abandoned);
    /// otherwise resubmits it, not skipping complete tasks since their
    /// output is what just failed us.
    fn give_up(&self, job: &mut DockingJob, scheduler: &dyn JobScheduler) -> Result<bool> {
        if job.attempts > self.max_reattempts {
            log::warn!("max reattempts exhausted; abandoning job: {}", job.name);
            return Ok(true);
        }
        job.submit(scheduler, false)?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::FakeScheduler;
    use std::fs;
    use std::path::Path;

    const TICK: Duration = Duration::from_millis(1);

    fn submitted_job(dir: &Path, name: &str, sched: &FakeScheduler) -> DockingJob {
        let mut job = DockingJob::create(
            name.to_owned(),
            &dir.join(name),
            vec!["1".into(), "2".into()],
            "/bin/true".into(),
            vec![],
            None,
        )
        .unwrap();
        job.submit(sched, true).unwrap();
        job
    }

    fn complete(job: &DockingJob) {
        for task_id in &job.task_ids {
            fs::write(job.task_sentinel_path(task_id), "ok").unwrap();
        }
    }

    #[test]
    fn test_retry_bound_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let sched = FakeScheduler::new();
        let job = submitted_job(dir.path(), "never-finishes", &sched);

        let queue = JobQueue::new(2, TICK);
        let rows = queue
            .process::<(), _>(&sched, vec![job], |_| unreachable!("job never completes"))
            .unwrap();

        assert!(rows.is_empty());
        // 1 initial submission + exactly max_reattempts resubmissions:
        assert_eq!(sched.submissions_for("never-finishes"), 3);
    }

    #[test]
    fn test_complete_job_is_parsed_once() {
        let dir = tempfile::tempdir().unwrap();
        let sched = FakeScheduler::new();
        let job = submitted_job(dir.path(), "done", &sched);
        complete(&job);

        let queue = JobQueue::new(2, TICK);
        let mut calls = 0;
        let rows = queue
            .process(&sched, vec![job], |_| {
                calls += 1;
                Ok(calls)
            })
            .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].index, 0);
        assert_eq!(sched.submissions_for("done"), 1);
    }

    #[test]
    fn test_failed_job_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let sched = FakeScheduler::new();
        let stuck = submitted_job(dir.path(), "stuck", &sched);
        let fine = submitted_job(dir.path(), "fine", &sched);
        complete(&fine);

        let queue = JobQueue::new(0, TICK);
        let rows = queue
            .process(&sched, vec![stuck, fine], |job| Ok(job.name.clone()))
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row, "fine");
        assert_eq!(rows[0].index, 1);
    }

    #[test]
    fn test_parse_failure_burns_reattempts_then_abandons() {
        let dir = tempfile::tempdir().unwrap();
        let sched = FakeScheduler::new();
        let job = submitted_job(dir.path(), "garbled", &sched);
        complete(&job);

        let queue = JobQueue::new(1, TICK);
        let mut parse_calls = 0;
        let rows = queue
            .process::<(), _>(&sched, vec![job], |_| {
                parse_calls += 1;
                anyhow::bail!("malformed output")
            })
            .unwrap();

        assert!(rows.is_empty());
        // parse succeeded->failed once; the resubmission wiped the sentinel,
        // so the second visit fails the completeness check instead:
        assert_eq!(parse_calls, 1);
        assert_eq!(sched.submissions_for("garbled"), 2);
    }

    #[test]
    fn test_results_arrive_for_all_completed_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let sched = FakeScheduler::new();
        let jobs: Vec<DockingJob> = (0..4)
            .map(|i| {
                let job = submitted_job(dir.path(), &format!("job-{i}"), &sched);
                complete(&job);
                job
            })
            .collect();

        let queue = JobQueue::new(0, TICK);
        let rows = queue
            .process(&sched, jobs, |job| Ok(job.name.clone()))
            .unwrap();

        let mut names: Vec<String> = rows.iter().map(|r| r.row.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["job-0", "job-1", "job-2", "job-3"]);
    }
}
