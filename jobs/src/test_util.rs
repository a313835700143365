use std::cell::RefCell;

use anyhow::Result;

use crate::{JobScheduler, SubmitProc, SubmitRequest};

/// In-memory scheduler that records submissions and never runs anything.
pub(crate) struct FakeScheduler {
    pub submissions: RefCell<Vec<(String, Vec<String>)>>,
    pub on_queue: bool,
    pub reject: bool,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self {
            submissions: RefCell::new(Vec::new()),
            on_queue: false,
            reject: false,
        }
    }

    pub fn submissions_for(&self, job_name: &str) -> usize {
        self.submissions
            .borrow()
            .iter()
            .filter(|(name, _)| name == job_name)
            .count()
    }
}

impl JobScheduler for FakeScheduler {
    fn submit(&self, req: &SubmitRequest) -> Result<Vec<SubmitProc>> {
        self.submissions
            .borrow_mut()
            .push((req.job_name.to_owned(), req.task_ids.to_vec()));
        let stderr = if self.reject {
            "invalid submission parameters".to_owned()
        } else {
            String::new()
        };
        Ok(vec![SubmitProc {
            stdout: "submitted".into(),
            stderr,
        }])
    }

    fn job_is_on_queue(&self, _job_name: &str) -> Result<bool> {
        Ok(self.on_queue)
    }
}
