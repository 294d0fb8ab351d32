//! Scripted scheduler double for exercising the lifecycle and the store
//! without a cluster.

use crate::error::{Error, Result};
use crate::partition::ResourceRequest;
use crate::slurm::{JobState, JobStatus, Scheduler};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

pub(crate) fn status(name: &str, state: JobState, node: &str) -> JobStatus {
    JobStatus {
        name: name.to_string(),
        partition: "int".to_string(),
        state,
        node: node.to_string(),
    }
}

/// Answers `query` from a script of statuses, then keeps repeating the last
/// configured one. Records every cancel it receives.
pub(crate) struct FakeScheduler {
    job_id: String,
    states: Mutex<VecDeque<JobStatus>>,
    repeat: Option<JobStatus>,
    cancels: Mutex<Vec<String>>,
}

impl FakeScheduler {
    pub fn repeating(job_id: &str, status: JobStatus) -> Self {
        Self {
            job_id: job_id.to_string(),
            states: Mutex::new(VecDeque::new()),
            repeat: Some(status),
            cancels: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(job_id: &str, states: Vec<JobStatus>, repeat: Option<JobStatus>) -> Self {
        Self {
            job_id: job_id.to_string(),
            states: Mutex::new(states.into()),
            repeat,
            cancels: Mutex::new(Vec::new()),
        }
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancels.lock().unwrap().clone()
    }
}

impl Scheduler for FakeScheduler {
    async fn submit(
        &self,
        _request: &ResourceRequest,
        _job_name: &str,
        _log_path: &Path,
        _script: &Path,
        _script_args: &[String],
    ) -> Result<String> {
        Ok(self.job_id.clone())
    }

    async fn query(&self, _job_id: &str) -> Result<JobStatus> {
        if let Some(next) = self.states.lock().unwrap().pop_front() {
            return Ok(next);
        }
        self.repeat
            .clone()
            .ok_or_else(|| Error::QueryFailed("no scripted state left".to_string()))
    }

    async fn cancel(&self, job_id: &str) -> Result<()> {
        self.cancels.lock().unwrap().push(job_id.to_string());
        Ok(())
    }
}
