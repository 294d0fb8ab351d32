use crate::slurm::JobState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request for Slurm partition '{partition}': {}", violations.join("; "))]
    InvalidRequest {
        partition: String,
        violations: Vec<String>,
    },

    #[error("`sbatch` had a non-zero exit status: {0}")]
    SubmissionFailed(String),

    #[error("job {job_id} failed to schedule correctly (state {state})")]
    ScheduleFailed { job_id: String, state: JobState },

    #[error("`sacct` failed: {0}")]
    QueryFailed(String),

    #[error("`scancel` had a non-zero exit status: {0}")]
    CancelFailed(String),

    #[error("kill signal received while waiting on job {job_id}")]
    Interrupted { job_id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
