use crate::config::SlurmConfig;
use crate::error::{Error, Result};
use crate::partition::ResourceRequest;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use strum::Display;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

const SACCT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Scheduling state reported by `sacct`'s State column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Unknown,
}

impl JobState {
    /// Parse sacct output. Cancellations are reported as
    /// `CANCELLED by <uid>`, so only the first word counts.
    pub fn from_sacct(raw: &str) -> Self {
        match raw.split_whitespace().next().unwrap_or("") {
            "PENDING" => JobState::Pending,
            "RUNNING" => JobState::Running,
            "COMPLETED" => JobState::Completed,
            "FAILED" => JobState::Failed,
            "CANCELLED" => JobState::Cancelled,
            _ => JobState::Unknown,
        }
    }

    /// A job still holding (or waiting for) an allocation.
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Pending | JobState::Running)
    }
}

/// One `sacct` accounting row for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub name: String,
    pub partition: String,
    pub state: JobState,
    pub node: String,
}

/// The scheduler capability surface the lifecycle needs: submit a job,
/// re-query its state, cancel it.
#[allow(async_fn_in_trait)]
pub trait Scheduler {
    async fn submit(
        &self,
        request: &ResourceRequest,
        job_name: &str,
        log_path: &Path,
        script: &Path,
        script_args: &[String],
    ) -> Result<String>;

    async fn query(&self, job_id: &str) -> Result<JobStatus>;

    async fn cancel(&self, job_id: &str) -> Result<()>;
}

/// Gateway to the cluster's Slurm tools. The only component that talks to
/// the scheduler; everything goes through `sbatch`/`sacct`/`scancel`.
#[derive(Debug, Clone)]
pub struct Slurm {
    sbatch: PathBuf,
    sacct: PathBuf,
    scancel: PathBuf,
    query_timeout: Duration,
}

impl Slurm {
    pub fn new(config: &SlurmConfig) -> Self {
        Self {
            sbatch: config.sbatch.clone(),
            sacct: config.sacct.clone(),
            scancel: config.scancel.clone(),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        }
    }
}

impl Scheduler for Slurm {
    async fn submit(
        &self,
        request: &ResourceRequest,
        job_name: &str,
        log_path: &Path,
        script: &Path,
        script_args: &[String],
    ) -> Result<String> {
        let output = Command::new(&self.sbatch)
            .args(request.sbatch_args(job_name, log_path))
            .arg(script)
            .args(script_args)
            .output()
            .await?;
        if !output.status.success() {
            return Err(Error::SubmissionFailed(stderr_text(&output)));
        }
        // --parsable prints "jobid" or "jobid;cluster"
        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = stdout.trim().split(';').next().unwrap_or_default();
        if job_id.is_empty() {
            return Err(Error::SubmissionFailed(
                "sbatch returned no job id".to_string(),
            ));
        }
        Ok(job_id.to_string())
    }

    async fn query(&self, job_id: &str) -> Result<JobStatus> {
        let deadline = Instant::now() + self.query_timeout;
        loop {
            let output = Command::new(&self.sacct)
                .args(["-PXn", "--format", "JobName,Partition,State,NodeList"])
                .args(["-j", job_id])
                .output()
                .await?;
            if !output.status.success() {
                return Err(Error::QueryFailed(stderr_text(&output)));
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            let line = stdout.lines().next().unwrap_or("").trim();
            // A freshly submitted job is not visible to accounting right
            // away, and the first visible row can be an allocation
            // placeholder. Retry until a real row shows up.
            if !line.is_empty() && !line.starts_with("allocation") {
                return parse_status_line(line);
            }

            if Instant::now() >= deadline {
                return Err(Error::QueryFailed(format!(
                    "job {job_id} not visible to sacct after {}s",
                    self.query_timeout.as_secs()
                )));
            }
            debug!("job {job_id} not yet visible to sacct, retrying");
            tokio::time::sleep(SACCT_RETRY_INTERVAL).await;
        }
    }

    async fn cancel(&self, job_id: &str) -> Result<()> {
        let output = Command::new(&self.scancel)
            .args(["-b", "-s", "TERM", job_id])
            .output()
            .await?;
        if !output.status.success() {
            return Err(Error::CancelFailed(stderr_text(&output)));
        }
        Ok(())
    }
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn parse_status_line(line: &str) -> Result<JobStatus> {
    let fields: Vec<&str> = line.split('|').collect();
    let [name, partition, state, node] = fields.as_slice() else {
        return Err(Error::QueryFailed(format!("malformed sacct line: {line}")));
    };
    Ok(JobStatus {
        name: name.to_string(),
        partition: partition.to_string(),
        state: JobState::from_sacct(state),
        node: node.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_state_parsing() {
        assert_eq!(JobState::from_sacct("PENDING"), JobState::Pending);
        assert_eq!(JobState::from_sacct("RUNNING"), JobState::Running);
        assert_eq!(JobState::from_sacct("COMPLETED"), JobState::Completed);
        assert_eq!(JobState::from_sacct("FAILED"), JobState::Failed);
        assert_eq!(JobState::from_sacct("CANCELLED by 10274"), JobState::Cancelled);
        assert_eq!(JobState::from_sacct("TIMEOUT"), JobState::Unknown);
        assert_eq!(JobState::from_sacct(""), JobState::Unknown);
    }

    #[test]
    fn test_active_states() {
        assert!(JobState::Pending.is_active());
        assert!(JobState::Running.is_active());
        assert!(!JobState::Completed.is_active());
        assert!(!JobState::Cancelled.is_active());
    }

    #[test]
    fn test_parse_status_line() {
        let status = parse_status_line("vscode_server|int|RUNNING|compute003").unwrap();
        assert_eq!(status.name, "vscode_server");
        assert_eq!(status.partition, "int");
        assert_eq!(status.state, JobState::Running);
        assert_eq!(status.node, "compute003");
    }

    #[test]
    fn test_parse_malformed_line() {
        let err = parse_status_line("vscode_server|int").unwrap_err();
        assert!(matches!(err, Error::QueryFailed(_)));
    }

    // Stand-in scheduler tools: a shell script per command so the gateway
    // runs real subprocesses.
    fn fake_tool(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        let mut perms = file.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn gateway(dir: &TempDir) -> Slurm {
        Slurm {
            sbatch: dir.path().join("sbatch"),
            sacct: dir.path().join("sacct"),
            scancel: dir.path().join("scancel"),
            query_timeout: Duration::from_secs(0),
        }
    }

    #[tokio::test]
    async fn test_submit_strips_cluster_suffix() {
        let dir = TempDir::new().unwrap();
        fake_tool(&dir, "sbatch", "echo '4242;cluster'");
        let request = ResourceRequest::validate("int", 1, 8, 0, 16).unwrap();
        let job_id = gateway(&dir)
            .submit(
                &request,
                "vscode_server",
                Path::new("/tmp/out.log"),
                Path::new("/tmp/job_template.sh"),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(job_id, "4242");
    }

    #[tokio::test]
    async fn test_submit_surfaces_sbatch_error() {
        let dir = TempDir::new().unwrap();
        fake_tool(&dir, "sbatch", "echo 'sbatch: error: invalid qos' >&2; exit 1");
        let request = ResourceRequest::validate("int", 1, 8, 0, 16).unwrap();
        let err = gateway(&dir)
            .submit(
                &request,
                "vscode_server",
                Path::new("/tmp/out.log"),
                Path::new("/tmp/job_template.sh"),
                &[],
            )
            .await
            .unwrap_err();
        match err {
            Error::SubmissionFailed(msg) => assert!(msg.contains("invalid qos")),
            other => panic!("expected SubmissionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_query_parses_accounting_row() {
        let dir = TempDir::new().unwrap();
        fake_tool(&dir, "sacct", "echo 'myjob|cpu|PENDING|None assigned'");
        let status = gateway(&dir).query("4242").await.unwrap();
        assert_eq!(status.name, "myjob");
        assert_eq!(status.state, JobState::Pending);
    }

    #[tokio::test]
    async fn test_query_times_out_when_job_invisible() {
        let dir = TempDir::new().unwrap();
        fake_tool(&dir, "sacct", "true");
        let err = gateway(&dir).query("4242").await.unwrap_err();
        assert!(matches!(err, Error::QueryFailed(_)));
    }

    #[tokio::test]
    async fn test_cancel_failure() {
        let dir = TempDir::new().unwrap();
        fake_tool(&dir, "scancel", "echo 'scancel: error' >&2; exit 1");
        let err = gateway(&dir).cancel("4242").await.unwrap_err();
        assert!(matches!(err, Error::CancelFailed(_)));
    }

    #[tokio::test]
    async fn test_cancel_success() {
        let dir = TempDir::new().unwrap();
        fake_tool(&dir, "scancel", "true");
        assert!(gateway(&dir).cancel("4242").await.is_ok());
    }
}
