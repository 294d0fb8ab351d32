use crate::error::Result;
use crate::slurm::{JobStatus, Scheduler};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A tracked VS Code server job: the scheduler's view of the job plus the
/// URL the server announced, once known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub job_id: String,
    pub status: JobStatus,
    pub url: String,
}

/// On-disk shape of a session record.
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    job_name: String,
    partition: String,
    node: String,
    url: String,
}

/// Durable one-file-per-job session records. Shared across independent CLI
/// invocations; the only coordination is the atomic rename on write.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{job_id}.yml"))
    }

    /// Serialize the session to a uniquely named temp file, then rename it
    /// over the canonical record. Readers never see a partial record.
    pub fn write(&self, session: &Session) -> Result<()> {
        let record = Record {
            job_name: session.status.name.clone(),
            partition: session.status.partition.clone(),
            node: session.status.node.clone(),
            url: session.url.clone(),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        writeln!(
            tmp,
            "# {} v{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )?;
        serde_yaml::to_writer(&mut tmp, &record)?;
        tmp.persist(self.record_path(&session.job_id))
            .map_err(|e| e.error)?;
        Ok(())
    }

    /// Load one record, re-validating it against the scheduler. A record
    /// whose job is no longer pending or running is stale: the file is
    /// deleted and `None` returned.
    pub async fn load<S: Scheduler>(&self, scheduler: &S, path: &Path) -> Result<Option<Session>> {
        let Some(job_id) = path.file_stem().and_then(|s| s.to_str()) else {
            return Ok(None);
        };
        let status = scheduler.query(job_id).await?;
        if !status.state.is_active() {
            debug!("reaping stale session record for job {job_id}");
            std::fs::remove_file(path)?;
            return Ok(None);
        }
        let record: Record = serde_yaml::from_str(&std::fs::read_to_string(path)?)?;
        Ok(Some(Session {
            job_id: job_id.to_string(),
            status,
            url: record.url,
        }))
    }

    /// All live sessions in the store. Re-globs the directory on every call,
    /// reaping stale records as it goes.
    pub async fn sessions<S: Scheduler>(&self, scheduler: &S) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yml") {
                continue;
            }
            if let Some(session) = self.load(scheduler, &path).await? {
                sessions.push(session);
            }
        }
        sessions.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        Ok(sessions)
    }
}
