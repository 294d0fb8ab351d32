use crate::error::{Error, Result};
use crate::partition::ResourceRequest;
use crate::slurm::{JobState, JobStatus, Scheduler};
use crate::store::{Session, Store};
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);
/// Local file checks and reachability probes are cheap; poll at a fixed
/// short interval.
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Exponential backoff delays: base, doubling per attempt, capped.
#[derive(Debug)]
pub struct Backoff {
    delay: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { delay: base, cap }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.delay.min(self.cap);
        self.delay = (self.delay * 2).min(self.cap);
        Some(current)
    }
}

pub struct StartOptions {
    pub job_name: String,
    pub kernel_version: String,
    pub bind: String,
    /// Keep the server startup log instead of deleting it on completion
    pub keep_log: bool,
}

/// Drives a session from submission to a reachable server:
/// submit, wait to schedule, wait for the announced address, persist, wait
/// until the URL answers. Owns the session for the duration of `start`.
pub struct Launcher<'a, S: Scheduler> {
    scheduler: &'a S,
    store: &'a Store,
    shutdown: CancellationToken,
    schedule_timeout: Option<Duration>,
    http: reqwest::Client,
}

impl<'a, S: Scheduler> Launcher<'a, S> {
    pub fn new(
        scheduler: &'a S,
        store: &'a Store,
        shutdown: CancellationToken,
        schedule_timeout: Option<Duration>,
    ) -> Self {
        Self {
            scheduler,
            store,
            shutdown,
            schedule_timeout,
            http: reqwest::Client::new(),
        }
    }

    /// Run the whole start flow. On interrupt or any failure after
    /// submission, the in-flight job is cancelled exactly once before the
    /// error propagates, so no allocation outlives an aborted start.
    pub async fn start(
        &self,
        request: &ResourceRequest,
        opts: &StartOptions,
        script: &Path,
    ) -> Result<Session> {
        // The server announces its host:port on the first line of this file.
        let log_file = tempfile::Builder::new()
            .prefix("vscode_")
            .suffix(".log")
            .tempfile_in(self.store.dir())?;
        let log_path = log_file.path().to_path_buf();
        let _log_guard = if opts.keep_log {
            let (_file, path) = log_file.keep().map_err(|e| Error::Io(e.error))?;
            info!("Keeping the startup log at {}", path.display());
            None
        } else {
            Some(log_file)
        };

        info!("Submitting the job");
        let script_args = vec![opts.kernel_version.clone(), opts.bind.clone()];
        let job_id = self
            .scheduler
            .submit(request, &opts.job_name, &log_path, script, &script_args)
            .await?;

        let interrupted = async {
            self.shutdown.cancelled().await;
            Err::<Session, Error>(Error::Interrupted {
                job_id: job_id.clone(),
            })
        };
        let result = tokio::select! {
            res = interrupted => res,
            res = self.run_to_ready(&job_id, &log_path) => res,
        };

        match result {
            Ok(session) => Ok(session),
            Err(err) => {
                warn!("Terminating job {job_id} and cleaning up");
                if let Err(cancel_err) = self.scheduler.cancel(&job_id).await {
                    error!("{cancel_err}");
                }
                Err(err)
            }
        }
    }

    async fn run_to_ready(&self, job_id: &str, log_path: &Path) -> Result<Session> {
        info!("Waiting for job {job_id} to schedule");
        let status = self.wait_for_schedule(job_id).await?;

        info!("Waiting for VS Code to launch");
        let url = self.wait_for_url(log_path).await?;
        let mut session = Session {
            job_id: job_id.to_string(),
            status,
            url,
        };
        // Persist as soon as the URL is known, so a concurrent list/stop
        // can see (and cancel) a session that is not yet fully ready.
        self.store.write(&session)?;

        info!("Waiting for {} to answer", session.url);
        session.status = self.wait_until_reachable(job_id, &session.url).await?;
        self.store.write(&session)?;
        Ok(session)
    }

    /// Poll accounting while the job is PENDING, backing off exponentially.
    /// Any terminal state here is fatal; an optional deadline bounds the
    /// wait when configured.
    async fn wait_for_schedule(&self, job_id: &str) -> Result<JobStatus> {
        let deadline = self.schedule_timeout.map(|t| Instant::now() + t);
        let mut backoff = Backoff::new(BACKOFF_BASE, BACKOFF_CAP);
        loop {
            let status = self.scheduler.query(job_id).await?;
            match status.state {
                JobState::Running => return Ok(status),
                JobState::Pending => {}
                state => {
                    return Err(Error::ScheduleFailed {
                        job_id: job_id.to_string(),
                        state,
                    })
                }
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!("Job {job_id} still pending at the configured deadline, giving up");
                    return Err(Error::ScheduleFailed {
                        job_id: job_id.to_string(),
                        state: JobState::Pending,
                    });
                }
            }
            let delay = backoff.next().unwrap_or(BACKOFF_CAP);
            debug!("Job {job_id} is pending, trying again in {}s", delay.as_secs());
            sleep(delay).await;
        }
    }

    /// Poll the startup log until the server announces its listening
    /// address; the first non-empty line is a host:port pair.
    async fn wait_for_url(&self, log_path: &Path) -> Result<String> {
        loop {
            let text = tokio::fs::read_to_string(log_path).await?;
            if let Some(line) = text.lines().map(str::trim).find(|l| !l.is_empty()) {
                return Ok(format!("http://{line}"));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Probe the URL until anything answers. The job must still be RUNNING
    /// each round; a job that died while we waited is a failure, not an
    /// endless wait.
    async fn wait_until_reachable(&self, job_id: &str, url: &str) -> Result<JobStatus> {
        loop {
            let status = self.scheduler.query(job_id).await?;
            if status.state != JobState::Running {
                return Err(Error::ScheduleFailed {
                    job_id: job_id.to_string(),
                    state: status.state,
                });
            }
            let probe = self.http.get(url).timeout(PROBE_TIMEOUT).send().await;
            if probe.is_ok() {
                return Ok(status);
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

/// Cancel every known session matching a job id or job name selector, or
/// all of them. No match is a no-op. Returns how many jobs were cancelled.
pub async fn stop_sessions<S: Scheduler>(
    scheduler: &S,
    store: &Store,
    selectors: &[String],
    all: bool,
) -> Result<usize> {
    let mut stopped = 0;
    for session in store.sessions(scheduler).await? {
        let matched = all
            || selectors
                .iter()
                .any(|s| *s == session.job_id || *s == session.status.name);
        if matched {
            warn!("Terminating job {} and cleaning up", session.job_id);
            scheduler.cancel(&session.job_id).await?;
            stopped += 1;
        }
    }
    Ok(stopped)
}
