use crate::cli::StartArgs;
use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use vscode_manager::config::{self, Config};
use vscode_manager::lifecycle::{Launcher, StartOptions};
use vscode_manager::partition::ResourceRequest;
use vscode_manager::shutdown;
use vscode_manager::slurm::Slurm;
use vscode_manager::store::Store;

const JOB_TEMPLATE: &str = include_str!("../../../../assets/job_template.sh");

pub(crate) async fn handle_start(config: &Config, start_args: StartArgs) -> Result<()> {
    tracing::info!("Validating the request");
    let request = ResourceRequest::validate(
        &start_args.partition,
        start_args.cpu,
        start_args.mem,
        start_args.gpu,
        start_args.wallclock,
    )?;

    let store = Store::open(config::store_dir(config)?)?;
    let script = materialize_job_template(config, &store)?;
    let slurm = Slurm::new(&config.slurm);
    let shutdown = shutdown::install_shutdown_handler();
    let launcher = Launcher::new(&slurm, &store, shutdown, config.schedule_timeout());

    let opts = StartOptions {
        job_name: start_args.name,
        kernel_version: start_args.kernel_version,
        bind: start_args.bind,
        keep_log: start_args.log,
    };
    let session = launcher.start(&request, &opts, &script).await?;

    tracing::info!("VS Code is running on {}", session.status.node);
    // plain print so that those using -q still get the URL
    println!("URL:   {}", session.url);
    Ok(())
}

/// The launch script `sbatch` runs. A config override wins; otherwise the
/// bundled template is materialized into the store directory. Written to a
/// temp file and renamed into place, so a concurrent start never hands
/// `sbatch` a partially written script.
fn materialize_job_template(config: &Config, store: &Store) -> Result<PathBuf> {
    if let Some(path) = &config.job_template {
        return Ok(path.clone());
    }
    let path = store.dir().join("job_template.sh");
    let mut tmp = tempfile::NamedTempFile::new_in(store.dir())?;
    tmp.write_all(JOB_TEMPLATE.as_bytes())?;
    tmp.persist(&path).map_err(|e| e.error)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_materialized_into_store_dir() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let config = Config::default();

        let path = materialize_job_template(&config, &store).unwrap();
        assert_eq!(path, dir.path().join("job_template.sh"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), JOB_TEMPLATE);
        // no stray temp file left behind
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_template_override_wins() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let config = Config {
            job_template: Some(PathBuf::from("/opt/site/job_template.sh")),
            ..Config::default()
        };

        let path = materialize_job_template(&config, &store).unwrap();
        assert_eq!(path, PathBuf::from("/opt/site/job_template.sh"));
    }
}
