use crate::cli::StopArgs;
use anyhow::Result;
use vscode_manager::config::{self, Config};
use vscode_manager::lifecycle;
use vscode_manager::slurm::Slurm;
use vscode_manager::store::Store;

pub(crate) async fn handle_stop(config: &Config, stop_args: StopArgs) -> Result<()> {
    let store = Store::open(config::store_dir(config)?)?;
    let slurm = Slurm::new(&config.slurm);
    let stopped = lifecycle::stop_sessions(&slurm, &store, &stop_args.job, stop_args.all).await?;
    tracing::info!("Stopped {stopped} session(s)");
    Ok(())
}
