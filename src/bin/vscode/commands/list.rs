use anyhow::Result;
use tabled::{builder::Builder, settings::style::Style};
use vscode_manager::config::{self, Config};
use vscode_manager::slurm::Slurm;
use vscode_manager::store::Store;

pub(crate) async fn handle_list(config: &Config) -> Result<()> {
    let store = Store::open(config::store_dir(config)?)?;
    let slurm = Slurm::new(&config.slurm);
    let sessions = store.sessions(&slurm).await?;

    if sessions.is_empty() {
        println!("No VS Code servers are running");
        return Ok(());
    }

    let mut builder = Builder::default();
    builder.push_record(["Job ID", "Name", "Node", "URL"]);
    for session in sessions {
        builder.push_record([
            session.job_id,
            session.status.name,
            session.status.node,
            session.url,
        ]);
    }

    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}
