use crate::cli::Commands;
use vscode_manager::config::Config;

mod list;
mod start;
mod stop;

pub async fn handle_commands(config: &Config, commands: Commands) -> anyhow::Result<()> {
    match commands {
        Commands::Start(start_args) => start::handle_start(config, start_args).await,
        Commands::Stop(stop_args) => stop::handle_stop(config, stop_args).await,
        Commands::List => list::handle_list(config).await,
    }
}
