use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::PathBuf;
use vscode_manager::partition::PartitionLimits;
use vscode_manager::KERNEL_VERSIONS;

#[derive(Debug, Parser)]
#[command(
    name = "vscode",
    author,
    version,
    about = "Launch and manage VS Code server sessions on a Slurm cluster."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    #[arg(long, global = true, help = "Path to the config file")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a new VS Code server
    #[command(aliases = ["create", "new"])]
    Start(StartArgs),
    /// Stop an existing VS Code server instance
    #[command(aliases = ["delete", "cancel", "kill"])]
    Stop(StopArgs),
    /// List running VS Code servers
    #[command(aliases = ["ls", "show"])]
    List,
}

#[derive(Debug, Parser)]
pub struct StartArgs {
    /// Version of R to launch as the default VS Code kernel
    #[arg(value_parser = PossibleValuesParser::new(KERNEL_VERSIONS.iter().copied()))]
    pub kernel_version: String,

    /// Job name for the scheduler
    #[arg(short, long, default_value = "vscode_server")]
    pub name: String,

    /// Requested number of CPUs
    #[arg(short, long, default_value_t = 1)]
    pub cpu: u32,

    /// Requested amount of RAM (GB)
    #[arg(short, long, default_value_t = 8)]
    pub mem: u32,

    /// Requested runtime (hrs)
    #[arg(short, long, default_value_t = 16)]
    pub wallclock: u32,

    /// Requested number of GPUs
    #[arg(short, long, default_value_t = 0)]
    pub gpu: u32,

    #[arg(
        short,
        long,
        default_value = "int",
        hide = true,
        value_parser = PossibleValuesParser::new(PartitionLimits::names())
    )]
    pub partition: String,

    /// Additional bind path/s using the singularity format specification
    /// (src[:dest[:opts]])
    #[arg(short, long, default_value = "")]
    pub bind: String,

    #[arg(short, long, hide = true)]
    pub log: bool,
}

#[derive(Debug, Parser)]
pub struct StopArgs {
    /// List of job number/s and/or name/s to kill
    pub job: Vec<String>,

    /// Stop all running VS Code instances
    #[arg(short, long)]
    pub all: bool,
}
