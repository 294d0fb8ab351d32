use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub slurm: SlurmConfig,
    /// Directory holding one record file per session.
    /// If not set, defaults to `~/.vscode-manager`
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
    /// Give up on a job stuck in PENDING after this many seconds.
    /// If not set, waits until the user interrupts
    #[serde(default)]
    pub schedule_timeout_secs: Option<u64>,
    /// Override the bundled sbatch launch script
    #[serde(default)]
    pub job_template: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SlurmConfig {
    #[serde(default = "default_sbatch")]
    pub sbatch: PathBuf,
    #[serde(default = "default_sacct")]
    pub sacct: PathBuf,
    #[serde(default = "default_scancel")]
    pub scancel: PathBuf,
    /// How long to keep retrying before a freshly submitted job becomes
    /// visible to `sacct`
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_sbatch() -> PathBuf {
    PathBuf::from("sbatch")
}

fn default_sacct() -> PathBuf {
    PathBuf::from("sacct")
}

fn default_scancel() -> PathBuf {
    PathBuf::from("scancel")
}

fn default_query_timeout_secs() -> u64 {
    120
}

impl Default for SlurmConfig {
    fn default() -> Self {
        Self {
            sbatch: default_sbatch(),
            sacct: default_sacct(),
            scancel: default_scancel(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

impl Config {
    pub fn schedule_timeout(&self) -> Option<Duration> {
        self.schedule_timeout_secs.map(Duration::from_secs)
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Failed to get config directory"))
        .map(|p| p.join("vscode-manager"))
}

/// Resolve the session store directory: an explicit config value wins,
/// otherwise a fixed per-user location.
pub fn store_dir(config: &Config) -> anyhow::Result<PathBuf> {
    if let Some(dir) = &config.store_dir {
        return Ok(dir.clone());
    }
    dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Failed to get home directory"))
        .map(|p| p.join(".vscode-manager"))
}

pub fn load_config(config_path: Option<&PathBuf>) -> Result<Config, config::ConfigError> {
    let mut config_vec = vec![];

    // User-provided config file
    if let Some(config_path) = config_path {
        if config_path.exists() {
            config_vec.push(config_path.clone());
        } else {
            eprintln!("Warning: Config file {config_path:?} not found.");
        }
    }

    // Default config file
    if let Ok(default_config_path) = get_config_dir().map(|d| d.join("config.toml")) {
        if default_config_path.exists() {
            config_vec.push(default_config_path);
        }
    }

    let settings = config::Config::builder();
    let settings = config_vec.iter().fold(settings, |s, path| {
        s.add_source(config::File::from(path.as_path()))
    });

    settings
        .add_source(
            config::Environment::with_prefix("VSCODE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.slurm.sbatch, PathBuf::from("sbatch"));
        assert_eq!(config.slurm.query_timeout_secs, 120);
        assert_eq!(config.schedule_timeout(), None);
        assert!(config.store_dir.is_none());
    }

    #[test]
    fn test_explicit_store_dir_wins() {
        let config = Config {
            store_dir: Some(PathBuf::from("/tmp/sessions")),
            ..Config::default()
        };
        assert_eq!(store_dir(&config).unwrap(), PathBuf::from("/tmp/sessions"));
    }
}
