pub mod config;
pub mod error;
pub mod lifecycle;
pub mod partition;
pub mod shutdown;
pub mod slurm;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

/// R builds installed on the cluster, selectable as the default VS Code
/// kernel.
pub const KERNEL_VERSIONS: &[&str] = &["4.1", "4.2", "4.3", "4.4"];
