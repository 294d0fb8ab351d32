use crate::error::{Error, Result};
use std::path::Path;

/// Static per-partition resource ceilings, mirroring the cluster's Slurm
/// configuration. Loaded once; never mutated.
#[derive(Debug)]
pub struct PartitionLimits {
    pub name: &'static str,
    pub cpu: u32,
    /// GB
    pub mem: u32,
    pub gpu: u32,
    /// hours
    pub time: u32,
    pub qos: &'static str,
    pub nodes: &'static [&'static str],
}

pub const PARTITIONS: &[PartitionLimits] = &[
    PartitionLimits {
        name: "int",
        cpu: 8,
        mem: 250,
        gpu: 2,
        time: 16,
        qos: "qos_int",
        nodes: &[
            "compute001",
            "compute002",
            "compute003",
            "compute004",
            "compute005",
            "compute006",
            "hmem001",
            "gpu001",
            "gpu002",
            "gpu003",
            "gpu004",
        ],
    },
    PartitionLimits {
        name: "cpu",
        cpu: 16,
        mem: 250,
        gpu: 0,
        time: 72,
        qos: "qos_batch",
        nodes: &[
            "compute001",
            "compute002",
            "compute003",
            "compute004",
            "compute005",
            "compute006",
            "hmem001",
        ],
    },
    PartitionLimits {
        name: "gpu",
        cpu: 56,
        mem: 500,
        gpu: 4,
        time: 168,
        qos: "qos_batch",
        nodes: &["gpu001", "gpu002", "gpu003", "gpu004"],
    },
    PartitionLimits {
        name: "hmem",
        cpu: 64,
        mem: 4000,
        gpu: 0,
        time: 168,
        qos: "qos_batch",
        nodes: &["hmem001"],
    },
];

impl PartitionLimits {
    pub fn get(name: &str) -> Option<&'static PartitionLimits> {
        PARTITIONS.iter().find(|p| p.name == name)
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        PARTITIONS.iter().map(|p| p.name)
    }
}

/// A validated resource request. Constructed once from user input via
/// [`ResourceRequest::validate`]; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub partition: String,
    pub cpu: u32,
    pub mem: u32,
    pub gpu: u32,
    pub time: u32,
    pub qos: String,
}

impl ResourceRequest {
    /// Check a request against the named partition's limits. Either every
    /// bound holds and the partition's QOS is resolved, or the request is
    /// rejected with all violated bounds listed.
    pub fn validate(partition: &str, cpu: u32, mem: u32, gpu: u32, time: u32) -> Result<Self> {
        let limits = PartitionLimits::get(partition).ok_or_else(|| Error::InvalidRequest {
            partition: partition.to_string(),
            violations: vec!["unknown partition".to_string()],
        })?;

        let mut violations = Vec::new();
        if !(1..=limits.cpu).contains(&cpu) {
            violations.push(format!("cpu must be within 1..={}, got {cpu}", limits.cpu));
        }
        if !(1..=limits.mem).contains(&mem) {
            violations.push(format!("mem must be within 1..={} GB, got {mem}", limits.mem));
        }
        if gpu > limits.gpu {
            violations.push(format!("gpu must be within 0..={}, got {gpu}", limits.gpu));
        }
        if !(1..=limits.time).contains(&time) {
            violations.push(format!(
                "wallclock must be within 1..={} hrs, got {time}",
                limits.time
            ));
        }
        if !violations.is_empty() {
            return Err(Error::InvalidRequest {
                partition: partition.to_string(),
                violations,
            });
        }

        Ok(Self {
            partition: partition.to_string(),
            cpu,
            mem,
            gpu,
            time,
            qos: limits.qos.to_string(),
        })
    }

    /// Render the `sbatch` argument vector for this request. The job gets a
    /// single task, output redirected to `log_path`, and a SIGTERM delivered
    /// to the batch shell 60 seconds before the wallclock limit expires.
    pub fn sbatch_args(&self, job_name: &str, log_path: &Path) -> Vec<String> {
        vec![
            "--job-name".to_string(),
            job_name.to_string(),
            "--output".to_string(),
            log_path.display().to_string(),
            "--partition".to_string(),
            self.partition.clone(),
            "--qos".to_string(),
            self.qos.clone(),
            "--ntasks".to_string(),
            "1".to_string(),
            "--cpus-per-task".to_string(),
            self.cpu.to_string(),
            "--gpus".to_string(),
            self.gpu.to_string(),
            "--mem".to_string(),
            format!("{}G", self.mem),
            "--time".to_string(),
            format!("{}:00:00", self.time),
            "--signal".to_string(),
            "B:SIGTERM@60".to_string(),
            "--parsable".to_string(),
        ]
    }
}
