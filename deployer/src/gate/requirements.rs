//! Host resource requirements
//!
//! A soft gate: shortfalls are reported and the operator decides whether to
//! continue.

use std::fmt;
use std::path::Path;

use colored::Colorize;
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};
use tracing::{info, warn};

use crate::errors::DeployError;
use crate::storage::settings::RequirementSettings;
use crate::system::prompt::Prompter;

const MIB: u64 = 1024 * 1024;

/// Measured host resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostResources {
    /// Installed memory in MiB
    pub memory_total_mb: u64,

    /// Free space on the filesystem holding the project, in MiB
    pub disk_available_mb: u64,
}

/// Measure memory and the free space of the filesystem containing `path`
pub fn probe_resources(path: &Path) -> HostResources {
    let mut sys = System::new();
    sys.refresh_memory();

    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();

    // Longest mount point that prefixes the path
    let disk_available = disks
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
        .unwrap_or(0);

    HostResources {
        memory_total_mb: sys.total_memory() / MIB,
        disk_available_mb: disk_available / MIB,
    }
}

/// A resource below its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortfall {
    Memory { have_mb: u64, need_mb: u64 },
    Disk { have_mb: u64, need_mb: u64 },
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shortfall::Memory { have_mb, need_mb } => {
                write!(f, "memory {} MB is below the recommended {} MB", have_mb, need_mb)
            }
            Shortfall::Disk { have_mb, need_mb } => {
                write!(f, "free disk {} MB is below the recommended {} MB", have_mb, need_mb)
            }
        }
    }
}

/// Compare measured resources with the thresholds
pub fn evaluate(resources: &HostResources, requirements: &RequirementSettings) -> Vec<Shortfall> {
    let mut shortfalls = Vec::new();
    if resources.memory_total_mb < requirements.min_memory_mb {
        shortfalls.push(Shortfall::Memory {
            have_mb: resources.memory_total_mb,
            need_mb: requirements.min_memory_mb,
        });
    }
    if resources.disk_available_mb < requirements.min_disk_mb {
        shortfalls.push(Shortfall::Disk {
            have_mb: resources.disk_available_mb,
            need_mb: requirements.min_disk_mb,
        });
    }
    shortfalls
}

/// Ask the operator to accept any shortfall
pub async fn enforce(
    resources: &HostResources,
    requirements: &RequirementSettings,
    prompter: &mut dyn Prompter,
) -> Result<(), DeployError> {
    let shortfalls = evaluate(resources, requirements);
    if shortfalls.is_empty() {
        info!(
            "Resources OK: {} MB memory, {} MB free disk",
            resources.memory_total_mb, resources.disk_available_mb
        );
        return Ok(());
    }

    for shortfall in &shortfalls {
        warn!("Host {}", shortfall);
    }
    let proceed = prompter
        .confirm(
            &format!("{}", "Resources are below recommendations. Continue anyway?".yellow()),
            false,
        )
        .await?;
    if proceed {
        info!("Continuing below recommended resources at operator request");
        Ok(())
    } else {
        Err(DeployError::Aborted(
            shortfalls
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        ))
    }
}
