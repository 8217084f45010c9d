//! SELinux relaxation
//!
//! Container bind mounts fail under enforcing mode on the SELinux
//! platforms, so enforcing is switched to permissive at runtime and in
//! `/etc/selinux/config`.

use tracing::{debug, info, warn};

use crate::errors::DeployError;
use crate::platform::profile::PlatformProfile;
use crate::system::command::{Cmd, CommandRunner};

pub const SELINUX_CONFIG_PATH: &str = "/etc/selinux/config";

/// What [`relax_selinux`] found or did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelinuxOutcome {
    /// The platform never ships SELinux
    NotApplicable,

    /// SELinux tooling is not installed
    Unavailable,

    /// Already permissive or disabled
    AlreadyRelaxed,

    /// Switched to permissive; `persisted` is false when the config file
    /// could not be updated
    Relaxed { persisted: bool },
}

/// Switch enforcing SELinux to permissive
///
/// Only the runtime switch is fatal; persisting the change is best effort.
pub async fn relax_selinux(
    runner: &dyn CommandRunner,
    profile: &PlatformProfile,
) -> Result<SelinuxOutcome, DeployError> {
    if !profile.selinux_capable() {
        return Ok(SelinuxOutcome::NotApplicable);
    }
    if !runner.has_program("getenforce").await {
        debug!("getenforce not found, skipping SELinux adjustment");
        return Ok(SelinuxOutcome::Unavailable);
    }

    let mode = runner.run_checked(&Cmd::new("getenforce")).await?;
    if !mode.stdout_trimmed().eq_ignore_ascii_case("enforcing") {
        info!("SELinux is {}, no change needed", mode.stdout_trimmed());
        return Ok(SelinuxOutcome::AlreadyRelaxed);
    }

    warn!("SELinux is enforcing, switching to permissive");
    runner
        .run_checked(&Cmd::new("setenforce").arg("0").privileged())
        .await?;

    let persist = Cmd::new("sed")
        .args([
            "-i",
            "s/^SELINUX=enforcing/SELINUX=permissive/",
            SELINUX_CONFIG_PATH,
        ])
        .privileged();
    let persisted = match runner.run_checked(&persist).await {
        Ok(_) => true,
        Err(e) => {
            warn!(
                "Could not persist permissive mode in {}: {}",
                SELINUX_CONFIG_PATH, e
            );
            false
        }
    };
    Ok(SelinuxOutcome::Relaxed { persisted })
}
