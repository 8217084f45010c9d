//! Privilege escalation detection

use tracing::{info, warn};

use crate::errors::DeployError;
use crate::system::command::{Cmd, CommandRunner};

/// How privileged commands are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Already running as root
    Root,

    /// Through `sudo`, credentials cached
    Sudo,
}

/// Decide how to run privileged commands; fatal when there is no way
pub async fn detect(runner: &dyn CommandRunner) -> Result<Escalation, DeployError> {
    let uid = runner.run(&Cmd::new("id").arg("-u")).await?;
    if uid.success && uid.stdout_trimmed() == "0" {
        info!("Running as root");
        return Ok(Escalation::Root);
    }

    if !runner.has_program("sudo").await {
        return Err(DeployError::PrivilegeUnavailable(
            "not root and sudo is not installed".to_string(),
        ));
    }

    let passwordless = runner.run(&Cmd::new("sudo").args(["-n", "true"])).await?;
    if passwordless.success {
        info!("Using passwordless sudo");
        return Ok(Escalation::Sudo);
    }

    warn!("sudo requires a password; you will be asked for it once");
    let interactive = runner.run(&Cmd::new("sudo").arg("-v").inherited()).await?;
    if interactive.success {
        info!("sudo credentials accepted");
        Ok(Escalation::Sudo)
    } else {
        Err(DeployError::PrivilegeUnavailable(
            "sudo authentication failed".to_string(),
        ))
    }
}

/// Non-root user who launched the deployer, if any
pub fn invoking_user() -> Option<String> {
    ["SUDO_USER", "USER"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|user| !user.is_empty() && user != "root")
}
