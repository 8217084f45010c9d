//! Container engine installation
//!
//! Skips everything when a modern engine is already installed and its
//! service is running.

use tracing::{info, warn};

use crate::errors::DeployError;
use crate::gate::privilege::invoking_user;
use crate::platform::profile::{PackageManager, PlatformProfile};
use crate::storage::settings::DockerRepoSettings;
use crate::system::command::{Cmd, CommandRunner};
use crate::utils::{extract_version, major_version};

/// Oldest engine major version accepted as-is
pub const MIN_ENGINE_MAJOR: u32 = 20;

/// Engine state before this run touches it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Ready(String),
    Outdated(String),
    Missing,
}

/// What [`ensure_engine`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    AlreadyPresent(String),
    Installed(String),
}

impl EngineAction {
    pub fn version(&self) -> &str {
        match self {
            EngineAction::AlreadyPresent(v) | EngineAction::Installed(v) => v,
        }
    }
}

/// Probe the installed engine version
pub async fn engine_status(runner: &dyn CommandRunner) -> EngineStatus {
    let output = match runner.run(&Cmd::new("docker").arg("--version")).await {
        Ok(output) if output.success => output,
        _ => return EngineStatus::Missing,
    };
    match extract_version(&output.stdout) {
        Some(version) if major_version(&version).is_some_and(|m| m >= MIN_ENGINE_MAJOR) => {
            EngineStatus::Ready(version)
        }
        Some(version) => EngineStatus::Outdated(version),
        None => EngineStatus::Missing,
    }
}

/// Package-manager commands installing the engine on this platform
pub fn install_commands(
    profile: &PlatformProfile,
    repo: &DockerRepoSettings,
    use_mirror: bool,
) -> Vec<Cmd> {
    let packages = profile.install_packages();
    match profile.package_manager() {
        PackageManager::Apt => vec![
            Cmd::new("apt-get")
                .arg("update")
                .env("DEBIAN_FRONTEND", "noninteractive")
                .privileged()
                .streamed(),
            Cmd::new("apt-get")
                .args(["install", "-y"])
                .args(packages.iter().copied())
                .env("DEBIAN_FRONTEND", "noninteractive")
                .privileged()
                .streamed(),
        ],
        PackageManager::Dnf if profile.capabilities.uses_docker_ce_repo => vec![
            Cmd::new("dnf")
                .args(["install", "-y", "dnf-plugins-core"])
                .privileged()
                .streamed(),
            Cmd::new("dnf")
                .args(["config-manager", "--add-repo", repo.url(use_mirror)])
                .privileged()
                .streamed(),
            Cmd::new("dnf")
                .args(["install", "-y", "--allowerasing"])
                .args(packages.iter().copied())
                .privileged()
                .streamed(),
        ],
        PackageManager::Dnf => vec![Cmd::new("dnf")
            .args(["install", "-y"])
            .args(packages.iter().copied())
            .privileged()
            .streamed()],
        PackageManager::Zypper => vec![
            Cmd::new("zypper")
                .args(["--non-interactive", "refresh"])
                .privileged()
                .streamed(),
            Cmd::new("zypper")
                .args(["--non-interactive", "install"])
                .args(packages.iter().copied())
                .privileged()
                .streamed(),
        ],
    }
}

/// Make sure a modern engine is installed and its service is running
pub async fn ensure_engine(
    runner: &dyn CommandRunner,
    profile: &PlatformProfile,
    repo: &DockerRepoSettings,
    use_mirror: bool,
) -> Result<EngineAction, DeployError> {
    match engine_status(runner).await {
        EngineStatus::Ready(version) => {
            info!("Docker {} already installed, skipping installation", version);
            ensure_service_running(runner).await?;
            return Ok(EngineAction::AlreadyPresent(version));
        }
        EngineStatus::Outdated(version) => {
            warn!(
                "Docker {} is older than {}.x, upgrading through {}",
                version,
                MIN_ENGINE_MAJOR,
                profile.package_manager()
            );
        }
        EngineStatus::Missing => {
            info!("Installing Docker through {}", profile.package_manager());
        }
    }

    for cmd in install_commands(profile, repo, use_mirror) {
        runner
            .run_checked(&cmd)
            .await
            .map_err(|e| DeployError::RuntimeInstallFailed(e.to_string()))?;
    }

    let version = match engine_status(runner).await {
        EngineStatus::Ready(version) => version,
        EngineStatus::Outdated(version) => {
            return Err(DeployError::RuntimeInstallFailed(format!(
                "installed Docker {} is still older than {}.x",
                version, MIN_ENGINE_MAJOR
            )))
        }
        EngineStatus::Missing => {
            return Err(DeployError::RuntimeInstallFailed(
                "docker is not available after installation".to_string(),
            ))
        }
    };

    enable_service(runner).await?;
    grant_group(runner).await;

    info!("Docker {} installed", version);
    Ok(EngineAction::Installed(version))
}

async fn ensure_service_running(runner: &dyn CommandRunner) -> Result<(), DeployError> {
    let active = runner
        .run(&Cmd::new("systemctl").args(["is-active", "--quiet", "docker"]))
        .await?;
    if active.success {
        return Ok(());
    }
    warn!("Docker service is not running, starting it");
    enable_service(runner).await
}

async fn enable_service(runner: &dyn CommandRunner) -> Result<(), DeployError> {
    runner
        .run_checked(
            &Cmd::new("systemctl")
                .args(["enable", "--now", "docker"])
                .privileged(),
        )
        .await
        .map_err(|e| DeployError::RuntimeInstallFailed(e.to_string()))?;
    Ok(())
}

/// Best effort: sudo stays available when this fails
async fn grant_group(runner: &dyn CommandRunner) {
    let Some(user) = invoking_user() else {
        return;
    };
    let cmd = Cmd::new("usermod")
        .args(["-aG", "docker", user.as_str()])
        .privileged();
    match runner.run(&cmd).await {
        Ok(output) if output.success => {
            info!("Added {} to the docker group (effective after next login)", user)
        }
        Ok(output) => warn!("Could not add {} to the docker group: {}", user, output.stderr.trim()),
        Err(e) => warn!("Could not add {} to the docker group: {}", user, e),
    }
}
