//! Compose tool detection and forced upgrade
//!
//! The deployment needs compose 2.x. A 1.x install (or none at all) is
//! replaced by the pinned standalone release.

use tracing::{debug, info, warn};

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::platform::profile::{PackageManager, PlatformProfile};
use crate::storage::settings::ComposeSettings;
use crate::system::command::{Cmd, CommandRunner};
use crate::system::http::HttpClient;
use crate::utils::{extract_version, major_version, sha256_hex};

/// Directory where the docker CLI looks for plugins
const CLI_PLUGIN_DIR: &str = "/usr/local/lib/docker/cli-plugins";

/// How compose is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeTool {
    /// `docker compose`
    Plugin,

    /// `docker-compose`
    Standalone,
}

impl ComposeTool {
    /// Base command; callers append the subcommand
    pub fn cmd(&self) -> Cmd {
        match self {
            ComposeTool::Plugin => Cmd::new("docker").arg("compose"),
            ComposeTool::Standalone => Cmd::new("docker-compose"),
        }
    }

    pub fn invocation(&self) -> &'static str {
        match self {
            ComposeTool::Plugin => "docker compose",
            ComposeTool::Standalone => "docker-compose",
        }
    }
}

/// A detected compose installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeInfo {
    pub tool: ComposeTool,
    pub version: String,
}

impl ComposeInfo {
    pub fn is_v2(&self) -> bool {
        major_version(&self.version).is_some_and(|major| major >= 2)
    }
}

async fn probe(runner: &dyn CommandRunner, tool: ComposeTool) -> Option<ComposeInfo> {
    let output = runner.run(&tool.cmd().arg("version")).await.ok()?;
    if !output.success {
        return None;
    }
    let version = extract_version(&output.stdout)?;
    Some(ComposeInfo { tool, version })
}

/// Best available compose: a 2.x plugin, else a 2.x standalone, else
/// whatever answered
pub async fn detect(runner: &dyn CommandRunner) -> Option<ComposeInfo> {
    let plugin = probe(runner, ComposeTool::Plugin).await;
    if plugin.as_ref().is_some_and(ComposeInfo::is_v2) {
        return plugin;
    }
    let standalone = probe(runner, ComposeTool::Standalone).await;
    if standalone.as_ref().is_some_and(ComposeInfo::is_v2) {
        return standalone;
    }
    plugin.or(standalone)
}

/// Release asset suffix for a Rust target architecture
pub fn release_arch(arch: &str) -> Option<&'static str> {
    match arch {
        "x86_64" => Some("x86_64"),
        "aarch64" => Some("aarch64"),
        "arm" => Some("armv7"),
        "powerpc64" => Some("ppc64le"),
        "s390x" => Some("s390x"),
        "riscv64" => Some("riscv64"),
        _ => None,
    }
}

/// Download URL of the pinned release for this host
pub fn download_url(
    settings: &ComposeSettings,
    use_mirror: bool,
    arch: &str,
) -> Result<String, DeployError> {
    let asset_arch = release_arch(arch).ok_or_else(|| {
        DeployError::ComposeInstallFailed(format!("no compose release for architecture {}", arch))
    })?;
    Ok(format!(
        "{}/{}/docker-compose-linux-{}",
        settings.base(use_mirror).trim_end_matches('/'),
        settings.version,
        asset_arch
    ))
}

/// Make sure a 2.x compose is available
pub async fn ensure_compose(
    runner: &dyn CommandRunner,
    http: &dyn HttpClient,
    profile: &PlatformProfile,
    settings: &ComposeSettings,
    use_mirror: bool,
) -> Result<ComposeInfo, DeployError> {
    match detect(runner).await {
        Some(info) if info.is_v2() => {
            info!(
                "{} {} already installed, skipping",
                info.tool.invocation(),
                info.version
            );
            return Ok(info);
        }
        Some(info) => warn!(
            "{} {} is 1.x, forcing upgrade to {}",
            info.tool.invocation(),
            info.version,
            settings.version
        ),
        None => info!("No compose tool found, installing {}", settings.version),
    }
    remove_legacy(runner, profile, settings).await;
    install_release(runner, http, settings, use_mirror).await?;

    match detect(runner).await {
        Some(info) if info.is_v2() => {
            info!("Installed {} {}", info.tool.invocation(), info.version);
            Ok(info)
        }
        Some(info) => Err(DeployError::ComposeInstallFailed(format!(
            "{} still reports version {}",
            info.tool.invocation(),
            info.version
        ))),
        None => Err(DeployError::ComposeInstallFailed(
            "version probe failed after installation".to_string(),
        )),
    }
}

/// Best effort: drop the packaged 1.x and any stale binary
async fn remove_legacy(
    runner: &dyn CommandRunner,
    profile: &PlatformProfile,
    settings: &ComposeSettings,
) {
    let remove_package = match profile.package_manager() {
        PackageManager::Apt => Cmd::new("apt-get").args(["remove", "-y", "docker-compose"]),
        PackageManager::Dnf => Cmd::new("dnf").args(["remove", "-y", "docker-compose"]),
        PackageManager::Zypper => {
            Cmd::new("zypper").args(["--non-interactive", "remove", "docker-compose"])
        }
    };
    let remove_binary = Cmd::new("rm").args(["-f", settings.install_path.as_str()]);

    for cmd in [remove_package, remove_binary] {
        let cmd = cmd.privileged();
        if let Ok(output) = runner.run(&cmd).await {
            if !output.success {
                debug!("`{}` failed, ignoring", cmd.display());
            }
        }
    }
}

async fn install_release(
    runner: &dyn CommandRunner,
    http: &dyn HttpClient,
    settings: &ComposeSettings,
    use_mirror: bool,
) -> Result<(), DeployError> {
    let url = download_url(settings, use_mirror, std::env::consts::ARCH)?;
    info!("Downloading {}", url);
    let binary = http
        .download(&url)
        .await
        .map_err(|e| DeployError::ComposeInstallFailed(format!("download failed: {}", e)))?;

    verify_checksum(http, &url, &binary).await?;

    let staged = File::new(std::env::temp_dir().join(format!(
        "docker-compose-{}-{}",
        settings.version,
        std::process::id()
    )));
    staged.write_bytes(&binary).await?;
    staged.set_executable().await?;

    let staged_path = staged.path().to_string_lossy().into_owned();
    let installed = runner
        .run_checked(
            &Cmd::new("install")
                .args(["-m", "0755", staged_path.as_str(), settings.install_path.as_str()])
                .privileged(),
        )
        .await;
    if let Err(e) = staged.delete().await {
        debug!("Could not remove staged binary: {}", e);
    }
    installed.map_err(|e| DeployError::ComposeInstallFailed(e.to_string()))?;

    // Lets `docker compose` resolve to the same binary
    let plugin_path = format!("{}/docker-compose", CLI_PLUGIN_DIR);
    for cmd in [
        Cmd::new("mkdir").args(["-p", CLI_PLUGIN_DIR]),
        Cmd::new("ln").args(["-sf", settings.install_path.as_str(), plugin_path.as_str()]),
    ] {
        if let Err(e) = runner.run_checked(&cmd.privileged()).await {
            warn!("Could not register compose as a CLI plugin: {}", e);
            break;
        }
    }
    Ok(())
}

/// Compare against the published `.sha256`; a missing checksum only warns
async fn verify_checksum(
    http: &dyn HttpClient,
    url: &str,
    binary: &[u8],
) -> Result<(), DeployError> {
    let published = match http.download(&format!("{}.sha256", url)).await {
        Ok(body) => String::from_utf8_lossy(&body)
            .split_whitespace()
            .next()
            .map(str::to_lowercase),
        Err(e) => {
            warn!("No checksum available for {}: {}", url, e);
            return Ok(());
        }
    };
    let actual = sha256_hex(binary);
    match published {
        Some(expected) if expected == actual => {
            debug!("Checksum verified: {}", actual);
            Ok(())
        }
        Some(expected) => Err(DeployError::ComposeInstallFailed(format!(
            "checksum mismatch: expected {}, got {}",
            expected, actual
        ))),
        None => {
            warn!("Empty checksum file for {}", url);
            Ok(())
        }
    }
}
