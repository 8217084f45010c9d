//! Read-only host diagnostic
//!
//! Reports what a deployment would find without installing, prompting or
//! writing anything besides the run log.

use serde::Serialize;
use tracing::{info, warn};

use crate::app::options::InstallOptions;
use crate::gate::requirements::{evaluate, HostResources};
use crate::materialize::manifest::{parse_manifest, services_without_ports};
use crate::platform::os_release::OsRelease;
use crate::platform::profile::{resolve, VersionSupport};
use crate::runtime::compose;
use crate::runtime::engine::{engine_status, EngineStatus};
use crate::storage::settings::InstallerSettings;
use crate::system::command::{Cmd, CommandRunner};

/// Diagnostic findings, printed as JSON
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub distro_id: Option<String>,
    pub distro_version: Option<String>,
    pub platform: Result<PlatformFindings, String>,
    pub privilege: String,
    pub resources: HostResources,
    pub resource_warnings: Vec<String>,
    pub engine: String,
    pub compose: Option<String>,
    pub compose_file_present: bool,
    /// Services the manifest publishes no ports for; empty when unreadable
    pub unpublished_services: Vec<String>,
    pub detected_lan_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformFindings {
    pub platform: String,
    pub package_manager: String,
    pub selinux_capable: bool,
    pub build_engine_broken: bool,
    pub compose_needs_upgrade: bool,
    pub version_supported: bool,
}

/// Escalation available without asking for a password
async fn privilege_mode(runner: &dyn CommandRunner) -> String {
    let uid = runner.run(&Cmd::new("id").arg("-u")).await;
    if uid.is_ok_and(|out| out.success && out.stdout_trimmed() == "0") {
        return "root".to_string();
    }
    if !runner.has_program("sudo").await {
        return "unavailable".to_string();
    }
    match runner.run(&Cmd::new("sudo").args(["-n", "true"])).await {
        Ok(out) if out.success => "passwordless sudo".to_string(),
        _ => "sudo (password required)".to_string(),
    }
}

async fn unpublished_services(options: &InstallOptions) -> Vec<String> {
    let compose_file = options.layout().compose_file();
    if !compose_file.exists().await {
        return Vec::new();
    }
    match compose_file.read_string().await.and_then(|text| parse_manifest(&text)) {
        Ok(doc) => services_without_ports(&doc),
        Err(e) => {
            warn!("Cannot read {:?}: {}", compose_file.path(), e);
            Vec::new()
        }
    }
}

/// Collect the diagnostic
pub async fn run_diagnostic(
    options: &InstallOptions,
    settings: &InstallerSettings,
    runner: &dyn CommandRunner,
    resources: HostResources,
    detected_lan_ip: Option<std::net::IpAddr>,
) -> DiagnosticReport {
    info!("Running diagnostic (no changes will be made)");

    let release = OsRelease::load(&options.os_release).await;
    let platform = match &release {
        Ok(release) => resolve(release)
            .map(|profile| PlatformFindings {
                platform: profile.platform.id().to_string(),
                package_manager: profile.package_manager().to_string(),
                selinux_capable: profile.selinux_capable(),
                build_engine_broken: profile.build_engine_broken(),
                compose_needs_upgrade: profile.compose_needs_upgrade(),
                version_supported: profile.version_support() == VersionSupport::Supported,
            })
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    let (distro_id, distro_version) = match release {
        Ok(release) => (Some(release.id), release.version_id),
        Err(_) => (None, None),
    };

    let engine = match engine_status(runner).await {
        EngineStatus::Ready(version) => format!("docker {}", version),
        EngineStatus::Outdated(version) => format!("docker {} (outdated)", version),
        EngineStatus::Missing => "missing".to_string(),
    };
    let compose = compose::detect(runner)
        .await
        .map(|info| format!("{} {}", info.tool.invocation(), info.version));

    DiagnosticReport {
        distro_id,
        distro_version,
        platform,
        privilege: privilege_mode(runner).await,
        resources,
        resource_warnings: evaluate(&resources, &settings.requirements)
            .iter()
            .map(ToString::to_string)
            .collect(),
        engine,
        compose,
        compose_file_present: options.layout().compose_file().exists().await,
        unpublished_services: unpublished_services(options).await,
        detected_lan_ip: detected_lan_ip.map(|ip| ip.to_string()),
    }
}
