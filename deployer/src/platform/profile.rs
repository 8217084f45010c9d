//! Platform profiles
//!
//! Maps the OS descriptor onto a closed set of supported platforms, each with
//! a fixed capability record. Resolved once per run; never persisted.

use std::fmt;

use colored::Colorize;
use tracing::{info, warn};

use crate::errors::DeployError;
use crate::platform::os_release::OsRelease;
use crate::system::prompt::Prompter;
use crate::utils::major_version;

/// Package manager family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Zypper,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt",
            PackageManager::Dnf => "dnf",
            PackageManager::Zypper => "zypper",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ubuntu,
    Debian,
    Fedora,
    CentOs,
    Rocky,
    AlmaLinux,
    OpenSuseLeap,
    OpenSuseTumbleweed,
}

/// Result of looking up a raw distribution id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Distro {
    Supported(Platform),
    Unsupported(String),
}

impl Distro {
    pub fn from_id(id: &str) -> Self {
        match id.trim().to_lowercase().as_str() {
            "ubuntu" => Distro::Supported(Platform::Ubuntu),
            "debian" => Distro::Supported(Platform::Debian),
            "fedora" => Distro::Supported(Platform::Fedora),
            "centos" | "rhel" => Distro::Supported(Platform::CentOs),
            "rocky" => Distro::Supported(Platform::Rocky),
            "almalinux" => Distro::Supported(Platform::AlmaLinux),
            "opensuse-leap" => Distro::Supported(Platform::OpenSuseLeap),
            "opensuse-tumbleweed" => Distro::Supported(Platform::OpenSuseTumbleweed),
            other => Distro::Unsupported(other.to_string()),
        }
    }
}

/// Fixed capability record of a platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub package_manager: PackageManager,

    /// Ships the SELinux toolset by default
    pub selinux_capable: bool,

    /// Default (BuildKit) build engine is unusable; force the legacy builder
    pub build_engine_broken: bool,

    /// Packaged compose is 1.x: `compose_package` is not installed and the
    /// pinned 2.x binary takes its place
    pub compose_needs_upgrade: bool,

    /// Installed through the docker-ce repository instead of distro packages
    pub uses_docker_ce_repo: bool,

    /// Packages providing the container engine
    pub engine_packages: &'static [&'static str],

    /// Distribution package providing compose, if any
    pub compose_package: Option<&'static str>,

    /// Oldest supported major version; `None` for rolling releases
    pub min_major_version: Option<u32>,
}

const DOCKER_CE_PACKAGES: &[&str] = &[
    "docker-ce",
    "docker-ce-cli",
    "containerd.io",
    "docker-buildx-plugin",
];

impl Platform {
    pub const ALL: [Platform; 8] = [
        Platform::Ubuntu,
        Platform::Debian,
        Platform::Fedora,
        Platform::CentOs,
        Platform::Rocky,
        Platform::AlmaLinux,
        Platform::OpenSuseLeap,
        Platform::OpenSuseTumbleweed,
    ];

    /// Canonical distribution id
    pub fn id(&self) -> &'static str {
        match self {
            Platform::Ubuntu => "ubuntu",
            Platform::Debian => "debian",
            Platform::Fedora => "fedora",
            Platform::CentOs => "centos",
            Platform::Rocky => "rocky",
            Platform::AlmaLinux => "almalinux",
            Platform::OpenSuseLeap => "opensuse-leap",
            Platform::OpenSuseTumbleweed => "opensuse-tumbleweed",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Platform::Ubuntu => Capabilities {
                package_manager: PackageManager::Apt,
                selinux_capable: false,
                build_engine_broken: false,
                compose_needs_upgrade: false,
                uses_docker_ce_repo: false,
                engine_packages: &["docker.io"],
                compose_package: Some("docker-compose-v2"),
                min_major_version: Some(20),
            },
            Platform::Debian => Capabilities {
                package_manager: PackageManager::Apt,
                selinux_capable: false,
                build_engine_broken: false,
                compose_needs_upgrade: true,
                uses_docker_ce_repo: false,
                engine_packages: &["docker.io"],
                compose_package: Some("docker-compose"),
                min_major_version: Some(11),
            },
            Platform::Fedora => Capabilities {
                package_manager: PackageManager::Dnf,
                selinux_capable: true,
                build_engine_broken: false,
                compose_needs_upgrade: false,
                uses_docker_ce_repo: false,
                engine_packages: &["moby-engine"],
                compose_package: Some("docker-compose"),
                min_major_version: Some(38),
            },
            Platform::CentOs | Platform::Rocky | Platform::AlmaLinux => Capabilities {
                package_manager: PackageManager::Dnf,
                selinux_capable: true,
                build_engine_broken: false,
                compose_needs_upgrade: false,
                uses_docker_ce_repo: true,
                engine_packages: DOCKER_CE_PACKAGES,
                compose_package: Some("docker-compose-plugin"),
                min_major_version: Some(8),
            },
            Platform::OpenSuseLeap => Capabilities {
                package_manager: PackageManager::Zypper,
                selinux_capable: false,
                build_engine_broken: false,
                compose_needs_upgrade: false,
                uses_docker_ce_repo: false,
                engine_packages: &["docker"],
                compose_package: Some("docker-compose"),
                min_major_version: Some(15),
            },
            Platform::OpenSuseTumbleweed => Capabilities {
                package_manager: PackageManager::Zypper,
                selinux_capable: true,
                build_engine_broken: true,
                compose_needs_upgrade: false,
                uses_docker_ce_repo: false,
                engine_packages: &["docker"],
                compose_package: Some("docker-compose"),
                min_major_version: None,
            },
        }
    }

    /// Comma-separated list of supported ids
    pub fn supported_ids() -> String {
        Self::ALL
            .iter()
            .map(Platform::id)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Resolved capability record for this host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub platform: Platform,
    pub distro_id: String,
    pub display_name: String,
    pub version: String,
    pub capabilities: Capabilities,
}

impl PlatformProfile {
    pub fn package_manager(&self) -> PackageManager {
        self.capabilities.package_manager
    }

    pub fn selinux_capable(&self) -> bool {
        self.capabilities.selinux_capable
    }

    pub fn build_engine_broken(&self) -> bool {
        self.capabilities.build_engine_broken
    }

    pub fn compose_needs_upgrade(&self) -> bool {
        self.capabilities.compose_needs_upgrade
    }

    /// Packages to install for the engine, with the packaged compose unless
    /// it is too old to use
    pub fn install_packages(&self) -> Vec<&'static str> {
        let compose = self
            .capabilities
            .compose_package
            .filter(|_| !self.compose_needs_upgrade());
        self.capabilities
            .engine_packages
            .iter()
            .copied()
            .chain(compose)
            .collect()
    }

    /// How the detected version compares with the supported floor
    pub fn version_support(&self) -> VersionSupport {
        let Some(minimum) = self.capabilities.min_major_version else {
            return VersionSupport::Supported;
        };
        match major_version(&self.version) {
            Some(found) if found < minimum => VersionSupport::BelowMinimum { found, minimum },
            Some(_) => VersionSupport::Supported,
            None => VersionSupport::Unknown,
        }
    }
}

/// Outcome of the version floor check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSupport {
    Supported,
    BelowMinimum { found: u32, minimum: u32 },
    Unknown,
}

/// Map the OS descriptor to a platform profile
pub fn resolve(release: &OsRelease) -> Result<PlatformProfile, DeployError> {
    let platform = match Distro::from_id(&release.id) {
        Distro::Supported(platform) => platform,
        Distro::Unsupported(id) => {
            return Err(DeployError::UnsupportedDistro {
                id,
                supported: Platform::supported_ids(),
            })
        }
    };

    let capabilities = platform.capabilities();
    let version = match (&release.version_id, capabilities.min_major_version) {
        (Some(version), _) => version.clone(),
        (None, None) => String::new(),
        (None, Some(_)) => {
            return Err(DeployError::DistroUnreadable(format!(
                "missing VERSION_ID for {}",
                release.id
            )))
        }
    };

    Ok(PlatformProfile {
        platform,
        distro_id: release.id.clone(),
        display_name: release.display_name().to_string(),
        version,
        capabilities,
    })
}

/// Soft gate on the version floor: below it, the operator decides
pub async fn confirm_version(
    profile: &PlatformProfile,
    prompter: &mut dyn Prompter,
) -> Result<(), DeployError> {
    match profile.version_support() {
        VersionSupport::Supported => Ok(()),
        VersionSupport::Unknown => {
            warn!(
                "Could not interpret version '{}' of {}, continuing",
                profile.version, profile.distro_id
            );
            Ok(())
        }
        VersionSupport::BelowMinimum { found, minimum } => {
            warn!(
                "{} {} is older than the recommended {} {}",
                profile.distro_id, found, profile.distro_id, minimum
            );
            let proceed = prompter
                .confirm(
                    &format!("{}", "Continue on an older release anyway?".yellow()),
                    false,
                )
                .await?;
            if proceed {
                info!("Continuing on {} {} at operator request", profile.distro_id, found);
                Ok(())
            } else {
                Err(DeployError::Aborted(format!(
                    "{} {} is below the supported version {}",
                    profile.distro_id, found, minimum
                )))
            }
        }
    }
}
