//! Command line options

use std::collections::HashMap;
use std::path::PathBuf;

use crate::errors::DeployError;
use crate::logs::LogLevel;
use crate::platform::os_release::OS_RELEASE_PATH;
use crate::storage::layout::ProjectLayout;

/// Options for a deployer run
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Directory holding the compose manifest
    pub project_dir: PathBuf,

    /// Directory for run logs
    pub log_dir: PathBuf,

    /// Overrides the settings file level when set
    pub log_level: Option<LogLevel>,

    /// OS descriptor file
    pub os_release: PathBuf,

    /// Installer settings file
    pub settings_file: PathBuf,
}

impl Default for InstallOptions {
    fn default() -> Self {
        let layout = ProjectLayout::default();
        Self {
            project_dir: layout.project_dir().to_path_buf(),
            log_dir: layout.logs_dir(),
            log_level: None,
            os_release: PathBuf::from(OS_RELEASE_PATH),
            settings_file: layout.settings_file().path().to_path_buf(),
        }
    }
}

impl InstallOptions {
    /// Build options from parsed `--key=value` arguments
    pub fn from_cli(cli_args: &HashMap<String, String>) -> Result<Self, DeployError> {
        let layout = ProjectLayout::new(
            cli_args
                .get("project-dir")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        );

        let log_level = cli_args
            .get("log-level")
            .map(|level| level.parse::<LogLevel>())
            .transpose()
            .map_err(DeployError::ConfigError)?;

        Ok(Self {
            project_dir: layout.project_dir().to_path_buf(),
            log_dir: cli_args
                .get("log-dir")
                .map(PathBuf::from)
                .unwrap_or_else(|| layout.logs_dir()),
            log_level,
            os_release: cli_args
                .get("os-release")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(OS_RELEASE_PATH)),
            settings_file: cli_args
                .get("settings")
                .map(PathBuf::from)
                .unwrap_or_else(|| layout.settings_file().path().to_path_buf()),
        })
    }

    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(&self.project_dir)
    }
}
