//! Project layout
//!
//! Resolves every path the deployer reads or writes relative to the project
//! directory holding the compose manifest.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::filesys::file::File;

/// Compose manifest file name
pub const COMPOSE_FILE_NAME: &str = "docker-compose.yml";

/// Generated environment file name
pub const ENV_FILE_NAME: &str = ".env";

/// Optional installer settings file name
pub const SETTINGS_FILE_NAME: &str = "deploy-settings.json";

/// Paths used by a deployment run
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// Directory containing the compose manifest
    pub project_dir: PathBuf,
}

impl ProjectLayout {
    /// Create a new project layout
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Generated environment file
    pub fn env_file(&self) -> File {
        File::new(self.project_dir.join(ENV_FILE_NAME))
    }

    /// Compose manifest
    pub fn compose_file(&self) -> File {
        File::new(self.project_dir.join(COMPOSE_FILE_NAME))
    }

    /// Backup slot for `file` on `date`; one slot per calendar day
    pub fn backup_of(&self, file: &File, date: NaiveDate) -> File {
        let name = file
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        File::new(
            self.project_dir
                .join(format!("{}.backup.{}", name, date.format("%Y%m%d"))),
        )
    }

    /// Compose manifest backup slot for `date`
    pub fn compose_backup(&self, date: NaiveDate) -> File {
        self.backup_of(&self.compose_file(), date)
    }

    /// Installer settings file
    pub fn settings_file(&self) -> File {
        File::new(self.project_dir.join(SETTINGS_FILE_NAME))
    }

    /// Default run log directory
    pub fn logs_dir(&self) -> PathBuf {
        self.project_dir.join("logs")
    }
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self::new(".")
    }
}
