//! Installer settings file management
//!
//! Every field has a default so a missing or partial `deploy-settings.json`
//! behaves like the built-in configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Installer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallerSettings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Base images pulled before the build
    #[serde(default)]
    pub images: ImageSettings,

    /// Pinned compose release used by the forced upgrade
    #[serde(default)]
    pub compose: ComposeSettings,

    /// docker-ce repository definitions for dnf platforms
    #[serde(default)]
    pub docker_repo: DockerRepoSettings,

    /// Host requirement thresholds
    #[serde(default)]
    pub requirements: RequirementSettings,

    /// Readiness polling budgets
    #[serde(default)]
    pub readiness: ReadinessSettings,

    /// Data-tier identity
    #[serde(default)]
    pub database: DatabaseSettings,
}

impl InstallerSettings {
    /// Load settings from `file`, falling back to defaults when absent
    pub async fn load(file: &File) -> Result<Self, DeployError> {
        if !file.exists().await {
            debug!("No settings file at {:?}, using defaults", file.path());
            return Ok(Self::default());
        }
        file.read_json().await.map_err(|e| {
            DeployError::ConfigError(format!("Invalid settings file {:?}: {}", file.path(), e))
        })
    }
}

/// Base images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSettings {
    #[serde(default = "default_database_image")]
    pub database: String,

    #[serde(default = "default_cache_image")]
    pub cache: String,

    #[serde(default = "default_proxy_image")]
    pub proxy: String,
}

fn default_database_image() -> String {
    "postgres:17-alpine".to_string()
}

fn default_cache_image() -> String {
    "redis:7-alpine".to_string()
}

fn default_proxy_image() -> String {
    "nginx:alpine".to_string()
}

impl ImageSettings {
    /// Images in pull order: data tier, cache tier, proxy tier
    pub fn in_pull_order(&self) -> [&str; 3] {
        [&self.database, &self.cache, &self.proxy]
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            database: default_database_image(),
            cache: default_cache_image(),
            proxy: default_proxy_image(),
        }
    }
}

/// Compose release settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeSettings {
    /// Release tag, e.g. `v2.29.7`
    #[serde(default = "default_compose_version")]
    pub version: String,

    /// Download base when no mirror is requested
    #[serde(default = "default_compose_primary")]
    pub primary_base: String,

    /// Download base when the mirror is requested
    #[serde(default = "default_compose_mirror")]
    pub mirror_base: String,

    /// Install location of the standalone binary
    #[serde(default = "default_compose_install_path")]
    pub install_path: String,
}

fn default_compose_version() -> String {
    "v2.29.7".to_string()
}

fn default_compose_primary() -> String {
    "https://github.com/docker/compose/releases/download".to_string()
}

fn default_compose_mirror() -> String {
    "https://mirror.ghproxy.com/https://github.com/docker/compose/releases/download".to_string()
}

fn default_compose_install_path() -> String {
    "/usr/local/bin/docker-compose".to_string()
}

impl ComposeSettings {
    /// Download base for the chosen source
    pub fn base(&self, use_mirror: bool) -> &str {
        if use_mirror {
            &self.mirror_base
        } else {
            &self.primary_base
        }
    }
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            version: default_compose_version(),
            primary_base: default_compose_primary(),
            mirror_base: default_compose_mirror(),
            install_path: default_compose_install_path(),
        }
    }
}

/// docker-ce repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerRepoSettings {
    #[serde(default = "default_repo_primary")]
    pub primary: String,

    #[serde(default = "default_repo_mirror")]
    pub mirror: String,
}

fn default_repo_primary() -> String {
    "https://download.docker.com/linux/centos/docker-ce.repo".to_string()
}

fn default_repo_mirror() -> String {
    "https://mirrors.aliyun.com/docker-ce/linux/centos/docker-ce.repo".to_string()
}

impl DockerRepoSettings {
    pub fn url(&self, use_mirror: bool) -> &str {
        if use_mirror {
            &self.mirror
        } else {
            &self.primary
        }
    }
}

impl Default for DockerRepoSettings {
    fn default() -> Self {
        Self {
            primary: default_repo_primary(),
            mirror: default_repo_mirror(),
        }
    }
}

/// Host requirement thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementSettings {
    #[serde(default = "default_min_memory_mb")]
    pub min_memory_mb: u64,

    #[serde(default = "default_min_disk_mb")]
    pub min_disk_mb: u64,
}

fn default_min_memory_mb() -> u64 {
    2048
}

fn default_min_disk_mb() -> u64 {
    10240
}

impl Default for RequirementSettings {
    fn default() -> Self {
        Self {
            min_memory_mb: default_min_memory_mb(),
            min_disk_mb: default_min_disk_mb(),
        }
    }
}

/// Readiness polling budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessSettings {
    #[serde(default = "default_database_attempts")]
    pub database_attempts: u32,

    #[serde(default = "default_database_interval_secs")]
    pub database_interval_secs: u64,

    /// Delay before the first application probe
    #[serde(default = "default_app_settle_secs")]
    pub app_settle_secs: u64,

    #[serde(default = "default_app_attempts")]
    pub app_attempts: u32,

    #[serde(default = "default_app_interval_secs")]
    pub app_interval_secs: u64,

    /// Health endpoint path on the API port
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

fn default_database_attempts() -> u32 {
    30
}

fn default_database_interval_secs() -> u64 {
    2
}

fn default_app_settle_secs() -> u64 {
    10
}

fn default_app_attempts() -> u32 {
    10
}

fn default_app_interval_secs() -> u64 {
    3
}

fn default_health_path() -> String {
    "/health".to_string()
}

impl ReadinessSettings {
    pub fn database_interval(&self) -> Duration {
        Duration::from_secs(self.database_interval_secs)
    }

    pub fn app_settle(&self) -> Duration {
        Duration::from_secs(self.app_settle_secs)
    }

    pub fn app_interval(&self) -> Duration {
        Duration::from_secs(self.app_interval_secs)
    }
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            database_attempts: default_database_attempts(),
            database_interval_secs: default_database_interval_secs(),
            app_settle_secs: default_app_settle_secs(),
            app_attempts: default_app_attempts(),
            app_interval_secs: default_app_interval_secs(),
            health_path: default_health_path(),
        }
    }
}

/// Data-tier identity shared by the env file and the readiness probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_container")]
    pub container: String,

    #[serde(default = "default_db_user")]
    pub user: String,

    #[serde(default = "default_db_name")]
    pub name: String,

    #[serde(default = "default_cache_container")]
    pub cache_container: String,
}

fn default_db_container() -> String {
    "medicare_postgres".to_string()
}

fn default_db_user() -> String {
    "medicare_user".to_string()
}

fn default_db_name() -> String {
    "medicare_ai".to_string()
}

fn default_cache_container() -> String {
    "medicare_redis".to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            container: default_db_container(),
            user: default_db_user(),
            name: default_db_name(),
            cache_container: default_cache_container(),
        }
    }
}
