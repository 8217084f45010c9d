//! Configuration materializer: environment file and compose manifest

pub mod env_file;
pub mod manifest;

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::model::{DeploymentConfig, Ports};
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::storage::layout::ProjectLayout;
use crate::storage::settings::DatabaseSettings;

use self::env_file::{parse_env, ports_from_env, write_env_file, DataSecrets};
use self::manifest::{parse_manifest, remap_ports, render_manifest, PortChange};

/// Files written by [`materialize`]
#[derive(Debug, Clone)]
pub struct GeneratedArtifacts {
    pub env_file: PathBuf,
    pub compose_file: PathBuf,
    pub compose_backup: PathBuf,
    pub port_changes: Vec<PortChange>,
}

/// Ports recorded by the previous run's environment file, if readable
async fn previous_ports(env_file: &File) -> Option<Ports> {
    if !env_file.exists().await {
        return None;
    }
    let contents = match env_file.read_string().await {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Cannot read previous {:?}: {}", env_file.path(), e);
            return None;
        }
    };
    match ports_from_env(&parse_env(&contents)) {
        Ok(ports) => Some(ports),
        Err(e) => {
            debug!("No usable ports in previous {:?}: {}", env_file.path(), e);
            None
        }
    }
}

/// Write the environment file and apply the configured ports to the manifest
///
/// The manifest must already exist. It is backed up to the day's backup slot
/// before anything is written.
pub async fn materialize(
    layout: &ProjectLayout,
    config: &DeploymentConfig,
    database: &DatabaseSettings,
    today: NaiveDate,
) -> Result<GeneratedArtifacts, DeployError> {
    let compose_file = layout.compose_file();
    if !compose_file.exists().await {
        return Err(DeployError::ComposeFileMissing(
            compose_file.path().display().to_string(),
        ));
    }
    let original = compose_file.read_string().await?;
    let mut doc = parse_manifest(&original)?;

    let backup = layout.compose_backup(today);
    if backup.exists().await {
        warn!("Overwriting today's manifest backup {:?}", backup.path());
    }
    compose_file.copy_to(&backup).await?;
    info!("Backed up {:?} to {:?}", compose_file.path(), backup.path());

    let env_file = layout.env_file();
    let previous = previous_ports(&env_file).await;
    write_env_file(&env_file, config, &DataSecrets::generate(), database).await?;
    info!("Wrote {:?} (mode 600)", env_file.path());

    let port_changes = remap_ports(&mut doc, &config.ports, previous.as_ref())?;
    if port_changes.is_empty() {
        info!("Manifest ports already match the configuration");
    } else {
        for change in &port_changes {
            info!(
                "{}: published port {} -> {} (container {})",
                change.service, change.from, change.to, change.container_port
            );
        }
        compose_file
            .write_atomic(render_manifest(&doc)?.as_bytes())
            .await?;
    }

    if !config.data_persistence {
        warn!("Data persistence disabled: the manifest volumes are left unchanged, data still persists until removed with `down -v`");
    }

    Ok(GeneratedArtifacts {
        env_file: env_file.path().to_path_buf(),
        compose_file: compose_file.path().to_path_buf(),
        compose_backup: backup.path().to_path_buf(),
        port_changes,
    })
}
