//! File operations

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::DeployError;

/// A file wrapper with path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, DeployError> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, DeployError> {
        let contents = self.read_string().await?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write string to file, creating parent directories as needed
    pub async fn write_string(&self, contents: &str) -> Result<(), DeployError> {
        self.write_bytes(contents.as_bytes()).await
    }

    /// Write bytes to file, creating parent directories as needed
    pub async fn write_bytes(&self, contents: &[u8]) -> Result<(), DeployError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = fs::File::create(&self.path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Replace the file through a sibling temp file and a rename, so readers
    /// see either the old or the new contents
    pub async fn write_atomic(&self, contents: &[u8]) -> Result<(), DeployError> {
        self.write_via_temp(contents, None).await
    }

    /// Like [`File::write_atomic`], with the temp file created as 0o600 so
    /// the contents are never readable by others
    pub async fn write_atomic_private(&self, contents: &[u8]) -> Result<(), DeployError> {
        self.write_via_temp(contents, Some(0o600)).await
    }

    #[allow(unused_variables)]
    async fn write_via_temp(&self, contents: &[u8], mode: Option<u32>) -> Result<(), DeployError> {
        let mut temp_name = self.path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = self.path.with_file_name(temp_name);
        // A leftover temp file would keep its old mode
        if fs::metadata(&temp_path).await.is_ok() {
            fs::remove_file(&temp_path).await?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        if let Some(mode) = mode {
            options.mode(mode);
        }

        // Write to temp file
        let mut file = options.open(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        // Rename to target
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Copy this file to `dest`, replacing whatever is there
    pub async fn copy_to(&self, dest: &File) -> Result<(), DeployError> {
        fs::copy(&self.path, &dest.path).await?;
        Ok(())
    }

    /// Delete the file
    pub async fn delete(&self) -> Result<(), DeployError> {
        if self.exists().await {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }

    /// Set file permissions to 0o755 on Unix.
    pub async fn set_executable(&self) -> Result<(), DeployError> {
        self.set_mode(0o755).await
    }

    #[allow(unused_variables)]
    async fn set_mode(&self, mode: u32) -> Result<(), DeployError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.path).await?.permissions();
            perms.set_mode(mode);
            fs::set_permissions(&self.path, perms).await?;
        }
        Ok(())
    }
}
