//! OS descriptor parsing (`/etc/os-release`)

use std::collections::HashMap;
use std::path::Path;

use crate::errors::DeployError;

/// Well-known location of the OS descriptor
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Identity fields read from the OS descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsRelease {
    /// Lowercased `ID`
    pub id: String,

    /// `VERSION_ID`, absent on some rolling releases
    pub version_id: Option<String>,

    pub name: Option<String>,

    pub pretty_name: Option<String>,
}

impl OsRelease {
    /// Read and parse the descriptor at `path`
    pub async fn load(path: &Path) -> Result<Self, DeployError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DeployError::DistroUnreadable(format!("{}: {}", path.display(), e)))?;
        Self::parse(&contents)
    }

    /// Parse descriptor contents; `ID` is mandatory
    pub fn parse(contents: &str) -> Result<Self, DeployError> {
        let fields = parse_fields(contents);

        let id = fields
            .get("ID")
            .map(|id| id.to_lowercase())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DeployError::DistroUnreadable("missing ID field".to_string()))?;

        Ok(Self {
            id,
            version_id: fields.get("VERSION_ID").cloned().filter(|v| !v.is_empty()),
            name: fields.get("NAME").cloned(),
            pretty_name: fields.get("PRETTY_NAME").cloned(),
        })
    }

    /// Best human-readable name
    pub fn display_name(&self) -> &str {
        self.pretty_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.id)
    }
}

fn parse_fields(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), unquote(value.trim())))
        .collect()
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            let inner = &value[1..value.len() - 1];
            return if quote == '"' {
                inner.replace("\\\"", "\"").replace("\\\\", "\\")
            } else {
                inner.to_string()
            };
        }
    }
    value.to_string()
}
