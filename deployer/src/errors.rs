//! Error types for the deployment pipeline

use thiserror::Error;

/// Main error type for the deployer
///
/// Every stage returns this type. Only the binary maps it to a process exit
/// code, see [`DeployError::exit_code`].
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unable to read OS descriptor: {0}")]
    DistroUnreadable(String),

    #[error("Unsupported distribution '{id}' (supported: {supported})")]
    UnsupportedDistro { id: String, supported: String },

    #[error("A domain deployment requires a non-empty domain name")]
    EmptyDomain,

    #[error("Port conflict: {0}")]
    PortConflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot obtain elevated privileges: {0}")]
    PrivilegeUnavailable(String),

    #[error("Aborted by operator: {0}")]
    Aborted(String),

    #[error("Container runtime installation failed: {0}")]
    RuntimeInstallFailed(String),

    #[error("Compose installation failed: {0}")]
    ComposeInstallFailed(String),

    #[error("Compose manifest not found: {0}")]
    ComposeFileMissing(String),

    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Interrupted by operator")]
    Interrupted,
}

impl DeployError {
    /// Message class shown to the operator and written to the run log
    pub fn kind(&self) -> &'static str {
        match self {
            DeployError::IoError(_) => "IoError",
            DeployError::JsonError(_) => "JsonError",
            DeployError::YamlError(_) => "YamlError",
            DeployError::HttpError(_) => "HttpError",
            DeployError::DistroUnreadable(_) => "DistroUnreadable",
            DeployError::UnsupportedDistro { .. } => "UnsupportedDistro",
            DeployError::EmptyDomain => "EmptyDomainError",
            DeployError::PortConflict(_) => "PortConflictError",
            DeployError::InvalidInput(_) => "InvalidInputError",
            DeployError::PrivilegeUnavailable(_) => "PrivilegeUnavailable",
            DeployError::Aborted(_) => "Aborted",
            DeployError::RuntimeInstallFailed(_) => "RuntimeInstallFailed",
            DeployError::ComposeInstallFailed(_) => "ComposeInstallFailed",
            DeployError::ComposeFileMissing(_) => "ComposeFileMissing",
            DeployError::ManifestError(_) => "ManifestError",
            DeployError::CommandFailed(_) => "CommandFailed",
            DeployError::ConfigError(_) => "ConfigError",
            DeployError::Interrupted => "Interrupted",
        }
    }

    /// Process exit code: 130 for an operator interrupt, 1 for everything else
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::Interrupted => 130,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(DeployError::Interrupted.exit_code(), 130);
        assert_eq!(DeployError::EmptyDomain.exit_code(), 1);
        assert_eq!(DeployError::PortConflict("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(DeployError::EmptyDomain.kind(), "EmptyDomainError");
        assert_eq!(DeployError::PortConflict("x".into()).kind(), "PortConflictError");
    }
}
