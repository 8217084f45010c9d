//! Deployment configuration model

use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};

use crate::errors::DeployError;

/// How the stack is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentType {
    /// Public deployment behind a domain name
    Domain,

    /// Reachable from the local network
    Lan,

    /// This machine only
    Local,
}

impl DeploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentType::Domain => "domain",
            DeploymentType::Lan => "lan",
            DeploymentType::Local => "local",
        }
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentType {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "domain" => Ok(DeploymentType::Domain),
            "lan" => Ok(DeploymentType::Lan),
            "local" => Ok(DeploymentType::Local),
            other => Err(DeployError::InvalidInput(format!(
                "unknown deployment type '{}'",
                other
            ))),
        }
    }
}

/// Published host ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    pub http: u16,
    pub https: u16,
    pub api: u16,
    pub frontend: u16,
}

impl Ports {
    pub const DEFAULT_HTTP: u16 = 80;
    pub const DEFAULT_HTTPS: u16 = 443;
    pub const DEFAULT_API: u16 = 8000;
    pub const DEFAULT_FRONTEND: u16 = 3000;

    /// Container-side ports these host ports publish, in the same order as
    /// [`Ports::named`]
    pub const CONTAINER_PORTS: [u16; 4] = [80, 443, 8000, 3000];

    /// Ports labelled for messages, in a fixed order
    pub fn named(&self) -> [(&'static str, u16); 4] {
        [
            ("HTTP", self.http),
            ("HTTPS", self.https),
            ("API", self.api),
            ("Frontend", self.frontend),
        ]
    }

    /// Every published port must be distinct
    pub fn validate(&self) -> Result<(), DeployError> {
        let named = self.named();
        for (i, (name_a, port_a)) in named.iter().enumerate() {
            for (name_b, port_b) in &named[i + 1..] {
                if port_a == port_b {
                    return Err(DeployError::PortConflict(format!(
                        "{} port {} is also used as the {} port",
                        name_a, port_a, name_b
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            http: Self::DEFAULT_HTTP,
            https: Self::DEFAULT_HTTPS,
            api: Self::DEFAULT_API,
            frontend: Self::DEFAULT_FRONTEND,
        }
    }
}

/// Everything the operator decided, plus the generated JWT secret
///
/// Built once by the collector and only read afterwards.
#[derive(Debug)]
pub struct DeploymentConfig {
    pub ai_api_url: String,
    pub ai_api_key: SecretString,
    pub ai_model_id: String,
    pub mineru_token: SecretString,
    pub jwt_secret: SecretString,
    pub deployment_type: DeploymentType,
    /// Set for domain deployments
    pub domain_name: Option<String>,
    /// Set for LAN deployments
    pub server_ip: Option<String>,
    pub ports: Ports,
    pub data_persistence: bool,
    pub use_mirror: bool,
}

impl DeploymentConfig {
    /// Host name or address clients use
    pub fn access_host(&self) -> &str {
        match self.deployment_type {
            DeploymentType::Domain => self.domain_name.as_deref().unwrap_or("localhost"),
            DeploymentType::Lan => self.server_ip.as_deref().unwrap_or("127.0.0.1"),
            DeploymentType::Local => "127.0.0.1",
        }
    }

    /// Externally visible entry point
    ///
    /// Domain deployments are served over TLS and omit the default port; LAN
    /// and local deployments always spell out the HTTP port.
    pub fn access_url(&self) -> String {
        match self.deployment_type {
            DeploymentType::Domain if self.ports.https == Ports::DEFAULT_HTTPS => {
                format!("https://{}", self.access_host())
            }
            DeploymentType::Domain => {
                format!("https://{}:{}", self.access_host(), self.ports.https)
            }
            DeploymentType::Lan | DeploymentType::Local => {
                format!("http://{}:{}", self.access_host(), self.ports.http)
            }
        }
    }

    /// Direct API address, bypassing the proxy
    pub fn api_url(&self) -> String {
        format!("http://{}:{}", self.access_host(), self.ports.api)
    }

    /// Compare every field, secrets included
    pub fn same_as(&self, other: &DeploymentConfig) -> bool {
        self.ai_api_url == other.ai_api_url
            && self.ai_api_key.expose_secret() == other.ai_api_key.expose_secret()
            && self.ai_model_id == other.ai_model_id
            && self.mineru_token.expose_secret() == other.mineru_token.expose_secret()
            && self.jwt_secret.expose_secret() == other.jwt_secret.expose_secret()
            && self.deployment_type == other.deployment_type
            && self.domain_name == other.domain_name
            && self.server_ip == other.server_ip
            && self.ports == other.ports
            && self.data_persistence == other.data_persistence
            && self.use_mirror == other.use_mirror
    }
}
