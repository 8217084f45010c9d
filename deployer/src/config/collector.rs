//! Interactive configuration collection
//!
//! Asks the operator a fixed sequence of questions. Every question has a
//! default chosen by empty input. Terminal I/O is the only side effect.

use std::net::IpAddr;

use colored::Colorize;
use secrecy::SecretString;
use tracing::{info, warn};
use url::Url;

use crate::config::model::{DeploymentConfig, DeploymentType, Ports};
use crate::config::network::is_private;
use crate::config::secrets::generate_jwt_secret;
use crate::errors::DeployError;
use crate::system::prompt::Prompter;

pub const DEFAULT_AI_API_URL: &str = "http://127.0.0.1:8033/v1/";
pub const DEFAULT_AI_MODEL_ID: &str = "unsloth/GLM-4.7-Flash-GGUF:BF16";

const DEPLOYMENT_CHOICES: [(&str, DeploymentType); 3] = [
    ("Local (this machine only)", DeploymentType::Local),
    ("LAN (other machines on the local network)", DeploymentType::Lan),
    ("Domain (public, behind a domain name)", DeploymentType::Domain),
];

/// Run the question sequence
///
/// `detected_ip` is offered as the default server address for LAN
/// deployments.
pub async fn collect(
    prompter: &mut dyn Prompter,
    detected_ip: Option<IpAddr>,
) -> Result<DeploymentConfig, DeployError> {
    section(prompter, "Deployment topology");
    let labels: Vec<&str> = DEPLOYMENT_CHOICES.iter().map(|(label, _)| *label).collect();
    let choice = prompter.choose("How will users reach the system?", &labels, 0).await?;
    let deployment_type = DEPLOYMENT_CHOICES[choice].1;

    let (domain_name, server_ip) = match deployment_type {
        DeploymentType::Domain => (Some(ask_domain(prompter).await?), None),
        DeploymentType::Lan => (None, Some(ask_server_ip(prompter, detected_ip).await?)),
        DeploymentType::Local => (None, None),
    };

    section(prompter, "AI service");
    let ai_api_url = ask_url(prompter, "AI API URL", DEFAULT_AI_API_URL).await?;
    let ai_api_key = prompter.ask("AI API key (empty for none)", "").await?;
    let ai_model_id = prompter.ask("AI model id", DEFAULT_AI_MODEL_ID).await?;
    let mineru_token = prompter
        .ask("MinerU token for document parsing (empty to skip)", "")
        .await?;

    section(prompter, "Ports");
    let ports = Ports {
        http: ask_port(prompter, "HTTP port", Ports::DEFAULT_HTTP).await?,
        https: ask_port(prompter, "HTTPS port", Ports::DEFAULT_HTTPS).await?,
        api: ask_port(prompter, "API port", Ports::DEFAULT_API).await?,
        frontend: ask_port(prompter, "Frontend port", Ports::DEFAULT_FRONTEND).await?,
    };
    ports.validate()?;

    section(prompter, "Storage and downloads");
    let data_persistence = prompter
        .confirm("Keep database data across container restarts?", true)
        .await?;
    let use_mirror = prompter
        .confirm("Download through the mirror (recommended in mainland China)?", false)
        .await?;

    let config = DeploymentConfig {
        ai_api_url,
        ai_api_key: SecretString::from(ai_api_key),
        ai_model_id,
        mineru_token: SecretString::from(mineru_token),
        jwt_secret: generate_jwt_secret(),
        deployment_type,
        domain_name,
        server_ip,
        ports,
        data_persistence,
        use_mirror,
    };

    info!(
        "Configuration collected: type={} host={} http={} https={} api={} frontend={} persistence={} mirror={}",
        config.deployment_type,
        config.access_host(),
        ports.http,
        ports.https,
        ports.api,
        ports.frontend,
        config.data_persistence,
        config.use_mirror
    );
    Ok(config)
}

fn section(prompter: &mut dyn Prompter, title: &str) {
    prompter.say("");
    prompter.say(&format!("{}", format!("== {} ==", title).bold()));
}

async fn ask_domain(prompter: &mut dyn Prompter) -> Result<String, DeployError> {
    let domain = prompter.ask("Domain name (e.g. care.example.org)", "").await?;
    if domain.is_empty() {
        return Err(DeployError::EmptyDomain);
    }
    if domain.contains("://") || domain.contains('/') || domain.contains(char::is_whitespace) {
        return Err(DeployError::InvalidInput(format!(
            "'{}' is not a bare domain name",
            domain
        )));
    }
    Ok(domain.to_lowercase())
}

async fn ask_server_ip(
    prompter: &mut dyn Prompter,
    detected_ip: Option<IpAddr>,
) -> Result<String, DeployError> {
    let default = detected_ip.map(|ip| ip.to_string()).unwrap_or_default();
    let answer = prompter.ask("Server IP address", &default).await?;
    if answer.is_empty() {
        return Err(DeployError::InvalidInput(
            "no server IP detected; enter one explicitly".to_string(),
        ));
    }
    let ip: IpAddr = answer
        .parse()
        .map_err(|_| DeployError::InvalidInput(format!("'{}' is not an IP address", answer)))?;
    if !is_private(&ip) {
        warn!("{} is not a private address; the stack will be reachable beyond the LAN", ip);
    }
    Ok(ip.to_string())
}

async fn ask_url(
    prompter: &mut dyn Prompter,
    question: &str,
    default: &str,
) -> Result<String, DeployError> {
    let answer = prompter.ask(question, default).await?;
    match Url::parse(&answer) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(answer),
        _ => Err(DeployError::InvalidInput(format!(
            "'{}' is not an http(s) URL",
            answer
        ))),
    }
}

async fn ask_port(
    prompter: &mut dyn Prompter,
    question: &str,
    default: u16,
) -> Result<u16, DeployError> {
    let answer = prompter.ask(question, &default.to_string()).await?;
    match answer.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(DeployError::InvalidInput(format!(
            "{}: '{}' is not a port number",
            question, answer
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use secrecy::ExposeSecret;

    use super::*;

    struct Script(VecDeque<String>);

    impl Script {
        fn new(answers: &[&str]) -> Self {
            Self(answers.iter().map(|s| s.to_string()).collect())
        }
    }

    #[async_trait]
    impl Prompter for Script {
        async fn read_line(&mut self, _prompt: &str) -> Result<Option<String>, DeployError> {
            Ok(self.0.pop_front())
        }
    }

    #[tokio::test]
    async fn test_all_defaults_is_local() {
        let mut script = Script::new(&[]);
        let config = collect(&mut script, None).await.unwrap();

        assert_eq!(config.deployment_type, DeploymentType::Local);
        assert_eq!(config.ports, Ports::default());
        assert_eq!(config.ai_api_url, DEFAULT_AI_API_URL);
        assert_eq!(config.ai_model_id, DEFAULT_AI_MODEL_ID);
        assert!(config.data_persistence);
        assert!(!config.use_mirror);
        assert_eq!(config.jwt_secret.expose_secret().len(), 64);
        assert_eq!(config.access_url(), "http://127.0.0.1:80");
    }

    #[tokio::test]
    async fn test_empty_domain_fails() {
        let mut script = Script::new(&["3", ""]);
        let err = collect(&mut script, None).await.unwrap_err();
        assert!(matches!(err, DeployError::EmptyDomain));
    }

    #[tokio::test]
    async fn test_domain_with_scheme_rejected() {
        let mut script = Script::new(&["3", "https://care.example.org"]);
        let err = collect(&mut script, None).await.unwrap_err();
        assert!(matches!(err, DeployError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_lan_offers_detected_ip() {
        let mut script = Script::new(&["2", ""]);
        let detected = Some("192.168.1.42".parse().unwrap());
        let config = collect(&mut script, detected).await.unwrap();
        assert_eq!(config.server_ip.as_deref(), Some("192.168.1.42"));
        assert_eq!(config.access_url(), "http://192.168.1.42:80");
    }

    #[tokio::test]
    async fn test_lan_without_detection_needs_input() {
        let mut script = Script::new(&["2", ""]);
        let err = collect(&mut script, None).await.unwrap_err();
        assert!(matches!(err, DeployError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_port_conflict() {
        // type, url, key, model, mineru, http, https, api
        let mut script = Script::new(&["1", "", "", "", "", "8080", "", "8080"]);
        let err = collect(&mut script, None).await.unwrap_err();
        assert!(matches!(err, DeployError::PortConflict(_)));
    }

    #[tokio::test]
    async fn test_invalid_port() {
        let mut script = Script::new(&["1", "", "", "", "", "99999"]);
        let err = collect(&mut script, None).await.unwrap_err();
        assert!(matches!(err, DeployError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_invalid_ai_url() {
        let mut script = Script::new(&["1", "ftp://models.local"]);
        let err = collect(&mut script, None).await.unwrap_err();
        assert!(matches!(err, DeployError::InvalidInput(_)));
    }
}
