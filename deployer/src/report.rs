//! Outcome report

use std::path::PathBuf;

use colored::Colorize;
use tracing::info;

use crate::config::model::DeploymentType;
use crate::deploy::readiness::{Readiness, StackReadiness};
use crate::materialize::GeneratedArtifacts;
use crate::runtime::compose::ComposeTool;

/// Everything the report shows
#[derive(Debug, Clone)]
pub struct DeploymentSummary {
    pub deployment_type: DeploymentType,
    pub access_url: String,
    pub api_url: String,
    pub project_dir: PathBuf,
    pub compose: ComposeTool,
    pub artifacts: GeneratedArtifacts,
    pub readiness: StackReadiness,
    pub run_log: PathBuf,
}

impl DeploymentSummary {
    /// Started but not proven healthy
    pub fn is_degraded(&self) -> bool {
        !self.readiness.is_healthy()
    }
}

fn readiness_line(tier: &str, readiness: &Readiness) -> String {
    match readiness {
        Readiness::Ready { .. } => format!("  {:<12} {}", tier, "ready".green()),
        Readiness::TimedOut { .. } => format!("  {:<12} {}", tier, "not ready yet".yellow()),
        Readiness::Error(reason) => {
            format!("  {:<12} {} ({})", tier, "unknown".yellow(), reason)
        }
    }
}

/// Render the report text
pub fn render_report(summary: &DeploymentSummary) -> String {
    let compose = summary.compose.invocation();
    let mut lines = Vec::new();

    lines.push(String::new());
    if summary.is_degraded() {
        lines.push(format!(
            "{}",
            "Deployment started, but not every service answered its health check"
                .yellow()
                .bold()
        ));
        lines.push(format!(
            "Some services may still be warming up; check `{} logs -f` if this persists.",
            compose
        ));
    } else {
        lines.push(format!("{}", "Deployment complete".green().bold()));
    }

    lines.push(String::new());
    lines.push(format!("Access ({})", summary.deployment_type));
    lines.push(format!("  Web:         {}", summary.access_url));
    lines.push(format!("  API:         {}", summary.api_url));
    lines.push(format!("  API docs:    {}/docs", summary.api_url));
    if summary.deployment_type == DeploymentType::Domain {
        lines.push("  Point the domain's DNS record at this host and install a TLS certificate for the proxy.".to_string());
    }

    lines.push(String::new());
    lines.push("Health".to_string());
    lines.push(readiness_line("Database", &summary.readiness.database));
    lines.push(readiness_line("Application", &summary.readiness.application));

    lines.push(String::new());
    lines.push(format!("Management (run in {})", summary.project_dir.display()));
    lines.push(format!("  Status:      {} ps", compose));
    lines.push(format!("  Logs:        {} logs -f", compose));
    lines.push(format!("  Restart:     {} restart", compose));
    lines.push(format!("  Stop:        {} down", compose));

    lines.push(String::new());
    lines.push("Configuration".to_string());
    lines.push(format!("  Environment: {}", summary.artifacts.env_file.display()));
    lines.push(format!("  Compose:     {}", summary.artifacts.compose_file.display()));
    lines.push(format!("  Backup:      {}", summary.artifacts.compose_backup.display()));
    lines.push(format!("  Run log:     {}", summary.run_log.display()));

    lines.join("\n")
}

/// Emit the report through the log so it reaches the terminal and the run log
pub fn print_report(summary: &DeploymentSummary) {
    for line in render_report(summary).lines() {
        info!("{}", line);
    }
}
