//! Read-only diagnostic against fake host collaborators

mod common;

use medideploy::app::diagnostic::run_diagnostic;
use medideploy::storage::settings::InstallerSettings;

use common::*;

#[tokio::test]
async fn test_diagnostic_reports_without_changes() {
    let project = Project::new(UBUNTU_2404);
    let runner = FakeRunner::new()
        .ok("id -u", "1000\n")
        .ok("sh -c command -v sudo", "/usr/bin/sudo")
        .fail("sudo -n true", 1, "sudo: a password is required")
        .ok("docker --version", DOCKER_VERSION)
        .ok("docker compose version", COMPOSE_V2);

    let report = run_diagnostic(
        &project.options(),
        &InstallerSettings::default(),
        &runner,
        ample_resources(),
        Some("192.168.1.20".parse().unwrap()),
    )
    .await;

    assert_eq!(report.distro_id.as_deref(), Some("ubuntu"));
    assert!(report.platform.as_ref().unwrap().version_supported);
    assert_eq!(report.privilege, "sudo (password required)");
    assert_eq!(report.engine, "docker 27.1.1");
    assert_eq!(report.compose.as_deref(), Some("docker compose 2.29.7"));
    assert!(report.compose_file_present);
    assert_eq!(report.unpublished_services, vec!["postgres", "redis"]);
    assert!(report.resource_warnings.is_empty());

    // Never prompts for a password or touches the project
    assert!(!runner.ran("sudo -v"));
    assert!(!project.file(".env").exists());
}

#[tokio::test]
async fn test_diagnostic_on_unsupported_host() {
    let project = Project::without_manifest("ID=arch\n");
    let runner = FakeRunner::new();

    let report = run_diagnostic(
        &project.options(),
        &InstallerSettings::default(),
        &runner,
        ample_resources(),
        None,
    )
    .await;

    assert!(report.platform.unwrap_err().contains("arch"));
    assert_eq!(report.engine, "missing");
    assert!(report.compose.is_none());
    assert!(!report.compose_file_present);
    assert!(report.unpublished_services.is_empty());
}
