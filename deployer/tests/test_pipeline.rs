//! End-to-end pipeline scenarios against fake host collaborators

mod common;

use std::sync::Mutex;

use chrono::NaiveDate;

use medideploy::app::run::{run, Host};
use medideploy::deploy::readiness::Readiness;
use medideploy::errors::DeployError;
use medideploy::report::DeploymentSummary;
use medideploy::storage::settings::InstallerSettings;
use medideploy::system::command::CmdOutput;

use common::*;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

async fn deploy(
    project: &Project,
    runner: &FakeRunner,
    http: &FakeHttp,
    answers: &[&str],
) -> Result<DeploymentSummary, DeployError> {
    let slept = Mutex::new(Vec::new());
    let host = Host {
        runner,
        http,
        resources: ample_resources(),
        detected_ip: Some("192.168.1.20".parse().unwrap()),
    };
    let mut prompter = ScriptedPrompter::new(answers);
    run(
        &project.options(),
        &InstallerSettings::default(),
        &host,
        &mut prompter,
        instant_sleep(&slept),
        &project.file("logs/run.log"),
        today(),
    )
    .await
}

#[tokio::test]
async fn test_ubuntu_local_defaults() {
    let project = Project::new(UBUNTU_2404);
    let runner = ready_host();
    let http = FakeHttp::healthy();

    let summary = deploy(&project, &runner, &http, &[]).await.unwrap();

    assert_eq!(summary.access_url, "http://127.0.0.1:80");
    assert!(!summary.is_degraded());
    assert!(project.file(".env").exists());
    assert!(project
        .file("docker-compose.yml.backup.20261019")
        .exists());

    // Everything was already installed
    assert!(!runner.ran("apt-get"));
    assert!(http.requests().iter().all(|url| url.ends_with("/health")));

    let calls = runner.calls();
    let build = calls
        .iter()
        .position(|c| c == "docker compose build --no-cache")
        .unwrap();
    let up = calls.iter().position(|c| c == "docker compose up -d").unwrap();
    assert_eq!(runner.count("docker pull"), 3);
    assert!(build < up);
}

#[tokio::test]
async fn test_empty_domain_aborts_before_writing() {
    let project = Project::new(UBUNTU_2404);
    let runner = ready_host();
    let http = FakeHttp::healthy();

    let err = deploy(&project, &runner, &http, &["3", ""]).await.unwrap_err();

    assert_eq!(err.kind(), "EmptyDomainError");
    assert_eq!(err.exit_code(), 1);
    assert!(!project.file(".env").exists());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_port_conflict_aborts_before_installation() {
    let project = Project::new(UBUNTU_2404);
    let runner = ready_host();
    let http = FakeHttp::healthy();

    // local, four AI answers, http 8080, https default, api 8080
    let answers = ["1", "", "", "", "", "8080", "", "8080"];
    let err = deploy(&project, &runner, &http, &answers).await.unwrap_err();

    assert_eq!(err.kind(), "PortConflictError");
    assert_eq!(err.exit_code(), 1);
    assert!(runner.calls().is_empty());
    assert!(!project.file(".env").exists());
}

#[tokio::test]
async fn test_readiness_timeout_still_reports() {
    let project = Project::new(UBUNTU_2404);
    let runner = ready_host().replace(
        "docker exec medicare_postgres pg_isready",
        CmdOutput::failed(1, "/var/run/postgresql:5432 - no response"),
    );
    let http = FakeHttp::with_health(&[None]);

    let summary = deploy(&project, &runner, &http, &[]).await.unwrap();

    assert!(summary.is_degraded());
    assert!(matches!(
        summary.readiness.database,
        Readiness::TimedOut { attempts: 30, .. }
    ));
    assert!(matches!(
        summary.readiness.application,
        Readiness::TimedOut { attempts: 10, .. }
    ));
    assert_eq!(summary.access_url, "http://127.0.0.1:80");
}

#[tokio::test]
async fn test_lan_deployment_uses_detected_ip() {
    let project = Project::new(UBUNTU_2404);
    let runner = ready_host();
    let http = FakeHttp::healthy();

    let summary = deploy(&project, &runner, &http, &["2", ""]).await.unwrap();

    assert_eq!(summary.access_url, "http://192.168.1.20:80");
    let env = std::fs::read_to_string(project.file(".env")).unwrap();
    assert!(env.contains("SERVER_IP='192.168.1.20'\n"));
    assert!(env.contains("DEPLOYMENT_TYPE='lan'\n"));
}

#[tokio::test]
async fn test_unsupported_distro_touches_nothing() {
    let project = Project::new("ID=arch\nNAME=\"Arch Linux\"\n");
    let runner = ready_host();
    let http = FakeHttp::healthy();

    let err = deploy(&project, &runner, &http, &[]).await.unwrap_err();

    match err {
        DeployError::UnsupportedDistro { id, supported } => {
            assert_eq!(id, "arch");
            assert!(supported.contains("ubuntu"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_missing_os_release() {
    let project = Project::new(UBUNTU_2404);
    std::fs::remove_file(project.file("os-release")).unwrap();
    let runner = ready_host();
    let http = FakeHttp::healthy();

    let err = deploy(&project, &runner, &http, &[]).await.unwrap_err();
    assert!(matches!(err, DeployError::DistroUnreadable(_)));
}

#[tokio::test]
async fn test_missing_manifest_fails_before_prompts() {
    let project = Project::without_manifest(UBUNTU_2404);
    let runner = ready_host();
    let http = FakeHttp::healthy();

    let err = deploy(&project, &runner, &http, &[]).await.unwrap_err();

    assert!(matches!(err, DeployError::ComposeFileMissing(_)));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_failed_pull_is_fatal() {
    let project = Project::new(UBUNTU_2404);
    let runner = ready_host().fail("docker pull redis", 1, "toomanyrequests: rate limit");
    let http = FakeHttp::healthy();

    let err = deploy(&project, &runner, &http, &[]).await.unwrap_err();

    assert!(matches!(err, DeployError::CommandFailed(_)));
    assert!(err.to_string().contains("rate limit"));
    assert!(!runner.ran("docker pull nginx"));
    assert!(!runner.ran("docker compose up"));
}

#[tokio::test]
async fn test_fedora_relaxes_selinux() {
    let project = Project::new(FEDORA_40);
    let runner = ready_host()
        .ok("sh -c command -v getenforce", "/usr/sbin/getenforce")
        .ok("getenforce", "Enforcing\n")
        .ok("setenforce 0", "")
        .ok("sed -i", "");
    let http = FakeHttp::healthy();

    deploy(&project, &runner, &http, &[]).await.unwrap();

    assert!(runner.ran("setenforce 0"));
    assert!(runner.ran("sed -i s/^SELINUX=enforcing/SELINUX=permissive/ /etc/selinux/config"));
}

#[tokio::test]
async fn test_tumbleweed_builds_with_legacy_engine() {
    let project = Project::new(TUMBLEWEED);
    let runner = ready_host();
    let http = FakeHttp::healthy();

    deploy(&project, &runner, &http, &[]).await.unwrap();

    let build = runner
        .commands()
        .into_iter()
        .find(|c| c.display().starts_with("docker compose build"))
        .unwrap();
    assert!(build
        .env
        .contains(&("DOCKER_BUILDKIT".to_string(), "0".to_string())));
}

#[tokio::test]
async fn test_declined_resource_gate_aborts() {
    let project = Project::new(UBUNTU_2404);
    let runner = ready_host();
    let http = FakeHttp::healthy();
    let slept = Mutex::new(Vec::new());
    let host = Host {
        runner: &runner,
        http: &http,
        resources: medideploy::gate::requirements::HostResources {
            memory_total_mb: 1024,
            disk_available_mb: 100_000,
        },
        detected_ip: None,
    };
    // Defaults for the eleven collector questions, then decline
    let mut answers = vec![""; 11];
    answers.push("n");
    let mut prompter = ScriptedPrompter::new(&answers);

    let err = run(
        &project.options(),
        &InstallerSettings::default(),
        &host,
        &mut prompter,
        instant_sleep(&slept),
        &project.file("logs/run.log"),
        today(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DeployError::Aborted(_)));
    assert!(!runner.ran("docker pull"));
    assert!(!project.file(".env").exists());
}

const UBUNTU_1804: &str = "NAME=\"Ubuntu\"\nVERSION_ID=\"18.04\"\nID=ubuntu\nID_LIKE=debian\n";

#[tokio::test]
async fn test_old_release_declined_by_default() {
    let project = Project::new(UBUNTU_1804);
    let runner = ready_host();
    let http = FakeHttp::healthy();

    let err = deploy(&project, &runner, &http, &[""]).await.unwrap_err();

    assert!(matches!(err, DeployError::Aborted(_)));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_old_release_accepted() {
    let project = Project::new(UBUNTU_1804);
    let runner = ready_host();
    let http = FakeHttp::healthy();

    let summary = deploy(&project, &runner, &http, &["y"]).await.unwrap();
    assert_eq!(summary.access_url, "http://127.0.0.1:80");
}
