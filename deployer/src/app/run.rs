//! The deployment pipeline
//!
//! Stages run strictly in order and any error ends the run. Readiness and
//! the report only ever warn.

use std::future::Future;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::info;

use crate::app::options::InstallOptions;
use crate::config::collector::collect;
use crate::deploy::driver;
use crate::deploy::readiness::wait_for_stack;
use crate::errors::DeployError;
use crate::gate::privilege;
use crate::gate::requirements::{enforce, HostResources};
use crate::materialize::materialize;
use crate::patch::build_env::BuildEnv;
use crate::patch::selinux::{relax_selinux, SelinuxOutcome};
use crate::platform::os_release::OsRelease;
use crate::platform::profile::{confirm_version, resolve};
use crate::report::{print_report, DeploymentSummary};
use crate::runtime::compose::ensure_compose;
use crate::runtime::engine::ensure_engine;
use crate::storage::settings::InstallerSettings;
use crate::system::command::CommandRunner;
use crate::system::http::HttpClient;
use crate::system::prompt::Prompter;

/// Host collaborators and facts measured before the run
pub struct Host<'a> {
    pub runner: &'a dyn CommandRunner,
    pub http: &'a dyn HttpClient,
    pub resources: HostResources,
    pub detected_ip: Option<IpAddr>,
}

fn stage(number: u32, title: &str) {
    info!("");
    info!("==> [{}/9] {}", number, title);
}

/// Take the host from bare to a running stack
pub async fn run<S, F>(
    options: &InstallOptions,
    settings: &InstallerSettings,
    host: &Host<'_>,
    prompter: &mut dyn Prompter,
    sleep_fn: S,
    run_log: &Path,
    today: NaiveDate,
) -> Result<DeploymentSummary, DeployError>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let layout = options.layout();
    let runner = host.runner;

    stage(1, "Detecting platform");
    let release = OsRelease::load(&options.os_release).await?;
    let profile = resolve(&release)?;
    info!(
        "{} ({}), package manager {}",
        profile.display_name,
        profile.distro_id,
        profile.package_manager()
    );
    confirm_version(&profile, prompter).await?;

    // Nothing can be deployed without the manifest, so fail before mutating
    let compose_file = layout.compose_file();
    if !compose_file.exists().await {
        return Err(DeployError::ComposeFileMissing(
            compose_file.path().display().to_string(),
        ));
    }

    stage(2, "Collecting configuration");
    let config = collect(prompter, host.detected_ip).await?;

    stage(3, "Checking privileges and resources");
    let escalation = privilege::detect(runner).await?;
    runner.set_escalation(escalation);
    enforce(&host.resources, &settings.requirements, prompter).await?;

    stage(4, "Installing container runtime");
    let engine = ensure_engine(runner, &profile, &settings.docker_repo, config.use_mirror).await?;
    let compose = ensure_compose(
        runner,
        host.http,
        &profile,
        &settings.compose,
        config.use_mirror,
    )
    .await?;
    info!(
        "Runtime: docker {}, {} {}",
        engine.version(),
        compose.tool.invocation(),
        compose.version
    );

    stage(5, "Applying platform patches");
    match relax_selinux(runner, &profile).await? {
        SelinuxOutcome::Relaxed { persisted: true } => info!("SELinux set to permissive"),
        SelinuxOutcome::Relaxed { persisted: false } => {
            info!("SELinux set to permissive until next reboot")
        }
        SelinuxOutcome::NotApplicable
        | SelinuxOutcome::Unavailable
        | SelinuxOutcome::AlreadyRelaxed => {}
    }
    let build_env = BuildEnv::for_profile(&profile);

    stage(6, "Writing configuration");
    let artifacts = materialize(&layout, &config, &settings.database, today).await?;

    stage(7, "Starting services");
    driver::deploy(
        runner,
        layout.project_dir(),
        &settings.images,
        compose.tool,
        &build_env,
    )
    .await?;

    stage(8, "Waiting for services");
    let health_url = format!(
        "http://127.0.0.1:{}{}",
        config.ports.api, settings.readiness.health_path
    );
    let readiness = wait_for_stack(
        runner,
        host.http,
        &settings.database,
        &settings.readiness,
        &health_url,
        sleep_fn,
    )
    .await;

    stage(9, "Summary");
    let summary = DeploymentSummary {
        deployment_type: config.deployment_type,
        access_url: config.access_url(),
        api_url: config.api_url(),
        project_dir: layout.project_dir().to_path_buf(),
        compose: compose.tool,
        artifacts,
        readiness,
        run_log: run_log.to_path_buf(),
    };
    print_report(&summary);
    Ok(summary)
}
