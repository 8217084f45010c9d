//! Deployment driver
//!
//! Pulls the base images one at a time, rebuilds the application images
//! without cache and starts the stack detached. Every step is fatal on
//! failure and nothing is retried.

use std::path::Path;

use tracing::info;

use crate::errors::DeployError;
use crate::patch::build_env::BuildEnv;
use crate::runtime::compose::ComposeTool;
use crate::storage::settings::ImageSettings;
use crate::system::command::{Cmd, CommandRunner};

/// Commands the driver runs, in order
pub fn deploy_commands(
    project_dir: &Path,
    images: &ImageSettings,
    compose: ComposeTool,
    build_env: &BuildEnv,
) -> Vec<Cmd> {
    let pulls = images
        .in_pull_order()
        .into_iter()
        .map(|image| Cmd::new("docker").args(["pull", image]));
    let compose_steps = [
        compose.cmd().args(["build", "--no-cache"]),
        compose.cmd().args(["up", "-d"]),
    ]
    .into_iter()
    .map(|cmd| cmd.envs(build_env.vars()).current_dir(project_dir));

    pulls
        .chain(compose_steps)
        .map(|cmd| cmd.privileged().streamed())
        .collect()
}

/// Pull, build and start the stack
pub async fn deploy(
    runner: &dyn CommandRunner,
    project_dir: &Path,
    images: &ImageSettings,
    compose: ComposeTool,
    build_env: &BuildEnv,
) -> Result<(), DeployError> {
    if build_env.is_legacy() {
        info!("Using the legacy builder (BuildKit disabled on this platform)");
    }
    for cmd in deploy_commands(project_dir, images, compose, build_env) {
        info!("Running: {}", cmd.display());
        runner.run_checked(&cmd).await?;
    }
    info!("Services started");
    Ok(())
}
