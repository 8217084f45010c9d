//! MediCare AI deployer - Entry Point
//!
//! Interactive one-click deployment of the MediCare AI stack onto a Linux
//! host. Exit codes: 0 success, 1 failure, 130 interrupted.

use std::env;
use std::process;

use chrono::Local;
use tracing::{error, info, warn};

use medideploy::app::diagnostic::run_diagnostic;
use medideploy::app::options::InstallOptions;
use medideploy::app::run::{run, Host};
use medideploy::config::network::detect_lan_ip;
use medideploy::errors::DeployError;
use medideploy::filesys::file::File;
use medideploy::gate::requirements::probe_resources;
use medideploy::logs::{init_logging, LogOptions};
use medideploy::storage::settings::InstallerSettings;
use medideploy::system::command::SystemRunner;
use medideploy::system::http::ReqwestClient;
use medideploy::system::prompt::TerminalPrompter;
use medideploy::utils::{parse_cli_args, version_info};

#[tokio::main]
async fn main() {
    let cli_args = parse_cli_args(env::args().skip(1));

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render version: {}", e),
        }
        return;
    }

    let options = match InstallOptions::from_cli(&cli_args) {
        Ok(options) => options,
        Err(e) => exit_before_logging(e),
    };
    let settings = match InstallerSettings::load(&File::new(&options.settings_file)).await {
        Ok(settings) => settings,
        Err(e) => exit_before_logging(e),
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: options
            .log_level
            .clone()
            .unwrap_or_else(|| settings.log_level.clone()),
        log_dir: options.log_dir.clone(),
        started_at: Local::now(),
        ..Default::default()
    };
    let run_log = match init_logging(log_options) {
        Ok(run_log) => run_log,
        Err(e) => exit_before_logging(e),
    };
    info!(
        "medideploy {} ({}, built {})",
        version.version, version.git_hash, version.build_time
    );
    info!("Run log: {}", run_log.path().display());

    let runner = SystemRunner::new();
    let resources = probe_resources(&options.project_dir);
    let detected_ip = detect_lan_ip().await;

    // Run diagnostics
    if cli_args.contains_key("diagnostic") || cli_args.contains_key("diag") {
        let report = run_diagnostic(&options, &settings, &runner, resources, detected_ip).await;
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to render diagnostic: {}", e),
        }
        return;
    }

    let http = match ReqwestClient::new() {
        Ok(http) => http,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            drop(run_log);
            process::exit(e.exit_code());
        }
    };
    let host = Host {
        runner: &runner,
        http: &http,
        resources,
        detected_ip,
    };
    let mut prompter = TerminalPrompter::new();
    let today = Local::now().date_naive();

    let result = tokio::select! {
        result = run(
            &options,
            &settings,
            &host,
            &mut prompter,
            tokio::time::sleep,
            run_log.path(),
            today,
        ) => result,
        _ = await_shutdown_signal() => Err(DeployError::Interrupted),
    };

    let code = match result {
        Ok(summary) => {
            if summary.is_degraded() {
                warn!("Finished with warnings; see {}", run_log.path().display());
            }
            0
        }
        Err(e) => {
            error!("{}: {}", e.kind(), e);
            error!(
                "Deployment failed with exit code {}. Full log: {}",
                e.exit_code(),
                run_log.path().display()
            );
            e.exit_code()
        }
    };

    // Flush the run log before exiting
    drop(run_log);
    process::exit(code);
}

fn exit_before_logging(e: DeployError) -> ! {
    eprintln!("[ERROR] {}: {}", e.kind(), e);
    process::exit(e.exit_code());
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, aborting...");
                    }
                    _ = ctrl_c() => {
                        info!("Ctrl+C received, aborting...");
                    }
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                ctrl_c().await;
                info!("Ctrl+C received, aborting...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
        info!("Ctrl+C received, aborting...");
    }
}
