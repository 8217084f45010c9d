//! Readiness polling
//!
//! Waiting never fails the run: the caller gets [`Readiness`] and decides
//! what to log. A probe that reports itself broken ends polling early so a
//! missing container is not mistaken for a slow one.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::storage::settings::{DatabaseSettings, ReadinessSettings};
use crate::system::command::{Cmd, CommandRunner};
use crate::system::http::HttpClient;

/// Result of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Ready,
    NotReady(String),
    /// The probe itself cannot work; retrying is pointless
    Broken(String),
}

/// Outcome of a polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready { attempts: u32 },
    TimedOut { attempts: u32, last: String },
    Error(String),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &str;

    async fn check(&self) -> ProbeStatus;
}

/// Bounded retry schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    /// Double the delay after every attempt, capped at `max_interval`
    pub backoff: bool,
    pub max_interval: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: false,
            max_interval: interval,
        }
    }

    pub fn backoff(max_attempts: u32, interval: Duration, max_interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: true,
            max_interval,
        }
    }

    /// Delay after the given 1-based failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.backoff {
            return self.interval;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.interval
            .checked_mul(factor)
            .map_or(self.max_interval, |delay| delay.min(self.max_interval))
    }

    /// Sum of all delays a fully exhausted loop sleeps
    pub fn budget(&self) -> Duration {
        (1..self.max_attempts).map(|attempt| self.delay_for(attempt)).sum()
    }
}

/// Poll `probe` until it is ready, broken, or the attempts run out
pub async fn wait_until_ready<S, F>(probe: &dyn Probe, policy: &RetryPolicy, sleep_fn: S) -> Readiness
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let mut last = String::from("not probed");
    for attempt in 1..=policy.max_attempts {
        match probe.check().await {
            ProbeStatus::Ready => {
                info!("{} ready after {} attempt(s)", probe.name(), attempt);
                return Readiness::Ready { attempts: attempt };
            }
            ProbeStatus::Broken(reason) => {
                warn!("{} probe cannot run: {}", probe.name(), reason);
                return Readiness::Error(reason);
            }
            ProbeStatus::NotReady(reason) => {
                debug!(
                    "{} not ready ({}/{}): {}",
                    probe.name(),
                    attempt,
                    policy.max_attempts,
                    reason
                );
                last = reason;
            }
        }
        if attempt < policy.max_attempts {
            sleep_fn(policy.delay_for(attempt)).await;
        }
    }
    Readiness::TimedOut {
        attempts: policy.max_attempts,
        last,
    }
}

/// `pg_isready` inside the database container
pub struct DatabaseProbe<'a> {
    runner: &'a dyn CommandRunner,
    container: String,
    user: String,
}

impl<'a> DatabaseProbe<'a> {
    pub fn new(runner: &'a dyn CommandRunner, database: &DatabaseSettings) -> Self {
        Self {
            runner,
            container: database.container.clone(),
            user: database.user.clone(),
        }
    }

    pub fn command(&self) -> Cmd {
        Cmd::new("docker")
            .args(["exec", self.container.as_str(), "pg_isready", "-U", self.user.as_str()])
            .privileged()
    }
}

#[async_trait]
impl<'a> Probe for DatabaseProbe<'a> {
    fn name(&self) -> &str {
        "Database"
    }

    async fn check(&self) -> ProbeStatus {
        let output = match self.runner.run(&self.command()).await {
            Ok(output) => output,
            Err(e) => return ProbeStatus::Broken(e.to_string()),
        };
        if output.success {
            return ProbeStatus::Ready;
        }
        let detail = if output.stderr.trim().is_empty() {
            output.stdout.trim().to_string()
        } else {
            output.stderr.trim().to_string()
        };
        // 126/127: pg_isready missing or not executable in the image
        if detail.contains("No such container") || matches!(output.code, Some(126) | Some(127)) {
            ProbeStatus::Broken(detail)
        } else {
            ProbeStatus::NotReady(detail)
        }
    }
}

/// HTTP GET on the application health endpoint
pub struct HttpHealthProbe<'a> {
    http: &'a dyn HttpClient,
    url: String,
}

impl<'a> HttpHealthProbe<'a> {
    pub fn new(http: &'a dyn HttpClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl<'a> Probe for HttpHealthProbe<'a> {
    fn name(&self) -> &str {
        "Application"
    }

    async fn check(&self) -> ProbeStatus {
        match self.http.get_status(&self.url).await {
            Ok(Some(status)) if (200..300).contains(&status) => ProbeStatus::Ready,
            Ok(Some(status)) => ProbeStatus::NotReady(format!("HTTP {}", status)),
            Ok(None) => ProbeStatus::NotReady("no response".to_string()),
            Err(e) => ProbeStatus::Broken(e.to_string()),
        }
    }
}

/// Readiness of both tiers after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackReadiness {
    pub database: Readiness,
    pub application: Readiness,
}

impl StackReadiness {
    pub fn is_healthy(&self) -> bool {
        self.database.is_ready() && self.application.is_ready()
    }
}

fn log_outcome(tier: &str, readiness: &Readiness) {
    match readiness {
        Readiness::Ready { .. } => {}
        Readiness::TimedOut { attempts, last } => warn!(
            "{} did not become ready after {} attempts (last: {}); continuing",
            tier, attempts, last
        ),
        Readiness::Error(reason) => {
            warn!("{} readiness could not be checked: {}; continuing", tier, reason)
        }
    }
}

/// Wait for the data tier, then the application tier
pub async fn wait_for_stack<S, F>(
    runner: &dyn CommandRunner,
    http: &dyn HttpClient,
    database: &DatabaseSettings,
    settings: &ReadinessSettings,
    health_url: &str,
    sleep_fn: S,
) -> StackReadiness
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Waiting for the database to accept connections...");
    let database_probe = DatabaseProbe::new(runner, database);
    let database_policy =
        RetryPolicy::fixed(settings.database_attempts, settings.database_interval());
    let database = wait_until_ready(&database_probe, &database_policy, &sleep_fn).await;
    log_outcome("Database", &database);

    info!("Waiting for the application at {}...", health_url);
    sleep_fn(settings.app_settle()).await;
    let app_probe = HttpHealthProbe::new(http, health_url);
    let app_policy = RetryPolicy::fixed(settings.app_attempts, settings.app_interval());
    let application = wait_until_ready(&app_probe, &app_policy, &sleep_fn).await;
    log_outcome("Application", &application);

    StackReadiness {
        database,
        application,
    }
}
