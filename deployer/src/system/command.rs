//! Subprocess execution
//!
//! Stages describe commands as [`Cmd`] values and hand them to a
//! [`CommandRunner`]. The system runner adds `sudo` for privileged commands
//! once the privilege gate has decided it is needed.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::DeployError;
use crate::gate::privilege::Escalation;

/// How a command's output is handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Collect stdout/stderr for inspection
    #[default]
    Capture,

    /// Forward each output line into the log
    Stream,

    /// Attach to the operator's terminal (password prompts)
    Inherit,
}

/// A command to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
    pub privileged: bool,
    pub mode: OutputMode,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            privileged: false,
            mode: OutputMode::Capture,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs(mut self, vars: &[(String, String)]) -> Self {
        self.env.extend(vars.iter().cloned());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Needs root; runs through `sudo` when the process is not root
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn streamed(mut self) -> Self {
        self.mode = OutputMode::Stream;
        self
    }

    pub fn inherited(mut self) -> Self {
        self.mode = OutputMode::Inherit;
        self
    }

    /// Program and arguments joined by spaces
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    /// A successful run printing `stdout`
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with exit `code` printing `stderr`
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Runs commands on the host
///
/// `run` returns `Err` only when the command could not be executed at all;
/// a non-zero exit is reported through [`CmdOutput::success`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, cmd: &Cmd) -> Result<CmdOutput, DeployError>;

    /// Apply the escalation decided by the privilege gate
    fn set_escalation(&self, _escalation: Escalation) {}

    /// Run and require a zero exit status
    async fn run_checked(&self, cmd: &Cmd) -> Result<CmdOutput, DeployError> {
        let output = self.run(cmd).await?;
        if output.success {
            Ok(output)
        } else {
            Err(DeployError::CommandFailed(format!(
                "`{}` exited with {}{}",
                cmd.display(),
                output
                    .code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                match output.stderr.trim() {
                    "" => String::new(),
                    stderr => format!(": {}", stderr),
                }
            )))
        }
    }

    /// Whether `program` resolves on PATH
    async fn has_program(&self, program: &str) -> bool {
        let probe = Cmd::new("sh")
            .arg("-c")
            .arg(format!("command -v {}", program));
        self.run(&probe).await.map(|o| o.success).unwrap_or(false)
    }
}

/// Runs commands as real subprocesses
#[derive(Debug, Default)]
pub struct SystemRunner {
    use_sudo: AtomicBool,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn build(&self, cmd: &Cmd) -> Command {
        let escalate = cmd.privileged && self.use_sudo.load(Ordering::Relaxed);

        // sudo resets the environment, so variables travel through `env`
        let mut command = if escalate {
            let mut command = Command::new("sudo");
            if !cmd.env.is_empty() {
                command.arg("env");
                command.args(cmd.env.iter().map(|(k, v)| format!("{}={}", k, v)));
            }
            command.arg(&cmd.program);
            command
        } else {
            let mut command = Command::new(&cmd.program);
            command.envs(cmd.env.iter().map(|(k, v)| (k, v)));
            command
        };

        command.args(&cmd.args).kill_on_drop(true);
        if let Some(dir) = &cmd.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, cmd: &Cmd) -> Result<CmdOutput, DeployError> {
        debug!("Running: {}", cmd.display());
        let mut command = self.build(cmd);
        let spawn_err =
            |e: std::io::Error| DeployError::CommandFailed(format!("Failed to run `{}`: {}", cmd.display(), e));

        match cmd.mode {
            OutputMode::Capture => {
                let output = command
                    .stdin(Stdio::null())
                    .output()
                    .await
                    .map_err(spawn_err)?;
                Ok(CmdOutput {
                    success: output.status.success(),
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            OutputMode::Inherit => {
                let status = command.status().await.map_err(spawn_err)?;
                Ok(CmdOutput {
                    success: status.success(),
                    code: status.code(),
                    ..Default::default()
                })
            }
            OutputMode::Stream => {
                let mut child = command
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()
                    .map_err(spawn_err)?;

                let stdout = child.stdout.take().map(|s| tokio::spawn(forward_lines(s)));
                let stderr = child.stderr.take().map(|s| tokio::spawn(forward_lines(s)));

                let status = child.wait().await?;
                let mut tail = String::new();
                for handle in [stdout, stderr].into_iter().flatten() {
                    if let Ok(last) = handle.await {
                        tail = last;
                    }
                }

                Ok(CmdOutput {
                    success: status.success(),
                    code: status.code(),
                    stdout: String::new(),
                    stderr: tail,
                })
            }
        }
    }

    fn set_escalation(&self, escalation: Escalation) {
        self.use_sudo
            .store(escalation == Escalation::Sudo, Ordering::Relaxed);
    }
}

/// Forward every line into the log; returns the last line seen
async fn forward_lines<R: AsyncRead + Unpin>(reader: R) -> String {
    let mut lines = BufReader::new(reader).lines();
    let mut last = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            info!("  | {}", line);
            last = line;
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let cmd = Cmd::new("docker")
            .args(["compose", "up", "-d"])
            .env("DOCKER_BUILDKIT", "0");
        assert_eq!(cmd.display(), "docker compose up -d");
    }

    #[test]
    fn test_builder_flags() {
        let cmd = Cmd::new("apt-get").arg("update").privileged().streamed();
        assert!(cmd.privileged);
        assert_eq!(cmd.mode, OutputMode::Stream);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_capture() {
        let runner = SystemRunner::new();
        let out = runner
            .run(&Cmd::new("sh").args(["-c", "echo hi; exit 3"]))
            .await
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout_trimmed(), "hi");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_checked_reports_failure() {
        let runner = SystemRunner::new();
        let err = runner
            .run_checked(&Cmd::new("sh").args(["-c", "echo boom >&2; exit 1"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let runner = SystemRunner::new();
        let result = runner.run(&Cmd::new("definitely-not-a-real-binary-xyz")).await;
        assert!(matches!(result, Err(DeployError::CommandFailed(_))));
    }
}
