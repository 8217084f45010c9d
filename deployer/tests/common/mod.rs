//! Shared fakes for the scenario tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use medideploy::app::options::InstallOptions;
use medideploy::errors::DeployError;
use medideploy::gate::privilege::Escalation;
use medideploy::gate::requirements::HostResources;
use medideploy::system::command::{Cmd, CmdOutput, CommandRunner};
use medideploy::system::http::HttpClient;
use medideploy::system::prompt::Prompter;
use medideploy::utils::sha256_hex;

pub const DOCKER_VERSION: &str = "Docker version 27.1.1, build 6312585";
pub const COMPOSE_V2: &str = "Docker Compose version v2.29.7";
pub const COMPOSE_V1: &str = "docker-compose version 1.29.2, build 5becea4c";

pub const MANIFEST: &str = r#"services:
  postgres:
    image: postgres:17-alpine
    container_name: medicare_postgres
    volumes:
      - postgres_data:/var/lib/postgresql/data
  redis:
    image: redis:7-alpine
    container_name: medicare_redis
  backend:
    build: ./backend
    env_file: .env
    ports:
      - "8000:8000"
  frontend:
    build: ./frontend
    ports:
      - "3000:3000"
  nginx:
    image: nginx:alpine
    ports:
      - "80:80"
      - "443:443"
volumes:
  postgres_data: {}
"#;

struct Rule {
    prefix: String,
    responses: VecDeque<CmdOutput>,
}

/// Command runner answering by longest matching command-line prefix
///
/// Each prefix holds a queue of responses; the last one repeats. Commands
/// with no rule fail with exit code 127.
#[derive(Default)]
pub struct FakeRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Cmd>>,
    escalation: Mutex<Option<Escalation>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `output` for commands starting with `prefix`
    pub fn on(self, prefix: &str, output: CmdOutput) -> Self {
        {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|r| r.prefix == prefix) {
                Some(rule) => rule.responses.push_back(output),
                None => rules.push(Rule {
                    prefix: prefix.to_string(),
                    responses: VecDeque::from([output]),
                }),
            }
        }
        self
    }

    /// Drop any queued responses for `prefix` and answer with `output`
    pub fn replace(self, prefix: &str, output: CmdOutput) -> Self {
        self.rules.lock().unwrap().retain(|r| r.prefix != prefix);
        self.on(prefix, output)
    }

    pub fn ok(self, prefix: &str, stdout: &str) -> Self {
        self.on(prefix, CmdOutput::ok(stdout))
    }

    pub fn fail(self, prefix: &str, code: i32, stderr: &str) -> Self {
        self.on(prefix, CmdOutput::failed(code, stderr))
    }

    /// Command lines run so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(Cmd::display).collect()
    }

    pub fn commands(&self) -> Vec<Cmd> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }

    pub fn escalation(&self) -> Option<Escalation> {
        *self.escalation.lock().unwrap()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, cmd: &Cmd) -> Result<CmdOutput, DeployError> {
        let line = cmd.display();
        self.calls.lock().unwrap().push(cmd.clone());

        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .filter(|r| line.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len());
        let output = match rule {
            Some(rule) if rule.responses.len() > 1 => rule.responses.pop_front(),
            Some(rule) => rule.responses.front().cloned(),
            None => None,
        };
        Ok(output.unwrap_or_else(|| CmdOutput::failed(127, format!("{}: not found", cmd.program))))
    }

    fn set_escalation(&self, escalation: Escalation) {
        *self.escalation.lock().unwrap() = Some(escalation);
    }
}

/// A root host with a modern engine, the compose plugin and a stack that
/// starts and answers its probes
pub fn ready_host() -> FakeRunner {
    FakeRunner::new()
        .ok("id -u", "0\n")
        .ok("sh -c command -v sudo", "/usr/bin/sudo\n")
        .ok("docker --version", DOCKER_VERSION)
        .ok("systemctl is-active", "")
        .ok("docker compose version", COMPOSE_V2)
        .ok("docker pull", "")
        .ok("docker compose build", "")
        .ok("docker compose up", "")
        .ok("docker exec medicare_postgres pg_isready", "/var/run/postgresql:5432 - accepting connections")
}

/// HTTP fake: serves one release binary and a queue of health statuses
pub struct FakeHttp {
    pub binary: Vec<u8>,
    pub checksum: Option<String>,
    health: Mutex<VecDeque<Option<u16>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub fn healthy() -> Self {
        Self::with_health(&[Some(200)])
    }

    pub fn with_health(statuses: &[Option<u16>]) -> Self {
        let binary = b"#!/bin/sh\necho compose\n".to_vec();
        Self {
            checksum: Some(format!("{}  docker-compose-linux", sha256_hex(&binary))),
            binary,
            health: Mutex::new(statuses.iter().copied().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn download(&self, url: &str) -> Result<Vec<u8>, DeployError> {
        self.requests.lock().unwrap().push(url.to_string());
        if url.ends_with(".sha256") {
            return self
                .checksum
                .clone()
                .map(String::into_bytes)
                .ok_or_else(|| DeployError::CommandFailed("404 Not Found".to_string()));
        }
        Ok(self.binary.clone())
    }

    async fn get_status(&self, url: &str) -> Result<Option<u16>, DeployError> {
        self.requests.lock().unwrap().push(url.to_string());
        let mut health = self.health.lock().unwrap();
        let status = if health.len() > 1 {
            health.pop_front()
        } else {
            health.front().copied()
        };
        Ok(status.flatten())
    }
}

/// Prompter replaying canned answers; end of input selects defaults
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            prompts: Vec::new(),
        }
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, DeployError> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front())
    }
}

pub fn ample_resources() -> HostResources {
    HostResources {
        memory_total_mb: 8192,
        disk_available_mb: 100_000,
    }
}

/// Project directory holding an os-release file and the compose manifest
pub struct Project {
    pub dir: tempfile::TempDir,
}

impl Project {
    pub fn new(os_release: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("os-release"), os_release).unwrap();
        std::fs::write(dir.path().join("docker-compose.yml"), MANIFEST).unwrap();
        Self { dir }
    }

    pub fn without_manifest(os_release: &str) -> Self {
        let project = Self::new(os_release);
        std::fs::remove_file(project.dir.path().join("docker-compose.yml")).unwrap();
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn options(&self) -> InstallOptions {
        InstallOptions {
            project_dir: self.path().to_path_buf(),
            log_dir: self.file("logs"),
            log_level: None,
            os_release: self.file("os-release"),
            settings_file: self.file("deploy-settings.json"),
        }
    }
}

pub const UBUNTU_2404: &str = r#"PRETTY_NAME="Ubuntu 24.04.1 LTS"
NAME="Ubuntu"
VERSION_ID="24.04"
ID=ubuntu
ID_LIKE=debian
"#;

pub const FEDORA_40: &str = "NAME=\"Fedora Linux\"\nVERSION_ID=40\nID=fedora\n";

pub const TUMBLEWEED: &str = "NAME=\"openSUSE Tumbleweed\"\nID=\"opensuse-tumbleweed\"\nVERSION_ID=\"20241015\"\n";

/// Sleep stand-in that returns immediately and records the request
pub fn instant_sleep(log: &Mutex<Vec<Duration>>) -> impl Fn(Duration) -> std::future::Ready<()> + '_ {
    move |d| {
        log.lock().unwrap().push(d);
        std::future::ready(())
    }
}
