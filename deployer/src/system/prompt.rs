//! Operator prompts
//!
//! All terminal interaction goes through [`Prompter`]: free-text answers with
//! a bracketed default, yes/no confirmations and numbered menus. Empty input
//! always selects the default.

use std::io::Write;

use async_trait::async_trait;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::errors::DeployError;

#[async_trait]
pub trait Prompter: Send {
    /// Show `prompt` and read one line; `None` at end of input
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, DeployError>;

    /// Print an informational line between prompts
    fn say(&mut self, _line: &str) {}

    /// Free-text answer; empty input yields `default`
    async fn ask(&mut self, question: &str, default: &str) -> Result<String, DeployError> {
        let prompt = if default.is_empty() {
            format!("{}: ", question)
        } else {
            format!("{} [{}]: ", question, default)
        };
        let answer = self.read_line(&prompt).await?.unwrap_or_default();
        let answer = answer.trim();
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer.to_string())
        }
    }

    /// Yes/no answer; anything not starting with y/n re-asks
    async fn confirm(&mut self, question: &str, default: bool) -> Result<bool, DeployError> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            let answer = self
                .read_line(&format!("{} [{}]: ", question, hint))
                .await?;
            let Some(answer) = answer else {
                return Ok(default);
            };
            match answer.trim().to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Please answer y or n."),
            }
        }
    }

    /// Numbered menu; returns the zero-based index of the chosen option
    async fn choose(
        &mut self,
        question: &str,
        options: &[&str],
        default: usize,
    ) -> Result<usize, DeployError> {
        self.say(question);
        for (idx, option) in options.iter().enumerate() {
            self.say(&format!("  {}) {}", idx + 1, option));
        }
        loop {
            let answer = self
                .read_line(&format!("Select [{}]: ", default + 1))
                .await?;
            let Some(answer) = answer else {
                return Ok(default);
            };
            let answer = answer.trim();
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
                _ => self.say(&format!("Enter a number between 1 and {}.", options.len())),
            }
        }
    }
}

/// Prompts on the controlling terminal
pub struct TerminalPrompter {
    lines: Lines<BufReader<Stdin>>,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, DeployError> {
        print!("{}", prompt.cyan());
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }

    fn say(&mut self, line: &str) {
        println!("{}", line);
    }
}
