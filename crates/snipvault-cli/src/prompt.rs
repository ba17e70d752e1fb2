//! Terminal front end for the access gate.
//!
//! Secrets come from the environment first (each variable is consumed once
//! per process), then from a hidden tty prompt. Without a tty every prompt
//! answers as cancelled, which the gate treats as a denial.

use std::collections::HashSet;
use std::io::{self, IsTerminal};
use std::sync::Mutex;

use async_trait::async_trait;
use dialoguer::{Password, Select};
use owo_colors::OwoColorize;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use snipvault_core::access::{Interaction, NoticeLevel, SecretKind, SecretPrompt};
use snipvault_core::{Result, SnipError};

use crate::constants::env;

pub struct TerminalInteraction {
    interactive: bool,
    color: bool,
    quiet: bool,
    env_used: Mutex<HashSet<SecretKind>>,
}

impl TerminalInteraction {
    pub fn new(no_input: bool, quiet: bool) -> Self {
        Self {
            interactive: !no_input && io::stdin().is_terminal() && io::stderr().is_terminal(),
            color: io::stderr().is_terminal(),
            quiet,
            env_used: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Value for `kind` from the environment, once.
    fn env_secret(&self, kind: SecretKind) -> Option<(&'static str, String)> {
        let var = env_var_for(kind);
        let mut used = self.env_used.lock().ok()?;
        if !used.insert(kind) {
            return None;
        }
        std::env::var(var)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| (var, value))
    }

    fn label(&self, level: NoticeLevel) -> String {
        let text = match level {
            NoticeLevel::Info => "note:",
            NoticeLevel::Warning => "warning:",
            NoticeLevel::Error => "error:",
        };
        if !self.color {
            return text.to_string();
        }
        match level {
            NoticeLevel::Info => text.cyan().to_string(),
            NoticeLevel::Warning => text.yellow().bold().to_string(),
            NoticeLevel::Error => text.red().bold().to_string(),
        }
    }
}

fn env_var_for(kind: SecretKind) -> &'static str {
    match kind {
        SecretKind::Pin => env::PIN,
        SecretKind::NewPin | SecretKind::ConfirmPin => env::NEW_PIN,
        SecretKind::EmergencyCode => env::EMERGENCY_CODE,
    }
}

fn prompt_failed(err: dialoguer::Error) -> SnipError {
    SnipError::Prompt(err.to_string())
}

#[async_trait]
impl Interaction for TerminalInteraction {
    async fn prompt_secret(&self, prompt: &SecretPrompt) -> Result<Option<SecretString>> {
        if let Some((var, value)) = self.env_secret(prompt.kind) {
            debug!(variable = var, "secret taken from environment");
            prompt
                .check(&value)
                .map_err(|reason| SnipError::Prompt(format!("{}: {}", var, reason)))?;
            return Ok(Some(SecretString::from(value)));
        }
        if !self.interactive {
            return Ok(None);
        }

        let message = prompt.message.clone();
        let validator = prompt.validator;
        let value = tokio::task::spawn_blocking(move || loop {
            let value = Password::new().with_prompt(message.as_str()).interact()?;
            match validator.map(|check| check(&value)) {
                Some(Err(reason)) => eprintln!("{}", reason),
                _ => return Ok::<_, dialoguer::Error>(value),
            }
        })
        .await
        .map_err(|e| SnipError::Prompt(format!("Prompt task failed: {}", e)))?
        .map_err(prompt_failed)?;
        Ok(Some(SecretString::from(value)))
    }

    async fn choose(&self, message: &str, options: &[&str]) -> Result<Option<usize>> {
        if !self.interactive {
            debug!(message, "choice dismissed without a terminal");
            return Ok(None);
        }
        let message = message.to_string();
        let items: Vec<String> = options.iter().map(|o| o.to_string()).collect();
        tokio::task::spawn_blocking(move || {
            Select::new()
                .with_prompt(message)
                .items(&items)
                .default(0)
                .interact_opt()
        })
        .await
        .map_err(|e| SnipError::Prompt(format!("Prompt task failed: {}", e)))?
        .map_err(prompt_failed)
    }

    async fn notify(&self, level: NoticeLevel, message: &str) -> Result<()> {
        if self.quiet && level == NoticeLevel::Info {
            return Ok(());
        }
        eprintln!("{} {}", self.label(level), message);
        Ok(())
    }

    async fn show_emergency_code(&self, code: &SecretString) -> Result<()> {
        let code = code.expose_secret();
        let shown = if self.color {
            code.bold().to_string()
        } else {
            code.to_string()
        };
        eprintln!("Emergency code: {}", shown);
        eprintln!("Store it somewhere safe. It is shown only once and is needed to recover a forgotten PIN.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_mapping() {
        assert_eq!(env_var_for(SecretKind::Pin), "SNIPVAULT_PIN");
        assert_eq!(env_var_for(SecretKind::NewPin), "SNIPVAULT_NEW_PIN");
        assert_eq!(env_var_for(SecretKind::ConfirmPin), "SNIPVAULT_NEW_PIN");
        assert_eq!(
            env_var_for(SecretKind::EmergencyCode),
            "SNIPVAULT_EMERGENCY_CODE"
        );
    }

    #[tokio::test]
    async fn test_non_interactive_prompts_cancel() {
        let ui = TerminalInteraction::new(true, true);
        assert!(!ui.is_interactive());
        assert_eq!(ui.choose("pick", &["a", "b"]).await.unwrap(), None);
    }
}
