//! User interaction seam for the access gate.
//!
//! The gate asks for secrets, offers small choice dialogs and shows
//! notices; how those reach a person is up to the implementation. A
//! terminal front end prompts on the tty, tests script the answers.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{Result, SnipError};

/// Inline check run against typed input before it is accepted.
pub type InputValidator = fn(&str) -> std::result::Result<(), String>;

/// Which secret a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    /// The current PIN
    Pin,

    /// A PIN being chosen
    NewPin,

    /// Repeat of a PIN being chosen
    ConfirmPin,

    EmergencyCode,
}

/// A request for one secret value.
#[derive(Debug, Clone)]
pub struct SecretPrompt {
    pub kind: SecretKind,
    pub message: String,
    pub validator: Option<InputValidator>,
}

impl SecretPrompt {
    pub fn new(kind: SecretKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            validator: None,
        }
    }

    pub fn validate_with(mut self, validator: InputValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Run the validator, if any.
    pub fn check(&self, input: &str) -> std::result::Result<(), String> {
        match self.validator {
            Some(validator) => validator(input),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Surface the gate talks to a person through.
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Ask for a secret. `Ok(None)` means the person cancelled.
    async fn prompt_secret(&self, prompt: &SecretPrompt) -> Result<Option<SecretString>>;

    /// Offer `options`; returns the chosen index, or `None` if dismissed.
    async fn choose(&self, message: &str, options: &[&str]) -> Result<Option<usize>>;

    async fn notify(&self, level: NoticeLevel, message: &str) -> Result<()>;

    /// Show a newly issued emergency code. Called once per issued code.
    async fn show_emergency_code(&self, code: &SecretString) -> Result<()>;
}

/// Replays queued answers in order.
///
/// Used where nobody is at a terminal: scripted runs and tests. An
/// exhausted queue answers as if the person cancelled. Validators still run,
/// and a queued secret that fails its validator is reported as a prompt
/// error.
#[derive(Default)]
pub struct ScriptedInteraction {
    secrets: Mutex<VecDeque<Option<String>>>,
    choices: Mutex<VecDeque<Option<usize>>>,
    log: Mutex<InteractionLog>,
}

/// What a [`ScriptedInteraction`] was asked and shown.
#[derive(Debug, Clone, Default)]
pub struct InteractionLog {
    pub secret_prompts: Vec<String>,
    pub choice_prompts: Vec<String>,
    pub notices: Vec<(NoticeLevel, String)>,
    pub emergency_codes: Vec<String>,
}

impl ScriptedInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an answer for the next secret prompt.
    pub fn push_secret(&self, value: impl Into<String>) -> &Self {
        if let Ok(mut queue) = self.secrets.lock() {
            queue.push_back(Some(value.into()));
        }
        self
    }

    /// Queue a cancellation for the next secret prompt.
    pub fn push_cancel(&self) -> &Self {
        if let Ok(mut queue) = self.secrets.lock() {
            queue.push_back(None);
        }
        self
    }

    /// Queue an answer for the next choice dialog.
    pub fn push_choice(&self, index: Option<usize>) -> &Self {
        if let Ok(mut queue) = self.choices.lock() {
            queue.push_back(index);
        }
        self
    }

    pub fn log(&self) -> InteractionLog {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Most recent emergency code shown.
    pub fn last_emergency_code(&self) -> Option<String> {
        self.log
            .lock()
            .ok()
            .and_then(|log| log.emergency_codes.last().cloned())
    }

    fn record(&self, f: impl FnOnce(&mut InteractionLog)) -> Result<()> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| SnipError::Prompt("Interaction log poisoned".to_string()))?;
        f(&mut log);
        Ok(())
    }
}

#[async_trait]
impl Interaction for ScriptedInteraction {
    async fn prompt_secret(&self, prompt: &SecretPrompt) -> Result<Option<SecretString>> {
        self.record(|log| log.secret_prompts.push(prompt.message.clone()))?;
        let next = self
            .secrets
            .lock()
            .map_err(|_| SnipError::Prompt("Secret queue poisoned".to_string()))?
            .pop_front()
            .flatten();
        match next {
            Some(value) => {
                prompt.check(&value).map_err(SnipError::Prompt)?;
                Ok(Some(SecretString::from(value)))
            }
            None => Ok(None),
        }
    }

    async fn choose(&self, message: &str, options: &[&str]) -> Result<Option<usize>> {
        self.record(|log| log.choice_prompts.push(message.to_string()))?;
        let next = self
            .choices
            .lock()
            .map_err(|_| SnipError::Prompt("Choice queue poisoned".to_string()))?
            .pop_front()
            .flatten();
        Ok(next.filter(|index| *index < options.len()))
    }

    async fn notify(&self, level: NoticeLevel, message: &str) -> Result<()> {
        self.record(|log| log.notices.push((level, message.to_string())))
    }

    async fn show_emergency_code(&self, code: &SecretString) -> Result<()> {
        let code = code.expose_secret().to_string();
        self.record(|log| log.emergency_codes.push(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::pin::validate_pin_format;

    #[tokio::test]
    async fn test_scripted_answers_in_order() {
        let ui = ScriptedInteraction::new();
        ui.push_secret("1234").push_cancel();
        ui.push_choice(Some(1)).push_choice(Some(9));

        let prompt = SecretPrompt::new(SecretKind::Pin, "PIN").validate_with(validate_pin_format);
        let first = ui.prompt_secret(&prompt).await.unwrap().unwrap();
        assert_eq!(first.expose_secret(), "1234");
        assert!(ui.prompt_secret(&prompt).await.unwrap().is_none());
        assert!(ui.prompt_secret(&prompt).await.unwrap().is_none());

        assert_eq!(ui.choose("pick", &["a", "b"]).await.unwrap(), Some(1));
        assert_eq!(ui.choose("pick", &["a", "b"]).await.unwrap(), None);
        assert_eq!(ui.log().secret_prompts.len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_secret_runs_validator() {
        let ui = ScriptedInteraction::new();
        ui.push_secret("12");
        let prompt = SecretPrompt::new(SecretKind::Pin, "PIN").validate_with(validate_pin_format);
        assert!(matches!(
            ui.prompt_secret(&prompt).await.unwrap_err(),
            SnipError::Prompt(_)
        ));
    }
}
