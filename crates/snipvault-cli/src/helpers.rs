use std::io::{self, IsTerminal, Read};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use dialoguer::Input;
use secrecy::{ExposeSecret, SecretString};

use snipvault_core::access::{validate_pin_format, Interaction, SecretKind, SecretPrompt};

use crate::errors::CliError;
use crate::prompt::TerminalInteraction;

/// Resolve a snippet body from `--body`, piped stdin, or `$EDITOR`.
pub fn read_snippet_body(
    no_input: bool,
    body: Option<String>,
    editor_override: Option<&str>,
) -> anyhow::Result<String> {
    if let Some(value) = body {
        if value.trim().is_empty() {
            return Err(CliError::invalid_input("--body cannot be empty").into());
        }
        return Ok(value);
    }

    if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| anyhow::anyhow!("Failed to read stdin: {}", e))?;
        let trimmed = buffer.trim_end().to_string();
        if trimmed.is_empty() {
            return Err(CliError::invalid_input("No snippet body provided on stdin").into());
        }
        return Ok(trimmed);
    }

    if no_input {
        return Err(CliError::invalid_input("--no-input requires --body or content on stdin").into());
    }

    read_body_from_editor(editor_override, "")
}

/// Open $EDITOR on `initial` and return what was saved.
pub fn read_body_from_editor(editor_override: Option<&str>, initial: &str) -> anyhow::Result<String> {
    let editor = editor_override
        .map(|value| value.to_string())
        .or_else(|| std::env::var("EDITOR").ok())
        .ok_or_else(|| {
            CliError::invalid_input("$EDITOR is not set; use --body or pipe content via stdin")
        })?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("System time error: {}", e))?
        .as_nanos();
    let filename = format!("snipvault_body_{}_{}.txt", std::process::id(), nanos);
    let path = std::env::temp_dir().join(filename);

    std::fs::write(&path, initial)
        .map_err(|e| anyhow::anyhow!("Failed to create temp file: {}", e))?;

    let status = Command::new(editor)
        .arg(&path)
        .status()
        .map_err(|e| anyhow::anyhow!("Failed to launch editor: {}", e))?;
    if !status.success() {
        let _ = std::fs::remove_file(&path);
        return Err(anyhow::anyhow!("Editor exited with failure"));
    }

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read temp file: {}", e))?;
    let _ = std::fs::remove_file(&path);

    let trimmed = contents.trim_end().to_string();
    if trimmed.is_empty() {
        return Err(CliError::invalid_input("Snippet body is empty").into());
    }
    Ok(trimmed)
}

/// Use `value`, or ask for it with the same rule the store applies.
pub fn field_or_prompt(
    value: Option<String>,
    label: &str,
    interactive: bool,
    validate: fn(&str) -> snipvault_core::Result<()>,
) -> anyhow::Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }
    if !interactive {
        return Err(CliError::invalid_input(format!(
            "--{} is required without a terminal",
            label.to_lowercase()
        ))
        .into());
    }
    let value: String = Input::new()
        .with_prompt(label)
        .validate_with(|input: &String| -> Result<(), String> {
            validate(input).map_err(|e| e.to_string())
        })
        .interact_text()?;
    Ok(value)
}

/// Accept repeated flags and comma-separated lists alike.
pub fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ask for a secret; a missing answer is an authentication failure.
pub async fn require_secret(
    ui: &TerminalInteraction,
    prompt: SecretPrompt,
) -> anyhow::Result<SecretString> {
    let hint = match prompt.kind {
        SecretKind::Pin => "Hint: Set SNIPVAULT_PIN when running without a terminal.",
        SecretKind::NewPin | SecretKind::ConfirmPin => {
            "Hint: Set SNIPVAULT_NEW_PIN when running without a terminal."
        }
        SecretKind::EmergencyCode => {
            "Hint: Set SNIPVAULT_EMERGENCY_CODE when running without a terminal."
        }
    };
    ui.prompt_secret(&prompt)
        .await?
        .ok_or_else(|| CliError::auth_failed_with_hint("No input given", hint).into())
}

/// Ask for a new PIN twice.
pub async fn prompt_new_pin(ui: &TerminalInteraction) -> anyhow::Result<SecretString> {
    let first = require_secret(
        ui,
        SecretPrompt::new(SecretKind::NewPin, "Choose a PIN (4-8 digits)")
            .validate_with(validate_pin_format),
    )
    .await?;
    let confirm = require_secret(
        ui,
        SecretPrompt::new(SecretKind::ConfirmPin, "Confirm PIN").validate_with(validate_pin_format),
    )
    .await?;
    if first.expose_secret() != confirm.expose_secret() {
        return Err(CliError::invalid_input("PINs do not match").into());
    }
    Ok(first)
}

/// Ask for the current PIN.
pub async fn prompt_current_pin(ui: &TerminalInteraction) -> anyhow::Result<SecretString> {
    require_secret(
        ui,
        SecretPrompt::new(SecretKind::Pin, "Current PIN").validate_with(validate_pin_format),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_accepts_commas_and_repeats() {
        let values = vec!["react, hooks".to_string(), "ts".to_string(), " ,".to_string()];
        assert_eq!(split_list(&values), vec!["react", "hooks", "ts"]);
    }

    #[test]
    fn test_body_flag_wins() {
        let body = read_snippet_body(true, Some("fn main() {}".to_string()), None).unwrap();
        assert_eq!(body, "fn main() {}");
    }

    #[test]
    fn test_blank_body_flag_rejected() {
        assert!(read_snippet_body(true, Some("   ".to_string()), None).is_err());
    }

    #[test]
    fn test_field_without_terminal_requires_flag() {
        let err = field_or_prompt(None, "Name", false, snipvault_core::sanitize::validate_name)
            .unwrap_err();
        assert!(err.to_string().contains("--name"));
        let value = field_or_prompt(
            Some("Log".to_string()),
            "Name",
            false,
            snipvault_core::sanitize::validate_name,
        )
        .unwrap();
        assert_eq!(value, "Log");
    }
}
