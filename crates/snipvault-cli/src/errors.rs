//! CLI error types for structured error handling.
//!
//! Typed errors map to specific exit codes. Core errors travel through
//! `anyhow` and are classified when the process exits.

use std::fmt;

use snipvault_core::SnipError;

use crate::constants::exit_codes;

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// Resource not found (config, store, snippet)
    NotFound { message: String, hint: String },

    /// PIN verification failed or was cancelled
    AuthFailed {
        message: String,
        hint: Option<String>,
    },

    /// Invalid user input
    InvalidInput(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, hint } => {
                write!(f, "{}\n{}", message, hint)
            }
            CliError::AuthFailed { message, hint } => {
                if let Some(h) = hint {
                    write!(f, "{}\n{}", message, h)
                } else {
                    write!(f, "{}", message)
                }
            }
            CliError::InvalidInput(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Create a NotFound error with message and hint.
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create an AuthFailed error with message and hint.
    pub fn auth_failed_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput(message.into())
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::AuthFailed { .. } => exit_codes::AUTH_FAILED,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
        }
    }
}

/// Exit code for a core error.
pub fn snip_exit_code(err: &SnipError) -> i32 {
    match err {
        SnipError::NotFound(_) => exit_codes::NOT_FOUND,
        SnipError::Validation { .. } | SnipError::Config(_) => exit_codes::INVALID_INPUT,
        SnipError::AccessDenied(_) | SnipError::LockedOut { .. } => exit_codes::AUTH_FAILED,
        SnipError::RateLimitExceeded { .. } => exit_codes::RATE_LIMITED,
        SnipError::ImportRejected(_) => exit_codes::IMPORT_REJECTED,
        SnipError::Storage(_) | SnipError::Vault(_) | SnipError::Prompt(_) => 1,
    }
}

/// Hint printed under a core error, if one helps.
fn snip_hint(err: &SnipError) -> Option<&'static str> {
    match err {
        SnipError::NotFound(_) => Some("Hint: Run `snipvault list` to find snippet IDs."),
        SnipError::AccessDenied(_) => {
            Some("Hint: Set SNIPVAULT_PIN for non-interactive use, or run `snipvault pin recover`.")
        }
        SnipError::LockedOut { .. } => {
            Some("Hint: Run `snipvault pin recover` with your emergency code.")
        }
        _ => None,
    }
}

/// Print `err` to stderr and exit with the matching code.
pub fn exit_with(err: &anyhow::Error) -> ! {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        eprintln!("Error: {}", cli);
        std::process::exit(cli.exit_code());
    }
    if let Some(snip) = err.downcast_ref::<SnipError>() {
        eprintln!("Error: {}", snip);
        if let Some(hint) = snip_hint(snip) {
            eprintln!("{}", hint);
        }
        std::process::exit(snip_exit_code(snip));
    }
    eprintln!("Error: {:#}", err);
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snipvault_core::{Field, ImportRejection};
    use std::time::Duration;

    #[test]
    fn test_cli_error_exit_codes() {
        assert_eq!(
            CliError::not_found("x", "hint").exit_code(),
            exit_codes::NOT_FOUND
        );
        assert_eq!(
            CliError::auth_failed_with_hint("x", "y").exit_code(),
            exit_codes::AUTH_FAILED
        );
        assert_eq!(
            CliError::invalid_input("x").exit_code(),
            exit_codes::INVALID_INPUT
        );
    }

    #[test]
    fn test_core_error_exit_codes() {
        assert_eq!(
            snip_exit_code(&SnipError::validation(Field::Name, "empty")),
            exit_codes::INVALID_INPUT
        );
        assert_eq!(
            snip_exit_code(&SnipError::LockedOut {
                remaining_minutes: 3
            }),
            exit_codes::AUTH_FAILED
        );
        assert_eq!(
            snip_exit_code(&SnipError::RateLimitExceeded {
                operation: "create".to_string(),
                retry_after: Duration::from_secs(5),
            }),
            exit_codes::RATE_LIMITED
        );
        assert_eq!(
            snip_exit_code(&SnipError::ImportRejected(ImportRejection::NotAnArray)),
            exit_codes::IMPORT_REJECTED
        );
    }

    #[test]
    fn test_display_includes_hint() {
        let err = CliError::not_found("No snippet store configured", "Run `snipvault init`.");
        assert_eq!(
            err.to_string(),
            "No snippet store configured\nRun `snipvault init`."
        );
    }
}
