//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (reserved by shells, and clap usage errors)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// Resource not found (config, store, snippet).
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input or arguments.
    pub const INVALID_INPUT: i32 = 4;

    /// PIN verification failed, was cancelled, or is locked out.
    pub const AUTH_FAILED: i32 = 5;

    /// Per-operation call budget spent for the current window.
    pub const RATE_LIMITED: i32 = 6;

    /// Import batch rejected as a whole; nothing was changed.
    pub const IMPORT_REJECTED: i32 = 7;
}

/// Keychain service name.
pub const KEYCHAIN_SERVICE: &str = "snipvault";

/// Vault file name used by the file backend.
pub const VAULT_FILE: &str = "vault.json";

/// Environment fallbacks for non-interactive runs.
pub mod env {
    pub const CONFIG: &str = "SNIPVAULT_CONFIG";
    pub const LOG: &str = "SNIPVAULT_LOG";
    pub const PIN: &str = "SNIPVAULT_PIN";
    pub const NEW_PIN: &str = "SNIPVAULT_NEW_PIN";
    pub const EMERGENCY_CODE: &str = "SNIPVAULT_EMERGENCY_CODE";
}
