use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use snipvault_core::access::gate::{
    DEFAULT_LOCKOUT, DEFAULT_MAX_FAILED_ATTEMPTS, DEFAULT_SESSION_TTL,
};
use snipvault_core::rate_limit::{DEFAULT_MAX_CALLS, DEFAULT_WINDOW};
use snipvault_core::{GateConfig, RateLimitConfig};

#[derive(Debug, Serialize, Deserialize)]
pub struct SnipvaultConfig {
    pub store: StoreSection,
    #[serde(default)]
    pub security: SecuritySection,
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub ui: UiSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSection {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub vault: VaultBackend,
    /// Vault file for the `file` backend; defaults next to the config
    pub vault_path: Option<String>,
    pub session_minutes: u64,
    pub max_failed_attempts: u32,
    pub lockout_minutes: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_calls: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UiSection {
    pub editor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VaultBackend {
    Keychain,
    File,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            vault: VaultBackend::Keychain,
            vault_path: None,
            session_minutes: DEFAULT_SESSION_TTL.as_secs() / 60,
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_minutes: DEFAULT_LOCKOUT.as_secs() / 60,
        }
    }
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_calls: DEFAULT_MAX_CALLS,
            window_seconds: DEFAULT_WINDOW.as_secs(),
        }
    }
}

impl SnipvaultConfig {
    pub fn new(store_path: PathBuf, vault: VaultBackend, editor: Option<String>) -> Self {
        Self {
            store: StoreSection {
                path: store_path.to_string_lossy().to_string(),
            },
            security: SecuritySection {
                vault,
                ..SecuritySection::default()
            },
            limits: LimitsSection::default(),
            ui: UiSection { editor },
        }
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            session_ttl: Duration::from_secs(self.security.session_minutes * 60),
            max_failed_attempts: self.security.max_failed_attempts,
            lockout: Duration::from_secs(self.security.lockout_minutes * 60),
            ..GateConfig::default()
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            window: Duration::from_secs(self.limits.window_seconds),
            max_calls: self.limits.max_calls,
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_store_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("store"))
}

pub fn default_vault_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join(crate::constants::VAULT_FILE))
}

pub fn read_config(path: &Path) -> anyhow::Result<SnipvaultConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &SnipvaultConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("snipvault"));
        }
    }
    Ok(home_dir()?.join(".config").join("snipvault"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("snipvault"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("snipvault"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| anyhow::anyhow!("HOME is not set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = SnipvaultConfig::new(
            dir.path().join("store"),
            VaultBackend::File,
            Some("vim".to_string()),
        );
        write_config(&path, &config).unwrap();

        let loaded = read_config(&path).unwrap();
        assert_eq!(loaded.security.vault, VaultBackend::File);
        assert_eq!(loaded.security.session_minutes, 30);
        assert_eq!(loaded.limits.max_calls, 100);
        assert_eq!(loaded.ui.editor.as_deref(), Some("vim"));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: SnipvaultConfig = toml::from_str("[store]\npath = \"/tmp/s\"\n").unwrap();
        assert_eq!(config.security.vault, VaultBackend::Keychain);
        assert_eq!(config.gate_config().session_ttl, DEFAULT_SESSION_TTL);
        assert_eq!(config.gate_config().lockout, DEFAULT_LOCKOUT);
        assert_eq!(config.rate_limit_config().window, DEFAULT_WINDOW);
    }

    #[test]
    fn test_security_overrides_flow_into_gate_config() {
        let config: SnipvaultConfig = toml::from_str(
            "[store]\npath = \"/tmp/s\"\n\n[security]\nvault = \"file\"\nsession_minutes = 5\nmax_failed_attempts = 3\nlockout_minutes = 2\n",
        )
        .unwrap();
        let gate = config.gate_config();
        assert_eq!(gate.session_ttl, Duration::from_secs(300));
        assert_eq!(gate.max_failed_attempts, 3);
        assert_eq!(gate.lockout, Duration::from_secs(120));
    }
}
