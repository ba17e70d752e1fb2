//! Resolves config and store paths and wires up the snippet manager.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use snipvault_core::{
    AccessGate, SecretVault, SnapshotStore, SnippetManager, SnippetRepository, SystemClock,
};

use crate::cli::Cli;
use crate::config::{
    default_config_path, default_vault_path, read_config, SnipvaultConfig, VaultBackend,
};
use crate::constants::env;
use crate::errors::CliError;
use crate::prompt::TerminalInteraction;
use crate::security::{FileVault, KeychainVault};

pub type Manager = SnippetManager<SnapshotStore>;

/// Per-invocation state shared by the command handlers.
pub struct AppContext<'a> {
    pub cli: &'a Cli,
    ui: Arc<TerminalInteraction>,
    config: OnceCell<Option<SnipvaultConfig>>,
}

/// Resolve the config file path, checking SNIPVAULT_CONFIG first.
pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var(env::CONFIG) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// Error message when no store is configured.
pub fn missing_config_message(config_path: &Path) -> String {
    format!("No snippet store configured (looked for {})", config_path.display())
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            ui: Arc::new(TerminalInteraction::new(cli.no_input, cli.quiet)),
            config: OnceCell::new(),
        }
    }

    pub fn ui(&self) -> &Arc<TerminalInteraction> {
        &self.ui
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// The config file, if one exists.
    pub fn config(&self) -> anyhow::Result<Option<&SnipvaultConfig>> {
        let config = self.config.get_or_try_init(|| -> anyhow::Result<_> {
            let path = resolve_config_path()?;
            if !path.exists() {
                return Ok(None);
            }
            read_config(&path).map(Some)
        })?;
        Ok(config.as_ref())
    }

    /// Store directory from `--store`/SNIPVAULT_STORE, else the config.
    pub fn store_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = self.cli.store.as_deref() {
            return Ok(PathBuf::from(path));
        }
        match self.config()? {
            Some(config) => Ok(PathBuf::from(&config.store.path)),
            None => Err(CliError::not_found(
                missing_config_message(&resolve_config_path()?),
                "Run `snipvault init` or pass --store.",
            )
            .into()),
        }
    }

    pub fn editor(&self) -> anyhow::Result<Option<String>> {
        Ok(self.config()?.and_then(|c| c.ui.editor.clone()))
    }

    fn vault(&self, store_dir: &Path) -> anyhow::Result<Arc<dyn SecretVault>> {
        let (backend, path) = match self.config()? {
            Some(config) => (
                config.security.vault,
                config.security.vault_path.clone().map(PathBuf::from),
            ),
            None => (VaultBackend::Keychain, None),
        };
        let vault: Arc<dyn SecretVault> = match backend {
            VaultBackend::Keychain => Arc::new(KeychainVault::new(store_dir)),
            VaultBackend::File => {
                let path = match path {
                    Some(path) => path,
                    None => default_vault_path()?,
                };
                let vault = FileVault::new(path, store_dir);
                tracing::debug!(path = %vault.path().display(), "using file vault");
                Arc::new(vault)
            }
        };
        Ok(vault)
    }

    /// Build and initialize the manager for the resolved store.
    pub async fn open_manager(&self) -> anyhow::Result<Manager> {
        let store_dir = self.store_dir()?;
        if !store_dir.exists() {
            return Err(CliError::not_found(
                format!("No snippet store at {}", store_dir.display()),
                "Run `snipvault init` to create it.",
            )
            .into());
        }

        let (gate_config, limits) = match self.config()? {
            Some(config) => (config.gate_config(), config.rate_limit_config()),
            None => Default::default(),
        };
        let clock = Arc::new(SystemClock);
        let store = SnapshotStore::new(&store_dir)
            .with_rate_limit(limits)
            .with_clock(clock.clone());
        let gate = AccessGate::new(gate_config, self.vault(&store_dir)?, self.ui.clone(), clock)?;

        let manager = SnippetManager::new(store, gate);
        manager.initialize().await?;
        tracing::debug!(
            store = %store_dir.display(),
            source = ?manager.store().load_source(),
            "store opened"
        );
        Ok(manager)
    }

    /// Create the store directory and an empty snapshot location.
    pub async fn create_store(&self, store_dir: &Path) -> anyhow::Result<()> {
        SnapshotStore::new(store_dir).initialize().await?;
        Ok(())
    }
}
