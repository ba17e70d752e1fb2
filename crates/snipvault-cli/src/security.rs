//! Secret vault backends for the CLI.
//!
//! Both backends scope their keys to one store, so several stores can share
//! a keychain or a vault file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use snipvault_core::fs::write_atomic_private;
use snipvault_core::{Result, SecretVault, SnipError};

use crate::constants::KEYCHAIN_SERVICE;

/// Short stable identifier for a store directory.
pub fn store_hash(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let hash = blake3::hash(canonical.to_string_lossy().as_bytes());
    hash.to_hex()[..16].to_string()
}

fn scoped_key(store: &str, key: &str) -> String {
    format!("{}:{}", store, key)
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SnipError::Vault(format!("Vault task failed: {}", e)))?
}

/// OS keychain, one entry per key.
pub struct KeychainVault {
    store: String,
}

impl KeychainVault {
    pub fn new(store_dir: &Path) -> Self {
        Self {
            store: store_hash(store_dir),
        }
    }
}

#[async_trait]
impl SecretVault for KeychainVault {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let account = scoped_key(&self.store, key);
        blocking(move || keychain_get(&account)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let account = scoped_key(&self.store, key);
        let value = value.to_string();
        blocking(move || keychain_set(&account, &value)).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let account = scoped_key(&self.store, key);
        blocking(move || keychain_delete(&account)).await
    }
}

fn keychain_entry(account: &str) -> Result<keyring::Entry> {
    keyring::Entry::new(KEYCHAIN_SERVICE, account)
        .map_err(|e| SnipError::Vault(format!("Keychain unavailable: {}", e)))
}

fn keychain_get(account: &str) -> Result<Option<String>> {
    let entry = keychain_entry(account)?;
    match entry.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(SnipError::Vault(format!("Keychain read failed: {}", err))),
    }
}

fn keychain_set(account: &str, value: &str) -> Result<()> {
    let entry = keychain_entry(account)?;
    entry
        .set_password(value)
        .map_err(|e| SnipError::Vault(format!("Keychain write failed: {}", e)))
}

fn keychain_delete(account: &str) -> Result<()> {
    let entry = keychain_entry(account)?;
    match entry.delete_password() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(err) => Err(SnipError::Vault(format!("Keychain delete failed: {}", err))),
    }
}

/// JSON map in an owner-only file.
///
/// Holds the same values the keychain would: Argon2 hashes, the enabled
/// flag and the session record. Every write replaces the file atomically.
pub struct FileVault {
    path: PathBuf,
    store: String,
    lock: Mutex<()>,
}

impl FileVault {
    pub fn new(path: impl Into<PathBuf>, store_dir: &Path) -> Self {
        Self {
            path: path.into(),
            store: store_hash(store_dir),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) + Send + 'static,
    {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        blocking(move || {
            let mut values = read_vault_file(&path)?;
            f(&mut values);
            write_vault_file(&path, &values)
        })
        .await
    }
}

#[async_trait]
impl SecretVault for FileVault {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        let key = scoped_key(&self.store, key);
        blocking(move || Ok(read_vault_file(&path)?.remove(&key))).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = scoped_key(&self.store, key);
        let value = value.to_string();
        self.modify(move |values| {
            values.insert(key, value);
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = scoped_key(&self.store, key);
        self.modify(move |values| {
            values.remove(&key);
        })
        .await
    }
}

fn read_vault_file(path: &Path) -> Result<BTreeMap<String, String>> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            SnipError::Vault(format!("Vault file {} is corrupt: {}", path.display(), e))
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(err) => Err(SnipError::Vault(format!(
            "Failed to read vault file {}: {}",
            path.display(),
            err
        ))),
    }
}

fn write_vault_file(path: &Path, values: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(values)
        .map_err(|e| SnipError::Vault(format!("Failed to encode vault: {}", e)))?;
    write_atomic_private(path, &bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_hash_is_stable_and_short() {
        let dir = tempfile::tempdir().unwrap();
        let a = store_hash(dir.path());
        let b = store_hash(dir.path());
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, store_hash(&dir.path().join("other")));
    }

    #[tokio::test]
    async fn test_file_vault_set_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let vault = FileVault::new(dir.path().join("vault.json"), dir.path());

        assert_eq!(vault.get("pin_hash").await.unwrap(), None);
        vault.set("pin_hash", "$argon2id$abc").await.unwrap();
        assert_eq!(
            vault.get("pin_hash").await.unwrap().as_deref(),
            Some("$argon2id$abc")
        );

        vault.delete("pin_hash").await.unwrap();
        vault.delete("pin_hash").await.unwrap();
        assert_eq!(vault.get("pin_hash").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_vault_scopes_keys_per_store() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("vault.json");
        let first = FileVault::new(&file, &dir.path().join("one"));
        let second = FileVault::new(&file, &dir.path().join("two"));

        first.set("pin_enabled", "true").await.unwrap();
        assert_eq!(second.get("pin_enabled").await.unwrap(), None);
        assert_eq!(
            first.get("pin_enabled").await.unwrap().as_deref(),
            Some("true")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_vault_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let vault = FileVault::new(dir.path().join("vault.json"), dir.path());
        vault.set("session", "{}").await.unwrap();

        let mode = std::fs::metadata(vault.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_corrupt_vault_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        std::fs::write(&path, b"not json").unwrap();
        let vault = FileVault::new(&path, dir.path());
        assert!(matches!(
            vault.get("pin_hash").await.unwrap_err(),
            SnipError::Vault(_)
        ));
    }
}
