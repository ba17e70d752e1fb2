//! Secret vault seam.
//!
//! The gate keeps everything it needs to survive a restart in a small
//! key/value vault: the PIN hash, the emergency-code hash, the enabled flag
//! and the serialized session. Values are opaque strings; the gate never
//! stores a plaintext PIN or code.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, SnipError};

/// Vault keys used by the access gate.
pub mod keys {
    pub const PIN_HASH: &str = "pin_hash";
    pub const EMERGENCY_CODE_HASH: &str = "emergency_code_hash";
    pub const PIN_ENABLED: &str = "pin_enabled";
    pub const SESSION: &str = "session";

    /// Every key the gate may write.
    pub const ALL: &[&str] = &[PIN_HASH, EMERGENCY_CODE_HASH, PIN_ENABLED, SESSION];
}

/// Key/value secret storage.
#[async_trait]
pub trait SecretVault: Send + Sync {
    /// Returns `Ok(None)` if the key has never been set.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Process-local vault. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryVault {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| SnipError::Vault("Memory vault poisoned".to_string()))
    }
}

#[async_trait]
impl SecretVault for MemoryVault {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
