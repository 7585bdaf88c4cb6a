// ── Credential storage seam ──────────────────────────────────────────────────
//
// Passwords never live in the registry file. The platform keychain (or any
// other secret store) implements `CredentialStore`; the in-memory store backs
// tests and headless use.

use crate::targets::error::{RegistryError, RegistryResult};
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use uuid::Uuid;

/// Account key of a target's password: `"<UUID uppercase>-<username>"`.
pub fn account_key(id: &Uuid, username: &str) -> String {
    format!("{}-{}", id.as_hyphenated().to_string().to_uppercase(), username)
}

pub trait CredentialStore: Send + Sync {
    fn load_password(&self, account: &str) -> RegistryResult<Option<String>>;
    fn save_password(&self, account: &str, password: &str) -> RegistryResult<()>;
    /// Deleting an absent account succeeds.
    fn delete_password(&self, account: &str) -> RegistryResult<()>;
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: StdMutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> RegistryResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| RegistryError::Credential("credential store poisoned".into()))
    }

    pub fn accounts(&self) -> Vec<String> {
        let mut accounts: Vec<String> = self
            .entries()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        accounts.sort();
        accounts
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load_password(&self, account: &str) -> RegistryResult<Option<String>> {
        Ok(self.entries()?.get(account).cloned())
    }

    fn save_password(&self, account: &str, password: &str) -> RegistryResult<()> {
        self.entries()?
            .insert(account.to_string(), password.to_string());
        Ok(())
    }

    fn delete_password(&self, account: &str) -> RegistryResult<()> {
        self.entries()?.remove(account);
        Ok(())
    }
}
