//! JSON-file registry of remote targets.
//!
//! The registry owns a directory holding `targets.json` (every configured
//! target plus the legacy-migration flag) and, on installs that predate
//! multiple targets, `config.json` with the single legacy record. Writes go
//! through a temporary file in the same directory and are renamed into place,
//! so a crash never leaves a truncated store behind.
//!
//! Mount bindings are process state and are not persisted.

use crate::targets::credentials::CredentialStore;
use crate::targets::error::{RegistryError, RegistryResult};
use crate::targets::legacy::LegacyTarget;
use crate::targets::target::RemoteTarget;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex as StdMutex, MutexGuard};
use tempfile::NamedTempFile;
use uuid::Uuid;

const TARGETS_FILE: &str = "targets.json";
const LEGACY_FILE: &str = "config.json";

/// On-disk layout of `targets.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetStore {
    #[serde(default)]
    targets: Vec<RemoteTarget>,
    #[serde(default)]
    legacy_migrated: bool,
}

/// Persisted set of remote targets with live mount bindings.
///
/// All mutating operations serialise on an internal lock, so one registry
/// may be shared between threads. Two registries pointed at the same
/// directory do not coordinate.
pub struct TargetRegistry {
    dir: PathBuf,
    write_lock: StdMutex<()>,
    mounts: StdMutex<HashMap<Uuid, String>>,
}

fn lock<T>(mutex: &StdMutex<T>) -> RegistryResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| RegistryError::Io("registry lock poisoned".into()))
}

impl TargetRegistry {
    /// Creates a registry rooted at `dir`.
    ///
    /// The directory is created lazily on the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: StdMutex::new(()),
            mounts: StdMutex::new(HashMap::new()),
        }
    }

    /// Registry in the per-user configuration directory (`<config>/rmount`).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NoConfigDir`] when the platform has no
    /// configuration directory for the current user.
    pub fn default_location() -> RegistryResult<Self> {
        let base = dirs::config_dir().ok_or(RegistryError::NoConfigDir)?;
        Ok(Self::new(base.join("rmount")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn targets_path(&self) -> PathBuf {
        self.dir.join(TARGETS_FILE)
    }

    pub fn legacy_path(&self) -> PathBuf {
        self.dir.join(LEGACY_FILE)
    }

    // ── Store I/O ────────────────────────────────────────────────────────────

    fn read_store(&self) -> RegistryResult<TargetStore> {
        let path = self.targets_path();
        if !path.exists() {
            return Ok(TargetStore::default());
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn write_store(&self, store: &TargetStore) -> RegistryResult<()> {
        fs::create_dir_all(&self.dir)?;
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, store)?;
            writer.flush()?;
        }
        tmp.persist(self.targets_path())
            .map_err(|e| RegistryError::Io(e.error.to_string()))?;
        debug!("Saved {} targets to {}", store.targets.len(), self.targets_path().display());
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Loads every stored target.
    ///
    /// # Returns
    ///
    /// An empty list when no store exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or is not valid JSON. A
    /// corrupt store is reported rather than silently treated as empty.
    pub fn load_all(&self) -> RegistryResult<Vec<RemoteTarget>> {
        Ok(self.read_store()?.targets)
    }

    /// Looks up a single target by id.
    pub fn get(&self, id: &Uuid) -> RegistryResult<Option<RemoteTarget>> {
        Ok(self.read_store()?.targets.into_iter().find(|t| t.id == *id))
    }

    // ── Mutations ────────────────────────────────────────────────────────────

    /// Adds a new target.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::InvalidTarget`] if host or username is empty or the
    ///   port is zero.
    /// * [`RegistryError::DuplicateId`] if a target with the same id exists.
    pub fn add(&self, target: RemoteTarget) -> RegistryResult<()> {
        target.validate()?;
        let _guard = lock(&self.write_lock)?;
        let mut store = self.read_store()?;
        if store.targets.iter().any(|t| t.id == target.id) {
            return Err(RegistryError::DuplicateId(target.id));
        }
        info!("Adding target {} ({}@{})", target.id, target.username, target.host);
        store.targets.push(target);
        self.write_store(&store)
    }

    /// Replaces the stored target that has the same id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no such target is stored, and
    /// [`RegistryError::InvalidTarget`] if the new record is invalid.
    pub fn update(&self, target: RemoteTarget) -> RegistryResult<()> {
        target.validate()?;
        let _guard = lock(&self.write_lock)?;
        let mut store = self.read_store()?;
        let slot = store
            .targets
            .iter_mut()
            .find(|t| t.id == target.id)
            .ok_or(RegistryError::NotFound(target.id))?;
        *slot = target;
        self.write_store(&store)
    }

    /// Removes a target record and drops its mount binding.
    ///
    /// Credential cleanup is not done here; see [`remove_target`].
    ///
    /// # Returns
    ///
    /// `true` if a record was removed.
    pub fn delete(&self, id: &Uuid) -> RegistryResult<bool> {
        let _guard = lock(&self.write_lock)?;
        let mut store = self.read_store()?;
        let before = store.targets.len();
        store.targets.retain(|t| t.id != *id);
        let removed = store.targets.len() != before;
        if removed {
            self.write_store(&store)?;
            info!("Deleted target {}", id);
        }
        lock(&self.mounts)?.remove(id);
        Ok(removed)
    }

    // ── Mount bindings ───────────────────────────────────────────────────────

    /// Binds a stored target to a live mount.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::NotFound`] if the target is not stored.
    /// * [`RegistryError::AlreadyMounted`] if the target is already bound.
    pub fn bind_mount(&self, id: &Uuid, mount_id: impl Into<String>) -> RegistryResult<()> {
        // held across lookup and insert so a concurrent delete cannot interleave
        let _guard = lock(&self.write_lock)?;
        if self.get(id)?.is_none() {
            return Err(RegistryError::NotFound(*id));
        }
        let mut mounts = lock(&self.mounts)?;
        if let Some(existing) = mounts.get(id) {
            return Err(RegistryError::AlreadyMounted {
                id: *id,
                mount: existing.clone(),
            });
        }
        let mount_id = mount_id.into();
        info!("Bound target {} to mount {}", id, mount_id);
        mounts.insert(*id, mount_id);
        Ok(())
    }

    /// Drops a binding, returning the mount it pointed at.
    pub fn unbind_mount(&self, id: &Uuid) -> RegistryResult<Option<String>> {
        Ok(lock(&self.mounts)?.remove(id))
    }

    pub fn mount_for(&self, id: &Uuid) -> RegistryResult<Option<String>> {
        Ok(lock(&self.mounts)?.get(id).cloned())
    }

    // ── Legacy migration ─────────────────────────────────────────────────────

    /// Converts the legacy single-target record into a registry entry.
    ///
    /// Runs at most once per registry directory: the `legacyMigrated` flag is
    /// persisted whether or not anything was migrated. Migration happens only
    /// when the registry is empty and a valid legacy record exists. The
    /// password stored under the bare username is copied to the new target's
    /// account key (the old entry is left in place) and `config.json` is
    /// removed.
    ///
    /// # Returns
    ///
    /// The id of the migrated target, or `None` when nothing was migrated.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the legacy record cannot be read or
    /// written, or if the credential store fails.
    pub fn migrate_legacy(&self, credentials: &dyn CredentialStore) -> RegistryResult<Option<Uuid>> {
        let _guard = lock(&self.write_lock)?;
        let mut store = self.read_store()?;
        if store.legacy_migrated {
            return Ok(None);
        }

        let legacy = self.read_legacy()?;
        let migrated = match legacy {
            Some(legacy) if store.targets.is_empty() && legacy.is_valid() => {
                let username = legacy.username.clone();
                let target = legacy.into_target();
                let id = target.id;
                match credentials.load_password(&username)? {
                    Some(password) => credentials.save_password(&target.account_key(), &password)?,
                    None => warn!("No stored password for legacy account {}", username),
                }
                info!("Migrated legacy target {}@{} as {}", target.username, target.host, id);
                store.targets.push(target);
                Some(id)
            }
            _ => None,
        };

        store.legacy_migrated = true;
        self.write_store(&store)?;
        if migrated.is_some() {
            fs::remove_file(self.legacy_path())?;
        }
        Ok(migrated)
    }

    fn read_legacy(&self) -> RegistryResult<Option<LegacyTarget>> {
        let path = self.legacy_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }
}

/// Fully removes a target: its mount binding, its record and its stored
/// password.
///
/// # Returns
///
/// The mount the target was bound to, so the caller can tear it down.
pub fn remove_target(
    registry: &TargetRegistry,
    credentials: &dyn CredentialStore,
    id: &Uuid,
) -> RegistryResult<Option<String>> {
    let target = registry.get(id)?.ok_or(RegistryError::NotFound(*id))?;
    let mount = registry.unbind_mount(id)?;
    registry.delete(id)?;
    credentials.delete_password(&target.account_key())?;
    Ok(mount)
}
