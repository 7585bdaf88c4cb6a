//! # rmount
//!
//! Mounts SFTP servers through a filesystem-replication host. The host talks
//! to one [`ProviderBridge`] per mounted target; each bridge owns its own
//! reconnecting SFTP session. Targets and their mount bindings live in a
//! [`TargetRegistry`], passwords behind a [`CredentialStore`].
//!
//! | Crate | Concern |
//! |---|---|
//! | `rmount-core` | item model, identifiers, error taxonomy, transfer progress |
//! | `rmount-sftp` | sessions, connection manager, remote operations |
//! | `rmount-provider` | the bridge, enumeration and change feed |
//! | `rmount-targets` | target registry, legacy migration, credentials |

pub use rmount_core::*;
pub use rmount_provider::provider::{
    ChangedFields, ChangeSet, DirectoryEnumerator, EnumerationPage, FetchedContents,
    ItemCapabilities, ItemTemplate, ItemVersion, ModifyOutcome, ModifyRequest, ProviderBridge,
    ProviderItem,
};
pub use rmount_sftp::sftp::{
    AuthMethod, ConnectionConfig, ConnectionManager, Connector, RemoteOperations, RemoteSession,
    Ssh2Connector,
};
pub use rmount_targets::targets::{
    account_key, remove_target, CredentialStore, MemoryCredentialStore, RegistryError,
    RegistryResult, RemoteTarget, TargetRegistry,
};

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Installs the global subscriber: `RUST_LOG` when set, `default_filter`
/// otherwise. `log` records from the library crates are forwarded.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .is_ok()
}

/// Builds the bridge for a mount bound to target `id`.
///
/// An unknown or incomplete target yields an unconfigured bridge, which
/// reports `NotAuthenticated` for everything but the root item. A target
/// without a stored password still gets a live bridge; its connection
/// attempts fail authentication.
pub fn bridge_for_target(
    registry: &TargetRegistry,
    credentials: &dyn CredentialStore,
    id: &Uuid,
    connector: Arc<dyn Connector>,
) -> RegistryResult<ProviderBridge> {
    let target = match registry.get(id)? {
        Some(target) if target.is_valid() => target,
        Some(_) => {
            warn!("Target {} is incomplete; mounting unconfigured", id);
            return Ok(ProviderBridge::unconfigured());
        }
        None => {
            warn!("Target {} not found; mounting unconfigured", id);
            return Ok(ProviderBridge::unconfigured());
        }
    };

    let password = credentials.load_password(&target.account_key())?;
    if password.is_none() {
        warn!("No stored password for target {}", id);
    }
    info!(
        "Bridge for {} ({}@{}:{}{})",
        target.display_name,
        target.username,
        target.host,
        target.port,
        target.effective_base_path()
    );
    Ok(ProviderBridge::new(target.connection_config(password), connector))
}
