// ── Targets – registry, credentials, legacy migration ────────────────────────

pub mod credentials;
pub mod error;
pub mod legacy;
pub mod registry;
pub mod target;

pub use credentials::{account_key, CredentialStore, MemoryCredentialStore};
pub use error::{RegistryError, RegistryResult};
pub use legacy::LegacyTarget;
pub use registry::{remove_target, TargetRegistry};
pub use target::RemoteTarget;
