// ── rmount-sftp / sftp module ─────────────────────────────────────────────────

pub mod types;
pub mod session;
pub mod ssh2_backend;
pub mod connection;
pub mod operations;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use connection::{ConnectionManager, ConnectionState};
pub use operations::RemoteOperations;
pub use session::{Connector, RemoteSession};
pub use ssh2_backend::{Ssh2Connector, Ssh2Session};
pub use types::*;
