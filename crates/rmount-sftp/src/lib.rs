//! # rmount – SFTP
//!
//! Wire-side half of the mount bridge:
//!   • `RemoteSession` / `Connector` seams with an ssh2 (libssh2) backend
//!   • Password and keyboard-interactive authentication
//!   • `ConnectionManager`: one lazily established, auto-reconnecting
//!     session per target with exponential backoff
//!   • `RemoteOperations`: list / stat / transfer / mkdir / delete / rename
//!   • An in-memory server for tests (`testing` feature)

pub mod sftp;
