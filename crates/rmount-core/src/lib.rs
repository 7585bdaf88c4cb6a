//! # rmount – core
//!
//! Leaf types shared by every layer of the SFTP mount bridge:
//!   • `RemoteItem` and POSIX path helpers
//!   • Opaque item identifiers (base64 of the remote path) and sync anchors
//!   • Raw transport errors and the host-facing error taxonomy
//!   • Best-effort error classification with user-facing messages
//!   • Transfer progress handles and the process-wide transfer registry

pub mod anchor;
pub mod classify;
pub mod error;
pub mod identifier;
pub mod path;
pub mod progress;
pub mod types;

pub use anchor::SyncAnchor;
pub use classify::{ClassifierRule, ErrorClassifier};
pub use error::*;
pub use identifier::{decode_path, encode_path, IdentifierCodec, ItemIdentifier};
pub use path::{child_path, file_name, normalize_path, parent_path};
pub use progress::*;
pub use types::*;
