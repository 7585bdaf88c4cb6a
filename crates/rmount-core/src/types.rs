// ── Item model ───────────────────────────────────────────────────────────────

use crate::path::file_name;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// POSIX file-type mask.
pub const S_IFMT: u32 = 0o170000;
/// POSIX directory type value.
pub const S_IFDIR: u32 = 0o040000;

/// True when the mode's file-type bits say "directory".
pub fn is_directory_mode(mode: u32) -> bool {
    mode & S_IFMT == S_IFDIR
}

/// One remote filesystem entry.
///
/// `path` is absolute and normalized (no trailing slash except for `/`);
/// `filename` is its last component, or empty for the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    pub path: String,
    pub filename: String,
    pub is_directory: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modification_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permissions: Option<u32>,
}

impl RemoteItem {
    /// Build an item from raw protocol attributes.
    ///
    /// An explicit directory flag wins; otherwise the mode's type bits decide.
    /// Directories always report size 0.
    pub fn from_attributes(
        path: impl Into<String>,
        is_directory: Option<bool>,
        size: Option<u64>,
        mtime: Option<u64>,
        permissions: Option<u32>,
    ) -> Self {
        let path = path.into();
        let is_directory = is_directory
            .or_else(|| permissions.map(is_directory_mode))
            .unwrap_or(false);
        Self {
            filename: file_name(&path).to_string(),
            size: if is_directory { 0 } else { size.unwrap_or(0) },
            modification_time: mtime.and_then(timestamp_to_datetime),
            permissions,
            is_directory,
            path,
        }
    }

    /// Synthetic directory item standing in for a container path.
    pub fn directory(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            filename: file_name(&path).to_string(),
            path,
            is_directory: true,
            size: 0,
            modification_time: None,
            permissions: None,
        }
    }

    /// Modification time as whole Unix seconds, 0 when unknown.
    pub fn mtime_secs(&self) -> i64 {
        self.modification_time.map(|t| t.timestamp()).unwrap_or(0)
    }
}

fn timestamp_to_datetime(secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    Utc.timestamp_opt(secs, 0).single()
}
