// ── Host-facing item view ────────────────────────────────────────────────────

use chrono::{DateTime, Utc};
use rmount_core::{IdentifierCodec, ItemIdentifier, RemoteItem};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCapabilities {
    pub reading: bool,
    pub writing: bool,
    pub renaming: bool,
    pub deleting: bool,
    pub evicting: bool,
    pub adding_sub_items: bool,
    pub content_enumerating: bool,
}

impl ItemCapabilities {
    pub fn directory() -> Self {
        Self {
            reading: true,
            content_enumerating: true,
            adding_sub_items: true,
            renaming: true,
            deleting: true,
            ..Self::default()
        }
    }

    pub fn file() -> Self {
        Self {
            reading: true,
            writing: true,
            renaming: true,
            deleting: true,
            evicting: true,
            ..Self::default()
        }
    }
}

/// Content and metadata version; both are `"<size>_<mtime secs>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemVersion {
    pub content: Vec<u8>,
    pub metadata: Vec<u8>,
}

impl ItemVersion {
    pub fn of(item: &RemoteItem) -> Self {
        let tag = format!("{}_{}", item.size, item.mtime_secs()).into_bytes();
        Self {
            content: tag.clone(),
            metadata: tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderItem {
    pub identifier: ItemIdentifier,
    pub parent_identifier: ItemIdentifier,
    pub filename: String,
    pub is_directory: bool,
    pub document_size: u64,
    pub content_modification_date: Option<DateTime<Utc>>,
    pub capabilities: ItemCapabilities,
    pub item_version: ItemVersion,
    /// Absolute remote path backing this item.
    pub path: String,
}

impl ProviderItem {
    pub fn from_remote(item: &RemoteItem, codec: &IdentifierCodec) -> Self {
        Self {
            identifier: codec.identifier_for(&item.path),
            parent_identifier: codec.parent_identifier(&item.path),
            filename: item.filename.clone(),
            is_directory: item.is_directory,
            document_size: item.size,
            content_modification_date: item.modification_time,
            capabilities: if item.is_directory {
                ItemCapabilities::directory()
            } else {
                ItemCapabilities::file()
            },
            item_version: ItemVersion::of(item),
            path: item.path.clone(),
        }
    }
}
