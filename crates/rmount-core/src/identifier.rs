// ── Item identifiers ─────────────────────────────────────────────────────────
//
// An item identifier is the standard (padded) base64 of the UTF-8 path.
// Hosts persist these across restarts, so the encoding must not change.

use crate::path::{normalize_path, parent_path};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ROOT_CONTAINER_ID: &str = "NSFileProviderRootContainerItemIdentifier";
pub const WORKING_SET_ID: &str = "NSFileProviderWorkingSetContainerItemIdentifier";

/// Opaque token handed to the host for one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemIdentifier {
    RootContainer,
    WorkingSet,
    Item(String),
}

impl ItemIdentifier {
    /// Identifier for an arbitrary path (no root detection).
    pub fn for_path(path: &str) -> Self {
        ItemIdentifier::Item(encode_path(path))
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match raw.as_str() {
            ROOT_CONTAINER_ID => ItemIdentifier::RootContainer,
            WORKING_SET_ID => ItemIdentifier::WorkingSet,
            _ => ItemIdentifier::Item(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ItemIdentifier::RootContainer => ROOT_CONTAINER_ID,
            ItemIdentifier::WorkingSet => WORKING_SET_ID,
            ItemIdentifier::Item(raw) => raw,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, ItemIdentifier::Item(_))
    }
}

impl fmt::Display for ItemIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ItemIdentifier {
    fn from(raw: String) -> Self {
        Self::from_raw(raw)
    }
}

impl From<ItemIdentifier> for String {
    fn from(id: ItemIdentifier) -> String {
        id.as_str().to_string()
    }
}

pub fn encode_path(path: &str) -> String {
    STANDARD.encode(path.as_bytes())
}

/// Inverse of [`encode_path`]; `None` for malformed base64 or non-UTF-8 bytes.
pub fn decode_path(raw: &str) -> Option<String> {
    let bytes = STANDARD.decode(raw).ok()?;
    String::from_utf8(bytes).ok()
}

// ── Codec bound to one target ────────────────────────────────────────────────

/// Maps identifiers to paths under a target's base path and back.
#[derive(Debug, Clone)]
pub struct IdentifierCodec {
    base_path: String,
}

impl IdentifierCodec {
    pub fn new(base_path: &str) -> Self {
        Self {
            base_path: normalize_path(base_path),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Path for an identifier. Sentinels and undecodable identifiers map to
    /// the base path.
    pub fn resolve(&self, id: &ItemIdentifier) -> String {
        match id {
            ItemIdentifier::RootContainer | ItemIdentifier::WorkingSet => self.base_path.clone(),
            ItemIdentifier::Item(raw) => match decode_path(raw) {
                Some(path) => path,
                None => {
                    warn!("Undecodable item identifier '{}', using base path", raw);
                    self.base_path.clone()
                }
            },
        }
    }

    pub fn identifier_for(&self, path: &str) -> ItemIdentifier {
        if path == self.base_path {
            ItemIdentifier::RootContainer
        } else {
            ItemIdentifier::for_path(path)
        }
    }

    /// Identifier of the containing directory. The root is its own parent.
    pub fn parent_identifier(&self, path: &str) -> ItemIdentifier {
        if path == self.base_path {
            return ItemIdentifier::RootContainer;
        }
        self.identifier_for(&parent_path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for path in ["/", "/a", "/a/b c/ü.txt", "/with+plus/and=equals"] {
            assert_eq!(decode_path(&encode_path(path)).as_deref(), Some(path));
        }
    }

    #[test]
    fn test_encoding_is_standard_padded_base64() {
        assert_eq!(encode_path("/a"), "L2E=");
        assert_eq!(encode_path("/home"), "L2hvbWU=");
    }

    #[test]
    fn test_distinct_paths_distinct_identifiers() {
        assert_ne!(encode_path("/a/b"), encode_path("/a/c"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode_path("not base64!"), None);
        // valid base64, invalid UTF-8
        assert_eq!(decode_path("/w=="), None);
    }

    #[test]
    fn test_sentinels_resolve_to_base_path() {
        let codec = IdentifierCodec::new("/home/user/");
        assert_eq!(codec.resolve(&ItemIdentifier::RootContainer), "/home/user");
        assert_eq!(codec.resolve(&ItemIdentifier::WorkingSet), "/home/user");
    }

    #[test]
    fn test_malformed_identifier_falls_back_to_base() {
        let codec = IdentifierCodec::new("/srv");
        let id = ItemIdentifier::from_raw("%%%");
        assert_eq!(codec.resolve(&id), "/srv");
    }

    #[test]
    fn test_identifier_for_base_is_root() {
        let codec = IdentifierCodec::new("/srv");
        assert_eq!(codec.identifier_for("/srv"), ItemIdentifier::RootContainer);
        assert_eq!(codec.parent_identifier("/srv/a"), ItemIdentifier::RootContainer);
        assert_eq!(codec.parent_identifier("/srv"), ItemIdentifier::RootContainer);
        assert_eq!(
            codec.parent_identifier("/srv/a/b"),
            ItemIdentifier::Item(encode_path("/srv/a"))
        );
    }

    #[test]
    fn test_raw_sentinel_strings_parse() {
        assert_eq!(ItemIdentifier::from_raw(ROOT_CONTAINER_ID), ItemIdentifier::RootContainer);
        assert_eq!(ItemIdentifier::from_raw(WORKING_SET_ID), ItemIdentifier::WorkingSet);
        assert!(ItemIdentifier::from_raw(WORKING_SET_ID).is_sentinel());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id = ItemIdentifier::for_path("/x");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"L3g=\"");
        let back: ItemIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
