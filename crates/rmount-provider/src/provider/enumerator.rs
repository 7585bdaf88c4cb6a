// ── DirectoryEnumerator – listings and the synthetic change feed ─────────────
//
// SFTP has no change log. Every change request re-scans the container and
// reports every current item as updated; the anchor is just "now".

use crate::provider::item::ProviderItem;
use log::{debug, warn};
use rmount_core::{
    ErrorClassifier, IdentifierCodec, ItemIdentifier, ProviderError, ProviderErrorKind,
    ProviderResult, SftpError, SyncAnchor,
};
use rmount_sftp::sftp::RemoteOperations;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumerationPage {
    pub items: Vec<ProviderItem>,
    /// Always `None`: a directory is returned in one page.
    pub next_page: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    pub updated: Vec<ProviderItem>,
    pub deleted: Vec<ItemIdentifier>,
    pub anchor: SyncAnchor,
    pub more_coming: bool,
}

pub struct DirectoryEnumerator {
    container: ItemIdentifier,
    path: String,
    operations: RemoteOperations,
    codec: IdentifierCodec,
    classifier: Arc<ErrorClassifier>,
}

impl DirectoryEnumerator {
    pub fn new(
        container: ItemIdentifier,
        operations: RemoteOperations,
        codec: IdentifierCodec,
        classifier: Arc<ErrorClassifier>,
    ) -> Self {
        let path = codec.resolve(&container);
        Self {
            container,
            path,
            operations,
            codec,
            classifier,
        }
    }

    pub fn container(&self) -> &ItemIdentifier {
        &self.container
    }

    pub fn container_path(&self) -> &str {
        &self.path
    }

    async fn scan(&self) -> ProviderResult<Vec<ProviderItem>> {
        let items = self
            .operations
            .list_directory(&self.path)
            .await
            .map_err(|e| self.unreachable(e))?;
        Ok(items
            .iter()
            .map(|item| ProviderItem::from_remote(item, &self.codec))
            .collect())
    }

    /// Listing failures always surface as server-unreachable; the classified
    /// detail only refines the message.
    fn unreachable(&self, e: SftpError) -> ProviderError {
        warn!("Enumeration of {} failed: {}", self.path, e);
        let mut err = self.classifier.classify(&e);
        err.kind = ProviderErrorKind::ServerUnreachable;
        err
    }

    pub async fn enumerate_items(&self) -> ProviderResult<EnumerationPage> {
        let items = self.scan().await?;
        debug!("Enumerated {} items in {}", items.len(), self.path);
        Ok(EnumerationPage {
            items,
            next_page: None,
        })
    }

    /// Full re-scan regardless of `since`.
    pub async fn enumerate_changes(&self, since: &SyncAnchor) -> ProviderResult<ChangeSet> {
        let updated = self.scan().await?;
        debug!(
            "Change scan of {} since {:?}: {} items",
            self.path,
            since.timestamp(),
            updated.len()
        );
        Ok(ChangeSet {
            updated,
            deleted: Vec::new(),
            anchor: SyncAnchor::now(),
            more_coming: false,
        })
    }

    pub fn current_anchor(&self) -> SyncAnchor {
        SyncAnchor::now()
    }
}
