// ── ProviderBridge – replication-host requests over one remote target ───────

use crate::provider::enumerator::DirectoryEnumerator;
use crate::provider::item::ProviderItem;
use log::{info, warn};
use rmount_core::{
    child_path, file_name, parent_path, ErrorClassifier, IdentifierCodec, ItemIdentifier, Progress,
    ProviderError, ProviderResult, RemoteItem, SftpError,
};
use rmount_sftp::sftp::{ConnectionConfig, ConnectionManager, Connector, RemoteOperations};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Request / response types ─────────────────────────────────────────────────

/// Describes an item the host wants created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTemplate {
    pub parent: ItemIdentifier,
    pub filename: String,
    pub is_directory: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedFields {
    pub filename: bool,
    pub parent: bool,
    pub contents: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequest {
    pub identifier: ItemIdentifier,
    pub changed: ChangedFields,
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub new_parent: Option<ItemIdentifier>,
    #[serde(default)]
    pub contents: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ModifyOutcome {
    pub item: ProviderItem,
    /// True exactly when a rename or move happened; the host must drop the
    /// old identifier and adopt `item.identifier`.
    pub identifier_changed: bool,
}

#[derive(Debug, Clone)]
pub struct FetchedContents {
    /// Local temporary copy, owned by the caller.
    pub local_path: PathBuf,
    pub item: ProviderItem,
}

// ── Bridge ───────────────────────────────────────────────────────────────────

/// One instance per mounted target. Every failure leaving this type has been
/// through the error classifier.
pub struct ProviderBridge {
    codec: IdentifierCodec,
    operations: Option<RemoteOperations>,
    classifier: Arc<ErrorClassifier>,
}

impl ProviderBridge {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        let codec = IdentifierCodec::new(&config.base_path);
        let manager = Arc::new(ConnectionManager::new(config, connector));
        Self {
            codec,
            operations: Some(RemoteOperations::new(manager)),
            classifier: Arc::new(ErrorClassifier::new()),
        }
    }

    /// A bridge with no configured target; everything but the root item
    /// fails with `NotAuthenticated`.
    pub fn unconfigured() -> Self {
        Self {
            codec: IdentifierCodec::new("/"),
            operations: None,
            classifier: Arc::new(ErrorClassifier::new()),
        }
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn base_path(&self) -> &str {
        self.codec.base_path()
    }

    pub fn codec(&self) -> &IdentifierCodec {
        &self.codec
    }

    pub fn is_configured(&self) -> bool {
        self.operations.is_some()
    }

    fn ops(&self) -> ProviderResult<&RemoteOperations> {
        self.operations
            .as_ref()
            .ok_or_else(ProviderError::not_configured)
    }

    fn classify(&self, e: SftpError) -> ProviderError {
        let err = self.classifier.classify(&e);
        warn!("Remote operation failed ({:?}): {}", err.kind, e);
        err
    }

    fn item(&self, remote: &RemoteItem) -> ProviderItem {
        ProviderItem::from_remote(remote, &self.codec)
    }

    // ── Enumeration ──────────────────────────────────────────────────────────

    /// Enumerator for a container: root, working set or a directory item.
    pub fn enumerator(&self, container: &ItemIdentifier) -> ProviderResult<DirectoryEnumerator> {
        let ops = self.ops()?;
        Ok(DirectoryEnumerator::new(
            container.clone(),
            ops.clone(),
            self.codec.clone(),
            self.classifier.clone(),
        ))
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    pub async fn resolve_item(&self, identifier: &ItemIdentifier) -> ProviderResult<ProviderItem> {
        if *identifier == ItemIdentifier::RootContainer {
            return Ok(self.item(&RemoteItem::directory(self.codec.base_path())));
        }
        let ops = self.ops()?;
        let path = self.codec.resolve(identifier);
        let remote = ops
            .get_attributes(&path)
            .await
            .map_err(|e| self.classify(e))?;
        Ok(self.item(&remote))
    }

    /// Download, then re-stat so the returned metadata is the server's.
    pub async fn fetch_contents(
        &self,
        identifier: &ItemIdentifier,
        progress: &Progress,
    ) -> ProviderResult<FetchedContents> {
        let ops = self.ops()?;
        let path = self.codec.resolve(identifier);
        let local_path = ops
            .download_file(&path, progress)
            .await
            .map_err(|e| self.classify(e))?;
        match ops.get_attributes(&path).await {
            Ok(remote) => Ok(FetchedContents {
                local_path,
                item: self.item(&remote),
            }),
            Err(e) => {
                if let Err(io) = std::fs::remove_file(&local_path) {
                    warn!("Failed to remove {}: {}", local_path.display(), io);
                }
                Err(self.classify(e))
            }
        }
    }

    // ── Create ───────────────────────────────────────────────────────────────

    /// Create a directory, or upload `contents` as a new file. A file
    /// without contents is created empty. The result is always re-stat'd.
    pub async fn create_item(
        &self,
        template: &ItemTemplate,
        contents: Option<&Path>,
        progress: &Progress,
    ) -> ProviderResult<ProviderItem> {
        let ops = self.ops()?;
        let parent = self.codec.resolve(&template.parent);
        let path = child_path(&parent, &template.filename);

        let created = if template.is_directory {
            ops.create_directory(&path).await
        } else {
            match contents {
                Some(local) => ops.upload_file(local, &path, progress).await.map(|_| ()),
                None => ops.write_empty_file(&path).await,
            }
        };
        created.map_err(|e| self.classify(e))?;

        let remote = ops
            .get_attributes(&path)
            .await
            .map_err(|e| self.classify(e))?;
        info!("Created {} {}", if remote.is_directory { "directory" } else { "file" }, path);
        Ok(self.item(&remote))
    }

    // ── Modify ───────────────────────────────────────────────────────────────

    /// Rename/move when the name or parent changed and the target path
    /// differs, then upload new contents to the final path, then re-stat.
    pub async fn modify_item(
        &self,
        request: &ModifyRequest,
        progress: &Progress,
    ) -> ProviderResult<ModifyOutcome> {
        let ops = self.ops()?;
        let mut current = self.codec.resolve(&request.identifier);
        let mut identifier_changed = false;

        if request.changed.filename || request.changed.parent {
            let parent = match (&request.new_parent, request.changed.parent) {
                (Some(p), true) => self.codec.resolve(p),
                _ => parent_path(&current),
            };
            let name = match (&request.new_name, request.changed.filename) {
                (Some(n), true) => n.clone(),
                _ => file_name(&current).to_string(),
            };
            let target = child_path(&parent, &name);
            if target != current {
                ops.rename(&current, &target)
                    .await
                    .map_err(|e| self.classify(e))?;
                current = target;
                identifier_changed = true;
            }
        }

        if request.changed.contents {
            if let Some(local) = &request.contents {
                // A rename that already happened is not rolled back; the host
                // re-resolves the old identifier and gets NoSuchItem.
                if let Err(e) = ops.upload_file(local, &current, progress).await {
                    if identifier_changed {
                        warn!(
                            "Upload failed after {} was moved to {}",
                            self.codec.resolve(&request.identifier),
                            current
                        );
                    }
                    return Err(self.classify(e));
                }
            }
        }

        let remote = ops
            .get_attributes(&current)
            .await
            .map_err(|e| self.classify(e))?;
        Ok(ModifyOutcome {
            item: self.item(&remote),
            identifier_changed,
        })
    }

    // ── Delete ───────────────────────────────────────────────────────────────

    /// Delete a file, an empty directory, or (with `recursive`) a whole
    /// subtree in post-order. A failure midway leaves what was already
    /// removed gone; there is no rollback.
    pub async fn delete_item(&self, identifier: &ItemIdentifier, recursive: bool) -> ProviderResult<()> {
        let ops = self.ops()?;
        let path = self.codec.resolve(identifier);
        let target = ops
            .get_attributes(&path)
            .await
            .map_err(|e| self.classify(e))?;

        if !target.is_directory {
            return ops.delete_file(&path).await.map_err(|e| self.classify(e));
        }

        if recursive {
            return self.delete_tree(ops, &path).await;
        }

        let children = ops
            .list_directory(&path)
            .await
            .map_err(|e| self.classify(e))?;
        if !children.is_empty() {
            return Err(ProviderError::directory_not_empty());
        }
        ops.delete_directory(&path)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn delete_tree(&self, ops: &RemoteOperations, root: &str) -> ProviderResult<()> {
        // (directory, children already handled)
        let mut stack: Vec<(String, bool)> = vec![(root.to_string(), false)];
        while let Some((dir, expanded)) = stack.pop() {
            if expanded {
                ops.delete_directory(&dir)
                    .await
                    .map_err(|e| self.classify(e))?;
                continue;
            }
            stack.push((dir.clone(), true));
            let children = ops
                .list_directory(&dir)
                .await
                .map_err(|e| self.classify(e))?;
            for child in children {
                if child.is_directory {
                    stack.push((child.path, false));
                } else {
                    ops.delete_file(&child.path)
                        .await
                        .map_err(|e| self.classify(e))?;
                }
            }
        }
        info!("Deleted tree {}", root);
        Ok(())
    }

    // ── Teardown ─────────────────────────────────────────────────────────────

    /// Drop the target's session; best effort.
    pub async fn invalidate(&self) {
        if let Some(ops) = &self.operations {
            ops.manager().disconnect().await;
        }
    }
}
