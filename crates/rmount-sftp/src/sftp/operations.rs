// ── RemoteOperations – filesystem verbs over the managed session ─────────────

use crate::sftp::connection::ConnectionManager;
use crate::sftp::session::RemoteSession;
use crate::sftp::types::FileAttributes;
use log::{debug, info};
use rmount_core::{
    child_path, Progress, RemoteItem, SftpError, SftpErrorKind, SftpResult, TransferDirection,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stateless apart from the shared connection manager; cheap to clone.
/// Failures propagate untouched: nothing here retries.
#[derive(Clone)]
pub struct RemoteOperations {
    manager: Arc<ConnectionManager>,
}

impl RemoteOperations {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    async fn session(&self) -> SftpResult<Arc<dyn RemoteSession>> {
        self.manager.session().await
    }

    /// Apply the configured per-operation deadline, if any.
    async fn with_deadline<T>(
        &self,
        op: &str,
        path: &str,
        fut: impl Future<Output = SftpResult<T>>,
    ) -> SftpResult<T> {
        match self.manager.config().operation_timeout() {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(SftpError::timeout(format!(
                    "{} '{}' timed out after {:?}",
                    op, path, limit
                ))
                .with_path(path)),
            },
            None => fut.await,
        }
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    /// Immediate children of `path`, without `.` and `..`.
    pub async fn list_directory(&self, path: &str) -> SftpResult<Vec<RemoteItem>> {
        let session = self.session().await?;
        let entries = self
            .with_deadline("list", path, session.read_dir(path))
            .await?;
        let items: Vec<RemoteItem> = entries
            .into_iter()
            .filter(|e| e.name != "." && e.name != ".." && !e.name.is_empty())
            .map(|e| to_item(child_path(path, &e.name), &e.attrs))
            .collect();
        debug!("SFTP list {} → {} entries", path, items.len());
        Ok(items)
    }

    pub async fn get_attributes(&self, path: &str) -> SftpResult<RemoteItem> {
        let session = self.session().await?;
        let attrs = self.with_deadline("stat", path, session.stat(path)).await?;
        Ok(to_item(path.to_string(), &attrs))
    }

    // ── Transfers ────────────────────────────────────────────────────────────

    /// Fetch the whole file into a fresh local temporary file and return its
    /// path. The caller owns (and must remove) the returned file. On failure
    /// or cancellation the temporary file is removed.
    pub async fn download_file(&self, path: &str, progress: &Progress) -> SftpResult<PathBuf> {
        self.download_file_in(path, &std::env::temp_dir(), progress)
            .await
    }

    /// Like [`download_file`](Self::download_file), staging in `dir`.
    pub async fn download_file_in(
        &self,
        path: &str,
        dir: &Path,
        progress: &Progress,
    ) -> SftpResult<PathBuf> {
        let session = self.session().await?;
        let attrs = self.with_deadline("stat", path, session.stat(path)).await?;
        let total = attrs.size.unwrap_or(0);

        let temp = tempfile::Builder::new()
            .prefix("rmount-")
            .tempfile_in(dir)
            .map_err(|e| SftpError::local_io("Failed to create temporary file", e))?;

        progress.begin(TransferDirection::Download, path, total);
        let guard = progress.cancel_guard();
        let result = self
            .with_deadline(
                "download",
                path,
                session.download(path, temp.path(), progress, self.manager.config().chunk_size()),
            )
            .await;
        guard.disarm();

        match result {
            Ok(bytes) => {
                progress.complete();
                info!("SFTP download {} ({} bytes)", path, bytes);
                let (_, kept) = temp
                    .keep()
                    .map_err(|e| SftpError::local_io("Failed to keep temporary file", e.error))?;
                Ok(kept)
            }
            Err(e) => Err(finish_failed(progress, e)),
        }
    }

    /// Whole-file create-or-truncate upload; returns bytes written.
    pub async fn upload_file(
        &self,
        local: &Path,
        remote: &str,
        progress: &Progress,
    ) -> SftpResult<u64> {
        let total = std::fs::metadata(local)
            .map_err(|e| SftpError::local_io("Cannot read upload source", e))?
            .len();
        let session = self.session().await?;

        progress.begin(TransferDirection::Upload, remote, total);
        let guard = progress.cancel_guard();
        let result = self
            .with_deadline(
                "upload",
                remote,
                session.upload(local, remote, progress, self.manager.config().chunk_size()),
            )
            .await;
        guard.disarm();

        match result {
            Ok(bytes) => {
                progress.complete();
                info!("SFTP upload {} ({} bytes)", remote, bytes);
                Ok(bytes)
            }
            Err(e) => Err(finish_failed(progress, e)),
        }
    }

    /// Create (or truncate to) an empty remote file.
    pub async fn write_empty_file(&self, remote: &str) -> SftpResult<()> {
        let empty = tempfile::NamedTempFile::new()
            .map_err(|e| SftpError::local_io("Failed to create temporary file", e))?;
        self.upload_file(empty.path(), remote, &Progress::new())
            .await
            .map(|_| ())
    }

    // ── Mutations ────────────────────────────────────────────────────────────

    pub async fn create_directory(&self, path: &str) -> SftpResult<()> {
        let session = self.session().await?;
        self.with_deadline("mkdir", path, session.mkdir(path)).await?;
        info!("SFTP mkdir: {}", path);
        Ok(())
    }

    pub async fn delete_file(&self, path: &str) -> SftpResult<()> {
        let session = self.session().await?;
        self.with_deadline("unlink", path, session.unlink(path)).await?;
        info!("SFTP delete file: {}", path);
        Ok(())
    }

    /// Remove an empty directory; children must be removed first.
    pub async fn delete_directory(&self, path: &str) -> SftpResult<()> {
        let session = self.session().await?;
        self.with_deadline("rmdir", path, session.rmdir(path)).await?;
        info!("SFTP delete directory: {}", path);
        Ok(())
    }

    /// Rename or move; atomic at the protocol level.
    pub async fn rename(&self, from: &str, to: &str) -> SftpResult<()> {
        let session = self.session().await?;
        self.with_deadline("rename", from, session.rename(from, to))
            .await?;
        info!("SFTP rename: {} → {}", from, to);
        Ok(())
    }
}

fn to_item(path: String, attrs: &FileAttributes) -> RemoteItem {
    RemoteItem::from_attributes(path, attrs.is_dir, attrs.size, attrs.mtime, attrs.perm)
}

/// Record a failed transfer. A timed-out transfer is cancelled so the
/// blocking copy loop stops.
fn finish_failed(progress: &Progress, e: SftpError) -> SftpError {
    if e.kind == SftpErrorKind::Timeout {
        progress.cancel();
    }
    progress.fail(e.to_string());
    e
}
