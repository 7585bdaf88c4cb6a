// ── Session seams ────────────────────────────────────────────────────────────

use crate::sftp::types::{ConnectionConfig, DirEntry, FileAttributes};
use async_trait::async_trait;
use rmount_core::{Progress, SftpResult};
use std::path::Path;
use std::sync::Arc;

/// One authenticated SFTP session. Safe for concurrent use once established.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Local liveness check; must not touch the network.
    fn is_active(&self) -> bool;

    /// Raw directory listing; may include `.` and `..`.
    async fn read_dir(&self, path: &str) -> SftpResult<Vec<DirEntry>>;

    async fn stat(&self, path: &str) -> SftpResult<FileAttributes>;

    /// Copy `remote` into the local file at `local`, advancing `progress`
    /// per chunk and stopping with a cancelled error once it is cancelled.
    async fn download(
        &self,
        remote: &str,
        local: &Path,
        progress: &Progress,
        chunk_size: usize,
    ) -> SftpResult<u64>;

    /// Create-or-truncate `remote` with the contents of `local`.
    async fn upload(
        &self,
        local: &Path,
        remote: &str,
        progress: &Progress,
        chunk_size: usize,
    ) -> SftpResult<u64>;

    async fn mkdir(&self, path: &str) -> SftpResult<()>;

    async fn unlink(&self, path: &str) -> SftpResult<()>;

    async fn rmdir(&self, path: &str) -> SftpResult<()>;

    async fn rename(&self, from: &str, to: &str) -> SftpResult<()>;

    async fn close(&self) -> SftpResult<()>;
}

/// Establishes sessions for a connection config.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> SftpResult<Arc<dyn RemoteSession>>;
}
