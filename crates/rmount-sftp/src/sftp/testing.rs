// ── In-memory SFTP server for tests ──────────────────────────────────────────
//
// `MemoryConnector` hands out `MemorySession`s over one shared tree. It can
// script connection failures, inject per-path errors, delay operations and
// journal every mutating call.

use crate::sftp::session::{Connector, RemoteSession};
use crate::sftp::types::*;
use async_trait::async_trait;
use rmount_core::{normalize_path, parent_path, Progress, SftpError, SftpResult};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, mtime: u64 },
    Dir { mtime: u64 },
}

#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    journal: Vec<String>,
    failures: HashMap<String, SftpError>,
    clock: u64,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Dir { mtime: 1_700_000_000 });
        Self {
            nodes,
            journal: Vec::new(),
            failures: HashMap::new(),
            clock: 1_700_000_000,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn check(&self, path: &str) -> SftpResult<()> {
        match self.failures.get(path) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn is_dir(&self, path: &str) -> bool {
        matches!(self.nodes.get(path), Some(Node::Dir { .. }))
    }

    fn children(&self, path: &str) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|k| k.as_str() != path && parent_path(k) == path)
            .cloned()
            .collect()
    }

    fn attrs(node: &Node, explicit_flag: bool) -> FileAttributes {
        match node {
            Node::File { data, mtime } => FileAttributes {
                size: Some(data.len() as u64),
                perm: Some(0o100644),
                mtime: Some(*mtime),
                is_dir: explicit_flag.then_some(false),
            },
            Node::Dir { mtime } => FileAttributes {
                size: Some(4096),
                perm: Some(0o040755),
                mtime: Some(*mtime),
                is_dir: explicit_flag.then_some(true),
            },
        }
    }

    fn mkdir_all(&mut self, path: &str) {
        let path = normalize_path(path);
        if path != "/" {
            self.mkdir_all(&parent_path(&path));
        }
        if !self.nodes.contains_key(&path) {
            let mtime = self.tick();
            self.nodes.insert(path, Node::Dir { mtime });
        }
    }

    fn require_parent_dir(&self, path: &str) -> SftpResult<()> {
        let parent = parent_path(path);
        if self.is_dir(&parent) {
            Ok(())
        } else {
            Err(SftpError::not_found(&parent))
        }
    }
}

// ── Connector ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MemoryConnector {
    tree: Arc<StdMutex<Tree>>,
    scripted_failures: Arc<StdMutex<VecDeque<SftpError>>>,
    connect_calls: Arc<AtomicUsize>,
    sessions: Arc<StdMutex<Vec<Arc<AtomicBool>>>>,
    password: Option<String>,
    connect_delay: Arc<StdMutex<Duration>>,
    operation_delay: Arc<StdMutex<Duration>>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            tree: Arc::new(StdMutex::new(Tree::new())),
            scripted_failures: Arc::new(StdMutex::new(VecDeque::new())),
            connect_calls: Arc::new(AtomicUsize::new(0)),
            sessions: Arc::new(StdMutex::new(Vec::new())),
            password: None,
            connect_delay: Arc::new(StdMutex::new(Duration::ZERO)),
            operation_delay: Arc::new(StdMutex::new(Duration::ZERO)),
        }
    }

    /// Reject connections whose password differs from `password`.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Fail the next `count` connection attempts with `err`.
    pub fn fail_next_connects(&self, count: usize, err: SftpError) {
        if let Ok(mut queue) = self.scripted_failures.lock() {
            for _ in 0..count {
                queue.push_back(err.clone());
            }
        }
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        if let Ok(mut d) = self.connect_delay.lock() {
            *d = delay;
        }
    }

    pub fn set_operation_delay(&self, delay: Duration) {
        if let Ok(mut d) = self.operation_delay.lock() {
            *d = delay;
        }
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Drop every live session as if the transport had gone away.
    pub fn kill_sessions(&self) {
        if let Ok(sessions) = self.sessions.lock() {
            for active in sessions.iter() {
                active.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Make any operation touching `path` fail with `err`.
    pub fn fail_on(&self, path: &str, err: SftpError) {
        self.with_tree(|t| {
            t.failures.insert(path.to_string(), err);
        });
    }

    pub fn add_dir(&self, path: &str) {
        self.with_tree(|t| t.mkdir_all(path));
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        let path = normalize_path(path);
        self.with_tree(|t| {
            t.mkdir_all(&parent_path(&path));
            let mtime = t.tick();
            t.nodes.insert(
                path,
                Node::File {
                    data: data.to_vec(),
                    mtime,
                },
            );
        });
    }

    pub fn exists(&self, path: &str) -> bool {
        self.with_tree(|t| t.nodes.contains_key(path))
    }

    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        self.with_tree(|t| match t.nodes.get(path) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        })
    }

    /// Mutating calls in the order they were applied, e.g. `"rmdir /a"`.
    pub fn journal(&self) -> Vec<String> {
        self.with_tree(|t| t.journal.clone())
    }

    pub fn clear_journal(&self) {
        self.with_tree(|t| t.journal.clear());
    }

    fn with_tree<R>(&self, f: impl FnOnce(&mut Tree) -> R) -> R {
        let mut tree = match self.tree.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut tree)
    }

    fn delay(lock: &StdMutex<Duration>) -> Duration {
        lock.lock().map(|d| *d).unwrap_or(Duration::ZERO)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, config: &ConnectionConfig) -> SftpResult<Arc<dyn RemoteSession>> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let delay = Self::delay(&self.connect_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .scripted_failures
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front());
        if let Some(err) = scripted {
            return Err(err);
        }
        if config.auth_method == AuthMethod::SshKey {
            return Err(SftpError::auth_failed("SSH key authentication is not supported"));
        }
        if let Some(expected) = &self.password {
            if config.password.as_deref() != Some(expected.as_str()) {
                return Err(SftpError::auth_failed(format!(
                    "Authentication failed for user '{}'",
                    config.username
                )));
            }
        }

        let active = Arc::new(AtomicBool::new(true));
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push(active.clone());
        }
        Ok(Arc::new(MemorySession {
            connector: self.clone(),
            active,
        }))
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

pub struct MemorySession {
    connector: MemoryConnector,
    active: Arc<AtomicBool>,
}

impl MemorySession {
    /// Common preamble: optional delay, liveness and injected failures.
    async fn enter(&self, paths: &[&str]) -> SftpResult<()> {
        let delay = MemoryConnector::delay(&self.connector.operation_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !self.is_active() {
            return Err(SftpError::disconnected("Session closed"));
        }
        self.connector.with_tree(|t| {
            paths.iter().try_for_each(|p| t.check(p))
        })
    }
}

#[async_trait]
impl RemoteSession for MemorySession {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn read_dir(&self, path: &str) -> SftpResult<Vec<DirEntry>> {
        self.enter(&[path]).await?;
        self.connector.with_tree(|t| {
            match t.nodes.get(path) {
                None => return Err(SftpError::not_found(path)),
                Some(Node::File { .. }) => {
                    return Err(SftpError::protocol(format!("Not a directory: {}", path)).with_code(4))
                }
                Some(Node::Dir { .. }) => {}
            }
            let dot = Tree::attrs(&Node::Dir { mtime: 0 }, false);
            let mut entries = vec![
                DirEntry { name: ".".into(), attrs: dot.clone() },
                DirEntry { name: "..".into(), attrs: dot },
            ];
            for child in t.children(path) {
                if let Some(node) = t.nodes.get(&child) {
                    entries.push(DirEntry {
                        name: rmount_core::file_name(&child).to_string(),
                        attrs: Tree::attrs(node, true),
                    });
                }
            }
            Ok(entries)
        })
    }

    async fn stat(&self, path: &str) -> SftpResult<FileAttributes> {
        self.enter(&[path]).await?;
        self.connector.with_tree(|t| {
            t.nodes
                .get(path)
                .map(|n| Tree::attrs(n, false))
                .ok_or_else(|| SftpError::not_found(path))
        })
    }

    async fn download(
        &self,
        remote: &str,
        local: &Path,
        progress: &Progress,
        chunk_size: usize,
    ) -> SftpResult<u64> {
        self.enter(&[remote]).await?;
        let data = self.connector.with_tree(|t| {
            t.journal.push(format!("download {}", remote));
            match t.nodes.get(remote) {
                Some(Node::File { data, .. }) => Ok(data.clone()),
                Some(Node::Dir { .. }) => {
                    Err(SftpError::protocol(format!("Is a directory: {}", remote)).with_code(4))
                }
                None => Err(SftpError::not_found(remote)),
            }
        })?;

        let mut out = Vec::with_capacity(data.len());
        for chunk in data.chunks(chunk_size.max(1)) {
            if progress.is_cancelled() {
                return Err(SftpError::cancelled(format!("Download of '{}' cancelled", remote)));
            }
            out.extend_from_slice(chunk);
            progress.advance(chunk.len() as u64);
            tokio::task::yield_now().await;
        }
        if progress.is_cancelled() {
            return Err(SftpError::cancelled(format!("Download of '{}' cancelled", remote)));
        }
        tokio::fs::write(local, &out)
            .await
            .map_err(|e| SftpError::local_io("Local write failed", e))?;
        Ok(out.len() as u64)
    }

    async fn upload(
        &self,
        local: &Path,
        remote: &str,
        progress: &Progress,
        chunk_size: usize,
    ) -> SftpResult<u64> {
        self.enter(&[remote]).await?;
        let data = tokio::fs::read(local)
            .await
            .map_err(|e| SftpError::local_io("Failed to open upload source", e))?;

        self.connector.with_tree(|t| {
            t.require_parent_dir(remote)?;
            if t.is_dir(remote) {
                return Err(SftpError::protocol(format!("Is a directory: {}", remote)).with_code(4));
            }
            Ok(())
        })?;

        let mut written = Vec::with_capacity(data.len());
        for chunk in data.chunks(chunk_size.max(1)) {
            if progress.is_cancelled() {
                return Err(SftpError::cancelled(format!("Upload to '{}' cancelled", remote)));
            }
            written.extend_from_slice(chunk);
            progress.advance(chunk.len() as u64);
            tokio::task::yield_now().await;
        }
        if progress.is_cancelled() {
            return Err(SftpError::cancelled(format!("Upload to '{}' cancelled", remote)));
        }

        let len = written.len() as u64;
        self.connector.with_tree(|t| {
            let mtime = t.tick();
            t.nodes
                .insert(remote.to_string(), Node::File { data: written, mtime });
            t.journal.push(format!("upload {}", remote));
        });
        Ok(len)
    }

    async fn mkdir(&self, path: &str) -> SftpResult<()> {
        self.enter(&[path]).await?;
        self.connector.with_tree(|t| {
            if t.nodes.contains_key(path) {
                return Err(SftpError::protocol(format!("File already exists: {}", path))
                    .with_code(11)
                    .with_path(path));
            }
            t.require_parent_dir(path)?;
            let mtime = t.tick();
            t.nodes.insert(path.to_string(), Node::Dir { mtime });
            t.journal.push(format!("mkdir {}", path));
            Ok(())
        })
    }

    async fn unlink(&self, path: &str) -> SftpResult<()> {
        self.enter(&[path]).await?;
        self.connector.with_tree(|t| match t.nodes.get(path) {
            None => Err(SftpError::not_found(path)),
            Some(Node::Dir { .. }) => {
                Err(SftpError::protocol(format!("Is a directory: {}", path)).with_code(4))
            }
            Some(Node::File { .. }) => {
                t.nodes.remove(path);
                t.journal.push(format!("unlink {}", path));
                Ok(())
            }
        })
    }

    async fn rmdir(&self, path: &str) -> SftpResult<()> {
        self.enter(&[path]).await?;
        self.connector.with_tree(|t| {
            match t.nodes.get(path) {
                None => return Err(SftpError::not_found(path)),
                Some(Node::File { .. }) => {
                    return Err(SftpError::protocol(format!("Not a directory: {}", path)).with_code(4))
                }
                Some(Node::Dir { .. }) => {}
            }
            if !t.children(path).is_empty() {
                // OpenSSH answers a non-empty rmdir with a bare SSH_FX_FAILURE
                return Err(SftpError::protocol("Failure").with_code(4).with_path(path));
            }
            t.nodes.remove(path);
            t.journal.push(format!("rmdir {}", path));
            Ok(())
        })
    }

    async fn rename(&self, from: &str, to: &str) -> SftpResult<()> {
        self.enter(&[from, to]).await?;
        self.connector.with_tree(|t| {
            if !t.nodes.contains_key(from) {
                return Err(SftpError::not_found(from));
            }
            t.require_parent_dir(to)?;
            if t.nodes.contains_key(to) {
                return Err(SftpError::protocol(format!("File already exists: {}", to))
                    .with_code(11)
                    .with_path(to));
            }
            let prefix = format!("{}/", from.trim_end_matches('/'));
            let moved: Vec<String> = t
                .nodes
                .keys()
                .filter(|k| k.as_str() == from || k.starts_with(&prefix))
                .cloned()
                .collect();
            for old in moved {
                if let Some(node) = t.nodes.remove(&old) {
                    let new = format!("{}{}", to, &old[from.len()..]);
                    t.nodes.insert(new, node);
                }
            }
            t.journal.push(format!("rename {} -> {}", from, to));
            Ok(())
        })
    }

    async fn close(&self) -> SftpResult<()> {
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rename_moves_subtree() {
        let connector = MemoryConnector::new();
        connector.add_file("/a/b/c.txt", b"x");
        let session = connector
            .connect(&ConnectionConfig::new("m", "u"))
            .await
            .unwrap();
        session.rename("/a", "/z").await.unwrap();
        assert!(connector.exists("/z/b/c.txt"));
        assert!(!connector.exists("/a"));
        assert_eq!(connector.journal(), vec!["rename /a -> /z"]);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let connector = MemoryConnector::new();
        connector.add_file("/locked", b"");
        connector.fail_on("/locked", SftpError::permission_denied("/locked"));
        let session = connector
            .connect(&ConnectionConfig::new("m", "u"))
            .await
            .unwrap();
        assert!(session.unlink("/locked").await.is_err());
        assert!(connector.exists("/locked"));
    }

    #[tokio::test]
    async fn test_closed_session_is_disconnected() {
        let connector = MemoryConnector::new();
        let session = connector
            .connect(&ConnectionConfig::new("m", "u"))
            .await
            .unwrap();
        session.close().await.unwrap();
        let err = session.stat("/").await.err().unwrap();
        assert_eq!(err.kind, rmount_core::SftpErrorKind::Disconnected);
    }
}
