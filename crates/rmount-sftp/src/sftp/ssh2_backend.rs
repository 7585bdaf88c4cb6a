// ── ssh2 (libssh2) backend ───────────────────────────────────────────────────
//
// libssh2 is blocking; every call runs on the blocking pool and the SFTP
// channel is serialised behind a std mutex.

use crate::sftp::session::{Connector, RemoteSession};
use crate::sftp::types::*;
use async_trait::async_trait;
use log::{debug, info, warn};
use rmount_core::{Progress, SftpError, SftpErrorKind, SftpResult};
use ssh2::{ErrorCode, OpenFlags, OpenType, Session, Sftp};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

// ── libssh2 status codes ─────────────────────────────────────────────────────

const LIBSSH2_ERROR_SOCKET_SEND: i32 = -7;
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_SOCKET_DISCONNECT: i32 = -13;
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;
const LIBSSH2_ERROR_CHANNEL_CLOSED: i32 = -26;
const LIBSSH2_ERROR_SOCKET_TIMEOUT: i32 = -30;
const LIBSSH2_ERROR_SOCKET_RECV: i32 = -43;

const LIBSSH2_FX_NO_SUCH_FILE: i32 = 2;
const LIBSSH2_FX_PERMISSION_DENIED: i32 = 3;
const LIBSSH2_FX_NO_CONNECTION: i32 = 6;
const LIBSSH2_FX_CONNECTION_LOST: i32 = 7;
const LIBSSH2_FX_NO_SUCH_PATH: i32 = 10;
const LIBSSH2_FX_DIR_NOT_EMPTY: i32 = 18;

/// Map a libssh2 error to a categorised transport error.
pub fn map_ssh2_error(e: ssh2::Error) -> SftpError {
    let (kind, code) = match e.code() {
        ErrorCode::SFTP(code) => {
            let kind = match code {
                LIBSSH2_FX_NO_SUCH_FILE | LIBSSH2_FX_NO_SUCH_PATH => SftpErrorKind::NotFound,
                LIBSSH2_FX_PERMISSION_DENIED => SftpErrorKind::PermissionDenied,
                LIBSSH2_FX_NO_CONNECTION | LIBSSH2_FX_CONNECTION_LOST => SftpErrorKind::Disconnected,
                LIBSSH2_FX_DIR_NOT_EMPTY => SftpErrorKind::DirectoryNotEmpty,
                _ => SftpErrorKind::Protocol,
            };
            (kind, code)
        }
        ErrorCode::Session(code) => {
            let kind = match code {
                LIBSSH2_ERROR_AUTHENTICATION_FAILED => SftpErrorKind::AuthFailed,
                LIBSSH2_ERROR_TIMEOUT | LIBSSH2_ERROR_SOCKET_TIMEOUT => SftpErrorKind::Timeout,
                LIBSSH2_ERROR_SOCKET_DISCONNECT
                | LIBSSH2_ERROR_SOCKET_SEND
                | LIBSSH2_ERROR_SOCKET_RECV
                | LIBSSH2_ERROR_CHANNEL_CLOSED => SftpErrorKind::Disconnected,
                _ => SftpErrorKind::Unknown,
            };
            (kind, code)
        }
    };
    SftpError::new(kind, e.message().to_string()).with_code(code)
}

fn lock_sftp(sftp: &StdMutex<Sftp>) -> SftpResult<std::sync::MutexGuard<'_, Sftp>> {
    sftp.lock()
        .map_err(|_| SftpError::disconnected("SFTP channel lock poisoned"))
}

// ── Connector ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct Ssh2Connector;

#[async_trait]
impl Connector for Ssh2Connector {
    async fn connect(&self, config: &ConnectionConfig) -> SftpResult<Arc<dyn RemoteSession>> {
        let config = config.clone();
        let session = tokio::task::spawn_blocking(move || Ssh2Session::open(&config))
            .await
            .map_err(|e| SftpError::connection_failed(format!("Connect task failed: {}", e)))??;
        Ok(Arc::new(session))
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

pub struct Ssh2Session {
    session: Session,
    sftp: Arc<StdMutex<Sftp>>,
    #[allow(dead_code)] // held to keep the TCP connection alive
    tcp: TcpStream,
    active: Arc<AtomicBool>,
    keepalive: bool,
}

impl Ssh2Session {
    /// Resolve, connect, handshake and authenticate (blocking).
    pub fn open(config: &ConnectionConfig) -> SftpResult<Self> {
        if config.auth_method == AuthMethod::SshKey {
            return Err(SftpError::auth_failed("SSH key authentication is not supported"));
        }
        let password = config
            .password
            .as_deref()
            .ok_or_else(|| SftpError::auth_failed("No password configured"))?;

        let addr = config.address();
        info!("SFTP connecting to {}", addr);
        let tcp = Self::connect_tcp(config)?;

        let mut session = Session::new().map_err(map_ssh2_error)?;
        session.set_tcp_stream(
            tcp.try_clone()
                .map_err(|e| SftpError::local_io("Failed to clone TCP stream", e))?,
        );
        session.set_timeout(millis(config.connect_timeout_secs.saturating_mul(1000)));
        session.handshake().map_err(|e| {
            let err = map_ssh2_error(e);
            SftpError::new(
                if err.kind == SftpErrorKind::Unknown {
                    SftpErrorKind::ConnectionFailed
                } else {
                    err.kind
                },
                format!("SSH handshake failed: {}", err.message),
            )
        })?;

        let method = Self::authenticate(&session, &config.username, password)?;
        info!("SFTP authenticated to {} via {}", addr, method);

        let keepalive = config.keepalive_interval_secs;
        session.set_keepalive(keepalive > 0, u32::try_from(keepalive).unwrap_or(u32::MAX));
        session.set_timeout(io_timeout_ms(config));

        let sftp = session.sftp().map_err(map_ssh2_error)?;

        Ok(Self {
            session,
            sftp: Arc::new(StdMutex::new(sftp)),
            tcp,
            active: Arc::new(AtomicBool::new(true)),
            keepalive: keepalive > 0,
        })
    }

    fn connect_tcp(config: &ConnectionConfig) -> SftpResult<TcpStream> {
        let addrs: Vec<_> = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| {
                SftpError::dns_failed(format!("Could not resolve host '{}': {}", config.host, e))
            })?
            .collect();
        if addrs.is_empty() {
            return Err(SftpError::dns_failed(format!(
                "Could not resolve host '{}': no addresses",
                config.host
            )));
        }

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, config.connect_timeout()) {
                Ok(tcp) => {
                    tcp.set_nonblocking(false)
                        .map_err(|e| SftpError::local_io("Failed to set blocking mode", e))?;
                    return Ok(tcp);
                }
                Err(e) => {
                    debug!("TCP connection to {} failed: {}", addr, e);
                    let mut err = SftpError::from(e);
                    err.message = format!("TCP connection to {} failed: {}", addr, err.message);
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| SftpError::connection_failed("No address to connect to")))
    }

    fn authenticate(session: &Session, username: &str, password: &str) -> SftpResult<&'static str> {
        let password_result = session.userauth_password(username, password);
        if password_result.is_ok() && session.authenticated() {
            return Ok("password");
        }

        struct PasswordPrompt {
            password: String,
        }

        impl ssh2::KeyboardInteractivePrompt for PasswordPrompt {
            fn prompt(
                &mut self,
                _username: &str,
                _instructions: &str,
                prompts: &[ssh2::Prompt],
            ) -> Vec<String> {
                prompts.iter().map(|_| self.password.clone()).collect()
            }
        }

        let mut prompt = PasswordPrompt {
            password: password.to_string(),
        };
        if session
            .userauth_keyboard_interactive(username, &mut prompt)
            .is_ok()
            && session.authenticated()
        {
            return Ok("keyboard-interactive");
        }

        let detail = password_result
            .err()
            .map(|e| e.message().to_string())
            .unwrap_or_else(|| "not authenticated".to_string());
        Err(SftpError::auth_failed(format!(
            "Authentication failed for user '{}': {}",
            username, detail
        )))
    }

    /// Run a blocking closure against the SFTP channel, sending a keepalive
    /// first when one is due. Session-fatal failures mark the session
    /// inactive.
    async fn blocking<T, F>(&self, f: F) -> SftpResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Sftp) -> SftpResult<T> + Send + 'static,
    {
        let sftp = self.sftp.clone();
        let session = self.keepalive.then(|| self.session.clone());
        let result = tokio::task::spawn_blocking(move || {
            let guard = lock_sftp(&sftp)?;
            if let Some(session) = session {
                // libssh2 only sends once the configured interval has elapsed
                session.keepalive_send().map_err(|e| {
                    SftpError::disconnected(format!("Keepalive failed: {}", e.message()))
                })?;
            }
            f(&*guard)
        })
        .await
        .map_err(|e| SftpError::new(SftpErrorKind::Unknown, format!("Blocking task failed: {}", e)))?;

        if let Err(ref e) = result {
            if e.is_session_fatal() {
                warn!("SFTP session marked inactive: {}", e);
                self.active.store(false, Ordering::SeqCst);
            }
        }
        result
    }
}

fn millis(ms: u64) -> u32 {
    u32::try_from(ms).unwrap_or(u32::MAX)
}

/// Blocking I/O timeout for an established session. Without an operation
/// deadline a dead link is detected after three missed keepalive intervals;
/// zero (wait forever) only when both are disabled.
pub(crate) fn io_timeout_ms(config: &ConnectionConfig) -> u32 {
    match config.operation_timeout_secs.filter(|s| *s > 0) {
        Some(secs) => millis(secs.saturating_mul(1000)),
        None => millis(config.keepalive_interval_secs.saturating_mul(3_000)),
    }
}

fn to_attributes(stat: &ssh2::FileStat) -> FileAttributes {
    FileAttributes {
        size: stat.size,
        perm: stat.perm,
        mtime: stat.mtime,
        is_dir: None,
    }
}

#[async_trait]
impl RemoteSession for Ssh2Session {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn read_dir(&self, path: &str) -> SftpResult<Vec<DirEntry>> {
        let path = path.to_string();
        self.blocking(move |sftp| {
            let raw = sftp
                .readdir(Path::new(&path))
                .map_err(|e| map_ssh2_error(e).with_path(&path))?;
            Ok(raw
                .into_iter()
                .map(|(entry, stat)| DirEntry {
                    name: entry
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    attrs: to_attributes(&stat),
                })
                .collect())
        })
        .await
    }

    async fn stat(&self, path: &str) -> SftpResult<FileAttributes> {
        let path = path.to_string();
        self.blocking(move |sftp| {
            sftp.stat(Path::new(&path))
                .map(|s| to_attributes(&s))
                .map_err(|e| map_ssh2_error(e).with_path(&path))
        })
        .await
    }

    async fn download(
        &self,
        remote: &str,
        local: &Path,
        progress: &Progress,
        chunk_size: usize,
    ) -> SftpResult<u64> {
        let remote = remote.to_string();
        let local: PathBuf = local.to_path_buf();
        let progress = progress.clone();
        self.blocking(move |sftp| {
            let cancelled = || {
                SftpError::cancelled(format!("Download of '{}' cancelled", remote)).with_path(&remote)
            };
            // The caller may have given up (and removed the temp path) while
            // this task was queued; never recreate the file then.
            if progress.is_cancelled() {
                return Err(cancelled());
            }
            let mut remote_file = sftp
                .open(Path::new(&remote))
                .map_err(|e| map_ssh2_error(e).with_path(&remote))?;
            let mut local_file = std::fs::File::create(&local)
                .map_err(|e| SftpError::local_io("Failed to open local file", e))?;

            let mut buf = vec![0u8; chunk_size.max(1)];
            let mut transferred: u64 = 0;
            loop {
                if progress.is_cancelled() {
                    drop(local_file);
                    if let Err(e) = std::fs::remove_file(&local) {
                        debug!("Could not remove cancelled download {}: {}", local.display(), e);
                    }
                    return Err(cancelled());
                }
                let n = remote_file
                    .read(&mut buf)
                    .map_err(|e| SftpError::from(e).with_path(&remote))?;
                if n == 0 {
                    break;
                }
                local_file
                    .write_all(&buf[..n])
                    .map_err(|e| SftpError::local_io("Local write failed", e))?;
                transferred += n as u64;
                progress.advance(n as u64);
            }
            local_file
                .flush()
                .map_err(|e| SftpError::local_io("Local flush failed", e))?;
            Ok(transferred)
        })
        .await
    }

    async fn upload(
        &self,
        local: &Path,
        remote: &str,
        progress: &Progress,
        chunk_size: usize,
    ) -> SftpResult<u64> {
        let remote = remote.to_string();
        let local: PathBuf = local.to_path_buf();
        let progress = progress.clone();
        self.blocking(move |sftp| {
            let mut local_file = std::fs::File::open(&local)
                .map_err(|e| SftpError::local_io("Failed to open upload source", e))?;
            let mut remote_file = sftp
                .open_mode(
                    Path::new(&remote),
                    OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                    0o644,
                    OpenType::File,
                )
                .map_err(|e| map_ssh2_error(e).with_path(&remote))?;

            let mut buf = vec![0u8; chunk_size.max(1)];
            let mut transferred: u64 = 0;
            loop {
                if progress.is_cancelled() {
                    return Err(SftpError::cancelled(format!("Upload to '{}' cancelled", remote))
                        .with_path(&remote));
                }
                let n = local_file
                    .read(&mut buf)
                    .map_err(|e| SftpError::local_io("Local read failed", e))?;
                if n == 0 {
                    break;
                }
                remote_file
                    .write_all(&buf[..n])
                    .map_err(|e| SftpError::from(e).with_path(&remote))?;
                transferred += n as u64;
                progress.advance(n as u64);
            }
            Ok(transferred)
        })
        .await
    }

    async fn mkdir(&self, path: &str) -> SftpResult<()> {
        let path = path.to_string();
        self.blocking(move |sftp| {
            sftp.mkdir(Path::new(&path), 0o755)
                .map_err(|e| map_ssh2_error(e).with_path(&path))
        })
        .await
    }

    async fn unlink(&self, path: &str) -> SftpResult<()> {
        let path = path.to_string();
        self.blocking(move |sftp| {
            sftp.unlink(Path::new(&path))
                .map_err(|e| map_ssh2_error(e).with_path(&path))
        })
        .await
    }

    async fn rmdir(&self, path: &str) -> SftpResult<()> {
        let path = path.to_string();
        self.blocking(move |sftp| {
            sftp.rmdir(Path::new(&path))
                .map_err(|e| map_ssh2_error(e).with_path(&path))
        })
        .await
    }

    async fn rename(&self, from: &str, to: &str) -> SftpResult<()> {
        let from = from.to_string();
        let to = to.to_string();
        self.blocking(move |sftp| {
            sftp.rename(Path::new(&from), Path::new(&to), None)
                .map_err(|e| map_ssh2_error(e).with_path(&from))
        })
        .await
    }

    async fn close(&self) -> SftpResult<()> {
        self.active.store(false, Ordering::SeqCst);
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || {
            session
                .disconnect(None, "Client disconnecting", None)
                .map_err(map_ssh2_error)
        })
        .await
        .map_err(|e| SftpError::new(SftpErrorKind::Unknown, format!("Blocking task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_sftp_status_codes() {
        let e = map_ssh2_error(ssh2::Error::new(ErrorCode::SFTP(2), "no such file"));
        assert_eq!(e.kind, SftpErrorKind::NotFound);
        assert_eq!(e.code, Some(2));
        let e = map_ssh2_error(ssh2::Error::new(ErrorCode::SFTP(3), "denied"));
        assert_eq!(e.kind, SftpErrorKind::PermissionDenied);
        let e = map_ssh2_error(ssh2::Error::new(ErrorCode::SFTP(7), "lost"));
        assert_eq!(e.kind, SftpErrorKind::Disconnected);
        let e = map_ssh2_error(ssh2::Error::new(ErrorCode::SFTP(4), "failure"));
        assert_eq!(e.kind, SftpErrorKind::Protocol);
    }

    #[test]
    fn test_map_session_codes() {
        let e = map_ssh2_error(ssh2::Error::new(ErrorCode::Session(-18), "auth"));
        assert_eq!(e.kind, SftpErrorKind::AuthFailed);
        let e = map_ssh2_error(ssh2::Error::new(ErrorCode::Session(-9), "timeout"));
        assert_eq!(e.kind, SftpErrorKind::Timeout);
        let e = map_ssh2_error(ssh2::Error::new(ErrorCode::Session(-13), "gone"));
        assert!(e.is_session_fatal());
    }

    #[test]
    fn test_ssh_key_auth_is_rejected() {
        let mut cfg = ConnectionConfig::new("127.0.0.1", "u").with_password("p");
        cfg.auth_method = AuthMethod::SshKey;
        let err = Ssh2Session::open(&cfg).err().unwrap();
        assert_eq!(err.kind, SftpErrorKind::AuthFailed);
    }

    #[test]
    fn test_missing_password_is_auth_error() {
        let cfg = ConnectionConfig::new("127.0.0.1", "u");
        let err = Ssh2Session::open(&cfg).err().unwrap();
        assert_eq!(err.kind, SftpErrorKind::AuthFailed);
    }

    #[test]
    fn test_unresolvable_host_is_dns_error() {
        let cfg = ConnectionConfig::new("no-such-host.invalid", "u").with_password("p");
        let err = Ssh2Session::open(&cfg).err().unwrap();
        assert_eq!(err.kind, SftpErrorKind::DnsFailed);
    }

    #[test]
    fn test_io_timeout_follows_keepalive_without_deadline() {
        let mut cfg = ConnectionConfig::new("h", "u");
        assert_eq!(io_timeout_ms(&cfg), 180_000);

        cfg.operation_timeout_secs = Some(5);
        assert_eq!(io_timeout_ms(&cfg), 5_000);

        cfg.operation_timeout_secs = None;
        cfg.keepalive_interval_secs = 0;
        assert_eq!(io_timeout_ms(&cfg), 0);
    }
}
