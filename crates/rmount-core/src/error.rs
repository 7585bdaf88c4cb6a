//! Error types for the transport layer and the host-facing taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

// ── Raw transport / protocol errors ──────────────────────────────────────────

/// Categorised SFTP failure as surfaced by sessions, the connection manager
/// and remote operations. Never shown to the host without classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpError {
    pub kind: SftpErrorKind,
    pub message: String,
    /// Remote path the failing operation targeted, if any.
    pub path: Option<String>,
    /// Native status code (libssh2 session error or SFTP status).
    pub code: Option<i32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SftpErrorKind {
    /// TCP connect refused or handshake failed.
    ConnectionFailed,
    /// Hostname could not be resolved.
    DnsFailed,
    /// Credentials rejected or no usable auth method.
    AuthFailed,
    Timeout,
    /// Transport closed or reset mid-operation.
    Disconnected,
    NotFound,
    PermissionDenied,
    DirectoryNotEmpty,
    /// Transfer cancelled by the caller.
    Cancelled,
    /// Local-side I/O failure (temp files, reads of upload sources).
    Io,
    /// No session could be handed out.
    NotConnected,
    /// Server replied with an unexpected failure status.
    Protocol,
    Unknown,
}

pub type SftpResult<T> = Result<T, SftpError>;

impl SftpError {
    pub fn new(kind: SftpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            path: None,
            code: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(SftpErrorKind::ConnectionFailed, msg)
    }

    pub fn dns_failed(msg: impl Into<String>) -> Self {
        Self::new(SftpErrorKind::DnsFailed, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(SftpErrorKind::AuthFailed, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(SftpErrorKind::Timeout, msg)
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::new(SftpErrorKind::Disconnected, msg)
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(SftpErrorKind::NotFound, format!("No such file: {}", path)).with_path(path)
    }

    pub fn permission_denied(path: &str) -> Self {
        Self::new(SftpErrorKind::PermissionDenied, format!("Permission denied: {}", path))
            .with_path(path)
    }

    pub fn directory_not_empty(path: &str) -> Self {
        Self::new(
            SftpErrorKind::DirectoryNotEmpty,
            format!("Directory not empty: {}", path),
        )
        .with_path(path)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(SftpErrorKind::Cancelled, msg)
    }

    pub fn not_connected(msg: impl Into<String>) -> Self {
        Self::new(SftpErrorKind::NotConnected, msg)
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::new(SftpErrorKind::Protocol, msg)
    }

    /// Failure on the local side (temp files, upload sources). Always
    /// `Io`, so a missing local file is never mistaken for a missing
    /// remote item.
    pub fn local_io(context: &str, e: io::Error) -> Self {
        Self::new(SftpErrorKind::Io, format!("{}: {}", context, e))
    }

    /// True when the session that produced this error should not be reused.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self.kind,
            SftpErrorKind::Disconnected | SftpErrorKind::Timeout | SftpErrorKind::ConnectionFailed
        )
    }
}

impl fmt::Display for SftpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[SFTP {:?} {}] {}", self.kind, code, self.message),
            None => write!(f, "[SFTP {:?}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for SftpError {}

impl From<io::Error> for SftpError {
    fn from(e: io::Error) -> Self {
        let kind = match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => SftpErrorKind::Timeout,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => SftpErrorKind::Disconnected,
            io::ErrorKind::ConnectionRefused => SftpErrorKind::ConnectionFailed,
            io::ErrorKind::NotFound => SftpErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => SftpErrorKind::PermissionDenied,
            _ => SftpErrorKind::Io,
        };
        Self::new(kind, e.to_string())
    }
}

// ── Host-facing taxonomy ─────────────────────────────────────────────────────

/// The closed set of failures the host framework must handle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProviderErrorKind {
    NotAuthenticated,
    NoSuchItem,
    DirectoryNotEmpty,
    ServerUnreachable,
}

/// Finer-grained reason behind a classified failure; drives the
/// user-facing message only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FailureDetail {
    AuthenticationFailed,
    NotConfigured,
    PermissionDenied,
    NotFound,
    ConnectionClosed,
    ConnectionRefused,
    Timeout,
    NetworkUnreachable,
    DnsFailure,
    Interrupted,
    DirectoryNotEmpty,
    Unrecognized,
}

impl FailureDetail {
    pub fn kind(self) -> ProviderErrorKind {
        match self {
            FailureDetail::AuthenticationFailed | FailureDetail::NotConfigured => {
                ProviderErrorKind::NotAuthenticated
            }
            FailureDetail::NotFound => ProviderErrorKind::NoSuchItem,
            FailureDetail::DirectoryNotEmpty => ProviderErrorKind::DirectoryNotEmpty,
            _ => ProviderErrorKind::ServerUnreachable,
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            FailureDetail::AuthenticationFailed => {
                "Authentication failed. Please check your username and password."
            }
            FailureDetail::NotConfigured => {
                "No server is configured. Please add a server in settings."
            }
            FailureDetail::PermissionDenied => "Permission denied. Please check your access rights.",
            FailureDetail::NotFound => "The requested file or directory does not exist.",
            FailureDetail::ConnectionClosed => "The connection to the server was closed unexpectedly.",
            FailureDetail::ConnectionRefused => {
                "Could not connect to the server. Please check the host and port."
            }
            FailureDetail::Timeout => "Connection timed out. The server may be unreachable.",
            FailureDetail::NetworkUnreachable => {
                "The server is unreachable. Please check your network connection."
            }
            FailureDetail::DnsFailure => "Could not resolve hostname. Please check the host address.",
            FailureDetail::Interrupted => "The connection was interrupted. Please try again.",
            FailureDetail::DirectoryNotEmpty => "The directory is not empty.",
            FailureDetail::Unrecognized => "An unexpected error occurred. Please try again.",
        }
    }
}

/// A classified failure as returned to the host framework.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub detail: FailureDetail,
    /// User-facing explanation; never the raw transport text.
    pub message: String,
}

pub type ProviderResult<T> = Result<T, ProviderError>;

impl ProviderError {
    pub fn from_detail(detail: FailureDetail) -> Self {
        Self {
            kind: detail.kind(),
            detail,
            message: detail.user_message().to_string(),
        }
    }

    pub fn not_configured() -> Self {
        Self::from_detail(FailureDetail::NotConfigured)
    }

    pub fn no_such_item() -> Self {
        Self::from_detail(FailureDetail::NotFound)
    }

    pub fn directory_not_empty() -> Self {
        Self::from_detail(FailureDetail::DirectoryNotEmpty)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ProviderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_code() {
        let e = SftpError::protocol("boom").with_code(4);
        assert_eq!(e.to_string(), "[SFTP Protocol 4] boom");
        let e = SftpError::timeout("slow");
        assert_eq!(e.to_string(), "[SFTP Timeout] slow");
    }

    #[test]
    fn test_from_io_error_kinds() {
        let e: SftpError = io::Error::new(io::ErrorKind::TimedOut, "t").into();
        assert_eq!(e.kind, SftpErrorKind::Timeout);
        let e: SftpError = io::Error::new(io::ErrorKind::ConnectionReset, "r").into();
        assert_eq!(e.kind, SftpErrorKind::Disconnected);
        let e: SftpError = io::Error::new(io::ErrorKind::ConnectionRefused, "c").into();
        assert_eq!(e.kind, SftpErrorKind::ConnectionFailed);
        let e: SftpError = io::Error::new(io::ErrorKind::Other, "o").into();
        assert_eq!(e.kind, SftpErrorKind::Io);
    }

    #[test]
    fn test_local_io_is_io_with_context() {
        let e = SftpError::local_io("open temp", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(e.kind, SftpErrorKind::Io);
        assert!(e.message.starts_with("open temp: "));
    }

    #[test]
    fn test_session_fatal_kinds() {
        assert!(SftpError::disconnected("x").is_session_fatal());
        assert!(SftpError::timeout("x").is_session_fatal());
        assert!(!SftpError::not_found("/x").is_session_fatal());
    }

    #[test]
    fn test_detail_to_taxonomy() {
        assert_eq!(FailureDetail::AuthenticationFailed.kind(), ProviderErrorKind::NotAuthenticated);
        assert_eq!(FailureDetail::NotConfigured.kind(), ProviderErrorKind::NotAuthenticated);
        assert_eq!(FailureDetail::NotFound.kind(), ProviderErrorKind::NoSuchItem);
        assert_eq!(FailureDetail::DirectoryNotEmpty.kind(), ProviderErrorKind::DirectoryNotEmpty);
        assert_eq!(FailureDetail::PermissionDenied.kind(), ProviderErrorKind::ServerUnreachable);
        assert_eq!(FailureDetail::DnsFailure.kind(), ProviderErrorKind::ServerUnreachable);
    }

    #[test]
    fn test_provider_error_carries_user_message() {
        let e = ProviderError::directory_not_empty();
        assert_eq!(e.kind, ProviderErrorKind::DirectoryNotEmpty);
        assert_eq!(e.message, "The directory is not empty.");
    }
}
