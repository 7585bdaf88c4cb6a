// ── Types ─────────────────────────────────────────────────────────────────────

use rmount_core::normalize_path;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Serde default helpers ────────────────────────────────────────────────────

fn default_port() -> u16 {
    23
}
fn default_base_path() -> String {
    "/".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_max_connect_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_keepalive_secs() -> u64 {
    60
}
fn default_chunk_size() -> usize {
    1_048_576 // 1 MiB
}

// ── Connection ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AuthMethod {
    #[default]
    Password,
    SshKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auth_method: AuthMethod,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_connect_attempts")]
    pub max_connect_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_interval_secs: u64,
    /// Deadline for each remote operation; none when unset.
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: username.into(),
            password: None,
            auth_method: AuthMethod::Password,
            base_path: default_base_path(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_connect_attempts: default_max_connect_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            keepalive_interval_secs: default_keepalive_secs(),
            operation_timeout_secs: None,
            chunk_size: default_chunk_size(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base path as an absolute normalized path (`/` when empty).
    pub fn normalized_base_path(&self) -> String {
        normalize_path(&self.base_path)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

// ── Raw protocol attributes ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAttributes {
    pub size: Option<u64>,
    pub perm: Option<u32>,
    pub mtime: Option<u64>,
    /// Explicit type flag when the backend has one; otherwise `perm` decides.
    pub is_dir: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub attrs: FileAttributes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg: ConnectionConfig =
            serde_json::from_str(r#"{"host":"nas.local","username":"u1"}"#).unwrap();
        assert_eq!(cfg.port, 23);
        assert_eq!(cfg.auth_method, AuthMethod::Password);
        assert_eq!(cfg.base_path, "/");
        assert_eq!(cfg.max_connect_attempts, 3);
        assert_eq!(cfg.initial_backoff(), Duration::from_millis(500));
        assert_eq!(cfg.operation_timeout(), None);
        assert_eq!(cfg.chunk_size(), 1_048_576);
    }

    #[test]
    fn test_auth_method_wire_names() {
        let cfg: ConnectionConfig = serde_json::from_str(
            r#"{"host":"h","username":"u","authMethod":"sshKey","operationTimeoutSecs":5}"#,
        )
        .unwrap();
        assert_eq!(cfg.auth_method, AuthMethod::SshKey);
        assert_eq!(cfg.operation_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_normalized_base_path() {
        let cfg = ConnectionConfig::new("h", "u").with_base_path("home/u1/");
        assert_eq!(cfg.normalized_base_path(), "/home/u1");
        let cfg = ConnectionConfig::new("h", "u").with_base_path("");
        assert_eq!(cfg.normalized_base_path(), "/");
        assert_eq!(cfg.address(), "h:23");
    }
}
