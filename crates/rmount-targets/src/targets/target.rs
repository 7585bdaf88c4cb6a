// ── RemoteTarget – one persisted server record ───────────────────────────────

use crate::targets::credentials::account_key;
use crate::targets::error::{RegistryError, RegistryResult};
use rmount_core::normalize_path;
use rmount_sftp::sftp::{AuthMethod, ConnectionConfig};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_port() -> u16 {
    23
}
fn default_base_path() -> String {
    "/".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTarget {
    pub id: Uuid,
    pub display_name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub auth_method: AuthMethod,
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl RemoteTarget {
    pub fn new(
        display_name: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            host: host.into(),
            port: default_port(),
            username: username.into(),
            auth_method: AuthMethod::Password,
            base_path: default_base_path(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub(crate) fn validate(&self) -> RegistryResult<()> {
        if self.host.trim().is_empty() {
            return Err(RegistryError::InvalidTarget("host is empty".into()));
        }
        if self.username.trim().is_empty() {
            return Err(RegistryError::InvalidTarget("username is empty".into()));
        }
        if self.port == 0 {
            return Err(RegistryError::InvalidTarget("port must be positive".into()));
        }
        Ok(())
    }

    /// `/` when unset, otherwise the normalized absolute path.
    pub fn effective_base_path(&self) -> String {
        normalize_path(&self.base_path)
    }

    /// Credential-store account under which this target's password lives.
    pub fn account_key(&self) -> String {
        account_key(&self.id, &self.username)
    }

    pub fn connection_config(&self, password: Option<String>) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(&self.host, &self.username)
            .with_base_path(self.effective_base_path());
        config.port = self.port;
        config.auth_method = self.auth_method;
        config.password = password;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let json = r#"{
            "id": "6f1c2b1e-9d43-4a8e-9b59-0c7d1f8a2e11",
            "displayName": "Box",
            "host": "u1.example.com",
            "username": "u1"
        }"#;
        let t: RemoteTarget = serde_json::from_str(json).unwrap();
        assert_eq!(t.port, 23);
        assert_eq!(t.base_path, "/");
        assert_eq!(t.auth_method, AuthMethod::Password);
        assert!(t.is_valid());
    }

    #[test]
    fn test_validation() {
        assert!(!RemoteTarget::new("x", "", "u").is_valid());
        assert!(!RemoteTarget::new("x", "h", " ").is_valid());
        assert!(!RemoteTarget::new("x", "h", "u").with_port(0).is_valid());
        assert!(RemoteTarget::new("x", "h", "u").with_port(22).is_valid());
    }

    #[test]
    fn test_effective_base_path() {
        assert_eq!(RemoteTarget::new("x", "h", "u").with_base_path("").effective_base_path(), "/");
        assert_eq!(
            RemoteTarget::new("x", "h", "u").with_base_path("home/u/").effective_base_path(),
            "/home/u"
        );
    }

    #[test]
    fn test_connection_config() {
        let t = RemoteTarget::new("Box", "h", "u")
            .with_port(2222)
            .with_base_path("/data/");
        let c = t.connection_config(Some("pw".into()));
        assert_eq!(c.host, "h");
        assert_eq!(c.port, 2222);
        assert_eq!(c.username, "u");
        assert_eq!(c.password.as_deref(), Some("pw"));
        assert_eq!(c.base_path, "/data");
    }

    #[test]
    fn test_account_key_uses_uppercase_id() {
        let mut t = RemoteTarget::new("Box", "h", "alice");
        t.id = Uuid::parse_str("6f1c2b1e-9d43-4a8e-9b59-0c7d1f8a2e11").unwrap();
        assert_eq!(t.account_key(), "6F1C2B1E-9D43-4A8E-9B59-0C7D1F8A2E11-alice");
    }
}
