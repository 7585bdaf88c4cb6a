// ── Legacy single-target record ──────────────────────────────────────────────
//
// Earlier installs kept exactly one server under flat `sftp_*` keys. The
// registry converts it once into a regular target.

use crate::targets::target::RemoteTarget;
use rmount_sftp::sftp::AuthMethod;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyTarget {
    #[serde(rename = "sftp_host", default)]
    pub host: String,
    #[serde(rename = "sftp_port", default)]
    pub port: i64,
    #[serde(rename = "sftp_username", default)]
    pub username: String,
    #[serde(rename = "sftp_auth_method", default)]
    pub auth_method: Option<AuthMethod>,
    #[serde(rename = "sftp_base_path", default)]
    pub base_path: String,
}

impl LegacyTarget {
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && !self.username.is_empty()
    }

    /// Fresh target named after the host; unset or out-of-range ports fall
    /// back to 23, an empty base path to `/`.
    pub fn into_target(self) -> RemoteTarget {
        let port = u16::try_from(self.port)
            .ok()
            .filter(|p| *p > 0)
            .unwrap_or(23);
        let base_path = if self.base_path.is_empty() {
            "/".to_string()
        } else {
            self.base_path
        };
        let mut target = RemoteTarget::new(self.host.clone(), self.host, self.username)
            .with_port(port)
            .with_base_path(base_path);
        target.auth_method = self.auth_method.unwrap_or_default();
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_keys() {
        let json = r#"{
            "sftp_host": "u1.example.net",
            "sftp_port": 0,
            "sftp_username": "u1",
            "sftp_auth_method": "sshKey",
            "sftp_base_path": ""
        }"#;
        let legacy: LegacyTarget = serde_json::from_str(json).unwrap();
        assert!(legacy.is_valid());
        let t = legacy.into_target();
        assert_eq!(t.display_name, "u1.example.net");
        assert_eq!(t.port, 23);
        assert_eq!(t.base_path, "/");
        assert_eq!(t.auth_method, AuthMethod::SshKey);
    }

    #[test]
    fn test_missing_username_is_invalid() {
        let legacy: LegacyTarget = serde_json::from_str(r#"{"sftp_host": "h"}"#).unwrap();
        assert!(!legacy.is_valid());
    }

    #[test]
    fn test_explicit_port_kept() {
        let legacy: LegacyTarget =
            serde_json::from_str(r#"{"sftp_host": "h", "sftp_username": "u", "sftp_port": 2222}"#)
                .unwrap();
        assert_eq!(legacy.into_target().port, 2222);
    }
}
