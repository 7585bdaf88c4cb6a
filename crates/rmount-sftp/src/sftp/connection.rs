// ── ConnectionManager – one reconnecting session per target ─────────────────

use crate::sftp::session::{Connector, RemoteSession};
use crate::sftp::types::ConnectionConfig;
use log::{debug, info, warn};
use rmount_core::{SftpError, SftpResult};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock as StdRwLock};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "reason")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Errored(String),
}

/// Owns the single session for one remote target.
///
/// The session slot is a tokio mutex held for the whole connect/retry loop,
/// so at most one connection attempt is in flight and concurrent callers
/// wait for its outcome instead of racing their own.
pub struct ConnectionManager {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    session: Mutex<Option<Arc<dyn RemoteSession>>>,
    state: StdRwLock<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            session: Mutex::new(None),
            state: StdRwLock::new(ConnectionState::Disconnected),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
            .read()
            .map(|s| s.clone())
            .unwrap_or(ConnectionState::Disconnected)
    }

    fn set_state(&self, next: ConnectionState) {
        if let Ok(mut state) = self.state.write() {
            *state = next;
        }
    }

    /// Live session using the configured attempt budget.
    pub async fn session(&self) -> SftpResult<Arc<dyn RemoteSession>> {
        self.get_session(self.config.max_connect_attempts).await
    }

    /// Return the cached session if it still reports itself active, otherwise
    /// connect, retrying with exponential backoff (initial, 2×, 4×, …).
    /// Fails with the last underlying error once `max_attempts` are spent.
    pub async fn get_session(&self, max_attempts: u32) -> SftpResult<Arc<dyn RemoteSession>> {
        let mut slot = self.session.lock().await;

        if let Some(existing) = slot.as_ref() {
            if existing.is_active() {
                return Ok(existing.clone());
            }
        }
        if let Some(stale) = slot.take() {
            debug!("SFTP session to {} is stale, reconnecting", self.config.address());
            if let Err(e) = stale.close().await {
                debug!("Closing stale session failed: {}", e);
            }
        }

        let attempts = max_attempts.max(1);
        let mut last_error: Option<SftpError> = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self
                    .config
                    .initial_backoff()
                    .checked_mul(2u32.saturating_pow(attempt - 1))
                    .unwrap_or(self.config.connect_timeout());
                warn!(
                    "SFTP connect to {} retry {}/{} in {:?}",
                    self.config.address(),
                    attempt,
                    attempts - 1,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            self.set_state(ConnectionState::Connecting);
            let outcome = match tokio::time::timeout(
                self.config.connect_timeout(),
                self.connector.connect(&self.config),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(SftpError::timeout(format!(
                    "Connection to {} timed out after {:?}",
                    self.config.address(),
                    self.config.connect_timeout()
                ))),
            };

            match outcome {
                Ok(session) => {
                    info!("SFTP session to {} established", self.config.address());
                    *slot = Some(session.clone());
                    self.set_state(ConnectionState::Connected);
                    return Ok(session);
                }
                Err(e) => {
                    warn!(
                        "SFTP connect attempt {}/{} to {} failed: {}",
                        attempt + 1,
                        attempts,
                        self.config.address(),
                        e
                    );
                    self.set_state(ConnectionState::Errored(e.message.clone()));
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SftpError::not_connected("No connection attempt was made")))
    }

    /// Close and discard the session. Idempotent; close failures are logged
    /// and otherwise ignored.
    pub async fn disconnect(&self) {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.take() {
            match session.close().await {
                Ok(()) => info!("SFTP session to {} disconnected", self.config.address()),
                Err(e) => warn!("SFTP disconnect from {} failed: {}", self.config.address(), e),
            }
        }
        self.set_state(ConnectionState::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp::testing::MemoryConnector;
    use rmount_core::SftpErrorKind;
    use std::time::{Duration, Instant};

    fn manager(connector: &MemoryConnector) -> ConnectionManager {
        let mut config = ConnectionConfig::new("memory", "tester").with_password("secret");
        config.initial_backoff_ms = 500;
        ConnectionManager::new(config, Arc::new(connector.clone()))
    }

    #[tokio::test]
    async fn test_session_is_cached() {
        let connector = MemoryConnector::new();
        let mgr = manager(&connector);
        let a = mgr.get_session(3).await.unwrap();
        let b = mgr.get_session(3).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connector.connect_calls(), 1);
        assert_eq!(mgr.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_retry_with_backoff() {
        let connector = MemoryConnector::new();
        connector.fail_next_connects(2, SftpError::connection_failed("connection refused"));
        let mgr = manager(&connector);

        let started = Instant::now();
        let session = mgr.get_session(3).await;
        assert!(session.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert_eq!(connector.connect_calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_last_error() {
        let connector = MemoryConnector::new();
        connector.fail_next_connects(1, SftpError::connection_failed("first"));
        connector.fail_next_connects(1, SftpError::timeout("second"));
        let mgr = manager(&connector);

        let err = mgr.get_session(2).await.err().unwrap();
        assert_eq!(err.kind, SftpErrorKind::Timeout);
        assert_eq!(err.message, "second");
        assert!(matches!(mgr.state(), ConnectionState::Errored(_)));
    }

    #[tokio::test]
    async fn test_stale_session_is_replaced() {
        let connector = MemoryConnector::new();
        let mgr = manager(&connector);
        let first = mgr.get_session(1).await.unwrap();
        connector.kill_sessions();
        assert!(!first.is_active());

        let second = mgr.get_session(1).await.unwrap();
        assert!(second.is_active());
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connect_calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_attempt() {
        let connector = MemoryConnector::new();
        connector.set_connect_delay(Duration::from_millis(100));
        let mgr = Arc::new(manager(&connector));

        let (a, b) = tokio::join!(mgr.get_session(1), mgr.get_session(1));
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(connector.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let connector = MemoryConnector::new();
        let mgr = manager(&connector);
        let session = mgr.get_session(1).await.unwrap();
        mgr.disconnect().await;
        mgr.disconnect().await;
        assert!(!session.is_active());
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_wrong_password_fails_with_auth_error() {
        let connector = MemoryConnector::new().with_password("other");
        let mgr = manager(&connector);
        let err = mgr.get_session(1).await.err().unwrap();
        assert_eq!(err.kind, SftpErrorKind::AuthFailed);
    }
}
