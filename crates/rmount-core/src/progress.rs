// ── Transfer progress ────────────────────────────────────────────────────────
//
// A `Progress` is a cheap cloneable handle shared between the caller and the
// blocking transfer loop. Started transfers are registered process-wide so
// they can be listed and cancelled by id; reaching a terminal state removes
// the entry, the handle itself keeps its final snapshot.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use uuid::Uuid;

lazy_static! {
    /// Live transfers (transfer_id → handle)
    static ref TRANSFER_PROGRESS: StdMutex<HashMap<String, Progress>> =
        StdMutex::new(HashMap::new());
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferDirection {
    Upload,
    Download,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// Point-in-time view of one transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub transfer_id: String,
    pub direction: Option<TransferDirection>,
    pub remote_path: Option<String>,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub percent: f64,
    pub status: TransferStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug)]
struct TransferMeta {
    direction: Option<TransferDirection>,
    remote_path: Option<String>,
    status: TransferStatus,
    started_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

#[derive(Debug)]
struct ProgressInner {
    id: String,
    total: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicBool,
    meta: StdMutex<TransferMeta>,
}

#[derive(Debug, Clone)]
pub struct Progress {
    inner: Arc<ProgressInner>,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ProgressInner {
                id: Uuid::new_v4().to_string(),
                total: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                cancelled: AtomicBool::new(false),
                meta: StdMutex::new(TransferMeta {
                    direction: None,
                    remote_path: None,
                    status: TransferStatus::Pending,
                    started_at: None,
                    error: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Start reporting a transfer of `total` bytes and register it. A handle
    /// cancelled before the start is not registered.
    pub fn begin(&self, direction: TransferDirection, remote_path: &str, total: u64) {
        self.inner.total.store(total, Ordering::SeqCst);
        self.inner.completed.store(0, Ordering::SeqCst);
        self.update_meta(|m| {
            m.direction = Some(direction);
            m.remote_path = Some(remote_path.to_string());
            m.started_at = Some(Utc::now());
            if m.status != TransferStatus::Cancelled {
                m.status = TransferStatus::InProgress;
            }
        });
        if self.is_cancelled() {
            return;
        }
        if let Ok(mut map) = TRANSFER_PROGRESS.lock() {
            map.insert(self.inner.id.clone(), self.clone());
        }
    }

    pub fn advance(&self, bytes: u64) {
        self.inner.completed.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn total(&self) -> u64 {
        self.inner.total.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::SeqCst)
    }

    pub fn complete(&self) {
        self.update_meta(|m| m.status = TransferStatus::Completed);
        self.unregister();
    }

    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        self.update_meta(|m| {
            if m.status != TransferStatus::Cancelled {
                m.status = TransferStatus::Failed;
                m.error = Some(error);
            }
        });
        self.unregister();
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.update_meta(|m| {
            if m.status != TransferStatus::Completed {
                m.status = TransferStatus::Cancelled;
            }
        });
        self.unregister();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> TransferStatus {
        self.inner
            .meta
            .lock()
            .map(|m| m.status)
            .unwrap_or(TransferStatus::Failed)
    }

    pub fn snapshot(&self) -> TransferProgress {
        let total = self.total();
        let transferred = self.completed();
        let percent = if total > 0 {
            (transferred as f64 / total as f64) * 100.0
        } else if self.status() == TransferStatus::Completed {
            100.0
        } else {
            0.0
        };
        let (direction, remote_path, status, started_at, error) = match self.inner.meta.lock() {
            Ok(m) => (m.direction, m.remote_path.clone(), m.status, m.started_at, m.error.clone()),
            Err(_) => (None, None, TransferStatus::Failed, None, None),
        };
        TransferProgress {
            transfer_id: self.inner.id.clone(),
            direction,
            remote_path,
            total_bytes: total,
            transferred_bytes: transferred,
            percent,
            status,
            started_at,
            error,
        }
    }

    /// Guard that cancels this transfer when dropped while still armed.
    /// Held across the await of a transfer so that abandoning the future
    /// stops the blocking copy loop.
    pub fn cancel_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            progress: self.clone(),
            armed: true,
        }
    }

    fn unregister(&self) {
        if let Ok(mut map) = TRANSFER_PROGRESS.lock() {
            map.remove(&self.inner.id);
        }
    }

    fn update_meta(&self, f: impl FnOnce(&mut TransferMeta)) {
        if let Ok(mut meta) = self.inner.meta.lock() {
            f(&mut meta);
        }
    }
}

pub struct CancelOnDrop {
    progress: Progress,
    armed: bool,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("Transfer {} abandoned, cancelling", self.progress.id());
            self.progress.cancel();
        }
    }
}

// ── Registry access ──────────────────────────────────────────────────────────

pub fn active_transfers() -> Vec<TransferProgress> {
    TRANSFER_PROGRESS
        .lock()
        .map(|map| {
            map.values()
                .filter(|p| p.status() == TransferStatus::InProgress)
                .map(Progress::snapshot)
                .collect()
        })
        .unwrap_or_default()
}

pub fn transfer_progress(transfer_id: &str) -> Option<TransferProgress> {
    TRANSFER_PROGRESS
        .lock()
        .ok()
        .and_then(|map| map.get(transfer_id).map(Progress::snapshot))
}

/// Cancel a registered transfer. Returns false when the id is unknown.
pub fn cancel_transfer(transfer_id: &str) -> bool {
    let handle = TRANSFER_PROGRESS
        .lock()
        .ok()
        .and_then(|map| map.get(transfer_id).cloned());
    match handle {
        Some(p) => {
            p.cancel();
            true
        }
        None => false,
    }
}

/// Drop every registered transfer that is no longer in progress; returns
/// how many. Finished transfers normally unregister themselves.
pub fn clear_finished_transfers() -> usize {
    match TRANSFER_PROGRESS.lock() {
        Ok(mut map) => {
            let before = map.len();
            map.retain(|_, p| p.status() == TransferStatus::InProgress);
            before - map.len()
        }
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_reports_bytes() {
        let p = Progress::new();
        p.begin(TransferDirection::Download, "/f", 10);
        p.advance(4);
        p.advance(6);
        p.complete();
        let snap = p.snapshot();
        assert_eq!(snap.transferred_bytes, 10);
        assert_eq!(snap.percent, 100.0);
        assert_eq!(snap.status, TransferStatus::Completed);
    }

    #[test]
    fn test_cancel_by_id() {
        let p = Progress::new();
        p.begin(TransferDirection::Upload, "/up", 100);
        assert!(active_transfers().iter().any(|t| t.transfer_id == p.id()));
        assert!(cancel_transfer(p.id()));
        assert!(p.is_cancelled());
        assert_eq!(p.snapshot().status, TransferStatus::Cancelled);
        assert!(!cancel_transfer("no-such-transfer"));
    }

    #[test]
    fn test_fail_does_not_override_cancel() {
        let p = Progress::new();
        p.begin(TransferDirection::Upload, "/x", 1);
        p.cancel();
        p.fail("late error");
        assert_eq!(p.status(), TransferStatus::Cancelled);
    }

    #[test]
    fn test_cancel_guard() {
        let p = Progress::new();
        drop(p.cancel_guard());
        assert!(p.is_cancelled());

        let q = Progress::new();
        q.cancel_guard().disarm();
        assert!(!q.is_cancelled());
    }

    #[test]
    fn test_terminal_states_unregister() {
        let done = Progress::new();
        done.begin(TransferDirection::Download, "/done", 0);
        assert!(transfer_progress(done.id()).is_some());
        done.complete();
        assert!(transfer_progress(done.id()).is_none());
        assert_eq!(done.snapshot().status, TransferStatus::Completed);

        let failed = Progress::new();
        failed.begin(TransferDirection::Upload, "/failed", 5);
        failed.fail("boom");
        assert!(transfer_progress(failed.id()).is_none());
        assert_eq!(failed.snapshot().error.as_deref(), Some("boom"));

        let cancelled = Progress::new();
        cancelled.begin(TransferDirection::Upload, "/cancelled", 5);
        assert!(cancel_transfer(cancelled.id()));
        assert!(transfer_progress(cancelled.id()).is_none());
        assert!(!cancel_transfer(cancelled.id()));
    }

    #[test]
    fn test_cancelled_before_begin_is_not_registered() {
        let p = Progress::new();
        p.cancel();
        p.begin(TransferDirection::Download, "/never", 3);
        assert!(transfer_progress(p.id()).is_none());
        assert_eq!(p.status(), TransferStatus::Cancelled);
    }
}
