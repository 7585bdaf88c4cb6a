// ── Sync anchors ─────────────────────────────────────────────────────────────

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Opaque change-feed anchor: the UTF-8 decimal Unix timestamp
/// (`"<secs>.<micros>"`) of the pass that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncAnchor(Vec<u8>);

impl SyncAnchor {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(time: DateTime<Utc>) -> Self {
        let text = format!("{}.{:06}", time.timestamp(), time.timestamp_subsec_micros());
        SyncAnchor(text.into_bytes())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        SyncAnchor(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Best-effort read-back of the timestamp; `None` for foreign anchors.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let text = std::str::from_utf8(&self.0).ok()?;
        let (secs, micros) = match text.split_once('.') {
            Some((s, m)) => (s.parse::<i64>().ok()?, m.parse::<u32>().ok()?),
            None => (text.parse::<i64>().ok()?, 0),
        };
        Utc.timestamp_opt(secs, micros.checked_mul(1_000)?).single()
    }
}
