// file: src/models/sync.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileResult {
    pub success: bool,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: Vec<String>,
}

impl ReconcileResult {
    pub fn started() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A run that could not obtain its inputs. Counts stay at zero.
    pub fn aborted(error: String) -> Self {
        Self {
            success: false,
            errors: vec![error],
            ..Self::default()
        }
    }

    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Remote query window. `start` is inclusive, `end` open when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Window opening `lookback_days` before `now`, or `None` when that
    /// start is not a representable time.
    pub fn looking_back(now: DateTime<Utc>, lookback_days: i64) -> Option<Self> {
        let start = now.checked_sub_signed(Duration::try_days(lookback_days)?)?;
        Some(Self { start, end: None })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
    pub event_count: i64,
}

/// Result of a single write against the remote calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl PushOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }
}
