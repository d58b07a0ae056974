use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The persisted document. Unknown top-level fields are preserved in
/// `extra` so that `get`/`set` can carry arbitrary markers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Alert key -> last time it fired.
    #[serde(default)]
    pub last_alert: HashMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub last_beat: Option<DateTime<Utc>>,
    #[serde(default)]
    pub traffic: Option<TrafficState>,
    /// Local date of the last daily snapshot.
    #[serde(default)]
    pub last_daily: Option<NaiveDate>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Baseline counters for the current calendar-month accounting cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficState {
    /// `YYYY-MM`
    pub month: String,
    pub start_rx: u64,
    pub start_tx: u64,
    #[serde(default)]
    pub last_report_day: Option<NaiveDate>,
}
