use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Fires once per local calendar date at or after a configured time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    /// Parses `HH:MM`; an empty string disables the schedule.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let at = NaiveTime::parse_from_str(raw, "%H:%M")
            .with_context(|| format!("invalid daily_report_time {raw:?}, expected HH:MM"))?;
        Ok(Some(Self { at }))
    }

    pub fn due(&self, last_sent: Option<NaiveDate>, local_now: NaiveDateTime) -> bool {
        local_now.time() >= self.at && last_sent != Some(local_now.date())
    }
}
