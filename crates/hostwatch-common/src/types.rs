use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct MetricDataPoint {
    pub timestamp: DateTime<Utc>,
    pub metric_name: String,
    pub value: f64,
}

impl MetricDataPoint {
    pub fn new(timestamp: DateTime<Utc>, metric_name: &str, value: f64) -> Self {
        Self {
            timestamp,
            metric_name: metric_name.to_string(),
            value,
        }
    }
}

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use hostwatch_common::types::Severity;
///
/// assert_eq!(Severity::Warning.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Leading icon used in notification titles.
    pub fn icon(self) -> &'static str {
        match self {
            Severity::Info => "ℹ️",
            Severity::Warning => "⚠️",
            Severity::Critical => "🚨",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A threshold breach detected by a rule, before cooldown gating.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    /// Cooldown key, e.g. `mem_low` or `proc:nginx`.
    pub key: String,
    pub title: String,
    /// Metric that breached; logged with `value` and `threshold` on dispatch.
    pub metric_name: String,
    pub severity: Severity,
    pub lines: Vec<String>,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub fn to_notification(&self) -> Notification {
        Notification {
            icon: self.severity.icon().to_string(),
            title: self.title.clone(),
            lines: self.lines.clone(),
        }
    }
}

/// A message ready for delivery: an icon, a title and bullet lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub icon: String,
    pub title: String,
    pub lines: Vec<String>,
}

impl Notification {
    pub fn new(icon: &str, title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            icon: icon.to_string(),
            title: title.into(),
            lines,
        }
    }
}

/// Difference between two readings of a monotonically increasing 64-bit
/// counter, treating `new < old` as a single wraparound.
///
/// # Examples
///
/// ```
/// use hostwatch_common::types::safe_delta;
///
/// assert_eq!(safe_delta(150, 100), 50);
/// assert_eq!(safe_delta(5, u64::MAX - 4), 10);
/// ```
pub fn safe_delta(new: u64, old: u64) -> u64 {
    if new >= old {
        new - old
    } else {
        // 2^64 - old + new, computed without overflowing u64
        (u64::MAX - old) + new + 1
    }
}

/// Format a byte count with binary units, one decimal place.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Format a duration in seconds as `1h2m3s`, omitting leading zero units.
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_delta_without_wrap() {
        assert_eq!(safe_delta(0, 0), 0);
        assert_eq!(safe_delta(1_000, 400), 600);
        assert_eq!(safe_delta(u64::MAX, 0), u64::MAX);
    }

    #[test]
    fn safe_delta_with_wrap() {
        // 2^64 - old + new
        assert_eq!(safe_delta(0, u64::MAX), 1);
        assert_eq!(safe_delta(99, u64::MAX - 100), 200);
        assert_eq!(
            safe_delta(10, 20) as u128,
            (1u128 << 64) - 20 + 10
        );
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn format_duration_units() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m5s");
        assert_eq!(format_duration(3_725), "1h2m5s");
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn alert_event_maps_to_notification() {
        let event = AlertEvent {
            key: "mem_low".into(),
            title: "Memory low".into(),
            metric_name: "memory.available_percent".into(),
            severity: Severity::Critical,
            lines: vec!["Available: 8.0%".into()],
            value: 8.0,
            threshold: 10.0,
            timestamp: Utc::now(),
        };
        let n = event.to_notification();
        assert_eq!(n.icon, "🚨");
        assert_eq!(n.title, "Memory low");
        assert_eq!(n.lines, vec!["Available: 8.0%".to_string()]);
    }
}
