//! Loss, latency and jitter over the combined probe windows.

use crate::window::ProbeWindow;
use chrono::{DateTime, Utc};
use hostwatch_common::types::{AlertEvent, Severity};

pub const NET_LOSS_KEY: &str = "net_loss";
pub const NET_LATENCY_KEY: &str = "net_latency";
pub const NET_JITTER_KEY: &str = "net_jitter";

/// Latency and jitter need more than this many RTT samples before they are judged.
const MIN_RTT_SAMPLES: usize = 3;

/// Quantile `q` in `[0, 1]` of an ascending-sorted slice, linearly
/// interpolated between closest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn median(sorted: &[f64]) -> Option<f64> {
    quantile(sorted, 0.5)
}

/// Interquartile range (Q3 - Q1).
pub fn iqr(sorted: &[f64]) -> Option<f64> {
    Some(quantile(sorted, 0.75)? - quantile(sorted, 0.25)?)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    pub loss_pct: f64,
    pub latency_ms: f64,
    pub jitter_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityStats {
    pub total: usize,
    pub failures: usize,
    pub loss_pct: f64,
    pub median_rtt_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub rtt_count: usize,
}

impl QualityStats {
    pub fn compute<'a, I>(windows: I) -> Self
    where
        I: IntoIterator<Item = &'a ProbeWindow>,
    {
        let mut total = 0;
        let mut failures = 0;
        let mut rtts = Vec::new();

        for window in windows {
            for sample in window.samples() {
                total += 1;
                if !sample.success {
                    failures += 1;
                } else if let Some(rtt) = sample.rtt_ms.filter(|r| r.is_finite()) {
                    rtts.push(rtt);
                }
            }
        }

        rtts.sort_by(f64::total_cmp);
        let loss_pct = if total == 0 {
            0.0
        } else {
            failures as f64 * 100.0 / total as f64
        };

        Self {
            total,
            failures,
            loss_pct,
            median_rtt_ms: median(&rtts),
            jitter_ms: iqr(&rtts),
            rtt_count: rtts.len(),
        }
    }
}

fn quality_event(
    key: &str,
    title: &str,
    line: String,
    value: f64,
    threshold: f64,
    now: DateTime<Utc>,
) -> AlertEvent {
    AlertEvent {
        key: key.to_string(),
        title: title.to_string(),
        metric_name: format!("network.{}", key.trim_start_matches("net_")),
        severity: Severity::Warning,
        lines: vec![line],
        value,
        threshold,
        timestamp: now,
    }
}

/// Breaches of the quality thresholds. `capacity` is the combined window
/// capacity across all targets; loss is only judged once at least half of
/// it is filled.
pub fn evaluate_quality(
    stats: &QualityStats,
    capacity: usize,
    thresholds: &QualityThresholds,
    now: DateTime<Utc>,
) -> Vec<AlertEvent> {
    let mut events = Vec::new();

    if stats.total > 0 && stats.total * 2 >= capacity && stats.loss_pct >= thresholds.loss_pct {
        events.push(quality_event(
            NET_LOSS_KEY,
            "High packet loss",
            format!(
                "Loss: {:.1}% ({}/{} probes failed, threshold {:.1}%)",
                stats.loss_pct, stats.failures, stats.total, thresholds.loss_pct
            ),
            stats.loss_pct,
            thresholds.loss_pct,
            now,
        ));
    }

    if stats.rtt_count > MIN_RTT_SAMPLES {
        if let Some(latency) = stats.median_rtt_ms.filter(|m| *m >= thresholds.latency_ms) {
            events.push(quality_event(
                NET_LATENCY_KEY,
                "High latency",
                format!(
                    "Median RTT: {latency:.1} ms (threshold {:.1} ms)",
                    thresholds.latency_ms
                ),
                latency,
                thresholds.latency_ms,
                now,
            ));
        }

        if let Some(jitter) = stats.jitter_ms.filter(|j| *j >= thresholds.jitter_ms) {
            events.push(quality_event(
                NET_JITTER_KEY,
                "High jitter",
                format!(
                    "Jitter (IQR): {jitter:.1} ms (threshold {:.1} ms)",
                    thresholds.jitter_ms
                ),
                jitter,
                thresholds.jitter_ms,
                now,
            ));
        }
    }

    events
}
