use crate::procfs::parse_vmstat_field;
use crate::{metrics, percent, Collector};
use anyhow::Result;
use chrono::{DateTime, Utc};
use hostwatch_common::types::{safe_delta, MetricDataPoint};
use std::path::PathBuf;
use sysinfo::System;

/// Derivative of the cumulative `pswpin` counter.
#[derive(Debug, Default)]
pub struct SwapInRate {
    prev: Option<(u64, DateTime<Utc>)>,
}

impl SwapInRate {
    /// Pages swapped in per second since the previous reading; zero on the
    /// first reading or when no time has elapsed.
    pub fn update(&mut self, counter: u64, now: DateTime<Utc>) -> f64 {
        let rate = match self.prev {
            Some((old, at)) => {
                let elapsed = (now - at).num_milliseconds() as f64 / 1000.0;
                if elapsed > 0.0 {
                    safe_delta(counter, old) as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.prev = Some((counter, now));
        rate
    }
}

pub struct MemoryCollector {
    system: System,
    vmstat_path: PathBuf,
    swap_in: SwapInRate,
}

impl MemoryCollector {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            system: System::new(),
            vmstat_path: proc_root.into().join("vmstat"),
            swap_in: SwapInRate::default(),
        }
    }
}

impl Collector for MemoryCollector {
    fn name(&self) -> &str {
        "memory"
    }

    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricDataPoint>> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let available = self.system.available_memory();
        let swap_total = self.system.total_swap();
        let swap_used = self.system.used_swap();

        let mut points = vec![
            MetricDataPoint::new(now, metrics::MEM_TOTAL_BYTES, total as f64),
            MetricDataPoint::new(now, metrics::MEM_AVAILABLE_BYTES, available as f64),
            MetricDataPoint::new(
                now,
                metrics::MEM_AVAILABLE_PERCENT,
                percent(available, total),
            ),
            MetricDataPoint::new(
                now,
                metrics::SWAP_USED_PERCENT,
                percent(swap_used, swap_total),
            ),
        ];

        // Swap-in is Linux-only; skip the metric when vmstat is unavailable
        match std::fs::read_to_string(&self.vmstat_path) {
            Ok(content) => {
                if let Some(pswpin) = parse_vmstat_field(&content, "pswpin") {
                    let rate = self.swap_in.update(pswpin, now);
                    points.push(MetricDataPoint::new(now, metrics::SWAP_IN_PER_SEC, rate));
                }
            }
            Err(e) => {
                tracing::debug!(path = %self.vmstat_path.display(), error = %e, "vmstat unavailable");
            }
        }

        Ok(points)
    }
}
