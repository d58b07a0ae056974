use crate::metrics;
use crate::procfs::{iowait_percent, parse_cpu_times, CpuTimes};
use crate::Collector;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hostwatch_common::types::MetricDataPoint;
use std::path::PathBuf;

/// Reports the iowait share of CPU time since the previous tick.
pub struct CpuCollector {
    stat_path: PathBuf,
    prev: Option<CpuTimes>,
}

impl CpuCollector {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            stat_path: proc_root.into().join("stat"),
            prev: None,
        }
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &str {
        "cpu"
    }

    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricDataPoint>> {
        let content = std::fs::read_to_string(&self.stat_path)
            .with_context(|| format!("reading {}", self.stat_path.display()))?;
        let cur = parse_cpu_times(&content).context("no aggregate cpu line in /proc/stat")?;

        let iowait = match self.prev.replace(cur) {
            Some(prev) => iowait_percent(&prev, &cur),
            None => 0.0,
        };

        Ok(vec![MetricDataPoint::new(
            now,
            metrics::CPU_IOWAIT_PERCENT,
            iowait,
        )])
    }
}
