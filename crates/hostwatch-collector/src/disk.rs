use crate::{metrics, percent, Collector};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hostwatch_common::types::MetricDataPoint;
use std::path::Path;
use sysinfo::Disks;

/// Root filesystem usage.
pub struct DiskCollector {
    disks: Disks,
}

impl DiskCollector {
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl Default for DiskCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Used percentage from total/available bytes.
pub fn used_percent(total: u64, available: u64) -> f64 {
    percent(total.saturating_sub(available), total)
}

impl Collector for DiskCollector {
    fn name(&self) -> &str {
        "disk"
    }

    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricDataPoint>> {
        self.disks.refresh(true);

        let root = self
            .disks
            .iter()
            .find(|disk| disk.mount_point() == Path::new("/"))
            .context("root filesystem not found")?;

        Ok(vec![MetricDataPoint::new(
            now,
            metrics::ROOT_FS_USED_PERCENT,
            used_percent(root.total_space(), root.available_space()),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_percent_from_available() {
        assert!((used_percent(200, 50) - 75.0).abs() < 1e-9);
        assert_eq!(used_percent(0, 0), 0.0);
        // Available larger than total (reserved blocks quirk) clamps to 0
        assert_eq!(used_percent(100, 150), 0.0);
    }
}
