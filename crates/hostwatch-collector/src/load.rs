use crate::metrics;
use crate::Collector;
use anyhow::Result;
use chrono::{DateTime, Utc};
use hostwatch_common::types::MetricDataPoint;
use sysinfo::{CpuRefreshKind, System};

pub struct LoadCollector {
    cores: usize,
}

impl LoadCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_list(CpuRefreshKind::nothing());
        Self {
            cores: system.cpus().len().max(1),
        }
    }

    pub fn cores(&self) -> usize {
        self.cores
    }
}

impl Default for LoadCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// 1-minute load normalised by logical core count.
pub fn load_per_core(load_1: f64, cores: usize) -> f64 {
    load_1 / cores.max(1) as f64
}

impl Collector for LoadCollector {
    fn name(&self) -> &str {
        "load"
    }

    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricDataPoint>> {
        let load_avg = System::load_average();

        Ok(vec![
            MetricDataPoint::new(now, metrics::LOAD_1, load_avg.one),
            MetricDataPoint::new(now, metrics::LOAD_5, load_avg.five),
            MetricDataPoint::new(now, metrics::LOAD_15, load_avg.fifteen),
            MetricDataPoint::new(
                now,
                metrics::LOAD_1_PER_CORE,
                load_per_core(load_avg.one, self.cores),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_by_cores() {
        assert_eq!(load_per_core(4.0, 4), 1.0);
        assert_eq!(load_per_core(3.0, 2), 1.5);
        assert_eq!(load_per_core(2.0, 0), 2.0);
    }

    #[test]
    fn emits_all_load_metrics() {
        let mut collector = LoadCollector::new();
        assert!(collector.cores() >= 1);
        let names: Vec<String> = collector
            .collect(Utc::now())
            .unwrap()
            .into_iter()
            .map(|p| p.metric_name)
            .collect();
        assert_eq!(
            names,
            vec![
                metrics::LOAD_1,
                metrics::LOAD_5,
                metrics::LOAD_15,
                metrics::LOAD_1_PER_CORE
            ]
        );
    }
}
