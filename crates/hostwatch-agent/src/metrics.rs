//! The main periodic loop: resource sampling, threshold alerts, watched
//! processes, heartbeat, traffic accounting and the daily snapshot.

use crate::config::WatchProcs;
use crate::context::AgentContext;
use crate::daily::DailySchedule;
use crate::inspector::SystemInspector;
use crate::rule_builder::build_rules;
use crate::traffic::{month_to_date, TrafficAccountant};
use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Local, Utc};
use hostwatch_alert::engine::AlertEngine;
use hostwatch_collector::cpu::CpuCollector;
use hostwatch_collector::disk::DiskCollector;
use hostwatch_collector::load::LoadCollector;
use hostwatch_collector::memory::MemoryCollector;
use hostwatch_collector::metrics;
use hostwatch_collector::network::{NetworkCollector, NetworkRates};
use hostwatch_collector::Collector;
use hostwatch_common::types::{format_bytes, MetricDataPoint, Notification, Severity};

/// Services checked in discovery mode.
pub const DISCOVERY_CANDIDATES: &[&str] = &[
    "nginx",
    "caddy",
    "haproxy",
    "docker",
    "containerd",
    "apache2",
    "httpd",
];

/// Candidate services enabled on this host.
pub async fn discover_services(inspector: &dyn SystemInspector) -> Vec<String> {
    let mut found = Vec::new();
    for name in DISCOVERY_CANDIDATES {
        if inspector.service_enabled(name).await {
            found.push(name.to_string());
        }
    }
    found
}

/// Latest values of the metrics used in summaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub load_1: Option<f64>,
    pub load_5: Option<f64>,
    pub load_15: Option<f64>,
    pub load_1_per_core: Option<f64>,
    pub mem_available_percent: Option<f64>,
    pub mem_available_bytes: Option<f64>,
    pub mem_total_bytes: Option<f64>,
    pub swap_used_percent: Option<f64>,
    pub root_used_percent: Option<f64>,
}

impl MetricsSnapshot {
    pub fn from_points(points: &[MetricDataPoint]) -> Self {
        let value = |name: &str| {
            points
                .iter()
                .rev()
                .find(|p| p.metric_name == name)
                .map(|p| p.value)
        };
        Self {
            load_1: value(metrics::LOAD_1),
            load_5: value(metrics::LOAD_5),
            load_15: value(metrics::LOAD_15),
            load_1_per_core: value(metrics::LOAD_1_PER_CORE),
            mem_available_percent: value(metrics::MEM_AVAILABLE_PERCENT),
            mem_available_bytes: value(metrics::MEM_AVAILABLE_BYTES),
            mem_total_bytes: value(metrics::MEM_TOTAL_BYTES),
            swap_used_percent: value(metrics::SWAP_USED_PERCENT),
            root_used_percent: value(metrics::ROOT_FS_USED_PERCENT),
        }
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let (Some(l1), Some(l5), Some(l15)) = (self.load_1, self.load_5, self.load_15) {
            let per_core = self
                .load_1_per_core
                .map(|v| format!(" ({v:.2}/core)"))
                .unwrap_or_default();
            lines.push(format!("Load: {l1:.2} {l5:.2} {l15:.2}{per_core}"));
        }
        if let Some(avail) = self.mem_available_percent {
            let detail = match (self.mem_available_bytes, self.mem_total_bytes) {
                (Some(free), Some(total)) => format!(
                    " ({} of {})",
                    format_bytes(free as u64),
                    format_bytes(total as u64)
                ),
                (None, Some(total)) => format!(" of {}", format_bytes(total as u64)),
                _ => String::new(),
            };
            lines.push(format!("Memory: {avail:.1}% available{detail}"));
        }
        if let Some(swap) = self.swap_used_percent {
            lines.push(format!("Swap: {swap:.1}% used"));
        }
        if let Some(disk) = self.root_used_percent {
            lines.push(format!("Disk /: {disk:.1}% used"));
        }
        lines
    }
}

fn collect_into(
    collector: &mut dyn Collector,
    now: DateTime<Utc>,
    points: &mut Vec<MetricDataPoint>,
    failures: &mut usize,
) {
    match collector.collect(now) {
        Ok(batch) => points.extend(batch),
        Err(e) => {
            *failures += 1;
            tracing::warn!(collector = collector.name(), error = %e, "Collection failed");
        }
    }
}

pub struct MetricsTask {
    ctx: AgentContext,
    collectors: Vec<Box<dyn Collector>>,
    network: Option<NetworkCollector>,
    engine: AlertEngine,
    accountant: TrafficAccountant,
    daily: Option<DailySchedule>,
}

impl MetricsTask {
    /// Task with the built-in host collectors.
    pub fn new(ctx: AgentContext) -> Self {
        let proc_root = ctx.config.proc_root.clone();
        let collectors: Vec<Box<dyn Collector>> = vec![
            Box::new(MemoryCollector::new(proc_root.as_str())),
            Box::new(LoadCollector::new()),
            Box::new(CpuCollector::new(proc_root.as_str())),
            Box::new(DiskCollector::new()),
        ];
        Self::with_collectors(ctx, collectors, Some(NetworkCollector::new()))
    }

    pub fn with_collectors(
        ctx: AgentContext,
        collectors: Vec<Box<dyn Collector>>,
        network: Option<NetworkCollector>,
    ) -> Self {
        let config = ctx.config.clone();
        let daily = DailySchedule::parse(&config.daily_report_time).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Daily snapshot disabled");
            None
        });
        Self {
            engine: AlertEngine::new(build_rules(&config)),
            accountant: TrafficAccountant::new(
                config.traffic_report_every_days,
                config.traffic_report_hour,
            ),
            ctx,
            collectors,
            network,
            daily,
        }
    }

    pub async fn run(mut self) {
        let secs = self.ctx.config.tick_secs.max(1);
        tracing::info!(tick_secs = secs, rules = self.engine.rules().len(), "Metrics loop started");

        let mut tick = tokio::time::interval(std::time::Duration::from_secs(secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                tracing::warn!(error = %e, "Metrics tick failed");
            }
        }
    }

    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<()> {
        let points = self.collect(now)?;
        let rates = self.network.as_ref().and_then(|n| n.last_rates());

        for event in self.engine.evaluate(&points) {
            self.ctx.alert_event(&event).await;
        }

        self.check_processes(now).await;

        let snapshot = MetricsSnapshot::from_points(&points);
        self.heartbeat(&snapshot, now).await;
        if let Some(rates) = rates {
            self.account_traffic(&rates, now).await;
        }
        self.daily_snapshot(&snapshot, rates.as_ref(), now).await;

        Ok(())
    }

    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricDataPoint>> {
        let mut points = Vec::new();
        let mut failures = 0;

        for collector in self.collectors.iter_mut() {
            collect_into(collector.as_mut(), now, &mut points, &mut failures);
        }
        if let Some(network) = self.network.as_mut() {
            collect_into(network, now, &mut points, &mut failures);
        }

        if points.is_empty() && failures > 0 {
            bail!("all {failures} collectors failed");
        }
        tracing::debug!(count = points.len(), "Collected metrics");
        Ok(points)
    }

    async fn check_processes(&self, now: DateTime<Utc>) {
        let inspector = self.ctx.inspector.as_ref();
        let mut missing = Vec::new();

        match &self.ctx.config.watch_procs {
            WatchProcs::Auto => {
                for name in discover_services(inspector).await {
                    if !inspector.service_active(&name).await {
                        missing.push(name);
                    }
                }
            }
            WatchProcs::List(names) => {
                for name in names {
                    if !inspector.process_running(name).await {
                        missing.push(name.clone());
                    }
                }
            }
        }

        for name in missing {
            tracing::warn!(process = %name, "Watched process not running");
            let notification = Notification::new(
                Severity::Critical.icon(),
                format!("Process not running: {name}"),
                vec![format!("{name} is not active")],
            );
            self.ctx
                .alert_at(&format!("proc:{name}"), &notification, now)
                .await;
        }
    }

    async fn heartbeat(&self, snapshot: &MetricsSnapshot, now: DateTime<Utc>) {
        let hours = self.ctx.config.heartbeat_hours;
        if hours == 0 {
            return;
        }
        let interval = Duration::hours(hours as i64);
        let due = self
            .ctx
            .store
            .read(|s| s.last_beat.is_none_or(|last| now - last >= interval));
        if !due {
            return;
        }

        self.ctx.store.update(|s| s.last_beat = Some(now));
        let notification = Notification::new("💓", "Heartbeat", snapshot.summary_lines());
        self.ctx.notify(&notification).await;
    }

    async fn account_traffic(&self, rates: &NetworkRates, now: DateTime<Utc>) {
        let local_now = now.with_timezone(&Local).naive_local();
        let reports = self.ctx.store.update(|s| {
            self.accountant
                .step(&mut s.traffic, rates.rx_total, rates.tx_total, local_now)
        });
        for report in reports {
            tracing::info!(?report, "Traffic report");
            self.ctx.notify(&report.to_notification()).await;
        }
    }

    async fn daily_snapshot(
        &self,
        snapshot: &MetricsSnapshot,
        rates: Option<&NetworkRates>,
        now: DateTime<Utc>,
    ) {
        let Some(schedule) = self.daily else {
            return;
        };
        let local_now = now.with_timezone(&Local).naive_local();
        if !self.ctx.store.read(|s| schedule.due(s.last_daily, local_now)) {
            return;
        }

        let traffic = self.ctx.store.update(|s| {
            s.last_daily = Some(local_now.date());
            s.traffic.clone()
        });

        let mut lines = snapshot.summary_lines();
        if let (Some(cycle), Some(rates)) = (traffic, rates) {
            let (rx, tx) = month_to_date(&cycle, rates.rx_total, rates.tx_total);
            lines.push(format!(
                "Traffic {}: ↓ {} ↑ {}",
                cycle.month,
                format_bytes(rx),
                format_bytes(tx)
            ));
        }
        let title = format!("Daily snapshot {}", local_now.date());
        self.ctx.notify(&Notification::new("🗓", title, lines)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_summary() {
        let now = Utc::now();
        let points = vec![
            MetricDataPoint::new(now, metrics::LOAD_1, 1.5),
            MetricDataPoint::new(now, metrics::LOAD_5, 1.0),
            MetricDataPoint::new(now, metrics::LOAD_15, 0.5),
            MetricDataPoint::new(now, metrics::LOAD_1_PER_CORE, 0.375),
            MetricDataPoint::new(now, metrics::MEM_AVAILABLE_PERCENT, 42.0),
            MetricDataPoint::new(now, metrics::MEM_AVAILABLE_BYTES, 860.0),
            MetricDataPoint::new(now, metrics::MEM_TOTAL_BYTES, 2048.0),
            MetricDataPoint::new(now, metrics::ROOT_FS_USED_PERCENT, 61.26),
        ];
        let lines = MetricsSnapshot::from_points(&points).summary_lines();
        assert_eq!(
            lines,
            vec![
                "Load: 1.50 1.00 0.50 (0.38/core)",
                "Memory: 42.0% available (860 B of 2.0 KiB)",
                "Disk /: 61.3% used",
            ]
        );
    }
}
