//! Network reachability probing, link-state tracking and route changes.

use crate::config::{PingEngine, PingMode};
use crate::context::AgentContext;
use crate::inspector::{RouteInfo, SystemInspector};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use hostwatch_alert::flap::{LinkMonitor, LinkTransition, DOWN_AFTER_FAILURES};
use hostwatch_alert::quality::{evaluate_quality, QualityStats, QualityThresholds};
use hostwatch_alert::window::{ProbeSample, ProbeWindow};
use hostwatch_common::types::{format_duration, Notification, Severity};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::task::JoinSet;

pub const NET_DOWN_KEY: &str = "net_down";
pub const ROUTE_CHANGE_KEY: &str = "route_change";

const DEFAULT_TCP_PORT: u16 = 443;

/// `host`, `host:port`, `[v6]:port` or a bare IPv6 address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: String,
    pub port: Option<u16>,
}

impl ProbeTarget {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("empty probe target");
        }

        if let Some(rest) = raw.strip_prefix('[') {
            let Some((host, tail)) = rest.split_once(']') else {
                bail!("unterminated IPv6 literal in {raw:?}");
            };
            let port = match tail.strip_prefix(':') {
                Some(p) => Some(p.parse()?),
                None if tail.is_empty() => None,
                None => bail!("unexpected text after IPv6 literal in {raw:?}"),
            };
            return Ok(Self {
                host: host.to_string(),
                port,
            });
        }

        match raw.matches(':').count() {
            1 => {
                let (host, port) = raw.split_once(':').unwrap_or((raw, ""));
                Ok(Self {
                    host: host.to_string(),
                    port: Some(port.parse()?),
                })
            }
            _ => Ok(Self {
                host: raw.to_string(),
                port: None,
            }),
        }
    }

    pub fn tcp_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_TCP_PORT)
    }

    /// The literal address, or the first one DNS returns for the host.
    pub async fn resolve(&self) -> std::io::Result<IpAddr> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(ip);
        }
        tokio::net::lookup_host((self.host.as_str(), self.tcp_port()))
            .await?
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no addresses for {}", self.host),
                )
            })
    }
}

impl std::fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.port {
            Some(port) if self.host.contains(':') => write!(f, "[{}]:{port}", self.host),
            Some(port) => write!(f, "{}:{port}", self.host),
            None => write!(f, "{}", self.host),
        }
    }
}

/// Connect time to `host:port`; failure on refusal or timeout.
pub async fn probe_tcp(target: &ProbeTarget, timeout: Duration) -> ProbeSample {
    let started = Instant::now();
    let addr = (target.host.as_str(), target.tcp_port());
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => ProbeSample::ok(started.elapsed().as_secs_f64() * 1000.0),
        Ok(Err(e)) => {
            tracing::debug!(probe = %target, error = %e, "TCP probe failed");
            ProbeSample::failed()
        }
        Err(_) => {
            tracing::debug!(probe = %target, "TCP probe timed out");
            ProbeSample::failed()
        }
    }
}

pub async fn probe_icmp(
    inspector: &dyn SystemInspector,
    target: &ProbeTarget,
    timeout: Duration,
) -> ProbeSample {
    let grace = timeout + Duration::from_secs(2);
    match tokio::time::timeout(grace, inspector.icmp_ping(&target.host, timeout)).await {
        Ok(Some(rtt)) => ProbeSample::ok(rtt),
        Ok(None) | Err(_) => ProbeSample::failed(),
    }
}

pub struct NetworkProbe {
    ctx: AgentContext,
    targets: Vec<ProbeTarget>,
    windows: Vec<ProbeWindow>,
    link: LinkMonitor,
    thresholds: QualityThresholds,
    engine: PingEngine,
    mode: PingMode,
    timeout: Duration,
    next: usize,
    last_route: Option<RouteInfo>,
}

impl NetworkProbe {
    pub fn new(ctx: AgentContext) -> Self {
        let config = ctx.config.clone();
        let targets: Vec<ProbeTarget> = config
            .ping_targets
            .iter()
            .filter_map(|raw| match ProbeTarget::parse(raw) {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::warn!(probe = %raw, error = %e, "Ignoring invalid probe target");
                    None
                }
            })
            .collect();

        Self {
            windows: targets.iter().map(|_| ProbeWindow::new(config.ping_window)).collect(),
            targets,
            link: LinkMonitor::new(config.flap_suppress_sec),
            thresholds: QualityThresholds {
                loss_pct: config.loss_alert_pct,
                latency_ms: config.latency_alert_ms,
                jitter_ms: config.jitter_alert_ms,
            },
            engine: config.ping_engine,
            mode: config.ping_mode,
            timeout: Duration::from_millis(config.ping_timeout_ms.max(100)),
            next: 0,
            last_route: None,
            ctx,
        }
    }

    pub fn targets(&self) -> &[ProbeTarget] {
        &self.targets
    }

    pub async fn run(mut self) {
        if self.targets.is_empty() {
            tracing::info!("No probe targets configured, network probe disabled");
            return;
        }
        let secs = self.ctx.config.ping_interval_sec.max(1);
        tracing::info!(
            targets = self.targets.len(),
            interval_secs = secs,
            engine = ?self.engine,
            mode = ?self.mode,
            "Network probe started"
        );

        let mut tick = tokio::time::interval(Duration::from_secs(secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                tracing::warn!(error = %e, "Probe tick failed");
            }
        }
    }

    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.targets.is_empty() {
            return Ok(());
        }

        let indices: Vec<usize> = match self.mode {
            PingMode::All => (0..self.targets.len()).collect(),
            PingMode::RoundRobin => {
                let i = self.next % self.targets.len();
                self.next = (i + 1) % self.targets.len();
                vec![i]
            }
        };

        // Probes run concurrently, each bounded by its own timeout
        let mut set = JoinSet::new();
        for i in indices {
            let target = self.targets[i].clone();
            let inspector = Arc::clone(&self.ctx.inspector);
            let engine = self.engine;
            let timeout = self.timeout;
            set.spawn(async move {
                let sample = match engine {
                    PingEngine::Tcp => probe_tcp(&target, timeout).await,
                    PingEngine::Icmp => probe_icmp(inspector.as_ref(), &target, timeout).await,
                };
                (i, sample)
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((i, sample)) => self.windows[i].push(sample),
                Err(e) => tracing::warn!(error = %e, "Probe task failed"),
            }
        }

        self.evaluate(now).await;
        self.check_route(now).await;
        Ok(())
    }

    async fn evaluate(&mut self, now: DateTime<Utc>) {
        let all_failing = self
            .windows
            .iter()
            .all(|w| w.last_n_all_failed(DOWN_AFTER_FAILURES));
        let any_reachable = self
            .windows
            .iter()
            .any(|w| w.latest().is_some_and(|s| s.success));

        match self.link.observe(all_failing, any_reachable, now) {
            Some(LinkTransition::WentDown) => {
                tracing::warn!(targets = self.targets.len(), "All probe targets unreachable");
                let lines = self
                    .targets
                    .iter()
                    .map(|t| format!("{t}: {DOWN_AFTER_FAILURES} consecutive failures"))
                    .collect();
                let notification =
                    Notification::new(Severity::Critical.icon(), "Network down", lines);
                self.ctx.alert_at(NET_DOWN_KEY, &notification, now).await;
            }
            Some(LinkTransition::Recovered { outage }) => {
                let outage = format_duration(outage.num_seconds());
                tracing::info!(%outage, "Network recovered");
                let notification =
                    Notification::new("✅", "Network recovered", vec![format!("Outage: {outage}")]);
                self.ctx.notify(&notification).await;
            }
            None => {}
        }

        if self.link.is_down() {
            return;
        }

        let stats = QualityStats::compute(&self.windows);
        let capacity = self.windows.iter().map(ProbeWindow::capacity).sum();
        tracing::debug!(
            loss_pct = stats.loss_pct,
            median_rtt_ms = ?stats.median_rtt_ms,
            jitter_ms = ?stats.jitter_ms,
            "Probe statistics"
        );
        for event in evaluate_quality(&stats, capacity, &self.thresholds, now) {
            self.ctx.alert_event(&event).await;
        }
    }

    async fn check_route(&mut self, now: DateTime<Utc>) {
        let target = &self.targets[0];
        let destination = match target.resolve().await {
            Ok(ip) => ip.to_string(),
            Err(e) => {
                tracing::debug!(probe = %target, error = %e, "Route destination did not resolve");
                return;
            }
        };
        let Some(route) = self.ctx.inspector.route(&destination).await else {
            tracing::debug!(destination = %destination, "Route lookup returned nothing");
            return;
        };

        if let Some(previous) = self.last_route.as_ref().filter(|prev| **prev != route) {
            tracing::warn!(from = %previous, to = %route, "Route changed");
            let notification = Notification::new(
                Severity::Warning.icon(),
                "Route changed",
                vec![format!("From: {previous}"), format!("To: {route}")],
            );
            self.ctx.alert_at(ROUTE_CHANGE_KEY, &notification, now).await;
        }
        self.last_route = Some(route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_targets() {
        assert_eq!(
            ProbeTarget::parse("1.1.1.1").unwrap(),
            ProbeTarget {
                host: "1.1.1.1".into(),
                port: None
            }
        );
        let t = ProbeTarget::parse(" example.com:8443 ").unwrap();
        assert_eq!((t.host.as_str(), t.tcp_port()), ("example.com", 8443));
        let t = ProbeTarget::parse("[2606:4700::1111]:53").unwrap();
        assert_eq!((t.host.as_str(), t.port), ("2606:4700::1111", Some(53)));
        assert_eq!(t.to_string(), "[2606:4700::1111]:53");
        let t = ProbeTarget::parse("2606:4700::1111").unwrap();
        assert_eq!((t.host.as_str(), t.tcp_port()), ("2606:4700::1111", 443));
        assert!(ProbeTarget::parse("host:http").is_err());
        assert!(ProbeTarget::parse("").is_err());
    }

    #[tokio::test]
    async fn tcp_probe_measures_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let target = ProbeTarget {
            host: "127.0.0.1".into(),
            port: Some(port),
        };
        let sample = probe_tcp(&target, Duration::from_secs(2)).await;
        assert!(sample.success);
        assert!(sample.rtt_ms.is_some());

        drop(listener);
        let sample = probe_tcp(&target, Duration::from_secs(2)).await;
        assert!(!sample.success);
    }

    #[tokio::test]
    async fn resolves_literals_and_names() {
        let literal = ProbeTarget::parse("[2001:db8::1]:853").unwrap();
        assert_eq!(literal.resolve().await.unwrap(), "2001:db8::1".parse::<IpAddr>().unwrap());

        let named = ProbeTarget::parse("localhost:443").unwrap();
        assert!(named.resolve().await.unwrap().is_loopback());
    }
}
