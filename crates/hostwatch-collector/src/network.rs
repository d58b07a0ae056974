use crate::{metrics, Collector};
use anyhow::Result;
use chrono::{DateTime, Utc};
use hostwatch_common::types::{safe_delta, MetricDataPoint};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use sysinfo::Networks;

/// Loopback plus virtual, tunnel and bridge interfaces.
static EXCLUDED_INTERFACES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(lo|docker\d*|veth.*|br-.*|virbr.*|vnet\d+|tun\d*|tap\d*|wg\d*|tailscale\d*|zt.*|cni\d*|flannel.*|cali.*|kube-.*|lxcbr\d*|lxdbr\d*|podman\d*|dummy\d*)$",
    )
    .expect("valid regex")
});

pub fn is_excluded_interface(name: &str) -> bool {
    EXCLUDED_INTERFACES.is_match(name)
}

/// Cumulative counters of one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
}

#[derive(Debug, Clone, Copy)]
struct CounterSnapshot {
    counters: InterfaceCounters,
    at: DateTime<Utc>,
}

/// Rates summed across non-excluded interfaces, plus the summed cumulative
/// byte counters used for traffic accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetworkRates {
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
    pub rx_packets_per_sec: f64,
    pub tx_packets_per_sec: f64,
    pub rx_total: u64,
    pub tx_total: u64,
}

/// Per-interface previous readings. Snapshots are replaced every update;
/// interfaces that vanish are forgotten.
#[derive(Debug, Default)]
pub struct RateTracker {
    prev: HashMap<String, CounterSnapshot>,
}

impl RateTracker {
    pub fn update<I>(&mut self, readings: I, now: DateTime<Utc>) -> NetworkRates
    where
        I: IntoIterator<Item = (String, InterfaceCounters)>,
    {
        let mut rates = NetworkRates::default();
        let mut next = HashMap::new();

        for (name, counters) in readings {
            if is_excluded_interface(&name) {
                continue;
            }

            rates.rx_total = rates.rx_total.wrapping_add(counters.rx_bytes);
            rates.tx_total = rates.tx_total.wrapping_add(counters.tx_bytes);

            if let Some(prev) = self.prev.get(&name) {
                let elapsed = (now - prev.at).num_milliseconds() as f64 / 1000.0;
                if elapsed > 0.0 {
                    let old = prev.counters;
                    rates.rx_bytes_per_sec += safe_delta(counters.rx_bytes, old.rx_bytes) as f64 / elapsed;
                    rates.tx_bytes_per_sec += safe_delta(counters.tx_bytes, old.tx_bytes) as f64 / elapsed;
                    rates.rx_packets_per_sec +=
                        safe_delta(counters.rx_packets, old.rx_packets) as f64 / elapsed;
                    rates.tx_packets_per_sec +=
                        safe_delta(counters.tx_packets, old.tx_packets) as f64 / elapsed;
                }
            }

            next.insert(name, CounterSnapshot { counters, at: now });
        }

        self.prev = next;
        rates
    }
}

pub struct NetworkCollector {
    networks: Networks,
    tracker: RateTracker,
    last: Option<NetworkRates>,
}

impl NetworkCollector {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
            tracker: RateTracker::default(),
            last: None,
        }
    }

    /// Rates and totals from the most recent `collect`.
    pub fn last_rates(&self) -> Option<NetworkRates> {
        self.last
    }
}

impl Default for NetworkCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for NetworkCollector {
    fn name(&self) -> &str {
        "network"
    }

    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricDataPoint>> {
        self.networks.refresh(true);

        let readings: Vec<(String, InterfaceCounters)> = self
            .networks
            .iter()
            .map(|(name, data)| {
                (
                    name.clone(),
                    InterfaceCounters {
                        rx_bytes: data.total_received(),
                        rx_packets: data.total_packets_received(),
                        tx_bytes: data.total_transmitted(),
                        tx_packets: data.total_packets_transmitted(),
                    },
                )
            })
            .collect();

        let rates = self.tracker.update(readings, now);
        self.last = Some(rates);

        Ok(vec![
            MetricDataPoint::new(now, metrics::NET_RX_BYTES_PER_SEC, rates.rx_bytes_per_sec),
            MetricDataPoint::new(now, metrics::NET_TX_BYTES_PER_SEC, rates.tx_bytes_per_sec),
            MetricDataPoint::new(now, metrics::NET_RX_PACKETS_PER_SEC, rates.rx_packets_per_sec),
            MetricDataPoint::new(now, metrics::NET_TX_PACKETS_PER_SEC, rates.tx_packets_per_sec),
        ])
    }
}
