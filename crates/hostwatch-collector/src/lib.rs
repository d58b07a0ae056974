//! Metric collection for the hostwatch agent.
//!
//! Each [`Collector`] samples one category of host state (memory and swap,
//! load, CPU iowait, network throughput, root filesystem) and returns
//! [`MetricDataPoint`]s that the alert engine compares against thresholds.
//! Collectors that compute rates keep their previous counter readings
//! in-memory; the first tick after start reports a rate of zero.

pub mod cpu;
pub mod disk;
pub mod load;
pub mod memory;
pub mod network;
pub mod procfs;

use anyhow::Result;
use chrono::{DateTime, Utc};
use hostwatch_common::types::MetricDataPoint;

/// Metric names emitted by the built-in collectors.
pub mod metrics {
    pub const MEM_AVAILABLE_PERCENT: &str = "memory.available_percent";
    pub const MEM_TOTAL_BYTES: &str = "memory.total_bytes";
    pub const MEM_AVAILABLE_BYTES: &str = "memory.available_bytes";
    pub const SWAP_USED_PERCENT: &str = "memory.swap_used_percent";
    pub const SWAP_IN_PER_SEC: &str = "memory.swap_in_pages_per_sec";
    pub const LOAD_1: &str = "system.load_1";
    pub const LOAD_5: &str = "system.load_5";
    pub const LOAD_15: &str = "system.load_15";
    pub const LOAD_1_PER_CORE: &str = "system.load_1_per_core";
    pub const CPU_IOWAIT_PERCENT: &str = "cpu.iowait_percent";
    pub const NET_RX_BYTES_PER_SEC: &str = "network.rx_bytes_per_sec";
    pub const NET_TX_BYTES_PER_SEC: &str = "network.tx_bytes_per_sec";
    pub const NET_RX_PACKETS_PER_SEC: &str = "network.rx_packets_per_sec";
    pub const NET_TX_PACKETS_PER_SEC: &str = "network.tx_packets_per_sec";
    pub const ROOT_FS_USED_PERCENT: &str = "disk.root_used_percent";
}

/// A host metric collector.
///
/// Implementations are registered in the agent's metrics loop and called
/// once per tick. The trait requires `Send + Sync` so collectors can live inside
/// a spawned task and be borrowed across its await points.
pub trait Collector: Send + Sync {
    /// Returns the collector name (e.g., `"memory"`), used for logging.
    fn name(&self) -> &str;

    /// Collects current metric values stamped with `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying system source cannot be read.
    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricDataPoint>>;
}

/// `part / total` as a percentage, zero when `total` is zero.
pub fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
