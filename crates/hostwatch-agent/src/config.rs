use serde::{Deserialize, Deserializer};
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    // ---- Notification sink ----
    #[serde(default)]
    pub telegram_bot_token: String,
    #[serde(default)]
    pub telegram_chat_id: String,
    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,
    #[serde(default = "default_send_timeout_sec")]
    pub send_timeout_sec: u64,
    #[serde(default = "default_send_min_interval_ms")]
    pub send_min_interval_ms: u64,

    // ---- State / scheduling ----
    #[serde(default = "default_state_path")]
    pub state_path: String,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_cooldown_sec")]
    pub cooldown_sec: u64,
    /// 0 disables the heartbeat
    #[serde(default = "default_heartbeat_hours")]
    pub heartbeat_hours: u64,
    #[serde(default = "default_proc_root")]
    pub proc_root: String,

    // ---- Network probe ----
    #[serde(default = "default_ping_targets", deserialize_with = "string_or_list")]
    pub ping_targets: Vec<String>,
    #[serde(default = "default_ping_interval_sec")]
    pub ping_interval_sec: u64,
    #[serde(default = "default_ping_window")]
    pub ping_window: usize,
    #[serde(default)]
    pub ping_mode: PingMode,
    #[serde(default)]
    pub ping_engine: PingEngine,
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    #[serde(default = "default_loss_alert_pct")]
    pub loss_alert_pct: f64,
    #[serde(default = "default_latency_alert_ms")]
    pub latency_alert_ms: f64,
    #[serde(default = "default_jitter_alert_ms")]
    pub jitter_alert_ms: f64,
    #[serde(default = "default_flap_suppress_sec")]
    pub flap_suppress_sec: u64,

    // ---- Resource thresholds ----
    #[serde(default = "default_mem_avail_pct_min")]
    pub mem_avail_pct_min: f64,
    #[serde(default = "default_swap_used_pct_max")]
    pub swap_used_pct_max: f64,
    #[serde(default = "default_swap_in_pages_per_sec_max")]
    pub swap_in_pages_per_sec_max: f64,
    #[serde(default = "default_load1_per_core_max")]
    pub load1_per_core_max: f64,
    #[serde(default = "default_cpu_iowait_pct_max")]
    pub cpu_iowait_pct_max: f64,
    #[serde(default = "default_root_fs_pct_max")]
    pub root_fs_pct_max: f64,
    /// Network rate limits; 0 disables each one
    #[serde(default)]
    pub net_rx_bytes_per_sec_max: f64,
    #[serde(default)]
    pub net_tx_bytes_per_sec_max: f64,
    #[serde(default)]
    pub net_rx_pps_max: f64,
    #[serde(default)]
    pub net_tx_pps_max: f64,
    #[serde(default)]
    pub watch_procs: WatchProcs,

    // ---- Log watchers ----
    #[serde(default = "default_access_log_path")]
    pub access_log_path: String,
    #[serde(default = "default_auth_log_path")]
    pub auth_log_path: String,
    #[serde(default = "default_auth_fail_count")]
    pub auth_fail_count: usize,
    #[serde(default = "default_auth_fail_window_min")]
    pub auth_fail_window_min: u64,

    // ---- Certificates ----
    #[serde(default, deserialize_with = "string_or_list")]
    pub cert_check_domains: Vec<String>,
    #[serde(default = "default_cert_globs", deserialize_with = "string_or_list")]
    pub cert_globs: Vec<String>,
    #[serde(default = "default_cert_discover_proxy")]
    pub cert_discover_proxy: bool,
    #[serde(default = "default_cert_min_days")]
    pub cert_min_days: i64,
    #[serde(default = "default_cert_check_interval_hours")]
    pub cert_check_interval_hours: u64,

    // ---- Traffic / reports ----
    /// 0 disables progress summaries; month rollover summaries are always sent
    #[serde(default = "default_traffic_report_every_days")]
    pub traffic_report_every_days: u32,
    #[serde(default = "default_traffic_report_hour")]
    pub traffic_report_hour: u32,
    /// `HH:MM` local time; empty disables the daily snapshot
    #[serde(default = "default_daily_report_time")]
    pub daily_report_time: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PingMode {
    #[default]
    All,
    RoundRobin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PingEngine {
    #[default]
    Tcp,
    Icmp,
}

/// Which processes to watch: an explicit list, or services discovered on
/// the host each tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchProcs {
    Auto,
    List(Vec<String>),
}

impl Default for WatchProcs {
    fn default() -> Self {
        WatchProcs::List(Vec::new())
    }
}

impl<'de> Deserialize<'de> for WatchProcs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = string_or_list(deserializer)?;
        match items.as_slice() {
            [only] if only.eq_ignore_ascii_case("auto") => Ok(WatchProcs::Auto),
            _ => Ok(WatchProcs::List(items)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

/// Accepts `"a, b"` as well as `["a", "b"]`; blanks are dropped.
fn string_or_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s.split(',').map(str::to_string).collect(),
        StringOrList::Many(v) => v,
    };
    Ok(raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn default_telegram_api_base() -> String {
    hostwatch_notify::channels::telegram::DEFAULT_API_BASE.to_string()
}

fn default_send_timeout_sec() -> u64 {
    10
}

fn default_send_min_interval_ms() -> u64 {
    1000
}

fn default_state_path() -> String {
    "/var/lib/hostwatch/state.json".to_string()
}

fn default_tick_secs() -> u64 {
    10
}

fn default_cooldown_sec() -> u64 {
    1800
}

fn default_heartbeat_hours() -> u64 {
    24
}

fn default_proc_root() -> String {
    "/proc".to_string()
}

fn default_ping_targets() -> Vec<String> {
    vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()]
}

fn default_ping_interval_sec() -> u64 {
    5
}

fn default_ping_window() -> usize {
    20
}

fn default_ping_timeout_ms() -> u64 {
    2000
}

fn default_loss_alert_pct() -> f64 {
    20.0
}

fn default_latency_alert_ms() -> f64 {
    300.0
}

fn default_jitter_alert_ms() -> f64 {
    100.0
}

fn default_flap_suppress_sec() -> u64 {
    120
}

fn default_mem_avail_pct_min() -> f64 {
    10.0
}

fn default_swap_used_pct_max() -> f64 {
    50.0
}

fn default_swap_in_pages_per_sec_max() -> f64 {
    200.0
}

fn default_load1_per_core_max() -> f64 {
    2.0
}

fn default_cpu_iowait_pct_max() -> f64 {
    30.0
}

fn default_root_fs_pct_max() -> f64 {
    90.0
}

fn default_access_log_path() -> String {
    "/var/log/nginx/access.log".to_string()
}

fn default_auth_log_path() -> String {
    "/var/log/auth.log".to_string()
}

fn default_auth_fail_count() -> usize {
    30
}

fn default_auth_fail_window_min() -> u64 {
    10
}

fn default_cert_globs() -> Vec<String> {
    vec!["/etc/letsencrypt/live/*/fullchain.pem".to_string()]
}

fn default_cert_discover_proxy() -> bool {
    true
}

fn default_cert_min_days() -> i64 {
    14
}

fn default_cert_check_interval_hours() -> u64 {
    12
}

fn default_traffic_report_every_days() -> u32 {
    7
}

fn default_traffic_report_hour() -> u32 {
    9
}

fn default_daily_report_time() -> String {
    "09:00".to_string()
}

impl AgentConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn telegram_enabled(&self) -> bool {
        !self.telegram_bot_token.is_empty() && !self.telegram_chat_id.is_empty()
    }
}
