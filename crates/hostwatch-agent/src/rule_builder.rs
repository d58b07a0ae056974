use crate::config::AgentConfig;
use hostwatch_alert::rules::threshold::{CompareOp, ThresholdRule};
use hostwatch_alert::AlertRule;
use hostwatch_collector::metrics;
use hostwatch_common::types::Severity;

struct RuleSpec {
    key: &'static str,
    title: &'static str,
    metric: &'static str,
    label: &'static str,
    unit: &'static str,
    severity: Severity,
    operator: CompareOp,
    value: f64,
    /// Rules with a non-positive limit are skipped.
    optional: bool,
}

fn rule_specs(config: &AgentConfig) -> Vec<RuleSpec> {
    vec![
        RuleSpec {
            key: "mem_low",
            title: "Memory low",
            metric: metrics::MEM_AVAILABLE_PERCENT,
            label: "Available",
            unit: "%",
            severity: Severity::Critical,
            operator: CompareOp::LessThan,
            value: config.mem_avail_pct_min,
            optional: false,
        },
        RuleSpec {
            key: "swap_high",
            title: "Swap usage high",
            metric: metrics::SWAP_USED_PERCENT,
            label: "Swap used",
            unit: "%",
            severity: Severity::Warning,
            operator: CompareOp::GreaterThan,
            value: config.swap_used_pct_max,
            optional: false,
        },
        RuleSpec {
            key: "swap_in",
            title: "Heavy swap-in",
            metric: metrics::SWAP_IN_PER_SEC,
            label: "Swap-in",
            unit: " pages/s",
            severity: Severity::Warning,
            operator: CompareOp::GreaterThan,
            value: config.swap_in_pages_per_sec_max,
            optional: true,
        },
        RuleSpec {
            key: "load_high",
            title: "CPU load high",
            metric: metrics::LOAD_1_PER_CORE,
            label: "Load1 per core",
            unit: "",
            severity: Severity::Warning,
            operator: CompareOp::GreaterThan,
            value: config.load1_per_core_max,
            optional: false,
        },
        RuleSpec {
            key: "iowait_high",
            title: "CPU iowait high",
            metric: metrics::CPU_IOWAIT_PERCENT,
            label: "iowait",
            unit: "%",
            severity: Severity::Warning,
            operator: CompareOp::GreaterThan,
            value: config.cpu_iowait_pct_max,
            optional: false,
        },
        RuleSpec {
            key: "disk_full",
            title: "Root filesystem almost full",
            metric: metrics::ROOT_FS_USED_PERCENT,
            label: "Used",
            unit: "%",
            severity: Severity::Critical,
            operator: CompareOp::GreaterEqual,
            value: config.root_fs_pct_max,
            optional: false,
        },
        RuleSpec {
            key: "net_rx_bytes",
            title: "Inbound traffic high",
            metric: metrics::NET_RX_BYTES_PER_SEC,
            label: "RX",
            unit: " B/s",
            severity: Severity::Warning,
            operator: CompareOp::GreaterThan,
            value: config.net_rx_bytes_per_sec_max,
            optional: true,
        },
        RuleSpec {
            key: "net_tx_bytes",
            title: "Outbound traffic high",
            metric: metrics::NET_TX_BYTES_PER_SEC,
            label: "TX",
            unit: " B/s",
            severity: Severity::Warning,
            operator: CompareOp::GreaterThan,
            value: config.net_tx_bytes_per_sec_max,
            optional: true,
        },
        RuleSpec {
            key: "net_rx_pps",
            title: "Inbound packet rate high",
            metric: metrics::NET_RX_PACKETS_PER_SEC,
            label: "RX",
            unit: " pkt/s",
            severity: Severity::Warning,
            operator: CompareOp::GreaterThan,
            value: config.net_rx_pps_max,
            optional: true,
        },
        RuleSpec {
            key: "net_tx_pps",
            title: "Outbound packet rate high",
            metric: metrics::NET_TX_PACKETS_PER_SEC,
            label: "TX",
            unit: " pkt/s",
            severity: Severity::Warning,
            operator: CompareOp::GreaterThan,
            value: config.net_tx_pps_max,
            optional: true,
        },
    ]
}

/// Threshold rules for every configured resource limit.
pub fn build_rules(config: &AgentConfig) -> Vec<Box<dyn AlertRule>> {
    rule_specs(config)
        .into_iter()
        .filter(|spec| !(spec.optional && spec.value <= 0.0))
        .map(|spec| {
            Box::new(ThresholdRule {
                key: spec.key.to_string(),
                title: spec.title.to_string(),
                metric: spec.metric.to_string(),
                label: spec.label.to_string(),
                unit: spec.unit.to_string(),
                severity: spec.severity,
                operator: spec.operator,
                value: spec.value,
            }) as Box<dyn AlertRule>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_rules_skipped_when_zero() {
        let config = AgentConfig::from_toml("").unwrap();
        let keys: Vec<String> = build_rules(&config).iter().map(|r| r.key().to_string()).collect();
        assert_eq!(
            keys,
            vec!["mem_low", "swap_high", "swap_in", "load_high", "iowait_high", "disk_full"]
        );

        let config = AgentConfig::from_toml("net_rx_bytes_per_sec_max = 1e6\nswap_in_pages_per_sec_max = 0").unwrap();
        let keys: Vec<String> = build_rules(&config).iter().map(|r| r.key().to_string()).collect();
        assert!(keys.contains(&"net_rx_bytes".to_string()));
        assert!(!keys.contains(&"swap_in".to_string()));
    }
}
