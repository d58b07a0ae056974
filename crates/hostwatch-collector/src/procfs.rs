//! Parsers for the `/proc` files sysinfo does not expose.

use hostwatch_common::types::safe_delta;

/// Cumulative CPU state counters from the aggregate `cpu` line of
/// `/proc/stat`, in USER_HZ ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.user
            .wrapping_add(self.nice)
            .wrapping_add(self.system)
            .wrapping_add(self.idle)
            .wrapping_add(self.iowait)
            .wrapping_add(self.irq)
            .wrapping_add(self.softirq)
            .wrapping_add(self.steal)
    }
}

/// Parse the aggregate `cpu ` line. Missing trailing columns (older kernels)
/// default to zero; a line with fewer than four numbers is rejected.
pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    if values.len() < 4 {
        return None;
    }
    let at = |i: usize| values.get(i).copied().unwrap_or(0);
    Some(CpuTimes {
        user: at(0),
        nice: at(1),
        system: at(2),
        idle: at(3),
        iowait: at(4),
        irq: at(5),
        softirq: at(6),
        steal: at(7),
    })
}

/// Share of CPU time spent in iowait between two readings.
pub fn iowait_percent(prev: &CpuTimes, cur: &CpuTimes) -> f64 {
    let total = safe_delta(cur.total(), prev.total());
    if total == 0 {
        return 0.0;
    }
    safe_delta(cur.iowait, prev.iowait) as f64 / total as f64 * 100.0
}

/// Look up a `name value` field in `/proc/vmstat` style content.
pub fn parse_vmstat_field(vmstat: &str, field: &str) -> Option<u64> {
    vmstat.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        if parts.next()? == field {
            parts.next()?.parse().ok()
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "cpu  4705 356 584 3699176 23060 0 277 0 0 0\n\
                        cpu0 1393280 32966 572056 13343292 6130 0 17875 0 23933 0\n\
                        intr 114930548 113199788 3 0 5 263 0 4 [... lots more numbers ...]\n";

    #[test]
    fn parses_aggregate_cpu_line() {
        let t = parse_cpu_times(STAT).unwrap();
        assert_eq!(t.user, 4705);
        assert_eq!(t.idle, 3_699_176);
        assert_eq!(t.iowait, 23_060);
        assert_eq!(t.softirq, 277);
        assert_eq!(t.total(), 4705 + 356 + 584 + 3_699_176 + 23_060 + 277);
    }

    #[test]
    fn rejects_malformed_cpu_line() {
        assert!(parse_cpu_times("cpu  1 2 x 4\n").is_none());
        assert!(parse_cpu_times("cpu  1 2\n").is_none());
        assert!(parse_cpu_times("intr 1 2 3\n").is_none());
    }

    #[test]
    fn iowait_share_of_delta() {
        let prev = CpuTimes {
            user: 100,
            idle: 800,
            iowait: 100,
            ..Default::default()
        };
        let cur = CpuTimes {
            user: 150,
            idle: 850,
            iowait: 200,
            ..Default::default()
        };
        // delta total 200, delta iowait 100
        assert!((iowait_percent(&prev, &cur) - 50.0).abs() < 1e-9);
        assert_eq!(iowait_percent(&cur, &cur), 0.0);
    }

    #[test]
    fn vmstat_field_lookup() {
        let vmstat = "nr_free_pages 12345\npswpin 42\npswpout 7\n";
        assert_eq!(parse_vmstat_field(vmstat, "pswpin"), Some(42));
        assert_eq!(parse_vmstat_field(vmstat, "pswpout"), Some(7));
        assert_eq!(parse_vmstat_field(vmstat, "pgfault"), None);
        assert_eq!(parse_vmstat_field("pswpin abc\n", "pswpin"), None);
    }
}
