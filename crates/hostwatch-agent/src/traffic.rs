//! Calendar-month traffic accounting against persisted counter baselines.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use hostwatch_common::types::{format_bytes, safe_delta, Notification};
use hostwatch_storage::TrafficState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrafficReport {
    /// Totals of a finished cycle, emitted once on rollover.
    LastMonth { month: String, rx: u64, tx: u64 },
    /// Month-to-date totals; the baseline is kept.
    Progress { date: NaiveDate, rx: u64, tx: u64 },
}

impl TrafficReport {
    pub fn to_notification(&self) -> Notification {
        let (title, rx, tx) = match self {
            TrafficReport::LastMonth { month, rx, tx } => (format!("Traffic for {month}"), *rx, *tx),
            TrafficReport::Progress { date, rx, tx } => (
                format!("Traffic so far in {}", date.format("%Y-%m")),
                *rx,
                *tx,
            ),
        };
        Notification::new(
            "📊",
            title,
            vec![
                format!("Download: {}", format_bytes(rx)),
                format!("Upload: {}", format_bytes(tx)),
                format!("Total: {}", format_bytes(rx.saturating_add(tx))),
            ],
        )
    }
}

pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().is_none_or(|next| next.month() != date.month())
}

/// Month-to-date `(rx, tx)` relative to the stored baseline.
pub fn month_to_date(state: &TrafficState, rx_total: u64, tx_total: u64) -> (u64, u64) {
    (
        safe_delta(rx_total, state.start_rx),
        safe_delta(tx_total, state.start_tx),
    )
}

/// Decides rollover and progress reports for one observation of the
/// cumulative counters. `local_now` is wall-clock local time.
#[derive(Debug, Clone, Copy)]
pub struct TrafficAccountant {
    /// 0 disables progress summaries.
    pub every_days: u32,
    pub report_hour: u32,
}

impl TrafficAccountant {
    pub fn new(every_days: u32, report_hour: u32) -> Self {
        Self {
            every_days,
            report_hour,
        }
    }

    /// Mutates `state` in place and returns the reports to send.
    pub fn step(
        &self,
        state: &mut Option<TrafficState>,
        rx_total: u64,
        tx_total: u64,
        local_now: NaiveDateTime,
    ) -> Vec<TrafficReport> {
        let today = local_now.date();
        let current = month_key(today);
        let mut reports = Vec::new();

        let rollover = state.as_ref().is_none_or(|s| s.month != current);
        if rollover {
            if let Some(previous) = state.take() {
                let (rx, tx) = month_to_date(&previous, rx_total, tx_total);
                reports.push(TrafficReport::LastMonth {
                    month: previous.month,
                    rx,
                    tx,
                });
            }
            *state = Some(TrafficState {
                month: current,
                start_rx: rx_total,
                start_tx: tx_total,
                last_report_day: None,
            });
        }

        if let Some(cycle) = state.as_mut() {
            if self.progress_due(cycle, local_now) {
                let (rx, tx) = month_to_date(cycle, rx_total, tx_total);
                cycle.last_report_day = Some(today);
                reports.push(TrafficReport::Progress { date: today, rx, tx });
            }
        }

        reports
    }

    fn progress_due(&self, cycle: &TrafficState, local_now: NaiveDateTime) -> bool {
        if self.every_days == 0 {
            return false;
        }
        let today = local_now.date();
        let cadence_day = today.day() % self.every_days == 0 || is_last_day_of_month(today);
        cadence_day
            && local_now.hour() >= self.report_hour
            && cycle.last_report_day != Some(today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn first_run_sets_baseline_silently() {
        let accountant = TrafficAccountant::new(7, 9);
        let mut state = None;
        let reports = accountant.step(&mut state, 1_000, 2_000, at(2025, 1, 3, 12));
        assert!(reports.is_empty());
        let cycle = state.unwrap();
        assert_eq!(cycle.month, "2025-01");
        assert_eq!((cycle.start_rx, cycle.start_tx), (1_000, 2_000));
    }

    #[test]
    fn month_rollover_emits_one_summary_and_resets() {
        let accountant = TrafficAccountant::new(7, 9);
        let mut state = Some(TrafficState {
            month: "2025-01".into(),
            start_rx: 10_000,
            start_tx: 5_000,
            last_report_day: None,
        });

        let reports = accountant.step(&mut state, 70_000, 25_000, at(2025, 2, 1, 0));
        assert_eq!(
            reports,
            vec![TrafficReport::LastMonth {
                month: "2025-01".into(),
                rx: 60_000,
                tx: 20_000,
            }]
        );
        let cycle = state.clone().unwrap();
        assert_eq!(cycle.month, "2025-02");
        assert_eq!((cycle.start_rx, cycle.start_tx), (70_000, 25_000));

        // Same month again: no second summary
        assert!(accountant
            .step(&mut state, 80_000, 30_000, at(2025, 2, 1, 1))
            .is_empty());
    }

    #[test]
    fn rollover_handles_counter_wrap() {
        let accountant = TrafficAccountant::new(0, 9);
        let mut state = Some(TrafficState {
            month: "2025-01".into(),
            start_rx: u64::MAX - 9,
            start_tx: 0,
            last_report_day: None,
        });
        let reports = accountant.step(&mut state, 10, 0, at(2025, 2, 1, 0));
        assert_eq!(
            reports,
            vec![TrafficReport::LastMonth {
                month: "2025-01".into(),
                rx: 20,
                tx: 0,
            }]
        );
    }

    #[test]
    fn progress_on_cadence_days_once_per_day() {
        let accountant = TrafficAccountant::new(7, 9);
        let mut state = Some(TrafficState {
            month: "2025-03".into(),
            start_rx: 0,
            start_tx: 0,
            last_report_day: None,
        });

        // Day 6: not a cadence day
        assert!(accountant.step(&mut state, 100, 100, at(2025, 3, 6, 12)).is_empty());
        // Day 7 before the report hour
        assert!(accountant.step(&mut state, 100, 100, at(2025, 3, 7, 8)).is_empty());

        let reports = accountant.step(&mut state, 300, 100, at(2025, 3, 7, 9));
        assert_eq!(
            reports,
            vec![TrafficReport::Progress {
                date: NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
                rx: 300,
                tx: 100,
            }]
        );
        assert!(accountant.step(&mut state, 400, 100, at(2025, 3, 7, 18)).is_empty());
        assert_eq!(state.unwrap().start_rx, 0);
    }

    #[test]
    fn progress_on_last_day_of_month() {
        let accountant = TrafficAccountant::new(7, 9);
        let mut state = Some(TrafficState {
            month: "2024-02".into(),
            start_rx: 0,
            start_tx: 0,
            last_report_day: None,
        });
        let reports = accountant.step(&mut state, 1, 1, at(2024, 2, 29, 10));
        assert_eq!(reports.len(), 1);
        assert!(is_last_day_of_month(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()));
        assert!(!is_last_day_of_month(NaiveDate::from_ymd_opt(2025, 2, 27).unwrap()));
    }

    #[test]
    fn summary_formats_bytes() {
        let n = TrafficReport::LastMonth {
            month: "2025-01".into(),
            rx: 1536,
            tx: 512,
        }
        .to_notification();
        assert_eq!(n.title, "Traffic for 2025-01");
        assert_eq!(n.lines, vec!["Download: 1.5 KiB", "Upload: 512 B", "Total: 2.0 KiB"]);
    }
}
