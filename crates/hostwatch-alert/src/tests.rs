use crate::bruteforce::BruteForceTracker;
use crate::engine::AlertEngine;
use crate::flap::{LinkMonitor, LinkState, LinkTransition};
use crate::quality::{
    evaluate_quality, iqr, median, quantile, QualityStats, QualityThresholds, NET_JITTER_KEY,
    NET_LATENCY_KEY, NET_LOSS_KEY,
};
use crate::rules::threshold::{CompareOp, ThresholdRule};
use crate::window::{ProbeSample, ProbeWindow, SlidingWindow};
use crate::AlertRule;
use chrono::{Duration, TimeZone, Utc};
use hostwatch_common::types::{MetricDataPoint, Severity};

fn t(secs: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
}

fn thresholds() -> QualityThresholds {
    QualityThresholds {
        loss_pct: 60.0,
        latency_ms: 200.0,
        jitter_ms: 50.0,
    }
}

fn rule(key: &str, metric: &str, op: CompareOp, value: f64) -> Box<dyn AlertRule> {
    Box::new(ThresholdRule {
        key: key.into(),
        title: key.into(),
        metric: metric.into(),
        label: "Value".into(),
        unit: "%".into(),
        severity: Severity::Warning,
        operator: op,
        value,
    })
}

#[test]
fn engine_routes_points_to_matching_rules() {
    let engine = AlertEngine::new(vec![
        rule("mem_low", "memory.available_percent", CompareOp::LessThan, 10.0),
        rule("disk_full", "disk.root_used_percent", CompareOp::GreaterEqual, 90.0),
    ]);
    let events = engine.evaluate(&[
        MetricDataPoint::new(t(0), "memory.available_percent", 8.0),
        MetricDataPoint::new(t(0), "disk.root_used_percent", 45.0),
        MetricDataPoint::new(t(0), "system.load_1", 99.0),
    ]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, "mem_low");
    assert!(events[0].lines[0].contains("8.0%"));
    assert!(engine.get_rule("disk_full").is_some());
}

#[test]
fn probe_window_drops_oldest_at_capacity() {
    let mut window = ProbeWindow::new(3);
    window.push(ProbeSample::ok(10.0));
    window.push(ProbeSample::failed());
    window.push(ProbeSample::failed());
    assert!(!window.last_n_all_failed(3));
    window.push(ProbeSample::failed());
    assert_eq!(window.len(), 3);
    assert!(window.last_n_all_failed(3));
    assert_eq!(window.latest(), Some(&ProbeSample::failed()));
}

#[test]
fn last_n_needs_enough_samples() {
    let mut window = ProbeWindow::new(10);
    window.push(ProbeSample::failed());
    window.push(ProbeSample::failed());
    assert!(!window.last_n_all_failed(3));
}

#[test]
fn quantiles_interpolate() {
    let data = [1.0, 2.0, 3.0, 4.0];
    assert_eq!(median(&data), Some(2.5));
    assert_eq!(quantile(&data, 0.25), Some(1.75));
    assert_eq!(quantile(&data, 0.75), Some(3.25));
    assert_eq!(iqr(&data), Some(1.5));
    assert_eq!(median(&[7.0]), Some(7.0));
    assert_eq!(median(&[]), None);
}

#[test]
fn loss_of_thirteen_in_twenty_fires() {
    let mut window = ProbeWindow::new(20);
    for i in 0..20 {
        window.push(if i < 13 {
            ProbeSample::failed()
        } else {
            ProbeSample::ok(20.0)
        });
    }
    let stats = QualityStats::compute([&window]);
    assert_eq!(stats.total, 20);
    assert_eq!(stats.failures, 13);
    assert!((stats.loss_pct - 65.0).abs() < 1e-9);

    let events = evaluate_quality(&stats, 20, &thresholds(), t(0));
    let loss: Vec<_> = events.iter().filter(|e| e.key == NET_LOSS_KEY).collect();
    assert_eq!(loss.len(), 1);
    assert!(loss[0].lines[0].contains("65.0%"));
}

#[test]
fn loss_needs_half_capacity() {
    let mut window = ProbeWindow::new(20);
    for _ in 0..9 {
        window.push(ProbeSample::failed());
    }
    let stats = QualityStats::compute([&window]);
    assert_eq!(stats.loss_pct, 100.0);
    assert!(evaluate_quality(&stats, 20, &thresholds(), t(0)).is_empty());

    window.push(ProbeSample::failed());
    let stats = QualityStats::compute([&window]);
    assert_eq!(evaluate_quality(&stats, 20, &thresholds(), t(0)).len(), 1);
}

#[test]
fn stats_combine_all_windows() {
    let mut a = ProbeWindow::new(5);
    let mut b = ProbeWindow::new(5);
    for rtt in [250.0, 260.0, 270.0] {
        a.push(ProbeSample::ok(rtt));
    }
    for rtt in [240.0, 500.0] {
        b.push(ProbeSample::ok(rtt));
    }
    let stats = QualityStats::compute([&a, &b]);
    assert_eq!(stats.rtt_count, 5);
    assert_eq!(stats.median_rtt_ms, Some(260.0));

    let events = evaluate_quality(&stats, 10, &thresholds(), t(0));
    assert!(events.iter().any(|e| e.key == NET_LATENCY_KEY));
    assert!(!events.iter().any(|e| e.key == NET_LOSS_KEY));
    // IQR of [240, 250, 260, 270, 500] is 270 - 250
    assert!(!events.iter().any(|e| e.key == NET_JITTER_KEY));
}

#[test]
fn latency_requires_more_than_three_rtts() {
    let mut window = ProbeWindow::new(10);
    for _ in 0..3 {
        window.push(ProbeSample::ok(900.0));
    }
    let stats = QualityStats::compute([&window]);
    assert!(evaluate_quality(&stats, 4, &thresholds(), t(0)).is_empty());

    window.push(ProbeSample::ok(900.0));
    let stats = QualityStats::compute([&window]);
    let events = evaluate_quality(&stats, 4, &thresholds(), t(0));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, NET_LATENCY_KEY);
}

#[test]
fn jitter_fires_on_wide_spread() {
    let mut window = ProbeWindow::new(10);
    for rtt in [10.0, 20.0, 150.0, 160.0, 170.0] {
        window.push(ProbeSample::ok(rtt));
    }
    let stats = QualityStats::compute([&window]);
    let events = evaluate_quality(&stats, 10, &thresholds(), t(0));
    assert!(events.iter().any(|e| e.key == NET_JITTER_KEY));
}

#[test]
fn link_goes_down_once() {
    let mut link = LinkMonitor::new(60);
    assert_eq!(link.observe(false, true, t(0)), None);
    assert_eq!(link.observe(true, false, t(10)), Some(LinkTransition::WentDown));
    assert_eq!(link.observe(true, false, t(20)), None);
    assert!(link.is_down());
}

#[test]
fn recovery_waits_for_flap_window() {
    let mut link = LinkMonitor::new(60);
    link.observe(true, false, t(0));

    // Reachable again after 10s, but not stable long enough
    assert_eq!(link.observe(false, true, t(10)), None);
    assert_eq!(link.observe(false, true, t(40)), None);
    assert_eq!(link.observe(false, true, t(69)), None);
    assert_eq!(
        link.observe(false, true, t(70)),
        Some(LinkTransition::Recovered {
            outage: Duration::seconds(10)
        })
    );
    assert_eq!(link.state(), LinkState::Up);
}

#[test]
fn flapping_resets_up_streak() {
    let mut link = LinkMonitor::new(60);
    link.observe(true, false, t(0));
    assert_eq!(link.observe(false, true, t(100)), None);
    // Drops again before the streak matured
    assert_eq!(link.observe(true, false, t(130)), None);
    assert_eq!(link.observe(false, true, t(140)), None);
    assert_eq!(link.observe(false, true, t(190)), None);
    assert!(matches!(
        link.observe(false, true, t(200)),
        Some(LinkTransition::Recovered { .. })
    ));
}

#[test]
fn no_recovery_before_flap_window_from_down() {
    let flap = 30;
    for up_at in 1..flap {
        let mut link = LinkMonitor::new(flap as u64);
        link.observe(true, false, t(0));
        for s in up_at..(up_at + flap) {
            assert_eq!(link.observe(false, true, t(s)), None, "up_at={up_at} s={s}");
        }
        assert!(link.observe(false, true, t(up_at + flap)).is_some());
    }
}

#[test]
fn sliding_window_evicts_old_events() {
    let mut window = SlidingWindow::new(Duration::minutes(10));
    assert_eq!(window.push(t(0)), 1);
    assert_eq!(window.push(t(300)), 2);
    assert_eq!(window.push(t(601)), 2);
    assert_eq!(window.newest(), Some(t(601)));
}

#[test]
fn brute_force_threshold_reached_on_thirtieth_attempt() {
    let mut tracker = BruteForceTracker::new(Duration::minutes(10), 30);
    for i in 0..29 {
        assert_eq!(tracker.record("1.2.3.4", t(i * 10)), None);
    }
    assert_eq!(tracker.record("1.2.3.4", t(290)), Some(30));
    assert_eq!(tracker.record("1.2.3.4", t(295)), Some(31));
    assert_eq!(tracker.record("5.6.7.8", t(295)), None);
}

#[test]
fn brute_force_window_slides() {
    let mut tracker = BruteForceTracker::new(Duration::minutes(10), 3);
    tracker.record("1.2.3.4", t(0));
    tracker.record("1.2.3.4", t(60));
    assert_eq!(tracker.record("1.2.3.4", t(700)), None);

    tracker.record("9.9.9.9", t(700));
    tracker.prune(t(2000));
    assert_eq!(tracker.tracked_sources(), 0);
}
