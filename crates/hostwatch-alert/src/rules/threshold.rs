use crate::AlertRule;
use hostwatch_common::types::{AlertEvent, MetricDataPoint, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
}

impl CompareOp {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
            Self::GreaterEqual => value >= threshold,
            Self::LessEqual => value <= threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterEqual => ">=",
            Self::LessEqual => "<=",
        }
    }
}

/// Fires when the latest value of `metric` crosses `value`.
///
/// The rendered line reads `"{label}: {value}{unit} (threshold {op} {limit}{unit})"`,
/// e.g. `Available: 8.0% (threshold < 10.0%)`.
#[derive(Debug, Clone)]
pub struct ThresholdRule {
    pub key: String,
    pub title: String,
    pub metric: String,
    pub label: String,
    pub unit: String,
    pub severity: Severity,
    pub operator: CompareOp,
    pub value: f64,
}

impl ThresholdRule {
    fn format_value(&self, v: f64) -> String {
        format!("{v:.1}{}", self.unit)
    }
}

impl AlertRule for ThresholdRule {
    fn key(&self) -> &str {
        &self.key
    }

    fn metric(&self) -> &str {
        &self.metric
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn evaluate(&self, point: &MetricDataPoint) -> Option<AlertEvent> {
        if point.metric_name != self.metric || !point.value.is_finite() {
            return None;
        }
        if !self.operator.check(point.value, self.value) {
            return None;
        }

        let lines = vec![format!(
            "{}: {} (threshold {} {})",
            self.label,
            self.format_value(point.value),
            self.operator.symbol(),
            self.format_value(self.value),
        )];

        Some(AlertEvent {
            key: self.key.clone(),
            title: self.title.clone(),
            metric_name: self.metric.clone(),
            severity: self.severity,
            lines,
            value: point.value,
            threshold: self.value,
            timestamp: point.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn mem_rule() -> ThresholdRule {
        ThresholdRule {
            key: "mem_low".into(),
            title: "Memory low".into(),
            metric: "memory.available_percent".into(),
            label: "Available".into(),
            unit: "%".into(),
            severity: Severity::Warning,
            operator: CompareOp::LessThan,
            value: 10.0,
        }
    }

    #[test]
    fn fires_below_threshold_with_formatted_line() {
        let point = MetricDataPoint::new(Utc::now(), "memory.available_percent", 8.0);
        let event = mem_rule().evaluate(&point).unwrap();
        assert_eq!(event.key, "mem_low");
        assert_eq!(event.lines[0], "Available: 8.0% (threshold < 10.0%)");
        assert_eq!(event.threshold, 10.0);
    }

    #[test]
    fn quiet_at_or_above_threshold() {
        let rule = mem_rule();
        for v in [10.0, 55.5] {
            let point = MetricDataPoint::new(Utc::now(), "memory.available_percent", v);
            assert!(rule.evaluate(&point).is_none());
        }
    }

    #[test]
    fn ignores_other_metrics_and_nan() {
        let rule = mem_rule();
        assert!(rule
            .evaluate(&MetricDataPoint::new(Utc::now(), "disk.root_used_percent", 1.0))
            .is_none());
        assert!(rule
            .evaluate(&MetricDataPoint::new(Utc::now(), "memory.available_percent", f64::NAN))
            .is_none());
    }

    #[test]
    fn operator_boundaries() {
        assert!(CompareOp::GreaterEqual.check(90.0, 90.0));
        assert!(!CompareOp::GreaterThan.check(90.0, 90.0));
        assert!(CompareOp::LessEqual.check(10.0, 10.0));
        assert_eq!(CompareOp::LessEqual.symbol(), "<=");
    }
}
