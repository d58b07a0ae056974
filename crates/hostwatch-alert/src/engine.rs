use crate::AlertRule;
use hostwatch_common::types::{AlertEvent, MetricDataPoint};

/// Evaluates registered rules against each tick's samples.
///
/// Stateless across ticks: the engine reports every breach it sees and the
/// caller gates delivery through the state store's cooldown.
pub struct AlertEngine {
    rules: Vec<Box<dyn AlertRule>>,
}

impl AlertEngine {
    pub fn new(rules: Vec<Box<dyn AlertRule>>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Box<dyn AlertRule>] {
        &self.rules
    }

    pub fn get_rule(&self, key: &str) -> Option<&dyn AlertRule> {
        self.rules.iter().find(|r| r.key() == key).map(|r| r.as_ref())
    }

    pub fn evaluate(&self, points: &[MetricDataPoint]) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        for point in points {
            for rule in &self.rules {
                if rule.metric() != point.metric_name {
                    continue;
                }
                if let Some(event) = rule.evaluate(point) {
                    tracing::debug!(
                        key = %event.key,
                        metric = %point.metric_name,
                        value = point.value,
                        "Threshold breached"
                    );
                    events.push(event);
                }
            }
        }

        events
    }
}
