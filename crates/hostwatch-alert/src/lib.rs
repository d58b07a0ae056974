//! Detection logic for the hostwatch agent.
//!
//! Everything here is pure and clock-injected: rules turn samples into
//! [`AlertEvent`]s, windows and trackers keep bounded history, and the
//! link monitor debounces up/down transitions. Cooldown gating happens in
//! the agent against the persisted state store, not in this crate.

pub mod bruteforce;
pub mod engine;
pub mod flap;
pub mod quality;
pub mod rules;
pub mod window;

#[cfg(test)]
mod tests;

use hostwatch_common::types::{AlertEvent, MetricDataPoint, Severity};

/// A rule that inspects one metric data point and optionally produces an
/// [`AlertEvent`].
///
/// Rules are registered in the [`engine::AlertEngine`] and evaluated for
/// every incoming data point whose metric name matches.
pub trait AlertRule: Send + Sync {
    /// Cooldown key for alerts produced by this rule (e.g., `"mem_low"`).
    fn key(&self) -> &str;

    /// The metric name this rule applies to (e.g., `"memory.available_percent"`).
    fn metric(&self) -> &str;

    /// The severity level assigned to alerts produced by this rule.
    fn severity(&self) -> Severity;

    /// Returns an alert event if the rule condition is met.
    fn evaluate(&self, point: &MetricDataPoint) -> Option<AlertEvent>;
}
