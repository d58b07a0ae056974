use crate::window::SlidingWindow;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Idle sources are swept after this many recorded attempts.
const PRUNE_EVERY: usize = 256;

/// Failed-login counter per source IP over a trailing window.
#[derive(Debug)]
pub struct BruteForceTracker {
    window: Duration,
    threshold: usize,
    per_ip: HashMap<String, SlidingWindow>,
    since_prune: usize,
}

impl BruteForceTracker {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            window,
            threshold: threshold.max(1),
            per_ip: HashMap::new(),
            since_prune: 0,
        }
    }

    /// Records one failed attempt. Returns the in-window count once it has
    /// reached the threshold.
    pub fn record(&mut self, ip: &str, at: DateTime<Utc>) -> Option<usize> {
        self.since_prune += 1;
        if self.since_prune >= PRUNE_EVERY {
            self.prune(at);
        }

        let window = self.window;
        let count = self
            .per_ip
            .entry(ip.to_string())
            .or_insert_with(|| SlidingWindow::new(window))
            .push(at);

        (count >= self.threshold).then_some(count)
    }

    /// Drops sources with no attempt inside the window.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.since_prune = 0;
        self.per_ip.retain(|_, w| {
            w.evict(now);
            !w.is_empty()
        });
    }

    pub fn tracked_sources(&self) -> usize {
        self.per_ip.len()
    }
}
