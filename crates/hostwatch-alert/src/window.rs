use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Outcome of one connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSample {
    pub success: bool,
    pub rtt_ms: Option<f64>,
}

impl ProbeSample {
    pub fn ok(rtt_ms: f64) -> Self {
        Self {
            success: true,
            rtt_ms: Some(rtt_ms),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            rtt_ms: None,
        }
    }
}

/// Bounded FIFO of probe samples for one target.
#[derive(Debug, Clone)]
pub struct ProbeWindow {
    capacity: usize,
    samples: VecDeque<ProbeSample>,
}

impl ProbeWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: ProbeSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn samples(&self) -> impl Iterator<Item = &ProbeSample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&ProbeSample> {
        self.samples.back()
    }

    /// True when at least `n` samples exist and the newest `n` all failed.
    pub fn last_n_all_failed(&self, n: usize) -> bool {
        self.samples.len() >= n && self.samples.iter().rev().take(n).all(|s| !s.success)
    }
}

/// Event timestamps within a trailing time window.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    window: Duration,
    events: VecDeque<DateTime<Utc>>,
}

impl SlidingWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            events: VecDeque::new(),
        }
    }

    /// Records `at`, drops events older than the window relative to `at`,
    /// and returns the remaining count.
    pub fn push(&mut self, at: DateTime<Utc>) -> usize {
        self.events.push_back(at);
        self.evict(at);
        self.events.len()
    }

    pub fn evict(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while let Some(front) = self.events.front() {
            if *front < cutoff {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.events.back().copied()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
