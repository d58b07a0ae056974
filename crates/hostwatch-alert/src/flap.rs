use chrono::{DateTime, Duration, Utc};

/// Consecutive failures per target that count as "down".
pub const DOWN_AFTER_FAILURES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down {
        since: DateTime<Utc>,
        /// First instant of the current reachable streak while down.
        up_since: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTransition {
    WentDown,
    Recovered { outage: Duration },
}

/// Up/down state of the whole probe set with debounced recovery.
///
/// Going down is immediate. Coming back up requires targets to stay
/// reachable for `flap_suppress` and the outage itself to be at least
/// `flap_suppress` old, so a link toggling every few seconds yields one
/// down alert and one recovery instead of a storm.
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    state: LinkState,
    flap_suppress: Duration,
}

impl LinkMonitor {
    pub fn new(flap_suppress_secs: u64) -> Self {
        Self {
            state: LinkState::Up,
            flap_suppress: Duration::seconds(flap_suppress_secs as i64),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_down(&self) -> bool {
        matches!(self.state, LinkState::Down { .. })
    }

    /// Feeds one tick. `all_failing` means every target's newest
    /// [`DOWN_AFTER_FAILURES`] samples failed; `any_reachable` means at
    /// least one target's newest sample succeeded.
    pub fn observe(
        &mut self,
        all_failing: bool,
        any_reachable: bool,
        now: DateTime<Utc>,
    ) -> Option<LinkTransition> {
        match self.state {
            LinkState::Up => {
                if all_failing {
                    self.state = LinkState::Down {
                        since: now,
                        up_since: None,
                    };
                    return Some(LinkTransition::WentDown);
                }
                None
            }
            LinkState::Down { since, up_since } => {
                if !any_reachable {
                    self.state = LinkState::Down {
                        since,
                        up_since: None,
                    };
                    return None;
                }

                let up_since = up_since.unwrap_or(now);
                if now - up_since >= self.flap_suppress && now - since >= self.flap_suppress {
                    self.state = LinkState::Up;
                    return Some(LinkTransition::Recovered {
                        outage: up_since - since,
                    });
                }

                self.state = LinkState::Down {
                    since,
                    up_since: Some(up_since),
                };
                None
            }
        }
    }
}
