use std::collections::HashMap;
use std::hash::Hash;

use time::{Duration, OffsetDateTime};

pub const DEFAULT_WINDOW: Duration = Duration::seconds(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    Accepted,
    Rejected { seconds_remaining: u64 },
}

impl CooldownDecision {
    pub fn is_accepted(self) -> bool {
        matches!(self, CooldownDecision::Accepted)
    }
}

/// Minimum-interval policy: at most one accepted action per key inside any
/// `window`. Rejections never touch the recorded times.
#[derive(Debug)]
pub struct CooldownGate<K> {
    window: Duration,
    last_accepted: HashMap<K, OffsetDateTime>,
}

impl<K: Eq + Hash> CooldownGate<K> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: HashMap::new(),
        }
    }

    pub fn last_accepted(&self, key: &K) -> Option<OffsetDateTime> {
        self.last_accepted.get(key).copied()
    }

    /// Decides without recording anything.
    pub fn check(&self, key: &K, now: OffsetDateTime) -> CooldownDecision {
        let Some(last) = self.last_accepted.get(key) else {
            return CooldownDecision::Accepted;
        };
        let elapsed = now - *last;
        if elapsed > self.window {
            return CooldownDecision::Accepted;
        }
        let remaining = (self.window - elapsed).min(self.window);
        CooldownDecision::Rejected {
            seconds_remaining: ceil_seconds(remaining).max(1),
        }
    }

    pub fn record(&mut self, key: K, now: OffsetDateTime) {
        self.last_accepted.insert(key, now);
    }

    pub fn try_accept(&mut self, key: K, now: OffsetDateTime) -> CooldownDecision {
        let decision = self.check(&key, now);
        if decision.is_accepted() {
            self.record(key, now);
        }
        decision
    }
}

impl<K: Eq + Hash> Default for CooldownGate<K> {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

fn ceil_seconds(duration: Duration) -> u64 {
    let whole = duration.whole_seconds().max(0) as u64;
    if duration.subsec_nanoseconds() > 0 {
        whole + 1
    } else {
        whole
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use time::macros::datetime;

    const T: OffsetDateTime = datetime!(2024-03-15 12:00 UTC);

    #[test]
    fn second_press_inside_window_is_rejected() {
        let mut gate = CooldownGate::default();
        assert_eq!(gate.try_accept("dad", T), CooldownDecision::Accepted);
        assert_eq!(
            gate.try_accept("dad", T + Duration::seconds(59)),
            CooldownDecision::Rejected {
                seconds_remaining: 1
            }
        );
        assert_eq!(
            gate.try_accept("dad", T + Duration::seconds(61)),
            CooldownDecision::Accepted
        );
    }

    #[test]
    fn rejection_does_not_extend_the_window() {
        let mut gate = CooldownGate::default();
        gate.try_accept("dad", T);
        gate.try_accept("dad", T + Duration::seconds(30));
        assert_eq!(gate.last_accepted(&"dad"), Some(T));
        assert!(gate.try_accept("dad", T + Duration::seconds(61)).is_accepted());
        assert_eq!(
            gate.last_accepted(&"dad"),
            Some(T + Duration::seconds(61))
        );
    }

    #[test]
    fn exactly_one_window_later_is_still_rejected() {
        let mut gate = CooldownGate::default();
        gate.try_accept("dad", T);
        assert_eq!(
            gate.try_accept("dad", T + Duration::seconds(60)),
            CooldownDecision::Rejected {
                seconds_remaining: 1
            }
        );
        assert!(gate
            .try_accept("dad", T + Duration::seconds(60) + Duration::milliseconds(1))
            .is_accepted());
    }

    #[test]
    fn remaining_time_rounds_up() {
        let mut gate = CooldownGate::default();
        gate.try_accept("dad", T);
        assert_matches!(
            gate.check(&"dad", T + Duration::milliseconds(500)),
            CooldownDecision::Rejected {
                seconds_remaining: 60
            }
        );
        assert_matches!(
            gate.check(&"dad", T + Duration::seconds(15)),
            CooldownDecision::Rejected {
                seconds_remaining: 45
            }
        );
    }

    #[test]
    fn keys_are_independent() {
        let mut gate = CooldownGate::default();
        assert!(gate.try_accept("dad", T).is_accepted());
        assert!(gate.try_accept("mom", T + Duration::seconds(1)).is_accepted());
        assert!(!gate.try_accept("dad", T + Duration::seconds(2)).is_accepted());
    }

    #[test]
    fn check_does_not_record() {
        let gate = CooldownGate::default();
        assert!(gate.check(&"dad", T).is_accepted());
        assert_eq!(gate.last_accepted(&"dad"), None);
    }

    #[test]
    fn clock_going_backwards_is_capped_at_window() {
        let mut gate = CooldownGate::new(Duration::seconds(60));
        gate.try_accept("dad", T);
        assert_eq!(
            gate.check(&"dad", T - Duration::minutes(10)),
            CooldownDecision::Rejected {
                seconds_remaining: 60
            }
        );
    }
}
