//! Rate limiting for scan and selection triggers.
//!
//! Both schedulers are sans-IO: callers pass the current monotonic time and
//! arm their own timer for the returned deadline, then call `poll` when it
//! fires. This keeps them usable from a browser event loop and from tests
//! with a fake clock.

use std::time::Duration;

/// How long to wait for the background peer before proceeding without it.
pub const PEER_RESPONSE_TIMEOUT: Duration = Duration::from_millis(250);

/// Window over which page mutations collapse into one rescan.
pub const SCAN_THROTTLE_INTERVAL: Duration = Duration::from_millis(200);

/// Quiet period after the last pointer move before selection runs.
pub const HOVER_DEBOUNCE_WAIT: Duration = Duration::from_millis(50);

// =============================================================================
// Throttle
// =============================================================================

/// Trailing-edge throttle.
///
/// The first trigger schedules a run one interval later; triggers before that
/// run are absorbed. Nothing ever runs on the leading edge.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    deadline: Option<Duration>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Record a trigger. Returns the deadline of the pending run.
    pub fn trigger(&mut self, now: Duration) -> Duration {
        *self.deadline.get_or_insert(now + self.interval)
    }

    /// Whether the pending run is due at `now`. A due run is consumed.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drop the pending run, if any.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(SCAN_THROTTLE_INTERVAL)
    }
}

// =============================================================================
// Debounce
// =============================================================================

/// Trailing-edge debounce carrying the latest trigger's value.
///
/// Every trigger supersedes the previous one and restarts the wait.
#[derive(Debug, Clone)]
pub struct Debounce<T> {
    wait: Duration,
    pending: Option<(Duration, T)>,
}

impl<T> Debounce<T> {
    pub fn new(wait: Duration) -> Self {
        Self { wait, pending: None }
    }

    /// Record a trigger with its value. Returns the new deadline.
    pub fn trigger(&mut self, now: Duration, value: T) -> Duration {
        let deadline = now + self.wait;
        self.pending = Some((deadline, value));
        deadline
    }

    /// Take the pending value if its deadline has passed.
    pub fn poll(&mut self, now: Duration) -> Option<T> {
        if matches!(self.deadline(), Some(deadline) if deadline <= now) {
            self.cancel()
        } else {
            None
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    /// Drop the pending call, returning its value.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_throttle_collapses_burst_into_one_trailing_run() {
        let mut throttle = Throttle::new(ms(100));
        assert_eq!(throttle.trigger(ms(0)), ms(100));
        assert_eq!(throttle.trigger(ms(30)), ms(100));
        assert_eq!(throttle.trigger(ms(99)), ms(100));
        assert!(!throttle.poll(ms(0)));
        assert!(!throttle.poll(ms(99)));
        assert!(throttle.poll(ms(100)));
        assert!(!throttle.poll(ms(150)));
        assert!(!throttle.is_pending());

        assert_eq!(throttle.trigger(ms(160)), ms(260));
    }

    #[test]
    fn test_throttle_cancel() {
        let mut throttle = Throttle::default();
        throttle.trigger(ms(0));
        assert!(throttle.cancel());
        assert!(!throttle.cancel());
        assert!(!throttle.poll(ms(10_000)));
    }

    #[test]
    fn test_debounce_keeps_latest_value() {
        let mut debounce = Debounce::new(ms(50));
        debounce.trigger(ms(0), "a");
        debounce.trigger(ms(40), "b");
        assert_eq!(debounce.deadline(), Some(ms(90)));
        assert_eq!(debounce.poll(ms(60)), None);
        assert_eq!(debounce.poll(ms(90)), Some("b"));
        assert_eq!(debounce.poll(ms(200)), None);
    }

    #[test]
    fn test_debounce_cancel() {
        let mut debounce = Debounce::new(HOVER_DEBOUNCE_WAIT);
        debounce.trigger(ms(0), 1);
        assert_eq!(debounce.cancel(), Some(1));
        assert_eq!(debounce.deadline(), None);
    }
}
