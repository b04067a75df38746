//! Clocks and cancelable timers.
//!
//! Timers never run on their own. The owner polls them with the current time
//! and acts on whatever reports itself due, which keeps the session single
//! threaded and lets tests drive time by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as Timestamp)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now
            .fetch_add(by.as_millis() as Timestamp, Ordering::SeqCst);
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Fires once, then disarms. Re-scheduling replaces the pending deadline.
    Once,
    /// Re-arms itself one period after each firing.
    Periodic,
}

#[derive(Debug, Clone)]
pub struct Timer {
    mode: TimerMode,
    period: Duration,
    deadline: Option<Timestamp>,
}

impl Timer {
    pub fn once(delay: Duration) -> Self {
        Self {
            mode: TimerMode::Once,
            period: delay,
            deadline: None,
        }
    }

    pub fn periodic(period: Duration) -> Self {
        Self {
            mode: TimerMode::Periodic,
            period,
            deadline: None,
        }
    }

    /// Arms the timer one period from `now`, superseding any pending deadline.
    pub fn schedule(&mut self, now: Timestamp) {
        self.deadline = Some(now.saturating_add(self.period.as_millis() as Timestamp));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.deadline
    }

    /// Returns true when the deadline has passed. A periodic timer re-arms
    /// from `now`, so a long stall fires once rather than catching up.
    pub fn fire_if_due(&mut self, now: Timestamp) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                match self.mode {
                    TimerMode::Once => self.deadline = None,
                    TimerMode::Periodic => self.schedule(now),
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_timer_fires_a_single_time() {
        let mut timer = Timer::once(Duration::from_millis(1000));
        timer.schedule(0);
        assert!(!timer.fire_if_due(999));
        assert!(timer.fire_if_due(1000));
        assert!(!timer.is_pending());
        assert!(!timer.fire_if_due(5000));
    }

    #[test]
    fn rescheduling_pushes_the_deadline_back() {
        let mut timer = Timer::once(Duration::from_millis(1000));
        timer.schedule(0);
        timer.schedule(800);
        assert!(!timer.fire_if_due(1000));
        assert!(timer.fire_if_due(1800));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut timer = Timer::once(Duration::from_millis(10));
        timer.schedule(0);
        timer.cancel();
        assert!(!timer.fire_if_due(100));
    }

    #[test]
    fn periodic_timer_rearms_after_firing() {
        let mut timer = Timer::periodic(Duration::from_millis(30_000));
        timer.schedule(0);
        assert!(timer.fire_if_due(30_000));
        assert_eq!(timer.deadline(), Some(60_000));
        assert!(!timer.fire_if_due(45_000));
        assert!(timer.fire_if_due(95_000));
        assert_eq!(timer.deadline(), Some(125_000));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(10);
        let other = clock.clone();
        clock.advance(Duration::from_millis(5));
        assert_eq!(other.now(), 15);
        other.set(100);
        assert_eq!(clock.now(), 100);
    }
}
