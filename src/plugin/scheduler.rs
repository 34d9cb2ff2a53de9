//! Timer registration
//!
//! The manager never spawns threads or tasks. It registers periodic work with
//! an injected [`Scheduler`] and the host drives the timers, calling
//! [`PluginManager::fire`](super::PluginManager::fire) when one is due.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Periodic callbacks the manager can register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Timer {
    /// Re-digest watched plugin files and reload changed plugins
    WatchPluginFiles,
}

pub trait Scheduler {
    fn create_timer(&self, timer: Timer, interval: Duration);
}

/// Scheduler that drops every registration
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScheduler;

impl Scheduler for NoopScheduler {
    fn create_timer(&self, _timer: Timer, _interval: Duration) {}
}

#[derive(Debug, Clone)]
struct ArmedTimer {
    timer: Timer,
    interval: Duration,
    next: Instant,
}

/// Cooperative timer queue shared between the manager and the host loop
///
/// Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct TimerQueue {
    timers: Rc<RefCell<Vec<ArmedTimer>>>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered timers with their intervals
    pub fn timers(&self) -> Vec<(Timer, Duration)> {
        self.timers
            .borrow()
            .iter()
            .map(|t| (t.timer, t.interval))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.borrow().is_empty()
    }

    /// Earliest deadline across all timers
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.borrow().iter().map(|t| t.next).min()
    }

    /// Timers whose deadline is at or before `now`, re-armed for their next period
    pub fn due(&self, now: Instant) -> Vec<Timer> {
        let mut due = Vec::new();
        for armed in self.timers.borrow_mut().iter_mut() {
            if armed.next <= now {
                due.push(armed.timer);
                armed.next = now + armed.interval;
            }
        }
        due
    }
}

impl Scheduler for TimerQueue {
    fn create_timer(&self, timer: Timer, interval: Duration) {
        self.timers.borrow_mut().push(ArmedTimer {
            timer,
            interval,
            next: Instant::now() + interval,
        });
    }
}
