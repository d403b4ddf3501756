//! Gapless playback scheduling.
//!
//! Inbound audio units may arrive faster or slower than real time. The
//! scheduler keeps a monotonically advancing "next start time" so consecutive
//! units play back to back, while never scheduling a unit to start before the
//! output clock's current time. An interruption (barge-in) clears everything
//! and resets the schedule so the next unit starts relative to "now".

use std::collections::HashMap;

/// One scheduled-but-not-yet-finished playback unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledUnit {
    pub id: u64,
    /// Start time on the playback clock, seconds
    pub start_time: f64,
    /// Unit duration, seconds
    pub duration: f64,
}

/// Tracks the playback schedule for one live session.
///
/// Invariant: `next_start_time` is monotonically non-decreasing except when
/// explicitly reset by [`interrupt`](Self::interrupt), and every scheduled
/// unit stays tracked until it finishes naturally or is forcibly stopped.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start_time: f64,
    next_id: u64,
    active: HashMap<u64, ScheduledUnit>,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a unit of `duration` seconds given the playback clock reads
    /// `now`. The unit starts at `max(now, next_start_time)` and advances
    /// `next_start_time` by its duration.
    pub fn schedule(&mut self, duration: f64, now: f64) -> ScheduledUnit {
        let start_time = self.next_start_time.max(now);
        let unit = ScheduledUnit {
            id: self.next_id,
            start_time,
            duration,
        };
        self.next_id += 1;
        self.next_start_time = start_time + duration;
        self.active.insert(unit.id, unit);
        unit
    }

    /// Remove a unit that finished playing naturally.
    pub fn finish(&mut self, id: u64) {
        self.active.remove(&id);
    }

    /// Barge-in: drop every tracked unit and reset the schedule to zero so
    /// the next unit schedules relative to "now". Returns the ids the caller
    /// must force-stop on the output device.
    pub fn interrupt(&mut self) -> Vec<u64> {
        let ids = self.active.keys().copied().collect();
        self.active.clear();
        self.next_start_time = 0.0;
        ids
    }

    /// Seconds at which the next unit would start if it arrived at time zero.
    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    /// Number of scheduled-but-unfinished units.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
