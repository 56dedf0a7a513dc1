/// Cadence gate that turns windows into reports once per send interval
use log::{debug, warn};

use crate::emitter::report::ReportBuilder;
use crate::models::{Report, Timestamp};
use crate::window::{median, Registry};

pub const DEFAULT_SEND_INTERVAL_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Emitting,
}

#[derive(Debug)]
pub struct Scheduler {
    interval_ms: u64,
    last_emit: Timestamp,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(interval_ms: u64) -> Self {
        Scheduler {
            interval_ms,
            last_emit: 0,
            state: SchedulerState::Idle,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    #[cfg(test)]
    pub fn last_emit(&self) -> Timestamp {
        self.last_emit
    }

    /// Whether a sweep is due at `now`
    pub fn is_due(&self, now: Timestamp) -> bool {
        now.saturating_sub(self.last_emit) >= self.interval_ms
    }

    /// Start a sweep if one is due.
    ///
    /// Returns `None` while a previous sweep is still being delivered or
    /// before the interval has elapsed. `link_up` is only consulted once a
    /// sweep is due; when it reports the link down the cycle is still
    /// consumed, no report is built and the next attempt happens one
    /// interval later. Every `Some` must be followed by [`Scheduler::finish`].
    pub fn poll<F>(
        &mut self,
        registry: &Registry,
        builder: &ReportBuilder,
        now: Timestamp,
        link_up: F,
    ) -> Option<Vec<Report>>
    where
        F: FnOnce() -> bool,
    {
        if self.state != SchedulerState::Idle || !self.is_due(now) {
            return None;
        }

        self.state = SchedulerState::Emitting;
        self.last_emit = now;
        if link_up() {
            Some(sweep(registry, builder, now))
        } else {
            warn!("Network link down, skipping sweep at {} ms", now);
            Some(Vec::new())
        }
    }

    /// Delivery of the current sweep is over
    pub fn finish(&mut self) {
        self.state = SchedulerState::Idle;
    }
}

fn sweep(registry: &Registry, builder: &ReportBuilder, now: Timestamp) -> Vec<Report> {
    let mut reports = Vec::with_capacity(registry.len());

    for (address, buffer) in registry.iter() {
        let Some(latest) = buffer.latest() else {
            debug!("Window for {} is empty, nothing to report", address);
            continue;
        };
        let summary = median(buffer.iter());
        reports.push(builder.build(address, latest.reading, summary, buffer.len(), now));
    }

    reports
}
