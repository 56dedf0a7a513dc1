/// Process context owning the windows and the emission state
use log::trace;

use crate::config::GatewayConfig;
use crate::emitter::{ReportBuilder, Scheduler};
use crate::models::{Observation, Reading, Report, Timestamp};
use crate::utils::duration_to_millis;
use crate::window::{Registry, SampleStore};

/// Everything the control loop mutates.
///
/// Only the control loop holds this, so observations and sweeps are
/// serialized without locking.
pub struct GatewayContext {
    registry: Registry,
    store: SampleStore,
    scheduler: Scheduler,
    builder: ReportBuilder,
}

impl GatewayContext {
    pub fn new(store: SampleStore, scheduler: Scheduler, builder: ReportBuilder) -> Self {
        GatewayContext {
            registry: Registry::new(),
            store,
            scheduler,
            builder,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            SampleStore::new(config.window),
            Scheduler::new(duration_to_millis(config.send_interval)),
            ReportBuilder::new(config.gateway_id.clone(), config.beacons.clone()),
        )
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one reading from a beacon
    pub fn observe(&mut self, address: &str, reading: Reading, now: Timestamp) {
        trace!("{} -> {} dBm at {} ms", address, reading, now);
        self.store.record(&mut self.registry, address, reading, now);
    }

    pub fn absorb(&mut self, observation: &Observation) {
        self.observe(&observation.address, observation.rssi, observation.observed_at);
    }

    /// Reports due at `now`, if a sweep is due.
    ///
    /// `link_up` runs only when a sweep is due. A returned sweep must be
    /// closed with [`GatewayContext::finish_sweep`] once delivered.
    pub fn tick<F>(&mut self, now: Timestamp, link_up: F) -> Option<Vec<Report>>
    where
        F: FnOnce() -> bool,
    {
        self.scheduler
            .poll(&self.registry, &self.builder, now, link_up)
    }

    pub fn finish_sweep(&mut self) {
        self.scheduler.finish();
    }
}
