/// Per-beacon RSSI windows with age and size based eviction
use std::collections::{BTreeMap, VecDeque};

use crate::models::{Reading, Sample, Timestamp};
use crate::utils::normalize_address;

pub const DEFAULT_WINDOW_SIZE: usize = 7;
pub const DEFAULT_MAX_AGE_MS: u64 = 30_000;

/// Retention limits applied to every window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pub window_size: usize,
    pub max_age_ms: u64,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        WindowPolicy {
            window_size: DEFAULT_WINDOW_SIZE,
            max_age_ms: DEFAULT_MAX_AGE_MS,
        }
    }
}

/// Samples for one beacon in arrival order, oldest at the front
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
}

impl SampleBuffer {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recently appended sample
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    fn evict(&mut self, policy: &WindowPolicy, now: Timestamp) {
        // Boundary samples (age == max_age) are kept
        self.samples
            .retain(|s| now.saturating_sub(s.observed_at) <= policy.max_age_ms);

        while self.samples.len() > policy.window_size {
            self.samples.pop_front();
        }
    }
}

/// Windows keyed by normalized beacon address
///
/// Entries appear on the first recorded sample and are never removed.
#[derive(Debug, Default)]
pub struct Registry {
    buffers: BTreeMap<String, SampleBuffer>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    #[cfg(test)]
    pub fn get(&self, address: &str) -> Option<&SampleBuffer> {
        self.buffers.get(&normalize_address(address))
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Windows in address order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SampleBuffer)> {
        self.buffers.iter()
    }
}

/// Applies the window policy when recording samples into a registry
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleStore {
    policy: WindowPolicy,
}

impl SampleStore {
    pub fn new(policy: WindowPolicy) -> Self {
        SampleStore { policy }
    }

    /// Append a reading for `address` and evict what the policy no longer allows.
    ///
    /// Stale samples are dropped first, then the oldest ones until the
    /// window fits. Eviction only happens here, so a beacon that stops
    /// advertising keeps its last window until its next reading.
    pub fn record(&self, registry: &mut Registry, address: &str, reading: Reading, now: Timestamp) {
        let buffer = registry
            .buffers
            .entry(normalize_address(address))
            .or_default();

        buffer.samples.push_back(Sample {
            reading,
            observed_at: now,
        });
        buffer.evict(&self.policy, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "aa:bb:cc:dd:ee:ff";

    fn readings(registry: &Registry, address: &str) -> Vec<Reading> {
        registry
            .get(address)
            .map(|b| b.iter().map(|s| s.reading).collect())
            .unwrap_or_default()
    }

    #[test]
    fn creates_buffer_on_first_sample() {
        let store = SampleStore::default();
        let mut registry = Registry::new();
        assert!(registry.is_empty());

        store.record(&mut registry, ADDR, -60, 0);

        assert_eq!(registry.len(), 1);
        assert_eq!(readings(&registry, ADDR), vec![-60]);
    }

    #[test]
    fn address_lookup_is_case_insensitive() {
        let store = SampleStore::default();
        let mut registry = Registry::new();

        store.record(&mut registry, "AA:BB:CC:DD:EE:FF", -60, 0);
        store.record(&mut registry, ADDR, -61, 10);

        assert_eq!(registry.len(), 1);
        assert_eq!(readings(&registry, "Aa:Bb:Cc:Dd:Ee:Ff"), vec![-60, -61]);
    }

    #[test]
    fn keeps_most_recent_window_size_samples() {
        let store = SampleStore::default();
        let mut registry = Registry::new();

        for i in 0..10 {
            store.record(&mut registry, ADDR, -50 - i, i as u64);
        }

        assert_eq!(
            readings(&registry, ADDR),
            vec![-53, -54, -55, -56, -57, -58, -59]
        );
        assert_eq!(registry.get(ADDR).unwrap().latest().unwrap().reading, -59);
    }

    #[test]
    fn evicts_stale_sample_below_window_size() {
        let store = SampleStore::default();
        let mut registry = Registry::new();

        store.record(&mut registry, ADDR, -70, 0);
        store.record(&mut registry, ADDR, -65, 10_000);
        store.record(&mut registry, ADDR, -60, 30_001);

        assert_eq!(readings(&registry, ADDR), vec![-65, -60]);
    }

    #[test]
    fn keeps_sample_exactly_at_max_age() {
        let store = SampleStore::default();
        let mut registry = Registry::new();

        store.record(&mut registry, ADDR, -70, 0);
        store.record(&mut registry, ADDR, -60, 30_000);

        assert_eq!(readings(&registry, ADDR), vec![-70, -60]);
    }

    #[test]
    fn age_eviction_runs_before_size_trim() {
        let store = SampleStore::new(WindowPolicy {
            window_size: 3,
            max_age_ms: 1_000,
        });
        let mut registry = Registry::new();

        store.record(&mut registry, ADDR, -90, 0);
        store.record(&mut registry, ADDR, -80, 1_500);
        store.record(&mut registry, ADDR, -70, 1_600);
        store.record(&mut registry, ADDR, -60, 1_700);

        // -90 is stale, leaving exactly three fresh samples
        assert_eq!(readings(&registry, ADDR), vec![-80, -70, -60]);
    }

    #[test]
    fn other_beacons_are_untouched() {
        let store = SampleStore::new(WindowPolicy {
            window_size: 7,
            max_age_ms: 1_000,
        });
        let mut registry = Registry::new();

        store.record(&mut registry, "11:22:33:44:55:66", -75, 0);
        store.record(&mut registry, ADDR, -60, 5_000);

        // Staleness is only re-evaluated for the beacon being recorded
        assert_eq!(readings(&registry, "11:22:33:44:55:66"), vec![-75]);
    }

    #[test]
    fn window_invariants_hold_for_irregular_arrivals() {
        let policy = WindowPolicy {
            window_size: 4,
            max_age_ms: 2_500,
        };
        let store = SampleStore::new(policy);
        let mut registry = Registry::new();
        let mut now = 0u64;

        for step in 0..200u64 {
            now += (step * 37) % 1_300;
            store.record(&mut registry, ADDR, -((step % 60) as i16), now);

            let buffer = registry.get(ADDR).unwrap();
            assert!(buffer.len() <= policy.window_size);
            assert!(buffer.iter().all(|s| now - s.observed_at <= policy.max_age_ms));
            assert_eq!(buffer.latest().unwrap().observed_at, now);
        }
    }
}
