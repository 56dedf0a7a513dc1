use crate::config::BeaconTable;
use crate::models::{Reading, Report, Timestamp};

/// Packages window summaries into reports for the collector
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    gateway_id: String,
    beacons: BeaconTable,
}

impl ReportBuilder {
    pub fn new(gateway_id: impl Into<String>, beacons: BeaconTable) -> Self {
        ReportBuilder {
            gateway_id: gateway_id.into(),
            beacons,
        }
    }

    pub fn build(
        &self,
        address: &str,
        latest: Reading,
        median: Reading,
        samples: usize,
        now: Timestamp,
    ) -> Report {
        Report {
            gateway_id: self.gateway_id.clone(),
            beacon_name: self.beacons.resolve(address),
            rssi: latest,
            median,
            timestamp: now,
            samples,
        }
    }
}
