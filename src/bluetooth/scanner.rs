/// Bluetooth Low Energy discovery feeding beacon RSSI into the control loop
use bluer::{AdapterEvent, Address, DeviceEvent, DeviceProperty};
use futures_util::stream::SelectAll;
use futures_util::{pin_mut, StreamExt};
use log::{debug, error, info, trace, warn};
use std::collections::HashSet;
use tokio::sync::mpsc;

use crate::config::BeaconTable;
use crate::models::{Observation, Reading};
use crate::utils::{normalize_address, MonotonicClock};

pub type ScanError = Box<dyn std::error::Error + Send + Sync>;

/// Turn a raw advertisement into an observation if it comes from a known beacon.
///
/// This is the only allow-list check; the window store accepts any address.
pub fn accept(
    beacons: &BeaconTable,
    address: &str,
    rssi: Reading,
    clock: &MonotonicClock,
) -> Option<Observation> {
    if !beacons.contains(address) {
        trace!("Ignoring unknown device {}", address);
        return None;
    }

    Some(Observation {
        address: normalize_address(address),
        rssi,
        observed_at: clock.now_ms(),
    })
}

/// Beacons whose property stream is already merged into the scan loop.
///
/// A device event stream follows the device's D-Bus path and resumes
/// when BlueZ re-adds the device, so a beacon is subscribed at most once
/// for the lifetime of the scan, no matter how often it drops out.
#[derive(Debug, Default)]
pub struct BeaconWatch {
    subscribed: HashSet<Address>,
}

impl BeaconWatch {
    /// True if `addr` still needs a property stream; marks it subscribed
    pub fn subscribe(&mut self, addr: Address) -> bool {
        self.subscribed.insert(addr)
    }

    /// Undo [`BeaconWatch::subscribe`] when opening the stream failed
    pub fn forget(&mut self, addr: &Address) {
        self.subscribed.remove(addr);
    }

    pub fn is_subscribed(&self, addr: &Address) -> bool {
        self.subscribed.contains(addr)
    }
}

/// Scan continuously and forward RSSI updates from configured beacons
///
/// Discovery runs with duplicate data enabled so BlueZ keeps refreshing
/// the RSSI property of devices it already knows. Each known beacon
/// contributes its RSSI when first seen and on every later change.
///
/// # Arguments
/// * `beacons` - Allow-list of beacon addresses
/// * `clock` - Clock shared with the control loop
/// * `tx` - Channel into the control loop
///
/// # Returns
/// Ok when the control loop hung up, or an error if Bluetooth fails
pub async fn scan_for_beacons(
    beacons: BeaconTable,
    clock: MonotonicClock,
    tx: mpsc::Sender<Observation>,
) -> Result<(), ScanError> {
    // Initialize Bluetooth session
    let session = match bluer::Session::new().await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create Bluetooth session: {}", e);
            return Err(e.into());
        }
    };

    // Get the default Bluetooth adapter
    let adapter = match session.default_adapter().await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("Failed to get default Bluetooth adapter: {}", e);
            return Err(e.into());
        }
    };

    // Ensure Bluetooth adapter is powered on
    if let Err(e) = adapter.set_powered(true).await {
        error!("Failed to power on adapter: {}", e);
        return Err(e.into());
    }

    let filter = bluer::DiscoveryFilter {
        transport: bluer::DiscoveryTransport::Le,
        duplicate_data: true,
        ..Default::default()
    };

    // Apply the discovery filter (warn if it fails, but continue)
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    let adapter_events = match adapter.discover_devices().await {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to start device discovery: {}", e);
            return Err(e.into());
        }
    };
    pin_mut!(adapter_events);
    info!("Scanning on adapter {}", adapter.name());

    let mut watch = BeaconWatch::default();
    let mut rssi_changes = SelectAll::new();

    loop {
        let (address, rssi) = tokio::select! {
            Some(event) = adapter_events.next() => match event {
                AdapterEvent::DeviceAdded(addr) => {
                    if !beacons.contains(&addr.to_string()) {
                        continue;
                    }
                    let device = match adapter.device(addr) {
                        Ok(device) => device,
                        Err(e) => {
                            debug!("Failed to open device {}: {}", addr, e);
                            continue;
                        }
                    };
                    if watch.subscribe(addr) {
                        match device.events().await {
                            Ok(events) => rssi_changes.push(Box::pin(events.map(move |evt| (addr, evt)))),
                            Err(e) => {
                                debug!("Failed to watch device {}: {}", addr, e);
                                watch.forget(&addr);
                            }
                        }
                        debug!("Beacon {} discovered", addr);
                    } else {
                        debug!("Beacon {} is back", addr);
                    }
                    match device.rssi().await {
                        Ok(Some(rssi)) => (addr, rssi),
                        Ok(None) => continue,
                        Err(e) => {
                            debug!("Failed to read RSSI for {}: {}", addr, e);
                            continue;
                        }
                    }
                }
                AdapterEvent::DeviceRemoved(addr) => {
                    // Its property stream stays merged and resumes on re-add
                    if watch.is_subscribed(&addr) {
                        debug!("Beacon {} removed", addr);
                    }
                    continue;
                }
                _ => continue,
            },
            Some((addr, DeviceEvent::PropertyChanged(property))) = rssi_changes.next() => match property {
                DeviceProperty::Rssi(rssi) => (addr, rssi),
                _ => continue,
            },
            else => break,
        };

        if let Some(observation) = accept(&beacons, &address.to_string(), rssi, &clock) {
            if tx.send(observation).await.is_err() {
                info!("Control loop closed, stopping scanner");
                return Ok(());
            }
        }
    }

    Err("Bluetooth discovery stream ended".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacons() -> BeaconTable {
        [
            ("c3:00:00:37:31:fd", "balise_1"),
            ("c3:00:00:37:31:04", "balise_2"),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn accepts_known_beacon_with_normalized_address() {
        let clock = MonotonicClock::start();
        let observation = accept(&beacons(), "C3:00:00:37:31:FD", -67, &clock).unwrap();

        assert_eq!(observation.address, "c3:00:00:37:31:fd");
        assert_eq!(observation.rssi, -67);
    }

    #[tokio::test]
    async fn drops_unknown_devices() {
        let clock = MonotonicClock::start();
        assert!(accept(&beacons(), "AA:BB:CC:DD:EE:FF", -40, &clock).is_none());
    }

    #[test]
    fn beacon_is_subscribed_once_across_dropouts() {
        let addr = Address::new([0xc3, 0x00, 0x00, 0x37, 0x31, 0xfd]);
        let other = Address::new([0xc3, 0x00, 0x00, 0x37, 0x31, 0x04]);
        let mut watch = BeaconWatch::default();

        // added, removed, added again
        assert!(watch.subscribe(addr));
        assert!(watch.is_subscribed(&addr));
        assert!(!watch.subscribe(addr));
        assert!(!watch.is_subscribed(&other));
        assert!(watch.subscribe(other));
    }

    #[test]
    fn failed_subscription_is_retried_on_next_add() {
        let addr = Address::new([0xc3, 0x00, 0x00, 0x37, 0x31, 0xf8]);
        let mut watch = BeaconWatch::default();

        assert!(watch.subscribe(addr));
        watch.forget(&addr);
        assert!(!watch.is_subscribed(&addr));
        assert!(watch.subscribe(addr));
    }

    #[tokio::test(start_paused = true)]
    async fn stamps_with_shared_clock() {
        let clock = MonotonicClock::start();
        tokio::time::advance(std::time::Duration::from_millis(750)).await;

        let observation = accept(&beacons(), "c3:00:00:37:31:04", -80, &clock).unwrap();
        assert_eq!(observation.observed_at, 750);
    }
}
