use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::emitter::scheduler::DEFAULT_SEND_INTERVAL_MS;
use crate::utils::normalize_address;
use crate::window::store::{DEFAULT_MAX_AGE_MS, DEFAULT_WINDOW_SIZE};
use crate::window::WindowPolicy;

const DEFAULT_GATEWAY_ID: &str = "gateway_1";
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 2_000;

/// Known beacons, normalized address -> display name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeaconTable {
    names: BTreeMap<String, String>,
}

impl BeaconTable {
    pub fn insert(&mut self, address: &str, name: &str) {
        self.names
            .insert(normalize_address(address), name.trim().to_string());
    }

    pub fn contains(&self, address: &str) -> bool {
        self.names.contains_key(&normalize_address(address))
    }

    /// Display name for `address`, or the normalized address when unknown
    pub fn resolve(&self, address: &str) -> String {
        let address = normalize_address(address);
        match self.names.get(&address) {
            Some(name) => name.clone(),
            None => address,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.names.iter()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for BeaconTable {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        let mut table = BeaconTable::default();
        for (address, name) in iter {
            table.insert(address, name);
        }
        table
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub gateway_id: String,
    pub server_url: Url,
    pub beacons: BeaconTable,
    pub window: WindowPolicy,
    pub send_interval: Duration,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
}

impl GatewayConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let vars: Vec<(String, String)> = env::vars().collect();
        Self::from_lookup(|key| env::var(key).ok(), &vars)
    }

    /// Build the configuration from a variable lookup.
    ///
    /// `vars` is the full variable list, scanned for the
    /// `BEACON_<N>_MAC` / `BEACON_<N>_NAME` fallback format.
    pub fn from_lookup<F>(
        lookup: F,
        vars: &[(String, String)],
    ) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = lookup("SERVER_URL").ok_or("SERVER_URL environment variable not set")?;
        let server_url =
            Url::parse(&server_url).map_err(|e| format!("Invalid SERVER_URL '{}': {}", server_url, e))?;

        let gateway_id = lookup("GATEWAY_ID")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| DEFAULT_GATEWAY_ID.to_string());

        let beacons = parse_beacons(&lookup, vars);
        info!("Total beacons loaded: {}", beacons.len());
        for (mac, name) in beacons.iter() {
            info!("Beacon: {} -> {}", mac, name);
        }

        if beacons.is_empty() {
            return Err("No beacons configured. Please set BEACONS or BEACON_<N>_MAC/BEACON_<N>_NAME environment variables".into());
        }

        let window = WindowPolicy {
            window_size: parse_number(&lookup, "RSSI_WINDOW_SIZE", DEFAULT_WINDOW_SIZE)?,
            max_age_ms: parse_number(&lookup, "MAX_DATA_AGE_MS", DEFAULT_MAX_AGE_MS)?,
        };
        if window.window_size == 0 {
            return Err("RSSI_WINDOW_SIZE must be at least 1".into());
        }

        let send_interval = parse_number(&lookup, "SEND_INTERVAL_MS", DEFAULT_SEND_INTERVAL_MS)?;
        let poll_interval = parse_number(&lookup, "POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let http_timeout = parse_number(&lookup, "HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS)?;
        if send_interval == 0 || poll_interval == 0 || http_timeout == 0 {
            return Err(
                "SEND_INTERVAL_MS, POLL_INTERVAL_MS and HTTP_TIMEOUT_MS must be at least 1".into(),
            );
        }
        if poll_interval > send_interval {
            warn!(
                "POLL_INTERVAL_MS ({}) exceeds SEND_INTERVAL_MS ({}), reports will be late",
                poll_interval, send_interval
            );
        }

        Ok(GatewayConfig {
            gateway_id,
            server_url,
            beacons,
            window,
            send_interval: Duration::from_millis(send_interval),
            poll_interval: Duration::from_millis(poll_interval),
            http_timeout: Duration::from_millis(http_timeout),
        })
    }
}

fn parse_beacons<F>(lookup: &F, vars: &[(String, String)]) -> BeaconTable
where
    F: Fn(&str) -> Option<String>,
{
    let mut beacons = BeaconTable::default();

    // Try BEACONS format first
    if let Some(list) = lookup("BEACONS") {
        debug!("Found BEACONS: '{}'", list);
        for pair in list.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            match pair.split_once('=') {
                Some((mac, name)) if !mac.trim().is_empty() && !name.trim().is_empty() => {
                    beacons.insert(mac, name);
                }
                _ => warn!("Ignoring malformed beacon entry: '{}'", pair),
            }
        }
    } else {
        // Fallback to individual environment variables
        debug!("BEACONS environment variable not found, trying individual variables");
        for (key, value) in vars {
            if let Some(index) = key
                .strip_prefix("BEACON_")
                .and_then(|s| s.strip_suffix("_MAC"))
            {
                let name_key = format!("BEACON_{}_NAME", index);
                match lookup(&name_key) {
                    Some(name) if !name.trim().is_empty() => beacons.insert(value, &name),
                    _ => warn!("{} is set but {} is missing", key, name_key),
                }
            }
        }
    }

    beacons
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid {} '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}
