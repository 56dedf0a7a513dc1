use serde::Serialize;

/// Signal strength in dBm, more negative is weaker
pub type Reading = i16;

/// Milliseconds on the gateway's monotonic clock
pub type Timestamp = u64;

/// One RSSI observation retained in a beacon's window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub reading: Reading,
    pub observed_at: Timestamp,
}

/// Advertisement from a known beacon, handed from the scanner to the control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub address: String,
    pub rssi: Reading,
    pub observed_at: Timestamp,
}

/// Record posted to the collector once per beacon per sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub gateway_id: String,
    pub beacon_name: String,
    pub rssi: Reading,
    pub median: Reading,
    pub timestamp: Timestamp,
    /// Window length at capture time, for logging only
    #[serde(skip)]
    pub samples: usize,
}
