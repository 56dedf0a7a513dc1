/// Utility functions for timestamps, formatting and address handling
use time::{format_description, OffsetDateTime};
use tokio::time::Instant;

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Convert a std Duration to whole milliseconds as u64
pub fn duration_to_millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Canonical form of a hardware address: trimmed and lowercased.
///
/// BlueZ reports `C3:00:00:37:31:FD`, configuration files usually carry
/// `c3:00:00:37:31:fd`; both map to the same key.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Millisecond clock anchored at process start.
///
/// Shared by the scanner task and the control loop so every sample
/// timestamp comes from the same monotonic source.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock was started
    pub fn now_ms(&self) -> u64 {
        duration_to_millis(self.origin.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_address(" C3:00:00:37:31:FD "), "c3:00:00:37:31:fd");
        assert_eq!(normalize_address("aa:bb:cc:dd:ee:ff"), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn formats_datetime() {
        let dt = OffsetDateTime::from_unix_timestamp(0).unwrap();
        assert_eq!(format_datetime(&dt), "01.01.1970 - 00:00:00");
    }

    #[test]
    fn converts_duration_to_millis() {
        assert_eq!(duration_to_millis(Duration::from_secs(5)), 5000);
        assert_eq!(duration_to_millis(Duration::from_micros(1500)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clock_follows_tokio_time() {
        let clock = MonotonicClock::start();
        assert_eq!(clock.now_ms(), 0);
        tokio::time::advance(Duration::from_millis(1250)).await;
        assert_eq!(clock.now_ms(), 1250);
    }
}
