use crate::models::{Reading, Sample};

/// Returned for an empty window
pub const NO_DATA_RSSI: Reading = -100;

/// Median RSSI of a window.
///
/// With an even number of samples the two middle readings are averaged
/// using integer division, which truncates toward zero: `[-61, -70]`
/// gives `-65`, not `-66`.
pub fn median<'a, I>(samples: I) -> Reading
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut values: Vec<Reading> = samples.into_iter().map(|s| s.reading).collect();
    if values.is_empty() {
        return NO_DATA_RSSI;
    }

    values.sort_unstable();
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        // Widened so the sum cannot overflow; the mean always fits back
        let sum = i32::from(values[n / 2 - 1]) + i32::from(values[n / 2]);
        (sum / 2) as Reading
    }
}
