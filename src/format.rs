//! Human-readable byte counts for log output.

const UNITS: [&str; 5] = ["b", "kiB", "MiB", "GiB", "TiB"];

/// Reduces a byte count by powers of 1024 and appends the matching unit.
///
/// Division is integral, so `1536` is reported as `"1 kiB"`. Counts beyond the
/// largest unit stay in TiB.
#[must_use]
pub fn format_byte_size(bytes: u64) -> String {
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024 && unit < UNITS.len() - 1 {
        value /= 1024;
        unit += 1;
    }
    format!("{value} {}", UNITS[unit])
}
