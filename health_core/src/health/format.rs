//! Human-readable byte counts and uptimes

use std::time::Duration;

const UNIT: i64 = 1024;
const PREFIXES: &[char] = &['K', 'M', 'G', 'T', 'P', 'E'];

/// Base-1024 size with one decimal place, e.g. `1536` → `"1.5 KB"`.
pub fn format_bytes(bytes: i64) -> String {
    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}

/// Uptime using the largest applicable unit among days, hours and minutes.
pub fn format_uptime(uptime: Duration) -> String {
    let total_minutes = uptime.as_secs() / 60;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{} days, {} hours, {} minutes", days, hours, minutes)
    } else if hours > 0 {
        format!("{} hours, {} minutes", hours, minutes)
    } else {
        format!("{} minutes", minutes)
    }
}
