// Canonical "puzzle day" clock.
//
// One calendar date per puzzle, shared by every client. The day rolls over at
// UTC midnight shifted by PUZZLE_DAY_OFFSET_HOURS.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use spacetimedb::Timestamp;

use crate::PUZZLE_DAY_OFFSET_HOURS;

/// Day keys look like "2025-01-01"
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Day key for a moment in time
pub fn day_key_for(timestamp: Timestamp) -> String {
    let micros = timestamp.to_micros_since_unix_epoch();
    let shifted = DateTime::<Utc>::from_timestamp_micros(micros)
        .map(|dt| dt - Duration::hours(PUZZLE_DAY_OFFSET_HOURS))
        // Out of chrono's range; only reachable with a corrupt clock
        .unwrap_or_default();

    shifted.date_naive().format(DAY_KEY_FORMAT).to_string()
}

/// True only for canonical, real dates ("2025-02-30" and "2025-1-01" are rejected)
pub fn is_valid_day_key(day_key: &str) -> bool {
    match NaiveDate::parse_from_str(day_key, DAY_KEY_FORMAT) {
        Ok(date) => date.format(DAY_KEY_FORMAT).to_string() == day_key,
        Err(_) => false,
    }
}
