//! Time utilities for the client simulation

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Period of the local movement/heartbeat tick.
pub const MOVEMENT_TICK: Duration = Duration::from_millis(25);

/// Period of the task-progress tick.
pub const TASK_TICK: Duration = Duration::from_millis(25);

/// Convert a wire timestamp to Unix milliseconds as a float.
///
/// All kinematic math in the core (drift, extrapolation, watchdogs) runs on
/// f64 milliseconds; wire messages carry RFC3339 timestamps.
pub fn epoch_millis(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp_millis() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn epoch_millis_matches_known_instant() {
        let ts = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        assert_eq!(epoch_millis(&ts), 1_700_000_123_456.0);
    }
}
