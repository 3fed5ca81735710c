//! Wall-clock helpers shared by the expiry index and the event loop.
//!
//! Every deadline in the system (key expiry, time events) is an absolute unix-millisecond
//! timestamp, so all deadline arithmetic goes through this one clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current unix time in milliseconds.
#[must_use]
pub fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
