#![allow(dead_code)]

use orrery::constants::{Timestamp, RADEG};
use orrery::env::ObserverClock;
use orrery::time::{instant_from_utc, DateComponents};

/// Build an instant from UTC components.
pub fn utc(year: i32, month: u8, day: u8, hour: u8, minute: u8, seconds: f64) -> Timestamp {
    instant_from_utc(&DateComponents {
        year,
        month,
        day,
        hour,
        minute,
        seconds,
    })
}

/// Boston, Massachusetts (EST, no DST applied).
pub fn boston(at: Timestamp) -> ObserverClock {
    ObserverClock::new(at, 42.37 * RADEG, -71.05 * RADEG, -5.0 * 3600.0)
}

/// Sydney, Australia (AEST).
pub fn sydney(at: Timestamp) -> ObserverClock {
    ObserverClock::new(at, -33.868 * RADEG, 151.209 * RADEG, 10.0 * 3600.0)
}

/// 70°N on the 122°W meridian, the polar test latitude.
pub fn arctic(at: Timestamp) -> ObserverClock {
    ObserverClock::new(at, 70.0 * RADEG, -122.03 * RADEG, -8.0 * 3600.0)
}
