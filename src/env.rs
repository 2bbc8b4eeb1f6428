//! Environment collaborator: where the engine gets "now" and "here" from.
//!
//! The host application (a watch face, typically) owns the clock and the
//! location fix; the engine only ever reads them through
//! [`AstroEnvironment`] at session setup. [`ObserverClock`] is the trivial
//! fixed-state implementation used by tests and by hosts that re-bind every
//! frame.

use crate::constants::{Radian, Timestamp};

/// The host-side source of calculation instant and observer state.
pub trait AstroEnvironment {
    /// The calculation instant, seconds since the reference epoch.
    fn current_instant(&self) -> Timestamp;

    /// Whether the host clock is running backward (watch faces animate time
    /// in both directions). Flips the sense of every `next`/`previous`
    /// query.
    fn running_backward(&self) -> bool {
        false
    }

    /// UTC offset of the display timezone, seconds east of Greenwich.
    fn tz_offset_seconds(&self) -> f64;

    /// Observer latitude, radians north positive.
    fn latitude(&self) -> Radian;

    /// Observer longitude, radians east positive.
    fn longitude(&self) -> Radian;

    /// Whether a location fix is available. Location-dependent queries
    /// answer [`HorizonState::Invalid`](crate::solver::HorizonState) or
    /// `None` while this is false.
    fn location_valid(&self) -> bool {
        true
    }
}

/// A plain-value environment: set the fields, hand it to
/// [`Almanac::session`](crate::almanac::Almanac::session).
#[derive(Debug, Clone, Copy)]
pub struct ObserverClock {
    pub instant: Timestamp,
    pub latitude: Radian,
    pub longitude: Radian,
    pub tz_offset_seconds: f64,
    pub running_backward: bool,
    pub location_valid: bool,
}

impl ObserverClock {
    pub fn new(instant: Timestamp, latitude: Radian, longitude: Radian, tz_offset_seconds: f64) -> Self {
        ObserverClock {
            instant,
            latitude,
            longitude,
            tz_offset_seconds,
            running_backward: false,
            location_valid: true,
        }
    }
}

impl AstroEnvironment for ObserverClock {
    fn current_instant(&self) -> Timestamp {
        self.instant
    }

    fn running_backward(&self) -> bool {
        self.running_backward
    }

    fn tz_offset_seconds(&self) -> f64 {
        self.tz_offset_seconds
    }

    fn latitude(&self) -> Radian {
        self.latitude
    }

    fn longitude(&self) -> Radian {
        self.longitude
    }

    fn location_valid(&self) -> bool {
        self.location_valid
    }
}
