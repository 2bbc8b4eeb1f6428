//! # Time conversion layer
//!
//! Everything between a raw [`Timestamp`](crate::constants::Timestamp) and
//! the ephemeris-facing time arguments lives here:
//!
//! - Julian-date arithmetic ([`julian_date_for`])
//! - delta-T models and Julian centuries since J2000 ([`delta_t`],
//!   [`julian_centuries_since_2000`])
//! - sidereal time in both directions ([`sidereal`])
//! - precession/nutation frame conversion ([`precession`])
//!
//! Calendar conversions (instant ↔ Gregorian components) are delegated to
//! `hifitime`; this crate never does its own month arithmetic.

pub mod delta_t;
pub mod precession;
pub mod sidereal;

use hifitime::Epoch;

use crate::cache::{AstroCachePool, Slot};
use crate::constants::{
    Timestamp, DPI, JD_1990_EPOCH, JD_2000_EPOCH, JULIAN_DAYS_PER_CENTURY, SECONDS_PER_DAY,
    UNIX_SECONDS_AT_REFERENCE_EPOCH,
};

/// Julian date of an instant. Pure arithmetic; no failure modes.
pub fn julian_date_for(instant: Timestamp) -> f64 {
    let seconds_since_1990 = instant - crate::constants::EPOCH_1990_SECONDS;
    JD_1990_EPOCH + seconds_since_1990 / SECONDS_PER_DAY
}

/// Broken-down UTC date, fractional seconds included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateComponents {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub seconds: f64,
}

/// UTC components of an instant.
pub fn utc_components(instant: Timestamp) -> DateComponents {
    let epoch = Epoch::from_unix_seconds(instant + UNIX_SECONDS_AT_REFERENCE_EPOCH);
    let (year, month, day, hour, minute, second, nanos) = epoch.to_gregorian_utc();
    DateComponents {
        year,
        month,
        day,
        hour,
        minute,
        seconds: second as f64 + nanos as f64 * 1e-9,
    }
}

/// Instant for broken-down UTC components.
pub fn instant_from_utc(c: &DateComponents) -> Timestamp {
    let mut whole = c.seconds.floor();
    let mut nanos = ((c.seconds - whole) * 1e9).round() as u32;
    if nanos >= 1_000_000_000 {
        whole += 1.0;
        nanos = 0;
    }
    let epoch = Epoch::from_gregorian_utc(c.year, c.month, c.day, c.hour, c.minute, whole as u8, nanos);
    epoch.to_unix_seconds() - UNIX_SECONDS_AT_REFERENCE_EPOCH
}

/// Components of `instant` in the fixed-offset local timezone.
pub fn local_components(instant: Timestamp, tz_offset_seconds: f64) -> DateComponents {
    utc_components(instant + tz_offset_seconds)
}

/// Instant for components expressed in the fixed-offset local timezone.
pub fn instant_from_local(c: &DateComponents, tz_offset_seconds: f64) -> Timestamp {
    instant_from_utc(c) - tz_offset_seconds
}

/// One-based day of the year for a Gregorian date.
pub fn day_of_year(year: i32, month: u8, day: u8) -> u32 {
    const CUMULATIVE: [u32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let mut doy = CUMULATIVE[(month - 1) as usize] + day as u32;
    if leap && month > 2 {
        doy += 1;
    }
    doy
}

/// Angle wrapped to [0, 2π).
pub(crate) fn normalize_radians(angle: f64) -> f64 {
    let r = angle % DPI;
    if r < 0.0 {
        r + DPI
    } else {
        r
    }
}

/// The UT midnight at or before `instant`, memoized per pool and cached per
/// scope. The memo makes the common case (repeated queries within one day)
/// free of calendar conversions.
pub(crate) fn prior_ut_midnight(pool: &mut AstroCachePool, instant: Timestamp) -> Timestamp {
    pool.assert_current_instant(instant);
    if let Some(v) = pool.lookup(Slot::PriorUtMidnight) {
        return v;
    }
    let memo = pool.midnight_memo();
    let value = if !memo.is_nan() && instant > memo && instant < memo + SECONDS_PER_DAY {
        memo
    } else {
        let mut c = utc_components(instant);
        c.hour = 0;
        c.minute = 0;
        c.seconds = 0.0;
        let v = instant_from_utc(&c);
        pool.set_midnight_memo(v);
        v
    };
    pool.store(Slot::PriorUtMidnight, value)
}

/// The UT noon of the calendar day containing `instant`.
pub(crate) fn noon_ut(instant: Timestamp) -> Timestamp {
    let mut c = utc_components(instant);
    c.hour = 12;
    c.minute = 0;
    c.seconds = 0.0;
    instant_from_utc(&c)
}

/// TDT/ET Julian centuries since J2000.0 for a UT instant, plus the delta-T
/// that was applied, both under one covering cache flag.
///
/// The fractional-year value feeding delta-T comes from a per-pool memo of
/// the most recent start-of-calendar-year (valid within a ~330-day window),
/// so the calendar conversion is amortized away.
pub(crate) fn julian_centuries_since_2000(
    pool: &mut AstroCachePool,
    instant: Timestamp,
) -> (f64, f64) {
    pool.assert_current_instant(instant);
    if let (Some(centuries), Some(dt)) = (
        pool.lookup(Slot::TdtCenturies),
        pool.lookup(Slot::TdtCenturiesDeltaT),
    ) {
        return (centuries, dt);
    }
    let ut = instant;
    let (memo_start, memo_year) = pool.year_memo();
    let (year_start, year) = if memo_year != 0
        && !memo_start.is_nan()
        && ut > memo_start
        && ut < memo_start + 330.0 * SECONDS_PER_DAY
    {
        (memo_start, memo_year)
    } else {
        let c = utc_components(ut);
        let start = instant_from_utc(&DateComponents {
            year: c.year,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            seconds: 0.0,
        });
        pool.set_year_memo(start, c.year);
        (start, c.year)
    };
    let year_value = year as f64 + (ut - year_start) / (365.25 * SECONDS_PER_DAY);
    let et = delta_t::ut_to_et(ut, year_value);
    let dt = et - ut;
    let centuries = (julian_date_for(et) - JD_2000_EPOCH) / JULIAN_DAYS_PER_CENTURY;
    pool.store(Slot::TdtCenturies, centuries);
    pool.store(Slot::TdtCenturiesDeltaT, dt);
    (centuries, dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ScopeId;
    use approx::assert_abs_diff_eq;

    #[test]
    fn julian_date_anchors() {
        // Reference epoch 2001-01-01 00:00:00 UTC.
        assert_abs_diff_eq!(julian_date_for(0.0), 2_451_910.5, epsilon = 1e-9);
        // The 1990 anchor maps to its own Julian date.
        assert_abs_diff_eq!(
            julian_date_for(crate::constants::EPOCH_1990_SECONDS),
            JD_1990_EPOCH,
            epsilon = 1e-9
        );
    }

    #[test]
    fn calendar_round_trip() {
        let c = DateComponents {
            year: 1986,
            month: 3,
            day: 10,
            hour: 11,
            minute: 4,
            seconds: 30.25,
        };
        let instant = instant_from_utc(&c);
        let back = utc_components(instant);
        assert_eq!((back.year, back.month, back.day), (1986, 3, 10));
        assert_eq!((back.hour, back.minute), (11, 4));
        assert_abs_diff_eq!(back.seconds, 30.25, epsilon = 1e-6);
    }

    #[test]
    fn day_of_year_handles_leap_years() {
        assert_eq!(day_of_year(2001, 1, 1), 1);
        assert_eq!(day_of_year(2001, 12, 31), 365);
        assert_eq!(day_of_year(2000, 12, 31), 366);
        assert_eq!(day_of_year(2000, 3, 1), 61);
        assert_eq!(day_of_year(1900, 3, 1), 60); // 1900 is not a leap year
    }

    #[test]
    fn prior_midnight_and_memo() {
        let mut pool = AstroCachePool::new();
        let c = DateComponents {
            year: 2008,
            month: 6,
            day: 27,
            hour: 23,
            minute: 35,
            seconds: 0.0,
        };
        let instant = instant_from_utc(&c);
        pool.push_scope(ScopeId::Final, instant, 2.0);
        let midnight = prior_ut_midnight(&mut pool, instant);
        let mc = utc_components(midnight);
        assert_eq!((mc.year, mc.month, mc.day, mc.hour, mc.minute), (2008, 6, 27, 0, 0));
        // Later the same day: served from the memo through a fresh scope.
        let later = instant + 10.0;
        pool.push_scope(ScopeId::Final, later, 2.0);
        assert_eq!(prior_ut_midnight(&mut pool, later), midnight);
    }

    #[test]
    fn centuries_at_reference_points() {
        let mut pool = AstroCachePool::new();
        // 2000-01-01 12:00:00 UT is J2000.0 up to delta-T.
        let instant = instant_from_utc(&DateComponents {
            year: 2000,
            month: 1,
            day: 1,
            hour: 12,
            minute: 0,
            seconds: 0.0,
        });
        pool.push_scope(ScopeId::Final, instant, 2.0);
        let (centuries, dt) = julian_centuries_since_2000(&mut pool, instant);
        // delta-T near 2000 is about 64 s; centuries offset is dt converted.
        assert_abs_diff_eq!(dt, 64.0, epsilon = 2.0);
        assert_abs_diff_eq!(
            centuries,
            dt / (SECONDS_PER_DAY * JULIAN_DAYS_PER_CENTURY),
            epsilon = 1e-12
        );
        // Cached on second call, bit-identical.
        let (again, dt2) = julian_centuries_since_2000(&mut pool, instant);
        assert_eq!(centuries.to_bits(), again.to_bits());
        assert_eq!(dt.to_bits(), dt2.to_bits());
    }
}
