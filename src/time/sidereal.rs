//! Sidereal time, in both directions.
//!
//! Greenwich Mean Sidereal Time uses the IAU P03 expression: a degree-5
//! polynomial in TT centuries since J2000 (with the UT1/TT split carried via
//! delta-T) plus the rotation since the prior UT midnight. The inverse
//! (GST → UT) solves the linear relation; because a sidereal day is shorter
//! than a solar day there may be zero, one or two UTs for a given GST within
//! one calendar day, and [`gst_to_ut_closest`] picks the solution nearest a
//! reference instant, stepping a day forward or backward when needed.

use crate::cache::{AstroCachePool, ScopeId, Slot};
use crate::constants::{
    Radian, Timestamp, ASTRO_SLOP, DPI, JULIAN_DAYS_PER_CENTURY, SECONDS_PER_DAY,
    UT_UNITS_PER_GST_UNIT,
};
use crate::time::{julian_centuries_since_2000, normalize_radians, prior_ut_midnight};

use std::f64::consts::PI;

/// Radians of UT per second of UT.
const RADIANS_PER_UT_SECOND: f64 = PI / (12.0 * 3600.0);

/// P03 Greenwich Mean Sidereal Time, in radians.
///
/// `centuries_tdt` is TT centuries since J2000 at the instant,
/// `delta_t_seconds` the delta-T applied there, and
/// `ut_since_midnight_radians` the Earth-rotation term.
pub(crate) fn gmst_p03(
    centuries_tdt: f64,
    delta_t_seconds: f64,
    ut_since_midnight_radians: Radian,
) -> Radian {
    let t = centuries_tdt;
    let tu = t - delta_t_seconds / (SECONDS_PER_DAY * JULIAN_DAYS_PER_CENTURY);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t2 * t2;
    let t5 = t3 * t2;
    // Seconds of sidereal time.
    let mut gmst = 24110.5493771
        + 8640184.79447825 * tu
        + 307.4771013 * (t - tu)
        + 0.092772110 * t2
        - 0.0000002926 * t3
        - 0.00000199708 * t4
        - 0.000000002454 * t5;
    gmst *= PI / (12.0 * 3600.0);
    gmst += ut_since_midnight_radians;
    normalize_radians(gmst)
}

/// GMST for an instant, via the current cache scope.
pub(crate) fn gst_for_instant(pool: &mut AstroCachePool, instant: Timestamp) -> Radian {
    let (centuries, delta_t) = julian_centuries_since_2000(pool, instant);
    let midnight = prior_ut_midnight(pool, instant);
    let ut_radians = (instant - midnight) * RADIANS_PER_UT_SECOND;
    gmst_p03(centuries, delta_t, ut_radians)
}

/// LST → GST. Also reports whether the wraparound crossed a day boundary
/// (−1, 0 or +1).
pub(crate) fn lst_to_gst(lst: Radian, observer_longitude: Radian) -> (Radian, i32) {
    let gst = lst - observer_longitude;
    if gst < 0.0 {
        (gst + DPI, -1)
    } else if gst > DPI {
        (gst - DPI, 1)
    } else {
        (gst, 0)
    }
}

/// GST → LST for an observer longitude (east positive).
pub(crate) fn gst_to_lst(gst: Radian, observer_longitude: Radian) -> Radian {
    let lst = gst + observer_longitude;
    if lst < 0.0 {
        lst + DPI
    } else if lst > DPI {
        lst - DPI
    } else {
        lst
    }
}

/// GST → UT radians since the given UT midnight. Returns the first solution
/// and, when the sidereal day wraps twice within the calendar day, the
/// second (later) one.
///
/// Evaluates sidereal time at `prior_midnight` under the `Midnight` scope so
/// repeated conversions against the same midnight are served from cache.
pub(crate) fn gst_to_ut(
    pool: &mut AstroCachePool,
    gst: Radian,
    prior_midnight: Timestamp,
) -> (Radian, Option<Radian>) {
    let previous = pool.push_scope(ScopeId::Midnight, prior_midnight, ASTRO_SLOP);
    let (centuries, delta_t) = julian_centuries_since_2000(pool, prior_midnight);
    let t0 = gmst_p03(centuries, delta_t, 0.0);
    pool.pop_scope(previous);

    let mut ut = gst - t0;
    if ut < 0.0 {
        ut += DPI;
    } else if ut > DPI {
        ut -= DPI;
    }
    ut *= UT_UNITS_PER_GST_UNIT;
    let second = ut + UT_UNITS_PER_GST_UNIT * DPI;
    let second = (second <= DPI).then_some(second);
    (ut, second)
}

/// GST → the UT instant closest to `closest_to`.
///
/// Starts from the calendar day of `closest_to`; if the answer lands more
/// than half a (scaled) day away, either takes the second solution for the
/// same day or re-solves against the adjacent day's midnight.
pub(crate) fn gst_to_ut_closest(
    pool: &mut AstroCachePool,
    gst: Radian,
    closest_to: Timestamp,
) -> Timestamp {
    let mut prior_midnight = prior_ut_midnight(pool, closest_to);
    let (mut ut, mut ut_second) = gst_to_ut(pool, gst, prior_midnight);
    let mut ut_instant = prior_midnight + ut / RADIANS_PER_UT_SECOND;

    if ut_instant < closest_to - 12.0 * 3600.0 * UT_UNITS_PER_GST_UNIT {
        if let Some(second) = ut_second {
            // a second, later UT exists for this GST on the same day
            ut = second;
            ut_instant = prior_midnight + ut / RADIANS_PER_UT_SECOND;
        } else {
            prior_midnight += SECONDS_PER_DAY;
            let (first, _) = gst_to_ut(pool, gst, prior_midnight);
            ut = first;
            ut_instant = prior_midnight + ut / RADIANS_PER_UT_SECOND;
        }
    } else if ut_instant > closest_to + 12.0 * 3600.0 * UT_UNITS_PER_GST_UNIT {
        prior_midnight -= SECONDS_PER_DAY;
        let (first, second) = gst_to_ut(pool, gst, prior_midnight);
        ut_second = second;
        // the later of the two if there is one
        ut = ut_second.unwrap_or(first);
        ut_instant = prior_midnight + ut / RADIANS_PER_UT_SECOND;
    }
    ut_instant
}

/// GST minus UT-radians-since-midnight at an instant; drives the
/// vernal-equinox dial. Not normalized.
pub(crate) fn st_difference(pool: &mut AstroCachePool, instant: Timestamp) -> Radian {
    let (centuries, delta_t) = julian_centuries_since_2000(pool, instant);
    let midnight = prior_ut_midnight(pool, instant);
    let ut_radians = (instant - midnight) * RADIANS_PER_UT_SECOND;
    let gst = gmst_p03(centuries, delta_t, ut_radians);
    gst - ut_radians
}

/// Local sidereal time expressed as a timestamp-shaped value: the prior UT
/// midnight plus the LST in seconds. The cache slot stores the offset from
/// the calculation instant so the value stays exact under slop reuse.
pub(crate) fn local_sidereal_time(
    pool: &mut AstroCachePool,
    instant: Timestamp,
    observer_longitude: Radian,
) -> Timestamp {
    if let Some(offset) = pool.lookup(Slot::Lst) {
        return instant - offset;
    }
    let (centuries, delta_t) = julian_centuries_since_2000(pool, instant);
    let midnight = prior_ut_midnight(pool, instant);
    let ut_radians = (instant - midnight) * RADIANS_PER_UT_SECOND;
    let gst = gmst_p03(centuries, delta_t, ut_radians);
    let ret = gst_to_lst(gst, observer_longitude) / RADIANS_PER_UT_SECOND + midnight;
    pool.store(Slot::Lst, instant - ret);
    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{instant_from_utc, DateComponents};
    use approx::assert_abs_diff_eq;

    fn instant(year: i32, month: u8, day: u8, hour: u8, minute: u8, seconds: f64) -> Timestamp {
        instant_from_utc(&DateComponents {
            year,
            month,
            day,
            hour,
            minute,
            seconds,
        })
    }

    #[test]
    fn gmst_meeus_example_12b() {
        // 1987 April 10, 19:21:00 UT: GMST = 8h34m57.0896s (Meeus ex. 12.b).
        let mut pool = AstroCachePool::new();
        let t = instant(1987, 4, 10, 19, 21, 0.0);
        pool.push_scope(ScopeId::Final, t, ASTRO_SLOP);
        let gst = gst_for_instant(&mut pool, t);
        let expected = (8.0 + 34.0 / 60.0 + 57.0896 / 3600.0) * PI / 12.0;
        // P03 vs the 1982 expression and our delta-T model: stay within 2 s
        // of sidereal time.
        assert_abs_diff_eq!(gst, expected, epsilon = 2.0 * RADIANS_PER_UT_SECOND);
    }

    #[test]
    fn gst_ut_round_trip() {
        let mut pool = AstroCachePool::new();
        let t = instant(2010, 9, 14, 4, 30, 0.0);
        pool.push_scope(ScopeId::Final, t, ASTRO_SLOP);
        let gst = gst_for_instant(&mut pool, t);
        let back = gst_to_ut_closest(&mut pool, gst, t);
        assert_abs_diff_eq!(back, t, epsilon = 0.01);
    }

    #[test]
    fn gst_ut_round_trip_across_midnight() {
        let mut pool = AstroCachePool::new();
        for (h, m) in [(0u8, 2u8), (23, 58), (12, 0)] {
            let t = instant(1986, 3, 10, h, m, 0.0);
            pool.push_scope(ScopeId::Final, t, ASTRO_SLOP);
            let gst = gst_for_instant(&mut pool, t);
            let back = gst_to_ut_closest(&mut pool, gst, t);
            assert_abs_diff_eq!(back, t, epsilon = 0.01);
        }
    }

    #[test]
    fn lst_gst_wraparound() {
        // Meeus section 15-style: LST 0h24m5.23s at longitude 64°W.
        let lst = (0.0 + 24.0 / 60.0 + 5.23 / 3600.0) * PI / 12.0;
        let olong = -64.0 * PI / 180.0;
        let (gst, day_offset) = lst_to_gst(lst, olong);
        assert_eq!(day_offset, 0);
        assert_abs_diff_eq!(gst_to_lst(gst, olong), lst, epsilon = 1e-12);
        let expected = lst - olong; // 4h40m5.23s
        assert_abs_diff_eq!(gst, expected, epsilon = 1e-12);
    }

    #[test]
    fn local_sidereal_time_is_cached_exactly() {
        let mut pool = AstroCachePool::new();
        let t = instant(2021, 6, 1, 2, 0, 0.0);
        let lon = 0.3;
        pool.push_scope(ScopeId::Final, t, ASTRO_SLOP);
        let a = local_sidereal_time(&mut pool, t, lon);
        let b = local_sidereal_time(&mut pool, t, lon);
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
