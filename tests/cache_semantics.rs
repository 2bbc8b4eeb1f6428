mod common;

use common::{boston, utc};
use orrery::almanac::{Almanac, CalculationContext, DialFace, TimeBase};
use orrery::bodies::Body;
use orrery::constants::RADEG;
use orrery::env::ObserverClock;

/// Any public query repeated with no state change must return bit-identical
/// results: the second call is a cache hit, not a recomputation that could
/// drift.
#[test]
fn repeated_queries_are_bit_identical() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2012, 9, 1, 16, 0, 0.0);
    let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();

    macro_rules! check_twice {
        ($expr:expr) => {{
            let first = $expr;
            let second = $expr;
            assert_eq!(first.to_bits(), second.to_bits(), "{}", stringify!($expr));
        }};
    }

    check_twice!(session.next_rise(Body::Sun).event().unwrap());
    check_twice!(session.set_for_day(Body::Moon).event().unwrap());
    check_twice!(session.moon_age_angle());
    check_twice!(session.eot_seconds());
    check_twice!(session.altitude(Body::Venus).unwrap());
    check_twice!(session.azimuth(Body::Venus).unwrap());
    check_twice!(session.eclipse_abstract_separation());
    check_twice!(session.next_new_moon());
    check_twice!(session.local_sidereal_time());
    check_twice!(session.vernal_equinox_angle());
    check_twice!(session.calendar_error_vs_tropical_year());
    check_twice!(session.moon_relative_position_angle());
    check_twice!(session.day_night_leaf_angle(Body::Sun, 3.0, 12, DialFace::Day, TimeBase::LocalTime));
    check_twice!(session.right_ascension(Body::Mars, true).unwrap());
}

/// Queries must agree across sessions at the same instant: the cache only
/// ever serves values valid for the bound instant.
#[test]
fn fresh_sessions_agree_with_cached_ones() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2012, 9, 1, 16, 0, 0.0);
    let first = {
        let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
        (
            session.next_rise(Body::Sun),
            session.moon_age_angle(),
            session.azimuth(Body::Sun).unwrap(),
        )
    };
    let second = {
        let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
        (
            session.next_rise(Body::Sun),
            session.moon_age_angle(),
            session.azimuth(Body::Sun).unwrap(),
        )
    };
    assert_eq!(first.0, second.0);
    assert_eq!(first.1.to_bits(), second.1.to_bits());
    assert_eq!(first.2.to_bits(), second.2.to_bits());
}

/// Changing only the longitude leaves location-independent quantities
/// (sun RA) untouched and moves location-dependent ones (azimuth).
#[test]
fn longitude_change_moves_azimuth_not_ra() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2012, 9, 1, 16, 0, 0.0);
    let (ra_here, az_here) = {
        let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
        (
            session.right_ascension(Body::Sun, false).unwrap(),
            session.azimuth(Body::Sun).unwrap(),
        )
    };
    let mut env = boston(at);
    env.longitude += 5.0 * RADEG;
    let (ra_there, az_there) = {
        let mut session = almanac.session(&mut ctx, &env).unwrap();
        (
            session.right_ascension(Body::Sun, false).unwrap(),
            session.azimuth(Body::Sun).unwrap(),
        )
    };
    assert_eq!(ra_here.to_bits(), ra_there.to_bits());
    assert!(
        (az_here - az_there).abs() > 1.0 * RADEG,
        "azimuth should move with the observer"
    );
}

/// A changed instant invalidates the previous instant's answers.
#[test]
fn instant_change_recomputes() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2012, 9, 1, 16, 0, 0.0);
    let age_now = {
        let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
        session.moon_age_angle()
    };
    let age_later = {
        let mut session = almanac
            .session(&mut ctx, &boston(at + 6.0 * 3600.0))
            .unwrap();
        session.moon_age_angle()
    };
    assert!(
        (age_later - age_now).abs() > 1e-3,
        "moon age should advance in six hours"
    );
}

/// An unbound location makes location-dependent queries answer Invalid and
/// leaves location-independent ones working.
#[test]
fn invalid_location_degrades_gracefully() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2012, 9, 1, 16, 0, 0.0);
    let mut env = boston(at);
    env.location_valid = false;
    let mut session = almanac.session(&mut ctx, &env).unwrap();
    assert!(!session.next_rise(Body::Sun).is_event());
    assert_eq!(session.is_up(Body::Sun), Some(false));
    // Positions only need the instant.
    assert!(session.right_ascension(Body::Sun, false).is_some());
    let age = session.moon_age_angle();
    assert!(age.is_finite());
}

/// Observer validation happens at session setup.
#[test]
fn bad_observer_is_rejected_at_setup() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2012, 9, 1, 16, 0, 0.0);
    let bad_lat = ObserverClock::new(at, 2.0, -1.2, 0.0);
    assert!(almanac.session(&mut ctx, &bad_lat).is_err());
    let bad_instant = ObserverClock::new(f64::NAN, 0.7, -1.2, 0.0);
    assert!(almanac.session(&mut ctx, &bad_instant).is_err());
}
