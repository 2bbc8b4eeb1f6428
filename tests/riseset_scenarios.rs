mod common;

use common::{arctic, boston, sydney, utc};
use orrery::almanac::{Almanac, CalculationContext, TwilightKind};
use orrery::bodies::Body;
use orrery::env::ObserverClock;
use orrery::constants::RADEG;
use orrery::solver::HorizonState;

/// Meeus-based scenario: sunrise in Boston on 1986 March 10 is a few
/// minutes after 11:04 UT (06:04 EST).
#[test]
fn boston_sunrise_1986_march_10() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(1986, 3, 10, 11, 0, 0.0); // local morning
    let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
    let sunrise = session.sunrise_for_day();
    let HorizonState::Event(t) = sunrise else {
        panic!("expected a sunrise event, got {sunrise:?}");
    };
    let expected = utc(1986, 3, 10, 11, 4, 30.0);
    assert!(
        (t - expected).abs() < 300.0,
        "sunrise off by {} s",
        t - expected
    );
}

#[test]
fn rise_transit_set_are_ordered_at_mid_latitudes() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    for env in [
        boston(utc(1986, 3, 10, 16, 0, 0.0)),
        boston(utc(2012, 9, 1, 16, 0, 0.0)),
        sydney(utc(2010, 5, 5, 2, 0, 0.0)),
    ] {
        let mut session = almanac.session(&mut ctx, &env).unwrap();
        let rise = session.sunrise_for_day().event().expect("sunrise");
        let transit = session.suntransit_for_day().event().expect("transit");
        let set = session.sunset_for_day().event().expect("sunset");
        assert!(rise < transit, "rise {rise} !< transit {transit}");
        assert!(transit < set, "transit {transit} !< set {set}");
        // The whole arc fits inside a day.
        assert!(set - rise < 24.0 * 3600.0);
    }
}

#[test]
fn polar_day_and_night_sentinels_are_consistent() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();

    // Midsummer at 70°N: the sun never sets.
    for hour in [6, 12, 18] {
        let mut session = almanac
            .session(&mut ctx, &arctic(utc(2008, 6, 21, hour, 0, 0.0)))
            .unwrap();
        assert_eq!(session.next_rise(Body::Sun), HorizonState::AlwaysAbove);
        // Repeated call: identical (and served from cache).
        assert_eq!(session.next_rise(Body::Sun), HorizonState::AlwaysAbove);
        assert!(session.polar_summer(Body::Sun));
        assert!(!session.polar_winter(Body::Sun));
    }

    // Midwinter: the sun never rises.
    for hour in [6, 12, 18] {
        let mut session = almanac
            .session(&mut ctx, &arctic(utc(2008, 12, 21, hour, 0, 0.0)))
            .unwrap();
        assert_eq!(session.next_rise(Body::Sun), HorizonState::AlwaysBelow);
        assert!(session.polar_winter(Body::Sun));
        assert!(!session.polar_summer(Body::Sun));
    }
}

/// Late August at 70°N: the midnight sun has ended, so rises and sets are
/// back (the bug-2 scenario of the original engine).
#[test]
fn arctic_late_august_sunrise_exists() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2008, 8, 27, 3, 0, 0.0);
    let mut session = almanac.session(&mut ctx, &arctic(at)).unwrap();
    let rise = session.next_rise(Body::Sun);
    let HorizonState::Event(t) = rise else {
        panic!("expected a sunrise at 70N in late August, got {rise:?}");
    };
    assert!(t > at && t - at < 30.0 * 3600.0);
}

/// Within 0.1° of the pole the solver may only manage a best-effort answer;
/// what matters is that it is finite work, deterministic, and repeatable.
#[test]
fn near_pole_is_deterministic_and_bounded() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    for (month, day) in [(3, 18), (3, 22), (9, 25), (12, 21)] {
        let at = utc(2008, month, day, 18, 0, 0.0);
        let env = ObserverClock::new(at, 89.95 * RADEG, 0.0, 0.0);
        let first = {
            let mut session = almanac.session(&mut ctx, &env).unwrap();
            session.rise_for_day(Body::Sun)
        };
        let second = {
            let mut session = almanac.session(&mut ctx, &env).unwrap();
            session.rise_for_day(Body::Sun)
        };
        assert_eq!(first, second, "{month}/{day} differed between sessions");
    }
}

#[test]
fn twilights_bracket_the_day() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2010, 4, 15, 16, 0, 0.0);
    let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
    let astro_m = session
        .sun_time_for_day(TwilightKind::AstroTwilightMorning)
        .event()
        .expect("astronomical dawn");
    let naut_m = session
        .sun_time_for_day(TwilightKind::NauticalTwilightMorning)
        .event()
        .expect("nautical dawn");
    let civil_m = session
        .sun_time_for_day(TwilightKind::CivilTwilightMorning)
        .event()
        .expect("civil dawn");
    let rise = session
        .sun_time_for_day(TwilightKind::RiseMorning)
        .event()
        .expect("sunrise");
    assert!(astro_m < naut_m && naut_m < civil_m && civil_m < rise);

    let set = session
        .sun_time_for_day(TwilightKind::SetEvening)
        .event()
        .expect("sunset");
    let civil_e = session
        .sun_time_for_day(TwilightKind::CivilTwilightEvening)
        .event()
        .expect("civil dusk");
    let naut_e = session
        .sun_time_for_day(TwilightKind::NauticalTwilightEvening)
        .event()
        .expect("nautical dusk");
    let astro_e = session
        .sun_time_for_day(TwilightKind::AstroTwilightEvening)
        .event()
        .expect("astronomical dusk");
    assert!(set < civil_e && civil_e < naut_e && naut_e < astro_e);
}

#[test]
fn next_and_prev_straddle_the_instant() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2012, 9, 1, 16, 0, 0.0);
    let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
    for body in [Body::Sun, Body::Moon, Body::Venus, Body::Jupiter] {
        let next = session.next_rise(body).event().expect("next rise");
        let prev = session.prev_rise(body).event().expect("prev rise");
        assert!(next >= at - 5.0, "{body:?} next rise in the past");
        assert!(prev < at + 5.0, "{body:?} prev rise in the future");
        assert!(next - prev < 27.0 * 3600.0, "{body:?} rises too far apart");
    }
}

#[test]
fn is_up_matches_the_clock() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    // Local noon in Boston.
    let mut session = almanac
        .session(&mut ctx, &boston(utc(2012, 9, 1, 17, 0, 0.0)))
        .unwrap();
    assert_eq!(session.is_up(Body::Sun), Some(true));
    drop(session);
    // Local midnight.
    let mut session = almanac
        .session(&mut ctx, &boston(utc(2012, 9, 1, 5, 0, 0.0)))
        .unwrap();
    assert_eq!(session.is_up(Body::Sun), Some(false));
}

#[test]
fn running_backward_flips_next_and_prev() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2012, 9, 1, 16, 0, 0.0);
    let forward = {
        let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
        session.next_rise(Body::Sun).event().unwrap()
    };
    let mut env = boston(at);
    env.running_backward = true;
    let backward = {
        let mut session = almanac.session(&mut ctx, &env).unwrap();
        session.next_rise(Body::Sun).event().unwrap()
    };
    // With the clock running backward, "next" means earlier.
    assert!(forward > at);
    assert!(backward < at);
}
