mod common;

use common::{boston, utc};
use orrery::almanac::{Almanac, CalculationContext, EclipseKind, Quarter};
use orrery::constants::{LUNAR_CYCLE_SECONDS, RADEG, SECONDS_PER_DAY};
use orrery::env::ObserverClock;

/// The 2017 August 21 total solar eclipse, observed from Hopkinsville KY,
/// on the center line, near greatest eclipse (~18:25 UT).
#[test]
fn great_american_eclipse_is_classified_solar() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2017, 8, 21, 18, 25, 0.0);
    let env = ObserverClock::new(at, 36.865 * RADEG, -87.49 * RADEG, -5.0 * 3600.0);
    let mut session = almanac.session(&mut ctx, &env).unwrap();
    let kind = session.eclipse_kind();
    assert!(kind.is_solar(), "expected a solar eclipse, got {kind:?}");
    assert!(
        matches!(
            kind,
            EclipseKind::TotalSolar | EclipseKind::PartialSolar | EclipseKind::AnnularSolar
        ),
        "expected an eclipse in progress, got {kind:?}"
    );
    // Deep inside the partial threshold the abstract needle reads below 2.
    assert!(session.eclipse_abstract_separation() < 2.0);
}

/// An ordinary day reads "no eclipse" with the needle pegged.
#[test]
fn quiet_sky_reads_no_eclipse() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let mut session = almanac
        .session(&mut ctx, &boston(utc(2012, 9, 1, 16, 0, 0.0)))
        .unwrap();
    let kind = session.eclipse_kind();
    assert!(!kind.is_eclipsing(), "unexpected eclipse {kind:?}");
    assert!(session.eclipse_abstract_separation() >= 2.0);
}

#[test]
fn new_moon_searches_are_self_consistent() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2014, 2, 3, 4, 0, 0.0);
    let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
    let next_new = session.next_new_moon();
    let closest_new = session.closest_new_moon();
    assert!(next_new > at, "next new moon is not ahead");
    assert!(next_new - at <= LUNAR_CYCLE_SECONDS + SECONDS_PER_DAY);
    assert!((closest_new - at).abs() <= LUNAR_CYCLE_SECONDS / 2.0 + SECONDS_PER_DAY);
    // Closest is either the next one or exactly one cycle before it.
    let diff = next_new - closest_new;
    assert!(
        diff.abs() < 60.0
            || (diff > LUNAR_CYCLE_SECONDS - SECONDS_PER_DAY
                && diff < LUNAR_CYCLE_SECONDS + SECONDS_PER_DAY),
        "next-closest gap of {diff} s is not 0 or one cycle"
    );
    drop(session);

    // The moon-age angle at the found new moon is (numerically) zero.
    let mut session = almanac.session(&mut ctx, &boston(closest_new)).unwrap();
    let age = session.moon_age_angle();
    let wrapped = age.min(std::f64::consts::TAU - age);
    assert!(wrapped < 0.01, "age at new moon is {wrapped}");
}

#[test]
fn quarters_progress_through_the_cycle() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2014, 2, 3, 4, 0, 0.0);
    let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
    let new = session.next_quarter(Quarter::New);
    let first = session.next_quarter(Quarter::FirstQuarter);
    let full = session.next_quarter(Quarter::Full);
    let third = session.next_quarter(Quarter::ThirdQuarter);
    for t in [new, first, full, third] {
        assert!(t > at && t - at < LUNAR_CYCLE_SECONDS + SECONDS_PER_DAY);
    }
    // Quarter spacing within the cycle is roughly 7.4 days between adjacent
    // phases, whatever order they come up in.
    let mut instants = [new, first, full, third];
    instants.sort_by(|a, b| a.partial_cmp(b).unwrap());
    for pair in instants.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap > 5.5 * SECONDS_PER_DAY && gap < 9.5 * SECONDS_PER_DAY,
            "quarter gap of {} days",
            gap / SECONDS_PER_DAY
        );
    }
}

#[test]
fn running_backward_searches_behind() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2014, 2, 3, 4, 0, 0.0);
    let mut env = boston(at);
    env.running_backward = true;
    let mut session = almanac.session(&mut ctx, &env).unwrap();
    let next_new = session.next_new_moon();
    assert!(next_new < at, "backward clock should find the previous new moon");
}

#[test]
fn next_and_prev_phase_straddle_now() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2014, 2, 3, 4, 0, 0.0);
    let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
    let next = session.next_moon_phase();
    let prev = session.prev_moon_phase();
    assert!(next >= at - 60.0 && next - at < 8.0 * SECONDS_PER_DAY);
    assert!(prev <= at + 60.0 && at - prev < 8.0 * SECONDS_PER_DAY);
}

/// The dial's "phase" companion value is (1 − cos age)/2 by definition —
/// a legacy of the terminator display, not the illuminated fraction. Pinned
/// here so nobody quietly "fixes" it and skews every terminator that
/// consumes it.
#[test]
fn moon_phase_fraction_is_the_legacy_dial_value() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    for day in [1u8, 8, 15, 22] {
        let at = utc(2014, 3, day, 0, 0, 0.0);
        let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
        let age = session.moon_age_angle();
        let phase = session.moon_phase_fraction();
        assert_eq!(phase.to_bits(), ((1.0 - age.cos()) / 2.0).to_bits());
    }
}

#[test]
fn real_moon_age_counts_days_since_new() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2014, 2, 3, 4, 0, 0.0);
    let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
    let age_days = session.real_moon_age_days();
    assert!(
        (0.0..30.0).contains(&age_days),
        "real moon age {age_days} days out of range"
    );
    // Consistent with the age angle at cycle scale.
    let age_angle = session.moon_age_angle();
    let predicted = age_angle / std::f64::consts::TAU * LUNAR_CYCLE_SECONDS / SECONDS_PER_DAY;
    assert!(
        (age_days - predicted).abs() < 1.5,
        "age {age_days} vs predicted {predicted}"
    );
}

#[test]
fn moon_phase_name_tracks_age() {
    let almanac = Almanac::with_builtin_series();
    let mut ctx = CalculationContext::new();
    let at = utc(2014, 2, 3, 4, 0, 0.0);
    let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
    let new_moon = session.next_new_moon();
    drop(session);
    let mut session = almanac.session(&mut ctx, &boston(new_moon)).unwrap();
    assert_eq!(session.moon_phase_name(), "New");
    drop(session);
    // A week later the moon is near first quarter.
    let mut session = almanac
        .session(&mut ctx, &boston(new_moon + 7.4 * SECONDS_PER_DAY))
        .unwrap();
    let name = session.moon_phase_name();
    assert!(
        ["1st Quarter", "Waxing Crescent", "Waxing Gibbous"].contains(&name),
        "unexpected phase name {name}"
    );
}
