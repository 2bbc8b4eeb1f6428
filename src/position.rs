//! Cached apparent positions and horizontal coordinates.
//!
//! These helpers sit between the raw [`SeriesProvider`] and the solver and
//! facade layers: every result is memoized in the current cache scope under
//! its `(quantity, body)` slot, so repeated queries at one instant hit the
//! series at most once.

use crate::bodies::{size_and_parallax, Body};
use crate::cache::{AstroCachePool, Slot};
use crate::constants::{
    Au, Radian, Timestamp, DPI, LIMITING_AZIMUTH_LATITUDE, PARALLAX_CONSTANT_ARCSEC,
    RADSEC, REFRACTION_AT_HORIZON,
};
use crate::series::{BodyPosition, Precision, SeriesProvider};
use crate::time::{julian_centuries_since_2000, sidereal};

/// Apparent ecliptic longitude of the Sun, cached.
pub(crate) fn sun_ecliptic_longitude(
    provider: &dyn SeriesProvider,
    pool: &mut AstroCachePool,
    instant: Timestamp,
) -> Radian {
    pool.assert_current_instant(instant);
    if let Some(v) = pool.lookup(Slot::SunApparentLongitude) {
        return v;
    }
    let (t, _) = julian_centuries_since_2000(pool, instant);
    let v = provider.sun_apparent_longitude(t);
    pool.store(Slot::SunApparentLongitude, v)
}

/// Sun-Earth distance in AU, cached.
pub(crate) fn sun_distance(
    provider: &dyn SeriesProvider,
    pool: &mut AstroCachePool,
    instant: Timestamp,
) -> Au {
    pool.assert_current_instant(instant);
    if let Some(v) = pool.lookup(Slot::SunDistance) {
        return v;
    }
    let (t, _) = julian_centuries_since_2000(pool, instant);
    let v = provider.sun_distance(t);
    pool.store(Slot::SunDistance, v)
}

/// Nutation in longitude and true obliquity, cached as a pair.
pub(crate) fn nutation_obliquity(
    provider: &dyn SeriesProvider,
    pool: &mut AstroCachePool,
    instant: Timestamp,
) -> (Radian, Radian) {
    pool.assert_current_instant(instant);
    if let (Some(n), Some(o)) = (pool.lookup(Slot::Nutation), pool.lookup(Slot::Obliquity)) {
        return (n, o);
    }
    let (t, _) = julian_centuries_since_2000(pool, instant);
    let (nutation, obliquity) = provider.nutation_obliquity(t);
    pool.store(Slot::Nutation, nutation);
    pool.store(Slot::Obliquity, obliquity);
    (nutation, obliquity)
}

/// Longitude of the Moon's ascending node, cached.
pub(crate) fn moon_ascending_node_longitude(
    provider: &dyn SeriesProvider,
    pool: &mut AstroCachePool,
    instant: Timestamp,
) -> Radian {
    pool.assert_current_instant(instant);
    if let Some(v) = pool.lookup(Slot::AscendingNodeLongitude) {
        return v;
    }
    let (t, _) = julian_centuries_since_2000(pool, instant);
    let v = provider.moon_ascending_node_longitude(t);
    pool.store(Slot::AscendingNodeLongitude, v)
}

/// Apparent geocentric position of a body, cached.
///
/// The Moon's low and mid precision tiers get their own slots so a trial
/// iteration at low precision never masquerades as the full-precision
/// answer. All five components of a position are stored together under one
/// covering flag (the RA slot).
pub(crate) fn body_position(
    provider: &dyn SeriesProvider,
    pool: &mut AstroCachePool,
    instant: Timestamp,
    body: Body,
    precision: Precision,
) -> BodyPosition {
    pool.assert_current_instant(instant);
    if body == Body::Moon && precision != Precision::Full {
        if let (Some(ra), Some(decl), Some(longitude), Some(latitude), Some(distance)) = (
            pool.lookup(Slot::MoonSeriesRa(precision)),
            pool.lookup(Slot::MoonSeriesDecl(precision)),
            pool.lookup(Slot::MoonSeriesLongitude(precision)),
            pool.lookup(Slot::MoonSeriesLatitude(precision)),
            pool.lookup(Slot::MoonSeriesDistance(precision)),
        ) {
            return BodyPosition {
                right_ascension: ra,
                declination: decl,
                ecliptic_longitude: longitude,
                ecliptic_latitude: latitude,
                distance,
            };
        }
        let (t, _) = julian_centuries_since_2000(pool, instant);
        let pos = provider.moon_position(t, precision);
        pool.store(Slot::MoonSeriesRa(precision), pos.right_ascension);
        pool.store(Slot::MoonSeriesDecl(precision), pos.declination);
        pool.store(Slot::MoonSeriesLongitude(precision), pos.ecliptic_longitude);
        pool.store(Slot::MoonSeriesLatitude(precision), pos.ecliptic_latitude);
        pool.store(Slot::MoonSeriesDistance(precision), pos.distance);
        return pos;
    }

    if let (Some(ra), Some(decl), Some(longitude), Some(latitude), Some(distance)) = (
        pool.lookup(Slot::Ra(body)),
        pool.lookup(Slot::Decl(body)),
        pool.lookup(Slot::EclipticLongitude(body)),
        pool.lookup(Slot::EclipticLatitude(body)),
        pool.lookup(Slot::GeocentricDistance(body)),
    ) {
        return BodyPosition {
            right_ascension: ra,
            declination: decl,
            ecliptic_longitude: longitude,
            ecliptic_latitude: latitude,
            distance,
        };
    }
    let (t, _) = julian_centuries_since_2000(pool, instant);
    let pos = match body {
        Body::Sun => provider.sun_position(t),
        Body::Moon => provider.moon_position(t, Precision::Full),
        _ => {
            debug_assert!(body.is_planet(), "no geocentric series for {body:?}");
            provider.planet_position(body, t)
        }
    };
    pool.store(Slot::Ra(body), pos.right_ascension);
    pool.store(Slot::Decl(body), pos.declination);
    pool.store(Slot::EclipticLongitude(body), pos.ecliptic_longitude);
    pool.store(Slot::EclipticLatitude(body), pos.ecliptic_latitude);
    pool.store(Slot::GeocentricDistance(body), pos.distance);
    pos
}

/// Topocentric correction for hour angle and declination (Meeus chs. 11 & 40).
///
/// Returns `(hour_angle', declination')` for an observer at sea level unless
/// an altitude in meters is supplied.
pub(crate) fn topocentric_parallax(
    ra: Radian,
    decl: Radian,
    hour_angle: Radian,
    distance: Au,
    observer_latitude: Radian,
    observer_altitude_m: f64,
) -> (Radian, Radian) {
    let _ = ra;
    const B_OVER_A: f64 = 0.99664719;
    let u = (B_OVER_A * observer_latitude.tan()).atan();
    let delta = observer_altitude_m / 6_378_140.0;
    let rho_sin_phi = B_OVER_A * u.sin() + delta * observer_latitude.sin();
    let rho_cos_phi = u.cos() + delta * observer_latitude.cos();
    let sin_pi = (PARALLAX_CONSTANT_ARCSEC * RADSEC).sin() / distance;
    let a = decl.cos() * hour_angle.sin();
    let b = decl.cos() * hour_angle.cos() - rho_cos_phi * sin_pi;
    let c = decl.sin() - rho_sin_phi * sin_pi;
    let q = (a * a + b * b + c * c).sqrt();
    let mut h_prime = a.atan2(b);
    if h_prime < 0.0 {
        h_prime += DPI;
    }
    (h_prime, (c / q).asin())
}

/// Altitude and azimuth of a body, parallax-corrected, cached.
///
/// At the poles the azimuth of everything degenerates; latitudes beyond
/// [`LIMITING_AZIMUTH_LATITUDE`] are clamped so the limiting azimuth is
/// reported instead.
pub(crate) fn body_alt_az(
    provider: &dyn SeriesProvider,
    pool: &mut AstroCachePool,
    instant: Timestamp,
    body: Body,
    observer_latitude: Radian,
    observer_longitude: Radian,
    correct_for_parallax: bool,
) -> (Radian, Radian) {
    pool.assert_current_instant(instant);
    if correct_for_parallax {
        if let (Some(alt), Some(az)) = (
            pool.lookup(Slot::Altitude(body)),
            pool.lookup(Slot::Azimuth(body)),
        ) {
            return (alt, az);
        }
    }
    let observer_latitude = observer_latitude
        .clamp(-LIMITING_AZIMUTH_LATITUDE, LIMITING_AZIMUTH_LATITUDE);
    let pos = body_position(provider, pool, instant, body, Precision::Full);
    let gst = sidereal::gst_for_instant(pool, instant);
    let lst = sidereal::gst_to_lst(gst, observer_longitude);
    let mut declination = pos.declination;
    let mut hour_angle = lst - pos.right_ascension;
    if correct_for_parallax {
        let (topo_hour_angle, topo_decl) = topocentric_parallax(
            pos.right_ascension,
            pos.declination,
            hour_angle,
            pos.distance,
            observer_latitude,
            0.0,
        );
        declination = topo_decl;
        hour_angle = topo_hour_angle;
    }
    let sin_alt = declination.sin() * observer_latitude.sin()
        + declination.cos() * observer_latitude.cos() * hour_angle.cos();
    let azimuth = (-declination.cos() * observer_latitude.cos() * hour_angle.sin())
        .atan2(declination.sin() - observer_latitude.sin() * sin_alt);
    let altitude = sin_alt.asin();
    if correct_for_parallax {
        pool.store(Slot::Altitude(body), altitude);
        pool.store(Slot::Azimuth(body), azimuth);
    }
    (altitude, azimuth)
}

/// The altitude a body's center crosses at rise or set (Meeus's h₀):
/// refraction plus semidiameter, with the parallax term when the geocentric
/// variant is wanted.
pub(crate) fn altitude_at_rise_set(
    provider: &dyn SeriesProvider,
    pool: &mut AstroCachePool,
    instant: Timestamp,
    body: Body,
    want_geocentric_altitude: bool,
    precision: Precision,
) -> Radian {
    let distance = body_position(provider, pool, instant, body, precision).distance;
    let (angular_size, parallax) = size_and_parallax(body, distance);
    (if want_geocentric_altitude { parallax } else { 0.0 })
        - REFRACTION_AT_HORIZON
        - angular_size / 2.0
}

/// Angular separation between two equatorial directions. Stable for small
/// separations, unlike arccos-based forms.
pub(crate) fn angular_separation(
    ra1: Radian,
    decl1: Radian,
    ra2: Radian,
    decl2: Radian,
) -> Radian {
    let sin_d1 = decl1.sin();
    let cos_d1 = decl1.cos();
    let sin_d2 = decl2.sin();
    let cos_d2 = decl2.cos();
    let sin_dra = (ra2 - ra1).sin();
    let cos_dra = (ra2 - ra1).cos();
    let x = cos_d1 * sin_d2 - sin_d1 * cos_d2 * cos_dra;
    let y = cos_d2 * sin_dra;
    let z = sin_d1 * sin_d2 + cos_d1 * cos_d2 * cos_dra;
    (x * x + y * y).sqrt().atan2(z)
}

/// Position angle of an object's bright limb relative to celestial north.
pub(crate) fn position_angle(
    sun_ra: Radian,
    sun_decl: Radian,
    obj_ra: Radian,
    obj_decl: Radian,
) -> Radian {
    (sun_decl.cos() * (sun_ra - obj_ra).sin()).atan2(
        obj_decl.cos() * sun_decl.sin()
            - obj_decl.sin() * sun_decl.cos() * (sun_ra - obj_ra).cos(),
    )
}

/// Initial great-circle course from point 1 toward point 2.
fn great_circle_course(lat1: Radian, lon1: Radian, lat2: Radian, lon2: Radian) -> Radian {
    ((lon1 - lon2).sin() * lat2.cos()).atan2(
        lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * (lon1 - lon2).cos(),
    )
}

/// Great-circle course from an object toward the celestial north pole,
/// expressed on a sphere whose north is the observer's zenith.
pub(crate) fn north_angle(altitude: Radian, azimuth: Radian, observer_latitude: Radian) -> Radian {
    great_circle_course(altitude, azimuth, observer_latitude, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ScopeId;
    use crate::constants::{ASTRO_SLOP, RADEG};
    use crate::series::meeus::MeeusSeries;
    use crate::time::{instant_from_utc, DateComponents};
    use approx::assert_abs_diff_eq;

    #[test]
    fn angular_separation_small_and_large() {
        // Identical directions.
        assert_abs_diff_eq!(angular_separation(1.0, 0.2, 1.0, 0.2), 0.0, epsilon = 1e-12);
        // Opposite points on the equator.
        assert_abs_diff_eq!(
            angular_separation(0.0, 0.0, std::f64::consts::PI, 0.0),
            std::f64::consts::PI,
            epsilon = 1e-12
        );
        // One degree apart in declination.
        assert_abs_diff_eq!(
            angular_separation(0.3, 0.0, 0.3, 1.0 * RADEG),
            1.0 * RADEG,
            epsilon = 1e-12
        );
    }

    #[test]
    fn parallax_shrinks_declination_toward_horizon() {
        // For a northern observer, topocentric declination of a southern
        // object is pushed further south (the observer sits above the
        // geocenter).
        let (h_prime, decl_prime) =
            topocentric_parallax(0.0, -0.1, 0.3, 0.0025, 42.0 * RADEG, 0.0);
        assert!(decl_prime < -0.1);
        assert!(h_prime > 0.0 && h_prime < DPI);
    }

    #[test]
    fn body_position_is_cached() {
        let provider = MeeusSeries::new();
        let mut pool = AstroCachePool::new();
        let instant = instant_from_utc(&DateComponents {
            year: 2010,
            month: 3,
            day: 1,
            hour: 0,
            minute: 0,
            seconds: 0.0,
        });
        pool.push_scope(ScopeId::Final, instant, ASTRO_SLOP);
        let a = body_position(&provider, &mut pool, instant, Body::Sun, Precision::Full);
        let b = body_position(&provider, &mut pool, instant, Body::Sun, Precision::Full);
        assert_eq!(a, b);
        assert!(pool.lookup(Slot::Ra(Body::Sun)).is_some());
        // Low-precision moon answers live in their own slots.
        body_position(&provider, &mut pool, instant, Body::Moon, Precision::Low);
        assert!(pool.lookup(Slot::MoonSeriesRa(Precision::Low)).is_some());
        assert!(pool.lookup(Slot::Ra(Body::Moon)).is_none());
    }

    #[test]
    fn rise_set_altitude_is_below_horizon_for_sun() {
        let provider = MeeusSeries::new();
        let mut pool = AstroCachePool::new();
        let instant = instant_from_utc(&DateComponents {
            year: 2010,
            month: 3,
            day: 1,
            hour: 0,
            minute: 0,
            seconds: 0.0,
        });
        pool.push_scope(ScopeId::Final, instant, ASTRO_SLOP);
        let h0 = altitude_at_rise_set(&provider, &mut pool, instant, Body::Sun, true, Precision::Full);
        // Roughly -(34' + 16') = -0.83°, plus a negligible solar parallax.
        assert_abs_diff_eq!(h0 / RADEG, -0.83, epsilon = 0.03);
    }
}
