//! Built-in classical series: Meeus solar theory, a truncated ELP2000 lunar
//! series with three precision tiers, and Keplerian planetary positions from
//! the JPL/Standish approximate elements.
//!
//! Accuracy at full precision: Sun ~0.01°, Moon a few hundredths of a
//! degree in longitude (~0.1° worst case), planets a few arcminutes over
//! 1800–2050. That is watch-face grade, not almanac grade; plug a better
//! [`SeriesProvider`] into the engine when you need more.

use crate::bodies::Body;
use crate::constants::{Au, Radian, AU_KM, DPI, RADEG, RADSEC};
use crate::series::{BodyPosition, Heliocentric, Precision, SeriesProvider};
use crate::time::precession::general_precession_since_j2000;

/// The built-in provider. Stateless; construct freely.
#[derive(Debug, Default, Clone, Copy)]
pub struct MeeusSeries;

impl MeeusSeries {
    pub fn new() -> Self {
        MeeusSeries
    }
}

#[inline]
fn normalize(angle: Radian) -> Radian {
    let r = angle % DPI;
    if r < 0.0 {
        r + DPI
    } else {
        r
    }
}

/// Equatorial coordinates from ecliptic ones, for a given obliquity.
fn equatorial_from_ecliptic(longitude: Radian, latitude: Radian, obliquity: Radian) -> (Radian, Radian) {
    let sin_decl =
        latitude.sin() * obliquity.cos() + latitude.cos() * obliquity.sin() * longitude.sin();
    let decl = sin_decl.asin();
    let y = longitude.sin() * obliquity.cos() - latitude.tan() * obliquity.sin();
    let x = longitude.cos();
    (normalize(y.atan2(x)), decl)
}

/// Mean obliquity of the ecliptic (Meeus 22.2), radians.
fn mean_obliquity(t: f64) -> Radian {
    let t2 = t * t;
    let t3 = t2 * t;
    (84381.448 - 46.8150 * t - 0.00059 * t2 + 0.001813 * t3) * RADSEC
}

/// Leading nutation terms (Meeus ch. 22 abridged): nutation in longitude and
/// in obliquity, radians.
fn nutation_terms(t: f64) -> (Radian, Radian) {
    let omega = (125.04452 - 1934.136261 * t) * RADEG;
    let l_sun = (280.4665 + 36000.7698 * t) * RADEG;
    let l_moon = (218.3165 + 481267.8813 * t) * RADEG;
    let dpsi = (-17.20 * omega.sin() - 1.32 * (2.0 * l_sun).sin() - 0.23 * (2.0 * l_moon).sin()
        + 0.21 * (2.0 * omega).sin())
        * RADSEC;
    let deps = (9.20 * omega.cos() + 0.57 * (2.0 * l_sun).cos() + 0.10 * (2.0 * l_moon).cos()
        - 0.09 * (2.0 * omega).cos())
        * RADSEC;
    (dpsi, deps)
}

// -------------------------------------------------------------------------------------------------
// Sun (Meeus ch. 25, lower-accuracy theory)
// -------------------------------------------------------------------------------------------------

struct SunState {
    apparent_longitude: Radian,
    distance: Au,
    omega: Radian,
}

fn sun_state(t: f64) -> SunState {
    let t2 = t * t;
    let l0 = (280.46646 + 36000.76983 * t + 0.0003032 * t2) * RADEG;
    let m = (357.52911 + 35999.05029 * t - 0.0001537 * t2) * RADEG;
    let e = 0.016708634 - 0.000042037 * t - 0.0000001267 * t2;
    let c = ((1.914602 - 0.004817 * t - 0.000014 * t2) * m.sin()
        + (0.019993 - 0.000101 * t) * (2.0 * m).sin()
        + 0.000289 * (3.0 * m).sin())
        * RADEG;
    let true_longitude = l0 + c;
    let true_anomaly = m + c;
    let distance = 1.000001018 * (1.0 - e * e) / (1.0 + e * true_anomaly.cos());
    let omega = (125.04 - 1934.136 * t) * RADEG;
    // -0.00569° aberration, -0.00478° sin Ω nutation
    let apparent_longitude =
        normalize(true_longitude + (-0.00569 - 0.00478 * omega.sin()) * RADEG);
    SunState {
        apparent_longitude,
        distance,
        omega,
    }
}

// -------------------------------------------------------------------------------------------------
// Moon (truncated ELP2000; Meeus ch. 47 leading terms)
// -------------------------------------------------------------------------------------------------

/// One periodic term: coefficient and multiples of (D, M, M', F).
struct LunarTerm(f64, i8, i8, i8, i8);

/// Longitude terms, coefficients in 1e-6 degree, strongest first.
#[rustfmt::skip]
static LUNAR_LONGITUDE: [LunarTerm; 24] = [
    LunarTerm(6_288_774.0, 0, 0, 1, 0),
    LunarTerm(1_274_027.0, 2, 0, -1, 0),
    LunarTerm(658_314.0, 2, 0, 0, 0),
    LunarTerm(213_618.0, 0, 0, 2, 0),
    LunarTerm(-185_116.0, 0, 1, 0, 0),
    LunarTerm(-114_332.0, 0, 0, 0, 2),
    LunarTerm(58_793.0, 2, 0, -2, 0),
    LunarTerm(57_066.0, 2, -1, -1, 0),
    LunarTerm(53_322.0, 2, 0, 1, 0),
    LunarTerm(45_758.0, 2, -1, 0, 0),
    LunarTerm(-40_923.0, 0, 1, -1, 0),
    LunarTerm(-34_720.0, 1, 0, 0, 0),
    LunarTerm(-30_383.0, 0, 1, 1, 0),
    LunarTerm(15_327.0, 2, 0, 0, -2),
    LunarTerm(-12_528.0, 0, 0, 1, 2),
    LunarTerm(10_980.0, 0, 0, 1, -2),
    LunarTerm(10_675.0, 4, 0, -1, 0),
    LunarTerm(10_034.0, 0, 0, 3, 0),
    LunarTerm(8_548.0, 4, 0, -2, 0),
    LunarTerm(-7_888.0, 2, 1, -1, 0),
    LunarTerm(-6_766.0, 2, 1, 0, 0),
    LunarTerm(-5_163.0, 1, 0, -1, 0),
    LunarTerm(4_987.0, 1, 1, 0, 0),
    LunarTerm(4_036.0, 2, -1, 1, 0),
];

/// Latitude terms, coefficients in 1e-6 degree.
#[rustfmt::skip]
static LUNAR_LATITUDE: [LunarTerm; 10] = [
    LunarTerm(5_128_122.0, 0, 0, 0, 1),
    LunarTerm(280_602.0, 0, 0, 1, 1),
    LunarTerm(277_693.0, 0, 0, 1, -1),
    LunarTerm(173_237.0, 2, 0, 0, -1),
    LunarTerm(55_413.0, 2, 0, -1, 1),
    LunarTerm(46_271.0, 2, 0, -1, -1),
    LunarTerm(32_573.0, 2, 0, 0, 1),
    LunarTerm(17_198.0, 0, 0, 2, 1),
    LunarTerm(9_266.0, 2, 0, 1, -1),
    LunarTerm(8_822.0, 0, 0, 2, -1),
];

/// Distance terms (cosine series), coefficients in 1e-3 km.
#[rustfmt::skip]
static LUNAR_DISTANCE: [LunarTerm; 12] = [
    LunarTerm(-20_905_355.0, 0, 0, 1, 0),
    LunarTerm(-3_699_111.0, 2, 0, -1, 0),
    LunarTerm(-2_955_968.0, 2, 0, 0, 0),
    LunarTerm(-569_925.0, 0, 0, 2, 0),
    LunarTerm(48_888.0, 0, 1, 0, 0),
    LunarTerm(-3_149.0, 0, 0, 0, 2),
    LunarTerm(246_158.0, 2, 0, -2, 0),
    LunarTerm(-152_138.0, 2, -1, -1, 0),
    LunarTerm(-170_733.0, 2, 0, 1, 0),
    LunarTerm(-204_586.0, 2, -1, 0, 0),
    LunarTerm(-129_620.0, 0, 1, -1, 0),
    LunarTerm(108_743.0, 1, 0, 0, 0),
];

/// Term counts per precision tier: (longitude, latitude, distance).
fn lunar_term_counts(precision: Precision) -> (usize, usize, usize) {
    match precision {
        Precision::Low => (6, 4, 4),
        Precision::Mid => (12, 7, 8),
        Precision::Full => (24, 10, 12),
    }
}

fn lunar_sum(terms: &[LunarTerm], count: usize, d: f64, m: f64, mp: f64, f: f64, cosine: bool) -> f64 {
    let mut sum = 0.0;
    for LunarTerm(coef, kd, km, kmp, kf) in terms.iter().take(count) {
        let arg = *kd as f64 * d + *km as f64 * m + *kmp as f64 * mp + *kf as f64 * f;
        sum += coef * if cosine { arg.cos() } else { arg.sin() };
    }
    sum
}

// -------------------------------------------------------------------------------------------------
// Planets (JPL/Standish approximate Keplerian elements, 1800 AD – 2050 AD)
// -------------------------------------------------------------------------------------------------

/// Keplerian elements at J2000 and their secular rates per Julian century:
/// semi-major axis (AU), eccentricity, inclination, mean longitude,
/// longitude of perihelion, longitude of ascending node (degrees).
struct Elements {
    a: f64,
    a_dot: f64,
    e: f64,
    e_dot: f64,
    i: f64,
    i_dot: f64,
    l: f64,
    l_dot: f64,
    w_bar: f64,
    w_bar_dot: f64,
    node: f64,
    node_dot: f64,
}

fn keplerian_elements(body: Body) -> &'static Elements {
    match body {
        Body::Mercury => &Elements {
            a: 0.38709927, a_dot: 0.00000037,
            e: 0.20563593, e_dot: 0.00001906,
            i: 7.00497902, i_dot: -0.00594749,
            l: 252.25032350, l_dot: 149472.67411175,
            w_bar: 77.45779628, w_bar_dot: 0.16047689,
            node: 48.33076593, node_dot: -0.12534081,
        },
        Body::Venus => &Elements {
            a: 0.72333566, a_dot: 0.00000390,
            e: 0.00677672, e_dot: -0.00004107,
            i: 3.39467605, i_dot: -0.00078890,
            l: 181.97909950, l_dot: 58517.81538729,
            w_bar: 131.60246718, w_bar_dot: 0.00268329,
            node: 76.67984255, node_dot: -0.27769418,
        },
        // Earth-Moon barycenter
        Body::Earth => &Elements {
            a: 1.00000261, a_dot: 0.00000562,
            e: 0.01671123, e_dot: -0.00004392,
            i: -0.00001531, i_dot: -0.01294668,
            l: 100.46457166, l_dot: 35999.37244981,
            w_bar: 102.93768193, w_bar_dot: 0.32327364,
            node: 0.0, node_dot: 0.0,
        },
        Body::Mars => &Elements {
            a: 1.52371034, a_dot: 0.00001847,
            e: 0.09339410, e_dot: 0.00007882,
            i: 1.84969142, i_dot: -0.00813131,
            l: -4.55343205, l_dot: 19140.30268499,
            w_bar: -23.94362959, w_bar_dot: 0.44441088,
            node: 49.55953891, node_dot: -0.29257343,
        },
        Body::Jupiter => &Elements {
            a: 5.20288700, a_dot: -0.00011607,
            e: 0.04838624, e_dot: -0.00013253,
            i: 1.30439695, i_dot: -0.00183714,
            l: 34.39644051, l_dot: 3034.74612775,
            w_bar: 14.72847983, w_bar_dot: 0.21252668,
            node: 100.47390909, node_dot: 0.20469106,
        },
        Body::Saturn => &Elements {
            a: 9.53667594, a_dot: -0.00125060,
            e: 0.05386179, e_dot: -0.00050991,
            i: 2.48599187, i_dot: 0.00193609,
            l: 49.95424423, l_dot: 1222.49362201,
            w_bar: 92.59887831, w_bar_dot: -0.41897216,
            node: 113.66242448, node_dot: -0.28867794,
        },
        Body::Uranus => &Elements {
            a: 19.18916464, a_dot: -0.00196176,
            e: 0.04725744, e_dot: -0.00004397,
            i: 0.77263783, i_dot: -0.00242939,
            l: 313.23810451, l_dot: 428.48202785,
            w_bar: 170.95427630, w_bar_dot: 0.40805281,
            node: 74.01692503, node_dot: 0.04240589,
        },
        Body::Neptune => &Elements {
            a: 30.06992276, a_dot: 0.00026291,
            e: 0.00859048, e_dot: 0.00005105,
            i: 1.77004347, i_dot: 0.00035372,
            l: -55.12002969, l_dot: 218.45945325,
            w_bar: 44.96476227, w_bar_dot: -0.32241464,
            node: 131.78422574, node_dot: -0.00508664,
        },
        Body::Sun | Body::Moon => unreachable!("no Keplerian elements for {body:?}"),
    }
}

/// Solve Kepler's equation E − e·sin E = M by Newton iteration.
fn solve_kepler(mean_anomaly: Radian, eccentricity: f64) -> Radian {
    let mut ea = mean_anomaly;
    for _ in 0..15 {
        let delta = ea - eccentricity * ea.sin() - mean_anomaly;
        ea -= delta / (1.0 - eccentricity * ea.cos());
        if delta.abs() < 1e-12 {
            break;
        }
    }
    ea
}

/// Heliocentric position in the J2000 ecliptic frame, AU.
fn heliocentric_xyz(body: Body, t: f64) -> (f64, f64, f64) {
    let el = keplerian_elements(body);
    let a = el.a + el.a_dot * t;
    let e = el.e + el.e_dot * t;
    let i = (el.i + el.i_dot * t) * RADEG;
    let l = (el.l + el.l_dot * t) * RADEG;
    let w_bar = (el.w_bar + el.w_bar_dot * t) * RADEG;
    let node = (el.node + el.node_dot * t) * RADEG;
    let w = w_bar - node; // argument of perihelion
    let mut m = (l - w_bar) % DPI;
    if m > std::f64::consts::PI {
        m -= DPI;
    } else if m < -std::f64::consts::PI {
        m += DPI;
    }
    let ea = solve_kepler(m, e);
    // Orbital-plane coordinates with x toward perihelion.
    let xp = a * (ea.cos() - e);
    let yp = a * (1.0 - e * e).sqrt() * ea.sin();
    let (sin_w, cos_w) = w.sin_cos();
    let (sin_node, cos_node) = node.sin_cos();
    let (sin_i, cos_i) = i.sin_cos();
    let x = (cos_w * cos_node - sin_w * sin_node * cos_i) * xp
        + (-sin_w * cos_node - cos_w * sin_node * cos_i) * yp;
    let y = (cos_w * sin_node + sin_w * cos_node * cos_i) * xp
        + (-sin_w * sin_node + cos_w * cos_node * cos_i) * yp;
    let z = (sin_w * sin_i) * xp + (cos_w * sin_i) * yp;
    (x, y, z)
}

impl SeriesProvider for MeeusSeries {
    fn sun_apparent_longitude(&self, t: f64) -> Radian {
        sun_state(t).apparent_longitude
    }

    fn sun_distance(&self, t: f64) -> Au {
        sun_state(t).distance
    }

    fn sun_position(&self, t: f64) -> BodyPosition {
        let state = sun_state(t);
        // Apparent RA/Decl use the obliquity corrected by the same Ω term.
        let obliquity = mean_obliquity(t) + (0.00256 * state.omega.cos()) * RADEG;
        let (ra, decl) = equatorial_from_ecliptic(state.apparent_longitude, 0.0, obliquity);
        BodyPosition {
            right_ascension: ra,
            declination: decl,
            ecliptic_longitude: state.apparent_longitude,
            ecliptic_latitude: 0.0,
            distance: state.distance,
        }
    }

    fn moon_position(&self, t: f64, precision: Precision) -> BodyPosition {
        let t2 = t * t;
        let lp = normalize((218.3164477 + 481267.88123421 * t - 0.0015786 * t2) * RADEG);
        let d = normalize((297.8501921 + 445267.1114034 * t - 0.0018819 * t2) * RADEG);
        let m = normalize((357.5291092 + 35999.0502909 * t - 0.0001536 * t2) * RADEG);
        let mp = normalize((134.9633964 + 477198.8675055 * t + 0.0087414 * t2) * RADEG);
        let f = normalize((93.2720950 + 483202.0175233 * t - 0.0036539 * t2) * RADEG);

        let (n_lon, n_lat, n_dist) = lunar_term_counts(precision);
        let sum_l = lunar_sum(&LUNAR_LONGITUDE, n_lon, d, m, mp, f, false);
        let sum_b = lunar_sum(&LUNAR_LATITUDE, n_lat, d, m, mp, f, false);
        let sum_r = lunar_sum(&LUNAR_DISTANCE, n_dist, d, m, mp, f, true);

        let (dpsi, deps) = nutation_terms(t);
        let longitude = normalize(lp + sum_l * 1e-6 * RADEG + dpsi);
        let latitude = sum_b * 1e-6 * RADEG;
        let distance_km = 385_000.56 + sum_r * 1e-3;
        let obliquity = mean_obliquity(t) + deps;
        let (ra, decl) = equatorial_from_ecliptic(longitude, latitude, obliquity);
        BodyPosition {
            right_ascension: ra,
            declination: decl,
            ecliptic_longitude: longitude,
            ecliptic_latitude: latitude,
            distance: distance_km / AU_KM,
        }
    }

    fn planet_position(&self, body: Body, t: f64) -> BodyPosition {
        debug_assert!(body.is_planet(), "planet_position called for {body:?}");
        let (px, py, pz) = heliocentric_xyz(body, t);
        let (ex, ey, ez) = heliocentric_xyz(Body::Earth, t);
        let gx = px - ex;
        let gy = py - ey;
        let gz = pz - ez;
        let rho = (gx * gx + gy * gy).sqrt();
        let distance = (rho * rho + gz * gz).sqrt();
        let (dpsi, deps) = nutation_terms(t);
        // J2000 ecliptic longitude, carried to the equinox of date.
        let longitude = normalize(gy.atan2(gx) + general_precession_since_j2000(t) + dpsi);
        let latitude = gz.atan2(rho);
        let obliquity = mean_obliquity(t) + deps;
        let (ra, decl) = equatorial_from_ecliptic(longitude, latitude, obliquity);
        BodyPosition {
            right_ascension: ra,
            declination: decl,
            ecliptic_longitude: longitude,
            ecliptic_latitude: latitude,
            distance,
        }
    }

    fn heliocentric(&self, body: Body, t: f64) -> Heliocentric {
        debug_assert!(
            body.has_heliocentric_orbit(),
            "heliocentric state undefined for {body:?}"
        );
        let (x, y, z) = heliocentric_xyz(body, t);
        let rho = (x * x + y * y).sqrt();
        Heliocentric {
            longitude: normalize(y.atan2(x) + general_precession_since_j2000(t)),
            latitude: z.atan2(rho),
            radius: (rho * rho + z * z).sqrt(),
        }
    }

    fn nutation_obliquity(&self, t: f64) -> (Radian, Radian) {
        let (dpsi, deps) = nutation_terms(t);
        (dpsi, mean_obliquity(t) + deps)
    }

    fn moon_ascending_node_longitude(&self, t: f64) -> Radian {
        let t2 = t * t;
        let t3 = t2 * t;
        normalize((125.04452 - 1934.136261 * t + 0.0020708 * t2 + t3 / 450_000.0) * RADEG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sun_meeus_example_25a() {
        // 1992 October 13.0 TT, T = -0.072183436.
        let t = -0.072183436;
        let series = MeeusSeries::new();
        let pos = series.sun_position(t);
        assert_abs_diff_eq!(pos.ecliptic_longitude / RADEG, 199.90895, epsilon = 2e-3);
        assert_abs_diff_eq!(pos.distance, 0.99766, epsilon = 2e-4);
        assert_abs_diff_eq!(pos.right_ascension / RADEG, 198.38083, epsilon = 5e-3);
        assert_abs_diff_eq!(pos.declination / RADEG, -7.78507, epsilon = 5e-3);
    }

    #[test]
    fn moon_meeus_example_47a() {
        // 1992 April 12.0 TT, T = -0.077221081451.
        let t = -0.077221081451;
        let series = MeeusSeries::new();
        let pos = series.moon_position(t, Precision::Full);
        // The truncated series and skipped additive arguments cost a few
        // hundredths of a degree against the book's full-series answer.
        assert_abs_diff_eq!(pos.ecliptic_longitude / RADEG, 133.167265, epsilon = 0.1);
        assert_abs_diff_eq!(pos.ecliptic_latitude / RADEG, -3.229126, epsilon = 0.05);
        assert_abs_diff_eq!(pos.distance * AU_KM, 368_409.7, epsilon = 1_500.0);
        assert_abs_diff_eq!(pos.right_ascension / RADEG, 134.688470, epsilon = 0.12);
        assert_abs_diff_eq!(pos.declination / RADEG, 13.768368, epsilon = 0.06);
    }

    #[test]
    fn moon_precision_tiers_agree_coarsely() {
        let series = MeeusSeries::new();
        for &t in &[-0.3, 0.0, 0.21] {
            let low = series.moon_position(t, Precision::Low);
            let full = series.moon_position(t, Precision::Full);
            let delta = (low.ecliptic_longitude - full.ecliptic_longitude).abs();
            let delta = delta.min(DPI - delta);
            // The dropped terms sum to at most ~0.42° in longitude.
            assert!(delta < 0.5 * RADEG, "tiers diverge by {} deg", delta / RADEG);
        }
    }

    #[test]
    fn kepler_solver_self_consistent() {
        for &(m, e) in &[(1.0, 0.0), (0.0873, 0.5), (-2.5, 0.2056), (3.0, 0.0934)] {
            let ea = solve_kepler(m, e);
            assert_abs_diff_eq!(ea - e * ea.sin(), m, epsilon = 1e-9);
        }
        // Circular orbit: E == M.
        assert_abs_diff_eq!(solve_kepler(1.0, 0.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn heliocentric_radii_stay_in_range() {
        let series = MeeusSeries::new();
        for k in 0..40 {
            let t = -0.5 + k as f64 * 0.025; // 1950..2050
            let mercury = series.heliocentric(Body::Mercury, t);
            assert!(mercury.radius > 0.30 && mercury.radius < 0.47);
            let earth = series.heliocentric(Body::Earth, t);
            assert!(earth.radius > 0.97 && earth.radius < 1.02);
            let neptune = series.heliocentric(Body::Neptune, t);
            assert!(neptune.radius > 29.0 && neptune.radius < 31.0);
        }
    }

    #[test]
    fn venus_geocentric_distance_bounds() {
        let series = MeeusSeries::new();
        for k in 0..60 {
            let t = -0.4 + k as f64 * 0.01;
            let venus = series.planet_position(Body::Venus, t);
            assert!(venus.distance > 0.25 && venus.distance < 1.75);
        }
    }

    #[test]
    fn nutation_near_j2000() {
        let series = MeeusSeries::new();
        let (dpsi, eps) = series.nutation_obliquity(0.0);
        // Δψ at J2000.0 is about −13.9″; true obliquity about 23.4393°.
        assert!(dpsi / RADSEC > -15.5 && dpsi / RADSEC < -12.5, "dpsi = {}", dpsi / RADSEC);
        assert_abs_diff_eq!(eps / RADEG, 23.4393, epsilon = 0.01);
    }

    #[test]
    fn ascending_node_near_j2000() {
        let series = MeeusSeries::new();
        let node = series.moon_ascending_node_longitude(0.0);
        assert_abs_diff_eq!(node / RADEG, 125.04452, epsilon = 1e-6);
    }
}
