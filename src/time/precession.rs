//! Precession of the equinoxes: frame conversion between of-date and J2000
//! equatorial coordinates.
//!
//! The forward direction (J2000 → of-date) uses the IAU P03 general
//! precession quantities. P03 publishes no closed form for the reverse, so
//! of-date → J2000 starts from the Meeus polynomial set and is then refined
//! by feeding the round-trip residual back into the input. The refinement
//! runs a fixed schedule of three reverse/forward evaluation pairs rather
//! than iterating to a tolerance; the initial Meeus answer is within about
//! ten arcseconds and the fixed schedule lands below 0.01″ (asserted by the
//! round-trip test), so the extra bookkeeping of a convergence loop buys
//! nothing here.

use crate::constants::{Radian, RADSEC};
use crate::time::normalize_radians;

/// The P03 general precession quantities at `t` Julian centuries since
/// J2000, all in radians.
#[derive(Debug, Clone, Copy)]
pub struct PrecessionQuantities {
    /// accumulated general precession p_A
    pub p_a: Radian,
    /// mean obliquity ε_A
    pub eps_a: Radian,
    /// planetary precession χ_A
    pub chi_a: Radian,
    /// equatorial precession ζ_A
    pub zeta_a: Radian,
    /// equatorial precession z_A
    pub z_a: Radian,
    /// equatorial precession θ_A
    pub theta_a: Radian,
}

/// P03 general precession quantities; includes both the motion of the
/// equator in the GCRS and the motion of the ecliptic in the ICRS.
pub fn general_precession_quantities(t: f64) -> PrecessionQuantities {
    let t2 = t * t;
    let t3 = t * t2;
    let t4 = t2 * t2;
    let t5 = t2 * t3;
    let p_a =
        (5028.796195 * t + 1.1054348 * t2 + 0.00007964 * t3 - 0.000023857 * t4 - 0.0000000383 * t5)
            * RADSEC;
    let eps_a = (84381.406 - 46.836769 * t - 0.0001831 * t2 + 0.00200340 * t3
        - 0.000000576 * t4
        - 0.0000000434 * t5)
        * RADSEC;
    let chi_a = (10.556403 * t - 2.3814292 * t2 - 0.00121197 * t3 + 0.000170663 * t4
        - 0.0000000560 * t5)
        * RADSEC;
    let zeta_a = (2.650545 + 2306.083227 * t + 0.2988499 * t2 + 0.01801828 * t3
        - 0.000005971 * t4
        - 0.0000003173 * t5)
        * RADSEC;
    let z_a = (-2.650545 + 2306.077181 * t + 1.0927348 * t2 + 0.01826837 * t3
        - 0.000028596 * t4
        - 0.0000002904 * t5)
        * RADSEC;
    let theta_a = (2004.19103 * t - 0.4294934 * t2 - 0.04182264 * t3 - 0.000007089 * t4
        - 0.0000001274 * t5)
        * RADSEC;
    PrecessionQuantities {
        p_a,
        eps_a,
        chi_a,
        zeta_a,
        z_a,
        theta_a,
    }
}

/// Accumulated general precession since J2000, in radians (P03).
pub fn general_precession_since_j2000(t: f64) -> Radian {
    let t2 = t * t;
    let t3 = t * t2;
    let t4 = t2 * t2;
    let t5 = t2 * t3;
    (5028.796195 * t + 1.1054348 * t2 + 0.00007964 * t3 - 0.000023857 * t4 - 0.0000000383 * t5)
        * RADSEC
}

/// Mean obliquity of the ecliptic at `t` centuries since J2000, in radians
/// (P03).
pub fn general_obliquity(t: f64) -> Radian {
    let t2 = t * t;
    let t3 = t * t2;
    let t4 = t2 * t2;
    let t5 = t2 * t3;
    (84381.406 - 46.836769 * t - 0.0001831 * t2 + 0.00200340 * t3
        - 0.000000576 * t4
        - 0.0000000434 * t5)
        * RADSEC
}

/// J2000 RA/Decl → of-date RA/Decl via the P03 equatorial quantities.
pub fn j2000_to_of_date(t: f64, ra_j2000: Radian, decl_j2000: Radian) -> (Radian, Radian) {
    let q = general_precession_quantities(t);
    let cos_decl = decl_j2000.cos();
    let sin_decl = decl_j2000.sin();
    let cos_theta = q.theta_a.cos();
    let sin_theta = q.theta_a.sin();
    let term = cos_decl * (ra_j2000 + q.zeta_a).cos();
    let a = cos_decl * (ra_j2000 + q.zeta_a).sin();
    let b = cos_theta * term - sin_theta * sin_decl;
    let c = sin_theta * term + cos_theta * sin_decl;
    let ra = normalize_radians(a.atan2(b) + q.z_a);
    // Meeus notes asin degrades very close to the celestial pole; the bodies
    // handled here stay near the ecliptic.
    (ra, c.asin())
}

/// Single-shot of-date RA/Decl → J2000, using the Meeus polynomial set (the
/// P03 model has no closed reverse form). Good to roughly ten arcseconds;
/// see [`of_date_to_j2000`].
fn of_date_to_j2000_once(t: f64, ra_of_date: Radian, decl_of_date: Radian) -> (Radian, Radian) {
    let big_t = t;
    let big_t2 = big_t * big_t;
    let small_t = -big_t;
    let t2 = small_t * small_t;
    let t3 = t2 * small_t;
    let zeta_a = ((2306.2181 + 1.39656 * big_t - 0.000139 * big_t2) * small_t
        + (0.30188 - 0.000344 * big_t) * t2
        + 0.017998 * t3)
        * RADSEC;
    let z_a = ((2306.2181 + 1.39656 * big_t - 0.000139 * big_t2) * small_t
        + (1.09468 + 0.000066 * big_t) * t2
        + 0.018203 * t3)
        * RADSEC;
    let theta_a = ((2004.3109 - 0.85330 * big_t - 0.000217 * big_t2) * small_t
        - (0.42665 + 0.000217 * big_t) * t2
        - 0.041833 * t3)
        * RADSEC;
    let cos_decl = decl_of_date.cos();
    let sin_decl = decl_of_date.sin();
    let cos_theta = theta_a.cos();
    let sin_theta = theta_a.sin();
    let term = cos_decl * (ra_of_date + zeta_a).cos();
    let a = cos_decl * (ra_of_date + zeta_a).sin();
    let b = cos_theta * term - sin_theta * sin_decl;
    let c = sin_theta * term + cos_theta * sin_decl;
    let ra = normalize_radians(a.atan2(b) + z_a);
    (ra, c.asin())
}

/// Of-date RA/Decl → J2000, refined.
///
/// Applies the Meeus reverse, measures the P03 round-trip residual, feeds it
/// back as an input correction, and repeats — a fixed three reverse/forward
/// pairs, which lands the round trip below 0.01 arcsecond.
pub fn of_date_to_j2000(t: f64, ra_of_date: Radian, decl_of_date: Radian) -> (Radian, Radian) {
    let (ra_try, decl_try) = of_date_to_j2000_once(t, ra_of_date, decl_of_date);
    let (ra_round, decl_round) = j2000_to_of_date(t, ra_try, decl_try);
    let mut ra_tweak = ra_of_date + (ra_of_date - ra_round);
    let mut decl_tweak = decl_of_date + (decl_of_date - decl_round);
    let (ra_try, decl_try) = of_date_to_j2000_once(t, ra_tweak, decl_tweak);
    let (ra_round, decl_round) = j2000_to_of_date(t, ra_try, decl_try);
    ra_tweak += ra_of_date - ra_round;
    decl_tweak += decl_of_date - decl_round;
    of_date_to_j2000_once(t, ra_tweak, decl_tweak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::RADEG;
    use approx::assert_abs_diff_eq;

    #[test]
    fn theta_persei_forward() {
        // Meeus ex. 21.b: θ Persei from J2000 to 2028 Nov 13.19 TT
        // (t = 0.2886705). The book uses the IAU 1976 angles; P03 agrees to
        // well under an arcsecond at this range.
        let t = 0.288_670_5;
        let (ra, decl) = j2000_to_of_date(t, 41.054063 * RADEG, 49.227750 * RADEG);
        assert_abs_diff_eq!(ra, 41.547214 * RADEG, epsilon = 1.0 * RADEG / 3600.0);
        assert_abs_diff_eq!(decl, 49.348483 * RADEG, epsilon = 1.0 * RADEG / 3600.0);
    }

    #[test]
    fn round_trip_within_a_centiarcsecond() {
        let centi_arcsec = 0.01 * RADEG / 3600.0;
        for &t in &[-0.6, -0.1, 0.05, 0.2886705, 0.5, 1.0] {
            for &(ra_deg, decl_deg) in &[(41.054063, 49.22775), (201.3, -11.2), (359.9, 0.5)] {
                let ra = ra_deg * RADEG;
                let decl = decl_deg * RADEG;
                let (ra_j2000, decl_j2000) = of_date_to_j2000(t, ra, decl);
                let (ra_back, decl_back) = j2000_to_of_date(t, ra_j2000, decl_j2000);
                assert_abs_diff_eq!(ra_back, ra, epsilon = centi_arcsec);
                assert_abs_diff_eq!(decl_back, decl, epsilon = centi_arcsec);
            }
        }
    }

    #[test]
    fn precession_rate_near_j2000() {
        // General precession is about 50.29 arcseconds per year.
        let one_year = general_precession_since_j2000(0.01);
        assert_abs_diff_eq!(one_year / RADSEC, 50.29, epsilon = 0.02);
        // Mean obliquity at J2000.
        assert_abs_diff_eq!(general_obliquity(0.0) / RADSEC, 84381.406, epsilon = 1e-6);
    }
}
