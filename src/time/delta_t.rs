//! Delta-T: the difference (terrestrial time − universal time), in seconds.
//!
//! Two interchangeable models, selected process-wide:
//!
//! - [`DeltaTModel::MeeusTable`] — the biennial 1620–2004 table from Meeus
//!   (2nd ed., p. 79) with linear interpolation, and the Meeus polynomial
//!   extrapolation outside the table range.
//! - [`DeltaTModel::EspenakPolynomial`] — the Espenak/Morrison piecewise
//!   polynomial fit, valid over a much wider range, with breakpoints at
//!   −500, 500, 1600, 1700, 1800, 1860, 1900, 1920, 1941, 1961, 1986, 2005,
//!   2050 and 2150.
//!
//! Both are pure functions of a fractional year (2008.5 ≈ July 2008). The
//! documented segment-boundary discontinuities of the source formulas are
//! reproduced, not smoothed.

use std::sync::atomic::{AtomicBool, Ordering};

/// Which delta-T model is active process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaTModel {
    MeeusTable,
    EspenakPolynomial,
}

static USE_MEEUS: AtomicBool = AtomicBool::new(false);

/// Select the process-wide delta-T model. Default is
/// [`DeltaTModel::EspenakPolynomial`].
pub fn set_delta_t_model(model: DeltaTModel) {
    USE_MEEUS.store(model == DeltaTModel::MeeusTable, Ordering::Relaxed);
}

/// The currently active delta-T model.
pub fn delta_t_model() -> DeltaTModel {
    if USE_MEEUS.load(Ordering::Relaxed) {
        DeltaTModel::MeeusTable
    } else {
        DeltaTModel::EspenakPolynomial
    }
}

/// Delta-T in seconds for a fractional year, using the active model.
pub fn delta_t(year_value: f64) -> f64 {
    match delta_t_model() {
        DeltaTModel::MeeusTable => meeus_delta_t(year_value),
        DeltaTModel::EspenakPolynomial => espenak_delta_t(year_value),
    }
}

/// UT seconds → ephemeris-time seconds for the given fractional year.
pub(crate) fn ut_to_et(ut_seconds: f64, year_value: f64) -> f64 {
    ut_seconds + delta_t(year_value)
}

/// Observed delta-T on alternate years 1620, 1622, …, 2004 (Meeus 2nd ed., p. 79).
#[rustfmt::skip]
static DELTA_T_TABLE: [f64; 193] = [
    121.0, 112.0, 103.0, 95.0, 88.0,  82.0, 77.0, 72.0, 68.0, 63.0,  60.0, 56.0, 53.0, 51.0, 48.0,  46.0, 44.0, 42.0, 40.0, 38.0,
    35.0, 33.0, 31.0, 29.0, 26.0,  24.0, 22.0, 20.0, 18.0, 16.0,  14.0, 12.0, 11.0, 10.0, 9.0,  8.0, 7.0, 7.0, 7.0, 7.0,
    7.0, 7.0, 8.0, 8.0, 9.0,  9.0, 9.0, 9.0, 9.0, 10.0,  10.0, 10.0, 10.0, 10.0, 10.0,  10.0, 10.0, 11.0, 11.0, 11.0,
    11.0, 11.0, 12.0, 12.0, 12.0,  12.0, 13.0, 13.0, 13.0, 14.0,  14.0, 14.0, 14.0, 15.0, 15.0,  15.0, 15.0, 15.0, 16.0, 16.0,
    16.0, 16.0, 16.0, 16.0, 16.0,  16.0, 15.0, 15.0, 14.0, 13.0,  13.1, 12.5, 12.2, 12.0, 12.0,  12.0, 12.0, 12.0, 12.0, 11.9,
    11.6, 11.0, 10.2, 9.2, 8.2,  7.1, 6.2, 5.6, 5.4, 5.3,  5.4, 5.6, 5.9, 6.2, 6.5,  6.8, 7.1, 7.3, 7.5, 7.6,
    7.7, 7.3, 6.2, 5.2, 2.7,  1.4, -1.2, -2.8, -3.8, -4.8,  -5.5, -5.3, -5.6, -5.7, -5.9,  -6.0, -6.3, -6.5, -6.2, -4.7,
    -2.8, -0.1, 2.6, 5.3, 7.7,  10.4, 13.3, 16.0, 18.2, 20.2,  21.1, 22.4, 23.5, 23.8, 24.3,  24.0, 23.9, 23.9, 23.7, 24.0,
    24.3, 25.3, 26.2, 27.3, 28.2,  29.1, 30.0, 30.7, 31.4, 32.2,  33.1, 34.0, 35.0, 36.5, 38.3,  40.2, 42.2, 44.5, 46.5, 48.5,
    50.5, 52.2, 53.8, 54.9, 55.8,  56.9, 58.3, 60.0, 61.6, 63.0,  63.8, 64.3, 64.6,
];

/// Table-based delta-T (Meeus p. 78): interpolate the biennial table inside
/// 1620–2004, polynomial extrapolation outside.
pub fn meeus_delta_t(year_value: f64) -> f64 {
    if year_value < 948.0 {
        let t = (year_value - 2000.0) / 100.0;
        2177.0 + 497.0 * t + 44.1 * t * t
    } else if year_value < 1620.0 {
        let t = (year_value - 2000.0) / 100.0;
        102.0 + 102.0 * t + 25.3 * t * t
    } else if year_value >= 2100.0 {
        let t = (year_value - 2000.0) / 100.0;
        102.0 + 102.0 * t + 25.3 * t * t
    } else if year_value > 2004.0 {
        let t = (year_value - 2000.0) / 100.0;
        102.0 + 102.0 * t + 25.3 * t * t + 0.37 * (year_value - 2100.0)
    } else if year_value == 2004.0 {
        DELTA_T_TABLE[(2004 - 1620) / 2]
    } else {
        let real_index = (year_value - 1620.0) / 2.0;
        let prior = real_index.floor();
        let i = prior as usize;
        let interpolation = real_index - prior;
        DELTA_T_TABLE[i] + (DELTA_T_TABLE[i + 1] - DELTA_T_TABLE[i]) * interpolation
    }
}

/// Piecewise-polynomial delta-T (Espenak & Meeus). Only claimed valid back
/// to −1999; use before that inherits the long-range parabola.
pub fn espenak_delta_t(year_value: f64) -> f64 {
    if (2005.0..=2050.0).contains(&year_value) {
        // common case first
        let t = year_value - 2000.0;
        62.92 + 0.32217 * t + 0.005589 * t * t
    } else if !(-500.0..2150.0).contains(&year_value) {
        let u = (year_value - 1820.0) / 100.0;
        -20.0 + 32.0 * u * u
    } else if year_value < 500.0 {
        let u = year_value / 100.0;
        let u2 = u * u;
        let u3 = u2 * u;
        let u4 = u2 * u2;
        let u5 = u3 * u2;
        let u6 = u3 * u3;
        10583.6 - 1014.41 * u + 33.78311 * u2 - 5.952053 * u3 - 0.1798452 * u4
            + 0.022174192 * u5
            + 0.0090316521 * u6
    } else if year_value < 1600.0 {
        let u = (year_value - 1000.0) / 100.0;
        let u2 = u * u;
        let u3 = u2 * u;
        let u4 = u2 * u2;
        let u5 = u3 * u2;
        let u6 = u3 * u3;
        1574.2 - 556.01 * u + 71.23472 * u2 + 0.319781 * u3
            - 0.8503463 * u4
            - 0.005050998 * u5
            + 0.0083572073 * u6
    } else if year_value < 1700.0 {
        let t = year_value - 1600.0;
        let t2 = t * t;
        let t3 = t2 * t;
        120.0 - 0.9808 * t - 0.01532 * t2 + t3 / 7129.0
    } else if year_value < 1800.0 {
        let t = year_value - 1700.0;
        let t2 = t * t;
        let t3 = t2 * t;
        let t4 = t2 * t2;
        8.83 + 0.1603 * t - 0.0059285 * t2 + 0.00013336 * t3 - t4 / 1_174_000.0
    } else if year_value < 1860.0 {
        let t = year_value - 1800.0;
        let t2 = t * t;
        let t3 = t2 * t;
        let t4 = t2 * t2;
        let t5 = t3 * t2;
        let t6 = t3 * t3;
        let t7 = t4 * t3;
        13.72 - 0.332447 * t + 0.0068612 * t2 + 0.0041116 * t3 - 0.00037436 * t4
            + 0.0000121272 * t5
            - 0.0000001699 * t6
            + 0.000000000875 * t7
    } else if year_value < 1900.0 {
        let t = year_value - 1860.0;
        let t2 = t * t;
        let t3 = t2 * t;
        let t4 = t2 * t2;
        let t5 = t3 * t2;
        7.62 + 0.5737 * t - 0.251754 * t2 + 0.01680668 * t3 - 0.0004473624 * t4 + t5 / 233_174.0
    } else if year_value < 1920.0 {
        let t = year_value - 1900.0;
        let t2 = t * t;
        let t3 = t2 * t;
        let t4 = t2 * t2;
        -2.79 + 1.494119 * t - 0.0598939 * t2 + 0.0061966 * t3 - 0.000197 * t4
    } else if year_value < 1941.0 {
        let t = year_value - 1920.0;
        let t2 = t * t;
        let t3 = t2 * t;
        21.20 + 0.84493 * t - 0.076100 * t2 + 0.0020936 * t3
    } else if year_value < 1961.0 {
        let t = year_value - 1950.0;
        let t2 = t * t;
        let t3 = t2 * t;
        29.07 + 0.407 * t - t2 / 233.0 + t3 / 2547.0
    } else if year_value < 1986.0 {
        let t = year_value - 1975.0;
        let t2 = t * t;
        let t3 = t2 * t;
        45.45 + 1.067 * t - t2 / 260.0 - t3 / 718.0
    } else if year_value < 2005.0 {
        let t = year_value - 2000.0;
        let t2 = t * t;
        let t3 = t2 * t;
        let t4 = t2 * t2;
        let t5 = t3 * t2;
        63.86 + 0.3345 * t - 0.060374 * t2 + 0.0017275 * t3 + 0.000651814 * t4
            + 0.00002373599 * t5
    } else {
        // 2050 < year < 2150
        debug_assert!(year_value > 2050.0);
        let u = (year_value - 1820.0) / 100.0;
        -20.0 + 32.0 * u * u - 0.5628 * (2150.0 - year_value)
    }
}
