//! # Constants and type definitions for orrery
//!
//! This module centralizes the **epoch offsets**, **physical constants**,
//! **conversion factors**, and **common type definitions** used throughout the
//! `orrery` library.
//!
//! ## Overview
//!
//! - Reference-epoch and Julian-date anchors
//! - Unit conversions (degrees ↔ radians, hours ↔ radians, AU ↔ km)
//! - Rise/set geometry constants (horizon refraction, limiting azimuth latitude)
//! - Core type aliases used across the crate
//!
//! All instants in the crate are [`Timestamp`] values: seconds since the
//! reference epoch 2001-01-01 00:00:00 UTC.

// -------------------------------------------------------------------------------------------------
// Angle and time conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric wraparound
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds → radians
pub const RADSEC: f64 = std::f64::consts::PI / 648_000.0;

/// Hours → radians
pub const RADH: f64 = DPI / 24.0;

/// Number of seconds in a day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Number of days in a Julian century
pub const JULIAN_DAYS_PER_CENTURY: f64 = 36_525.0;

/// Mean length of the tropical year in seconds, at J2000 (slowly decreasing)
pub const TROPICAL_YEAR_SECONDS: f64 = 3600.0 * 24.0 * 365.2422;

/// Mean synodic lunar cycle in seconds
pub const LUNAR_CYCLE_SECONDS: f64 = 29.530589 * 3600.0 * 24.0;

/// Ratio of a UT unit to a (faster) sidereal-time unit
pub const UT_UNITS_PER_GST_UNIT: f64 = 1.0 / 1.002_737_909_35;

// -------------------------------------------------------------------------------------------------
// Epoch anchors
// -------------------------------------------------------------------------------------------------

/// Seconds from the reference epoch (2001-01-01 00:00:00 UTC) back to
/// 1989-12-31 00:00:00 UTC, the anchor used for Julian-date conversion:
/// 24 · 3600 · (365·8 + 366·3 + 1), the three leap years being 1992, 1996
/// and 2000.
pub const EPOCH_1990_SECONDS: f64 = -347_241_600.0;

/// Julian date of the 1990 anchor (1989-12-31 00:00:00 UTC)
pub const JD_1990_EPOCH: f64 = 2_447_891.5;

/// Julian date of the J2000.0 epoch (2000-01-01 12:00:00 TT)
pub const JD_2000_EPOCH: f64 = 2_451_545.0;

/// Unix seconds at the reference epoch 2001-01-01 00:00:00 UTC
pub const UNIX_SECONDS_AT_REFERENCE_EPOCH: f64 = 978_307_200.0;

// -------------------------------------------------------------------------------------------------
// Physical constants
// -------------------------------------------------------------------------------------------------

/// Astronomical Unit in kilometers (IAU 2012)
pub const AU_KM: f64 = 149_597_870.7;

/// Atmospheric refraction at the horizon, 34 arcminutes
pub const REFRACTION_AT_HORIZON: f64 = 34.0 / 60.0 * RADEG;

/// Equatorial horizontal parallax constant: sin π = sin(8.794″)/Δ with Δ in AU
pub const PARALLAX_CONSTANT_ARCSEC: f64 = 8.794;

/// cos of the inclination of the mean lunar equator to the ecliptic (I = 1°32′32.7″)
pub const COS_MOON_EQUATOR_ECLIPTIC_ANGLE: f64 = 0.999_637_670_406_006;

/// sin of the inclination of the mean lunar equator to the ecliptic
pub const SIN_MOON_EQUATOR_ECLIPTIC_ANGLE: f64 = 0.026_917_056_028_711;

/// Latitudes beyond this (in absolute value) are clamped for azimuth
/// computation, so the azimuth remains informative at the poles.
pub const LIMITING_AZIMUTH_LATITUDE: f64 = 89.9999 * RADEG;

/// Default cache slop in seconds: if the bound instant has not moved by more
/// than this, cached astronomical quantities are reused.
pub const ASTRO_SLOP: f64 = 2.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in radians
pub type Radian = f64;
/// Angle in degrees
pub type Degree = f64;
/// Angle in arcseconds
pub type ArcSec = f64;
/// Distance in astronomical units
pub type Au = f64;
/// Distance in kilometers
pub type Kilometer = f64;
/// Seconds since the reference epoch 2001-01-01 00:00:00 UTC
pub type Timestamp = f64;
