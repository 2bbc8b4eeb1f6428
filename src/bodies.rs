//! Solar-system bodies and their physical data.
//!
//! [`Body`] identifies the ten bodies the engine knows about. The Sun and
//! Moon take their own series; Mercury through Neptune go through the
//! planetary series; `Earth` is only valid for heliocentric queries (it is
//! the observer).

use crate::constants::{Au, Radian, AU_KM, PARALLAX_CONSTANT_ARCSEC, RADSEC};

/// A body the engine can compute positions for.
///
/// The discriminants are stable and used for cache-slot indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Body {
    Sun = 0,
    Moon = 1,
    Mercury = 2,
    Venus = 3,
    Earth = 4,
    Mars = 5,
    Jupiter = 6,
    Saturn = 7,
    Uranus = 8,
    Neptune = 9,
}

/// Number of bodies, also the stride of per-body cache-slot blocks.
pub const BODY_COUNT: usize = 10;

pub const ALL_BODIES: [Body; BODY_COUNT] = [
    Body::Sun,
    Body::Moon,
    Body::Mercury,
    Body::Venus,
    Body::Earth,
    Body::Mars,
    Body::Jupiter,
    Body::Saturn,
    Body::Uranus,
    Body::Neptune,
];

/// Body radii in AU, Sun through Neptune.
const RADII_AU: [Au; BODY_COUNT] = [
    695_500.0 / AU_KM,
    1_737.10 / AU_KM,
    2_439.7 / AU_KM,
    6_051.8 / AU_KM,
    6_371.0 / AU_KM,
    3_389.5 / AU_KM,
    69_911.0 / AU_KM,
    58_232.0 / AU_KM,
    25_362.0 / AU_KM,
    24_622.0 / AU_KM,
];

/// Body masses in kilograms.
const MASSES_KG: [f64; BODY_COUNT] = [
    1.989_1e30,
    7.347_7e22,
    0.330_104e24,
    4.867_32e24,
    5.972_19e24,
    0.641_693e24,
    1898.13e24,
    568.319e24,
    86.810_3e24,
    102.410e24,
];

/// Orbital periods in Julian years (the Moon's is its sidereal month).
const ORBITAL_PERIOD_YEARS: [f64; BODY_COUNT] = [
    0.0,
    27.321582 / 365.256366,
    0.2408467,
    0.61519726,
    1.0000174,
    1.8808476,
    11.862615,
    29.447498,
    84.016846,
    164.79132,
];

impl Body {
    /// Stable index for cache-slot arithmetic and table lookup.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Body> {
        ALL_BODIES.get(index).copied()
    }

    /// True for Mercury through Neptune, excluding Earth.
    pub fn is_planet(self) -> bool {
        !matches!(self, Body::Sun | Body::Moon | Body::Earth)
    }

    /// True for any body that can be asked for a rise, set or transit.
    pub fn has_rise_set(self) -> bool {
        self != Body::Earth
    }

    /// True for bodies with a heliocentric orbit (Mercury..Neptune, incl. Earth).
    pub fn has_heliocentric_orbit(self) -> bool {
        !matches!(self, Body::Sun | Body::Moon)
    }

    pub fn name(self) -> &'static str {
        match self {
            Body::Sun => "Sun",
            Body::Moon => "Moon",
            Body::Mercury => "Mercury",
            Body::Venus => "Venus",
            Body::Earth => "Earth",
            Body::Mars => "Mars",
            Body::Jupiter => "Jupiter",
            Body::Saturn => "Saturn",
            Body::Uranus => "Uranus",
            Body::Neptune => "Neptune",
        }
    }

    /// Body radius in kilometers.
    pub fn radius_km(self) -> f64 {
        RADII_AU[self.index()] * AU_KM
    }

    /// Body radius in AU.
    pub fn radius_au(self) -> Au {
        RADII_AU[self.index()]
    }

    /// Body mass in kilograms.
    pub fn mass_kg(self) -> f64 {
        MASSES_KG[self.index()]
    }

    /// Orbital period in Julian years.
    pub fn orbital_period_years(self) -> f64 {
        ORBITAL_PERIOD_YEARS[self.index()]
    }
}

/// Apparent angular size and equatorial horizontal parallax of a body at the
/// given geocentric distance.
pub fn size_and_parallax(body: Body, distance: Au) -> (Radian, Radian) {
    let angular_size = 2.0 * (body.radius_au() / distance).atan();
    let parallax = ((PARALLAX_CONSTANT_ARCSEC * RADSEC).sin() / distance).asin();
    (angular_size, parallax)
}
