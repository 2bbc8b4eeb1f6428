//! # Per-instant calculation cache
//!
//! Every derived astronomical quantity the engine computes is memoized in a
//! slot table keyed by the current calculation instant. A slot is valid iff
//! its valid-flag equals the owning scope's current flag; invalidating a
//! whole scope is a single counter bump. Scopes nest: the iterative
//! rise/set solver pushes a *refinement* scope to evaluate trial instants
//! without disturbing the outer instant's cached values, and pops back when
//! done.
//!
//! ## Scopes
//!
//! A [`AstroCachePool`] owns five scopes:
//!
//! - `Final` — the primary scope bound to the session instant
//! - `Temp` — short-lived re-anchoring (twilight indicator geometry)
//! - `Refinement` — trial instants inside iterative solvers (zero slop)
//! - `Midnight` — prior-UT-midnight evaluations for GST→UT conversion
//! - `Year2000` — the fixed reference day used by the calendar-error dial
//!
//! ## Location partitioning
//!
//! Slot indices below [`FIRST_LOCATION_DEPENDENT`] depend only on the
//! instant. When only the observer (latitude, longitude or timezone offset)
//! changes, those slots are retroactively re-validated in the non-transient
//! scopes, so a pure location change does not recompute planetary positions.
//!
//! Grounding and redesign notes live in `DESIGN.md`: the slot table follows
//! the original engine's flag discipline; the `(quantity, body)` enum
//! replaces raw base-plus-offset slot arithmetic.

use crate::almanac::{Quarter, SeasonMark, TimeBase, TwilightKind};
use crate::bodies::{Body, BODY_COUNT};
use crate::constants::Timestamp;
use crate::series::Precision;

const QUARTER_COUNT: usize = 4;
const PRECISION_COUNT: usize = 3;
const TWILIGHT_COUNT: usize = 10;
const LEAF_BASE_COUNT: usize = 2; // local-time and sidereal-time dial faces

// Slot index layout. Scalar slots first, then fixed-stride blocks. Keep the
// location-independent region strictly below FIRST_LOCATION_DEPENDENT.
mod idx {
    use super::*;

    // -------- location independent scalars --------
    pub const PRIOR_UT_MIDNIGHT: usize = 0;
    pub const TDT_CENTURIES: usize = 1;
    pub const TDT_CENTURIES_DELTA_T: usize = 2;
    pub const SUN_APPARENT_LONGITUDE: usize = 3;
    pub const SUN_DISTANCE: usize = 4;
    pub const NUTATION: usize = 5;
    pub const OBLIQUITY: usize = 6;
    pub const EOT_FOR_DAY: usize = 7;
    pub const MOON_AGE: usize = 8;
    pub const MOON_PHASE: usize = 9;
    pub const NEXT_MOON_PHASE: usize = 10;
    pub const PREV_MOON_PHASE: usize = 11;
    pub const REAL_MOON_AGE: usize = 12;
    pub const MOON_POSITION_ANGLE: usize = 13;
    pub const VERNAL_EQUINOX: usize = 14;
    pub const ASCENDING_NODE_LONGITUDE: usize = 15;
    pub const ASCENDING_NODE_RA: usize = 16;
    pub const ASCENDING_NODE_DECL: usize = 17;
    pub const ASCENDING_NODE_RA_J2000: usize = 18;
    pub const ASCENDING_NODE_DECL_J2000: usize = 19;
    pub const PRECESSION: usize = 20;
    pub const CALENDAR_ERROR: usize = 21;

    // -------- location independent blocks --------
    pub const CLOSEST_QUARTER: usize = 22;
    pub const NEXT_QUARTER: usize = CLOSEST_QUARTER + QUARTER_COUNT;
    pub const CLOSEST_SUN_LONGITUDE: usize = NEXT_QUARTER + QUARTER_COUNT;
    pub const CLOSEST_SUN_LONGITUDE_ANGLE: usize = CLOSEST_SUN_LONGITUDE + QUARTER_COUNT;
    pub const MOON_SERIES_RA: usize = CLOSEST_SUN_LONGITUDE_ANGLE + QUARTER_COUNT;
    pub const MOON_SERIES_DECL: usize = MOON_SERIES_RA + PRECISION_COUNT;
    pub const MOON_SERIES_LONGITUDE: usize = MOON_SERIES_DECL + PRECISION_COUNT;
    pub const MOON_SERIES_LATITUDE: usize = MOON_SERIES_LONGITUDE + PRECISION_COUNT;
    pub const MOON_SERIES_DISTANCE: usize = MOON_SERIES_LATITUDE + PRECISION_COUNT;

    pub const RA: usize = MOON_SERIES_DISTANCE + PRECISION_COUNT;
    pub const DECL: usize = RA + BODY_COUNT;
    pub const RA_J2000: usize = DECL + BODY_COUNT;
    pub const DECL_J2000: usize = RA_J2000 + BODY_COUNT;
    pub const ECLIPTIC_LONGITUDE: usize = DECL_J2000 + BODY_COUNT;
    pub const ECLIPTIC_LATITUDE: usize = ECLIPTIC_LONGITUDE + BODY_COUNT;
    pub const GEOCENTRIC_DISTANCE: usize = ECLIPTIC_LATITUDE + BODY_COUNT;
    pub const HELIOCENTRIC_LONGITUDE: usize = GEOCENTRIC_DISTANCE + BODY_COUNT;
    pub const HELIOCENTRIC_LATITUDE: usize = HELIOCENTRIC_LONGITUDE + BODY_COUNT;
    pub const HELIOCENTRIC_RADIUS: usize = HELIOCENTRIC_LATITUDE + BODY_COUNT;

    // -------- location dependent from here --------
    pub const FIRST_LOCATION_DEPENDENT: usize = HELIOCENTRIC_RADIUS + BODY_COUNT;

    pub const LST: usize = FIRST_LOCATION_DEPENDENT;
    pub const ECLIPSE_ABSTRACT_SEPARATION: usize = LST + 1;
    pub const ECLIPSE_ANGULAR_SEPARATION: usize = ECLIPSE_ABSTRACT_SEPARATION + 1;
    pub const ECLIPSE_SHADOW_ANGULAR_SIZE: usize = ECLIPSE_ANGULAR_SEPARATION + 1;
    pub const ECLIPSE_KIND: usize = ECLIPSE_SHADOW_ANGULAR_SIZE + 1;
    pub const AZIMUTH_OF_HIGHEST_ECLIPTIC: usize = ECLIPSE_KIND + 1;
    pub const LONGITUDE_OF_HIGHEST_ECLIPTIC: usize = AZIMUTH_OF_HIGHEST_ECLIPTIC + 1;
    pub const ECLIPTIC_ALTITUDE: usize = LONGITUDE_OF_HIGHEST_ECLIPTIC + 1;
    pub const LONGITUDE_OF_ECLIPTIC_MERIDIAN: usize = ECLIPTIC_ALTITUDE + 1;
    pub const MOON_RELATIVE_POSITION_ANGLE: usize = LONGITUDE_OF_ECLIPTIC_MERIDIAN + 1;
    pub const MOON_RELATIVE_ANGLE: usize = MOON_RELATIVE_POSITION_ANGLE + 1;

    pub const TWILIGHT_TIME: usize = MOON_RELATIVE_ANGLE + 1;

    pub const MERIDIAN_TIME: usize = TWILIGHT_TIME + TWILIGHT_COUNT;
    pub const RA_TOPO: usize = MERIDIAN_TIME + BODY_COUNT;
    pub const DECL_TOPO: usize = RA_TOPO + BODY_COUNT;
    pub const ALTITUDE: usize = DECL_TOPO + BODY_COUNT;
    pub const AZIMUTH: usize = ALTITUDE + BODY_COUNT;
    pub const IS_UP: usize = AZIMUTH + BODY_COUNT;
    pub const RISE_FOR_DAY: usize = IS_UP + BODY_COUNT;
    pub const SET_FOR_DAY: usize = RISE_FOR_DAY + BODY_COUNT;
    pub const TRANSIT_FOR_DAY: usize = SET_FOR_DAY + BODY_COUNT;
    pub const NEXT_RISE: usize = TRANSIT_FOR_DAY + BODY_COUNT;
    pub const NEXT_SET: usize = NEXT_RISE + BODY_COUNT;
    pub const PREV_RISE: usize = NEXT_SET + BODY_COUNT;
    pub const PREV_SET: usize = PREV_RISE + BODY_COUNT;
    pub const NEXT_TRANSIT: usize = PREV_SET + BODY_COUNT;
    pub const NEXT_TRANSIT_LOW: usize = NEXT_TRANSIT + BODY_COUNT;
    pub const PREV_TRANSIT: usize = NEXT_TRANSIT_LOW + BODY_COUNT;
    pub const PREV_TRANSIT_LOW: usize = PREV_TRANSIT + BODY_COUNT;

    pub const LEAF_RISE: usize = PREV_TRANSIT_LOW + BODY_COUNT;
    pub const LEAF_SET: usize = LEAF_RISE + BODY_COUNT * LEAF_BASE_COUNT;
    pub const LEAF_RISE_TRANSIT: usize = LEAF_SET + BODY_COUNT * LEAF_BASE_COUNT;
    pub const LEAF_SET_TRANSIT: usize = LEAF_RISE_TRANSIT + BODY_COUNT * LEAF_BASE_COUNT;

    pub const SLOT_COUNT: usize = LEAF_SET_TRANSIT + BODY_COUNT * LEAF_BASE_COUNT;
}

/// First slot index that depends on the observer location (latitude,
/// longitude or timezone offset).
pub(crate) const FIRST_LOCATION_DEPENDENT: usize = idx::FIRST_LOCATION_DEPENDENT;

/// Total number of cache slots per scope.
pub(crate) const SLOT_COUNT: usize = idx::SLOT_COUNT;

/// One derived astronomical quantity, mapped to a fixed slot index.
///
/// Quantities that exist per body or per precision tier carry that payload;
/// the mapping to a flat index is O(1) and bijective (see the unit tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    PriorUtMidnight,
    TdtCenturies,
    TdtCenturiesDeltaT,
    SunApparentLongitude,
    SunDistance,
    Nutation,
    Obliquity,
    EotForDay,
    MoonAge,
    MoonPhase,
    NextMoonPhase,
    PrevMoonPhase,
    RealMoonAge,
    MoonPositionAngle,
    VernalEquinox,
    AscendingNodeLongitude,
    AscendingNodeRa,
    AscendingNodeDecl,
    AscendingNodeRaJ2000,
    AscendingNodeDeclJ2000,
    Precession,
    CalendarError,
    ClosestQuarter(Quarter),
    NextQuarter(Quarter),
    ClosestSunLongitude(SeasonMark),
    ClosestSunLongitudeAngle(SeasonMark),
    MoonSeriesRa(Precision),
    MoonSeriesDecl(Precision),
    MoonSeriesLongitude(Precision),
    MoonSeriesLatitude(Precision),
    MoonSeriesDistance(Precision),
    Ra(Body),
    Decl(Body),
    RaJ2000(Body),
    DeclJ2000(Body),
    EclipticLongitude(Body),
    EclipticLatitude(Body),
    GeocentricDistance(Body),
    HeliocentricLongitude(Body),
    HeliocentricLatitude(Body),
    HeliocentricRadius(Body),
    Lst,
    EclipseAbstractSeparation,
    EclipseAngularSeparation,
    EclipseShadowAngularSize,
    EclipseKind,
    AzimuthOfHighestEcliptic,
    LongitudeOfHighestEcliptic,
    EclipticAltitude,
    LongitudeOfEclipticMeridian,
    MoonRelativePositionAngle,
    MoonRelativeAngle,
    TwilightTime(TwilightKind),
    MeridianTime(Body),
    RaTopo(Body),
    DeclTopo(Body),
    Altitude(Body),
    Azimuth(Body),
    IsUp(Body),
    RiseForDay(Body),
    SetForDay(Body),
    TransitForDay(Body),
    NextRise(Body),
    NextSet(Body),
    PrevRise(Body),
    PrevSet(Body),
    NextTransit(Body),
    NextTransitLow(Body),
    PrevTransit(Body),
    PrevTransitLow(Body),
    LeafRise(Body, TimeBase),
    LeafSet(Body, TimeBase),
    LeafRiseTransit(Body, TimeBase),
    LeafSetTransit(Body, TimeBase),
}

impl Slot {
    pub(crate) fn index(self) -> usize {
        use Slot::*;
        match self {
            PriorUtMidnight => idx::PRIOR_UT_MIDNIGHT,
            TdtCenturies => idx::TDT_CENTURIES,
            TdtCenturiesDeltaT => idx::TDT_CENTURIES_DELTA_T,
            SunApparentLongitude => idx::SUN_APPARENT_LONGITUDE,
            SunDistance => idx::SUN_DISTANCE,
            Nutation => idx::NUTATION,
            Obliquity => idx::OBLIQUITY,
            EotForDay => idx::EOT_FOR_DAY,
            MoonAge => idx::MOON_AGE,
            MoonPhase => idx::MOON_PHASE,
            NextMoonPhase => idx::NEXT_MOON_PHASE,
            PrevMoonPhase => idx::PREV_MOON_PHASE,
            RealMoonAge => idx::REAL_MOON_AGE,
            MoonPositionAngle => idx::MOON_POSITION_ANGLE,
            VernalEquinox => idx::VERNAL_EQUINOX,
            AscendingNodeLongitude => idx::ASCENDING_NODE_LONGITUDE,
            AscendingNodeRa => idx::ASCENDING_NODE_RA,
            AscendingNodeDecl => idx::ASCENDING_NODE_DECL,
            AscendingNodeRaJ2000 => idx::ASCENDING_NODE_RA_J2000,
            AscendingNodeDeclJ2000 => idx::ASCENDING_NODE_DECL_J2000,
            Precession => idx::PRECESSION,
            CalendarError => idx::CALENDAR_ERROR,
            ClosestQuarter(q) => idx::CLOSEST_QUARTER + q.index(),
            NextQuarter(q) => idx::NEXT_QUARTER + q.index(),
            ClosestSunLongitude(m) => idx::CLOSEST_SUN_LONGITUDE + m.index(),
            ClosestSunLongitudeAngle(m) => idx::CLOSEST_SUN_LONGITUDE_ANGLE + m.index(),
            MoonSeriesRa(p) => idx::MOON_SERIES_RA + p.index(),
            MoonSeriesDecl(p) => idx::MOON_SERIES_DECL + p.index(),
            MoonSeriesLongitude(p) => idx::MOON_SERIES_LONGITUDE + p.index(),
            MoonSeriesLatitude(p) => idx::MOON_SERIES_LATITUDE + p.index(),
            MoonSeriesDistance(p) => idx::MOON_SERIES_DISTANCE + p.index(),
            Ra(b) => idx::RA + b.index(),
            Decl(b) => idx::DECL + b.index(),
            RaJ2000(b) => idx::RA_J2000 + b.index(),
            DeclJ2000(b) => idx::DECL_J2000 + b.index(),
            EclipticLongitude(b) => idx::ECLIPTIC_LONGITUDE + b.index(),
            EclipticLatitude(b) => idx::ECLIPTIC_LATITUDE + b.index(),
            GeocentricDistance(b) => idx::GEOCENTRIC_DISTANCE + b.index(),
            HeliocentricLongitude(b) => idx::HELIOCENTRIC_LONGITUDE + b.index(),
            HeliocentricLatitude(b) => idx::HELIOCENTRIC_LATITUDE + b.index(),
            HeliocentricRadius(b) => idx::HELIOCENTRIC_RADIUS + b.index(),
            Lst => idx::LST,
            EclipseAbstractSeparation => idx::ECLIPSE_ABSTRACT_SEPARATION,
            EclipseAngularSeparation => idx::ECLIPSE_ANGULAR_SEPARATION,
            EclipseShadowAngularSize => idx::ECLIPSE_SHADOW_ANGULAR_SIZE,
            EclipseKind => idx::ECLIPSE_KIND,
            AzimuthOfHighestEcliptic => idx::AZIMUTH_OF_HIGHEST_ECLIPTIC,
            LongitudeOfHighestEcliptic => idx::LONGITUDE_OF_HIGHEST_ECLIPTIC,
            EclipticAltitude => idx::ECLIPTIC_ALTITUDE,
            LongitudeOfEclipticMeridian => idx::LONGITUDE_OF_ECLIPTIC_MERIDIAN,
            MoonRelativePositionAngle => idx::MOON_RELATIVE_POSITION_ANGLE,
            MoonRelativeAngle => idx::MOON_RELATIVE_ANGLE,
            TwilightTime(k) => idx::TWILIGHT_TIME + k.index(),
            MeridianTime(b) => idx::MERIDIAN_TIME + b.index(),
            RaTopo(b) => idx::RA_TOPO + b.index(),
            DeclTopo(b) => idx::DECL_TOPO + b.index(),
            Altitude(b) => idx::ALTITUDE + b.index(),
            Azimuth(b) => idx::AZIMUTH + b.index(),
            IsUp(b) => idx::IS_UP + b.index(),
            RiseForDay(b) => idx::RISE_FOR_DAY + b.index(),
            SetForDay(b) => idx::SET_FOR_DAY + b.index(),
            TransitForDay(b) => idx::TRANSIT_FOR_DAY + b.index(),
            NextRise(b) => idx::NEXT_RISE + b.index(),
            NextSet(b) => idx::NEXT_SET + b.index(),
            PrevRise(b) => idx::PREV_RISE + b.index(),
            PrevSet(b) => idx::PREV_SET + b.index(),
            NextTransit(b) => idx::NEXT_TRANSIT + b.index(),
            NextTransitLow(b) => idx::NEXT_TRANSIT_LOW + b.index(),
            PrevTransit(b) => idx::PREV_TRANSIT + b.index(),
            PrevTransitLow(b) => idx::PREV_TRANSIT_LOW + b.index(),
            LeafRise(b, t) => idx::LEAF_RISE + b.index() * LEAF_BASE_COUNT + t.leaf_index(),
            LeafSet(b, t) => idx::LEAF_SET + b.index() * LEAF_BASE_COUNT + t.leaf_index(),
            LeafRiseTransit(b, t) => {
                idx::LEAF_RISE_TRANSIT + b.index() * LEAF_BASE_COUNT + t.leaf_index()
            }
            LeafSetTransit(b, t) => {
                idx::LEAF_SET_TRANSIT + b.index() * LEAF_BASE_COUNT + t.leaf_index()
            }
        }
    }

    /// True iff the slot's value depends on the observer location.
    #[allow(dead_code)]
    pub(crate) fn location_dependent(self) -> bool {
        self.index() >= FIRST_LOCATION_DEPENDENT
    }
}

/// Scope names within a [`AstroCachePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeId {
    Final,
    Temp,
    Refinement,
    Midnight,
    Year2000,
}

const SCOPE_COUNT: usize = 5;

impl ScopeId {
    fn index(self) -> usize {
        match self {
            ScopeId::Final => 0,
            ScopeId::Temp => 1,
            ScopeId::Refinement => 2,
            ScopeId::Midnight => 3,
            ScopeId::Year2000 => 4,
        }
    }

    /// Transient scopes are never re-stamped on a location change; they are
    /// always pushed fresh with a trial instant.
    fn is_transient(self) -> bool {
        matches!(self, ScopeId::Temp | ScopeId::Refinement)
    }
}

/// One scope's slot table.
pub(crate) struct AstroCache {
    instant: Timestamp,
    slop: f64,
    current_flag: u32,
    global_valid_flag: u32,
    values: [f64; SLOT_COUNT],
    valid: [u32; SLOT_COUNT],
}

impl AstroCache {
    fn new() -> Self {
        AstroCache {
            instant: 0.0,
            slop: 0.0,
            current_flag: 0,
            global_valid_flag: 0,
            values: [0.0; SLOT_COUNT],
            valid: [0; SLOT_COUNT],
        }
    }

    fn reinitialize(&mut self) {
        self.current_flag = 1;
        self.valid = [0; SLOT_COUNT];
    }

    /// After the pool's global flag was bumped for a pure location change,
    /// carry the location-independent slots forward: they will match the
    /// scope's next current flag, which the next push increments by one.
    fn restamp_location_independent(&mut self) {
        if self.current_flag == u32::MAX {
            return; // next push reinitializes this scope anyway
        }
        for flag in self.valid[..FIRST_LOCATION_DEPENDENT].iter_mut() {
            if *flag == self.current_flag {
                *flag += 1;
            }
        }
    }
}

/// The set of cache scopes owned by one execution context, plus the observer
/// binding those scopes were computed under.
pub(crate) struct AstroCachePool {
    observer_latitude: f64,
    observer_longitude: f64,
    tz_offset_seconds: f64,
    running_backward: bool,
    in_action_button: bool,
    global_flag: u32,
    scopes: [AstroCache; SCOPE_COUNT],
    current: Option<ScopeId>,
    // Single-value memos shared by all scopes in this context (the time layer
    // consults them before doing a calendar conversion).
    midnight_memo: Timestamp,
    year_start_memo: Timestamp,
    year_value_memo: i32,
}

impl AstroCachePool {
    pub(crate) fn new() -> Self {
        AstroCachePool {
            observer_latitude: 0.0,
            observer_longitude: 0.0,
            tz_offset_seconds: 0.0,
            running_backward: false,
            in_action_button: false,
            global_flag: 1,
            scopes: [
                AstroCache::new(),
                AstroCache::new(),
                AstroCache::new(),
                AstroCache::new(),
                AstroCache::new(),
            ],
            current: None,
            midnight_memo: f64::NAN,
            year_start_memo: f64::NAN,
            year_value_memo: 0,
        }
    }

    /// Make `scope` current and validate (or invalidate) it for `instant`.
    /// Returns the previously-current scope so the caller can pop back.
    ///
    /// A `NaN` instant never matches a stored non-NaN instant and only
    /// matches a stored NaN, so pushing with NaN conservatively invalidates.
    pub(crate) fn push_scope(
        &mut self,
        scope: ScopeId,
        instant: Timestamp,
        slop: f64,
    ) -> Option<ScopeId> {
        let previous = self.current;
        self.current = Some(scope);
        let global_flag = self.global_flag;
        let cache = &mut self.scopes[scope.index()];
        cache.slop = slop;
        if cache.current_flag == 0 {
            // first ever push of this scope
            cache.current_flag = 1;
        }
        let invalid = if cache.global_valid_flag != global_flag {
            cache.global_valid_flag = global_flag;
            true
        } else if instant.is_nan() {
            !cache.instant.is_nan()
        } else if cache.instant.is_nan() {
            true
        } else {
            (instant - cache.instant).abs() > slop
        };
        if invalid {
            if cache.current_flag == u32::MAX {
                cache.reinitialize();
            } else {
                cache.current_flag += 1;
            }
            cache.instant = instant;
        }
        previous
    }

    /// Restore the previously-current scope. The popped-to scope is trusted
    /// to still represent its original instant; nothing is re-validated.
    pub(crate) fn pop_scope(&mut self, previous: Option<ScopeId>) {
        self.current = previous;
    }

    /// Bind the observer parameters, invalidating exactly what they affect.
    ///
    /// A direction-of-time change invalidates everything. A pure location or
    /// timezone change bumps the global flag but carries the
    /// location-independent slots of the non-transient scopes forward.
    pub(crate) fn bind_observer(
        &mut self,
        latitude: f64,
        longitude: f64,
        tz_offset_seconds: f64,
        running_backward: bool,
    ) {
        if running_backward != self.running_backward {
            self.running_backward = running_backward;
            self.global_flag = self.global_flag.wrapping_add(1);
        } else if latitude != self.observer_latitude
            || longitude != self.observer_longitude
            || tz_offset_seconds != self.tz_offset_seconds
        {
            self.observer_latitude = latitude;
            self.observer_longitude = longitude;
            self.tz_offset_seconds = tz_offset_seconds;
            self.global_flag = self.global_flag.wrapping_add(1);
            for id in [ScopeId::Final, ScopeId::Midnight, ScopeId::Year2000] {
                debug_assert!(!id.is_transient());
                self.scopes[id.index()].restamp_location_independent();
            }
        }
        self.observer_latitude = latitude;
        self.observer_longitude = longitude;
        self.tz_offset_seconds = tz_offset_seconds;
    }

    /// Invalidate every scope in this pool unconditionally.
    #[allow(dead_code)]
    pub(crate) fn invalidate_all(&mut self) {
        self.global_flag = self.global_flag.wrapping_add(1);
    }

    pub(crate) fn current_scope(&self) -> Option<ScopeId> {
        self.current
    }

    fn current_cache(&self) -> Option<&AstroCache> {
        self.current.map(|id| &self.scopes[id.index()])
    }

    fn current_cache_mut(&mut self) -> Option<&mut AstroCache> {
        let id = self.current?;
        Some(&mut self.scopes[id.index()])
    }

    /// Read a slot from the current scope, if it is valid for the scope's
    /// current instant.
    pub(crate) fn lookup(&self, slot: Slot) -> Option<f64> {
        let cache = self.current_cache()?;
        let i = slot.index();
        (cache.valid[i] == cache.current_flag).then(|| cache.values[i])
    }

    /// Write a slot in the current scope. Value and valid-flag are always
    /// written together; there is no way to set one without the other.
    /// Returns the stored value for call-through convenience.
    pub(crate) fn store(&mut self, slot: Slot, value: f64) -> f64 {
        if let Some(cache) = self.current_cache_mut() {
            let i = slot.index();
            cache.values[i] = value;
            cache.valid[i] = cache.current_flag;
        }
        value
    }

    /// Debug guard: the current scope, if any, must be bound to an instant
    /// within its slop of the caller's instant.
    #[inline]
    pub(crate) fn assert_current_instant(&self, instant: Timestamp) {
        #[cfg(debug_assertions)]
        if let Some(cache) = self.current_cache() {
            debug_assert!(
                (cache.instant - instant).abs() <= cache.slop
                    || (cache.instant.is_nan() && instant.is_nan()),
                "cache scope bound to {} but query is for {}",
                cache.instant,
                instant
            );
        }
        #[cfg(not(debug_assertions))]
        let _ = instant;
    }

    pub(crate) fn in_action_button(&self) -> bool {
        self.in_action_button
    }

    pub(crate) fn set_in_action_button(&mut self, value: bool) {
        self.in_action_button = value;
    }

    pub(crate) fn midnight_memo(&self) -> Timestamp {
        self.midnight_memo
    }

    pub(crate) fn set_midnight_memo(&mut self, value: Timestamp) {
        self.midnight_memo = value;
    }

    pub(crate) fn year_memo(&self) -> (Timestamp, i32) {
        (self.year_start_memo, self.year_value_memo)
    }

    pub(crate) fn set_year_memo(&mut self, start: Timestamp, year: i32) {
        self.year_start_memo = start;
        self.year_value_memo = year;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::almanac::{Quarter, SeasonMark, TimeBase, TwilightKind};
    use crate::bodies::ALL_BODIES;
    use std::collections::HashSet;

    fn all_slots() -> Vec<Slot> {
        use Slot::*;
        let mut slots = vec![
            PriorUtMidnight,
            TdtCenturies,
            TdtCenturiesDeltaT,
            SunApparentLongitude,
            SunDistance,
            Nutation,
            Obliquity,
            EotForDay,
            MoonAge,
            MoonPhase,
            NextMoonPhase,
            PrevMoonPhase,
            RealMoonAge,
            MoonPositionAngle,
            VernalEquinox,
            AscendingNodeLongitude,
            AscendingNodeRa,
            AscendingNodeDecl,
            AscendingNodeRaJ2000,
            AscendingNodeDeclJ2000,
            Precession,
            CalendarError,
            Lst,
            EclipseAbstractSeparation,
            EclipseAngularSeparation,
            EclipseShadowAngularSize,
            EclipseKind,
            AzimuthOfHighestEcliptic,
            LongitudeOfHighestEcliptic,
            EclipticAltitude,
            LongitudeOfEclipticMeridian,
            MoonRelativePositionAngle,
            MoonRelativeAngle,
        ];
        for q in Quarter::ALL {
            slots.push(ClosestQuarter(q));
            slots.push(NextQuarter(q));
        }
        for m in SeasonMark::ALL {
            slots.push(ClosestSunLongitude(m));
            slots.push(ClosestSunLongitudeAngle(m));
        }
        for p in crate::series::Precision::ALL {
            slots.push(MoonSeriesRa(p));
            slots.push(MoonSeriesDecl(p));
            slots.push(MoonSeriesLongitude(p));
            slots.push(MoonSeriesLatitude(p));
            slots.push(MoonSeriesDistance(p));
        }
        for k in TwilightKind::ALL {
            slots.push(TwilightTime(k));
        }
        for b in ALL_BODIES {
            slots.push(Ra(b));
            slots.push(Decl(b));
            slots.push(RaJ2000(b));
            slots.push(DeclJ2000(b));
            slots.push(EclipticLongitude(b));
            slots.push(EclipticLatitude(b));
            slots.push(GeocentricDistance(b));
            slots.push(HeliocentricLongitude(b));
            slots.push(HeliocentricLatitude(b));
            slots.push(HeliocentricRadius(b));
            slots.push(MeridianTime(b));
            slots.push(RaTopo(b));
            slots.push(DeclTopo(b));
            slots.push(Altitude(b));
            slots.push(Azimuth(b));
            slots.push(IsUp(b));
            slots.push(RiseForDay(b));
            slots.push(SetForDay(b));
            slots.push(TransitForDay(b));
            slots.push(NextRise(b));
            slots.push(NextSet(b));
            slots.push(PrevRise(b));
            slots.push(PrevSet(b));
            slots.push(NextTransit(b));
            slots.push(NextTransitLow(b));
            slots.push(PrevTransit(b));
            slots.push(PrevTransitLow(b));
            for t in [TimeBase::LocalTime, TimeBase::SiderealTime] {
                slots.push(LeafRise(b, t));
                slots.push(LeafSet(b, t));
                slots.push(LeafRiseTransit(b, t));
                slots.push(LeafSetTransit(b, t));
            }
        }
        slots
    }

    #[test]
    fn slot_indices_are_a_bijection() {
        let slots = all_slots();
        assert_eq!(slots.len(), SLOT_COUNT);
        let mut seen = HashSet::new();
        for slot in slots {
            let i = slot.index();
            assert!(i < SLOT_COUNT, "{slot:?} out of range");
            assert!(seen.insert(i), "{slot:?} collides at index {i}");
        }
    }

    #[test]
    fn location_partition_is_contiguous() {
        assert!(!Slot::Ra(Body::Sun).location_dependent());
        assert!(!Slot::HeliocentricRadius(Body::Neptune).location_dependent());
        assert!(Slot::Lst.location_dependent());
        assert!(Slot::Azimuth(Body::Sun).location_dependent());
        assert!(Slot::LeafSetTransit(Body::Neptune, TimeBase::SiderealTime).location_dependent());
    }

    #[test]
    fn push_same_instant_preserves_slots() {
        let mut pool = AstroCachePool::new();
        pool.push_scope(ScopeId::Final, 1000.0, 2.0);
        pool.store(Slot::Precession, 42.0);
        let prev = pool.push_scope(ScopeId::Final, 1001.0, 2.0); // within slop
        assert_eq!(prev, Some(ScopeId::Final));
        assert_eq!(pool.lookup(Slot::Precession), Some(42.0));
    }

    #[test]
    fn push_different_instant_invalidates_scope() {
        let mut pool = AstroCachePool::new();
        pool.push_scope(ScopeId::Final, 1000.0, 2.0);
        pool.store(Slot::Precession, 42.0);
        pool.push_scope(ScopeId::Final, 5000.0, 2.0);
        assert_eq!(pool.lookup(Slot::Precession), None);
    }

    #[test]
    fn nan_instant_conservatively_invalidates() {
        let mut pool = AstroCachePool::new();
        pool.push_scope(ScopeId::Final, 1000.0, 2.0);
        pool.store(Slot::Precession, 42.0);
        pool.push_scope(ScopeId::Final, f64::NAN, 2.0);
        assert_eq!(pool.lookup(Slot::Precession), None);
        // NaN matches a stored NaN: a second NaN push keeps the scope.
        pool.store(Slot::Precession, 7.0);
        pool.push_scope(ScopeId::Final, f64::NAN, 2.0);
        assert_eq!(pool.lookup(Slot::Precession), Some(7.0));
    }

    #[test]
    fn push_pop_nesting_restores_scope() {
        let mut pool = AstroCachePool::new();
        pool.push_scope(ScopeId::Final, 1000.0, 2.0);
        pool.store(Slot::Precession, 1.0);
        let prev = pool.push_scope(ScopeId::Refinement, 2000.0, 0.0);
        assert_eq!(prev, Some(ScopeId::Final));
        assert_eq!(pool.lookup(Slot::Precession), None); // refinement scope is fresh
        pool.store(Slot::Precession, 2.0);
        pool.pop_scope(prev);
        assert_eq!(pool.current_scope(), Some(ScopeId::Final));
        assert_eq!(pool.lookup(Slot::Precession), Some(1.0));
    }

    #[test]
    fn location_change_preserves_location_independent_slots() {
        let mut pool = AstroCachePool::new();
        pool.bind_observer(0.7, -1.2, -18_000.0, false);
        pool.push_scope(ScopeId::Final, 1000.0, 2.0);
        pool.store(Slot::Ra(Body::Sun), 3.14);
        pool.store(Slot::Azimuth(Body::Sun), 2.71);
        // Pure longitude change.
        pool.bind_observer(0.7, -1.3, -18_000.0, false);
        pool.push_scope(ScopeId::Final, 1000.0, 2.0);
        assert_eq!(pool.lookup(Slot::Ra(Body::Sun)), Some(3.14));
        assert_eq!(pool.lookup(Slot::Azimuth(Body::Sun)), None);
    }

    #[test]
    fn running_backward_change_invalidates_everything() {
        let mut pool = AstroCachePool::new();
        pool.bind_observer(0.7, -1.2, 0.0, false);
        pool.push_scope(ScopeId::Final, 1000.0, 2.0);
        pool.store(Slot::Ra(Body::Sun), 3.14);
        pool.bind_observer(0.7, -1.2, 0.0, true);
        pool.push_scope(ScopeId::Final, 1000.0, 2.0);
        assert_eq!(pool.lookup(Slot::Ra(Body::Sun)), None);
    }

    #[test]
    fn flag_wraparound_reinitializes() {
        let mut pool = AstroCachePool::new();
        pool.push_scope(ScopeId::Final, 1000.0, 2.0);
        pool.store(Slot::Precession, 42.0);
        pool.scopes[ScopeId::Final.index()].current_flag = u32::MAX;
        // A push that invalidates at the flag ceiling must reset, not overflow.
        pool.push_scope(ScopeId::Final, 99_000.0, 2.0);
        assert_eq!(pool.scopes[ScopeId::Final.index()].current_flag, 1);
        assert_eq!(pool.lookup(Slot::Precession), None);
    }

    #[test]
    fn store_without_current_scope_is_inert() {
        let mut pool = AstroCachePool::new();
        assert_eq!(pool.lookup(Slot::Precession), None);
        assert_eq!(pool.store(Slot::Precession, 9.0), 9.0);
        assert_eq!(pool.lookup(Slot::Precession), None);
    }
}
