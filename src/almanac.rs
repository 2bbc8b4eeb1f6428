//! # Astronomy facade
//!
//! [`Almanac`] owns the series provider; [`CalculationContext`] owns one
//! cache pool per execution context (inject one per worker; never share).
//! Binding the two with an [`AstroEnvironment`] yields a [`Session`] — the
//! stateful object every query lives on. Setup happens when the session is
//! created (observer bound, primary cache scope pushed for the instant);
//! cleanup happens on drop.
//!
//! ```no_run
//! use orrery::almanac::{Almanac, CalculationContext};
//! use orrery::bodies::Body;
//! use orrery::env::ObserverClock;
//!
//! let almanac = Almanac::with_builtin_series();
//! let mut ctx = CalculationContext::new();
//! let env = ObserverClock::new(0.0, 0.7399, -1.2401, -5.0 * 3600.0);
//! let mut session = almanac.session(&mut ctx, &env).unwrap();
//! let sunrise = session.next_rise(Body::Sun);
//! let moon_age = session.moon_age_angle();
//! # let _ = (sunrise, moon_age);
//! ```
//!
//! Every query follows the cache-slot read-or-compute pattern, so asking the
//! same question twice in one session is free and bit-identical.

use std::f64::consts::{FRAC_PI_2, PI};

use crate::bodies::{size_and_parallax, Body};
use crate::cache::{AstroCachePool, ScopeId, Slot};
use crate::constants::{
    Radian, Timestamp, ASTRO_SLOP, COS_MOON_EQUATOR_ECLIPTIC_ANGLE, DPI, LUNAR_CYCLE_SECONDS,
    RADEG, SECONDS_PER_DAY, SIN_MOON_EQUATOR_ECLIPTIC_ANGLE, TROPICAL_YEAR_SECONDS,
};
use crate::env::AstroEnvironment;
use crate::errors::OrreryError;
use crate::position::{
    self, angular_separation, body_alt_az, body_position, north_angle, position_angle,
    topocentric_parallax,
};
use crate::series::meeus::MeeusSeries;
use crate::series::{Precision, SeriesProvider};
use crate::solver::{HorizonState, SolverCtx, SolverMethod};
use crate::time::{
    day_of_year, instant_from_local, instant_from_utc, julian_centuries_since_2000,
    local_components, noon_ut, normalize_radians, precession, sidereal, utc_components,
};

/// Nudge applied before a next/previous search so a just-computed event
/// stays behind (or ahead of) the current instant.
const FUDGE_SECONDS: f64 = 5.0;

/// How far to jump when the nearest event lands on the wrong side: a bit
/// more than half a day, so the adjacent event is always inside the window.
const LOOKAHEAD_SECONDS: f64 = 3600.0 * 13.2;

/// Seconds of time per radian of a 24-hour dial.
const SECONDS_PER_DIAL_RADIAN: f64 = 12.0 * 3600.0 / PI;

// -------------------------------------------------------------------------------------------------
// Small facade enums
// -------------------------------------------------------------------------------------------------

/// Lunar principal phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quarter {
    New,
    FirstQuarter,
    Full,
    ThirdQuarter,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [
        Quarter::New,
        Quarter::FirstQuarter,
        Quarter::Full,
        Quarter::ThirdQuarter,
    ];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Quarter::New => 0,
            Quarter::FirstQuarter => 1,
            Quarter::Full => 2,
            Quarter::ThirdQuarter => 3,
        }
    }

    /// Moon-age angle at which this phase occurs.
    pub(crate) fn angle(self) -> Radian {
        self.index() as f64 * FRAC_PI_2
    }
}

/// Quarter points of the Sun's ecliptic longitude: 0°, 90°, 180°, 270° —
/// the equinoxes and solstices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeasonMark {
    MarchEquinox,
    JuneSolstice,
    SeptemberEquinox,
    DecemberSolstice,
}

impl SeasonMark {
    pub const ALL: [SeasonMark; 4] = [
        SeasonMark::MarchEquinox,
        SeasonMark::JuneSolstice,
        SeasonMark::SeptemberEquinox,
        SeasonMark::DecemberSolstice,
    ];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            SeasonMark::MarchEquinox => 0,
            SeasonMark::JuneSolstice => 1,
            SeasonMark::SeptemberEquinox => 2,
            SeasonMark::DecemberSolstice => 3,
        }
    }

    /// Target apparent solar longitude for this mark.
    fn longitude(self) -> Radian {
        self.index() as f64 * FRAC_PI_2
    }
}

/// Which clock a 24-hour dial angle is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeBase {
    LocalTime,
    Ut,
    SiderealTime,
}

impl TimeBase {
    /// Dial-slot index; only local and sidereal faces have cache slots.
    #[inline]
    pub(crate) fn leaf_index(self) -> usize {
        match self {
            TimeBase::LocalTime => 0,
            TimeBase::SiderealTime => 1,
            TimeBase::Ut => {
                debug_assert!(false, "UT dials have no leaf cache slots");
                0
            }
        }
    }
}

/// The sun-altitude events of a day, morning and evening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TwilightKind {
    GoldenHourMorning,
    RiseMorning,
    CivilTwilightMorning,
    NauticalTwilightMorning,
    AstroTwilightMorning,
    GoldenHourEvening,
    SetEvening,
    CivilTwilightEvening,
    NauticalTwilightEvening,
    AstroTwilightEvening,
}

impl TwilightKind {
    pub const ALL: [TwilightKind; 10] = [
        TwilightKind::GoldenHourMorning,
        TwilightKind::RiseMorning,
        TwilightKind::CivilTwilightMorning,
        TwilightKind::NauticalTwilightMorning,
        TwilightKind::AstroTwilightMorning,
        TwilightKind::GoldenHourEvening,
        TwilightKind::SetEvening,
        TwilightKind::CivilTwilightEvening,
        TwilightKind::NauticalTwilightEvening,
        TwilightKind::AstroTwilightEvening,
    ];

    #[inline]
    pub(crate) fn index(self) -> usize {
        Self::ALL.iter().position(|k| *k == self).unwrap()
    }

    /// Target altitude override (`None` = true geometric rise/set) and
    /// whether this is a rising event.
    pub(crate) fn altitude_and_direction(self) -> (Option<Radian>, bool) {
        match self {
            TwilightKind::RiseMorning => (None, true),
            TwilightKind::SetEvening => (None, false),
            TwilightKind::GoldenHourMorning => (Some(15.0 * RADEG), true),
            TwilightKind::GoldenHourEvening => (Some(15.0 * RADEG), false),
            TwilightKind::CivilTwilightMorning => (Some(-6.0 * RADEG), true),
            TwilightKind::CivilTwilightEvening => (Some(-6.0 * RADEG), false),
            TwilightKind::NauticalTwilightMorning => (Some(-12.0 * RADEG), true),
            TwilightKind::NauticalTwilightEvening => (Some(-12.0 * RADEG), false),
            TwilightKind::AstroTwilightMorning => (Some(-18.0 * RADEG), true),
            TwilightKind::AstroTwilightEvening => (Some(-18.0 * RADEG), false),
        }
    }
}

/// Which set of dial leaves is being laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialFace {
    Day,
    Night,
}

/// Eclipse classification. "Not up" means the eclipsed body is below the
/// horizon for this observer even though the alignment is eclipsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EclipseKind {
    NoneSolar,
    SolarNotUp,
    PartialSolar,
    AnnularSolar,
    TotalSolar,
    NoneLunar,
    LunarNotUp,
    PartialLunar,
    TotalLunar,
}

impl EclipseKind {
    pub fn is_solar(self) -> bool {
        matches!(
            self,
            EclipseKind::NoneSolar
                | EclipseKind::SolarNotUp
                | EclipseKind::PartialSolar
                | EclipseKind::AnnularSolar
                | EclipseKind::TotalSolar
        )
    }

    /// True when an eclipse is actually in progress (any kind, any
    /// visibility).
    pub fn is_eclipsing(self) -> bool {
        !matches!(self, EclipseKind::NoneSolar | EclipseKind::NoneLunar)
    }

    const ALL: [EclipseKind; 9] = [
        EclipseKind::NoneSolar,
        EclipseKind::SolarNotUp,
        EclipseKind::PartialSolar,
        EclipseKind::AnnularSolar,
        EclipseKind::TotalSolar,
        EclipseKind::NoneLunar,
        EclipseKind::LunarNotUp,
        EclipseKind::PartialLunar,
        EclipseKind::TotalLunar,
    ];

    fn to_index(self) -> usize {
        Self::ALL.iter().position(|k| *k == self).unwrap()
    }

    fn from_index(index: usize) -> EclipseKind {
        Self::ALL[index]
    }
}

/// A 24-hour dial indicator angle for a rise or set hand.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorAngle {
    pub angle: Radian,
    /// True if the angle marks an actual rise/set; false if it is the
    /// transit stand-in because the body is circumpolar today.
    pub is_rise_set: bool,
    /// When `is_rise_set` is false: whether the body is always above (vs
    /// always below) the horizon.
    pub above_horizon: Option<bool>,
}

/// Phase geometry of a planet as seen from Earth.
#[derive(Debug, Clone, Copy)]
pub struct PlanetAge {
    /// Sun–Earth–planet angle (delta ecliptic longitude analogue), signed
    /// into [0, 2π) by the relative heliocentric longitudes.
    pub age: Radian,
    /// The moon-age-convention angle the terminator dial expects: the
    /// complement of the phase angle, carried around the same way.
    pub dial_age: Radian,
    /// Sun–planet–Earth angle (the true phase angle).
    pub phase: Radian,
}

// -------------------------------------------------------------------------------------------------
// Context, almanac, session
// -------------------------------------------------------------------------------------------------

/// One per execution context (thread, worker): owns the cache pool. Obtain
/// by construction and inject wherever sessions are created; two contexts
/// never share a pool.
pub struct CalculationContext {
    pool: AstroCachePool,
}

impl CalculationContext {
    pub fn new() -> Self {
        CalculationContext {
            pool: AstroCachePool::new(),
        }
    }
}

impl Default for CalculationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The astronomy engine: a series provider plus the query logic. Construct
/// once; create a [`Session`] per calculation pass.
pub struct Almanac {
    provider: Box<dyn SeriesProvider + Send + Sync>,
}

impl Almanac {
    pub fn new(provider: Box<dyn SeriesProvider + Send + Sync>) -> Self {
        Almanac { provider }
    }

    /// An almanac over the built-in classical series.
    pub fn with_builtin_series() -> Self {
        Almanac::new(Box::new(MeeusSeries::new()))
    }

    /// Bind the environment for one calculation pass. The observer and
    /// instant are sampled once, here; queries on the returned session all
    /// answer for that instant.
    pub fn session<'a>(
        &'a self,
        ctx: &'a mut CalculationContext,
        env: &dyn AstroEnvironment,
    ) -> Result<Session<'a>, OrreryError> {
        self.session_internal(ctx, env, false)
    }

    /// Like [`Almanac::session`], marking the pool as claimed by an action
    /// button so re-entrant UI callbacks can detect improper nesting.
    pub fn session_from_action_button<'a>(
        &'a self,
        ctx: &'a mut CalculationContext,
        env: &dyn AstroEnvironment,
    ) -> Result<Session<'a>, OrreryError> {
        self.session_internal(ctx, env, true)
    }

    fn session_internal<'a>(
        &'a self,
        ctx: &'a mut CalculationContext,
        env: &dyn AstroEnvironment,
        from_action_button: bool,
    ) -> Result<Session<'a>, OrreryError> {
        let instant = env.current_instant();
        let latitude = env.latitude();
        let longitude = env.longitude();
        let tz_offset = env.tz_offset_seconds();
        if !instant.is_finite() {
            return Err(OrreryError::InvalidInstant(instant));
        }
        if !latitude.is_finite() || latitude.abs() > FRAC_PI_2 + 1e-9 {
            return Err(OrreryError::InvalidObserverLatitude(latitude));
        }
        if !longitude.is_finite() {
            return Err(OrreryError::InvalidObserverLongitude(longitude));
        }
        let pool = &mut ctx.pool;
        if pool.current_scope().is_some() && !pool.in_action_button() {
            return Err(OrreryError::ContextBusy);
        }
        pool.bind_observer(latitude, longitude, tz_offset, env.running_backward());
        if from_action_button {
            debug_assert!(!pool.in_action_button());
            pool.set_in_action_button(true);
        }
        pool.push_scope(ScopeId::Final, instant, ASTRO_SLOP);
        Ok(Session {
            provider: self.provider.as_ref(),
            pool,
            instant,
            latitude,
            longitude,
            tz_offset,
            running_backward: env.running_backward(),
            location_valid: env.location_valid(),
            from_action_button,
        })
    }
}

/// One calculation pass: a bound (instant, observer) pair plus the cache
/// pool claimed for it. Dropping the session releases the pool.
pub struct Session<'a> {
    provider: &'a (dyn SeriesProvider + Send + Sync),
    pool: &'a mut AstroCachePool,
    instant: Timestamp,
    latitude: Radian,
    longitude: Radian,
    tz_offset: f64,
    running_backward: bool,
    location_valid: bool,
    from_action_button: bool,
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.from_action_button {
            debug_assert!(self.pool.in_action_button());
            self.pool.set_in_action_button(false);
        }
        if !self.pool.in_action_button() {
            self.pool.pop_scope(None);
        }
    }
}

impl Session<'_> {
    pub fn instant(&self) -> Timestamp {
        self.instant
    }

    pub fn observer_latitude(&self) -> Radian {
        self.latitude
    }

    pub fn observer_longitude(&self) -> Radian {
        self.longitude
    }

    fn solver(&mut self) -> SolverCtx<'_> {
        SolverCtx {
            provider: self.provider,
            pool: &mut *self.pool,
            observer_latitude: self.latitude,
            observer_longitude: self.longitude,
        }
    }

    fn times_are_on_same_day(&self, a: Timestamp, b: Timestamp) -> bool {
        let ca = local_components(a, self.tz_offset);
        let cb = local_components(b, self.tz_offset);
        ca.year == cb.year && ca.month == cb.month && ca.day == cb.day
    }

    /// The local midnight beginning the calendar day of the bound instant.
    fn local_midnight(&self) -> Timestamp {
        let mut c = local_components(self.instant, self.tz_offset);
        c.hour = 0;
        c.minute = 0;
        c.seconds = 0.0;
        instant_from_local(&c, self.tz_offset)
    }

    // ---------------------------------------------------------------------------------------------
    // Rise / set / transit
    // ---------------------------------------------------------------------------------------------

    /// The first rise of `body` after the bound instant (before it when the
    /// clock runs backward).
    pub fn next_rise(&mut self, body: Body) -> HorizonState {
        self.next_prev_rise_set(body, true, true)
    }

    pub fn next_set(&mut self, body: Body) -> HorizonState {
        self.next_prev_rise_set(body, false, true)
    }

    pub fn prev_rise(&mut self, body: Body) -> HorizonState {
        self.next_prev_rise_set(body, true, false)
    }

    pub fn prev_set(&mut self, body: Body) -> HorizonState {
        self.next_prev_rise_set(body, false, false)
    }

    pub fn next_sunrise(&mut self) -> HorizonState {
        self.next_rise(Body::Sun)
    }

    pub fn next_sunset(&mut self) -> HorizonState {
        self.next_set(Body::Sun)
    }

    pub fn prev_sunrise(&mut self) -> HorizonState {
        self.prev_rise(Body::Sun)
    }

    pub fn prev_sunset(&mut self) -> HorizonState {
        self.prev_set(Body::Sun)
    }

    pub fn next_moonrise(&mut self) -> HorizonState {
        self.next_rise(Body::Moon)
    }

    pub fn next_moonset(&mut self) -> HorizonState {
        self.next_set(Body::Moon)
    }

    pub fn prev_moonrise(&mut self) -> HorizonState {
        self.prev_rise(Body::Moon)
    }

    pub fn prev_moonset(&mut self) -> HorizonState {
        self.prev_set(Body::Moon)
    }

    fn next_prev_rise_set(&mut self, body: Body, rise: bool, next_not_prev: bool) -> HorizonState {
        if !body.has_rise_set() || !self.location_valid {
            return HorizonState::Invalid;
        }
        let slot = match (rise, next_not_prev) {
            (true, true) => Slot::NextRise(body),
            (true, false) => Slot::PrevRise(body),
            (false, true) => Slot::NextSet(body),
            (false, false) => Slot::PrevSet(body),
        };
        if let Some(v) = self.pool.lookup(slot) {
            return HorizonState::decode(v);
        }
        let instant = self.instant;
        let is_next = self.running_backward ^ next_not_prev;
        let method = SolverMethod::RiseSet {
            body,
            rise,
            override_altitude: None,
        };
        let solution = self.solver().next_prev_event(
            instant,
            method,
            FUDGE_SECONDS,
            is_next,
            LOOKAHEAD_SECONDS,
        );
        self.pool.store(slot, solution.state.encode());
        solution.state
    }

    /// The rise of `body` on the calendar day of the bound instant, whether
    /// it is before or after that instant.
    pub fn rise_for_day(&mut self, body: Body) -> HorizonState {
        self.rise_set_for_day(body, true)
    }

    pub fn set_for_day(&mut self, body: Body) -> HorizonState {
        self.rise_set_for_day(body, false)
    }

    pub fn sunrise_for_day(&mut self) -> HorizonState {
        self.rise_for_day(Body::Sun)
    }

    pub fn sunset_for_day(&mut self) -> HorizonState {
        self.set_for_day(Body::Sun)
    }

    pub fn moonrise_for_day(&mut self) -> HorizonState {
        self.rise_for_day(Body::Moon)
    }

    pub fn moonset_for_day(&mut self) -> HorizonState {
        self.set_for_day(Body::Moon)
    }

    fn rise_set_for_day(&mut self, body: Body, rise: bool) -> HorizonState {
        if !body.has_rise_set() || !self.location_valid {
            return HorizonState::Invalid;
        }
        let slot = if rise {
            Slot::RiseForDay(body)
        } else {
            Slot::SetForDay(body)
        };
        if let Some(v) = self.pool.lookup(slot) {
            return HorizonState::decode(v);
        }
        let instant = self.instant;
        let method = SolverMethod::RiseSet {
            body,
            rise,
            override_altitude: None,
        };
        // Negative fudge: an event exactly now still counts as today's.
        let solution = self.solver().next_prev_event(
            instant,
            method,
            -FUDGE_SECONDS,
            true,
            LOOKAHEAD_SECONDS,
        );
        let mut state = solution.state;
        if !self.times_are_on_same_day(solution.anchor, instant) {
            let solution = self.solver().next_prev_event(
                instant,
                method,
                -FUDGE_SECONDS,
                false,
                LOOKAHEAD_SECONDS,
            );
            state = solution.state;
            if let HorizonState::Event(t) = state {
                if !self.times_are_on_same_day(t, instant) {
                    state = HorizonState::Invalid;
                }
            }
        }
        self.pool.store(slot, state.encode());
        state
    }

    /// The (high) transit of `body` on the calendar day of the bound
    /// instant, if one falls on that day.
    pub fn transit_for_day(&mut self, body: Body) -> HorizonState {
        if !body.has_rise_set() || !self.location_valid {
            return HorizonState::Invalid;
        }
        if let Some(v) = self.pool.lookup(Slot::TransitForDay(body)) {
            return HorizonState::decode(v);
        }
        let instant = self.instant;
        let method = SolverMethod::Transit { body, high: true };
        let solution = self.solver().next_prev_event(
            instant,
            method,
            -FUDGE_SECONDS,
            true,
            LOOKAHEAD_SECONDS,
        );
        let mut state = solution.state;
        if let HorizonState::Event(t) = state {
            if !self.times_are_on_same_day(t, instant) {
                let solution = self.solver().next_prev_event(
                    instant,
                    method,
                    -FUDGE_SECONDS,
                    false,
                    LOOKAHEAD_SECONDS,
                );
                state = solution.state;
                if let HorizonState::Event(t) = state {
                    if !self.times_are_on_same_day(t, instant) {
                        state = HorizonState::Invalid;
                    }
                }
            }
        }
        self.pool.store(Slot::TransitForDay(body), state.encode());
        state
    }

    pub fn suntransit_for_day(&mut self) -> HorizonState {
        self.transit_for_day(Body::Sun)
    }

    pub fn moontransit_for_day(&mut self) -> HorizonState {
        self.transit_for_day(Body::Moon)
    }

    /// The next (high) transit of `body`. Transits always exist, so the
    /// answer is an event unless the location is unbound.
    pub fn next_transit(&mut self, body: Body) -> HorizonState {
        self.next_prev_transit(body, true, true)
    }

    pub fn prev_transit(&mut self, body: Body) -> HorizonState {
        self.next_prev_transit(body, false, true)
    }

    pub fn next_transit_low(&mut self, body: Body) -> HorizonState {
        self.next_prev_transit(body, true, false)
    }

    pub fn prev_transit_low(&mut self, body: Body) -> HorizonState {
        self.next_prev_transit(body, false, false)
    }

    fn next_prev_transit(&mut self, body: Body, next_not_prev: bool, want_high: bool) -> HorizonState {
        if !body.has_rise_set() || !self.location_valid {
            return HorizonState::Invalid;
        }
        let slot = match (next_not_prev, want_high) {
            (true, true) => Slot::NextTransit(body),
            (true, false) => Slot::NextTransitLow(body),
            (false, true) => Slot::PrevTransit(body),
            (false, false) => Slot::PrevTransitLow(body),
        };
        if let Some(v) = self.pool.lookup(slot) {
            return HorizonState::decode(v);
        }
        let instant = self.instant;
        let is_next = self.running_backward ^ next_not_prev;
        let method = SolverMethod::Transit {
            body,
            high: want_high,
        };
        let solution = self.solver().next_prev_event(
            instant,
            method,
            FUDGE_SECONDS,
            is_next,
            LOOKAHEAD_SECONDS,
        );
        self.pool.store(slot, solution.state.encode());
        solution.state
    }

    /// Clamp an upcoming event to the end of the current local day, for
    /// hands that park at midnight.
    fn next_or_midnight(&mut self, state: HorizonState) -> HorizonState {
        let HorizonState::Event(op) = state else {
            return state;
        };
        let midnight = self.local_midnight();
        if self.running_backward {
            if op < midnight {
                return HorizonState::Event(midnight);
            }
        } else {
            let next_midnight = midnight + SECONDS_PER_DAY;
            if op > next_midnight {
                return HorizonState::Event(next_midnight);
            }
        }
        state
    }

    pub fn next_sunrise_or_midnight(&mut self) -> HorizonState {
        let state = self.next_rise(Body::Sun);
        self.next_or_midnight(state)
    }

    pub fn next_sunset_or_midnight(&mut self) -> HorizonState {
        let state = self.next_set(Body::Sun);
        self.next_or_midnight(state)
    }

    pub fn next_moonrise_or_midnight(&mut self) -> HorizonState {
        let state = self.next_rise(Body::Moon);
        self.next_or_midnight(state)
    }

    pub fn next_moonset_or_midnight(&mut self) -> HorizonState {
        let state = self.next_set(Body::Moon);
        self.next_or_midnight(state)
    }

    /// Today's sun event for a twilight kind (golden hour, civil, nautical
    /// or astronomical twilight, or the true rise/set).
    pub fn sun_time_for_day(&mut self, kind: TwilightKind) -> HorizonState {
        if !self.location_valid {
            return HorizonState::Invalid;
        }
        if let Some(v) = self.pool.lookup(Slot::TwilightTime(kind)) {
            return HorizonState::decode(v);
        }
        let (altitude, rise) = kind.altitude_and_direction();
        let instant = self.instant;
        let method = SolverMethod::RiseSet {
            body: Body::Sun,
            rise,
            override_altitude: altitude,
        };
        let solution = self.solver().next_prev_event(
            instant,
            method,
            -FUDGE_SECONDS,
            true,
            LOOKAHEAD_SECONDS,
        );
        let mut state = solution.state;
        if !self.times_are_on_same_day(solution.anchor, instant) {
            let solution = self.solver().next_prev_event(
                instant,
                method,
                -FUDGE_SECONDS,
                false,
                LOOKAHEAD_SECONDS,
            );
            state = solution.state;
            if let HorizonState::Event(t) = state {
                if !self.times_are_on_same_day(t, instant) {
                    state = HorizonState::Invalid;
                }
            }
        }
        self.pool.store(Slot::TwilightTime(kind), state.encode());
        state
    }

    // ---------------------------------------------------------------------------------------------
    // Validity helpers
    // ---------------------------------------------------------------------------------------------

    pub fn next_rise_valid(&mut self, body: Body) -> bool {
        self.next_rise(body).is_event()
    }

    pub fn next_set_valid(&mut self, body: Body) -> bool {
        self.next_set(body).is_event()
    }

    pub fn prev_rise_valid(&mut self, body: Body) -> bool {
        self.prev_rise(body).is_event()
    }

    pub fn prev_set_valid(&mut self, body: Body) -> bool {
        self.prev_set(body).is_event()
    }

    pub fn rise_for_day_valid(&mut self, body: Body) -> bool {
        self.rise_for_day(body).is_event()
    }

    pub fn set_for_day_valid(&mut self, body: Body) -> bool {
        self.set_for_day(body).is_event()
    }

    pub fn transit_for_day_valid(&mut self, body: Body) -> bool {
        self.transit_for_day(body).is_event()
    }

    /// Whether the rise indicator hand has a real event to point at, taking
    /// the direction of time and the body's current up/down state into
    /// account.
    pub fn sunrise_indicator_valid(&mut self) -> bool {
        let up = self.is_up(Body::Sun).unwrap_or(false);
        if self.running_backward ^ up {
            self.prev_rise_valid(Body::Sun)
        } else {
            self.next_rise_valid(Body::Sun)
        }
    }

    pub fn sunset_indicator_valid(&mut self) -> bool {
        let up = self.is_up(Body::Sun).unwrap_or(false);
        if self.running_backward ^ up {
            self.next_set_valid(Body::Sun)
        } else {
            self.prev_set_valid(Body::Sun)
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Positions
    // ---------------------------------------------------------------------------------------------

    /// Apparent right ascension of date. `correct_for_parallax` applies the
    /// topocentric correction for the bound observer.
    pub fn right_ascension(&mut self, body: Body, correct_for_parallax: bool) -> Option<Radian> {
        if body == Body::Earth {
            return None;
        }
        if correct_for_parallax {
            Some(self.topocentric_position(body).0)
        } else {
            let instant = self.instant;
            Some(body_position(self.provider, self.pool, instant, body, Precision::Full).right_ascension)
        }
    }

    /// Apparent declination of date, optionally topocentric.
    pub fn declination(&mut self, body: Body, correct_for_parallax: bool) -> Option<Radian> {
        if body == Body::Earth {
            return None;
        }
        if correct_for_parallax {
            Some(self.topocentric_position(body).1)
        } else {
            let instant = self.instant;
            Some(body_position(self.provider, self.pool, instant, body, Precision::Full).declination)
        }
    }

    fn topocentric_position(&mut self, body: Body) -> (Radian, Radian) {
        if let (Some(ra), Some(decl)) = (
            self.pool.lookup(Slot::RaTopo(body)),
            self.pool.lookup(Slot::DeclTopo(body)),
        ) {
            return (ra, decl);
        }
        let instant = self.instant;
        let pos = body_position(self.provider, self.pool, instant, body, Precision::Full);
        let gst = sidereal::gst_for_instant(self.pool, instant);
        let lst = sidereal::gst_to_lst(gst, self.longitude);
        let hour_angle = lst - pos.right_ascension;
        let (topo_hour_angle, topo_decl) = topocentric_parallax(
            pos.right_ascension,
            pos.declination,
            hour_angle,
            pos.distance,
            self.latitude,
            0.0,
        );
        let mut topo_ra = lst - topo_hour_angle;
        if topo_ra < 0.0 {
            topo_ra += DPI;
        }
        self.pool.store(Slot::RaTopo(body), topo_ra);
        self.pool.store(Slot::DeclTopo(body), topo_decl);
        (topo_ra, topo_decl)
    }

    /// J2000-frame right ascension and declination, via the refined reverse
    /// precession.
    pub fn position_j2000(&mut self, body: Body) -> Option<(Radian, Radian)> {
        if body == Body::Earth {
            return None;
        }
        if let (Some(ra), Some(decl)) = (
            self.pool.lookup(Slot::RaJ2000(body)),
            self.pool.lookup(Slot::DeclJ2000(body)),
        ) {
            return Some((ra, decl));
        }
        let instant = self.instant;
        let (t, _) = julian_centuries_since_2000(self.pool, instant);
        let pos = body_position(self.provider, self.pool, instant, body, Precision::Full);
        let (ra, decl) = precession::of_date_to_j2000(t, pos.right_ascension, pos.declination);
        self.pool.store(Slot::RaJ2000(body), ra);
        self.pool.store(Slot::DeclJ2000(body), decl);
        Some((ra, decl))
    }

    pub fn right_ascension_j2000(&mut self, body: Body) -> Option<Radian> {
        self.position_j2000(body).map(|(ra, _)| ra)
    }

    pub fn declination_j2000(&mut self, body: Body) -> Option<Radian> {
        self.position_j2000(body).map(|(_, decl)| decl)
    }

    /// Parallax-corrected altitude above the horizon.
    pub fn altitude(&mut self, body: Body) -> Option<Radian> {
        if body == Body::Earth {
            return None;
        }
        let instant = self.instant;
        let (lat, lon) = (self.latitude, self.longitude);
        Some(body_alt_az(self.provider, self.pool, instant, body, lat, lon, true).0)
    }

    /// Parallax-corrected azimuth (0 = north, measured through east).
    pub fn azimuth(&mut self, body: Body) -> Option<Radian> {
        if body == Body::Earth {
            return None;
        }
        let instant = self.instant;
        let (lat, lon) = (self.latitude, self.longitude);
        Some(body_alt_az(self.provider, self.pool, instant, body, lat, lon, true).1)
    }

    /// Altitude at an arbitrary instant, evaluated in a trial scope without
    /// disturbing the session's cached state.
    pub fn altitude_at(&mut self, body: Body, at: Timestamp) -> Option<Radian> {
        self.alt_az_at(body, at).map(|(alt, _)| alt)
    }

    pub fn azimuth_at(&mut self, body: Body, at: Timestamp) -> Option<Radian> {
        self.alt_az_at(body, at).map(|(_, az)| az)
    }

    fn alt_az_at(&mut self, body: Body, at: Timestamp) -> Option<(Radian, Radian)> {
        if body == Body::Earth {
            return None;
        }
        let (lat, lon) = (self.latitude, self.longitude);
        let previous = self.pool.push_scope(ScopeId::Refinement, at, 0.0);
        let result = body_alt_az(self.provider, self.pool, at, body, lat, lon, true);
        self.pool.pop_scope(previous);
        Some(result)
    }

    /// Whether the body is up: past its calculated rise and before its
    /// calculated set (refraction and semidiameter included).
    pub fn is_up(&mut self, body: Body) -> Option<bool> {
        if body == Body::Earth {
            return None;
        }
        if !self.location_valid {
            return Some(false);
        }
        if let Some(v) = self.pool.lookup(Slot::IsUp(body)) {
            return Some(v != 0.0);
        }
        let instant = self.instant;
        let (lat, lon) = (self.latitude, self.longitude);
        let altitude = body_alt_az(self.provider, self.pool, instant, body, lat, lon, true).0;
        let threshold = position::altitude_at_rise_set(
            self.provider,
            self.pool,
            instant,
            body,
            false,
            Precision::Full,
        );
        let is_up = altitude > threshold;
        self.pool.store(Slot::IsUp(body), if is_up { 1.0 } else { 0.0 });
        Some(is_up)
    }

    /// Apparent ecliptic longitude of date.
    pub fn ecliptic_longitude(&mut self, body: Body) -> Option<Radian> {
        if body == Body::Earth {
            return None;
        }
        let instant = self.instant;
        Some(body_position(self.provider, self.pool, instant, body, Precision::Full).ecliptic_longitude)
    }

    pub fn ecliptic_latitude(&mut self, body: Body) -> Option<Radian> {
        if body == Body::Earth {
            return None;
        }
        let instant = self.instant;
        Some(body_position(self.provider, self.pool, instant, body, Precision::Full).ecliptic_latitude)
    }

    /// Geocentric distance in AU.
    pub fn geocentric_distance(&mut self, body: Body) -> Option<f64> {
        if body == Body::Earth {
            return None;
        }
        let instant = self.instant;
        Some(body_position(self.provider, self.pool, instant, body, Precision::Full).distance)
    }

    /// Apparent angular diameter.
    pub fn apparent_diameter(&mut self, body: Body) -> Option<Radian> {
        let distance = self.geocentric_distance(body)?;
        Some(2.0 * (body.radius_au() / distance).atan())
    }

    fn heliocentric_state(&mut self, body: Body) -> Option<crate::series::Heliocentric> {
        if !body.has_heliocentric_orbit() || !self.location_valid {
            return None;
        }
        if let (Some(lon), Some(lat), Some(radius)) = (
            self.pool.lookup(Slot::HeliocentricLongitude(body)),
            self.pool.lookup(Slot::HeliocentricLatitude(body)),
            self.pool.lookup(Slot::HeliocentricRadius(body)),
        ) {
            return Some(crate::series::Heliocentric {
                longitude: lon,
                latitude: lat,
                radius,
            });
        }
        let instant = self.instant;
        let (t, _) = julian_centuries_since_2000(self.pool, instant);
        let h = self.provider.heliocentric(body, t);
        self.pool.store(Slot::HeliocentricLongitude(body), h.longitude);
        self.pool.store(Slot::HeliocentricLatitude(body), h.latitude);
        self.pool.store(Slot::HeliocentricRadius(body), h.radius);
        Some(h)
    }

    pub fn heliocentric_longitude(&mut self, body: Body) -> Option<Radian> {
        self.heliocentric_state(body).map(|h| h.longitude)
    }

    pub fn heliocentric_latitude(&mut self, body: Body) -> Option<Radian> {
        self.heliocentric_state(body).map(|h| h.latitude)
    }

    pub fn heliocentric_radius(&mut self, body: Body) -> Option<f64> {
        self.heliocentric_state(body).map(|h| h.radius)
    }

    /// Local sidereal time, shaped as an instant: the prior UT midnight plus
    /// the sidereal seconds of day.
    pub fn local_sidereal_time(&mut self) -> Timestamp {
        let instant = self.instant;
        let longitude = self.longitude;
        sidereal::local_sidereal_time(self.pool, instant, longitude)
    }

    /// Amount the sidereal coordinate system has rotated since the equinox:
    /// the vernal-equinox dial angle.
    pub fn vernal_equinox_angle(&mut self) -> Radian {
        if let Some(v) = self.pool.lookup(Slot::VernalEquinox) {
            return v;
        }
        let instant = self.instant;
        let angle = sidereal::st_difference(self.pool, instant);
        self.pool.store(Slot::VernalEquinox, angle)
    }

    /// Accumulated general precession since J2000.
    pub fn precession(&mut self) -> Radian {
        if let Some(v) = self.pool.lookup(Slot::Precession) {
            return v;
        }
        let instant = self.instant;
        let (t, _) = julian_centuries_since_2000(self.pool, instant);
        self.pool
            .store(Slot::Precession, precession::general_precession_since_j2000(t))
    }

    // ---------------------------------------------------------------------------------------------
    // Equation of time, seasons, meridian indicators
    // ---------------------------------------------------------------------------------------------

    /// Equation of time in seconds (apparent minus mean solar time).
    ///
    /// Evaluated at the UT whose value is UT+EOT rather than at UT itself;
    /// the error is below roughly a second and inherited from the dial this
    /// feeds.
    pub fn eot_seconds(&mut self) -> f64 {
        if let Some(v) = self.pool.lookup(Slot::EotForDay) {
            return v;
        }
        let instant = self.instant;
        let noon = noon_ut(instant);
        let seconds_from_noon = instant - noon;
        // One hour past UT noon puts the mean sun one hour west.
        let longitude_of_mean_sun = -seconds_from_noon * PI / (12.0 * 3600.0);
        let sun = body_position(self.provider, self.pool, instant, Body::Sun, Precision::Full);
        // The Sun's RA is the apparent sidereal time of its meridian; shift
        // to Greenwich and solve back to UT for actual solar noon there.
        let gast = sun.right_ascension - longitude_of_mean_sun;
        let ut = sidereal::gst_to_ut_closest(self.pool, gast, instant);
        self.pool.store(Slot::EotForDay, instant - ut)
    }

    /// Equation of time as a 24-hour dial angle.
    pub fn eot_angle(&mut self) -> Radian {
        self.eot_seconds() / SECONDS_PER_DIAL_RADIAN
    }

    /// True in the summer half of the year for this hemisphere (the equator
    /// counts as northern).
    pub fn summer(&mut self) -> bool {
        self.body_is_summer(Body::Sun).unwrap_or(false)
    }

    /// True when `body` is on the same side of the celestial equator as the
    /// observer.
    pub fn body_is_summer(&mut self, body: Body) -> Option<bool> {
        if body == Body::Earth {
            return None;
        }
        let instant = self.instant;
        let decl = body_position(self.provider, self.pool, instant, body, Precision::Full).declination;
        Some((decl >= 0.0) == (self.latitude >= 0.0))
    }

    /// Stand-in instant for a day with no rise/set: the meridian moment the
    /// season makes interesting (solar midnight in summer, noon in winter,
    /// EOT- and longitude-corrected for the Sun).
    pub fn meridian_time_for_season(&mut self, body: Body) -> Option<Timestamp> {
        if body == Body::Earth {
            return None;
        }
        if let Some(v) = self.pool.lookup(Slot::MeridianTime(body)) {
            return Some(v);
        }
        let midnight = self.local_midnight();
        let meridian_time = if body == Body::Sun {
            let eot = self.eot_seconds();
            let longitude_offset = self.longitude * SECONDS_PER_DIAL_RADIAN;
            let mut offset = self.tz_offset - longitude_offset - eot;
            if self.summer() {
                if offset < 0.0 {
                    offset += SECONDS_PER_DAY;
                }
            } else {
                offset += 12.0 * 3600.0;
            }
            midnight + offset
        } else {
            let offset = if self.body_is_summer(body) == Some(true) {
                12.0 * 3600.0
            } else {
                0.0
            };
            midnight + offset
        };
        self.pool.store(Slot::MeridianTime(body), meridian_time);
        Some(meridian_time)
    }

    /// How far the vernal equinox has drifted against the ideal tropical
    /// year, anchored to the Sun's longitude on this calendar day in 2001.
    pub fn calendar_error_vs_tropical_year(&mut self) -> Radian {
        if let Some(v) = self.pool.lookup(Slot::CalendarError) {
            return v;
        }
        let instant = self.instant;
        let todays_longitude = position::sun_ecliptic_longitude(self.provider, self.pool, instant);
        let mut c = utc_components(instant);
        c.year = 2001;
        if c.month == 2 && c.day == 29 {
            c.day = 28; // the reference year has no leap day
        }
        let this_day_2000 = instant_from_utc(&c);
        let previous = self.pool.push_scope(ScopeId::Year2000, this_day_2000, ASTRO_SLOP);
        let year2000_longitude =
            position::sun_ecliptic_longitude(self.provider, self.pool, this_day_2000);
        self.pool.pop_scope(previous);
        self.pool
            .store(Slot::CalendarError, year2000_longitude - todays_longitude)
    }

    /// Instant when the Sun's ecliptic longitude is closest to the given
    /// quarter point: the solstice/equinox wheel.
    pub fn closest_season_mark(&mut self, mark: SeasonMark) -> Timestamp {
        if let Some(v) = self.pool.lookup(Slot::ClosestSunLongitude(mark)) {
            return v;
        }
        let closest = self.refine_closest_sun_longitude(mark);
        self.pool.store(Slot::ClosestSunLongitude(mark), closest)
    }

    /// 366-day dial angle for the closest season-mark instant.
    pub fn closest_season_mark_indicator_angle(&mut self, mark: SeasonMark) -> Radian {
        if let Some(v) = self.pool.lookup(Slot::ClosestSunLongitudeAngle(mark)) {
            return v;
        }
        let target_time = self.refine_closest_sun_longitude(mark);
        let c = local_components(target_time, self.tz_offset);
        let day_fraction = (c.hour as f64 * 3600.0 + c.minute as f64 * 60.0 + c.seconds)
            / SECONDS_PER_DAY;
        let fraction =
            ((day_of_year(c.year, c.month, c.day) - 1) as f64 + day_fraction) / 366.0;
        self.pool
            .store(Slot::ClosestSunLongitudeAngle(mark), fraction * DPI)
    }

    fn time_of_closest_sun_longitude(&mut self, target: Radian, try_date: Timestamp) -> Timestamp {
        let longitude = position::sun_ecliptic_longitude(self.provider, self.pool, try_date);
        let how_far_away = target - longitude;
        let delta = if how_far_away >= 0.0 {
            if how_far_away >= PI {
                how_far_away - DPI
            } else {
                how_far_away
            }
        } else if how_far_away >= -PI {
            how_far_away
        } else {
            how_far_away + DPI
        };
        try_date + delta * TROPICAL_YEAR_SECONDS / DPI
    }

    fn refine_closest_sun_longitude(&mut self, mark: SeasonMark) -> Timestamp {
        let target = mark.longitude();
        let instant = self.instant;
        let mut try_date = self.time_of_closest_sun_longitude(target, instant);
        for _ in 0..3 {
            let previous = self.pool.push_scope(ScopeId::Refinement, try_date, 0.0);
            try_date = self.time_of_closest_sun_longitude(target, try_date);
            self.pool.pop_scope(previous);
        }
        try_date
    }

    // ---------------------------------------------------------------------------------------------
    // Moon age, phases, quarters
    // ---------------------------------------------------------------------------------------------

    /// The moon-age angle: one revolution per synodic month, measured as the
    /// Moon−Sun difference in apparent ecliptic longitude.
    ///
    /// This is the convention the terminator dial is built on. The companion
    /// value from [`Session::moon_phase_fraction`] is the dial's historical
    /// `(1 − cos age)/2`, which is *not* the illuminated fraction; both are
    /// kept exactly as the dial expects them.
    pub fn moon_age_angle(&mut self) -> Radian {
        let instant = self.instant;
        moon_age(self.provider, self.pool, instant).0
    }

    /// The dial's companion phase value, `(1 − cos age)/2`. See
    /// [`Session::moon_age_angle`].
    pub fn moon_phase_fraction(&mut self) -> f64 {
        let instant = self.instant;
        moon_age(self.provider, self.pool, instant).1
    }

    /// The moon-age angle at an arbitrary instant, evaluated in a trial
    /// scope.
    pub fn moon_age_angle_at(&mut self, at: Timestamp) -> Radian {
        let previous = self.pool.push_scope(ScopeId::Refinement, at, 0.0);
        let (age, _) = moon_age(self.provider, self.pool, at);
        self.pool.pop_scope(previous);
        age
    }

    /// Phase name for display.
    pub fn moon_phase_name(&mut self) -> &'static str {
        let age = self.moon_age_angle() * 180.0 / PI;
        if age >= 359.0 || age <= 1.0 {
            "New"
        } else if age < 89.0 {
            "Waxing Crescent"
        } else if age <= 91.0 {
            "1st Quarter"
        } else if age < 179.0 {
            "Waxing Gibbous"
        } else if age <= 181.0 {
            "Full"
        } else if age < 269.0 {
            "Waning Gibbous"
        } else if age <= 271.0 {
            "3rd Quarter"
        } else {
            "Waning Crescent"
        }
    }

    /// Days since new moon, by locating the actual preceding new moon.
    pub fn real_moon_age_days(&mut self) -> f64 {
        if let Some(v) = self.pool.lookup(Slot::RealMoonAge) {
            return v;
        }
        let instant = self.instant;
        let (mut age, _) = moon_age(self.provider, self.pool, instant);
        if age > DPI - 0.0001 {
            age = 0.0;
        }
        let guess = instant - LUNAR_CYCLE_SECONDS * age / DPI;
        let new_moon = self.refine_moon_age_target(guess, 0.0);
        self.pool
            .store(Slot::RealMoonAge, (instant - new_moon) / SECONDS_PER_DAY)
    }

    /// The next principal phase boundary (new, first quarter, full or third
    /// quarter), honoring the direction of time.
    pub fn next_moon_phase(&mut self) -> Timestamp {
        self.next_prev_moon_phase(true)
    }

    pub fn prev_moon_phase(&mut self) -> Timestamp {
        self.next_prev_moon_phase(false)
    }

    fn next_prev_moon_phase(&mut self, next_not_prev: bool) -> Timestamp {
        let slot = if next_not_prev {
            Slot::NextMoonPhase
        } else {
            Slot::PrevMoonPhase
        };
        if let Some(v) = self.pool.lookup(slot) {
            return v;
        }
        let instant = self.instant;
        let (age, _) = moon_age(self.provider, self.pool, instant);
        let backward = self.running_backward ^ !next_not_prev;
        let fudge = if backward { -0.01 } else { 0.01 };
        let age_since_quarter = (age + fudge) % FRAC_PI_2;
        let age_at_last_quarter = age + fudge - age_since_quarter;
        let mut target = if backward {
            age_at_last_quarter
        } else {
            age_at_last_quarter + FRAC_PI_2
        };
        if target > 15.0 / 8.0 * PI {
            target -= DPI;
        }
        let result = self.refine_moon_age_target(instant, target);
        self.pool.store(slot, result)
    }

    /// The principal phase instant closest to now (either side).
    pub fn closest_quarter(&mut self, quarter: Quarter) -> Timestamp {
        if let Some(v) = self.pool.lookup(Slot::ClosestQuarter(quarter)) {
            return v;
        }
        let result = self.closest_quarter_angle(quarter.angle());
        self.pool.store(Slot::ClosestQuarter(quarter), result)
    }

    /// The next principal phase instant (previous when time runs backward).
    pub fn next_quarter(&mut self, quarter: Quarter) -> Timestamp {
        if let Some(v) = self.pool.lookup(Slot::NextQuarter(quarter)) {
            return v;
        }
        let instant = self.instant;
        let (mut age, _) = moon_age(self.provider, self.pool, instant);
        if self.running_backward {
            age -= 0.01; // in case we're right on the same quarter
        } else {
            age += 0.01;
        }
        let age_since_quarter = (age - quarter.angle()) % DPI;
        let guess = if self.running_backward {
            instant - LUNAR_CYCLE_SECONDS * age_since_quarter / DPI
        } else {
            instant + LUNAR_CYCLE_SECONDS * (DPI - age_since_quarter) / DPI
        };
        let result = self.refine_moon_age_target(guess, quarter.angle());
        self.pool.store(Slot::NextQuarter(quarter), result)
    }

    pub fn closest_new_moon(&mut self) -> Timestamp {
        self.closest_quarter(Quarter::New)
    }

    pub fn closest_full_moon(&mut self) -> Timestamp {
        self.closest_quarter(Quarter::Full)
    }

    pub fn closest_first_quarter(&mut self) -> Timestamp {
        self.closest_quarter(Quarter::FirstQuarter)
    }

    pub fn closest_third_quarter(&mut self) -> Timestamp {
        self.closest_quarter(Quarter::ThirdQuarter)
    }

    pub fn next_new_moon(&mut self) -> Timestamp {
        self.next_quarter(Quarter::New)
    }

    pub fn next_full_moon(&mut self) -> Timestamp {
        self.next_quarter(Quarter::Full)
    }

    pub fn next_first_quarter(&mut self) -> Timestamp {
        self.next_quarter(Quarter::FirstQuarter)
    }

    pub fn next_third_quarter(&mut self) -> Timestamp {
        self.next_quarter(Quarter::ThirdQuarter)
    }

    /// Quarter search from an arbitrary start, in either direction.
    pub fn quarter_from(&mut self, quarter: Quarter, from: Timestamp, next_not_prev: bool) -> Timestamp {
        let previous = self.pool.push_scope(ScopeId::Refinement, from, 0.0);
        let (mut age, _) = moon_age(self.provider, self.pool, from);
        self.pool.pop_scope(previous);
        if next_not_prev {
            age += 0.01;
        } else {
            age -= 0.01;
        }
        let age_since_quarter = (age - quarter.angle()) % DPI;
        let guess = if self.running_backward == next_not_prev {
            from - LUNAR_CYCLE_SECONDS * age_since_quarter / DPI
        } else {
            from + LUNAR_CYCLE_SECONDS * (DPI - age_since_quarter) / DPI
        };
        self.refine_moon_age_target(guess, quarter.angle())
    }

    fn closest_quarter_angle(&mut self, quarter_angle: Radian) -> Timestamp {
        let instant = self.instant;
        let (age, _) = moon_age(self.provider, self.pool, instant);
        let age_since_quarter = (age - quarter_angle) % DPI;
        let closest_is_back = if self.running_backward {
            age_since_quarter < PI + 0.01
        } else {
            age_since_quarter < PI - 0.01
        };
        let guess = if closest_is_back {
            instant - LUNAR_CYCLE_SECONDS * age_since_quarter / DPI
        } else {
            instant + LUNAR_CYCLE_SECONDS * (DPI - age_since_quarter) / DPI
        };
        self.refine_moon_age_target(guess, quarter_angle)
    }

    /// Fixed-point search for the instant where the moon-age angle hits
    /// `target`. Five linear steps at one cycle per revolution; converges to
    /// 0.1 s in two or three.
    fn refine_moon_age_target(&mut self, start: Timestamp, target: Radian) -> Timestamp {
        let mut try_date = start;
        for _ in 0..5 {
            let previous = self.pool.push_scope(ScopeId::Refinement, try_date, 0.0);
            let (age, _) = moon_age(self.provider, self.pool, try_date);
            self.pool.pop_scope(previous);
            let mut delta_age = target - age;
            if delta_age > PI {
                delta_age -= DPI;
            } else if delta_age < -PI {
                delta_age += DPI;
            }
            let new_date = try_date + delta_age / DPI * LUNAR_CYCLE_SECONDS;
            if (new_date - try_date).abs() < 0.1 {
                return new_date;
            }
            try_date = new_date;
        }
        try_date
    }

    // ---------------------------------------------------------------------------------------------
    // Moon and planet orientation angles
    // ---------------------------------------------------------------------------------------------

    /// Rotation of the Moon's terminator relative to celestial north.
    pub fn moon_position_angle(&mut self) -> Radian {
        if let Some(v) = self.pool.lookup(Slot::MoonPositionAngle) {
            return v;
        }
        let instant = self.instant;
        let sun = body_position(self.provider, self.pool, instant, Body::Sun, Precision::Full);
        let moon = body_position(self.provider, self.pool, instant, Body::Moon, Precision::Full);
        let angle = position_angle(
            sun.right_ascension,
            sun.declination,
            moon.right_ascension,
            moon.declination,
        );
        self.pool.store(Slot::MoonPositionAngle, angle)
    }

    /// Rotation of the terminator as it appears in the sky from here.
    pub fn moon_relative_position_angle(&mut self) -> Radian {
        if let Some(v) = self.pool.lookup(Slot::MoonRelativePositionAngle) {
            return v;
        }
        let instant = self.instant;
        let sun = body_position(self.provider, self.pool, instant, Body::Sun, Precision::Full);
        let moon = body_position(self.provider, self.pool, instant, Body::Moon, Precision::Full);
        let mut pos_angle = position_angle(
            sun.right_ascension,
            sun.declination,
            moon.right_ascension,
            moon.declination,
        );
        let (age, _) = moon_age(self.provider, self.pool, instant);
        if age > PI {
            // bright limb on the left: the sense reverses by 180°
            if pos_angle > PI {
                pos_angle -= PI;
            } else {
                pos_angle += PI;
            }
        }
        let angle = self.sky_relative_angle(moon.right_ascension, moon.declination, pos_angle, true);
        self.pool.store(Slot::MoonRelativePositionAngle, angle)
    }

    /// Rotation of the Moon's *image* (its polar axis) as it appears in the
    /// sky: position angle of axis per Meeus p. 373, physical librations
    /// ignored.
    pub fn moon_relative_angle(&mut self) -> Radian {
        if let Some(v) = self.pool.lookup(Slot::MoonRelativeAngle) {
            return v;
        }
        let instant = self.instant;
        let moon = body_position(self.provider, self.pool, instant, Body::Moon, Precision::Full);
        let gst = sidereal::gst_for_instant(self.pool, instant);
        let lst = sidereal::gst_to_lst(gst, self.longitude);
        let hour_angle = lst - moon.right_ascension;
        let sin_alt = moon.declination.sin() * self.latitude.sin()
            + moon.declination.cos() * self.latitude.cos() * hour_angle.cos();
        let azimuth = (-moon.declination.cos() * self.latitude.cos() * hour_angle.sin())
            .atan2(moon.declination.sin() - self.latitude.sin() * sin_alt);
        let north = north_angle(sin_alt.asin(), azimuth, self.latitude);

        // Approximate geocentric ecliptic position from the equatorial one.
        let apparent_longitude = moon.right_ascension - gst;
        let apparent_latitude = moon.declination;
        let (t, _) = julian_centuries_since_2000(self.pool, instant);
        let obliquity = precession::general_obliquity(t);
        let node = position::moon_ascending_node_longitude(self.provider, self.pool, instant);
        let w = apparent_longitude - node;
        let b = (-w.sin() * apparent_latitude.cos() * SIN_MOON_EQUATOR_ECLIPTIC_ANGLE
            - apparent_latitude.sin() * COS_MOON_EQUATOR_ECLIPTIC_ANGLE)
            .asin();
        let v = node;
        let x = SIN_MOON_EQUATOR_ECLIPTIC_ANGLE * v.sin();
        let y = SIN_MOON_EQUATOR_ECLIPTIC_ANGLE * v.cos() * obliquity.cos()
            - COS_MOON_EQUATOR_ECLIPTIC_ANGLE * obliquity.sin();
        let omega = x.atan2(y);
        let sin_p = (x * x + y * y).sqrt() * (moon.right_ascension - omega).cos() / b.cos();
        let pos_angle = sin_p.asin();
        let angle = normalize_radians(-north - pos_angle);
        self.pool.store(Slot::MoonRelativeAngle, angle)
    }

    /// Shared "as seen in the sky" rotation: north angle plus position
    /// angle, with the dial's quarter-turn offset when requested.
    fn sky_relative_angle(
        &mut self,
        ra: Radian,
        decl: Radian,
        pos_angle: Radian,
        quarter_turn: bool,
    ) -> Radian {
        let instant = self.instant;
        let gst = sidereal::gst_for_instant(self.pool, instant);
        let lst = sidereal::gst_to_lst(gst, self.longitude);
        let hour_angle = lst - ra;
        let sin_alt = decl.sin() * self.latitude.sin()
            + decl.cos() * self.latitude.cos() * hour_angle.cos();
        let azimuth = (-decl.cos() * self.latitude.cos() * hour_angle.sin())
            .atan2(decl.sin() - self.latitude.sin() * sin_alt);
        let north = north_angle(sin_alt.asin(), azimuth, self.latitude);
        let offset = if quarter_turn { FRAC_PI_2 } else { 0.0 };
        normalize_radians(-north - pos_angle - offset)
    }

    /// Phase geometry of a planet: true phase angle plus the dial-convention
    /// age angles, signed by the relative heliocentric longitudes.
    pub fn planet_age(&mut self, body: Body) -> Option<PlanetAge> {
        if !body.is_planet() {
            return None;
        }
        let r = self.heliocentric_radius(body)?;
        let delta = self.geocentric_distance(body)?;
        let big_r = self.heliocentric_radius(Body::Earth)?;
        // Angles of the Sun-planet-Earth triangle from its side lengths.
        let cos_phase = (r * r + delta * delta - big_r * big_r) / (2.0 * r * delta);
        let phase = cos_phase.clamp(-1.0, 1.0).acos();
        // The terminator dial wants a Moon-style age; the complement of the
        // phase plays that role (the planet-Sun-Earth angle is tiny).
        let mut dial_age = PI - phase;
        let cos_age = (big_r * big_r + delta * delta - r * r) / (2.0 * delta * big_r);
        let mut age = cos_age.clamp(-1.0, 1.0).acos();
        // The triangle only gives magnitudes; the relative heliocentric
        // longitudes supply the sign.
        let mut delta_heliocentric =
            self.heliocentric_longitude(body)? - self.heliocentric_longitude(Body::Earth)?;
        if delta_heliocentric < 0.0 {
            delta_heliocentric += DPI;
        }
        if delta_heliocentric > PI {
            age = DPI - age;
            dial_age = DPI - dial_age;
        }
        Some(PlanetAge {
            age,
            dial_age,
            phase,
        })
    }

    /// The Moon-convention age angle for a planet's terminator dial.
    pub fn planet_moon_age_angle(&mut self, body: Body) -> Option<Radian> {
        self.planet_age(body).map(|a| a.dial_age)
    }

    /// Rotation of a planet's terminator relative to celestial north.
    pub fn planet_position_angle(&mut self, body: Body) -> Option<Radian> {
        if !body.is_planet() {
            return None;
        }
        let instant = self.instant;
        let sun = body_position(self.provider, self.pool, instant, Body::Sun, Precision::Full);
        let planet = body_position(self.provider, self.pool, instant, body, Precision::Full);
        Some(position_angle(
            sun.right_ascension,
            sun.declination,
            planet.right_ascension,
            planet.declination,
        ))
    }

    /// Rotation of a planet's terminator as it appears in the sky.
    pub fn planet_relative_position_angle(&mut self, body: Body) -> Option<Radian> {
        if !body.is_planet() {
            return None;
        }
        let instant = self.instant;
        let sun = body_position(self.provider, self.pool, instant, Body::Sun, Precision::Full);
        let planet = body_position(self.provider, self.pool, instant, body, Precision::Full);
        let mut pos_angle = position_angle(
            sun.right_ascension,
            sun.declination,
            planet.right_ascension,
            planet.declination,
        );
        let dial_age = self.planet_age(body)?.dial_age;
        if dial_age > PI {
            if pos_angle > PI {
                pos_angle -= PI;
            } else {
                pos_angle += PI;
            }
        }
        Some(self.sky_relative_angle(
            planet.right_ascension,
            planet.declination,
            pos_angle,
            true,
        ))
    }

    // ---------------------------------------------------------------------------------------------
    // Moon ascending node
    // ---------------------------------------------------------------------------------------------

    pub fn moon_ascending_node_longitude(&mut self) -> Radian {
        let instant = self.instant;
        position::moon_ascending_node_longitude(self.provider, self.pool, instant)
    }

    /// RA/Decl of date of the ascending node (a point on the ecliptic).
    pub fn moon_ascending_node_equatorial(&mut self) -> (Radian, Radian) {
        if let (Some(ra), Some(decl)) = (
            self.pool.lookup(Slot::AscendingNodeRa),
            self.pool.lookup(Slot::AscendingNodeDecl),
        ) {
            return (ra, decl);
        }
        let instant = self.instant;
        let node = position::moon_ascending_node_longitude(self.provider, self.pool, instant);
        let (_, obliquity) = position::nutation_obliquity(self.provider, self.pool, instant);
        let (ra, decl) = ecliptic_point_to_equatorial(node, obliquity);
        self.pool.store(Slot::AscendingNodeRa, ra);
        self.pool.store(Slot::AscendingNodeDecl, decl);
        (ra, decl)
    }

    pub fn moon_ascending_node_ra(&mut self) -> Radian {
        self.moon_ascending_node_equatorial().0
    }

    /// J2000-frame RA/Decl of the ascending node.
    pub fn moon_ascending_node_equatorial_j2000(&mut self) -> (Radian, Radian) {
        if let (Some(ra), Some(decl)) = (
            self.pool.lookup(Slot::AscendingNodeRaJ2000),
            self.pool.lookup(Slot::AscendingNodeDeclJ2000),
        ) {
            return (ra, decl);
        }
        let instant = self.instant;
        let node = position::moon_ascending_node_longitude(self.provider, self.pool, instant);
        let (_, obliquity) = position::nutation_obliquity(self.provider, self.pool, instant);
        let (ra_of_date, decl_of_date) = ecliptic_point_to_equatorial(node, obliquity);
        let (t, _) = julian_centuries_since_2000(self.pool, instant);
        let (ra, decl) = precession::of_date_to_j2000(t, ra_of_date, decl_of_date);
        self.pool.store(Slot::AscendingNodeRaJ2000, ra);
        self.pool.store(Slot::AscendingNodeDeclJ2000, decl);
        (ra, decl)
    }

    pub fn moon_ascending_node_ra_j2000(&mut self) -> Radian {
        self.moon_ascending_node_equatorial_j2000().0
    }

    // ---------------------------------------------------------------------------------------------
    // Eclipses
    // ---------------------------------------------------------------------------------------------

    /// Eclipse classification at the bound instant.
    pub fn eclipse_kind(&mut self) -> EclipseKind {
        self.calculate_eclipse().kind
    }

    /// Sun–Moon (or shadow–Moon) separation on the dial's abstract 0..3
    /// scale: partial eclipse starts at 2, total at 1. Zero does not mean
    /// zero separation.
    pub fn eclipse_abstract_separation(&mut self) -> f64 {
        self.calculate_eclipse().abstract_separation
    }

    pub fn eclipse_angular_separation(&mut self) -> Radian {
        self.calculate_eclipse().angular_separation
    }

    /// Angular diameter of the umbra at the Moon's distance (lunar
    /// geometry; zero for the solar case).
    pub fn eclipse_shadow_angular_size(&mut self) -> Radian {
        self.calculate_eclipse().shadow_angular_size
    }

    fn calculate_eclipse(&mut self) -> EclipseData {
        if let (Some(sep), Some(kind)) = (
            self.pool.lookup(Slot::EclipseAbstractSeparation),
            self.pool.lookup(Slot::EclipseKind),
        ) {
            return EclipseData {
                abstract_separation: sep,
                angular_separation: self.pool.lookup(Slot::EclipseAngularSeparation).unwrap_or(0.0),
                shadow_angular_size: self
                    .pool
                    .lookup(Slot::EclipseShadowAngularSize)
                    .unwrap_or(0.0),
                kind: EclipseKind::from_index(kind.round() as usize),
            };
        }
        let instant = self.instant;
        let gst = sidereal::gst_for_instant(self.pool, instant);
        let lst = sidereal::gst_to_lst(gst, self.longitude);
        let sun = body_position(self.provider, self.pool, instant, Body::Sun, Precision::Full);
        let (sun_angular_size, sun_parallax) = size_and_parallax(Body::Sun, sun.distance);
        let moon = body_position(self.provider, self.pool, instant, Body::Moon, Precision::Full);
        let (moon_angular_size, moon_parallax) = size_and_parallax(Body::Moon, moon.distance);

        let ra_delta = (moon.right_ascension - sun.right_ascension).abs() % DPI;
        let kind;
        let physical_separation;
        let separation_at_partial;
        let separation_at_total;
        let mut shadow_angular_size = 0.0;
        let solar_not_lunar = ra_delta < FRAC_PI_2;
        if solar_not_lunar {
            // Possible solar eclipse: compare topocentric centers.
            let sun_hour_angle = lst - sun.right_ascension;
            let (sun_topo_ha, sun_topo_decl) = topocentric_parallax(
                sun.right_ascension,
                sun.declination,
                sun_hour_angle,
                sun.distance,
                self.latitude,
                0.0,
            );
            let sun_topo_ra = lst - sun_topo_ha;
            let moon_hour_angle = lst - moon.right_ascension;
            let (moon_topo_ha, moon_topo_decl) = topocentric_parallax(
                moon.right_ascension,
                moon.declination,
                moon_hour_angle,
                moon.distance,
                self.latitude,
                0.0,
            );
            let moon_topo_ra = lst - moon_topo_ha;
            physical_separation =
                angular_separation(sun_topo_ra, sun_topo_decl, moon_topo_ra, moon_topo_decl);
            separation_at_partial = sun_angular_size / 2.0 + moon_angular_size / 2.0;
            separation_at_total = moon_angular_size / 2.0 - sun_angular_size / 2.0;
            let separation_at_annular = sun_angular_size / 2.0 - moon_angular_size / 2.0;
            let (lat, lon) = (self.latitude, self.longitude);
            let altitude =
                body_alt_az(self.provider, self.pool, instant, Body::Sun, lat, lon, true).0;
            let alt_at_rise_set = position::altitude_at_rise_set(
                self.provider,
                self.pool,
                instant,
                Body::Sun,
                false,
                Precision::Full,
            );
            kind = if altitude < alt_at_rise_set {
                EclipseKind::SolarNotUp
            } else if physical_separation > separation_at_partial {
                EclipseKind::NoneSolar
            } else if physical_separation < separation_at_annular {
                EclipseKind::AnnularSolar
            } else if physical_separation > separation_at_total {
                EclipseKind::PartialSolar
            } else {
                EclipseKind::TotalSolar
            };
        } else {
            // Possible lunar eclipse: Moon against the umbra.
            shadow_angular_size =
                2.0 * (1.01 * moon_parallax - sun_angular_size / 2.0 + sun_parallax);
            let mut shadow_ra = sun.right_ascension + PI;
            if shadow_ra > DPI {
                shadow_ra -= DPI;
            }
            let shadow_decl = -sun.declination;
            physical_separation = angular_separation(
                shadow_ra,
                shadow_decl,
                moon.right_ascension,
                moon.declination,
            );
            separation_at_partial = moon_angular_size / 2.0 + shadow_angular_size / 2.0;
            separation_at_total = shadow_angular_size / 2.0 - moon_angular_size / 2.0;
            let (lat, lon) = (self.latitude, self.longitude);
            let altitude =
                body_alt_az(self.provider, self.pool, instant, Body::Moon, lat, lon, true).0;
            let alt_at_rise_set = position::altitude_at_rise_set(
                self.provider,
                self.pool,
                instant,
                Body::Moon,
                false,
                Precision::Full,
            );
            kind = if altitude < alt_at_rise_set {
                EclipseKind::LunarNotUp
            } else if physical_separation > separation_at_partial {
                EclipseKind::NoneLunar
            } else if physical_separation > separation_at_total {
                EclipseKind::PartialLunar
            } else {
                EclipseKind::TotalLunar
            };
        }
        // Map the separation to the dial scale: y = 1 at total onset, 2 at
        // partial onset, clamped to [0, 3].
        let mut abstract_separation = 1.0
            + (physical_separation - separation_at_total)
                / (separation_at_partial - separation_at_total);
        let mut kind = kind;
        if abstract_separation < 0.0 {
            abstract_separation = 0.0;
        } else if abstract_separation > 3.0 {
            abstract_separation = 3.0;
            // needle pegged: override a possible not-up
            kind = if solar_not_lunar {
                EclipseKind::NoneSolar
            } else {
                EclipseKind::NoneLunar
            };
        }
        self.pool
            .store(Slot::EclipseAbstractSeparation, abstract_separation);
        self.pool
            .store(Slot::EclipseAngularSeparation, physical_separation);
        self.pool.store(Slot::EclipseKind, kind.to_index() as f64);
        self.pool
            .store(Slot::EclipseShadowAngularSize, shadow_angular_size);
        EclipseData {
            abstract_separation,
            angular_separation: physical_separation,
            shadow_angular_size,
            kind,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Highest ecliptic geometry
    // ---------------------------------------------------------------------------------------------

    pub fn azimuth_of_highest_ecliptic_altitude(&mut self) -> Radian {
        if let Some(v) = self.pool.lookup(Slot::AzimuthOfHighestEcliptic) {
            return v;
        }
        self.calculate_highest_ecliptic();
        self.pool.lookup(Slot::AzimuthOfHighestEcliptic).unwrap_or(0.0)
    }

    pub fn longitude_of_highest_ecliptic_altitude(&mut self) -> Radian {
        if let Some(v) = self.pool.lookup(Slot::LongitudeOfHighestEcliptic) {
            return v;
        }
        self.calculate_highest_ecliptic();
        self.pool
            .lookup(Slot::LongitudeOfHighestEcliptic)
            .unwrap_or(0.0)
    }

    /// Angle the ecliptic makes with the horizon right now.
    pub fn ecliptic_altitude(&mut self) -> Radian {
        if let Some(v) = self.pool.lookup(Slot::EclipticAltitude) {
            return v;
        }
        self.calculate_highest_ecliptic();
        self.pool.lookup(Slot::EclipticAltitude).unwrap_or(0.0)
    }

    /// Ecliptic longitude crossing the north meridian (azimuth zero).
    pub fn longitude_at_north_meridian(&mut self) -> Radian {
        if let Some(v) = self.pool.lookup(Slot::LongitudeOfEclipticMeridian) {
            return v;
        }
        self.calculate_highest_ecliptic();
        self.pool
            .lookup(Slot::LongitudeOfEclipticMeridian)
            .unwrap_or(0.0)
    }

    fn calculate_highest_ecliptic(&mut self) {
        let instant = self.instant;
        let (_, obliquity) = position::nutation_obliquity(self.provider, self.pool, instant);
        let gst = sidereal::gst_for_instant(self.pool, instant);
        let lst = sidereal::gst_to_lst(gst, self.longitude);
        let sin_obliquity = obliquity.sin();
        let cos_obliquity = obliquity.cos();
        let sin_lst = lst.sin();
        let cos_lat = self.latitude.cos();
        let sin_lat = self.latitude.sin();
        // Longitude at the horizon, then a quarter turn toward the zenith.
        let mut ecliptic_longitude =
            (-lst.cos()).atan2(sin_obliquity * self.latitude.tan() + cos_obliquity * sin_lst)
                + FRAC_PI_2; // guess + rather than -
        let sin_eclip_long = ecliptic_longitude.sin();
        let declination = (sin_obliquity * sin_eclip_long).asin();
        let right_ascension = (cos_obliquity * sin_eclip_long).atan2(ecliptic_longitude.cos());
        let hour_angle = lst - right_ascension;
        let sin_alt = declination.sin() * sin_lat + declination.cos() * cos_lat * hour_angle.cos();
        let mut azimuth = (-declination.cos() * cos_lat * hour_angle.sin())
            .atan2(declination.sin() - sin_lat * sin_alt);
        // A negative altitude means the quarter-turn guess was wrong.
        if sin_alt < 0.0 {
            azimuth = (azimuth + PI) % DPI;
            ecliptic_longitude = (ecliptic_longitude + PI) % DPI;
        } else {
            azimuth %= DPI;
            ecliptic_longitude %= DPI;
        }
        if azimuth < 0.0 {
            azimuth += DPI;
        }
        if ecliptic_longitude < 0.0 {
            ecliptic_longitude += DPI;
        }

        // Ecliptic longitude of the north meridian: azimuth zero means the
        // hour angle is 0 or 180, and tan absorbs the distinction.
        let meridian_ra = lst;
        let mut longitude_of_ecliptic_meridian = (meridian_ra.tan() / cos_obliquity).atan();
        let flip_because_of_ra = meridian_ra.cos() > 0.0;
        let flip_because_of_azimuth = if self.latitude > 0.0 {
            azimuth.cos() > 0.0 && self.latitude < PI / 4.0
        } else {
            azimuth.cos() > 0.0 || self.latitude < -PI / 4.0
        };
        if flip_because_of_ra != flip_because_of_azimuth {
            longitude_of_ecliptic_meridian -= PI;
        }
        if longitude_of_ecliptic_meridian < 0.0 {
            longitude_of_ecliptic_meridian += DPI;
        }
        let ecliptic_altitude =
            (cos_obliquity * sin_lat - sin_obliquity * cos_lat * sin_lst).acos();
        self.pool.store(Slot::AzimuthOfHighestEcliptic, azimuth);
        self.pool
            .store(Slot::LongitudeOfHighestEcliptic, ecliptic_longitude);
        self.pool.store(Slot::EclipticAltitude, ecliptic_altitude);
        self.pool.store(
            Slot::LongitudeOfEclipticMeridian,
            longitude_of_ecliptic_meridian,
        );
    }

    // ---------------------------------------------------------------------------------------------
    // 24-hour dial indicators and day/night leaves
    // ---------------------------------------------------------------------------------------------

    /// 24-hour dial angle of an event state; sentinels pass through.
    fn angle_24_hour_for(&mut self, state: HorizonState, base: TimeBase) -> HorizonState {
        let HorizonState::Event(t) = state else {
            return state;
        };
        let angle = match base {
            TimeBase::LocalTime => {
                let c = local_components(t, self.tz_offset);
                (c.hour as f64 + c.minute as f64 / 60.0 + c.seconds / 3600.0) * PI / 12.0
            }
            TimeBase::Ut => {
                let c = utc_components(t);
                (c.hour as f64 + c.minute as f64 / 60.0 + c.seconds / 3600.0) * PI / 12.0
            }
            TimeBase::SiderealTime => {
                let longitude = self.longitude;
                let previous = self.pool.push_scope(ScopeId::Refinement, t, 0.0);
                let lst = sidereal::local_sidereal_time(self.pool, t, longitude);
                self.pool.pop_scope(previous);
                lst / SECONDS_PER_DIAL_RADIAN
            }
        };
        HorizonState::Event(angle)
    }

    /// The day's rise/set/transit geometry on a 24-hour dial, cached per
    /// (body, dial base) when no altitude override is in play.
    fn leaf_master(
        &mut self,
        body: Body,
        override_altitude: Option<Radian>,
        base: TimeBase,
    ) -> LeafMaster {
        debug_assert!(matches!(base, TimeBase::LocalTime | TimeBase::SiderealTime));
        if override_altitude.is_none() {
            if let Some(rise) = self.pool.lookup(Slot::LeafRise(body, base)) {
                return LeafMaster {
                    rise_angle: HorizonState::decode(rise),
                    set_angle: HorizonState::decode(
                        self.pool.lookup(Slot::LeafSet(body, base)).unwrap_or(rise),
                    ),
                    rise_transit_angle: self
                        .pool
                        .lookup(Slot::LeafRiseTransit(body, base))
                        .unwrap_or(0.0),
                    set_transit_angle: self
                        .pool
                        .lookup(Slot::LeafSetTransit(body, base))
                        .unwrap_or(0.0),
                };
            }
        }
        let body_is_up = if let Some(altitude) = override_altitude {
            debug_assert!(body == Body::Sun);
            let instant = self.instant;
            let (lat, lon) = (self.latitude, self.longitude);
            body_alt_az(self.provider, self.pool, instant, body, lat, lon, true).0 > altitude
        } else {
            self.is_up(body).unwrap_or(false)
        };
        let instant = self.instant;
        let rise_method = SolverMethod::RiseSet {
            body,
            rise: true,
            override_altitude,
        };
        let set_method = SolverMethod::RiseSet {
            body,
            rise: false,
            override_altitude,
        };
        let rise_solution = self.solver().next_prev_event(
            instant,
            rise_method,
            -FUDGE_SECONDS,
            !body_is_up,
            LOOKAHEAD_SECONDS,
        );
        let set_solution = self.solver().next_prev_event(
            instant,
            set_method,
            -FUDGE_SECONDS,
            body_is_up,
            LOOKAHEAD_SECONDS,
        );
        let rise_angle = self.angle_24_hour_for(rise_solution.state, base);
        let set_angle = self.angle_24_hour_for(set_solution.state, base);
        let mut rise_transit_angle = self
            .angle_24_hour_for(HorizonState::Event(rise_solution.anchor), base)
            .event_or(0.0);
        if rise_angle == HorizonState::AlwaysAbove {
            // the anchor is the low transit; the dial wants the high one
            rise_transit_angle = (rise_transit_angle + PI) % DPI;
        }
        let mut set_transit_angle = self
            .angle_24_hour_for(HorizonState::Event(set_solution.anchor), base)
            .event_or(0.0);
        if set_angle == HorizonState::AlwaysAbove {
            set_transit_angle = (set_transit_angle + PI) % DPI;
        }
        if override_altitude.is_none() {
            self.pool
                .store(Slot::LeafRise(body, base), rise_angle.encode());
            self.pool.store(Slot::LeafSet(body, base), set_angle.encode());
            self.pool
                .store(Slot::LeafRiseTransit(body, base), rise_transit_angle);
            self.pool
                .store(Slot::LeafSetTransit(body, base), set_transit_angle);
        }
        LeafMaster {
            rise_angle,
            set_angle,
            rise_transit_angle,
            set_transit_angle,
        }
    }

    /// Rise indicator hand: the rise angle when there is one, otherwise the
    /// transit stand-in with the circumpolar direction.
    pub fn rise_indicator_angle(&mut self, body: Body, base: TimeBase) -> IndicatorAngle {
        let master = self.leaf_master(body, None, base);
        match master.rise_angle {
            HorizonState::Event(angle) => IndicatorAngle {
                angle,
                is_rise_set: true,
                above_horizon: None,
            },
            state => IndicatorAngle {
                angle: master.rise_transit_angle,
                is_rise_set: false,
                above_horizon: Some(state == HorizonState::AlwaysAbove),
            },
        }
    }

    pub fn set_indicator_angle(&mut self, body: Body, base: TimeBase) -> IndicatorAngle {
        let master = self.leaf_master(body, None, base);
        match master.set_angle {
            HorizonState::Event(angle) => IndicatorAngle {
                angle,
                is_rise_set: true,
                above_horizon: None,
            },
            state => IndicatorAngle {
                angle: master.set_transit_angle,
                is_rise_set: false,
                above_horizon: Some(state == HorizonState::AlwaysAbove),
            },
        }
    }

    /// High-transit indicator angle. Not cached; the transit solver is
    /// cheap.
    pub fn transit_indicator_angle(&mut self, body: Body, base: TimeBase) -> Radian {
        let instant = self.instant;
        let solution = self.solver().transit_refined(instant, body, true);
        self.angle_24_hour_for(HorizonState::Event(solution.anchor), base)
            .event_or(0.0)
    }

    /// Polar-day state of the Sun (or any body): true when it never sets
    /// today.
    pub fn polar_summer(&mut self, body: Body) -> bool {
        self.polar_flags(body).0
    }

    /// Polar-night state: true when the body never rises today.
    pub fn polar_winter(&mut self, body: Body) -> bool {
        self.polar_flags(body).1
    }

    fn polar_flags(&mut self, body: Body) -> (bool, bool) {
        let master = self.leaf_master(body, None, TimeBase::LocalTime);
        let resolved = resolve_leaf_angles(&master, f64::INFINITY);
        (resolved.polar_summer, resolved.polar_winter)
    }

    /// Center angle for day/night dial leaf `leaf_number` of `num_leaves`,
    /// fanned between today's rise and set angles (or their polar
    /// substitutes).
    pub fn day_night_leaf_angle(
        &mut self,
        body: Body,
        leaf_number: f64,
        num_leaves: i32,
        face: DialFace,
        base: TimeBase,
    ) -> Radian {
        let num_leaves = num_leaves.abs();
        debug_assert!(num_leaves >= 2);
        let master = self.leaf_master(body, None, base);
        let leaf_width = DPI / num_leaves as f64;
        let resolved = resolve_leaf_angles(&master, leaf_width);
        let mut rise_angle = normalize_radians(resolved.rise_angle);
        let mut set_angle = normalize_radians(resolved.set_angle);
        if set_angle <= rise_angle + 0.0001 {
            set_angle += DPI;
        }
        let night = face == DialFace::Night;
        if night {
            set_angle += leaf_width / 2.0;
            rise_angle -= leaf_width / 2.0;
        } else {
            set_angle -= leaf_width / 2.0;
            rise_angle += leaf_width / 2.0;
        }
        if set_angle < rise_angle {
            let mid = (rise_angle + set_angle) / 2.0;
            rise_angle = mid;
            set_angle = mid;
        }
        let mut leaf_center = if night {
            set_angle + (DPI - set_angle + rise_angle) / (num_leaves - 1) as f64 * leaf_number
        } else {
            rise_angle + (set_angle - rise_angle) / (num_leaves - 1) as f64 * leaf_number
        };
        if leaf_center > DPI {
            leaf_center -= DPI;
        }
        leaf_center
    }

    /// Indicator angle for a twilight kind, with its validity.
    ///
    /// For the plain rise/set kinds this is the rise/set indicator. For the
    /// altitude kinds, the dial wants the *matching* twilight of today's
    /// daylight arc, so the search re-anchors at the adjacent sunset (or
    /// sunrise) inside a temporary cache scope and walks back (or forward)
    /// to the crossing.
    pub fn sun_special_indicator_angle(&mut self, kind: TwilightKind) -> (Radian, bool) {
        let (altitude, rise) = kind.altitude_and_direction();
        let Some(altitude) = altitude else {
            let indicator = if rise {
                self.rise_indicator_angle(Body::Sun, TimeBase::LocalTime)
            } else {
                self.set_indicator_angle(Body::Sun, TimeBase::LocalTime)
            };
            return (indicator.angle, indicator.is_rise_set);
        };
        let instant = self.instant;
        let running_backward = self.running_backward;
        let (anchor_solution, crossing) = if rise {
            // Forward to the next sunset (or transit), then back to the
            // rising twilight that began this daylight arc.
            let anchor = self.solver().next_prev_event(
                instant,
                SolverMethod::RiseSet {
                    body: Body::Sun,
                    rise: false,
                    override_altitude: None,
                },
                FUDGE_SECONDS,
                !running_backward,
                LOOKAHEAD_SECONDS,
            );
            let previous = self
                .pool
                .push_scope(ScopeId::Temp, anchor.anchor, ASTRO_SLOP);
            let crossing = self.solver().next_prev_event(
                anchor.anchor,
                SolverMethod::RiseSet {
                    body: Body::Sun,
                    rise: true,
                    override_altitude: Some(altitude),
                },
                FUDGE_SECONDS,
                running_backward,
                LOOKAHEAD_SECONDS,
            );
            self.pool.pop_scope(previous);
            (anchor, crossing)
        } else {
            // Backward to the previous sunrise (or transit), then forward to
            // the setting twilight that ends this daylight arc.
            let anchor = self.solver().next_prev_event(
                instant,
                SolverMethod::RiseSet {
                    body: Body::Sun,
                    rise: true,
                    override_altitude: None,
                },
                FUDGE_SECONDS,
                running_backward,
                LOOKAHEAD_SECONDS,
            );
            let previous = self
                .pool
                .push_scope(ScopeId::Temp, anchor.anchor, ASTRO_SLOP);
            let crossing = self.solver().next_prev_event(
                anchor.anchor,
                SolverMethod::RiseSet {
                    body: Body::Sun,
                    rise: false,
                    override_altitude: Some(altitude),
                },
                FUDGE_SECONDS,
                !running_backward,
                LOOKAHEAD_SECONDS,
            );
            self.pool.pop_scope(previous);
            (anchor, crossing)
        };
        let _ = anchor_solution;
        let valid = crossing.state.is_event();
        let angle = self
            .angle_24_hour_for(HorizonState::Event(crossing.anchor), TimeBase::LocalTime)
            .event_or(0.0);
        (angle, valid)
    }
}

/// Internal eclipse bundle.
struct EclipseData {
    abstract_separation: f64,
    angular_separation: Radian,
    shadow_angular_size: Radian,
    kind: EclipseKind,
}

/// The day's dial geometry for one body: rise/set angles (possibly
/// circumpolar sentinels) plus the transit angles that anchored them.
struct LeafMaster {
    rise_angle: HorizonState,
    set_angle: HorizonState,
    rise_transit_angle: Radian,
    set_transit_angle: Radian,
}

struct ResolvedLeaves {
    rise_angle: Radian,
    set_angle: Radian,
    polar_summer: bool,
    polar_winter: bool,
}

/// Substitute concrete rise/set angles for circumpolar days: a polar-summer
/// day spans the whole dial around the average transit, a polar-winter day
/// collapses to a sliver of one leaf width.
fn resolve_leaf_angles(master: &LeafMaster, leaf_width: f64) -> ResolvedLeaves {
    let mut polar_summer = false;
    let mut polar_winter = false;
    let mut rise_transit = master.rise_transit_angle;
    let mut set_transit = master.set_transit_angle;
    let (rise_angle, set_angle) = match (master.rise_angle, master.set_angle) {
        (HorizonState::Event(rise), HorizonState::Event(set)) => (rise, set),
        (HorizonState::Event(rise), set_state) => {
            if set_state == HorizonState::AlwaysAbove {
                polar_summer = true;
                (rise, rise + DPI)
            } else {
                polar_winter = true;
                (rise, rise + leaf_width)
            }
        }
        (rise_state, HorizonState::Event(set)) => {
            if rise_state == HorizonState::AlwaysAbove {
                polar_summer = true;
                (set - DPI, set)
            } else {
                polar_winter = true;
                (set - leaf_width, set)
            }
        }
        (rise_state, _) => {
            // Neither exists: center on the average transit.
            if set_transit > rise_transit + PI {
                set_transit -= DPI;
            } else if set_transit < rise_transit - PI {
                set_transit -= DPI;
            }
            let avg_transit = (rise_transit + set_transit) / 2.0;
            if rise_state == HorizonState::AlwaysAbove {
                polar_summer = true;
                (avg_transit - PI, avg_transit + PI)
            } else {
                polar_winter = true;
                // a tad bigger so the sliver stays visible
                (
                    avg_transit - leaf_width / 2.0 - 0.00001,
                    avg_transit + leaf_width / 2.0 + 0.00001,
                )
            }
        }
    };
    ResolvedLeaves {
        rise_angle,
        set_angle,
        polar_summer,
        polar_winter,
    }
}

/// RA/Decl of a point on the ecliptic (latitude zero) for a given obliquity.
fn ecliptic_point_to_equatorial(longitude: Radian, obliquity: Radian) -> (Radian, Radian) {
    let sin_decl = obliquity.sin() * longitude.sin();
    let decl = sin_decl.asin();
    let y = longitude.sin() * obliquity.cos();
    let x = longitude.cos();
    let mut ra = y.atan2(x);
    if ra < 0.0 {
        ra += DPI;
    }
    (ra, decl)
}

/// Shared by every moon-phase query: the dial's age angle and its companion
/// "phase" value, cached together.
fn moon_age(
    provider: &dyn SeriesProvider,
    pool: &mut AstroCachePool,
    instant: Timestamp,
) -> (Radian, f64) {
    pool.assert_current_instant(instant);
    if let (Some(age), Some(phase)) = (pool.lookup(Slot::MoonAge), pool.lookup(Slot::MoonPhase)) {
        return (age, phase);
    }
    let moon = body_position(provider, pool, instant, Body::Moon, Precision::Full);
    let sun_longitude = position::sun_ecliptic_longitude(provider, pool, instant);
    let mut age = moon.ecliptic_longitude - sun_longitude;
    if age < 0.0 {
        age += DPI;
    }
    // Historical dial value; not the illuminated fraction.
    let phase = (1.0 - age.cos()) / 2.0;
    pool.store(Slot::MoonAge, age);
    pool.store(Slot::MoonPhase, phase);
    (age, phase)
}

// -------------------------------------------------------------------------------------------------
// Zodiac tables
// -------------------------------------------------------------------------------------------------

/// Ecliptic longitudes of constellation centers, degrees.
static ZODIAC_CENTERS: [f64; 12] = [
    11.0,  // Psc
    42.0,  // Ari
    72.0,  // Tau
    104.0, // Gem
    128.0, // Can
    156.0, // Leo
    196.0, // Vir
    230.0, // Lib
    254.0, // Sco
    283.0, // Sgr
    314.0, // Cap
    340.0, // Aqr
];

/// Ecliptic longitudes of constellation western edges, degrees.
static ZODIAC_EDGES: [f64; 13] = [
    -8.0,  //  0 Psc
    29.0,  //  1 Ari
    54.0,  //  2 Tau
    90.0,  //  3 Gem
    118.0, //  4 Can
    138.0, //  5 Leo
    174.0, //  6 Vir
    218.0, //  7 Lib
    242.0, //  8 Sco, incl Oph
    266.0, //  9 Sgr
    300.0, // 10 Cap
    327.0, // 11 Aqr
    352.0, // 12 Psc
];

static ZODIAC_NAMES: [&str; 12] = [
    "Pisces",
    "Aries",
    "Taurus",
    "Gemini",
    "Cancer",
    "Leo",
    "Virgo",
    "Libra",
    "Scorpius",
    "Sagittarius",
    "Capricornus",
    "Aquarius",
];

/// Center ecliptic longitude of zodiac constellation `n` (0 = Pisces).
pub fn zodiac_constellation_center(n: usize) -> Radian {
    ZODIAC_CENTERS[n] / 360.0 * DPI
}

/// Angular width of zodiac constellation `n`.
pub fn zodiac_constellation_width(n: usize) -> Radian {
    (ZODIAC_EDGES[n] - ZODIAC_EDGES[n + 1]).abs() * DPI / 360.0
}

/// Name of the zodiac constellation containing an ecliptic longitude.
pub fn zodiac_constellation_of(ecliptic_longitude: Radian) -> &'static str {
    for i in 1..13 {
        if ZODIAC_EDGES[i] * RADEG > ecliptic_longitude {
            return ZODIAC_NAMES[i - 1];
        }
    }
    ZODIAC_NAMES[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ObserverClock;
    use crate::time::DateComponents;

    fn instant(year: i32, month: u8, day: u8, hour: u8, minute: u8) -> Timestamp {
        instant_from_utc(&DateComponents {
            year,
            month,
            day,
            hour,
            minute,
            seconds: 0.0,
        })
    }

    fn boston(at: Timestamp) -> ObserverClock {
        ObserverClock::new(at, 42.37 * RADEG, -71.05 * RADEG, -5.0 * 3600.0)
    }

    #[test]
    fn session_lifecycle_releases_pool() {
        let almanac = Almanac::with_builtin_series();
        let mut ctx = CalculationContext::new();
        let at = instant(2010, 6, 1, 12, 0);
        {
            let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
            let _ = session.moon_age_angle();
        }
        // Pool released: a new session binds cleanly.
        let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
        let _ = session.moon_age_angle();
    }

    #[test]
    fn moon_phase_fraction_is_the_dial_convention() {
        let almanac = Almanac::with_builtin_series();
        let mut ctx = CalculationContext::new();
        let mut session = almanac.session(&mut ctx, &boston(instant(2014, 2, 3, 4, 0))).unwrap();
        let age = session.moon_age_angle();
        let phase = session.moon_phase_fraction();
        // The companion value is exactly (1 - cos age)/2, the dial's legacy
        // convention.
        assert_eq!(phase.to_bits(), ((1.0 - age.cos()) / 2.0).to_bits());
    }

    #[test]
    fn zodiac_lookup_matches_edges() {
        assert_eq!(zodiac_constellation_of(0.0), "Pisces");
        assert_eq!(zodiac_constellation_of(40.0 * RADEG), "Aries");
        assert_eq!(zodiac_constellation_of(120.0 * RADEG), "Cancer");
        assert_eq!(zodiac_constellation_of(355.0 * RADEG), "Pisces");
        // Widths are positive and centers inside their constellation.
        for n in 0..12 {
            assert!(zodiac_constellation_width(n) > 0.0);
        }
    }

    #[test]
    fn meridian_time_lands_on_the_local_day() {
        let almanac = Almanac::with_builtin_series();
        let mut ctx = CalculationContext::new();
        let at = instant(2012, 12, 5, 15, 0);
        let mut session = almanac.session(&mut ctx, &boston(at)).unwrap();
        let meridian = session.meridian_time_for_season(Body::Sun).unwrap();
        assert!((meridian - at).abs() < 2.0 * SECONDS_PER_DAY);
    }
}
