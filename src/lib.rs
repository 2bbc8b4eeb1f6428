//! # orrery
//!
//! A classical ephemeris engine for clock and watch-face applications: given
//! an instant and an observer, it answers "when is the next sunrise", "what
//! is the Moon's age and position angle", "is Venus up", "what kind of
//! eclipse is this" — using Meeus-style perturbation series plus IAU
//! precession/nutation corrections.
//!
//! The moving parts:
//!
//! 1. **Time conversion** ([`time`]) — Julian dates, delta-T, sidereal time
//!    in both directions, of-date ↔ J2000 frame conversion.
//! 2. **Calculation cache** ([`cache`]) — per-instant memoization of every
//!    derived quantity, with nested scopes so iterative solvers can evaluate
//!    trial instants without invalidating the bound instant's state.
//! 3. **Rise/set/transit solver** ([`solver`]) — extrapolation-accelerated
//!    fixed-point iteration with explicit circumpolar handling.
//! 4. **Facade** ([`almanac`]) — [`Almanac`](almanac::Almanac) +
//!    [`Session`](almanac::Session), the full query surface.
//! 5. **Series provider** ([`series`]) — the ephemeris seam, with a
//!    self-contained classical implementation built in.
//!
//! ```no_run
//! use orrery::almanac::{Almanac, CalculationContext};
//! use orrery::bodies::Body;
//! use orrery::env::ObserverClock;
//! use orrery::solver::HorizonState;
//!
//! let almanac = Almanac::with_builtin_series();
//! let mut ctx = CalculationContext::new();
//! // Boston, instants in seconds since 2001-01-01 00:00:00 UTC.
//! let env = ObserverClock::new(2.6e8, 0.7395, -1.2401, -5.0 * 3600.0);
//! let mut session = almanac.session(&mut ctx, &env).unwrap();
//! match session.next_rise(Body::Sun) {
//!     HorizonState::Event(t) => println!("sunrise at {t}"),
//!     HorizonState::AlwaysAbove => println!("midnight sun"),
//!     HorizonState::AlwaysBelow => println!("polar night"),
//!     HorizonState::Invalid => println!("no location"),
//! }
//! ```

pub mod almanac;
pub mod bodies;
pub(crate) mod cache;
pub mod constants;
pub mod env;
pub mod errors;
pub(crate) mod position;
pub mod series;
pub mod solver;
pub mod time;

pub use almanac::{
    Almanac, CalculationContext, DialFace, EclipseKind, Quarter, SeasonMark, Session, TimeBase,
    TwilightKind,
};
pub use bodies::Body;
pub use env::{AstroEnvironment, ObserverClock};
pub use errors::OrreryError;
pub use solver::HorizonState;
pub use time::delta_t::{set_delta_t_model, DeltaTModel};
