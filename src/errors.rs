use thiserror::Error;

use crate::bodies::Body;

/// API-contract failures surfaced by the public surface.
///
/// Numeric edge cases (circumpolar bodies, non-convergence near the poles)
/// never produce an error; they are reported through
/// [`HorizonState`](crate::solver::HorizonState). This type only covers
/// misuse that a caller can fix.
#[derive(Error, Debug)]
pub enum OrreryError {
    #[error("Observer latitude out of range or not finite: {0}")]
    InvalidObserverLatitude(f64),

    #[error("Observer longitude out of range or not finite: {0}")]
    InvalidObserverLongitude(f64),

    #[error("Calculation instant is not finite: {0}")]
    InvalidInstant(f64),

    #[error("Operation is not defined for body {0:?}")]
    UnsupportedBody(Body),

    #[error("Calculation context is already bound by a non-nested session")]
    ContextBusy,
}
