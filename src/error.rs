//! Crate-wide error aggregation
//!
//! Each module owns its own `thiserror::Error` enum (`GeometryError`,
//! `DesignError`); this module centralizes them behind one type so a
//! caller that doesn't care which module failed can match on a single
//! type. The solver itself never raises an error: every failure mode it
//! can hit is reported as `SolveResult { status: Failed, .. }` instead,
//! so there is no `SolverError` variant here.

use thiserror::Error;

use crate::model::DesignError;

/// Crate-wide error, aggregating every module's error type.
#[derive(Debug, Error)]
pub enum PlaidError {
    /// A source plate or design specification was malformed.
    #[error(transparent)]
    Design(#[from] DesignError),
}
