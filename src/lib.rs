//! Crate root: public surface and module layout
//!
//! This module is the single canonical entry-point for downstream users of
//! the library. It re-exports the types most callers need (`Design`,
//! `SourcePlate`, `PlateLayout`, `SolveResult`, `Picklist`) and the
//! top-level `solver::solve` / `picklist::generate` operations.
//!
//! ## Invariants
//!
//! - **Determinism.** Given the same `Design`, `SourcePlate`, gene list and
//!   seed, `solver::solve` always returns the same layouts. The crate never
//!   reaches for an unseeded source of randomness.
//! - **No panics on malformed input.** Every constructor that can fail
//!   (`SourcePlate::new`, `Design::is_consistent`) returns a `Result`; the
//!   solver itself never raises an error, converting every failure mode
//!   into `SolveResult { status: Failed, .. }`.
//! - **Edge exclusion.** `edge_empty_layers` outer rings are never assigned
//!   content on any destination plate.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// Plate geometry: dimensions, alphanumeric position encoding.
pub mod geometry;
/// Design model: source plates, controls, per-sample overrides.
pub mod model;
/// Shared destination-layout data model used by the solver, validator and
/// picklist generator.
pub mod layout;
/// Constraint-engine abstraction and the bundled local-search engine.
pub mod cp;
/// The constraint solver: capacity planning, three-tier solve strategy.
pub mod solver;
/// Post-hoc layout validation (adjacency, quadrant balance).
pub mod validator;
/// Acoustic-transfer picklist generation and CSV serialization.
pub mod picklist;
/// Crate-wide error aggregation.
pub mod error;

pub use error::PlaidError;
pub use geometry::PlateKind;
pub use layout::{ConstraintViolation, ContentType, LayoutWell, PlateLayout, Severity, SolveResult, SolveStatus};
pub use model::{Control, ControlKind, Design, Distribution, SampleOverride, SourcePlate, SourceWell};
pub use picklist::{Picklist, PicklistEntry};

/// Default per-plate solve timeout in seconds, used by the CLI when
/// `--timeout` is not given.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
