//! Shared layout data model
//!
//! `ContentType`, `LayoutWell`, `PlateLayout`, `ConstraintViolation` and
//! `SolveResult` are produced by the solver and consumed by the validator
//! and picklist generator; they live in their own module rather than under
//! `solver` because all three downstream components share them.

use serde::{Deserialize, Serialize};

use crate::geometry::{self, PlateKind};

/// What a well on a destination plate holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Reserved empty (edge ring or unused inner well).
    Empty,
    /// Holds one replicate of a sample.
    Sample,
    /// Holds a positive control.
    PositiveControl,
    /// Holds a negative control.
    NegativeControl,
    /// Holds a blank.
    Blank,
}

impl ContentType {
    /// The tag used as a picklist sample-label fallback when no sample
    /// label is present.
    pub fn tag(self) -> &'static str {
        match self {
            ContentType::Empty => "empty",
            ContentType::Sample => "sample",
            ContentType::PositiveControl => "positive_control",
            ContentType::NegativeControl => "negative_control",
            ContentType::Blank => "blank",
        }
    }
}

/// One physical well on a destination plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutWell {
    /// Alphanumeric position, e.g. `"A01"`.
    pub position: String,
    /// 0-based row.
    pub row: usize,
    /// 0-based column.
    pub col: usize,
    /// What this well holds.
    pub content_type: ContentType,
    /// Sample label, present only for `ContentType::Sample`.
    #[serde(default)]
    pub sample: Option<String>,
    /// 0-based replicate index, present only for `ContentType::Sample`.
    #[serde(default)]
    pub replicate_index: Option<u32>,
    /// Barcode of the source plate this well was drawn from.
    #[serde(default)]
    pub source_plate_barcode: Option<String>,
    /// Alphanumeric position of the source well this well was drawn from.
    #[serde(default)]
    pub source_well: Option<String>,
}

impl LayoutWell {
    /// An empty well at `(row, col)`.
    pub fn empty(row: usize, col: usize) -> Self {
        Self {
            position: geometry::format_position(row, col),
            row,
            col,
            content_type: ContentType::Empty,
            sample: None,
            replicate_index: None,
            source_plate_barcode: None,
            source_well: None,
        }
    }
}

/// A destination plate: exactly one layout well per physical well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateLayout {
    /// Destination plate barcode.
    pub plate_barcode: String,
    /// Destination plate format.
    pub plate_kind: PlateKind,
    /// 0-based index of this plate within the batch returned by `solve`.
    pub plate_index: usize,
    /// Every well, in row-major tiling order.
    pub wells: Vec<LayoutWell>,
}

impl PlateLayout {
    /// The well at `(row, col)`, if present.
    pub fn well_at(&self, row: usize, col: usize) -> Option<&LayoutWell> {
        self.wells.iter().find(|w| w.row == row && w.col == col)
    }

    /// All wells holding the given sample label.
    pub fn wells_for_sample(&self, label: &str) -> Vec<&LayoutWell> {
        self.wells
            .iter()
            .filter(|w| w.content_type == ContentType::Sample && w.sample.as_deref() == Some(label))
            .collect()
    }
}

/// Severity of a validator finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Downgrades a `success` result to `partial`.
    Error,
    /// Reported but does not affect solve status.
    Warning,
}

/// One constraint-catalog finding against a produced layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    /// Name of the violated constraint, e.g. `"no_adjacent_same_gene"`.
    pub constraint_name: String,
    /// Human-readable description.
    pub description: String,
    /// Severity.
    pub severity: Severity,
    /// Alphanumeric positions involved.
    pub affected_wells: Vec<String>,
}

/// Outcome of a `solve` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Every layout is fully valid.
    Success,
    /// Layouts were produced but at least one `error`-severity violation
    /// remains.
    Partial,
    /// No layouts were produced.
    Failed,
}

/// The result of a `solve` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResult {
    /// Overall status.
    pub status: SolveStatus,
    /// Produced layouts, in plate-index order.
    #[serde(default)]
    pub layouts: Vec<PlateLayout>,
    /// Violations aggregated across all produced layouts.
    #[serde(default)]
    pub violations: Vec<ConstraintViolation>,
    /// Names of constraints that had to be relaxed to reach this result.
    #[serde(default)]
    pub relaxed_constraints: Vec<String>,
    /// Wall-clock solve time in milliseconds.
    #[serde(default)]
    pub solve_time_ms: u64,
    /// Human-readable summary message.
    pub message: String,
}
