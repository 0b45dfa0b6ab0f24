//! Design model
//!
//! Immutable value types describing a source plate and the design
//! specification the solver is asked to realize. Every type here is a
//! plain record; behavior is limited to the two lookups the solver needs
//! (`replicates_for`, `transfer_volume_for`) and to constructor-time
//! validation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{self, GeometryError, PlateKind};

/// Errors raised while constructing a [`SourcePlate`] or [`Design`].
#[derive(Debug, Error)]
pub enum DesignError {
    /// Two source wells in the same plate share a position.
    #[error("duplicate source well position {0:?}")]
    DuplicatePosition(String),
    /// A position string failed to parse.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// A replicate count or control count was not positive.
    #[error("replicate count for {sample:?} must be >= 1, got {count}")]
    NonPositiveReplicates {
        /// The sample whose override was invalid.
        sample: String,
        /// The offending count.
        count: i64,
    },
}

/// One occupied well on a source plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceWell {
    /// Alphanumeric position, e.g. `"A01"`.
    pub position: String,
    /// The sample label held in this well (the "gene symbol").
    pub label: String,
    /// Volume in microliters, if known.
    #[serde(default)]
    pub volume_ul: Option<f64>,
    /// Concentration, if known. Units are caller-defined.
    #[serde(default)]
    pub concentration: Option<f64>,
}

/// A source plate: a barcode plus its occupied wells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePlate {
    /// Plate barcode.
    pub barcode: String,
    /// Plate type label propagated into picklist entries.
    #[serde(default = "default_source_plate_type")]
    pub plate_type: String,
    /// Occupied wells. Positions are unique within a plate; labels may repeat.
    pub wells: Vec<SourceWell>,
}

fn default_source_plate_type() -> String {
    "384PP_AQ_BP".to_string()
}

impl SourcePlate {
    /// Construct a source plate, checking position uniqueness.
    pub fn new(
        barcode: impl Into<String>,
        plate_type: impl Into<String>,
        wells: Vec<SourceWell>,
    ) -> Result<Self, DesignError> {
        let mut seen = std::collections::HashSet::with_capacity(wells.len());
        for well in &wells {
            geometry::parse_position(&well.position)?;
            if !seen.insert(well.position.clone()) {
                return Err(DesignError::DuplicatePosition(well.position.clone()));
            }
        }
        Ok(Self {
            barcode: barcode.into(),
            plate_type: plate_type.into(),
            wells,
        })
    }

    /// The distinct sample labels present on this plate.
    pub fn labels(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for well in &self.wells {
            if seen.insert(well.label.clone()) {
                out.push(well.label.clone());
            }
        }
        out
    }

    /// The first well carrying `label`, if any.
    pub fn find_well(&self, label: &str) -> Option<&SourceWell> {
        self.wells.iter().find(|w| w.label == label)
    }

    /// A well at the given alphanumeric position, if any.
    pub fn well_at(&self, position: &str) -> Option<&SourceWell> {
        self.wells.iter().find(|w| w.position == position)
    }
}

/// A control type placed on the destination plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    /// Expected to show the assay signal.
    Positive,
    /// Expected to show no assay signal.
    Negative,
    /// An empty/vehicle-only reference well.
    Blank,
}

/// One control requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    /// Which kind of control.
    pub kind: ControlKind,
    /// Label used on the layout and in the picklist when no sample label
    /// applies (falls back to the content-type tag if empty).
    pub label: String,
    /// How many replicate wells this control needs.
    pub count: u32,
    /// An explicit source well to draw from, overriding label matching.
    #[serde(default)]
    pub source_well: Option<String>,
}

/// How samples should be spread across the plate.
///
/// Only `Uniform` has a distinct effect in the solver; the others are
/// accepted for forward compatibility and behave identically to
/// `Uniform`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Minimize row/column count deviation (the only implemented policy).
    Uniform,
    /// Accepted, behaves as `Uniform`.
    Random,
    /// Accepted, behaves as `Uniform`.
    Column,
    /// Accepted, behaves as `Uniform`.
    Row,
}

impl Default for Distribution {
    fn default() -> Self {
        Distribution::Uniform
    }
}

/// Per-sample override of replicate count and/or transfer volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleOverride {
    /// Replicate count for this sample, superseding `default_replicates`.
    pub replicates: u32,
    /// Transfer volume (nL) for this sample, superseding
    /// `default_transfer_volume`.
    pub transfer_volume_nl: f64,
}

fn default_replicates() -> u32 {
    6
}

fn default_edge_empty_layers() -> usize {
    1
}

fn default_transfer_volume() -> f64 {
    2.5
}

/// The design specification driving the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    /// Destination plate format.
    #[serde(default)]
    pub plate_kind: PlateKind,
    /// Replicate count used when a sample has no override.
    #[serde(default = "default_replicates")]
    pub default_replicates: u32,
    /// Outer rings of wells reserved empty on every destination plate.
    #[serde(default = "default_edge_empty_layers")]
    pub edge_empty_layers: usize,
    /// Spatial distribution policy.
    #[serde(default)]
    pub distribution: Distribution,
    /// Control requirements.
    #[serde(default)]
    pub controls: Vec<Control>,
    /// Transfer volume (nL) used when a sample has no override.
    #[serde(default = "default_transfer_volume")]
    pub default_transfer_volume: f64,
    /// Per-sample overrides, keyed by sample label.
    #[serde(default)]
    pub per_sample_overrides: HashMap<String, SampleOverride>,
}

impl Default for Design {
    fn default() -> Self {
        Self {
            plate_kind: PlateKind::default(),
            default_replicates: default_replicates(),
            edge_empty_layers: default_edge_empty_layers(),
            distribution: Distribution::default(),
            controls: Vec::new(),
            default_transfer_volume: default_transfer_volume(),
            per_sample_overrides: HashMap::new(),
        }
    }
}

impl Design {
    /// Replicate count for `sample`: its override if present, else
    /// `default_replicates`. Never fails.
    pub fn replicates_for(&self, sample: &str) -> u32 {
        self.per_sample_overrides
            .get(sample)
            .map(|o| o.replicates)
            .unwrap_or(self.default_replicates)
    }

    /// Transfer volume (nL) for `sample`: its override if present, else
    /// `default_transfer_volume`. Never fails.
    pub fn transfer_volume_for(&self, sample: &str) -> f64 {
        self.per_sample_overrides
            .get(sample)
            .map(|o| o.transfer_volume_nl)
            .unwrap_or(self.default_transfer_volume)
    }

    /// A design is consistent iff every sample it is asked to place has a
    /// replicate count of at least 1.
    pub fn is_consistent(&self, genes_to_place: &[String]) -> Result<(), DesignError> {
        for gene in genes_to_place {
            let count = self.replicates_for(gene);
            if count < 1 {
                return Err(DesignError::NonPositiveReplicates {
                    sample: gene.clone(),
                    count: count as i64,
                });
            }
        }
        for control in &self.controls {
            if control.count < 1 {
                return Err(DesignError::NonPositiveReplicates {
                    sample: control.label.clone(),
                    count: control.count as i64,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_supersedes_default() {
        let mut design = Design::default();
        design.default_replicates = 6;
        design.per_sample_overrides.insert(
            "Gene10".to_string(),
            SampleOverride {
                replicates: 20,
                transfer_volume_nl: 5.0,
            },
        );
        assert_eq!(design.replicates_for("Gene1"), 6);
        assert_eq!(design.replicates_for("Gene10"), 20);
        assert_eq!(design.transfer_volume_for("Gene10"), 5.0);
    }

    #[test]
    fn duplicate_positions_rejected() {
        let wells = vec![
            SourceWell {
                position: "A01".to_string(),
                label: "Gene1".to_string(),
                volume_ul: None,
                concentration: None,
            },
            SourceWell {
                position: "A01".to_string(),
                label: "Gene2".to_string(),
                volume_ul: None,
                concentration: None,
            },
        ];
        let err = SourcePlate::new("bc1", "384PP_AQ_BP", wells).unwrap_err();
        assert!(matches!(err, DesignError::DuplicatePosition(_)));
    }

    #[test]
    fn same_label_multiple_wells_allowed() {
        let wells = vec![
            SourceWell {
                position: "A01".to_string(),
                label: "Gene1".to_string(),
                volume_ul: None,
                concentration: None,
            },
            SourceWell {
                position: "A02".to_string(),
                label: "Gene1".to_string(),
                volume_ul: None,
                concentration: None,
            },
        ];
        let plate = SourcePlate::new("bc1", "384PP_AQ_BP", wells).unwrap();
        assert_eq!(plate.labels(), vec!["Gene1".to_string()]);
    }

    #[test]
    fn consistency_rejects_zero_replicates() {
        let mut design = Design::default();
        design.per_sample_overrides.insert(
            "Gene1".to_string(),
            SampleOverride {
                replicates: 0,
                transfer_volume_nl: 2.5,
            },
        );
        let err = design
            .is_consistent(&["Gene1".to_string()])
            .unwrap_err();
        assert!(matches!(err, DesignError::NonPositiveReplicates { .. }));
    }
}
