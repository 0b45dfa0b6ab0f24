//! Layout validator
//!
//! Post-hoc checks run against a layout the solver has already produced.
//! Both checks here are pure functions of the layout; neither recomputes
//! invariants the solver already guarantees by construction (cardinality,
//! source-well attribution, edge exclusion).

use std::collections::HashSet;

use crate::geometry;
use crate::layout::{ConstraintViolation, ContentType, PlateLayout, Severity};

const EIGHT_NEIGHBORS: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Quadrant-balance deviation above which a warning is emitted. Fixed,
/// independent of plate size or sample count.
const QUADRANT_IMBALANCE_THRESHOLD: i64 = 5;

/// Run every constraint check against `layout` and return the findings.
pub fn validate(layout: &PlateLayout) -> Vec<ConstraintViolation> {
    let mut violations = no_adjacent_same_gene(layout);
    violations.extend(quadrant_balance(layout));
    violations
}

/// Non-adjacency is a hard constraint everywhere except the heuristic
/// fallback tier, which can't always honor it; a hit here is reported as
/// `Error` so `solve` downgrades the overall status to `partial` rather
/// than claiming success over a layout that violates it.
fn no_adjacent_same_gene(layout: &PlateLayout) -> Vec<ConstraintViolation> {
    let mut by_pos = std::collections::HashMap::new();
    for well in &layout.wells {
        by_pos.insert((well.row, well.col), well);
    }

    let mut checked: HashSet<(String, String)> = HashSet::new();
    let mut violations = Vec::new();

    for well in &layout.wells {
        if well.content_type != ContentType::Sample {
            continue;
        }
        let Some(label) = &well.sample else { continue };

        for (dr, dc) in EIGHT_NEIGHBORS {
            let nr = well.row as i64 + dr;
            let nc = well.col as i64 + dc;
            if nr < 0 || nc < 0 {
                continue;
            }
            let Some(neighbor) = by_pos.get(&(nr as usize, nc as usize)) else {
                continue;
            };
            if neighbor.content_type != ContentType::Sample {
                continue;
            }
            if neighbor.sample.as_deref() != Some(label.as_str()) {
                continue;
            }
            let mut pair = [well.position.clone(), neighbor.position.clone()];
            pair.sort();
            let key = (pair[0].clone(), pair[1].clone());
            if checked.insert(key) {
                violations.push(ConstraintViolation {
                    constraint_name: "no_adjacent_same_gene".to_string(),
                    description: format!(
                        "sample {label:?} is 8-adjacent at {} and {}",
                        pair[0], pair[1]
                    ),
                    severity: Severity::Error,
                    affected_wells: pair.to_vec(),
                });
            }
        }
    }

    violations
}

fn quadrant_balance(layout: &PlateLayout) -> Vec<ConstraintViolation> {
    let (rows, cols) = geometry::dimensions(layout.plate_kind);
    let mid_r = rows / 2;
    let mid_c = cols / 2;
    let mut quadrants = [0i64; 4];

    for well in &layout.wells {
        if well.content_type != ContentType::Sample {
            continue;
        }
        let q = (if well.row < mid_r { 0 } else { 2 }) + (if well.col < mid_c { 0 } else { 1 });
        quadrants[q] += 1;
    }

    let min = *quadrants.iter().min().unwrap();
    let max = *quadrants.iter().max().unwrap();
    if min > 0 && max - min > QUADRANT_IMBALANCE_THRESHOLD {
        vec![ConstraintViolation {
            constraint_name: "quadrant_balance".to_string(),
            description: format!(
                "quadrant sample counts are unbalanced: {:?}",
                quadrants
            ),
            severity: Severity::Warning,
            affected_wells: Vec::new(),
        }]
    } else {
        Vec::new()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::geometry::PlateKind;
    use crate::layout::LayoutWell;
    use proptest::prelude::*;

    fn random_layout(labels: Vec<(usize, usize, String)>) -> PlateLayout {
        let wells = labels
            .into_iter()
            .map(|(row, col, label)| LayoutWell {
                position: geometry::format_position(row, col),
                row,
                col,
                content_type: ContentType::Sample,
                sample: Some(label),
                replicate_index: Some(0),
                source_plate_barcode: None,
                source_well: None,
            })
            .collect();
        PlateLayout {
            plate_barcode: "plate_1".to_string(),
            plate_kind: PlateKind::Wells96,
            plate_index: 0,
            wells,
        }
    }

    proptest! {
        /// `validate` is a pure function of the layout: running it twice
        /// on the same (possibly overlapping, possibly adjacent) set of
        /// wells must yield the exact same findings.
        #[test]
        fn validate_is_idempotent(
            cells in proptest::collection::vec(
                (0usize..8, 0usize..12, "[A-C]"),
                0..12,
            )
        ) {
            let layout = random_layout(cells);
            prop_assert_eq!(validate(&layout), validate(&layout));
        }
    }
}
