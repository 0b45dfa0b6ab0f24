//! Constraint solver
//!
//! Builds a local-search CP model from a [`Design`] and invokes the
//! engine behind the [`CpEngine`](crate::cp::CpEngine) trait, falling
//! back through a three-tier strategy when the full model can't be
//! satisfied. This is the heaviest module in the crate — everything
//! else exists to feed it inputs or consume its outputs.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cp::{CpEngine, CpStatus, LocalSearchEngine};
use crate::geometry::{self, PlateKind};
use crate::layout::{ContentType, LayoutWell, PlateLayout, Severity, SolveResult, SolveStatus};
use crate::model::{ControlKind, Design, SourcePlate};
use crate::validator;

/// Hard cap on the number of destination plates a single request may
/// require.
const MAX_PLATES: usize = 10;

/// Parallel search workers the engine is asked to run.
const SEARCH_WORKERS: u32 = 8;

/// Fixed engine seed, for deterministic, reproducible layouts.
const DEFAULT_SEED: u64 = 0x5eed_5eed;

const GOLDEN_RATIO: f64 = 1.618033988749895;

/// A gene or control, with its total replicate/control demand, before
/// expansion into individual instances.
#[derive(Debug, Clone)]
struct WorkItem {
    label: String,
    count: u32,
    content_type: ContentType,
    source_well_override: Option<String>,
}

/// One replicate (of a sample or a control) to be placed on a plate.
#[derive(Debug, Clone)]
struct Instance {
    /// Identifies which `WorkItem` this instance belongs to; non-adjacency
    /// and dispersion constraints are scoped to instances sharing a group.
    group: usize,
    label: String,
    content_type: ContentType,
    replicate_index: u32,
    source_well_override: Option<String>,
}

fn build_work_items(design: &Design, genes_to_place: &[String]) -> Vec<WorkItem> {
    let mut items = Vec::with_capacity(genes_to_place.len() + design.controls.len());
    for gene in genes_to_place {
        items.push(WorkItem {
            label: gene.clone(),
            count: design.replicates_for(gene),
            content_type: ContentType::Sample,
            source_well_override: None,
        });
    }
    for control in &design.controls {
        items.push(WorkItem {
            label: control.label.clone(),
            count: control.count,
            content_type: match control.kind {
                ControlKind::Positive => ContentType::PositiveControl,
                ControlKind::Negative => ContentType::NegativeControl,
                ControlKind::Blank => ContentType::Blank,
            },
            source_well_override: control.source_well.clone(),
        });
    }
    items
}

/// Split `items` into `num_chunks` contiguous groups of
/// `ceil(items.len() / num_chunks)` items, by position in the list — not
/// by replicate-weighted demand, so a single heavy item can leave its
/// chunk over-full relative to the others.
fn chunk_contiguous(items: &[WorkItem], num_chunks: usize) -> Vec<Vec<WorkItem>> {
    if items.is_empty() || num_chunks == 0 {
        return Vec::new();
    }
    let chunk_size = (items.len() + num_chunks - 1) / num_chunks;
    items.chunks(chunk_size.max(1)).map(|c| c.to_vec()).collect()
}

fn expand_instances(items: &[WorkItem]) -> Vec<Instance> {
    let mut instances = Vec::new();
    for (group, item) in items.iter().enumerate() {
        for rep in 0..item.count {
            instances.push(Instance {
                group,
                label: item.label.clone(),
                content_type: item.content_type,
                replicate_index: rep,
                source_well_override: item.source_well_override.clone(),
            });
        }
    }
    instances
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Solve a plate-layout design.
///
/// `timeout_secs` is the total wall-clock budget across every plate this
/// call may need to produce; it is divided evenly among them. Never
/// panics on malformed input that the constructors already validated —
/// it converts every failure mode into a [`SolveResult`] rather than
/// propagating an error.
pub fn solve(
    design: &Design,
    source_plate: &SourcePlate,
    genes_to_place: &[String],
    timeout_secs: u64,
) -> SolveResult {
    let start = Instant::now();

    if let Err(err) = design.is_consistent(genes_to_place) {
        return SolveResult {
            status: SolveStatus::Failed,
            layouts: Vec::new(),
            violations: Vec::new(),
            relaxed_constraints: Vec::new(),
            solve_time_ms: elapsed_ms(start),
            message: format!("invalid design: {err}"),
        };
    }

    let items = build_work_items(design, genes_to_place);
    let total_demand: u64 = items.iter().map(|i| i.count as u64).sum();
    let capacity = geometry::available_wells(design.plate_kind, design.edge_empty_layers) as u64;

    if capacity == 0 {
        return SolveResult {
            status: SolveStatus::Failed,
            layouts: Vec::new(),
            violations: Vec::new(),
            relaxed_constraints: Vec::new(),
            solve_time_ms: elapsed_ms(start),
            message: "edge_empty_layers leaves no wells available on this plate".to_string(),
        };
    }

    let num_plates = (((total_demand + capacity - 1) / capacity).max(1)) as usize;

    if num_plates > MAX_PLATES {
        return SolveResult {
            status: SolveStatus::Failed,
            layouts: Vec::new(),
            violations: Vec::new(),
            relaxed_constraints: Vec::new(),
            solve_time_ms: elapsed_ms(start),
            message: format!(
                "design requires {num_plates} plates, exceeding the maximum of {MAX_PLATES}"
            ),
        };
    }

    info!(num_plates, total_demand, capacity, "capacity planning complete");

    let chunks = chunk_contiguous(&items, num_plates);
    let per_plate_timeout = (timeout_secs.max(1) as f64) / (chunks.len().max(1) as f64);

    let mut layouts = Vec::with_capacity(chunks.len());
    let mut relaxed: Vec<String> = Vec::new();

    for (plate_index, chunk) in chunks.into_iter().enumerate() {
        if chunk.is_empty() {
            continue;
        }
        let (layout, plate_relaxed) =
            solve_single_plate(design, source_plate, &chunk, plate_index, per_plate_timeout);
        for name in plate_relaxed {
            if !relaxed.contains(&name) {
                relaxed.push(name);
            }
        }
        layouts.push(layout);
    }

    let mut violations = Vec::new();
    for layout in &layouts {
        violations.extend(validator::validate(layout));
    }

    let has_error = violations.iter().any(|v| v.severity == Severity::Error);
    let status = if has_error {
        SolveStatus::Partial
    } else {
        SolveStatus::Success
    };
    let message = match status {
        SolveStatus::Success => "layout generation succeeded".to_string(),
        SolveStatus::Partial => "layout generated with unresolved constraint violations".to_string(),
        SolveStatus::Failed => unreachable!("failure modes return earlier"),
    };

    SolveResult {
        status,
        layouts,
        violations,
        relaxed_constraints: relaxed,
        solve_time_ms: elapsed_ms(start),
        message,
    }
}

fn solve_single_plate(
    design: &Design,
    source_plate: &SourcePlate,
    items: &[WorkItem],
    plate_index: usize,
    timeout_secs: f64,
) -> (PlateLayout, Vec<String>) {
    let (rows, cols) = geometry::dimensions(design.plate_kind);
    let edge = design.edge_empty_layers;
    let inner_rows = rows.saturating_sub(2 * edge);
    let inner_cols = cols.saturating_sub(2 * edge);
    let inner_positions = geometry::inner_positions(design.plate_kind, edge);

    let instances = expand_instances(items);
    let num_samples = instances.len();
    let dispersion_relaxed = || vec!["row_dispersion".to_string(), "col_dispersion".to_string()];

    debug!(
        plate_index,
        num_samples,
        available = inner_positions.len(),
        "solving single plate"
    );

    if num_samples > inner_positions.len() {
        warn!(
            plate_index,
            num_samples,
            "demand exceeds capacity, using heuristic placement"
        );
        let placement = heuristic_place(&instances, inner_rows, inner_cols, edge);
        let layout = extract_layout(
            design.plate_kind,
            plate_index,
            &placement,
            &instances,
            source_plate,
            rows,
            cols,
        );
        return (layout, dispersion_relaxed());
    }

    let deadline = Instant::now() + Duration::from_secs_f64(timeout_secs.max(0.1));
    let ideal_row = (num_samples as f64 / inner_rows.max(1) as f64).round() as i64;
    let ideal_col = (num_samples as f64 / inner_cols.max(1) as f64).round() as i64;

    let remaining = deadline.saturating_duration_since(Instant::now()).as_secs_f64();
    let (status, engine) = run_tier(
        &inner_positions,
        &instances,
        inner_rows,
        inner_cols,
        ideal_row,
        ideal_col,
        true,
        remaining,
    );
    if matches!(status, CpStatus::Optimal | CpStatus::Feasible) {
        info!(plate_index, "full model solved");
        let placement = extract_placement(&engine, &instances);
        let layout = extract_layout(
            design.plate_kind,
            plate_index,
            &placement,
            &instances,
            source_plate,
            rows,
            cols,
        );
        return (layout, Vec::new());
    }

    warn!(plate_index, ?status, "full model failed, relaxing dispersion constraints");
    let remaining = deadline.saturating_duration_since(Instant::now()).as_secs_f64();
    let (status, engine) = run_tier(
        &inner_positions,
        &instances,
        inner_rows,
        inner_cols,
        ideal_row,
        ideal_col,
        false,
        remaining,
    );
    if matches!(status, CpStatus::Optimal | CpStatus::Feasible) {
        info!(plate_index, "relaxed model solved");
        let placement = extract_placement(&engine, &instances);
        let layout = extract_layout(
            design.plate_kind,
            plate_index,
            &placement,
            &instances,
            source_plate,
            rows,
            cols,
        );
        return (layout, dispersion_relaxed());
    }

    warn!(plate_index, ?status, "relaxed model also failed, falling back to heuristic");
    let placement = heuristic_place(&instances, inner_rows, inner_cols, edge);
    let layout = extract_layout(
        design.plate_kind,
        plate_index,
        &placement,
        &instances,
        source_plate,
        rows,
        cols,
    );
    (layout, dispersion_relaxed())
}

#[allow(clippy::too_many_arguments)]
fn run_tier(
    inner_positions: &[(usize, usize)],
    instances: &[Instance],
    inner_rows: usize,
    inner_cols: usize,
    ideal_row: i64,
    ideal_col: i64,
    apply_dispersion: bool,
    timeout_secs: f64,
) -> (CpStatus, LocalSearchEngine) {
    let mut engine = LocalSearchEngine::new(inner_positions.to_vec());
    for instance in instances {
        engine.new_instance(instance.group);
    }
    engine.forbid_adjacent_within_groups();

    if apply_dispersion {
        let mut counts: HashMap<usize, u32> = HashMap::new();
        for instance in instances {
            *counts.entry(instance.group).or_insert(0) += 1;
        }
        for (&group, &count) in &counts {
            let distinct_rows = (count as usize) <= inner_rows;
            let distinct_cols = (count as usize) <= inner_cols;
            engine.require_distinct_rows_cols(group, distinct_rows, distinct_cols);
        }
    }

    engine.minimize_spread(ideal_row, ideal_col);
    let status = engine.solve(timeout_secs.max(0.05), SEARCH_WORKERS, DEFAULT_SEED);
    (status, engine)
}

fn extract_placement(engine: &LocalSearchEngine, instances: &[Instance]) -> Vec<(usize, usize)> {
    (0..instances.len()).map(|v| (engine.row(v), engine.col(v))).collect()
}

fn resolve_source_well(instance: &Instance, source_plate: &SourcePlate) -> Option<String> {
    if let Some(position) = &instance.source_well_override {
        return match source_plate.well_at(position) {
            Some(well) => Some(well.position.clone()),
            None => Some(position.clone()),
        };
    }
    source_plate
        .find_well(&instance.label)
        .map(|well| well.position.clone())
}

#[allow(clippy::too_many_arguments)]
fn extract_layout(
    plate_kind: PlateKind,
    plate_index: usize,
    placement: &[(usize, usize)],
    instances: &[Instance],
    source_plate: &SourcePlate,
    rows: usize,
    cols: usize,
) -> PlateLayout {
    let mut occupied: HashMap<(usize, usize), usize> = HashMap::with_capacity(placement.len());
    for (idx, pos) in placement.iter().enumerate() {
        occupied.insert(*pos, idx);
    }

    let mut wells = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            if let Some(&instance_idx) = occupied.get(&(r, c)) {
                let instance = &instances[instance_idx];
                let source_well = resolve_source_well(instance, source_plate);
                wells.push(LayoutWell {
                    position: geometry::format_position(r, c),
                    row: r,
                    col: c,
                    content_type: instance.content_type,
                    sample: (instance.content_type == ContentType::Sample)
                        .then(|| instance.label.clone()),
                    replicate_index: Some(instance.replicate_index),
                    source_plate_barcode: source_well.as_ref().map(|_| source_plate.barcode.clone()),
                    source_well,
                });
            } else {
                wells.push(LayoutWell::empty(r, c));
            }
        }
    }

    PlateLayout {
        plate_barcode: format!("plate_{}", plate_index + 1),
        plate_kind,
        plate_index,
        wells,
    }
}

/// Deterministic last-resort placement: golden-ratio scrambled target
/// positions followed by a Chebyshev-ring spiral search for the nearest
/// free, non-adjacent-to-same-group well.
fn heuristic_place(
    instances: &[Instance],
    inner_rows: usize,
    inner_cols: usize,
    edge: usize,
) -> Vec<(usize, usize)> {
    let mut placement: Vec<Option<(usize, usize)>> = vec![None; instances.len()];
    let mut occupied: HashMap<(usize, usize), usize> = HashMap::with_capacity(instances.len());

    let inner_rows_i = inner_rows.max(1) as i64;
    let inner_cols_i = inner_cols.max(1) as i64;

    for (idx, instance) in instances.iter().enumerate() {
        let g_idx = instance.group as f64;
        let rep_idx = instance.replicate_index as f64;

        let row_offset =
            ((g_idx * GOLDEN_RATIO + rep_idx * GOLDEN_RATIO * GOLDEN_RATIO) * inner_rows_i as f64)
                .floor() as i64;
        let col_offset =
            ((g_idx * GOLDEN_RATIO * GOLDEN_RATIO + rep_idx * GOLDEN_RATIO) * inner_cols_i as f64)
                .floor() as i64;

        let target_r = edge as i64 + row_offset.rem_euclid(inner_rows_i);
        let target_c = edge as i64 + col_offset.rem_euclid(inner_cols_i);

        let max_radius = inner_rows_i.max(inner_cols_i);
        let mut placed = None;

        'spiral: for radius in 0..=max_radius {
            for dr in -radius..=radius {
                for dc in -radius..=radius {
                    if dr.abs() != radius && dc.abs() != radius {
                        continue;
                    }
                    let r = target_r + dr;
                    let c = target_c + dc;
                    if r < edge as i64 || r >= edge as i64 + inner_rows_i {
                        continue;
                    }
                    if c < edge as i64 || c >= edge as i64 + inner_cols_i {
                        continue;
                    }
                    let pos = (r as usize, c as usize);
                    if occupied.contains_key(&pos) {
                        continue;
                    }
                    if has_adjacent_same_group(pos, instance.group, &occupied, instances) {
                        continue;
                    }
                    placed = Some(pos);
                    break 'spiral;
                }
            }
        }

        let pos = placed.unwrap_or_else(|| first_free_well(edge, inner_rows, inner_cols, &occupied));
        occupied.insert(pos, idx);
        placement[idx] = Some(pos);
    }

    placement.into_iter().map(|p| p.expect("every instance placed")).collect()
}

fn first_free_well(
    edge: usize,
    inner_rows: usize,
    inner_cols: usize,
    occupied: &HashMap<(usize, usize), usize>,
) -> (usize, usize) {
    for r in edge..edge + inner_rows {
        for c in edge..edge + inner_cols {
            if !occupied.contains_key(&(r, c)) {
                return (r, c);
            }
        }
    }
    (edge, edge)
}

fn has_adjacent_same_group(
    pos: (usize, usize),
    group: usize,
    occupied: &HashMap<(usize, usize), usize>,
    instances: &[Instance],
) -> bool {
    for dr in -1i64..=1 {
        for dc in -1i64..=1 {
            if dr == 0 && dc == 0 {
                continue;
            }
            let r = pos.0 as i64 + dr;
            let c = pos.1 as i64 + dc;
            if r < 0 || c < 0 {
                continue;
            }
            if let Some(&idx) = occupied.get(&(r as usize, c as usize)) {
                if instances[idx].group == group {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SampleOverride, SourceWell};

    fn genes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn source_plate_for(genes: &[&str]) -> SourcePlate {
        let wells = genes
            .iter()
            .enumerate()
            .map(|(i, g)| SourceWell {
                position: geometry::format_position(0, i),
                label: g.to_string(),
                volume_ul: None,
                concentration: None,
            })
            .collect();
        SourcePlate::new("SRC1", "384PP_AQ_BP", wells).unwrap()
    }

    /// 96-well, 10 genes x 6 reps, edge=1.
    #[test]
    fn single_plate_96_well() {
        let names: Vec<String> = (1..=10).map(|i| format!("Gene{i}")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let source = source_plate_for(&name_refs);
        let mut design = Design::default();
        design.plate_kind = PlateKind::Wells96;
        design.default_replicates = 6;
        design.edge_empty_layers = 1;

        let result = solve(&design, &source, &names, 10);
        assert_eq!(result.status, SolveStatus::Success);
        assert_eq!(result.layouts.len(), 1);

        let layout = &result.layouts[0];
        let sample_wells: Vec<_> = layout
            .wells
            .iter()
            .filter(|w| w.content_type == ContentType::Sample)
            .collect();
        let empty_wells = layout
            .wells
            .iter()
            .filter(|w| w.content_type == ContentType::Empty)
            .count();
        assert_eq!(sample_wells.len(), 60);
        assert_eq!(empty_wells, 36);
        for well in &sample_wells {
            assert!((1..=6).contains(&well.row));
            assert!((1..=10).contains(&well.col));
        }

        for a in &sample_wells {
            for b in &sample_wells {
                if a.position == b.position {
                    continue;
                }
                if a.sample == b.sample {
                    let dr = (a.row as i64 - b.row as i64).abs();
                    let dc = (a.col as i64 - b.col as i64).abs();
                    assert!(dr >= 2 || dc >= 2, "adjacent same-label wells {a:?} {b:?}");
                }
            }
        }
    }

    /// 96-well, 100 genes x 6 reps: exactly at the 10-plate cap.
    #[test]
    fn hits_plate_cap_exactly() {
        let names: Vec<String> = (1..=100).map(|i| format!("Gene{i}")).collect();
        let source_wells: Vec<SourceWell> = names
            .iter()
            .enumerate()
            .map(|(i, g)| SourceWell {
                position: format!("{}{:02}", (b'A' + (i / 12) as u8) as char, i % 12 + 1),
                label: g.clone(),
                volume_ul: None,
                concentration: None,
            })
            .collect();
        let source = SourcePlate::new("SRC1", "384PP_AQ_BP", source_wells).unwrap();
        let mut design = Design::default();
        design.plate_kind = PlateKind::Wells96;
        design.default_replicates = 6;

        let result = solve(&design, &source, &names, 30);
        assert_eq!(result.status, SolveStatus::Success);
        assert_eq!(result.layouts.len(), 10);
        for layout in &result.layouts {
            let sample_count = layout
                .wells
                .iter()
                .filter(|w| w.content_type == ContentType::Sample)
                .count();
            assert_eq!(sample_count, 60);
        }
    }

    /// 96-well, 200 genes x 6 reps: requires 20 plates, must fail.
    #[test]
    fn exceeds_plate_cap() {
        let names: Vec<String> = (1..=200).map(|i| format!("Gene{i}")).collect();
        let source = SourcePlate::new("SRC1", "384PP_AQ_BP", vec![]).unwrap();
        let design = Design::default();

        let result = solve(&design, &source, &names, 5);
        assert_eq!(result.status, SolveStatus::Failed);
        assert!(result.message.contains("10") && result.message.to_lowercase().contains("plate"));
        assert!(result.layouts.is_empty());
    }

    /// A single group demanding far more replicates than the 8-adjacency
    /// independent-set limit for an 8x12 grid (24 cells) forces every
    /// tier to fail and the heuristic fallback to leave adjacent
    /// same-label pairs behind, which must downgrade the result to
    /// `Partial`.
    #[test]
    fn heuristic_fallback_adjacency_violation_is_partial() {
        let names = genes(&["Gene1"]);
        let source = source_plate_for(&["Gene1"]);
        let mut design = Design::default();
        design.plate_kind = PlateKind::Wells96;
        design.edge_empty_layers = 0;
        design.default_replicates = 70;

        let result = solve(&design, &source, &names, 1);
        assert_eq!(result.status, SolveStatus::Partial);
        assert!(result.violations.iter().any(|v| {
            v.constraint_name == "no_adjacent_same_gene" && v.severity == Severity::Error
        }));
    }

    #[test]
    fn per_sample_override_changes_replicate_count() {
        let names = genes(&["Gene1"]);
        let source = source_plate_for(&["Gene1"]);
        let mut design = Design::default();
        design.per_sample_overrides.insert(
            "Gene1".to_string(),
            SampleOverride {
                replicates: 3,
                transfer_volume_nl: 10.0,
            },
        );
        let result = solve(&design, &source, &names, 5);
        assert_eq!(result.status, SolveStatus::Success);
        let sample_count: usize = result.layouts[0]
            .wells
            .iter()
            .filter(|w| w.content_type == ContentType::Sample)
            .count();
        assert_eq!(sample_count, 3);
    }
}
