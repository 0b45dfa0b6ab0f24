//! Picklist generator
//!
//! Flattens one or more accepted layouts into an ordered list of
//! source-well -> destination-well acoustic-transfer records, and
//! serializes them to a bit-exact CSV format.

use serde::{Deserialize, Serialize};

use crate::layout::{ContentType, PlateLayout};
use crate::model::{Design, SourcePlate};

/// One acoustic transfer: a source well to a destination well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PicklistEntry {
    /// Source plate barcode.
    pub source_plate_barcode: String,
    /// Source well, e.g. `"A01"`.
    pub source_well: String,
    /// Source plate type label.
    pub source_plate_type: String,
    /// Destination plate barcode.
    pub destination_plate_barcode: String,
    /// Destination plate type label.
    pub destination_plate_type: String,
    /// Destination well, e.g. `"A01"`.
    pub destination_well: String,
    /// Transfer volume in nL.
    pub transfer_volume_nl: f64,
    /// Sample label, or the content-type tag when no label applies.
    pub sample_label: String,
    /// Optional compound label auxiliary field.
    #[serde(default)]
    pub compound_label: Option<String>,
    /// Optional Ensembl ID auxiliary field.
    #[serde(default)]
    pub ensembl_id: Option<String>,
}

/// An ordered sequence of picklist entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Picklist {
    /// Entries in emission order.
    pub entries: Vec<PicklistEntry>,
}

const CSV_HEADER: &str = "Source Plate Barcode,Source Well,Source Plate Type,Destination Plate Barcode,Destination Plate Type,Destination Well,Transfer Volume,GENE_SYMBOL,COMPOUND_LABEL,ENSEMBL_ID";

impl Picklist {
    /// Serialize to a bit-exact CSV format: comma-separated,
    /// newline-terminated lines, no trailing newline.
    pub fn to_csv(&self) -> String {
        let mut lines = vec![CSV_HEADER.to_string()];
        for entry in &self.entries {
            lines.push(format!(
                "{},{},{},{},{},{},{},{},{},{}",
                entry.source_plate_barcode,
                entry.source_well,
                entry.source_plate_type,
                entry.destination_plate_barcode,
                entry.destination_plate_type,
                entry.destination_well,
                entry.transfer_volume_nl,
                entry.sample_label,
                entry.compound_label.as_deref().unwrap_or("N/A"),
                entry.ensembl_id.as_deref().unwrap_or("N/A"),
            ));
        }
        lines.join("\n")
    }
}

/// Build a picklist from `layouts` against `source_plate`, using
/// `design`'s per-sample transfer-volume overrides (falling back to its
/// default) for every non-empty well.
pub fn generate(layouts: &[PlateLayout], source_plate: &SourcePlate, design: &Design) -> Picklist {
    let mut entries = Vec::new();

    for layout in layouts {
        for well in &layout.wells {
            if well.content_type == ContentType::Empty {
                continue;
            }

            let source_well = match &well.source_well {
                Some(position) => position.clone(),
                None => match &well.sample {
                    Some(label) => match source_plate.find_well(label) {
                        Some(source) => source.position.clone(),
                        None => continue,
                    },
                    None => continue,
                },
            };

            let label = well
                .sample
                .clone()
                .unwrap_or_else(|| well.content_type.tag().to_string());

            entries.push(PicklistEntry {
                source_plate_barcode: source_plate.barcode.clone(),
                source_well,
                source_plate_type: source_plate.plate_type.clone(),
                destination_plate_barcode: layout.plate_barcode.clone(),
                destination_plate_type: layout.plate_kind.type_name().to_string(),
                destination_well: well.position.clone(),
                transfer_volume_nl: design.transfer_volume_for(&label),
                sample_label: label,
                compound_label: None,
                ensembl_id: None,
            });
        }
    }

    Picklist { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PlateKind;
    use crate::layout::LayoutWell;
    use crate::model::SourceWell;

    #[test]
    fn csv_header_is_exact() {
        let picklist = Picklist::default();
        let csv = picklist.to_csv();
        assert_eq!(csv, CSV_HEADER);
    }

    #[test]
    fn conservation_of_non_empty_wells() {
        let source = SourcePlate::new(
            "SRC1",
            "384PP_AQ_BP",
            vec![SourceWell {
                position: "A01".to_string(),
                label: "Gene1".to_string(),
                volume_ul: None,
                concentration: None,
            }],
        )
        .unwrap();
        let design = Design::default();

        let layout = PlateLayout {
            plate_barcode: "plate_1".to_string(),
            plate_kind: PlateKind::Wells96,
            plate_index: 0,
            wells: vec![
                LayoutWell::empty(0, 0),
                LayoutWell {
                    position: "B02".to_string(),
                    row: 1,
                    col: 1,
                    content_type: ContentType::Sample,
                    sample: Some("Gene1".to_string()),
                    replicate_index: Some(0),
                    source_plate_barcode: Some("SRC1".to_string()),
                    source_well: Some("A01".to_string()),
                },
            ],
        };

        let picklist = generate(&[layout], &source, &design);
        assert_eq!(picklist.entries.len(), 1);
        assert_eq!(picklist.entries[0].source_well, "A01");
        assert_eq!(picklist.entries[0].destination_well, "B02");
        assert_eq!(picklist.entries[0].transfer_volume_nl, design.default_transfer_volume);
    }

    #[test]
    fn missing_auxiliary_fields_render_as_na() {
        let source = SourcePlate::new("SRC1", "384PP_AQ_BP", vec![]).unwrap();
        let design = Design::default();
        let layout = PlateLayout {
            plate_barcode: "plate_1".to_string(),
            plate_kind: PlateKind::Wells96,
            plate_index: 0,
            wells: vec![LayoutWell {
                position: "A02".to_string(),
                row: 0,
                col: 1,
                content_type: ContentType::PositiveControl,
                sample: None,
                replicate_index: None,
                source_plate_barcode: Some("SRC1".to_string()),
                source_well: Some("A01".to_string()),
            }],
        };
        let picklist = generate(&[layout], &source, &design);
        let csv = picklist.to_csv();
        assert!(csv.ends_with("N/A,N/A"));
        assert!(csv.contains("positive_control"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::geometry::{self, PlateKind};
    use crate::layout::LayoutWell;
    use proptest::prelude::*;

    proptest! {
        /// Every non-empty well carries an explicit source well here, so
        /// `generate` can't skip it for lack of attribution: the entry
        /// count must exactly match the non-empty well count.
        #[test]
        fn conserves_non_empty_wells(
            positions in proptest::collection::vec((0usize..8, 0usize..12), 1..20)
        ) {
            let source = SourcePlate::new("SRC1", "384PP_AQ_BP", vec![]).unwrap();
            let design = Design::default();

            let mut seen = std::collections::HashSet::new();
            let mut wells = Vec::new();
            for (row, col) in positions {
                if !seen.insert((row, col)) {
                    continue;
                }
                wells.push(LayoutWell {
                    position: geometry::format_position(row, col),
                    row,
                    col,
                    content_type: ContentType::Sample,
                    sample: Some("Gene1".to_string()),
                    replicate_index: Some(0),
                    source_plate_barcode: Some("SRC1".to_string()),
                    source_well: Some("A01".to_string()),
                });
            }
            let non_empty = wells.len();

            let layout = PlateLayout {
                plate_barcode: "plate_1".to_string(),
                plate_kind: PlateKind::Wells96,
                plate_index: 0,
                wells,
            };

            let picklist = generate(&[layout], &source, &design);
            prop_assert_eq!(picklist.entries.len(), non_empty);
        }
    }
}
