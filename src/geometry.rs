//! Plate geometry
//!
//! Pure functions mapping a plate kind to its physical dimensions, plus the
//! alphanumeric position encoding shared by every other module. Nothing
//! here allocates beyond what the caller asks for, and nothing here is
//! fallible except position parsing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the three supported microplate formats.
///
/// The wire representation is the well count itself (96 / 384 / 1536).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PlateKind {
    /// 8 rows x 12 columns.
    Wells96,
    /// 16 rows x 24 columns.
    Wells384,
    /// 32 rows x 48 columns.
    Wells1536,
}

/// Raised when a u32 doesn't correspond to a supported plate kind.
#[derive(Debug, Error)]
#[error("unsupported plate kind: {0}")]
pub struct UnknownPlateKind(u32);

impl TryFrom<u32> for PlateKind {
    type Error = UnknownPlateKind;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            96 => Ok(PlateKind::Wells96),
            384 => Ok(PlateKind::Wells384),
            1536 => Ok(PlateKind::Wells1536),
            other => Err(UnknownPlateKind(other)),
        }
    }
}

impl From<PlateKind> for u32 {
    fn from(kind: PlateKind) -> Self {
        match kind {
            PlateKind::Wells96 => 96,
            PlateKind::Wells384 => 384,
            PlateKind::Wells1536 => 1536,
        }
    }
}

impl Default for PlateKind {
    fn default() -> Self {
        PlateKind::Wells96
    }
}

impl PlateKind {
    /// The canonical Echo/Corning plate-type label used in picklist CSVs.
    pub fn type_name(self) -> &'static str {
        match self {
            PlateKind::Wells96 => "Corning_96_Uplate",
            PlateKind::Wells384 => "384PP_AQ_BP",
            PlateKind::Wells1536 => "1536LDV_AQ_B2",
        }
    }
}

/// Errors raised by position parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// The string did not match `/^[A-Z]+[0-9]{2,}$/`, or the parsed
    /// coordinate fell outside the given plate.
    #[error("invalid position {0:?}")]
    InvalidPosition(String),
}

/// `(rows, cols)` for a plate kind.
pub fn dimensions(kind: PlateKind) -> (usize, usize) {
    match kind {
        PlateKind::Wells96 => (8, 12),
        PlateKind::Wells384 => (16, 24),
        PlateKind::Wells1536 => (32, 48),
    }
}

/// Encode a 0-based `(row, col)` as `"A01"`-style text.
///
/// Row 0 is `A`; rows beyond `Z` extend as `AA`, `AB`, … (spreadsheet-style).
/// Column is 1-based and zero-padded to at least two digits.
pub fn format_position(row: usize, col: usize) -> String {
    let mut row_label = String::new();
    let mut n = row;
    loop {
        let letter = (b'A' + (n % 26) as u8) as char;
        row_label.insert(0, letter);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    format!("{row_label}{:02}", col + 1)
}

/// Decode an alphanumeric position back into a 0-based `(row, col)`.
///
/// Fails with [`GeometryError::InvalidPosition`] if the string does not
/// match the expected shape (one-or-more uppercase letters followed by
/// two-or-more digits).
pub fn parse_position(s: &str) -> Result<(usize, usize), GeometryError> {
    let bytes = s.as_bytes();
    let letters_end = bytes.iter().take_while(|b| b.is_ascii_uppercase()).count();
    if letters_end == 0 || letters_end == bytes.len() {
        return Err(GeometryError::InvalidPosition(s.to_string()));
    }
    let digits = &s[letters_end..];
    if digits.len() < 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GeometryError::InvalidPosition(s.to_string()));
    }
    let col: usize = digits
        .parse::<usize>()
        .map_err(|_| GeometryError::InvalidPosition(s.to_string()))?;
    if col == 0 {
        return Err(GeometryError::InvalidPosition(s.to_string()));
    }
    let mut row: usize = 0;
    for b in s[..letters_end].bytes() {
        row = row * 26 + (b - b'A') as usize + 1;
    }
    Ok((row - 1, col - 1))
}

/// Decode a position and require that it lie inside `kind`'s bounds.
pub fn parse_position_in(kind: PlateKind, s: &str) -> Result<(usize, usize), GeometryError> {
    let (row, col) = parse_position(s)?;
    let (rows, cols) = dimensions(kind);
    if row >= rows || col >= cols {
        return Err(GeometryError::InvalidPosition(s.to_string()));
    }
    Ok((row, col))
}

/// All `(row, col)` pairs strictly inside the `edge`-layer ring.
pub fn inner_positions(kind: PlateKind, edge: usize) -> Vec<(usize, usize)> {
    let (rows, cols) = dimensions(kind);
    let mut out = Vec::new();
    if edge >= rows || edge >= cols {
        return out;
    }
    for r in edge..rows - edge {
        for c in edge..cols - edge {
            out.push((r, c));
        }
    }
    out
}

/// Count of wells available for placement once `edge` layers are excluded.
pub fn available_wells(kind: PlateKind, edge: usize) -> usize {
    let (rows, cols) = dimensions(kind);
    if 2 * edge >= rows || 2 * edge >= cols {
        return 0;
    }
    (rows - 2 * edge) * (cols - 2 * edge)
}

/// `true` if `(row, col)` falls inside the `edge`-layer ring of `kind`.
pub fn is_inner(kind: PlateKind, edge: usize, row: usize, col: usize) -> bool {
    let (rows, cols) = dimensions(kind);
    row >= edge && row < rows - edge && col >= edge && col < cols - edge
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_plate_kind() -> impl Strategy<Value = PlateKind> {
        prop_oneof![
            Just(PlateKind::Wells96),
            Just(PlateKind::Wells384),
            Just(PlateKind::Wells1536),
        ]
    }

    proptest! {
        /// Encoding then decoding a coordinate is the identity, for any
        /// row/column pair, not just ones that fit on a real plate.
        #[test]
        fn position_round_trip_any_coordinate(row in 0usize..2000, col in 0usize..2000) {
            let encoded = format_position(row, col);
            prop_assert_eq!(parse_position(&encoded).unwrap(), (row, col));
        }

        /// `available_wells` and `inner_positions().len()` must agree for
        /// every plate kind and edge width, since the solver treats the
        /// former as a count and the latter as the domain it counts.
        #[test]
        fn available_wells_matches_inner_positions_count(kind in any_plate_kind(), edge in 0usize..5) {
            prop_assert_eq!(available_wells(kind, edge), inner_positions(kind, edge).len());
        }

        /// Every position `inner_positions` yields must lie strictly
        /// inside the excluded edge ring, and `is_inner` must agree.
        #[test]
        fn inner_positions_respect_edge_exclusion(kind in any_plate_kind(), edge in 0usize..5) {
            let (rows, cols) = dimensions(kind);
            for (r, c) in inner_positions(kind, edge) {
                prop_assert!(r >= edge && r < rows.saturating_sub(edge));
                prop_assert!(c >= edge && c < cols.saturating_sub(edge));
                prop_assert!(is_inner(kind, edge, r, c));
            }
        }
    }
}
