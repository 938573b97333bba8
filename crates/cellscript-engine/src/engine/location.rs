//! Cell location parsing and normalization.
//!
//! A [`CellLocation`] is a `(sheet, address)` pair in A1 notation.
//! Addresses are normalized at construction: absolute-reference markers
//! (`$`) are stripped and column letters are uppercased, so normalized
//! locations serve as unique keys in every per-cell map of the pipeline.
//!
//! # Examples
//!
//! ```ignore
//! let loc = CellLocation::new("Sheet1", "$b$3");
//! assert_eq!(loc.address, "B3");
//! assert_eq!(loc.column_index(), Some(2)); // 1-based
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

/// A normalized reference to one cell: sheet name plus A1-style address.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellLocation {
    pub sheet: String,
    pub address: String,
}

impl CellLocation {
    /// Create a location, normalizing the address (`$` stripped, letters
    /// uppercased). The sheet name is kept verbatim.
    pub fn new(sheet: impl Into<String>, address: &str) -> CellLocation {
        CellLocation {
            sheet: sheet.into(),
            address: normalize_address(address),
        }
    }

    /// 1-based column index, or None if the address is not valid A1 notation.
    pub fn column_index(&self) -> Option<usize> {
        self.coords().map(|(col, _)| col)
    }

    /// 1-based row index, or None if the address is not valid A1 notation.
    pub fn row_index(&self) -> Option<usize> {
        self.coords().map(|(_, row)| row)
    }

    /// Split the normalized address into 1-based (column, row) indices.
    /// Returns None for malformed addresses or column/row overflow.
    pub fn coords(&self) -> Option<(usize, usize)> {
        let split = self.address.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = self.address.split_at(split);
        if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_uppercase()) {
            return None;
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let col = column_letters_to_index(letters)?;
        let row = digits.parse::<usize>().ok()?;
        if row == 0 {
            return None;
        }
        Some((col, row))
    }

    /// Whether the address parses as A1 notation.
    pub fn is_valid(&self) -> bool {
        self.coords().is_some()
    }
}

impl fmt::Display for CellLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet, self.address)
    }
}

impl Ord for CellLocation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sheet.cmp(&other.sheet).then_with(|| {
            match (self.coords(), other.coords()) {
                // Numeric order so A2 sorts before A10.
                (Some(a), Some(b)) => a.cmp(&b),
                _ => self.address.cmp(&other.address),
            }
        })
    }
}

impl PartialOrd for CellLocation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A rectangular range between two locations on the same sheet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RangeRef {
    pub start: CellLocation,
    pub end: CellLocation,
}

impl RangeRef {
    /// Expand the range into its cells, row-major over the normalized
    /// corner order. Returns None if either endpoint is malformed or the
    /// range covers more than `max_cells` cells.
    pub fn cells(&self, max_cells: usize) -> Option<Vec<CellLocation>> {
        let (start_col, start_row) = self.start.coords()?;
        let (end_col, end_row) = self.end.coords()?;

        let min_col = start_col.min(end_col);
        let max_col = start_col.max(end_col);
        let min_row = start_row.min(end_row);
        let max_row = start_row.max(end_row);

        let cols = max_col - min_col + 1;
        let rows = max_row - min_row + 1;
        let count = cols.checked_mul(rows)?;
        if count > max_cells {
            return None;
        }

        let mut out = Vec::with_capacity(count);
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                let address = format!("{}{}", column_index_to_letters(col), row);
                out.push(CellLocation::new(self.start.sheet.clone(), &address));
            }
        }
        Some(out)
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}!{}:{}",
            self.start.sheet, self.start.address, self.end.address
        )
    }
}

/// A parsed reference: either one cell or a rectangular range.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reference {
    Cell(CellLocation),
    Range(RangeRef),
}

/// Parse a reference in formula text (e.g. `A1`, `$B$2`, `Sheet1!C3`,
/// `Data!A1:A10`). Unqualified references belong to `default_sheet`.
/// Returns None if the text is not a valid reference.
pub fn parse_reference(text: &str, default_sheet: &str) -> Option<Reference> {
    let caps = reference_re().captures(text)?;
    let sheet = caps
        .name("sheet")
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| default_sheet.to_string());

    let start = CellLocation::new(sheet.clone(), &caps["start"]);
    if !start.is_valid() {
        return None;
    }

    match caps.name("end") {
        Some(end) => {
            let end = CellLocation::new(sheet, end.as_str());
            if !end.is_valid() {
                return None;
            }
            Some(Reference::Range(RangeRef { start, end }))
        }
        None => Some(Reference::Cell(start)),
    }
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?<sheet>[A-Za-z_][A-Za-z0-9_]*)!)?(?<start>\$?[A-Za-z]+\$?[0-9]+)(?::(?<end>\$?[A-Za-z]+\$?[0-9]+))?$",
        )
        .expect("reference regex must compile")
    })
}

/// Strip `$` markers and uppercase column letters.
fn normalize_address(address: &str) -> String {
    address
        .chars()
        .filter(|c| *c != '$')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Convert column letters to a 1-based index (A -> 1, Z -> 26, AA -> 27).
/// Returns None on overflow.
pub fn column_letters_to_index(letters: &str) -> Option<usize> {
    let mut acc = 0usize;
    for b in letters.bytes() {
        if !b.is_ascii_uppercase() {
            return None;
        }
        let digit = (b - b'A') as usize + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    if acc == 0 { None } else { Some(acc) }
}

/// Convert a 1-based column index to letters (1 -> A, 26 -> Z, 27 -> AA).
pub fn column_index_to_letters(index: usize) -> String {
    let mut result = String::new();
    let mut n = index as u128;
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}
