//! A1-style cell addressing.
//!
//! Converts between textual references (`"C12"`, `"A1:B2"`) and zero-based
//! row/column indices. Column letters are a bijective base-26 number
//! (A=1 … Z=26, AA=27 …) shifted down by one for zero-basing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single cell position (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", format_column(self.col), self.row + 1)
    }
}

/// An inclusive rectangular block of cells. Always normalized so that
/// `start_* <= end_*` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeAddress {
    pub start_row: usize,
    pub end_row: usize,
    pub start_col: usize,
    pub end_col: usize,
}

impl RangeAddress {
    /// Build a range from two corners in any order.
    pub fn from_corners(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start_row: a.row.min(b.row),
            end_row: a.row.max(b.row),
            start_col: a.col.min(b.col),
            end_col: a.col.max(b.col),
        }
    }

    /// Number of rows covered.
    pub fn rows(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    /// Number of columns covered.
    pub fn cols(&self) -> usize {
        self.end_col - self.start_col + 1
    }

    pub fn top_left(&self) -> CellAddress {
        CellAddress::new(self.start_row, self.start_col)
    }

    pub fn contains(&self, cell: CellAddress) -> bool {
        (self.start_row..=self.end_row).contains(&cell.row)
            && (self.start_col..=self.end_col).contains(&cell.col)
    }
}

impl fmt::Display for RangeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            CellAddress::new(self.start_row, self.start_col),
            CellAddress::new(self.end_row, self.end_col)
        )
    }
}

/// Error returned by the `FromStr` impls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAddressError {
    input: String,
}

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid A1 reference: '{}'", self.input)
    }
}

impl std::error::Error for ParseAddressError {}

impl FromStr for CellAddress {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_a1(s).ok_or_else(|| ParseAddressError { input: s.to_string() })
    }
}

impl FromStr for RangeAddress {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_range(s).ok_or_else(|| ParseAddressError { input: s.to_string() })
    }
}

/// Convert 0-based column index to letters: 0=A, 25=Z, 26=AA, 701=ZZ.
pub fn format_column(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert column letters (any case) to a 0-based index.
///
/// Returns `None` for an empty string, any non-letter, or a value that
/// does not fit in `usize`.
pub fn parse_column(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut acc: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A' + 1) as usize;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    Some(acc - 1)
}

/// Parse an A1 reference such as `"C12"` or `" c12 "`.
///
/// The trimmed input must be one or more letters followed by a row number
/// with no leading zero. Anything else yields `None`.
pub fn parse_a1(text: &str) -> Option<CellAddress> {
    let text = text.trim();
    let split = text.find(|c: char| !c.is_ascii_alphabetic())?;
    let (letters, digits) = text.split_at(split);

    if letters.is_empty() || digits.is_empty() {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) || digits.starts_with('0') {
        return None;
    }

    let row: usize = digits.parse().ok()?;
    let col = parse_column(letters)?;
    Some(CellAddress::new(row - 1, col))
}

/// Parse a range such as `"A1:B2"`. Corners may be given in any order.
pub fn parse_range(text: &str) -> Option<RangeAddress> {
    let mut parts = text.split(':');
    let first = parse_a1(parts.next()?)?;
    let second = parse_a1(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some(RangeAddress::from_corners(first, second))
}
