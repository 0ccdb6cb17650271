//! Capability surface of a spreadsheet host.
//!
//! The interpreter never touches cell storage directly. Everything goes
//! through [`SpreadsheetHost`], which a mounted widget (or the in-memory
//! [`Workbook`](crate::workbook::Workbook)) implements. Optional operations
//! have default bodies returning [`HostError::Unsupported`], and the host
//! advertises which ones it really provides through [`Capabilities`].

use gridrelay_core::RangeAddress;
use gridrelay_protocol::{SheetTarget, TemplateSheet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which optional operations a host provides.
///
/// Read once when the interpreter is built; a command needing a missing
/// capability fails with its own "... not available" message while the
/// rest of the vocabulary keeps working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub range_values: bool,
    pub merge: bool,
    pub insert_rows: bool,
    pub delete_rows: bool,
    pub insert_cols: bool,
    pub delete_cols: bool,
    pub refresh: bool,
}

impl Capabilities {
    /// Every optional operation available.
    pub const fn full() -> Self {
        Self {
            range_values: true,
            merge: true,
            insert_rows: true,
            delete_rows: true,
            insert_cols: true,
            delete_cols: true,
            refresh: true,
        }
    }

    /// Only the required surface: reads, single-cell writes, sheet switching.
    pub const fn read_only() -> Self {
        Self {
            range_values: false,
            merge: false,
            insert_rows: false,
            delete_rows: false,
            insert_cols: false,
            delete_cols: false,
            refresh: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::full()
    }
}

/// Structural operations, used for capability checks and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralOp {
    InsertRows,
    DeleteRows,
    InsertCols,
    DeleteCols,
}

impl StructuralOp {
    pub fn name(self) -> &'static str {
        match self {
            StructuralOp::InsertRows => "insert_rows",
            StructuralOp::DeleteRows => "delete_rows",
            StructuralOp::InsertCols => "insert_cols",
            StructuralOp::DeleteCols => "delete_cols",
        }
    }

    pub fn is_supported(self, caps: &Capabilities) -> bool {
        match self {
            StructuralOp::InsertRows => caps.insert_rows,
            StructuralOp::DeleteRows => caps.delete_rows,
            StructuralOp::InsertCols => caps.insert_cols,
            StructuralOp::DeleteCols => caps.delete_cols,
        }
    }
}

/// A populated cell as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub row: usize,
    pub col: usize,
    /// Raw value (`v`).
    pub value: Value,
    /// Display text (`m`), when the host formats values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Formula text including the leading `=`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl CellRecord {
    /// Text used for find/replace. Only string cells have one; display
    /// text wins over the raw string when the host formats it.
    pub fn text(&self) -> Option<&str> {
        let raw = self.value.as_str()?;
        Some(self.display.as_deref().unwrap_or(raw))
    }
}

/// A merged block registered at its top-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRegion {
    pub row: usize,
    pub col: usize,
    pub rowspan: usize,
    pub colspan: usize,
}

impl MergeRegion {
    pub fn from_range(range: &RangeAddress) -> Self {
        Self {
            row: range.start_row,
            col: range.start_col,
            rowspan: range.rows(),
            colspan: range.cols(),
        }
    }
}

/// Snapshot of one sheet: identity plus every populated cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRecord {
    pub index: usize,
    pub name: String,
    pub cells: Vec<CellRecord>,
    #[serde(default)]
    pub merges: Vec<MergeRegion>,
}

impl SheetRecord {
    pub fn cell(&self, row: usize, col: usize) -> Option<&CellRecord> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }
}

/// What to write into a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellInput {
    Value(Value),
    /// Formula text, always starting with `=`.
    Formula(String),
}

impl CellInput {
    /// Build a formula input, adding the leading `=` when missing.
    pub fn formula(text: &str) -> Self {
        if text.starts_with('=') {
            CellInput::Formula(text.to_string())
        } else {
            CellInput::Formula(format!("={}", text))
        }
    }
}

/// Failures reported by a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// Host not mounted yet.
    NotReady,
    /// No sheet matches the given name or index.
    SheetNotFound(String),
    /// The host does not implement this optional operation.
    Unsupported(&'static str),
    /// Coordinates outside the host's grid.
    OutOfBounds { row: usize, col: usize },
    /// Host-specific refusal.
    Rejected(String),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::NotReady => write!(f, "Spreadsheet host not ready"),
            HostError::SheetNotFound(target) => write!(f, "Sheet not found: {}", target),
            HostError::Unsupported(op) => write!(f, "{} not available", op),
            HostError::OutOfBounds { row, col } => {
                write!(f, "Cell out of bounds: row {}, col {}", row, col)
            }
            HostError::Rejected(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for HostError {}

/// The spreadsheet widget as seen by the interpreter.
///
/// Writes target the active sheet; callers switch sheets first when they
/// need another one.
pub trait SpreadsheetHost {
    /// False until the widget is mounted and accepting calls.
    fn is_ready(&self) -> bool;

    fn capabilities(&self) -> Capabilities;

    /// Every sheet with its populated cells.
    fn sheets(&self) -> Vec<SheetRecord>;

    fn active_sheet_index(&self) -> Option<usize>;

    fn set_active_sheet(&mut self, target: &SheetTarget) -> Result<(), HostError>;

    fn set_cell_value(&mut self, row: usize, col: usize, input: CellInput) -> Result<(), HostError>;

    /// Bulk write of a rectangular block, row-major.
    fn set_range_values(&mut self, _range: &RangeAddress, _values: &[Vec<Value>]) -> Result<(), HostError> {
        Err(HostError::Unsupported("set_range_values"))
    }

    fn set_merge(&mut self, _sheet_index: usize, _region: MergeRegion) -> Result<(), HostError> {
        Err(HostError::Unsupported("merge"))
    }

    fn insert_rows(&mut self, _index: usize, _count: usize) -> Result<(), HostError> {
        Err(HostError::Unsupported("insert_rows"))
    }

    fn delete_rows(&mut self, _index: usize, _count: usize) -> Result<(), HostError> {
        Err(HostError::Unsupported("delete_rows"))
    }

    fn insert_cols(&mut self, _index: usize, _count: usize) -> Result<(), HostError> {
        Err(HostError::Unsupported("insert_cols"))
    }

    fn delete_cols(&mut self, _index: usize, _count: usize) -> Result<(), HostError> {
        Err(HostError::Unsupported("delete_cols"))
    }

    /// Repaint after a mutation.
    fn refresh(&mut self) {}

    /// Replace the grid contents with a template document.
    fn load_template(&mut self, _sheets: &[TemplateSheet]) -> Result<(), HostError> {
        Err(HostError::Unsupported("load_template"))
    }
}
