use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::host::{CellInput, CellRecord, MergeRegion};

/// Default grid size, matching the usual desktop spreadsheet limits.
pub const DEFAULT_ROWS: usize = 1_048_576;
pub const DEFAULT_COLS: usize = 16_384;

/// Stored cell contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl Cell {
    /// A plain value; display text is derived from it.
    pub fn from_value(value: Value) -> Self {
        let display = display_text(&value);
        Self { value, display, formula: None }
    }

    /// A formula. No evaluation happens here, the value stays empty.
    pub fn from_formula(formula: String) -> Self {
        Self { value: Value::Null, display: None, formula: Some(formula) }
    }
}

/// Display text for a raw value. Whole numbers print without a fraction.
pub fn display_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "TRUE".into() } else { "FALSE".into() }),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", f as i64)),
            _ => Some(n.to_string()),
        },
        other => Some(other.to_string()),
    }
}

/// Case-insensitive sheet name key.
pub fn normalize_sheet_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// One sheet of the in-memory workbook: sparse cells plus merge regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(usize, usize), Cell>,
    merges: BTreeMap<(usize, usize), MergeRegion>,
    pub rows: usize,
    pub cols: usize,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_size(name, DEFAULT_ROWS, DEFAULT_COLS)
    }

    pub fn with_size(name: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            merges: BTreeMap::new(),
            rows,
            cols,
        }
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Write a cell. A `Null` value clears it.
    pub fn set(&mut self, row: usize, col: usize, input: CellInput) {
        match input {
            CellInput::Value(Value::Null) => {
                self.cells.remove(&(row, col));
            }
            CellInput::Value(value) => {
                self.cells.insert((row, col), Cell::from_value(value));
            }
            CellInput::Formula(formula) => {
                self.cells.insert((row, col), Cell::from_formula(formula));
            }
        }
    }

    pub fn insert_cell(&mut self, row: usize, col: usize, cell: Cell) {
        self.cells.insert((row, col), cell);
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cells_iter(&self) -> impl Iterator<Item = (&(usize, usize), &Cell)> {
        self.cells.iter()
    }

    /// Register a merge at its top-left cell, replacing any merge there.
    pub fn set_merge(&mut self, region: MergeRegion) {
        self.merges.insert((region.row, region.col), region);
    }

    /// True if the whole region lies inside the grid.
    pub fn fits(&self, region: &MergeRegion) -> bool {
        region.rowspan > 0
            && region.colspan > 0
            && region.row.saturating_add(region.rowspan) <= self.rows
            && region.col.saturating_add(region.colspan) <= self.cols
    }

    pub fn merge_at(&self, row: usize, col: usize) -> Option<&MergeRegion> {
        self.merges.get(&(row, col))
    }

    pub fn merges(&self) -> impl Iterator<Item = &MergeRegion> {
        self.merges.values()
    }

    /// Snapshot for the host surface.
    pub fn to_record(&self, index: usize) -> crate::host::SheetRecord {
        crate::host::SheetRecord {
            index,
            name: self.name.clone(),
            cells: self
                .cells
                .iter()
                .map(|(&(row, col), cell)| CellRecord {
                    row,
                    col,
                    value: cell.value.clone(),
                    display: cell.display.clone(),
                    formula: cell.formula.clone(),
                })
                .collect(),
            merges: self.merges.values().copied().collect(),
        }
    }

    /// Insert rows at the specified position, shifting existing rows down.
    /// Cells pushed past the last row are dropped; a merge that grows is
    /// cut at the grid edge.
    pub fn insert_rows(&mut self, at_row: usize, count: usize) {
        let rows = self.rows;
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter_map(|((r, c), cell)| {
                let r = if r >= at_row { r.saturating_add(count) } else { r };
                (r < rows).then_some(((r, c), cell))
            })
            .collect();
        self.merges = std::mem::take(&mut self.merges)
            .into_values()
            .filter_map(|mut m| {
                if m.row >= at_row {
                    m.row = m.row.saturating_add(count);
                } else if m.row.saturating_add(m.rowspan) > at_row {
                    m.rowspan = m.rowspan.saturating_add(count).min(rows.saturating_sub(m.row));
                }
                (m.row < rows).then_some(((m.row, m.col), m))
            })
            .collect();
    }

    /// Delete rows at the specified position, shifting remaining rows up.
    /// Merges that overlap the deleted band are removed.
    pub fn delete_rows(&mut self, start_row: usize, count: usize) {
        let end = start_row.saturating_add(count);
        let removed = end - start_row;
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter_map(|((r, c), cell)| match r {
                r if r < start_row => Some(((r, c), cell)),
                r if r < end => None,
                r => Some(((r - removed, c), cell)),
            })
            .collect();
        self.merges = std::mem::take(&mut self.merges)
            .into_values()
            .filter_map(|mut m| {
                let overlaps = m.row < end && m.row.saturating_add(m.rowspan) > start_row;
                if overlaps {
                    return None;
                }
                if m.row >= end {
                    m.row -= removed;
                }
                Some(((m.row, m.col), m))
            })
            .collect();
    }

    /// Insert columns at the specified position, shifting existing columns right.
    pub fn insert_cols(&mut self, at_col: usize, count: usize) {
        let cols = self.cols;
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter_map(|((r, c), cell)| {
                let c = if c >= at_col { c.saturating_add(count) } else { c };
                (c < cols).then_some(((r, c), cell))
            })
            .collect();
        self.merges = std::mem::take(&mut self.merges)
            .into_values()
            .filter_map(|mut m| {
                if m.col >= at_col {
                    m.col = m.col.saturating_add(count);
                } else if m.col.saturating_add(m.colspan) > at_col {
                    m.colspan = m.colspan.saturating_add(count).min(cols.saturating_sub(m.col));
                }
                (m.col < cols).then_some(((m.row, m.col), m))
            })
            .collect();
    }

    /// Delete columns at the specified position, shifting remaining columns left.
    pub fn delete_cols(&mut self, start_col: usize, count: usize) {
        let end = start_col.saturating_add(count);
        let removed = end - start_col;
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter_map(|((r, c), cell)| match c {
                c if c < start_col => Some(((r, c), cell)),
                c if c < end => None,
                c => Some(((r, c - removed), cell)),
            })
            .collect();
        self.merges = std::mem::take(&mut self.merges)
            .into_values()
            .filter_map(|mut m| {
                let overlaps = m.col < end && m.col.saturating_add(m.colspan) > start_col;
                if overlaps {
                    return None;
                }
                if m.col >= end {
                    m.col -= removed;
                }
                Some(((m.row, m.col), m))
            })
            .collect();
    }
}
