//! In-memory spreadsheet host.
//!
//! Stands in for a mounted grid widget: the CLI applies commands to it and
//! the tests inspect it. Capabilities and readiness are configurable so
//! partial hosts can be simulated.

use gridrelay_core::RangeAddress;
use gridrelay_protocol::{SheetTarget, TemplateCell, TemplateCellValue, TemplateMerge, TemplateSheet};
use serde_json::Value;

use crate::host::{Capabilities, CellInput, HostError, MergeRegion, SheetRecord, SpreadsheetHost};
use crate::sheet::{display_text, normalize_sheet_name, Cell, Sheet};

/// A single write observed by the workbook, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub sheet: usize,
    pub row: usize,
    pub col: usize,
    pub input: CellInput,
}

/// A workbook containing multiple sheets
#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    active_sheet: usize,
    capabilities: Capabilities,
    ready: bool,
    refresh_count: usize,
    writes: Option<Vec<CellWrite>>,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    /// Create a new workbook with one default sheet
    pub fn new() -> Self {
        Self::from_sheets(vec![Sheet::new("Sheet1")], 0)
    }

    /// Create a workbook from sheets. An empty list gets one default sheet.
    pub fn from_sheets(mut sheets: Vec<Sheet>, active: usize) -> Self {
        if sheets.is_empty() {
            sheets.push(Sheet::new("Sheet1"));
        }
        let active_sheet = active.min(sheets.len() - 1);
        Self {
            sheets,
            active_sheet,
            capabilities: Capabilities::full(),
            ready: true,
            refresh_count: 0,
            writes: None,
        }
    }

    /// Seed from a template document. The first sheet with `status == 1`
    /// becomes active.
    pub fn from_template(template: &[TemplateSheet]) -> Self {
        let sheets = template
            .iter()
            .map(|t| {
                let mut sheet = Sheet::new(t.name.clone());
                for cell in &t.celldata {
                    if !sheet.in_bounds(cell.r, cell.c) {
                        log::debug!("Template cell {},{} outside grid, skipped", cell.r, cell.c);
                        continue;
                    }
                    sheet.insert_cell(cell.r, cell.c, template_cell(&cell.v));
                }
                for m in &t.merges {
                    let region = MergeRegion { row: m.r, col: m.c, rowspan: m.rs, colspan: m.cs };
                    if !sheet.fits(&region) {
                        log::debug!("Template merge at {},{} outside grid, skipped", m.r, m.c);
                        continue;
                    }
                    sheet.set_merge(region);
                }
                sheet
            })
            .collect();
        let active = template.iter().position(|t| t.status == 1).unwrap_or(0);
        Self::from_sheets(sheets, active)
    }

    /// Serialize back to template form.
    pub fn to_template(&self) -> Vec<TemplateSheet> {
        self.sheets
            .iter()
            .enumerate()
            .map(|(i, sheet)| TemplateSheet {
                name: sheet.name.clone(),
                status: u8::from(i == self.active_sheet),
                celldata: sheet
                    .cells_iter()
                    .map(|(&(r, c), cell)| TemplateCell {
                        r,
                        c,
                        v: TemplateCellValue::Full {
                            v: cell.value.clone(),
                            m: cell.display.clone(),
                            f: cell.formula.clone(),
                        },
                    })
                    .collect(),
                merges: sheet
                    .merges()
                    .map(|m| TemplateMerge { r: m.row, c: m.col, rs: m.rowspan, cs: m.colspan })
                    .collect(),
            })
            .collect()
    }

    /// Restrict the advertised capabilities (simulates a partial host).
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Record every cell write, in order. Off by default; the log is
    /// unbounded.
    pub fn with_write_log(mut self) -> Self {
        self.writes = Some(Vec::new());
        self
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Add a sheet at the end, returning its index.
    pub fn add_sheet(&mut self, name: &str) -> usize {
        self.sheets.push(Sheet::new(name));
        self.sheets.len() - 1
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    /// Find a sheet index by name (case-insensitive)
    pub fn sheet_index_by_name(&self, name: &str) -> Option<usize> {
        let key = normalize_sheet_name(name);
        self.sheets.iter().position(|s| normalize_sheet_name(&s.name) == key)
    }

    pub fn active_sheet(&self) -> &Sheet {
        &self.sheets[self.active_sheet]
    }

    /// Raw value at a cell of the active sheet.
    pub fn value_at(&self, row: usize, col: usize) -> Option<&Value> {
        self.active_sheet().get(row, col).map(|c| &c.value)
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_count
    }

    /// Logged writes, oldest first. Empty unless built with
    /// [`Workbook::with_write_log`].
    pub fn writes(&self) -> &[CellWrite] {
        self.writes.as_deref().unwrap_or_default()
    }

    fn ensure_ready(&self) -> Result<(), HostError> {
        if self.ready {
            Ok(())
        } else {
            Err(HostError::NotReady)
        }
    }

    fn require(&self, supported: bool, op: &'static str) -> Result<(), HostError> {
        self.ensure_ready()?;
        if supported {
            Ok(())
        } else {
            Err(HostError::Unsupported(op))
        }
    }

    fn active_mut(&mut self) -> &mut Sheet {
        &mut self.sheets[self.active_sheet]
    }
}

fn template_cell(v: &TemplateCellValue) -> Cell {
    match v {
        TemplateCellValue::Full { v, m, f } => Cell {
            value: v.clone(),
            display: m.clone().or_else(|| display_text(v)),
            formula: f.clone(),
        },
        TemplateCellValue::Scalar(v) => Cell::from_value(v.clone()),
    }
}

impl SpreadsheetHost for Workbook {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn sheets(&self) -> Vec<SheetRecord> {
        self.sheets
            .iter()
            .enumerate()
            .map(|(i, sheet)| sheet.to_record(i))
            .collect()
    }

    fn active_sheet_index(&self) -> Option<usize> {
        Some(self.active_sheet)
    }

    fn set_active_sheet(&mut self, target: &SheetTarget) -> Result<(), HostError> {
        self.ensure_ready()?;
        let index = match target {
            SheetTarget::Index(i) if *i < self.sheets.len() => Some(*i),
            SheetTarget::Index(_) => None,
            SheetTarget::Name(name) => self.sheet_index_by_name(name),
        };
        let index = index.ok_or_else(|| HostError::SheetNotFound(target.to_string()))?;
        self.active_sheet = index;
        Ok(())
    }

    fn set_cell_value(&mut self, row: usize, col: usize, input: CellInput) -> Result<(), HostError> {
        self.ensure_ready()?;
        let sheet_index = self.active_sheet;
        let sheet = &mut self.sheets[sheet_index];
        if !sheet.in_bounds(row, col) {
            return Err(HostError::OutOfBounds { row, col });
        }
        match &mut self.writes {
            Some(log) => {
                sheet.set(row, col, input.clone());
                log.push(CellWrite { sheet: sheet_index, row, col, input });
            }
            None => sheet.set(row, col, input),
        }
        Ok(())
    }

    fn set_range_values(&mut self, range: &RangeAddress, values: &[Vec<Value>]) -> Result<(), HostError> {
        self.require(self.capabilities.range_values, "set_range_values")?;
        if !self.active_sheet().in_bounds(range.end_row, range.end_col) {
            return Err(HostError::OutOfBounds { row: range.end_row, col: range.end_col });
        }
        // Values beyond the block are ignored; cells without a value are left alone.
        for (dr, row_values) in values.iter().take(range.rows()).enumerate() {
            for (dc, value) in row_values.iter().take(range.cols()).enumerate() {
                let (row, col) = (range.start_row + dr, range.start_col + dc);
                self.set_cell_value(row, col, CellInput::Value(value.clone()))?;
            }
        }
        Ok(())
    }

    fn set_merge(&mut self, sheet_index: usize, region: MergeRegion) -> Result<(), HostError> {
        self.require(self.capabilities.merge, "merge")?;
        let sheet = self
            .sheets
            .get_mut(sheet_index)
            .ok_or_else(|| HostError::SheetNotFound(sheet_index.to_string()))?;
        if !sheet.fits(&region) {
            return Err(HostError::OutOfBounds {
                row: region.row.saturating_add(region.rowspan.saturating_sub(1)),
                col: region.col.saturating_add(region.colspan.saturating_sub(1)),
            });
        }
        sheet.set_merge(region);
        Ok(())
    }

    fn insert_rows(&mut self, index: usize, count: usize) -> Result<(), HostError> {
        self.require(self.capabilities.insert_rows, "insert_rows")?;
        self.active_mut().insert_rows(index, count);
        Ok(())
    }

    fn delete_rows(&mut self, index: usize, count: usize) -> Result<(), HostError> {
        self.require(self.capabilities.delete_rows, "delete_rows")?;
        self.active_mut().delete_rows(index, count);
        Ok(())
    }

    fn insert_cols(&mut self, index: usize, count: usize) -> Result<(), HostError> {
        self.require(self.capabilities.insert_cols, "insert_cols")?;
        self.active_mut().insert_cols(index, count);
        Ok(())
    }

    fn delete_cols(&mut self, index: usize, count: usize) -> Result<(), HostError> {
        self.require(self.capabilities.delete_cols, "delete_cols")?;
        self.active_mut().delete_cols(index, count);
        Ok(())
    }

    fn refresh(&mut self) {
        if self.capabilities.refresh {
            self.refresh_count += 1;
        }
    }

    /// Keeps capabilities and readiness; sheets and history are replaced.
    fn load_template(&mut self, sheets: &[TemplateSheet]) -> Result<(), HostError> {
        let seeded = Workbook::from_template(sheets);
        self.sheets = seeded.sheets;
        self.active_sheet = seeded.active_sheet;
        if let Some(log) = &mut self.writes {
            log.clear();
        }
        Ok(())
    }
}
