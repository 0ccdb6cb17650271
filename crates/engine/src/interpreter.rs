//! Command interpreter.
//!
//! Turns one [`Command`] into calls on a [`SpreadsheetHost`] and reports a
//! [`CommandResult`]. Nothing here returns `Err` or panics on bad input:
//! every failure is a `{ ok: false, error }` result, and a batch keeps going
//! after a failed command.

use std::sync::Arc;

use gridrelay_core::{parse_a1, parse_range, CellAddress};
use gridrelay_protocol::{Command, CommandResult, SheetTarget};
use serde_json::Value;

use crate::host::{Capabilities, CellInput, HostError, MergeRegion, SheetRecord, SpreadsheetHost, StructuralOp};
use crate::keymap::{KeyMap, KeyMapEntry};

const INVALID_A1: &str = "Invalid A1 reference";
const INVALID_RANGE: &str = "Invalid range";
const KEYMAP_NOT_LOADED: &str = "Key mapping not loaded";

/// Applies commands to a host. Owns the host and the key mapping table.
pub struct Interpreter<H: SpreadsheetHost> {
    host: H,
    capabilities: Capabilities,
    key_map: Option<Arc<KeyMap>>,
}

impl<H: SpreadsheetHost> Interpreter<H> {
    /// Wrap a host. Its capabilities are read once, here.
    pub fn new(host: H) -> Self {
        let capabilities = host.capabilities();
        Self { host, capabilities, key_map: None }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Replace the key table from raw mapping rows.
    ///
    /// Returns false only when `rows` is not an array; the previous table
    /// stays in place in that case. An empty table is a successful load.
    pub fn load_key_map(&mut self, rows: &Value) -> bool {
        match KeyMap::from_rows(rows) {
            Ok(map) => {
                log::debug!("Loaded key mapping with {} entries", map.len());
                self.key_map = Some(Arc::new(map));
                true
            }
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    /// Shared handle to the current table, if one was loaded.
    pub fn key_map(&self) -> Option<Arc<KeyMap>> {
        self.key_map.clone()
    }

    /// Apply a batch in order. One result per command, same order; a failure
    /// never stops later commands.
    pub fn apply_commands(&mut self, commands: &[Value]) -> Vec<CommandResult> {
        commands.iter().map(|raw| self.apply_command(raw)).collect()
    }

    /// Apply one command given as raw JSON.
    pub fn apply_command(&mut self, raw: &Value) -> CommandResult {
        let type_name = raw.get("type").and_then(Value::as_str).unwrap_or_default();
        if !Command::is_known_type(type_name) {
            return CommandResult::failure(format!("Unsupported command: {}", type_name));
        }
        match serde_json::from_value::<Command>(raw.clone()) {
            Ok(command) => self.apply(&command),
            Err(e) => CommandResult::failure(format!("Invalid command payload: {}", e)),
        }
    }

    /// Apply one typed command.
    pub fn apply(&mut self, command: &Command) -> CommandResult {
        let result = match command {
            Command::SetValue { a1, value, sheet_name } => {
                self.set_at_a1(a1, CellInput::Value(value.clone()), sheet_name.as_deref())
            }
            Command::SetFormula { a1, formula, sheet_name } => {
                self.set_at_a1(a1, CellInput::formula(formula), sheet_name.as_deref())
            }
            Command::SetKeyValue { key, value } => {
                self.set_at_key(key, CellInput::Value(value.clone()))
            }
            Command::SetKeyFormula { key, formula } => {
                self.set_at_key(key, CellInput::formula(formula))
            }
            Command::GetValue { a1, sheet_name } => self.get_at_a1(a1, sheet_name.as_deref()),
            Command::GetKeyValue { key } => self.get_at_key(key),
            Command::SetRangeValues { range, values, sheet_name } => {
                self.set_range_values(range, values, sheet_name.as_deref())
            }
            Command::Merge { range, sheet_name } => self.merge(range, sheet_name.as_deref()),
            Command::InsertRows { index, count } => self.structural(StructuralOp::InsertRows, *index, *count),
            Command::DeleteRows { index, count } => self.structural(StructuralOp::DeleteRows, *index, *count),
            Command::InsertCols { index, count } => self.structural(StructuralOp::InsertCols, *index, *count),
            Command::DeleteCols { index, count } => self.structural(StructuralOp::DeleteCols, *index, *count),
            Command::SetActiveSheet { sheet } => self.set_active_sheet(sheet),
            Command::FindReplace { find, replace, sheet_name } => {
                self.find_replace(find.as_deref(), replace.as_deref(), sheet_name.as_deref())
            }
        };

        if let Some(err) = &result.error {
            log::debug!("{} failed: {}", command.type_name(), err);
        }
        result
    }

    // ── Writes ──────────────────────────────────────────────────────

    fn set_at_a1(&mut self, a1: &str, input: CellInput, sheet_name: Option<&str>) -> CommandResult {
        let Some(cell) = parse_a1(a1) else {
            return CommandResult::failure(INVALID_A1);
        };
        self.write_cell(cell, input, sheet_name)
    }

    fn set_at_key(&mut self, key: &str, input: CellInput) -> CommandResult {
        let entry = match self.lookup_key(key) {
            Ok(entry) => entry,
            Err(result) => return result,
        };
        self.set_at_a1(&entry.cell_reference, input, entry.sheet_name.as_deref())
    }

    /// Shared write path: readiness, optional sheet switch, write, refresh.
    fn write_cell(&mut self, cell: CellAddress, input: CellInput, sheet_name: Option<&str>) -> CommandResult {
        if !self.host.is_ready() {
            return failure(HostError::NotReady);
        }
        if let Some(name) = sheet_name {
            if let Err(result) = self.switch_to(name) {
                return result;
            }
        }
        self.write_active(cell, input)
    }

    /// Write to the active sheet, then refresh.
    fn write_active(&mut self, cell: CellAddress, input: CellInput) -> CommandResult {
        if let Err(e) = self.host.set_cell_value(cell.row, cell.col, input) {
            return failure(e);
        }
        if self.capabilities.refresh {
            self.host.refresh();
        }
        CommandResult::ok()
    }

    /// Make `name` the active sheet unless it already is.
    fn switch_to(&mut self, name: &str) -> Result<(), CommandResult> {
        let sheets = self.host.sheets();
        let index = sheet_index_by_name(&sheets, name)
            .ok_or_else(|| CommandResult::failure("Sheet not found"))?;
        self.activate(index)
    }

    fn activate(&mut self, index: usize) -> Result<(), CommandResult> {
        if self.host.active_sheet_index() == Some(index) {
            return Ok(());
        }
        self.host
            .set_active_sheet(&SheetTarget::Index(index))
            .map_err(|_| CommandResult::failure("Sheet not found"))
    }

    fn set_range_values(&mut self, range: &str, values: &[Vec<Value>], sheet_name: Option<&str>) -> CommandResult {
        let Some(range) = parse_range(range) else {
            return CommandResult::failure(INVALID_RANGE);
        };
        if !self.host.is_ready() {
            return failure(HostError::NotReady);
        }
        if !self.capabilities.range_values {
            return CommandResult::failure("Range API unavailable");
        }
        if let Some(name) = sheet_name {
            if let Err(result) = self.switch_to(name) {
                return result;
            }
        }
        if let Err(e) = self.host.set_range_values(&range, values) {
            return failure(e);
        }
        if self.capabilities.refresh {
            self.host.refresh();
        }
        CommandResult::ok()
    }

    fn merge(&mut self, range: &str, sheet_name: Option<&str>) -> CommandResult {
        let Some(range) = parse_range(range) else {
            return CommandResult::failure(INVALID_RANGE);
        };
        if !self.host.is_ready() {
            return failure(HostError::NotReady);
        }
        if !self.capabilities.merge {
            return CommandResult::failure("merge not available");
        }
        let sheets = self.host.sheets();
        let Some(sheet) = self.resolve_sheet(&sheets, sheet_name) else {
            return CommandResult::failure("Sheet not found");
        };
        let index = sheet.index;
        if let Err(e) = self.host.set_merge(index, MergeRegion::from_range(&range)) {
            return failure(e);
        }
        if self.capabilities.refresh {
            self.host.refresh();
        }
        CommandResult::ok()
    }

    fn structural(&mut self, op: StructuralOp, index: usize, count: usize) -> CommandResult {
        if !self.host.is_ready() {
            return failure(HostError::NotReady);
        }
        if !op.is_supported(&self.capabilities) {
            return CommandResult::failure(format!("{} not available", op.name()));
        }
        let outcome = match op {
            StructuralOp::InsertRows => self.host.insert_rows(index, count),
            StructuralOp::DeleteRows => self.host.delete_rows(index, count),
            StructuralOp::InsertCols => self.host.insert_cols(index, count),
            StructuralOp::DeleteCols => self.host.delete_cols(index, count),
        };
        match outcome {
            Ok(()) => {
                if self.capabilities.refresh {
                    self.host.refresh();
                }
                CommandResult::ok()
            }
            Err(e) => failure(e),
        }
    }

    fn set_active_sheet(&mut self, target: &SheetTarget) -> CommandResult {
        if !self.host.is_ready() {
            return failure(HostError::NotReady);
        }
        match self.host.set_active_sheet(target) {
            Ok(()) => {
                if self.capabilities.refresh {
                    self.host.refresh();
                }
                CommandResult::ok()
            }
            Err(HostError::SheetNotFound(_)) => {
                CommandResult::failure(format!("Sheet not found: {}", target))
            }
            Err(e) => failure(e),
        }
    }

    fn find_replace(&mut self, find: Option<&str>, replace: Option<&str>, sheet_name: Option<&str>) -> CommandResult {
        let find = match find {
            Some(f) if !f.is_empty() => f,
            _ => return CommandResult::failure("Missing find string"),
        };
        let replace = replace.unwrap_or("");
        if !self.host.is_ready() {
            return failure(HostError::NotReady);
        }

        let sheets = self.host.sheets();
        let Some(sheet) = self.resolve_sheet(&sheets, sheet_name) else {
            return CommandResult::failure("Active sheet not found");
        };

        // Literal substring match over string cells; formula cells are left
        // to their formula.
        let edits: Vec<(CellAddress, String)> = sheet
            .cells
            .iter()
            .filter(|cell| cell.formula.is_none())
            .filter_map(|cell| {
                let text = cell.text()?;
                text.contains(find)
                    .then(|| (CellAddress::new(cell.row, cell.col), text.replace(find, replace)))
            })
            .collect();
        if edits.is_empty() {
            return CommandResult::with_changes(0);
        }

        if let Err(result) = self.activate(sheet.index) {
            return result;
        }
        let mut changes = 0;
        for (cell, text) in edits {
            let result = self.write_active(cell, CellInput::Value(Value::String(text)));
            if result.ok {
                changes += 1;
            } else {
                log::debug!("find_replace skipped {}: {:?}", cell, result.error);
            }
        }
        CommandResult::with_changes(changes)
    }

    // ── Reads ───────────────────────────────────────────────────────

    fn get_at_a1(&self, a1: &str, sheet_name: Option<&str>) -> CommandResult {
        let Some(cell) = parse_a1(a1) else {
            return CommandResult::failure(INVALID_A1);
        };
        self.read_cell(cell, sheet_name)
    }

    fn get_at_key(&self, key: &str) -> CommandResult {
        let entry = match self.lookup_key(key) {
            Ok(entry) => entry,
            Err(result) => return result,
        };
        self.get_at_a1(&entry.cell_reference, entry.sheet_name.as_deref())
    }

    fn read_cell(&self, cell: CellAddress, sheet_name: Option<&str>) -> CommandResult {
        if !self.host.is_ready() {
            return failure(HostError::NotReady);
        }
        let sheets = self.host.sheets();
        let Some(sheet) = self.resolve_sheet(&sheets, sheet_name) else {
            return CommandResult::failure("Sheet not found");
        };
        let value = sheet.cell(cell.row, cell.col).map(|c| c.value.clone());
        CommandResult::with_value(value)
    }

    // ── Resolution helpers ──────────────────────────────────────────

    fn lookup_key(&self, key: &str) -> Result<KeyMapEntry, CommandResult> {
        let map = self
            .key_map
            .as_ref()
            .ok_or_else(|| CommandResult::failure(KEYMAP_NOT_LOADED))?;
        map.resolve(key)
            .cloned()
            .ok_or_else(|| CommandResult::failure(format!("Unknown key: {}", key)))
    }

    /// Named sheet if given, else the active sheet, else sheet 0; the record
    /// is then located by that index.
    fn resolve_sheet<'a>(&self, sheets: &'a [SheetRecord], sheet_name: Option<&str>) -> Option<&'a SheetRecord> {
        let index = match sheet_name {
            Some(name) => sheet_index_by_name(sheets, name)?,
            None => self.host.active_sheet_index().unwrap_or(0),
        };
        sheets.iter().find(|s| s.index == index)
    }
}

fn sheet_index_by_name(sheets: &[SheetRecord], name: &str) -> Option<usize> {
    let key = crate::sheet::normalize_sheet_name(name);
    sheets
        .iter()
        .find(|s| crate::sheet::normalize_sheet_name(&s.name) == key)
        .map(|s| s.index)
}

fn failure(e: HostError) -> CommandResult {
    CommandResult::failure(e.to_string())
}
