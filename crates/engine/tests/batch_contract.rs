// Batch-level contract tests: a full command batch as the backend would
// send it, against the in-memory workbook and against a minimal host that
// only implements the required surface.

use std::collections::BTreeMap;

use gridrelay_engine::*;
use gridrelay_protocol::{CommandResult, CommandsResponse, SheetTarget};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Minimal host: required methods only, optional ones fall back to defaults
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BareGrid {
    cells: BTreeMap<(usize, usize), Value>,
}

impl SpreadsheetHost for BareGrid {
    fn is_ready(&self) -> bool {
        true
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::read_only()
    }

    fn sheets(&self) -> Vec<SheetRecord> {
        vec![SheetRecord {
            index: 0,
            name: "Grid".into(),
            cells: self
                .cells
                .iter()
                .map(|(&(row, col), v)| CellRecord {
                    row,
                    col,
                    value: v.clone(),
                    display: None,
                    formula: None,
                })
                .collect(),
            merges: Vec::new(),
        }]
    }

    fn active_sheet_index(&self) -> Option<usize> {
        None
    }

    fn set_active_sheet(&mut self, target: &SheetTarget) -> Result<(), HostError> {
        match target {
            SheetTarget::Index(0) => Ok(()),
            other => Err(HostError::SheetNotFound(other.to_string())),
        }
    }

    fn set_cell_value(&mut self, row: usize, col: usize, input: CellInput) -> Result<(), HostError> {
        match input {
            CellInput::Value(v) => self.cells.insert((row, col), v),
            CellInput::Formula(f) => self.cells.insert((row, col), Value::String(f)),
        };
        Ok(())
    }
}

#[test]
fn bare_host_degrades_per_command() {
    let mut it = Interpreter::new(BareGrid::default());
    let results = it.apply_commands(&[
        json!({"type": "set_value", "a1": "A1", "value": "Rent Roll"}),
        json!({"type": "merge", "range": "A1:C1"}),
        json!({"type": "insert_cols", "index": 2}),
        json!({"type": "set_range_values", "range": "A2:B2", "values": [[1, 2]]}),
        json!({"type": "get_value", "a1": "A1"}),
        json!({"type": "find_replace", "find": "Rent", "replace": "Lease"}),
        json!({"type": "get_value", "a1": "a1"}),
    ]);

    assert_eq!(results[0], CommandResult::ok());
    assert_eq!(results[1], CommandResult::failure("merge not available"));
    assert_eq!(results[2], CommandResult::failure("insert_cols not available"));
    assert_eq!(results[3], CommandResult::failure("Range API unavailable"));
    // No active sheet reported: resolution falls back to sheet 0.
    assert_eq!(results[4].value, Some(json!("Rent Roll")));
    assert_eq!(results[5], CommandResult::with_changes(1));
    assert_eq!(results[6].value, Some(json!("Lease Roll")));
}

// ---------------------------------------------------------------------------
// Full workbook: an underwriting batch straight off the wire
// ---------------------------------------------------------------------------

#[test]
fn underwriting_batch_from_wire() {
    let body = r#"{
        "commands": [
            {"type": "set_key_value", "key": "purchase_price", "value": 2400000},
            {"type": "set_key_value", "key": "gross_rent", "value": 310000},
            {"type": "set_key_formula", "key": "cap_rate", "formula": "B3/B2"},
            {"type": "set_active_sheet", "sheet": "Assumptions"},
            {"type": "set_value", "a1": "A1", "value": "Assumptions 2024"},
            {"type": "find_replace", "find": "2024", "replace": "2025"},
            {"type": "get_key_value", "key": "gross_rent"},
            {"type": "set_key_value", "key": "missing_key", "value": 1},
            {"type": "launch_rockets"}
        ]
    }"#;
    let batch: CommandsResponse = serde_json::from_str(body).unwrap();

    let mut wb = Workbook::new();
    wb.add_sheet("Assumptions");
    let mut it = Interpreter::new(wb);
    assert!(it.load_key_map(&json!([
        {"key": "purchase_price", "cell": "B2", "sheet": "Sheet1"},
        {"key": "gross_rent", "cell": "B3", "sheet": "Sheet1"},
        {"key": "cap_rate", "cell": "B4", "sheet": "Sheet1"},
    ])));

    let results = it.apply_commands(&batch.commands);
    assert_eq!(results.len(), 9);
    assert!(results[..7].iter().all(|r| r.ok), "{:?}", results);
    assert_eq!(results[5].changes, Some(1));
    assert_eq!(results[6].value, Some(json!(310000)));
    assert_eq!(results[7], CommandResult::failure("Unknown key: missing_key"));
    assert_eq!(results[8], CommandResult::failure("Unsupported command: launch_rockets"));

    let wb = it.into_host();
    let main = wb.sheet(0).unwrap();
    assert_eq!(main.get(1, 1).unwrap().value, json!(2400000));
    assert_eq!(main.get(3, 1).unwrap().formula.as_deref(), Some("=B3/B2"));
    assert_eq!(wb.sheet(1).unwrap().get(0, 0).unwrap().value, json!("Assumptions 2025"));
}
