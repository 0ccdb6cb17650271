//! gridrelay wire format: commands, results, and backend payloads.
//!
//! This crate defines the JSON contract between the command backend and
//! the relay running next to a spreadsheet host:
//!
//! - `GET {base}/spreadsheet/commands?sessionId={id}` → [`CommandsResponse`]
//! - `GET {base}/spreadsheet/mapping` → [`MappingResponse`]
//! - `GET {base}/spreadsheet/get-template` → [`TemplateResponse`]
//! - `POST {base}/spreadsheet/results` ← [`ResultsReport`]
//!
//! # Usage
//!
//! ```ignore
//! use gridrelay_protocol::{Command, CommandResult};
//!
//! let cmd: Command = serde_json::from_str(r#"{"type":"set_value","a1":"A1","value":1}"#)?;
//! let ok = CommandResult::ok();
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every command `type` the interpreter understands.
pub const COMMAND_TYPES: &[&str] = &[
    "set_value",
    "set_formula",
    "set_key_value",
    "set_key_formula",
    "get_value",
    "get_key_value",
    "set_range_values",
    "merge",
    "insert_rows",
    "delete_rows",
    "insert_cols",
    "delete_cols",
    "set_active_sheet",
    "find_replace",
];

// =============================================================================
// Commands
// =============================================================================

/// One structured instruction against the spreadsheet host.
///
/// Most payload fields default when absent so that a missing field surfaces
/// as a validation failure ("Invalid A1 reference", "Missing find string")
/// rather than a deserialization error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SetValue {
        #[serde(default)]
        a1: String,
        #[serde(default)]
        value: Value,
        #[serde(rename = "sheetName", alias = "sheet_name", default, skip_serializing_if = "Option::is_none")]
        sheet_name: Option<String>,
    },
    SetFormula {
        #[serde(default)]
        a1: String,
        #[serde(default)]
        formula: String,
        #[serde(rename = "sheetName", alias = "sheet_name", default, skip_serializing_if = "Option::is_none")]
        sheet_name: Option<String>,
    },
    SetKeyValue {
        #[serde(default)]
        key: String,
        #[serde(default)]
        value: Value,
    },
    SetKeyFormula {
        #[serde(default)]
        key: String,
        #[serde(default)]
        formula: String,
    },
    GetValue {
        #[serde(default)]
        a1: String,
        #[serde(rename = "sheetName", alias = "sheet_name", default, skip_serializing_if = "Option::is_none")]
        sheet_name: Option<String>,
    },
    GetKeyValue {
        #[serde(default)]
        key: String,
    },
    SetRangeValues {
        #[serde(default)]
        range: String,
        #[serde(default)]
        values: Vec<Vec<Value>>,
        #[serde(rename = "sheetName", alias = "sheet_name", default, skip_serializing_if = "Option::is_none")]
        sheet_name: Option<String>,
    },
    Merge {
        #[serde(default)]
        range: String,
        #[serde(rename = "sheetName", alias = "sheet_name", default, skip_serializing_if = "Option::is_none")]
        sheet_name: Option<String>,
    },
    InsertRows {
        #[serde(default)]
        index: usize,
        #[serde(default = "default_count")]
        count: usize,
    },
    DeleteRows {
        #[serde(default)]
        index: usize,
        #[serde(default = "default_count")]
        count: usize,
    },
    InsertCols {
        #[serde(default)]
        index: usize,
        #[serde(default = "default_count")]
        count: usize,
    },
    DeleteCols {
        #[serde(default)]
        index: usize,
        #[serde(default = "default_count")]
        count: usize,
    },
    SetActiveSheet {
        #[serde(alias = "sheetName", alias = "name", alias = "index")]
        sheet: SheetTarget,
    },
    FindReplace {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        find: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replace: Option<String>,
        #[serde(rename = "sheetName", alias = "sheet_name", default, skip_serializing_if = "Option::is_none")]
        sheet_name: Option<String>,
    },
}

fn default_count() -> usize {
    1
}

impl Command {
    /// The wire `type` discriminator.
    pub fn type_name(&self) -> &'static str {
        match self {
            Command::SetValue { .. } => "set_value",
            Command::SetFormula { .. } => "set_formula",
            Command::SetKeyValue { .. } => "set_key_value",
            Command::SetKeyFormula { .. } => "set_key_formula",
            Command::GetValue { .. } => "get_value",
            Command::GetKeyValue { .. } => "get_key_value",
            Command::SetRangeValues { .. } => "set_range_values",
            Command::Merge { .. } => "merge",
            Command::InsertRows { .. } => "insert_rows",
            Command::DeleteRows { .. } => "delete_rows",
            Command::InsertCols { .. } => "insert_cols",
            Command::DeleteCols { .. } => "delete_cols",
            Command::SetActiveSheet { .. } => "set_active_sheet",
            Command::FindReplace { .. } => "find_replace",
        }
    }

    /// True if `type_name` is part of the command vocabulary.
    pub fn is_known_type(type_name: &str) -> bool {
        COMMAND_TYPES.contains(&type_name)
    }
}

/// A sheet selected by display name or by zero-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetTarget {
    Index(usize),
    Name(String),
}

impl std::fmt::Display for SheetTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetTarget::Index(i) => write!(f, "{}", i),
            SheetTarget::Name(name) => write!(f, "{}", name),
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// Outcome of one command. Failures are values, never panics or `Err`s.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<usize>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self { ok: true, ..Self::default() }
    }

    /// Successful read. A `Null` value is reported as absent.
    pub fn with_value(value: Option<Value>) -> Self {
        Self {
            ok: true,
            value: value.filter(|v| !v.is_null()),
            ..Self::default()
        }
    }

    pub fn with_changes(changes: usize) -> Self {
        Self { ok: true, changes: Some(changes), ..Self::default() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { ok: false, error: Some(message.into()), ..Self::default() }
    }
}

// =============================================================================
// Backend payloads
// =============================================================================

/// Body of `GET /spreadsheet/commands`.
///
/// Commands stay as raw JSON so that one malformed or unknown entry only
/// fails itself, not the whole batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandsResponse {
    #[serde(default, deserialize_with = "array_or_empty")]
    pub commands: Vec<Value>,
}

fn array_or_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

/// Body of `GET /spreadsheet/mapping`. Rows are kept raw; the key map
/// decides which ones are usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub mapping: Value,
}

/// Body of `GET /spreadsheet/get-template`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<SheetDocument>,
}

/// Template document: either a bare list of sheets or `{ "sheets": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetDocument {
    Sheets(Vec<TemplateSheet>),
    Wrapped { sheets: Vec<TemplateSheet> },
}

impl SheetDocument {
    pub fn into_sheets(self) -> Vec<TemplateSheet> {
        match self {
            SheetDocument::Sheets(sheets) => sheets,
            SheetDocument::Wrapped { sheets } => sheets,
        }
    }
}

/// One sheet of a template document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSheet {
    pub name: String,
    /// 1 marks the active sheet.
    #[serde(default)]
    pub status: u8,
    #[serde(default)]
    pub celldata: Vec<TemplateCell>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merges: Vec<TemplateMerge>,
}

/// Sparse cell entry: `{ "r": 0, "c": 1, "v": { "v": 42, "m": "42", "f": "=..." } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateCell {
    pub r: usize,
    pub c: usize,
    pub v: TemplateCellValue,
}

/// Raw value `v`, display text `m`, formula `f`. A bare scalar is accepted
/// as shorthand for `{ "v": scalar }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateCellValue {
    Full {
        #[serde(default)]
        v: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        m: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        f: Option<String>,
    },
    Scalar(Value),
}

/// Merge entry in a template sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMerge {
    pub r: usize,
    pub c: usize,
    pub rs: usize,
    pub cs: usize,
}

/// Body of `POST /spreadsheet/results`: outcomes of one applied batch, in
/// command order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsReport {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub results: Vec<CommandResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_value_parses() {
        let cmd: Command = serde_json::from_value(json!({
            "type": "set_value", "a1": "A1", "value": "hello"
        })).unwrap();
        assert_eq!(cmd, Command::SetValue {
            a1: "A1".into(),
            value: json!("hello"),
            sheet_name: None,
        });
        assert_eq!(cmd.type_name(), "set_value");
    }

    #[test]
    fn test_sheet_name_camel_and_snake() {
        let camel: Command = serde_json::from_value(json!({
            "type": "get_value", "a1": "B2", "sheetName": "Inputs"
        })).unwrap();
        let snake: Command = serde_json::from_value(json!({
            "type": "get_value", "a1": "B2", "sheet_name": "Inputs"
        })).unwrap();
        assert_eq!(camel, snake);
    }

    #[test]
    fn test_structural_defaults() {
        let cmd: Command = serde_json::from_value(json!({"type": "insert_rows"})).unwrap();
        assert_eq!(cmd, Command::InsertRows { index: 0, count: 1 });
    }

    #[test]
    fn test_missing_fields_default() {
        let cmd: Command = serde_json::from_value(json!({"type": "set_formula"})).unwrap();
        assert_eq!(cmd, Command::SetFormula {
            a1: String::new(),
            formula: String::new(),
            sheet_name: None,
        });
    }

    #[test]
    fn test_set_active_sheet_target() {
        let by_name: Command = serde_json::from_value(json!({
            "type": "set_active_sheet", "sheet": "Summary"
        })).unwrap();
        assert_eq!(by_name, Command::SetActiveSheet { sheet: SheetTarget::Name("Summary".into()) });

        let by_index: Command = serde_json::from_value(json!({
            "type": "set_active_sheet", "index": 2
        })).unwrap();
        assert_eq!(by_index, Command::SetActiveSheet { sheet: SheetTarget::Index(2) });
    }

    #[test]
    fn test_unknown_type_fails_to_parse() {
        let err = serde_json::from_value::<Command>(json!({"type": "explode"}));
        assert!(err.is_err());
        assert!(!Command::is_known_type("explode"));
        assert!(Command::is_known_type("find_replace"));
    }

    #[test]
    fn test_result_serialization_omits_empty_fields() {
        let json = serde_json::to_value(CommandResult::ok()).unwrap();
        assert_eq!(json, json!({"ok": true}));

        let json = serde_json::to_value(CommandResult::failure("Invalid range")).unwrap();
        assert_eq!(json, json!({"ok": false, "error": "Invalid range"}));

        let json = serde_json::to_value(CommandResult::with_changes(3)).unwrap();
        assert_eq!(json, json!({"ok": true, "changes": 3}));
    }

    #[test]
    fn test_with_value_drops_null() {
        assert_eq!(CommandResult::with_value(Some(Value::Null)).value, None);
        assert_eq!(CommandResult::with_value(Some(json!(5))).value, Some(json!(5)));
    }

    #[test]
    fn test_commands_response_tolerates_non_array() {
        let resp: CommandsResponse = serde_json::from_value(json!({"commands": "nope"})).unwrap();
        assert!(resp.commands.is_empty());

        let resp: CommandsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(resp.commands.is_empty());

        let resp: CommandsResponse = serde_json::from_value(json!({
            "commands": [{"type": "set_value"}, {"type": "bogus"}]
        })).unwrap();
        assert_eq!(resp.commands.len(), 2);
    }

    #[test]
    fn test_template_document_shapes() {
        let bare: SheetDocument = serde_json::from_value(json!([
            {"name": "Sheet1", "status": 1, "celldata": [{"r": 0, "c": 0, "v": {"v": 1, "m": "1"}}]}
        ])).unwrap();
        let sheets = bare.into_sheets();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].celldata[0].v, TemplateCellValue::Full {
            v: json!(1),
            m: Some("1".into()),
            f: None,
        });

        let wrapped: SheetDocument = serde_json::from_value(json!({
            "sheets": [{"name": "A"}, {"name": "B"}]
        })).unwrap();
        assert_eq!(wrapped.into_sheets().len(), 2);
    }

    #[test]
    fn test_results_report_wire_names() {
        let report = ResultsReport {
            session_id: "abc".into(),
            results: vec![CommandResult::ok()],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sessionId"], "abc");
        assert_eq!(json["results"][0]["ok"], true);
    }
}
