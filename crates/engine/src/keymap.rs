//! Semantic key → cell location table.
//!
//! Built once from the backend's mapping rows and swapped in whole; a
//! partially built table is never visible to readers.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// Where a semantic field lives in the workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyMapEntry {
    pub key: String,
    pub cell_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
}

/// Mapping input was not a list of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMapError(pub String);

impl std::fmt::Display for KeyMapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid key mapping: {}", self.0)
    }
}

impl std::error::Error for KeyMapError {}

#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    entries: HashMap<String, KeyMapEntry>,
}

impl KeyMap {
    /// Build a table from raw mapping rows.
    ///
    /// Field names: `key` (or `field`), `cell` (or `cellReference`),
    /// `sheet` (or `sheetName`). Rows without a usable key and cell are
    /// dropped; a repeated key keeps the last row.
    pub fn from_rows(rows: &Value) -> Result<Self, KeyMapError> {
        let rows = rows
            .as_array()
            .ok_or_else(|| KeyMapError(format!("expected an array of rows, got {}", json_kind(rows))))?;

        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            let Some(key) = text_field(row, &["key", "field"]) else { continue };
            let Some(cell) = text_field(row, &["cell", "cellReference"]) else { continue };
            let sheet_name = text_field(row, &["sheet", "sheetName"]);

            entries.insert(key.clone(), KeyMapEntry {
                key,
                cell_reference: cell,
                sheet_name,
            });
        }

        Ok(Self { entries })
    }

    pub fn resolve(&self, key: &str) -> Option<&KeyMapEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// First non-blank string among `names`, trimmed.
fn text_field(row: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| row.get(*name).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_rows_basic() {
        let map = KeyMap::from_rows(&json!([
            {"key": "purchase_price", "cell": "C12", "sheet": "Inputs"},
            {"key": "cap_rate", "cell": "D4"},
        ])).unwrap();

        assert_eq!(map.len(), 2);
        let entry = map.resolve("purchase_price").unwrap();
        assert_eq!(entry.cell_reference, "C12");
        assert_eq!(entry.sheet_name.as_deref(), Some("Inputs"));
        assert_eq!(map.resolve("cap_rate").unwrap().sheet_name, None);
        assert!(map.resolve("missing").is_none());
    }

    #[test]
    fn test_fallback_field_names() {
        let map = KeyMap::from_rows(&json!([
            {"field": "noi", "cellReference": "B7", "sheetName": "Summary"},
        ])).unwrap();
        let entry = map.resolve("noi").unwrap();
        assert_eq!(entry.cell_reference, "B7");
        assert_eq!(entry.sheet_name.as_deref(), Some("Summary"));
    }

    #[test]
    fn test_drops_incomplete_rows() {
        let map = KeyMap::from_rows(&json!([
            {"key": "no_cell"},
            {"cell": "A1"},
            {"key": "  ", "cell": "A2"},
            {"key": "numeric_cell", "cell": 12},
            "not an object",
            {"key": "ok", "cell": "A3"},
        ])).unwrap();
        assert_eq!(map.keys(), vec!["ok"]);
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let map = KeyMap::from_rows(&json!([
            {"key": "rent", "cell": "A1"},
            {"key": "rent", "cell": "B1"},
        ])).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.resolve("rent").unwrap().cell_reference, "B1");
    }

    #[test]
    fn test_empty_array_is_ok() {
        let map = KeyMap::from_rows(&json!([])).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_non_array_is_error() {
        let err = KeyMap::from_rows(&json!({"key": "x"})).unwrap_err();
        assert!(err.to_string().contains("object"));
        assert!(KeyMap::from_rows(&Value::Null).is_err());
    }
}
