//! CLI presentation: tables and JSON for command results.

use crate::error::ConfError;
use comfy_table::Table;
use indexmap::IndexMap;

fn to_json(value: &serde_json::Value) -> Result<String, ConfError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ConfError::ConfigError(format!("Failed to encode output: {}", e)))
}

pub fn format_hash(hash: &IndexMap<String, String>, json: bool) -> Result<String, ConfError> {
    if json {
        return serde_json::to_string_pretty(hash)
            .map_err(|e| ConfError::ConfigError(format!("Failed to encode output: {}", e)));
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Key", "Value"]);
    for (key, value) in hash {
        table.add_row(vec![key, value]);
    }
    Ok(table.to_string())
}

/// One matched section: absolute path and its element-child count
pub struct SectionRow {
    pub path: String,
    pub children: usize,
    pub attributes: usize,
}

pub fn format_sections(rows: &[SectionRow], json: bool) -> Result<String, ConfError> {
    if json {
        let arr: Vec<serde_json::Value> = rows
            .iter()
            .map(|r| {
                serde_json::json!({
                    "path": r.path,
                    "children": r.children,
                    "attributes": r.attributes,
                })
            })
            .collect();
        return to_json(&serde_json::Value::Array(arr));
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Path", "Children", "Attributes"]);
    for r in rows {
        table.add_row(vec![
            r.path.clone(),
            r.children.to_string(),
            r.attributes.to_string(),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_value(path: &str, value: &str, json: bool) -> Result<String, ConfError> {
    if json {
        return to_json(&serde_json::json!({ "path": path, "value": value }));
    }
    Ok(value.to_string())
}
