//! SQL → gallery index export.
//!
//! Rebuilds a table from two SQL scripts — schema statements and data
//! statements — inside an in-memory SQLite store, then derives one
//! filesystem-safe **join key** per row and writes two artifacts:
//!
//! - a plain-text listing of the keys, `\n`-joined;
//! - a pretty-printed JSON array with one object per row, in table column
//!   order, each augmented with `image_path` = `<join key>.avif` so the
//!   index lines up with the converted assets.
//!
//! ## Join keys
//!
//! A row's key is the concatenation of its column values, minus one
//! designated excluded column and minus NULLs, each value coerced to text
//! and stripped of characters that have no business in a filename (path
//! separators, shell wildcards, quoting, NUL, and the extension dot),
//! joined with `-`. A value that sanitizes away completely still occupies
//! its join slot, so the `-` separators stay aligned with the surviving
//! columns.
//!
//! ## Failure model
//!
//! There is no partial-row recovery: a missing input script, a statement
//! that fails to execute, or an artifact that cannot be written all abort
//! the run with nothing (or nothing further) on disk. The store itself is
//! connection-scoped and is released on every exit path.

use crate::codec;
use rusqlite::Connection;
use rusqlite::types::Value;
use serde_json::{Map, Value as Json};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("required input file not found: {0}")]
    InputNotFound(PathBuf),
    #[error("store execution failed: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Characters stripped from every join-key component.
const FORBIDDEN_CHARS: &[char] = &[
    '/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0', '.',
];

/// Everything one export run needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Script with the CREATE statements.
    pub schema_path: PathBuf,
    /// Script with the INSERT statements.
    pub data_path: PathBuf,
    /// Table the export reads.
    pub table: String,
    /// Zero-based column index left out of every join key.
    pub excluded_column: usize,
    /// Destination of the `\n`-joined key listing.
    pub keys_path: PathBuf,
    /// Destination of the JSON array artifact.
    pub json_path: PathBuf,
}

/// What an export run produced.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub rows: usize,
    pub keys_path: PathBuf,
    pub json_path: PathBuf,
}

/// Run the export end to end: load both scripts into a fresh in-memory
/// store, read the table, write the key listing and the JSON artifact.
pub fn export(options: &ExportOptions) -> Result<ExportSummary, ExportError> {
    // Both inputs must exist before the store is even opened.
    for path in [&options.schema_path, &options.data_path] {
        if !path.exists() {
            return Err(ExportError::InputNotFound(path.clone()));
        }
    }
    let schema_sql = fs::read_to_string(&options.schema_path)?;
    let data_sql = fs::read_to_string(&options.data_path)?;

    // Ephemeral store, scoped to this run; dropped (closed) on every exit.
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(&schema_sql)?;
    conn.execute_batch(&data_sql)?;

    let (columns, rows) = fetch_table(&conn, &options.table)?;

    let keys: Vec<String> = rows
        .iter()
        .map(|row| join_key(row, options.excluded_column))
        .collect();
    fs::write(&options.keys_path, keys.join("\n"))?;

    let records: Vec<Json> = rows
        .iter()
        .zip(&keys)
        .map(|(row, key)| export_record(&columns, row, key))
        .collect();
    fs::write(&options.json_path, serde_json::to_string_pretty(&records)?)?;

    Ok(ExportSummary {
        rows: rows.len(),
        keys_path: options.keys_path.clone(),
        json_path: options.json_path.clone(),
    })
}

/// Read all rows of `table` in store order, plus its column names.
fn fetch_table(
    conn: &Connection,
    table: &str,
) -> Result<(Vec<String>, Vec<Vec<Value>>), ExportError> {
    // Identifiers cannot be bound as parameters; quote the name instead.
    let quoted = table.replace('"', "\"\"");
    let mut stmt = conn.prepare(&format!("SELECT * FROM \"{quoted}\""))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut out = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(row.get::<_, Value>(i)?);
        }
        out.push(values);
    }
    Ok((columns, out))
}

/// Strip every forbidden character from one join-key component.
pub fn sanitize(value: &str) -> String {
    value.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect()
}

/// Derive a row's join key: skip the excluded column and NULLs, sanitize
/// the rest, join with `-`.
pub fn join_key(row: &[Value], excluded_column: usize) -> String {
    row.iter()
        .enumerate()
        .filter(|(i, _)| *i != excluded_column)
        .filter_map(|(_, value)| value_text(value))
        .map(|text| sanitize(&text))
        .collect::<Vec<_>>()
        .join("-")
}

/// Coerce a stored value to the text the join key sees. NULLs yield `None`
/// and are left out of the key entirely.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        // Whole reals keep their decimal point: 3.0 → "3.0"
        Value::Real(r) if r.fract() == 0.0 && r.is_finite() => Some(format!("{r:.1}")),
        Value::Real(r) => Some(r.to_string()),
        Value::Text(t) => Some(t.clone()),
        Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

/// Build one exported row object: every column in table order (raw,
/// unsanitized values), then the derived `image_path`.
fn export_record(columns: &[String], row: &[Value], key: &str) -> Json {
    let mut record = Map::new();
    for (name, value) in columns.iter().zip(row) {
        record.insert(name.clone(), json_value(value));
    }
    record.insert(
        "image_path".to_string(),
        Json::String(format!("{key}.{}", codec::CANONICAL_EXTENSION)),
    );
    Json::Object(record)
}

fn json_value(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Integer(i) => Json::from(*i),
        Value::Real(r) => serde_json::Number::from_f64(*r)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Text(t) => Json::String(t.clone()),
        Value::Blob(b) => Json::String(String::from_utf8_lossy(b).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Sanitization
    // =========================================================================

    #[test]
    fn sanitize_is_identity_on_clean_strings() {
        assert_eq!(sanitize("Hanami Saki"), "Hanami Saki");
        assert_eq!(sanitize("こんにちは世界"), "こんにちは世界");
        assert_eq!(sanitize("ep-12_final"), "ep-12_final");
    }

    #[test]
    fn sanitize_strips_every_forbidden_character() {
        assert_eq!(sanitize("a/b\\c:d*e?f\"g<h>i|j\0k.l"), "abcdefghijkl");
    }

    #[test]
    fn sanitize_of_only_forbidden_characters_is_empty() {
        assert_eq!(sanitize("/\\:*?\"<>|.\0"), "");
        assert_eq!(sanitize("..."), "");
    }

    // =========================================================================
    // Join keys
    // =========================================================================

    #[test]
    fn join_key_skips_nulls_and_excluded_column() {
        let row = vec![
            Value::Integer(7),
            Value::Null,
            Value::Text("a/b".to_string()),
            Value::Text("secret".to_string()),
        ];
        // Excluded column is the last one; the NULL simply disappears.
        assert_eq!(join_key(&row, 3), "7-ab");
    }

    #[test]
    fn join_key_keeps_slots_for_fully_stripped_values() {
        let row = vec![
            Value::Text("first".to_string()),
            Value::Text("...".to_string()),
            Value::Text("last".to_string()),
        ];
        assert_eq!(join_key(&row, 99), "first--last");
    }

    #[test]
    fn join_key_coerces_numbers_to_text() {
        let row = vec![
            Value::Integer(12),
            Value::Real(3.0),
            Value::Real(2.5),
        ];
        assert_eq!(join_key(&row, 99), "12-30-25");
    }

    // =========================================================================
    // End-to-end export
    // =========================================================================

    fn write_scripts(tmp: &TempDir) -> (PathBuf, PathBuf) {
        let schema = tmp.path().join("schema.sql");
        let data = tmp.path().join("data.sql");
        fs::write(
            &schema,
            "CREATE TABLE quotes (id INTEGER, speaker TEXT, line TEXT, note TEXT);",
        )
        .unwrap();
        fs::write(
            &data,
            r#"
            INSERT INTO quotes VALUES (1, '花海咲季', 'はい…？', 'cut 9');
            INSERT INTO quotes VALUES (2, 'Ume/Sato', NULL, 'cut 12');
            "#,
        )
        .unwrap();
        (schema, data)
    }

    fn export_options(tmp: &TempDir) -> ExportOptions {
        let (schema_path, data_path) = write_scripts(tmp);
        ExportOptions {
            schema_path,
            data_path,
            table: "quotes".to_string(),
            excluded_column: 3,
            keys_path: tmp.path().join("keys.txt"),
            json_path: tmp.path().join("gallery.json"),
        }
    }

    #[test]
    fn export_writes_both_artifacts() {
        let tmp = TempDir::new().unwrap();
        let opts = export_options(&tmp);

        let summary = export(&opts).unwrap();
        assert_eq!(summary.rows, 2);

        let keys = fs::read_to_string(&opts.keys_path).unwrap();
        // Ellipsis question mark survives; '/' is stripped; NULL vanishes;
        // the excluded note column never appears. No trailing newline.
        assert_eq!(keys, "1-花海咲季-はい…？\n2-UmeSato");

        let json = fs::read_to_string(&opts.json_path).unwrap();
        let records: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], 1);
        assert_eq!(records[0]["speaker"], "花海咲季");
        assert_eq!(records[0]["image_path"], "1-花海咲季-はい…？.avif");
        assert_eq!(records[1]["line"], serde_json::Value::Null);
        assert_eq!(records[1]["image_path"], "2-UmeSato.avif");
    }

    #[test]
    fn exported_json_is_human_readable() {
        let tmp = TempDir::new().unwrap();
        let opts = export_options(&tmp);
        export(&opts).unwrap();

        let json = fs::read_to_string(&opts.json_path).unwrap();
        // Pretty-printed, non-ASCII verbatim (not \u-escaped), columns in
        // table order ahead of the appended image_path.
        assert!(json.contains('\n'));
        assert!(json.contains("花海咲季"));
        assert!(!json.contains("\\u"));
        let id_pos = json.find("\"id\"").unwrap();
        let speaker_pos = json.find("\"speaker\"").unwrap();
        let image_pos = json.find("\"image_path\"").unwrap();
        assert!(id_pos < speaker_pos && speaker_pos < image_pos);
    }

    #[test]
    fn missing_schema_script_is_fatal_before_any_artifact() {
        let tmp = TempDir::new().unwrap();
        let mut opts = export_options(&tmp);
        fs::remove_file(&opts.schema_path).unwrap();
        opts.schema_path = tmp.path().join("nope.sql");

        let result = export(&opts);
        assert!(matches!(result, Err(ExportError::InputNotFound(_))));
        assert!(!opts.keys_path.exists());
        assert!(!opts.json_path.exists());
    }

    #[test]
    fn missing_data_script_is_fatal_before_any_artifact() {
        let tmp = TempDir::new().unwrap();
        let mut opts = export_options(&tmp);
        fs::remove_file(&opts.data_path).unwrap();
        opts.data_path = tmp.path().join("nope.sql");

        let result = export(&opts);
        assert!(matches!(result, Err(ExportError::InputNotFound(_))));
        assert!(!opts.keys_path.exists());
    }

    #[test]
    fn broken_statement_aborts_before_row_processing() {
        let tmp = TempDir::new().unwrap();
        let opts = export_options(&tmp);
        fs::write(&opts.data_path, "INSERT INTO missing_table VALUES (1);").unwrap();

        let result = export(&opts);
        assert!(matches!(result, Err(ExportError::Store(_))));
        assert!(!opts.keys_path.exists());
        assert!(!opts.json_path.exists());
    }

    #[test]
    fn unknown_table_is_a_store_error() {
        let tmp = TempDir::new().unwrap();
        let mut opts = export_options(&tmp);
        opts.table = "no_such_table".to_string();

        let result = export(&opts);
        assert!(matches!(result, Err(ExportError::Store(_))));
    }

    #[test]
    fn empty_table_produces_empty_artifacts() {
        let tmp = TempDir::new().unwrap();
        let opts = export_options(&tmp);
        fs::write(&opts.data_path, "-- no rows\n").unwrap();

        let summary = export(&opts).unwrap();
        assert_eq!(summary.rows, 0);
        assert_eq!(fs::read_to_string(&opts.keys_path).unwrap(), "");
        assert_eq!(fs::read_to_string(&opts.json_path).unwrap(), "[]");
    }
}
