//! Bounded, read-only queries over loaded tables.
use crate::database::identifier::qualified_name;
use crate::database::identifier::quote_identifier;
use crate::error::SheetIngestError;
use duckdb::types::Value;
use duckdb::Connection;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value as JsonValue;

/// Rows returned after an upload.
pub const PREVIEW_LIMIT: usize = 10;

/// Rows returned by the table data endpoint.
pub const TABLE_DATA_LIMIT: usize = 100;

/// A row keyed by column name, in table column order.
pub type JsonRow = Map<String, JsonValue>;

/// Column names of `schema.table` in declaration order; empty when the
/// table does not exist.
pub fn table_columns(conn: &Connection, schema: &str, table: &str) -> Result<Vec<String>, SheetIngestError> {
    let mut stmt = conn.prepare(
        "SELECT column_name FROM information_schema.columns \
         WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
    )?;
    let columns = stmt
        .query_map([schema, table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Base tables of `schema`, sorted by name.
pub fn list_tables(conn: &Connection, schema: &str) -> Result<Vec<String>, SheetIngestError> {
    let mut stmt = conn.prepare(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = ? AND table_type = 'BASE TABLE' ORDER BY table_name",
    )?;
    let tables = stmt
        .query_map([schema], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tables)
}

/// Fetches at most `limit` rows of `schema.table` in storage order.
pub fn fetch_rows(conn: &Connection, schema: &str, table: &str, limit: usize) -> Result<Vec<JsonRow>, SheetIngestError> {
    let columns = table_columns(conn, schema, table)?;
    if columns.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {} FROM {} LIMIT {}",
        columns.iter().map(|column| quote_identifier(column)).collect::<Vec<_>>().join(", "),
        qualified_name(schema, table)?,
        limit,
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = JsonRow::new();
        for (index, column) in columns.iter().enumerate() {
            let value: Value = row.get(index)?;
            object.insert(column.to_owned(), to_json(value));
        }
        result.push(object);
    }
    Ok(result)
}

/// The first [`PREVIEW_LIMIT`] rows of a table.
pub fn preview(conn: &Connection, schema: &str, table: &str) -> Result<Vec<JsonRow>, SheetIngestError> {
    fetch_rows(conn, schema, table, PREVIEW_LIMIT)
}

fn to_json(value: Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(value) => value.into(),
        Value::TinyInt(value) => value.into(),
        Value::SmallInt(value) => value.into(),
        Value::Int(value) => value.into(),
        Value::BigInt(value) => value.into(),
        Value::UTinyInt(value) => value.into(),
        Value::USmallInt(value) => value.into(),
        Value::UInt(value) => value.into(),
        Value::UBigInt(value) => value.into(),
        Value::HugeInt(value) => value.to_string().into(),
        Value::Float(value) => float(value as f64),
        Value::Double(value) => float(value),
        Value::Text(value) => value.into(),
        Value::Enum(value) => value.into(),
        other => format!("{other:?}").into(),
    }
}

fn float(value: f64) -> JsonValue {
    Number::from_f64(value).map(JsonValue::Number).unwrap_or(JsonValue::Null)
}
