use crate::database::table::Table;
use crate::spreadsheet::Record;
use duckdb::params_from_iter;
use duckdb::Connection;
use thiserror::Error;
use tracing::debug;

/// Outcome of a successful load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Rows written to the table
    pub inserted: usize,
    /// Blank rows that were filtered out
    pub skipped: usize,
}

/// A row could not be written. Rows of already committed batches stay in
/// the table; the failing batch is rolled back.
#[derive(Error, Debug)]
#[error("Failed to load row {row} ({committed} rows committed): {source}")]
pub struct LoadError {
    /// 1-based spreadsheet row of the first record that failed
    pub row: usize,
    /// Rows that remain persisted
    pub committed: usize,
    #[source]
    pub source: duckdb::Error,
}

/// Positional, trimmed text values of a record aligned to `width` columns.
/// Missing cells become empty strings.
pub(crate) fn record_values(record: &Record, width: usize) -> Vec<String> {
    let mut values: Vec<String> = record.values
        .iter()
        .take(width)
        .map(|value| value.to_string().trim().to_owned())
        .collect();
    values.resize(width, String::new());
    values
}

/// Inserts the non-blank `records` into `table` in source order.
///
/// A record is skipped iff all of its values are empty after trimming.
/// With `batch_size` 0 the whole load is one transaction; otherwise a
/// transaction is committed after every `batch_size` rows.
pub fn load_rows(
    conn: &mut Connection,
    table: &Table,
    records: &[Record],
    batch_size: usize,
) -> Result<LoadSummary, LoadError> {
    let width = table.columns.len();
    let rows: Vec<(usize, Vec<String>)> = records
        .iter()
        .map(|record| (record.row, record_values(record, width)))
        .filter(|(_, values)| values.iter().any(|value| !value.is_empty()))
        .collect();
    let skipped = records.len() - rows.len();
    if rows.is_empty() {
        return Ok(LoadSummary { inserted: 0, skipped });
    }

    let sql = table.insert_statement();
    let chunk_size = if batch_size == 0 { rows.len() } else { batch_size };
    let mut committed = 0usize;
    for batch in rows.chunks(chunk_size) {
        let first_row = batch[0].0;
        let failure = |row: usize, committed: usize| move |source: duckdb::Error| LoadError { row, committed, source };

        let tx = conn.transaction().map_err(failure(first_row, committed))?;
        {
            let mut stmt = tx.prepare(&sql).map_err(failure(first_row, committed))?;
            for (row, values) in batch {
                stmt.execute(params_from_iter(values.iter()))
                    .map_err(failure(*row, committed))?;
            }
        }
        tx.commit().map_err(failure(first_row, committed))?;
        committed += batch.len();
        debug!(table = %table.name, committed, "Committed batch of {} rows", batch.len());
    }

    Ok(LoadSummary { inserted: committed, skipped })
}
