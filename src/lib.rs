//! # Sheet Ingest
//!
//! An HTTP service that turns uploaded Excel workbooks into DuckDB tables.
//!
//! ## Features
//!
//! - **Upload**: `POST /api/v1/upload` takes a `.xlsx` or `.xlsm` file as multipart field `file`
//! - **Naming**: the table name comes from the file name and the column names from the header row,
//!   lowercased, stripped of accents and reduced to `a-z`, `0-9` and `_`
//! - **Loading**: every non-blank data row becomes a row of `TEXT` values next to a generated `id` key
//! - **Inspection**: `GET /api/v1/tables` and `GET /api/v1/tables/{name}` list and read back what was loaded
//! - **Authentication**: a bearer API key guards every `/api` route
//!
//! ## Layout
//!
//! - [`spreadsheet`]: reads the first worksheet of a workbook into headers and records
//! - [`database`]: identifiers, table creation, batched loading and previews
//! - [`ingest`]: the upload pipeline tying both together
//! - [`server`]: axum routes, authentication middleware and graceful shutdown
//! - [`config`]: command line flags and environment variables
pub mod config;
pub mod database;
pub mod error;
pub(crate) mod helpers;
pub mod ingest;
pub mod server;
pub mod spreadsheet;

#[cfg(test)]
mod test_support;
