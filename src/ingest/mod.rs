//! # Ingestion
//!
//! Runs one upload through the pipeline: the file is persisted to the upload
//! directory, its extension checked, the first sheet parsed, the target table
//! created when absent, the rows loaded and a preview read back. The
//! temporary file is removed on every exit path.
use crate::database::identifier::normalize;
use crate::database::identifier::resolve_columns;
use crate::database::loader;
use crate::database::loader::load_rows;
use crate::database::preview::preview;
use crate::database::preview::JsonRow;
use crate::database::table::Table;
use crate::database::Database;
use crate::error::ResultMessage;
use crate::error::SheetIngestError;
use crate::spreadsheet;
use crate::spreadsheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use serde::Serialize;
use std::fmt::Display;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("The first sheet of '{file_name}' has no data rows")]
    EmptyWorkbook { file_name: String },

    #[error("No file received in form field 'file'")]
    MissingFile,

    #[error("Failed to create table '{table}': {source}")]
    SchemaError {
        table: String,
        #[source]
        source: SheetIngestError,
    },

    #[error("Failed to load row {row} ({committed} rows committed): {source}")]
    LoadError {
        row: usize,
        committed: usize,
        #[source]
        source: duckdb::Error,
    },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("{0}")]
    Processing(#[from] SheetIngestError),
}

impl IngestError {
    /// True for failures caused by the upload itself rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IngestError::UnsupportedFormat(_) | IngestError::EmptyWorkbook { .. } | IngestError::MissingFile
        )
    }

    /// Message safe to return to the caller. Internal detail of server-side
    /// failures stays in the log.
    pub fn public_message(&self) -> String {
        match self {
            IngestError::LoadError { row, committed, .. } => {
                format!("Failed to load row {row}; {committed} rows were kept")
            }
            IngestError::StorageUnavailable(_) => "Storage is unavailable, try again later".to_owned(),
            IngestError::SchemaError { .. } | IngestError::Processing(_) => "Failed to process the file".to_owned(),
            _ => self.to_string(),
        }
    }
}

impl From<loader::LoadError> for IngestError {
    fn from(error: loader::LoadError) -> Self {
        IngestError::LoadError {
            row: error.row,
            committed: error.committed,
            source: error.source,
        }
    }
}

/// Maps workbook reader failures onto the ingestion taxonomy.
fn classify(file_name: &str, error: SheetIngestError) -> IngestError {
    match error {
        SheetIngestError::SpreadsheetError(
            SpreadsheetError::EmptySheet { .. } | SpreadsheetError::NoWorksheet(_),
        ) => IngestError::EmptyWorkbook {
            file_name: file_name.to_owned(),
        },
        SheetIngestError::SpreadsheetError(error) => IngestError::UnsupportedFormat(error.to_string()),
        SheetIngestError::ZipError(_)
        | SheetIngestError::XmlError(_)
        | SheetIngestError::XmlEncodingError(_)
        | SheetIngestError::XmlAttributeError(_)
        | SheetIngestError::XmlHelperError(_) => {
            IngestError::UnsupportedFormat(format!("File '{file_name}' could not be read: {error}"))
        }
        error => IngestError::Processing(error),
    }
}

/// Stages an upload moves through, in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Validated,
    Parsed,
    SchemaEnsured,
    Loaded,
    Previewed,
    Completed,
}

impl Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IngestStage::Received => "received",
            IngestStage::Validated => "validated",
            IngestStage::Parsed => "parsed",
            IngestStage::SchemaEnsured => "schema_ensured",
            IngestStage::Loaded => "loaded",
            IngestStage::Previewed => "previewed",
            IngestStage::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// A file received from a client.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    /// Original file name as sent by the client
    pub file_name: String,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// File name without directories and extension.
    fn base_name(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IngestionResult {
    pub message: String,
    pub file: String,
    pub table: String,
    pub inserted: usize,
    pub skipped: usize,
    pub preview: Vec<JsonRow>,
}

/// Runs uploads against one database schema.
#[derive(Debug)]
pub struct Ingestor {
    database: Database,
    schema: String,
    upload_dir: PathBuf,
    batch_size: usize,
}

impl Ingestor {
    /// Creates the schema and the upload directory when missing.
    pub fn new(database: Database, schema: &str, upload_dir: &Path, batch_size: usize) -> Result<Self, SheetIngestError> {
        database.ensure_schema(schema).with_prefix("prepare schema")?;
        std::fs::create_dir_all(upload_dir).map_err(SheetIngestError::from).with_prefix("create upload directory")?;
        Ok(Self {
            database,
            schema: schema.to_owned(),
            upload_dir: upload_dir.to_owned(),
            batch_size,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Ingests one upload. Blocking; call from a blocking context.
    pub fn ingest(&self, upload: UploadedFile) -> Result<IngestionResult, IngestError> {
        let file = upload.file_name.as_str();
        let temp = self.persist(&upload).map_err(|error| self.failed(file, error))?;
        let result = self.process(&upload, temp.path());
        if let Err(error) = temp.close() {
            warn!(file, %error, "Failed to remove temporary upload");
        }
        result.map_err(|error| self.failed(file, error))
    }

    fn persist(&self, upload: &UploadedFile) -> Result<NamedTempFile, IngestError> {
        let mut temp = NamedTempFile::new_in(&self.upload_dir)
            .map_err(SheetIngestError::from)
            .with_prefix("create temporary upload")?;
        temp.write_all(&upload.content)
            .and_then(|_| temp.flush())
            .map_err(SheetIngestError::from)
            .with_prefix("write temporary upload")?;
        stage(&upload.file_name, IngestStage::Received);
        Ok(temp)
    }

    fn process(&self, upload: &UploadedFile, path: &Path) -> Result<IngestionResult, IngestError> {
        let file = upload.file_name.as_str();
        spreadsheet::accepted_extension(file).map_err(|error| IngestError::UnsupportedFormat(error.to_string()))?;
        stage(file, IngestStage::Validated);

        let sheet = spreadsheet::read_first_sheet(path, file).map_err(|error| classify(file, error))?;
        stage(file, IngestStage::Parsed);

        let table_name = normalize(upload.base_name());
        let table = self.table(&table_name, &sheet)?;
        let mut conn = self.database
            .connect()
            .map_err(|error| IngestError::StorageUnavailable(error.to_string()))?;
        table.ensure(&conn).map_err(|source| IngestError::SchemaError {
            table: table_name.to_owned(),
            source,
        })?;
        stage(file, IngestStage::SchemaEnsured);

        let summary = load_rows(&mut conn, &table, &sheet.records, self.batch_size)?;
        let skipped = summary.skipped + sheet.blank_rows;
        stage(file, IngestStage::Loaded);

        let preview = preview(&conn, &self.schema, &table.name)?;
        stage(file, IngestStage::Previewed);

        info!(
            file,
            table = %table.name,
            inserted = summary.inserted,
            skipped,
            "Upload completed"
        );
        stage(file, IngestStage::Completed);
        Ok(IngestionResult {
            message: format!("File {file} uploaded successfully"),
            file: file.to_owned(),
            table: table.name,
            inserted: summary.inserted,
            skipped,
            preview,
        })
    }

    fn table(&self, table_name: &str, sheet: &Sheet) -> Result<Table, IngestError> {
        let columns = resolve_columns(&sheet.headers);
        Table::new(&self.schema, table_name, columns).map_err(|error| IngestError::SchemaError {
            table: table_name.to_owned(),
            source: error.into(),
        })
    }

    fn failed(&self, file: &str, error: IngestError) -> IngestError {
        if error.is_client_error() {
            warn!(file, %error, "Upload rejected");
        } else {
            error!(file, %error, "Upload failed");
        }
        error
    }
}

fn stage(file: &str, stage: IngestStage) {
    debug!(file, %stage, "Upload stage");
}
