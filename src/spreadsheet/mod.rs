//! # Workbook Reader
//!
//! Opens an uploaded Office Open XML workbook (`.xlsx`, `.xlsm`), validates
//! the container and extracts its first sheet as a header row plus records.
//! Cell values are decoded with their number formats so date-formatted
//! numbers come out as dates, date-times and times.
pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xlsx;

pub use cell::CellValue;
pub use sheet::Record;
pub use sheet::Sheet;

use crate::error::SheetIngestError;
use crate::spreadsheet::xlsx::XlsxWorkbook;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// File extensions accepted for upload, compared case-insensitively.
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["xlsx", "xlsm"];

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Unsupported file type '{0}', expected one of: .xlsx, .xlsm")]
    UnsupportedExtension(String),

    #[error("Spreadsheet '{0}' is password protected")]
    PasswordProtected(String),

    #[error("File '{0}' is not a valid Excel workbook")]
    NotAZipContainer(String),

    #[error("Workbook part '{0}' is missing")]
    MissingPart(String),

    #[error("Workbook '{0}' contains no worksheet")]
    NoWorksheet(String),

    #[error("Sheet '{sheet}' of '{file_name}' has no data rows")]
    EmptySheet { file_name: String, sheet: String },

    #[error("Cell '{reference}' of sheet '{sheet}' lies outside the worksheet grid")]
    CellOutOfGrid { sheet: String, reference: String },

    #[error("Sheet '{sheet}' spans {cells} cells, more than the {limit} that can be loaded")]
    TooManyCells { sheet: String, cells: usize, limit: usize },

    #[error("Shared string index '{index}' at '{reference}' of sheet '{sheet}' is out of range")]
    SharedStringIndex { sheet: String, reference: String, index: String },
}

/// Returns the lower-cased extension of `file_name` if it is accepted.
pub fn accepted_extension(file_name: &str) -> Result<String, SpreadsheetError> {
    Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|extension| ACCEPTED_EXTENSIONS.contains(&extension.as_str()))
        .ok_or_else(|| SpreadsheetError::UnsupportedExtension(file_name.to_owned()))
}

/// Reads the first sheet of the workbook stored at `path`.
///
/// `file_name` is the name the workbook was uploaded as; its extension is
/// checked before the file is opened.
pub fn read_first_sheet(path: &Path, file_name: &str) -> Result<Sheet, SheetIngestError> {
    accepted_extension(file_name)?;
    let reader = BufReader::new(File::open(path)?);
    XlsxWorkbook::open(file_name, reader)?.read_first_sheet()
}
