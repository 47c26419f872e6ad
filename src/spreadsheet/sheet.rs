use crate::error::SheetIngestError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::SpreadsheetError;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Most header-aligned values a single sheet may expand to.
pub(crate) const MAX_SHEET_CELLS: usize = 5_000_000;

/// The first sheet of a workbook laid out as a header row plus data records.
#[derive(Clone, Debug, PartialEq)]
pub struct Sheet {
    /// Source file name
    pub file_name: String,
    /// Sheet name
    pub name: String,
    /// Raw header text, one entry per column of the used range
    pub headers: Vec<String>,
    /// Data rows below the header that hold at least one cell, in row order
    pub records: Vec<Record>,
    /// Rows between the header and the last record that hold no cell at all
    pub blank_rows: usize,
}

/// One data row. `values` is positionally aligned with `Sheet::headers` and
/// missing cells are `CellValue::Empty`.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// 1-based row number as shown by spreadsheet applications
    pub row: usize,
    pub values: Vec<CellValue>,
}

/// Collects the cells of a worksheet part and tracks the used range.
pub(crate) struct SheetCells {
    file_name: String,
    name: String,
    cells: Vec<Cell>,
    row_lower_bound: Option<usize>,
    row_upper_bound: Option<usize>,
    col_lower_bound: Option<usize>,
    col_upper_bound: Option<usize>,
}

impl SheetCells {
    pub(crate) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    pub(crate) fn push(&mut self, cell: Cell) {
        self.update_bound(cell.row, cell.col);
        self.cells.push(cell);
    }

    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_lower_bound.map(|lower| row < lower).unwrap_or(true) {
            self.row_lower_bound = Some(row);
        }
        if self.row_upper_bound.map(|upper| upper < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_lower_bound.map(|lower| col < lower).unwrap_or(true) {
            self.col_lower_bound = Some(col);
        }
        if self.col_upper_bound.map(|upper| upper < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Lays the collected cells out as headers and records, resolving shared
    /// strings. Fails with `EmptySheet` when there is no data row under the header.
    pub(crate) fn into_sheet(self, shared_strings: &[String]) -> Result<Sheet, SheetIngestError> {
        let empty = || SpreadsheetError::EmptySheet {
            file_name: self.file_name.to_owned(),
            sheet: self.name.to_owned(),
        };
        let (header_row, last_row) = self.row_lower_bound.zip(self.row_upper_bound).ok_or_else(empty)?;
        let (col_lower, col_upper) = self.col_lower_bound.zip(self.col_upper_bound).ok_or_else(empty)?;
        if last_row == header_row {
            Err(empty())?
        }

        let width = col_upper - col_lower + 1;
        let data_rows: BTreeSet<usize> = self.cells
            .iter()
            .map(|cell| cell.row)
            .filter(|row| *row != header_row)
            .collect();
        let cells = data_rows.len().saturating_mul(width);
        if cells > MAX_SHEET_CELLS {
            Err(SpreadsheetError::TooManyCells {
                sheet: self.name.to_owned(),
                cells,
                limit: MAX_SHEET_CELLS,
            })?
        }
        let blank_rows = last_row - header_row - data_rows.len();

        let mut headers = vec![String::new(); width];
        let mut rows: BTreeMap<usize, Vec<CellValue>> = data_rows
            .into_iter()
            .map(|row| (row, vec![CellValue::Empty; width]))
            .collect();

        for cell in &self.cells {
            let value = cell.to_value(shared_strings).ok_or_else(|| SpreadsheetError::SharedStringIndex {
                sheet: self.name.to_owned(),
                reference: index_to_reference(cell.row, cell.col),
                index: cell.value.to_owned(),
            })?;
            let col = cell.col - col_lower;
            if cell.row == header_row {
                headers[col] = value.to_string().trim().to_owned();
            } else if let Some(values) = rows.get_mut(&cell.row) {
                values[col] = value;
            }
        }
        let records = rows
            .into_iter()
            .map(|(row, values)| Record { row: row + 1, values })
            .collect();

        Ok(Sheet {
            file_name: self.file_name,
            name: self.name,
            headers,
            records,
            blank_rows,
        })
    }
}
