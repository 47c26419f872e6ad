//! Workbook fixtures shared by the unit tests.
#![allow(dead_code)]

use crate::spreadsheet::reference::index_to_reference;
use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

/// Packs `(part name, content)` pairs into an in-memory ZIP archive.
pub(crate) fn zip_parts(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in parts {
        writer.start_file(*name, options).expect("start zip part");
        writer.write_all(content.as_bytes()).expect("write zip part");
    }
    writer.finish().expect("finish zip").into_inner()
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

/// Builds minimal `.xlsx` packages. Every cell is written as an inline string
/// unless it parses as a number; `""` leaves the cell out entirely.
#[derive(Default)]
pub(crate) struct WorkbookBuilder {
    sheets: Vec<(String, String)>,
    styles: Option<String>,
    shared_strings: Option<String>,
}

impl WorkbookBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a sheet whose first row of `rows` lands on spreadsheet row 1.
    pub(crate) fn sheet(self, name: &str, rows: &[&[&str]]) -> Self {
        let mut data = String::new();
        for (row, values) in rows.iter().enumerate() {
            data.push_str(&format!(r#"<row r="{}">"#, row + 1));
            for (col, value) in values.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let reference = index_to_reference(row, col);
                if value.parse::<f64>().is_ok() {
                    data.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#));
                } else {
                    data.push_str(&format!(
                        r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape(value)
                    ));
                }
            }
            data.push_str("</row>");
        }
        self.raw_sheet(name, &data)
    }

    /// Adds a sheet from raw `<sheetData>` content.
    pub(crate) fn raw_sheet(mut self, name: &str, sheet_data: &str) -> Self {
        self.sheets.push((name.to_owned(), sheet_data.to_owned()));
        self
    }

    pub(crate) fn styles(mut self, styles: &str) -> Self {
        self.styles = Some(styles.to_owned());
        self
    }

    pub(crate) fn shared_strings(mut self, strings: &[&str]) -> Self {
        let items: String = strings
            .iter()
            .map(|string| format!("<si><t>{}</t></si>", escape(string)))
            .collect();
        self.shared_strings = Some(format!(
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">{1}</sst>"#,
            strings.len(),
            items
        ));
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut sheet_entries = String::new();
        let mut relationships = String::new();
        let mut parts: Vec<(String, String)> = vec![
            ("[Content_Types].xml".to_owned(), CONTENT_TYPES.to_owned()),
            ("_rels/.rels".to_owned(), ROOT_RELS.to_owned()),
        ];
        for (index, (name, sheet_data)) in self.sheets.iter().enumerate() {
            let id = index + 1;
            sheet_entries.push_str(&format!(
                r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#,
                escape(name)
            ));
            relationships.push_str(&format!(
                r#"<Relationship Id="rId{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{id}.xml"/>"#
            ));
            parts.push((
                format!("xl/worksheets/sheet{id}.xml"),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_data}</sheetData></worksheet>"#
                ),
            ));
        }
        parts.push((
            "xl/workbook.xml".to_owned(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{sheet_entries}</sheets></workbook>"#
            ),
        ));
        parts.push((
            "xl/_rels/workbook.xml.rels".to_owned(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#
            ),
        ));
        if let Some(styles) = &self.styles {
            parts.push(("xl/styles.xml".to_owned(), styles.to_owned()));
        }
        if let Some(shared_strings) = &self.shared_strings {
            parts.push(("xl/sharedStrings.xml".to_owned(), shared_strings.to_owned()));
        }
        let borrowed: Vec<(&str, &str)> = parts
            .iter()
            .map(|(name, content)| (name.as_str(), content.as_str()))
            .collect();
        zip_parts(&borrowed)
    }

    /// Writes the workbook to `dir/file_name` and returns the path.
    pub(crate) fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.build()).expect("write workbook fixture");
        path
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
