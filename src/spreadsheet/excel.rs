//! Office Open XML package helpers shared by the workbook reader.
use crate::error::SheetIngestError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use zip::ZipArchive;

/// XML tag name for relationship elements
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Signature of an OLE compound document. OOXML files saved with a password
/// are wrapped in one instead of a ZIP archive.
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Signature of a ZIP local file header.
const ZIP_SIGNATURE: [u8; 2] = *b"PK";

/// Validates the container signature and opens the package.
///
/// Fails with `PasswordProtected` for an OLE compound document and with
/// `NotAZipContainer` for anything else that is not a readable ZIP archive.
pub(super) fn open<RS: Read + Seek>(file_name: &str, mut reader: RS) -> Result<ZipArchive<RS>, SheetIngestError> {
    let mut signature = [0u8; 8];
    let length = read_signature(&mut reader, &mut signature)?;
    reader.seek(SeekFrom::Start(0))?;

    if length == CFB_SIGNATURE.len() && signature == CFB_SIGNATURE {
        Err(SpreadsheetError::PasswordProtected(file_name.to_owned()))?
    }
    if length < ZIP_SIGNATURE.len() || signature[..2] != ZIP_SIGNATURE {
        Err(SpreadsheetError::NotAZipContainer(file_name.to_owned()))?
    }
    ZipArchive::new(reader).map_err(|_| SpreadsheetError::NotAZipContainer(file_name.to_owned()).into())
}

fn read_signature<R: Read>(reader: &mut R, signature: &mut [u8]) -> Result<usize, SheetIngestError> {
    let mut length = 0;
    while length < signature.len() {
        match reader.read(&mut signature[length..])? {
            0 => break,
            n => length += n,
        }
    }
    Ok(length)
}

/// Loads worksheet relationships, mapping relationship ids to part paths.
pub(super) fn load_relationships<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    path: &str,
) -> Result<HashMap<String, String>, SheetIngestError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::MissingPart(path.to_owned()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Maps cell style indexes to cell types using custom and built-in formats.
pub(super) fn load_number_formats(
    format_indexes: Vec<String>,
    custom_formats: HashMap<String, CellType>,
    is_1904: bool,
) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Resolves a relationship target against the `xl/` folder of the package.
pub(crate) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(absolute) = path.strip_prefix('/') {
        absolute.to_owned()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::zip_parts;
    use std::io::Cursor;

    #[test]
    fn resolves_relationship_targets() {
        assert_eq!(to_zip_path(Cow::Borrowed("worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::Borrowed("/xl/worksheets/sheet2.xml")), "xl/worksheets/sheet2.xml");
        assert_eq!(to_zip_path(Cow::Borrowed("xl/worksheets/sheet3.xml")), "xl/worksheets/sheet3.xml");
    }

    #[test]
    fn rejects_compound_documents() {
        let mut bytes = CFB_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0u8; 504]);
        let error = open("secret.xlsx", Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            error,
            SheetIngestError::SpreadsheetError(SpreadsheetError::PasswordProtected(_))
        ));
    }

    #[test]
    fn rejects_non_zip_content() {
        for bytes in [b"name,city\n".to_vec(), Vec::new(), b"PK\x03\x04garbage".to_vec()] {
            let error = open("fake.xlsx", Cursor::new(bytes)).unwrap_err();
            assert!(matches!(
                error,
                SheetIngestError::SpreadsheetError(SpreadsheetError::NotAZipContainer(_))
            ));
        }
    }

    #[test]
    fn keeps_only_worksheet_relationships() {
        let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
            <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
            <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
        </Relationships>"#;
        let bytes = zip_parts(&[("xl/_rels/workbook.xml.rels", rels)]);
        let mut zip = open("book.xlsx", Cursor::new(bytes)).unwrap();
        let relationships = load_relationships(&mut zip, "xl/_rels/workbook.xml.rels").unwrap();
        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships["rId1"], "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn custom_formats_override_builtin_ids() {
        let custom = HashMap::from([("164".to_owned(), CellType::NumberDate1900)]);
        let formats = load_number_formats(
            vec!["0".to_owned(), "164".to_owned(), "22".to_owned()],
            custom,
            false,
        );
        assert_eq!(formats, vec![CellType::Number, CellType::NumberDate1900, CellType::NumberDateTime1900]);
    }
}
