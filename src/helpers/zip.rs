//! ZIP archive helpers for locating and reading parts of an OOXML package.

use crate::error::SheetIngestError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets a part by name, matching case-insensitively and accepting `\` as separator.
    fn part(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SheetIngestError>;

    /// Creates an XML reader over a part, or `None` when the part does not exist.
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, SheetIngestError>;

    /// Returns true if the archive holds a part with the given name.
    fn has_part(&self, name: &str) -> bool;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn part(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SheetIngestError> {
        let path = match find_part_name(self, name) {
            Some(path) => path,
            None => return Ok(None),
        };
        match self.by_name(&path) {
            Ok(file) => Ok(Some(file)),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, SheetIngestError> {
        Ok(self.part(name)?.map(|file| XmlReader::new(BufReader::new(file))))
    }

    fn has_part(&self, name: &str) -> bool {
        find_part_name(self, name).is_some()
    }
}

fn find_part_name<RS: Read + Seek>(zip: &ZipArchive<RS>, name: &str) -> Option<String> {
    let pattern = name.replace('\\', "/");
    zip.file_names()
        .find(|file_name| pattern.eq_ignore_ascii_case(file_name))
        .map(str::to_owned)
}
