use crate::error::RosterError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::logger::Logger;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::reference::column_number;
use crate::spreadsheet::reference::MAX_COLUMN;
use crate::spreadsheet::Row;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use zip::ZipArchive;

// Part names inside the container
const PART_SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const PART_WORKBOOK: &str = "xl/workbook.xml";
const PART_WORKBOOK_RELATIONSHIPS: &str = "xl/_rels/workbook.xml.rels";
const PART_DEFAULT_WORKSHEET: &str = "xl/worksheets/sheet1.xml";

// XML tag names
const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_SHEET: QName = QName(b"sheet");             // Worksheet declaration
const TAG_ROW: QName = QName(b"row");                 // Row in worksheet
const TAG_CELL: QName = QName(b"c");                  // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");        // Inline string value
const TAG_VALUE: QName = QName(b"v");                 // Cell value content

/// An opened XLSX container whose first worksheet can be decoded into rows.
pub(crate) struct XlsxWorkbook<RS: Read + Seek> {
    zip: ZipArchive<RS>,
    /// Archive path of the worksheet part to decode
    sheet_path: String,
}

impl XlsxWorkbook<BufReader<File>> {
    /// Opens an XLSX file from disk.
    pub(crate) fn open(path: &Path) -> Result<Self, RosterError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<RS: Read + Seek> XlsxWorkbook<RS> {
    /// Opens an XLSX container from any seekable reader and locates its first worksheet.
    pub(crate) fn from_reader(reader: RS) -> Result<Self, RosterError> {
        let mut zip = ZipArchive::new(reader)?;
        let sheet_path = first_sheet_path(&mut zip)?
            .unwrap_or_else(|| PART_DEFAULT_WORKSHEET.to_owned());
        Ok(XlsxWorkbook { zip, sheet_path })
    }

    /// Loads the shared string table. A container without the part yields an empty table.
    pub(crate) fn load_shared_strings(&mut self, logger: &dyn Logger) -> Result<Vec<String>, RosterError> {
        let mut shared_strings = Vec::<String>::new();
        let mut reader = match self.zip.xml_reader(PART_SHARED_STRINGS)? {
            Some(reader) => reader,
            None => {
                logger.warn("No shared strings found");
                return Ok(shared_strings);
            }
        };

        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
                let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
                shared_strings.push(string);
            }
        });
        logger.debug(&format!("Loaded {} shared strings", shared_strings.len()));
        Ok(shared_strings)
    }

    /// Decodes the worksheet into rows of cell text.
    ///
    /// Column positions are preserved: a cell omitted by the writer shows up as an
    /// empty string. Rows without any cell element are dropped.
    pub(crate) fn read_rows(&mut self, shared_strings: &[String]) -> Result<Vec<Row>, RosterError> {
        let sheet_path = self.sheet_path.to_owned();
        let mut reader = self
            .zip
            .xml_reader(&sheet_path)?
            .ok_or_else(|| SpreadsheetError::MissingWorksheet(sheet_path.to_owned()))?;

        let mut rows = Vec::<Row>::new();
        let mut row = Row::new();
        let mut cell_count = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                row = Row::new();
                cell_count = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => {
                if cell_count > 0 {
                    rows.push(std::mem::take(&mut row));
                }
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                let reference = event.get_attribute_value("r")?;
                col = reference.as_deref()
                    .and_then(column_number)
                    .unwrap_or(row.len() + 1);
                if col > MAX_COLUMN {
                    let reference = reference.map(|it| it.into_owned()).unwrap_or_default();
                    return Err(SpreadsheetError::ColumnOutOfRange(reference).into());
                }
                kind = CellType::from_attribute(event.get_attribute_value("t")?.as_deref());
                value.clear();
            }
            Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.name() == TAG_CELL => {
                while row.len() + 1 < col {
                    row.push(String::new());
                }
                row.push(decode_value(kind, &value, shared_strings)?);
                cell_count += 1;
            }
        });
        Ok(rows)
    }
}

/// Resolves a raw cell value according to its type.
fn decode_value(kind: CellType, value: &str, shared_strings: &[String]) -> Result<String, RosterError> {
    if value.is_empty() {
        return Ok(String::new());
    }
    match kind {
        CellType::SharedString => {
            let index = value
                .trim()
                .parse::<usize>()
                .map_err(|_| SpreadsheetError::InvalidSharedStringIndex(value.to_owned()))?;
            Ok(shared_strings.get(index).cloned().unwrap_or_default())
        }
        CellType::InlineString | CellType::Literal => Ok(value.to_owned()),
    }
}

/// Finds the archive path of the first worksheet declared by the workbook.
///
/// Returns `None` when the workbook or its relationships part is absent, in which
/// case the caller falls back to the conventional first-sheet path.
fn first_sheet_path<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Option<String>, RosterError> {
    let relationships = match load_relationships(zip, PART_WORKBOOK_RELATIONSHIPS)? {
        Some(relationships) => relationships,
        None => return Ok(None),
    };
    let mut reader = match zip.xml_reader(PART_WORKBOOK)? {
        Some(reader) => reader,
        None => return Ok(None),
    };
    let mut path = None::<String>;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                if attribute.key.local_name().as_ref() == b"id" {
                    id = Some(attribute.unescape_value()?);
                }
            }
            if let Some(target) = id.and_then(|id| relationships.get(id.as_ref())) {
                path = Some(target.to_owned());
                break;
            }
        }
    });
    Ok(path)
}

/// Loads worksheet relationships (id to archive path) from a relationships part.
fn load_relationships<RS: Read + Seek>(zip: &mut ZipArchive<RS>, path: &str) -> Result<Option<HashMap<String, String>>, RosterError> {
    let mut reader = match zip.xml_reader(path)? {
        Some(reader) => reader,
        None => return Ok(None),
    };
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(Some(relationships))
}

/// Normalizes a relationship target to a path inside the archive.
fn to_zip_path(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Reads string content up to `end_tag`, skipping phonetic runs.
///
/// With `is_text_content` set, text directly under the element counts (a `<v>`);
/// otherwise only text inside `<t>` runs does (an `<si>` or `<is>`).
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, RosterError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
