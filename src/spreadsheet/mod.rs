//! # Spreadsheet Decoder
//!
//! Unpacks an XLSX container and decodes its first worksheet into rows of
//! cell text. Every row keeps column positions: a cell the writer omitted is
//! returned as an empty string, so index `n` of a row is always column `n + 1`.
use crate::error::ResultMessage;
use crate::error::RosterError;
use crate::logger::Logger;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use thiserror::Error;

pub(crate) mod cell;
pub(crate) mod reference;
pub(crate) mod xlsx;

use xlsx::XlsxWorkbook;

/// One decoded worksheet row, 0-indexed by column.
pub type Row = Vec<String>;

/// Errors raised while decoding the worksheet.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// The container holds no worksheet part at the expected path
    #[error("Worksheet '{0}' not found in spreadsheet")]
    MissingWorksheet(String),

    /// A cell reference beyond the last worksheet column
    #[error("Cell reference '{0}' is beyond the last column")]
    ColumnOutOfRange(String),

    /// A shared-string cell whose value is not an index
    #[error("Invalid shared string index '{0}'")]
    InvalidSharedStringIndex(String),
}

/// Decodes the spreadsheet at `path` into rows.
///
/// # Arguments
/// * `path` - Path to the XLSX file
/// * `logger` - Receives progress messages and the missing shared strings warning
///
/// # Returns
/// Every row carrying at least one cell, in sheet order, or a fatal error when
/// the archive or the worksheet cannot be read
pub fn read_rows(path: &Path, logger: &dyn Logger) -> Result<Vec<Row>, RosterError> {
    logger.info(&format!("Reading Excel file: {}", path.display()));
    let workbook = XlsxWorkbook::open(path)
        .with_prefix(&format!("Open spreadsheet '{}'", path.display()))?;
    decode(workbook, logger)
}

/// Decodes a spreadsheet held by any seekable reader into rows.
///
/// # Arguments
/// * `reader` - Seekable source of the XLSX container
/// * `logger` - Receives progress messages and the missing shared strings warning
pub fn read_rows_from<RS: Read + Seek>(reader: RS, logger: &dyn Logger) -> Result<Vec<Row>, RosterError> {
    let workbook = XlsxWorkbook::from_reader(reader).with_prefix("Open spreadsheet")?;
    decode(workbook, logger)
}

fn decode<RS: Read + Seek>(mut workbook: XlsxWorkbook<RS>, logger: &dyn Logger) -> Result<Vec<Row>, RosterError> {
    let shared_strings = workbook.load_shared_strings(logger)
        .with_prefix("Read shared strings")?;
    let rows = workbook.read_rows(&shared_strings)
        .with_prefix("Read worksheet")?;
    logger.info(&format!("Read {} rows", rows.len()));
    Ok(rows)
}
