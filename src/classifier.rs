//! Column Classifier
//!
//! Finds the program-participation columns of the sheet. The header row carries
//! section labels such as "Currently teaching a children's class" that span
//! several columns (the cells to their right are left empty); the row below it
//! carries one program code per column ("G1", "BC", "Book 10 (U1)").
use crate::logger::Logger;
use crate::spreadsheet::reference::column_letters;
use std::collections::BTreeMap;

/// First column (0-based, "AC") after the person and location block.
pub const PROGRAM_START_COLUMN: usize = 28;

/// Lower-case fragments that mark a header cell as a program section label.
const SECTION_KEYWORDS: [&str; 15] = [
    "teaching",
    "taught",
    "tutor",
    "tutoring",
    "animating",
    "animated",
    "coordinating",
    "serving",
    "served",
    "participating",
    "participated",
    "study circle",
    "children",
    "children's class",
    "junior youth",
];

/// Longest subheader accepted as a code without mentioning "book".
const MAX_CODE_LENGTH: usize = 10;

/// A column judged to hold participation marks for one program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramColumn {
    /// Raw program code from the subheader row
    pub code: String,
    /// Section label in effect for the column
    pub section: String,
}

/// Program columns keyed by 0-based column index, in column order.
pub type ProgramColumns = BTreeMap<usize, ProgramColumn>;

/// Classifies the columns from [`PROGRAM_START_COLUMN`] to the end of the header row.
pub fn classify_columns(header: &[String], subheader: &[String], logger: &dyn Logger) -> ProgramColumns {
    let mut columns = ProgramColumns::new();
    let mut section = String::new();

    for index in PROGRAM_START_COLUMN..header.len() {
        let label = cell_text(header, index);
        let code = cell_text(subheader, index);

        if !label.is_empty() && is_section_label(label) {
            section = label.to_owned();
        }

        if !code.is_empty() && !section.is_empty() && looks_like_program_code(code) {
            logger.debug(&format!(
                "Column {}: Section='{}' Code='{}'",
                column_letters(index + 1),
                section.chars().take(40).collect::<String>(),
                code
            ));
            columns.insert(
                index,
                ProgramColumn {
                    code: code.to_owned(),
                    section: section.to_owned(),
                },
            );
        }
    }

    logger.info(&format!("Found {} program columns", columns.len()));
    columns
}

fn cell_text(row: &[String], index: usize) -> &str {
    row.get(index).map(|value| value.trim()).unwrap_or("")
}

/// Whether a header cell opens a new program section.
pub(crate) fn is_section_label(label: &str) -> bool {
    let label = label.to_lowercase();
    SECTION_KEYWORDS.iter().any(|keyword| label.contains(keyword))
}

/// Short alphanumeric codes ("G1", "WJ", "Book3-G2") or anything naming a book.
pub(crate) fn looks_like_program_code(code: &str) -> bool {
    let compact: String = code
        .chars()
        .filter(|character| !matches!(character, ' ' | '-' | '_'))
        .collect();
    let is_short_code = code.chars().count() <= MAX_CODE_LENGTH
        && !compact.is_empty()
        && compact.chars().all(char::is_alphanumeric);
    is_short_code || code.to_lowercase().contains("book")
}
