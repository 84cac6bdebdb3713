//! End-to-end conversion: decode, classify, transform every row, then emit.
use crate::classifier::classify_columns;
use crate::config::ConvertOptions;
use crate::emitter::EmitterConfig;
use crate::emitter::SqlEmitter;
use crate::error::ResultMessage;
use crate::error::RosterError;
use crate::location::LocationResolver;
use crate::logger::Logger;
use crate::model::Location;
use crate::model::Person;
use crate::model::ProgramRole;
use crate::model::Statistics;
use crate::spreadsheet;
use crate::spreadsheet::Row;
use crate::transform::RowTransformer;
use chrono::NaiveDate;
use std::fs::File;
use std::io::BufWriter;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    /// The header and subheader rows are both required
    #[error("Spreadsheet has {0} rows, at least 2 (header and subheader) are required")]
    TooFewRows(usize),
}

/// Entities collected from one spreadsheet, ready to be emitted.
#[derive(Debug, Default)]
pub struct Conversion {
    pub persons: Vec<Person>,
    /// Parent-before-child order
    pub locations: Vec<Location>,
    pub roles: Vec<ProgramRole>,
    pub stats: Statistics,
}

/// Converts the spreadsheet at `input` into the SQL file named by `options`.
///
/// The output file is created only after the whole spreadsheet has been
/// transformed, so a fatal error leaves nothing behind.
///
/// # Arguments
/// * `input` - Path to the XLSX file
/// * `options` - Output path, batch size, schema and the run's clock
/// * `logger` - Receives progress, warnings and per-row errors
///
/// # Returns
/// Final statistics of the run. Row errors are counted there and do not make
/// the result an `Err`; only fatal conditions do.
pub fn convert(input: &Path, options: &ConvertOptions, logger: &dyn Logger) -> Result<Statistics, RosterError> {
    let rows = spreadsheet::read_rows(input, logger)?;
    let mut conversion = collect(&rows, options.today, logger)?;

    logger.info(&format!("Generating SQL to: {}", options.output.display()));
    let file = File::create(&options.output)
        .map_err(RosterError::from)
        .with_prefix(&format!("Create output file '{}'", options.output.display()))?;
    write_sql(&mut conversion, BufWriter::new(file), options, logger)?;
    logger.info(&format!("SQL generation complete. File: {}", options.output.display()));

    Ok(conversion.stats)
}

/// Converts a spreadsheet held by any seekable reader, writing SQL to `writer`.
pub fn convert_reader<RS: Read + Seek, W: Write>(
    reader: RS,
    writer: W,
    options: &ConvertOptions,
    logger: &dyn Logger,
) -> Result<Statistics, RosterError> {
    let rows = spreadsheet::read_rows_from(reader, logger)?;
    let mut conversion = collect(&rows, options.today, logger)?;
    write_sql(&mut conversion, writer, options, logger)?;
    Ok(conversion.stats)
}

/// Runs the classifier over the two header rows and the transformer over
/// every later row.
///
/// Rows are numbered from 1 as decoded, so the first data row is row 2. A row
/// that fails is recorded as an error and contributes nothing.
pub fn collect(rows: &[Row], today: NaiveDate, logger: &dyn Logger) -> Result<Conversion, RosterError> {
    if rows.len() < 2 {
        return Err(ConvertError::TooFewRows(rows.len()).into());
    }

    let program_columns = classify_columns(&rows[0], &rows[1], logger);
    let transformer = RowTransformer::new(&program_columns, today);
    let mut resolver = LocationResolver::new();
    let mut conversion = Conversion::default();
    conversion.stats.total_rows = rows.len() - 1;

    logger.info(&format!("Processing {} rows", rows.len()));
    for (index, row) in rows.iter().enumerate().skip(1) {
        let row_number = index + 1;
        match transformer.transform(row_number, row, &mut resolver, &mut conversion.stats, logger) {
            Ok(Some(outcome)) => {
                conversion.persons.push(outcome.person);
                conversion.roles.extend(outcome.roles);
            }
            Ok(None) => {}
            Err(e) => conversion.stats.add_error(format!("Row {row_number}: {e}"), logger),
        }
    }

    conversion.locations = resolver.topological_order(logger);
    logger.info(&format!("Processed {} rows", conversion.stats.total_rows));
    logger.info(&format!(
        "Created {} persons, {} locations, {} roles",
        conversion.persons.len(),
        conversion.locations.len(),
        conversion.roles.len()
    ));
    Ok(conversion)
}

fn write_sql<W: Write>(
    conversion: &mut Conversion,
    writer: W,
    options: &ConvertOptions,
    logger: &dyn Logger,
) -> Result<(), RosterError> {
    let config = EmitterConfig {
        schema: options.schema.to_owned(),
        batch_size: options.batch_size,
        generated_at: options.generated_at,
        output_name: options.output_name(),
    };
    let mut emitter = SqlEmitter::new(writer, config);
    emitter
        .emit(
            &conversion.locations,
            &conversion.persons,
            &conversion.roles,
            &mut conversion.stats,
            logger,
        )
        .with_prefix("Write SQL")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PROGRAM_START_COLUMN;
    use crate::logger::MemoryLogger;
    use crate::logger::NullLogger;
    use crate::spreadsheet::reference::column_letters;
    use crate::spreadsheet::xlsx::tests::build_archive;
    use crate::spreadsheet::xlsx::tests::shared_strings;
    use crate::spreadsheet::xlsx::tests::worksheet;
    use crate::transform::columns;
    use crate::transform::tests::row;
    use std::path::PathBuf;

    fn options() -> ConvertOptions {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date");
        ConvertOptions {
            output: PathBuf::from("members.sql"),
            batch_size: 100,
            schema: "bahai_community".to_owned(),
            generated_at: today.and_hms_opt(8, 0, 0).expect("valid time"),
            today,
        }
    }

    /// Worksheet row markup with inline-string cells.
    fn sheet_row(number: usize, cells: &[(usize, &str)]) -> String {
        let cells: String = cells
            .iter()
            .map(|(column, value)| {
                format!(
                    r#"<c r="{}{number}" t="inlineStr"><is><t>{value}</t></is></c>"#,
                    column_letters(column + 1)
                )
            })
            .collect();
        format!(r#"<row r="{number}">{cells}</row>"#)
    }

    fn header_rows() -> Vec<Row> {
        vec![
            row(&[(columns::FIRST_NAMES, "First names"), (PROGRAM_START_COLUMN, "Currently teaching a children's class")]),
            row(&[(PROGRAM_START_COLUMN, "G1")]),
        ]
    }

    #[test]
    fn single_row_is_rejected() {
        let rows = vec![row(&[(0, "First names")])];
        let result = collect(&rows, options().today, &NullLogger);
        assert!(matches!(result, Err(RosterError::ConvertError(ConvertError::TooFewRows(1)))));
    }

    #[test]
    fn header_scenario_yields_current_tutor_role() -> Result<(), RosterError> {
        let mut rows = header_rows();
        rows.push(row(&[
            (columns::FIRST_NAMES, "Amelia"),
            (columns::EXTERNAL_ID, "A-1"),
            (PROGRAM_START_COLUMN, "x"),
        ]));

        let conversion = collect(&rows, options().today, &NullLogger)?;
        assert_eq!(conversion.persons.len(), 1);
        assert_eq!(conversion.roles.len(), 1);
        let role = &conversion.roles[0];
        assert_eq!(role.program_code, "G1");
        assert_eq!(role.kind.as_str(), "tutor");
        assert_eq!(role.status.as_str(), "current");
        assert_eq!(role.end_date, None);
        Ok(())
    }

    #[test]
    fn nameless_rows_count_but_contribute_nothing() -> Result<(), RosterError> {
        let mut rows = header_rows();
        rows.push(row(&[(columns::EXTERNAL_ID, "A-9"), (columns::LOCALITY, "Ottawa"), (PROGRAM_START_COLUMN, "x")]));
        let logger = MemoryLogger::new();

        let conversion = collect(&rows, options().today, &logger)?;
        assert_eq!(conversion.stats.total_rows, 2);
        assert!(conversion.persons.is_empty());
        assert!(conversion.roles.is_empty());
        assert!(conversion.locations.is_empty());
        // the subheader row has no names either
        assert_eq!(conversion.stats.warnings, 2);
        assert_eq!(conversion.stats.errors, 0);
        assert_eq!(
            logger.messages(log::Level::Warn),
            vec!["Row 2: No name found, skipping empty row", "Row 3: No name found, skipping empty row"]
        );
        Ok(())
    }

    #[test]
    fn failing_row_is_recorded_and_skipped() -> Result<(), RosterError> {
        let mut rows = vec![
            row(&[(PROGRAM_START_COLUMN, "Previously participated in study circles")]),
            row(&[(PROGRAM_START_COLUMN, "Book 1")]),
        ];
        rows.push(row(&[(columns::FIRST_NAMES, "Lee"), (columns::LOCALITY, "Ottawa"), (PROGRAM_START_COLUMN, "x")]));
        rows.push(row(&[(columns::FIRST_NAMES, "Ana"), (PROGRAM_START_COLUMN, "2019")]));

        let conversion = collect(&rows, NaiveDate::MIN, &NullLogger)?;
        assert_eq!(conversion.stats.errors, 1);
        assert!(conversion.stats.error_details[0].starts_with("Row 3: "));
        assert_eq!(conversion.persons.len(), 1);
        assert_eq!(conversion.persons[0].first_names.as_deref(), Some("Ana"));
        assert!(conversion.locations.is_empty());
        Ok(())
    }

    #[test]
    fn locations_are_shared_and_ordered() -> Result<(), RosterError> {
        let mut rows = header_rows();
        rows.push(row(&[(columns::FIRST_NAMES, "A"), (columns::LOCALITY, "Ottawa"), (columns::NATIONAL_COMMUNITY, "Canada")]));
        rows.push(row(&[(columns::FIRST_NAMES, "B"), (columns::LOCALITY, "Ottawa"), (columns::NATIONAL_COMMUNITY, "Canada")]));
        rows.push(row(&[(columns::FIRST_NAMES, "C"), (columns::REGION, "Ontario"), (columns::NATIONAL_COMMUNITY, "Canada")]));

        let conversion = collect(&rows, options().today, &NullLogger)?;
        let ids: Vec<Option<u32>> = conversion.persons.iter().map(|person| person.location_id).collect();
        assert_eq!(ids, vec![Some(2), Some(2), Some(3)]);
        assert_eq!(conversion.locations.len(), 3);
        assert_eq!(conversion.locations[0].parent_id, None);
        for (index, location) in conversion.locations.iter().enumerate() {
            if let Some(parent_id) = location.parent_id {
                let parent = conversion.locations.iter().position(|candidate| candidate.id == parent_id);
                assert!(parent.is_some_and(|parent| parent < index));
            }
        }
        Ok(())
    }

    #[test]
    fn spreadsheet_converts_to_sql() -> Result<(), RosterError> {
        let sheet = worksheet(&[
            sheet_row(1, &[(columns::FIRST_NAMES, "First names"), (PROGRAM_START_COLUMN, "Currently teaching a children's class")]),
            sheet_row(2, &[(PROGRAM_START_COLUMN, "G1")]),
            sheet_row(3, &[
                (columns::FIRST_NAMES, "Amelia"),
                (columns::SEX, "Female"),
                (columns::EXTERNAL_ID, "A-1"),
                (columns::LOCALITY, "Ottawa"),
                (PROGRAM_START_COLUMN, "x"),
            ]),
            sheet_row(4, &[(columns::FAMILY_NAME, "Okafor"), (PROGRAM_START_COLUMN, "2024-09-01")]),
        ]
        .concat());
        let archive = build_archive(&[
            ("xl/sharedStrings.xml", shared_strings(&[])),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);

        let mut output = Vec::new();
        let stats = convert_reader(archive, &mut output, &options(), &NullLogger)?;
        let sql = String::from_utf8_lossy(&output);

        assert_eq!(stats.total_rows, 3);
        assert_eq!((stats.persons_created, stats.locations_created, stats.roles_created), (2, 1, 2));
        assert_eq!(stats.warnings, 1);
        assert!(!stats.has_errors());

        assert!(sql.contains("-- Usage: psql -d database_name -f members.sql\n"));
        assert!(sql.contains("VALUES (1, 'Ottawa', 'locality', NULL)"));
        assert!(sql.contains("VALUES ('A-1', 'Amelia', NULL, 'F', NULL, NULL, NULL, NULL, 1, 'Excel row: 3')"));
        assert!(sql.contains("WHERE p.bahai_id = 'A-1'\n  AND pr.program_code = 'G1'\n"));
        assert!(sql.contains("WHERE p.comments LIKE '%Excel row: 4%'\n"));
        assert!(sql.contains("    '2024-09-01',\n"));
        assert!(sql.contains("-- Total rows processed: 3\n"));
        Ok(())
    }

    #[test]
    fn missing_input_is_fatal() {
        let options = options();
        let result = convert(Path::new("does/not/exist.xlsx"), &options, &NullLogger);
        assert!(result.is_err());
    }
}
