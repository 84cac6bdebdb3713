//! Row Transformer
//!
//! Turns one decoded data row into a person, the row's location chain and the
//! program roles marked in the row's program columns.
use crate::classifier::ProgramColumns;
use crate::location::LocationResolver;
use crate::logger::Logger;
use crate::model::LocationType;
use crate::model::Person;
use crate::model::ProgramRole;
use crate::model::RoleStatus;
use crate::model::Statistics;
use crate::normalize::classify_section;
use crate::normalize::normalize_program_code;
use crate::normalize::normalize_sex;
use crate::normalize::parse_date;
use crate::normalize::synthetic_end_date;
use crate::normalize::synthetic_start_date;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that discard a single row.
#[derive(Error, Debug)]
pub enum RowError {
    /// Role date arithmetic left the representable calendar
    #[error("Cannot derive {what} for program '{code}'")]
    RoleDateOutOfRange { code: String, what: &'static str },
}

/// 0-based positions of the fixed person and location columns.
pub mod columns {
    pub const FIRST_NAMES: usize = 0;
    pub const FAMILY_NAME: usize = 1;
    pub const SEX: usize = 2;
    pub const DATE_OF_BIRTH: usize = 5;
    pub const EXTERNAL_ID: usize = 8;
    pub const FOCUS_NEIGHBOURHOOD: usize = 17;
    pub const LOCALITY: usize = 18;
    pub const ELECTORAL_UNIT: usize = 19;
    pub const CLUSTER: usize = 20;
    pub const GROUP_OF_CLUSTERS: usize = 21;
    pub const SUBREGION: usize = 22;
    pub const REGION: usize = 23;
    pub const NATIONAL_COMMUNITY: usize = 24;
    pub const ADDRESS: usize = 25;
    pub const TELEPHONE: usize = 26;
    pub const EMAIL: usize = 27;
}

/// Moves one trimmed, non-empty cell into a person. Returns `false` when the
/// value could not be used.
type FieldParser = fn(&mut Person, &str) -> bool;

/// Binds a person field to its column.
struct FieldRule {
    name: &'static str,
    column: usize,
    apply: FieldParser,
}

const PERSON_FIELDS: [FieldRule; 8] = [
    FieldRule { name: "first names", column: columns::FIRST_NAMES, apply: set_first_names },
    FieldRule { name: "family name", column: columns::FAMILY_NAME, apply: set_family_name },
    FieldRule { name: "sex", column: columns::SEX, apply: set_sex },
    FieldRule { name: "date of birth", column: columns::DATE_OF_BIRTH, apply: set_date_of_birth },
    FieldRule { name: "external id", column: columns::EXTERNAL_ID, apply: set_external_id },
    FieldRule { name: "address", column: columns::ADDRESS, apply: set_address },
    FieldRule { name: "telephone", column: columns::TELEPHONE, apply: set_phone },
    FieldRule { name: "email", column: columns::EMAIL, apply: set_email },
];

fn set_first_names(person: &mut Person, value: &str) -> bool {
    person.first_names = Some(value.to_owned());
    true
}

fn set_family_name(person: &mut Person, value: &str) -> bool {
    person.family_name = Some(value.to_owned());
    true
}

fn set_sex(person: &mut Person, value: &str) -> bool {
    person.sex = normalize_sex(value);
    true
}

fn set_date_of_birth(person: &mut Person, value: &str) -> bool {
    person.date_of_birth = parse_date(value);
    person.date_of_birth.is_some()
}

fn set_external_id(person: &mut Person, value: &str) -> bool {
    person.external_id = Some(value.to_owned());
    true
}

fn set_address(person: &mut Person, value: &str) -> bool {
    person.address = Some(value.to_owned());
    true
}

fn set_phone(person: &mut Person, value: &str) -> bool {
    person.phone = Some(value.to_owned());
    true
}

fn set_email(person: &mut Person, value: &str) -> bool {
    person.email = Some(value.to_owned());
    true
}

/// Location columns, most general level first.
const LOCATION_COLUMNS: [(LocationType, usize); 8] = [
    (LocationType::NationalCommunity, columns::NATIONAL_COMMUNITY),
    (LocationType::Region, columns::REGION),
    (LocationType::Subregion, columns::SUBREGION),
    (LocationType::GroupOfClusters, columns::GROUP_OF_CLUSTERS),
    (LocationType::Cluster, columns::CLUSTER),
    (LocationType::ElectoralUnit, columns::ELECTORAL_UNIT),
    (LocationType::Locality, columns::LOCALITY),
    (LocationType::FocusNeighbourhood, columns::FOCUS_NEIGHBOURHOOD),
];

/// Everything one row contributes.
#[derive(Debug)]
pub struct RowOutcome {
    pub person: Person,
    pub roles: Vec<ProgramRole>,
}

pub struct RowTransformer<'a> {
    program_columns: &'a ProgramColumns,
    /// Reference date for synthesized role dates
    today: NaiveDate,
}

impl<'a> RowTransformer<'a> {
    pub fn new(program_columns: &'a ProgramColumns, today: NaiveDate) -> Self {
        RowTransformer { program_columns, today }
    }

    /// Transforms the row found at 1-based `row_number`.
    ///
    /// A row without first or family name yields `Ok(None)` and a warning. On
    /// `Err` nothing from the row has been recorded, locations included.
    pub fn transform(
        &self,
        row_number: usize,
        row: &[String],
        resolver: &mut LocationResolver,
        stats: &mut Statistics,
        logger: &dyn Logger,
    ) -> Result<Option<RowOutcome>, RowError> {
        let mut person = self.extract_person(row_number, row, stats, logger);
        if !person.has_name() {
            stats.add_warning(format!("Row {row_number}: No name found, skipping empty row"), logger);
            return Ok(None);
        }
        if person.external_id.is_none() {
            logger.debug(&format!(
                "Row {row_number}: Person '{} {}' has no external id",
                person.first_names.as_deref().unwrap_or_default(),
                person.family_name.as_deref().unwrap_or_default()
            ));
        }

        let roles = self.extract_roles(row_number, row, &person, logger)?;

        let chain = LOCATION_COLUMNS
            .iter()
            .map(|(kind, column)| (*kind, cell(row, *column)));
        person.location_id = resolver.resolve_chain(chain);

        Ok(Some(RowOutcome { person, roles }))
    }

    fn extract_person(&self, row_number: usize, row: &[String], stats: &mut Statistics, logger: &dyn Logger) -> Person {
        let mut person = Person::new(row_number);
        for rule in &PERSON_FIELDS {
            let value = cell(row, rule.column);
            if value.is_empty() {
                continue;
            }
            if !(rule.apply)(&mut person, value) {
                stats.add_warning(
                    format!("Row {row_number}: Could not parse {}: {value}", rule.name),
                    logger,
                );
            }
        }
        person
    }

    fn extract_roles(&self, row_number: usize, row: &[String], person: &Person, logger: &dyn Logger) -> Result<Vec<ProgramRole>, RowError> {
        let mut roles = Vec::new();
        for (&column, program) in self.program_columns {
            let value = cell(row, column);
            if value.is_empty() {
                continue;
            }

            let (kind, status) = classify_section(&program.section);
            let code = normalize_program_code(&program.code);
            let start_date = match parse_date(value) {
                Some(date) => date,
                None => {
                    logger.debug(&format!("Row {row_number}: No date in '{value}' for {code}, using a default start date"));
                    synthetic_start_date(status, self.today).ok_or_else(|| RowError::RoleDateOutOfRange {
                        code: code.clone(),
                        what: "start date",
                    })?
                }
            };
            let end_date = match status {
                RoleStatus::Current => None,
                RoleStatus::Previous => Some(synthetic_end_date(start_date, self.today).ok_or_else(|| {
                    RowError::RoleDateOutOfRange {
                        code: code.clone(),
                        what: "end date",
                    }
                })?),
            };

            roles.push(ProgramRole {
                person: person.person_ref(),
                program_code: code,
                kind,
                status,
                start_date,
                end_date,
            });
        }
        Ok(roles)
    }
}

fn cell(row: &[String], column: usize) -> &str {
    row.get(column).map(|value| value.trim()).unwrap_or("")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classifier::ProgramColumn;
    use crate::classifier::PROGRAM_START_COLUMN;
    use crate::logger::MemoryLogger;
    use crate::logger::NullLogger;
    use crate::model::PersonRef;
    use crate::model::RoleKind;

    pub(crate) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date")
    }

    /// Builds a row from (column, value) pairs.
    pub(crate) fn row(cells: &[(usize, &str)]) -> Vec<String> {
        let width = cells.iter().map(|(column, _)| column + 1).max().unwrap_or(0);
        let mut row = vec![String::new(); width];
        for (column, value) in cells {
            row[*column] = value.to_string();
        }
        row
    }

    fn program_columns() -> ProgramColumns {
        let mut programs = ProgramColumns::new();
        programs.insert(PROGRAM_START_COLUMN, ProgramColumn {
            code: "G1".to_owned(),
            section: "Currently teaching a children's class".to_owned(),
        });
        programs.insert(PROGRAM_START_COLUMN + 1, ProgramColumn {
            code: "Book 10\n(U1)".to_owned(),
            section: "Previously tutored study circles".to_owned(),
        });
        programs.insert(PROGRAM_START_COLUMN + 2, ProgramColumn {
            code: "BC".to_owned(),
            section: "Currently coordinating junior youth groups".to_owned(),
        });
        programs
    }

    #[test]
    fn full_row_becomes_person_location_and_roles() -> Result<(), RowError> {
        let programs = program_columns();
        let transformer = RowTransformer::new(&programs, today());
        let mut resolver = LocationResolver::new();
        let mut stats = Statistics::default();
        let row = row(&[
            (columns::FIRST_NAMES, " Amelia "),
            (columns::FAMILY_NAME, "Stone"),
            (columns::SEX, "Female"),
            (columns::DATE_OF_BIRTH, "25569"),
            (columns::EXTERNAL_ID, "A-100"),
            (columns::LOCALITY, "Ottawa"),
            (columns::NATIONAL_COMMUNITY, "Canada"),
            (columns::EMAIL, "amelia@example.org"),
            (PROGRAM_START_COLUMN, "x"),
            (PROGRAM_START_COLUMN + 1, "2015-03-01"),
        ]);

        let outcome = transformer
            .transform(4, &row, &mut resolver, &mut stats, &NullLogger)?
            .expect("named row");

        let person = &outcome.person;
        assert_eq!(person.first_names.as_deref(), Some("Amelia"));
        assert_eq!(person.sex.as_deref(), Some("F"));
        assert_eq!(person.date_of_birth, NaiveDate::from_ymd_opt(1970, 1, 1));
        assert_eq!(person.email.as_deref(), Some("amelia@example.org"));
        assert_eq!(person.location_id, Some(2));
        assert_eq!(person.row_number, 4);
        assert_eq!(resolver.len(), 2);

        assert_eq!(outcome.roles.len(), 2);
        let tutor = &outcome.roles[0];
        assert_eq!(tutor.person, PersonRef::ExternalId("A-100".to_owned()));
        assert_eq!(tutor.program_code, "G1");
        assert_eq!((tutor.kind, tutor.status), (RoleKind::Tutor, RoleStatus::Current));
        assert_eq!(tutor.start_date, NaiveDate::from_ymd_opt(2025, 10, 18).expect("valid date"));
        assert_eq!(tutor.end_date, None);

        let previous = &outcome.roles[1];
        assert_eq!(previous.program_code, "Book10_U1");
        assert_eq!(previous.status, RoleStatus::Previous);
        assert_eq!(previous.start_date, NaiveDate::from_ymd_opt(2015, 3, 1).expect("valid date"));
        assert_eq!(previous.end_date, NaiveDate::from_ymd_opt(2015, 8, 28));
        assert!(outcome.roles.iter().all(ProgramRole::has_consistent_dates));
        assert_eq!(stats.warnings, 0);
        Ok(())
    }

    #[test]
    fn nameless_row_is_skipped_with_warning() -> Result<(), RowError> {
        let programs = program_columns();
        let transformer = RowTransformer::new(&programs, today());
        let mut resolver = LocationResolver::new();
        let mut stats = Statistics::default();
        let logger = MemoryLogger::new();
        let row = row(&[(columns::EXTERNAL_ID, "A-1"), (columns::LOCALITY, "Ottawa"), (PROGRAM_START_COLUMN, "x")]);

        let outcome = transformer.transform(3, &row, &mut resolver, &mut stats, &logger)?;
        assert!(outcome.is_none());
        assert_eq!(stats.warnings, 1);
        assert_eq!(stats.errors, 0);
        assert!(resolver.is_empty());
        assert_eq!(logger.messages(log::Level::Warn), vec!["Row 3: No name found, skipping empty row"]);
        Ok(())
    }

    #[test]
    fn person_without_external_id_is_referenced_by_row() -> Result<(), RowError> {
        let programs = program_columns();
        let transformer = RowTransformer::new(&programs, today());
        let mut resolver = LocationResolver::new();
        let mut stats = Statistics::default();
        let row = row(&[(columns::FAMILY_NAME, "Okafor"), (PROGRAM_START_COLUMN + 2, "1")]);

        let outcome = transformer
            .transform(9, &row, &mut resolver, &mut stats, &NullLogger)?
            .expect("named row");
        assert_eq!(outcome.person.location_id, None);
        assert_eq!(outcome.roles.len(), 1);
        assert_eq!(outcome.roles[0].person, PersonRef::Row(9));
        assert_eq!(outcome.roles[0].kind, RoleKind::Coordinator);
        Ok(())
    }

    #[test]
    fn previous_role_without_date_gets_synthetic_range() -> Result<(), RowError> {
        let programs = program_columns();
        let transformer = RowTransformer::new(&programs, today());
        let mut resolver = LocationResolver::new();
        let mut stats = Statistics::default();
        let row = row(&[(columns::FIRST_NAMES, "Lee"), (PROGRAM_START_COLUMN + 1, "yes")]);

        let outcome = transformer
            .transform(2, &row, &mut resolver, &mut stats, &NullLogger)?
            .expect("named row");
        let role = &outcome.roles[0];
        assert_eq!(role.start_date, NaiveDate::from_ymd_opt(2024, 10, 18).expect("valid date"));
        assert_eq!(role.end_date, NaiveDate::from_ymd_opt(2025, 4, 16));
        assert!(role.has_consistent_dates());
        assert_eq!(stats.warnings, 0);
        Ok(())
    }

    #[test]
    fn bad_birth_date_is_a_counted_warning() -> Result<(), RowError> {
        let programs = ProgramColumns::new();
        let transformer = RowTransformer::new(&programs, today());
        let mut resolver = LocationResolver::new();
        let mut stats = Statistics::default();
        let row = row(&[(columns::FIRST_NAMES, "Lee"), (columns::DATE_OF_BIRTH, "sometime")]);

        let outcome = transformer
            .transform(2, &row, &mut resolver, &mut stats, &NullLogger)?
            .expect("named row");
        assert_eq!(outcome.person.date_of_birth, None);
        assert_eq!(stats.warnings, 1);
        assert_eq!(stats.errors, 0);
        Ok(())
    }

    #[test]
    fn failing_row_leaves_no_locations_behind() {
        let programs = program_columns();
        let transformer = RowTransformer::new(&programs, NaiveDate::MIN);
        let mut resolver = LocationResolver::new();
        let mut stats = Statistics::default();
        let row = row(&[
            (columns::FIRST_NAMES, "Lee"),
            (columns::LOCALITY, "Ottawa"),
            (PROGRAM_START_COLUMN + 1, "x"),
        ]);

        let result = transformer.transform(2, &row, &mut resolver, &mut stats, &NullLogger);
        assert!(matches!(result, Err(RowError::RoleDateOutOfRange { what: "start date", .. })));
        assert!(resolver.is_empty());
    }
}
