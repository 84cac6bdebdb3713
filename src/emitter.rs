//! Statement Emitter
//!
//! Serializes the collected locations, persons and roles as one PostgreSQL
//! transaction of batched upserts. Locations come first in parent-before-child
//! order, then persons, then roles, so every foreign key already exists when
//! it is referenced.
use crate::error::RosterError;
use crate::logger::Logger;
use crate::model::Location;
use crate::model::Person;
use crate::model::PersonRef;
use crate::model::ProgramRole;
use crate::model::Statistics;
use crate::model::PROVENANCE_PREFIX;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use std::io::Write;

const GENERATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const RULE: &str = "-- ============================================================";

/// Output settings of one emission.
#[derive(Clone, Debug)]
pub struct EmitterConfig {
    /// Schema holding the target tables
    pub schema: String,
    /// Records per batch, at least 1
    pub batch_size: usize,
    pub generated_at: NaiveDateTime,
    /// File name shown in the usage line of the header
    pub output_name: String,
}

pub struct SqlEmitter<W: Write> {
    writer: W,
    config: EmitterConfig,
}

impl<W: Write> SqlEmitter<W> {
    pub fn new(writer: W, config: EmitterConfig) -> Self {
        SqlEmitter { writer, config }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Writes the whole transaction and records the final entity counts in
    /// `stats` before the statistics block is written.
    ///
    /// # Arguments
    /// * `locations` - Locations in parent-before-child order
    /// * `persons` - Persons in row order
    /// * `roles` - Program roles in row order
    /// * `stats` - Run statistics, completed here and written as the trailing comment block
    /// * `logger` - Receives a debug summary of what was written
    ///
    /// # Returns
    /// An error only when the underlying writer fails
    pub fn emit(
        &mut self,
        locations: &[Location],
        persons: &[Person],
        roles: &[ProgramRole],
        stats: &mut Statistics,
        logger: &dyn Logger,
    ) -> Result<(), RosterError> {
        stats.locations_created = locations.len();
        stats.persons_created = persons.len();
        stats.roles_created = roles.len();

        self.write_header()?;
        self.write_locations(locations)?;
        self.write_persons(persons)?;
        self.write_roles(roles)?;
        self.write_footer(stats)?;
        self.writer.flush()?;

        logger.debug(&format!(
            "Wrote {} locations, {} persons and {} program roles",
            locations.len(),
            persons.len(),
            roles.len()
        ));
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), RosterError> {
        let schema = &self.config.schema;
        writeln!(self.writer, "-- SQL INSERT statements for community membership data")?;
        writeln!(self.writer, "-- Generated: {}", self.config.generated_at.format(GENERATED_FORMAT))?;
        writeln!(self.writer, "-- Source: Excel import")?;
        writeln!(self.writer, "--")?;
        writeln!(self.writer, "-- Schema:")?;
        writeln!(self.writer, "--   - persons: Individual records")?;
        writeln!(self.writer, "--   - locations: Geographic hierarchy")?;
        writeln!(self.writer, "--   - person_program_roles: Program participation")?;
        writeln!(self.writer, "--")?;
        writeln!(self.writer, "-- Usage: psql -d database_name -f {}", self.config.output_name)?;
        writeln!(self.writer)?;
        writeln!(self.writer, "BEGIN;")?;
        writeln!(self.writer)?;
        writeln!(self.writer, "SET search_path TO {schema};")?;
        writeln!(self.writer, "SET client_encoding = 'UTF8';")?;
        writeln!(self.writer)?;
        writeln!(self.writer, "-- Savepoint for error recovery")?;
        writeln!(self.writer, "SAVEPOINT batch_start;")?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn write_banner(&mut self, title: &str) -> Result<(), RosterError> {
        writeln!(self.writer)?;
        writeln!(self.writer, "{RULE}")?;
        writeln!(self.writer, "-- {title}")?;
        writeln!(self.writer, "{RULE}")?;
        Ok(())
    }

    fn write_locations(&mut self, locations: &[Location]) -> Result<(), RosterError> {
        self.write_banner("LOCATIONS (Hierarchical Geographic Data)")?;
        writeln!(self.writer, "-- Parents are inserted before their children.")?;
        writeln!(self.writer)?;

        let schema = self.config.schema.clone();
        for batch in locations.chunks(self.config.batch_size.max(1)) {
            writeln!(self.writer, "-- Batch of {} locations", batch.len())?;
            for location in batch {
                let parent_id = match location.parent_id {
                    Some(id) => id.to_string(),
                    None => "NULL".to_owned(),
                };
                writeln!(
                    self.writer,
                    "INSERT INTO {schema}.locations (id, location_name, location_type, parent_location_id)"
                )?;
                writeln!(
                    self.writer,
                    "VALUES ({}, {}, {}, {parent_id})",
                    location.id,
                    quote(&location.name),
                    quote(location.kind.as_str())
                )?;
                writeln!(
                    self.writer,
                    "ON CONFLICT (location_name, location_type, parent_location_id) DO UPDATE SET id = EXCLUDED.id;"
                )?;
            }
            writeln!(self.writer)?;
        }

        if !locations.is_empty() {
            writeln!(self.writer, "-- Move the id sequence past the explicit ids")?;
            writeln!(
                self.writer,
                "SELECT setval('{schema}.locations_id_seq', (SELECT MAX(id) FROM {schema}.locations));"
            )?;
            writeln!(self.writer)?;
        }
        Ok(())
    }

    fn write_persons(&mut self, persons: &[Person]) -> Result<(), RosterError> {
        self.write_banner("PERSONS (Individual Records)")?;
        writeln!(self.writer)?;

        let schema = self.config.schema.clone();
        for batch in persons.chunks(self.config.batch_size.max(1)) {
            writeln!(self.writer, "-- Batch of {} persons", batch.len())?;
            for person in batch {
                let values = [
                    quote_optional(person.external_id.as_deref()),
                    quote_optional(person.first_names.as_deref()),
                    quote_optional(person.family_name.as_deref()),
                    quote_optional(person.sex.as_deref()),
                    date_literal(person.date_of_birth),
                    quote_optional(person.email.as_deref()),
                    quote_optional(person.phone.as_deref()),
                    quote_optional(person.address.as_deref()),
                    person.location_id.map_or_else(|| "NULL".to_owned(), |id| id.to_string()),
                    quote(&person.provenance()),
                ]
                .join(", ");

                if person.external_id.is_none() {
                    writeln!(
                        self.writer,
                        "-- Person from row {}: {} {} (no external id)",
                        person.row_number,
                        person.first_names.as_deref().unwrap_or_default(),
                        person.family_name.as_deref().unwrap_or_default()
                    )?;
                }
                writeln!(
                    self.writer,
                    "INSERT INTO {schema}.persons (bahai_id, first_names, family_name, sex, date_of_birth, email, telephone, address, locality_id, comments)"
                )?;
                match person.external_id {
                    Some(_) => {
                        writeln!(self.writer, "VALUES ({values})")?;
                        writeln!(self.writer, "ON CONFLICT (bahai_id) DO UPDATE SET")?;
                        for column in PERSON_UPDATE_COLUMNS {
                            writeln!(self.writer, "    {column} = EXCLUDED.{column},")?;
                        }
                        writeln!(self.writer, "    updated_at = CURRENT_TIMESTAMP;")?;
                    }
                    None => writeln!(self.writer, "VALUES ({values});")?,
                }
            }
            writeln!(self.writer)?;
        }

        let without_id = persons.iter().filter(|person| person.external_id.is_none()).count();
        if without_id > 0 {
            writeln!(self.writer, "-- Note: {without_id} persons without external id included")?;
            writeln!(self.writer)?;
        }
        Ok(())
    }

    fn write_roles(&mut self, roles: &[ProgramRole]) -> Result<(), RosterError> {
        self.write_banner("PERSON PROGRAM ROLES (Junction Table)")?;
        writeln!(self.writer)?;

        let schema = self.config.schema.clone();
        for batch in roles.chunks(self.config.batch_size.max(1)) {
            writeln!(self.writer, "-- Batch of {} program roles", batch.len())?;
            for role in batch {
                let person_condition = match &role.person {
                    PersonRef::ExternalId(id) => format!("bahai_id = {}", quote(id)),
                    PersonRef::Row(row_number) => {
                        writeln!(self.writer, "-- Program role for person without external id from Excel row {row_number}")?;
                        format!("comments LIKE '%{}{row_number}%'", escape(PROVENANCE_PREFIX))
                    }
                };
                writeln!(
                    self.writer,
                    "INSERT INTO {schema}.person_program_roles (person_id, program_id, role_type, status_type, start_date, end_date)"
                )?;
                writeln!(self.writer, "SELECT")?;
                writeln!(self.writer, "    p.id,")?;
                writeln!(self.writer, "    pr.id,")?;
                writeln!(self.writer, "    {}::role_type,", quote(role.kind.as_str()))?;
                writeln!(self.writer, "    {}::status_type,", quote(role.status.as_str()))?;
                writeln!(self.writer, "    {},", date_literal(Some(role.start_date)))?;
                writeln!(self.writer, "    {}", date_literal(role.end_date))?;
                writeln!(self.writer, "FROM {schema}.persons p, {schema}.programs pr")?;
                writeln!(self.writer, "WHERE p.{person_condition}")?;
                writeln!(self.writer, "  AND pr.program_code = {}", quote(&role.program_code))?;
                writeln!(self.writer, "ON CONFLICT (person_id, program_id, role_type, status_type) DO UPDATE SET")?;
                writeln!(self.writer, "    start_date = EXCLUDED.start_date,")?;
                writeln!(self.writer, "    end_date = EXCLUDED.end_date,")?;
                writeln!(self.writer, "    updated_at = CURRENT_TIMESTAMP;")?;
            }
            writeln!(self.writer)?;
        }
        Ok(())
    }

    fn write_footer(&mut self, stats: &Statistics) -> Result<(), RosterError> {
        self.write_banner("COMMIT TRANSACTION")?;
        writeln!(self.writer)?;
        writeln!(self.writer, "COMMIT;")?;
        self.write_banner("STATISTICS")?;
        writeln!(self.writer, "-- Total rows processed: {}", stats.total_rows)?;
        writeln!(self.writer, "-- Persons inserted: {}", stats.persons_created)?;
        writeln!(self.writer, "-- Locations created: {}", stats.locations_created)?;
        writeln!(self.writer, "-- Program roles created: {}", stats.roles_created)?;
        writeln!(self.writer, "-- Errors: {}", stats.errors)?;
        writeln!(self.writer, "-- Warnings: {}", stats.warnings)?;
        writeln!(self.writer, "--")?;
        writeln!(self.writer, "-- Generated: {}", self.config.generated_at.format(GENERATED_FORMAT))?;
        writeln!(self.writer, "{RULE}")?;
        Ok(())
    }
}

/// Person columns refreshed when the external id already exists.
const PERSON_UPDATE_COLUMNS: [&str; 9] = [
    "first_names",
    "family_name",
    "sex",
    "date_of_birth",
    "email",
    "telephone",
    "address",
    "locality_id",
    "comments",
];

/// Doubles single quotes for a SQL string literal.
pub fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

fn quote(value: &str) -> String {
    format!("'{}'", escape(value))
}

fn quote_optional(value: Option<&str>) -> String {
    value.map_or_else(|| "NULL".to_owned(), quote)
}

fn date_literal(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "NULL".to_owned(), |date| format!("'{date}'"))
}
