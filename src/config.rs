//! Command-line arguments and run configuration.
use chrono::Local;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use clap::Parser;
use std::path::Path;
use std::path::PathBuf;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_SCHEMA: &str = "bahai_community";
const OUTPUT_EXTENSION: &str = "sql";

/// Convert a community membership spreadsheet into PostgreSQL INSERT statements
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(after_help = "Examples:\n  rusty-roster members.xlsx\n  rusty-roster members.xlsx -o output.sql\n  rusty-roster members.xlsx -b 200 -v")]
pub struct Args {
    /// Input Excel file
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output SQL file (default: input file with a .sql extension)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Records per INSERT batch
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,

    /// Log debug messages
    #[arg(short, long)]
    pub verbose: bool,

    /// Schema holding the target tables
    #[arg(long, default_value = DEFAULT_SCHEMA)]
    pub schema: String,

    /// Write log messages to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

fn parse_batch_size(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_owned()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}

impl Args {
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| default_output_path(&self.input))
    }

    /// Options for a run starting now.
    pub fn to_options(&self) -> ConvertOptions {
        ConvertOptions {
            output: self.output_path(),
            batch_size: self.batch_size,
            schema: self.schema.to_owned(),
            ..ConvertOptions::new(&self.input)
        }
    }
}

/// Input path with its extension replaced by `.sql`.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension(OUTPUT_EXTENSION)
}

/// Settings of one conversion run.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvertOptions {
    pub output: PathBuf,
    pub batch_size: usize,
    pub schema: String,
    /// Timestamp written into the output header and footer
    pub generated_at: NaiveDateTime,
    /// Reference date for synthesized role dates
    pub today: NaiveDate,
}

impl ConvertOptions {
    /// Defaults for `input`, stamped with the local clock.
    pub fn new(input: &Path) -> Self {
        let now = Local::now().naive_local();
        ConvertOptions {
            output: default_output_path(input),
            batch_size: DEFAULT_BATCH_SIZE,
            schema: DEFAULT_SCHEMA.to_owned(),
            generated_at: now,
            today: now.date(),
        }
    }

    /// File name used in the usage line of the output header.
    pub fn output_name(&self) -> String {
        self.output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.output.display().to_string())
    }
}
