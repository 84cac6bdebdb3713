//! # Rusty Roster
//!
//! Converts a community membership spreadsheet (`.xlsx`) into a PostgreSQL
//! script that loads persons, their geographic hierarchy and their program
//! roles into a normalized schema.
//!
//! ## Pipeline
//!
//! - **Spreadsheet Decoder** ([`spreadsheet`]): unpacks the container and
//!   decodes the first worksheet into position-preserving rows of text
//! - **Column Classifier** ([`classifier`]): finds the program columns from the
//!   header and subheader rows
//! - **Row Transformer** ([`transform`]): turns each data row into a person,
//!   a location chain and program roles
//! - **Location Resolver** ([`location`]): deduplicates locations and orders
//!   them parents first
//! - **Statement Emitter** ([`emitter`]): writes one transaction of batched,
//!   idempotent upserts followed by run statistics
//!
//! ## Output
//!
//! Every statement is an upsert keyed by the entity's natural identity, so the
//! script can be applied repeatedly. Persons without an external id are plain
//! inserts tagged with their source row, and their roles are linked through
//! that tag.
//!
//! ## Example
//!
//! ```no_run
//! use rusty_roster::{convert, ConvertOptions, StandardLogger};
//! use std::path::Path;
//!
//! let input = Path::new("members.xlsx");
//! let options = ConvertOptions::new(input);
//! let stats = convert(input, &options, &StandardLogger)?;
//! println!("{} persons written to {}", stats.persons_created, options.output.display());
//! # Ok::<(), rusty_roster::RosterError>(())
//! ```
pub mod classifier;
pub mod config;
pub mod converter;
pub mod emitter;
pub mod error;
pub(crate) mod helpers;
pub mod location;
pub mod logger;
pub mod model;
pub mod normalize;
pub mod spreadsheet;
pub mod transform;

pub use config::Args;
pub use config::ConvertOptions;
pub use converter::convert;
pub use error::RosterError;
pub use logger::Logger;
pub use logger::StandardLogger;
pub use model::Statistics;
