//! Levelled logging collaborator handed to every pipeline component.
//!
//! Components never reach for a global logger; they receive a `&dyn Logger`.
//! The binary passes [`StandardLogger`], which forwards to the `log` facade,
//! while tests use [`NullLogger`] or [`MemoryLogger`] to stay silent and
//! deterministic.

use log::Level;
use std::cell::RefCell;

/// Sink for info/warning/error/debug messages.
pub trait Logger {
    fn log(&self, level: Level, message: &str);

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }
}

/// Forwards every message to the `log` crate facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardLogger;

impl Logger for StandardLogger {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: "rusty_roster", level, "{}", message);
    }
}

/// Discards every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Keeps messages in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: RefCell<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded message.
    pub fn records(&self) -> Vec<(Level, String)> {
        self.records.borrow().clone()
    }

    /// Returns the messages recorded at `level`.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .filter(|(record_level, _)| *record_level == level)
            .map(|(_, message)| message.to_owned())
            .collect()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, message: &str) {
        self.records.borrow_mut().push((level, message.to_owned()));
    }
}
