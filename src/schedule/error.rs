//! Error kinds for the scheduling core.

use std::path::PathBuf;

use thiserror::Error;

/// The calendar source could not be loaded
#[derive(Debug, Error)]
pub enum CalendarParseError {
    #[error("Calendar file not readable: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not an iCalendar document (missing BEGIN:VCALENDAR)")]
    NotACalendar,

    #[error("Line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Line {line}: invalid {property} value '{value}'")]
    InvalidValue {
        line: usize,
        property: String,
        value: String,
    },

    #[error("Event starting at line {line} has no DTSTART")]
    MissingStart { line: usize },
}

/// A transcript identifier without a valid `YYYYMMDD-HHMMSS` prefix
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Identifier '{identifier}' does not start with YYYYMMDD-HHMMSS: {reason}")]
pub struct TimestampFormatError {
    pub identifier: String,
    pub reason: String,
}

/// No calendar event lies within the matching tolerance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No course event found within the matching tolerance ({detail})")]
pub struct NoMatchError {
    pub detail: String,
}

/// Any failure of the scheduling core
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Calendar(#[from] CalendarParseError),

    #[error(transparent)]
    Timestamp(#[from] TimestampFormatError),

    #[error(transparent)]
    NoMatch(#[from] NoMatchError),
}
