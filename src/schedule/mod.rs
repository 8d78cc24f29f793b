//! Scheduling core: from a transcript name to a course, week and sequence.
//!
//! ```text
//! identifier ──► timestamp::extract ──► AnchorTimestamp
//!                                            │
//! schedule.ics ──► CalendarIndex ──► matcher::match_course ──► MatchResult
//!                                                                 │
//!                              CourseLedger ──► assigner::assign ──► Assignment
//! ```
//!
//! Everything here is synchronous and does no I/O apart from
//! `CalendarIndex::load` reading the calendar file once per run.

pub mod assigner;
pub mod calendar;
pub mod error;
pub mod ics;
pub mod matcher;
pub mod recurrence;
pub mod timestamp;

pub use assigner::{assign, week_number, SharedLedger};
pub use calendar::{CalendarIndex, CalendarOptions};
pub use error::{CalendarParseError, NoMatchError, ScheduleError, TimestampFormatError};
pub use matcher::{match_course, CourseMatcher, DEFAULT_TOLERANCE_MINUTES};
pub use recurrence::{ExpansionWindow, Frequency, RecurrenceRule};
pub use timestamp::{extract, AnchorTimestamp};
