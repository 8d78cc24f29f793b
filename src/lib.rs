//! audionote - Lecture transcripts to course notes
//!
//! Matches each transcript (named after its recording time) to a class
//! session in an iCalendar schedule, numbers it by semester week and
//! per-course sequence, and files an LLM-generated note into a Markdown
//! vault.
//!
//! # Modules
//!
//! - `schedule`: Calendar parsing, course matching, week/sequence assignment
//! - `domain`: Data structures (CalendarEvent, MatchResult, Assignment)
//! - `vault`: Note and transcript placement in the vault
//! - `adapters`: Note generators (OpenAI-compatible LLM)
//! - `core`: Batch processor, vault lock, retry policy
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process everything in the transcript directory
//! audionote process
//!
//! # See where a transcript would go
//! audionote match 20250929-090500.txt
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod schedule;
pub mod vault;

// Re-export main types at crate root for convenience
pub use core::{Processor, RunOptions, RunSummary};
pub use domain::{Assignment, CalendarEvent, Confidence, CourseLedger, CourseState, MatchResult};
pub use schedule::{
    assign, extract, match_course, AnchorTimestamp, CalendarIndex, CourseMatcher, ScheduleError,
    SharedLedger,
};
pub use vault::Vault;
