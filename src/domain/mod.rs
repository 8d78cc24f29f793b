//! Domain types for audionote.
//!
//! This module contains the core data structures:
//! - CalendarEvent: One concrete class session
//! - MatchResult / Confidence: How a transcript was tied to a session
//! - CourseState / CourseLedger: Per-course sequence counters
//! - Assignment: Final course, week and sequence for a note

pub mod calendar;
pub mod course;

// Re-export commonly used types
pub use calendar::CalendarEvent;
pub use course::{Assignment, Confidence, CourseLedger, CourseState, MatchResult};
