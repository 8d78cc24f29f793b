//! Calendar events as seen by the course matcher.
//!
//! One `CalendarEvent` is one concrete class session: recurring events have
//! already been expanded by the time they land here.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single scheduled class session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Course name (the event's SUMMARY)
    pub course_name: String,

    /// Session start, local wall-clock time
    pub begin: NaiveDateTime,

    /// Session end, local wall-clock time (never before `begin`)
    pub end: NaiveDateTime,
}

impl CalendarEvent {
    /// Create an event, returning `None` when `end` precedes `begin`
    pub fn new(course_name: impl Into<String>, begin: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        if end < begin {
            return None;
        }
        Some(Self {
            course_name: course_name.into(),
            begin,
            end,
        })
    }

    /// Whether `at` falls inside `[begin, end]` (both ends inclusive)
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.begin <= at && at <= self.end
    }

    /// Distance from `at` to the closer of the two boundaries.
    ///
    /// The flag is `true` when that closer boundary is the start. On a tie
    /// (zero-length events, or `at` exactly midway) the start wins.
    pub fn nearest_boundary(&self, at: NaiveDateTime) -> (Duration, bool) {
        let to_begin = (at - self.begin).abs();
        let to_end = (at - self.end).abs();
        if to_begin <= to_end {
            (to_begin, true)
        } else {
            (to_end, false)
        }
    }

    /// Calendar date of the session start
    pub fn date(&self) -> NaiveDate {
        self.begin.date()
    }

    pub fn duration(&self) -> Duration {
        self.end - self.begin
    }
}
