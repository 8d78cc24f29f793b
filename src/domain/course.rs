//! Match results, per-course counters and the final assignment.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::calendar::CalendarEvent;

/// How a transcript was tied to a calendar event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// The anchor fell inside the event's interval
    Exact,

    /// The anchor was close to one of the event's boundaries
    Nearest,

    /// Nothing was close enough
    None,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Confidence::Exact => "exact",
            Confidence::Nearest => "nearest",
            Confidence::None => "none",
        };
        f.write_str(label)
    }
}

/// Outcome of matching one anchor timestamp against the calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Course name of the matched event (empty when unmatched)
    pub course_name: String,

    /// The event that was matched
    pub matched_event: Option<CalendarEvent>,

    pub confidence: Confidence,
}

impl MatchResult {
    pub fn exact(event: CalendarEvent) -> Self {
        Self {
            course_name: event.course_name.clone(),
            matched_event: Some(event),
            confidence: Confidence::Exact,
        }
    }

    pub fn nearest(event: CalendarEvent) -> Self {
        Self {
            course_name: event.course_name.clone(),
            matched_event: Some(event),
            confidence: Confidence::Nearest,
        }
    }

    pub fn none() -> Self {
        Self {
            course_name: String::new(),
            matched_event: None,
            confidence: Confidence::None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.confidence != Confidence::None
    }
}

/// Last sequence number handed out for a course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseState {
    pub course_name: String,
    pub last_sequence_number: u32,
}

impl CourseState {
    pub fn new(course_name: impl Into<String>, last_sequence_number: u32) -> Self {
        Self {
            course_name: course_name.into(),
            last_sequence_number,
        }
    }

    /// Advance the counter and return the new sequence number
    pub fn advance(&mut self) -> u32 {
        self.last_sequence_number += 1;
        self.last_sequence_number
    }
}

/// Per-course counters for one run.
///
/// Seeded from the vault by the caller; the assigner only ever advances it.
#[derive(Debug, Clone, Default)]
pub struct CourseLedger {
    states: HashMap<String, CourseState>,
}

impl CourseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a known starting point for a course, replacing any previous one
    pub fn seed(&mut self, state: CourseState) {
        self.states.insert(state.course_name.clone(), state);
    }

    pub fn contains(&self, course_name: &str) -> bool {
        self.states.contains_key(course_name)
    }

    pub fn get(&self, course_name: &str) -> Option<&CourseState> {
        self.states.get(course_name)
    }

    /// Entry for a course, created at zero when absent
    pub fn entry(&mut self, course_name: &str) -> &mut CourseState {
        self.states
            .entry(course_name.to_string())
            .or_insert_with(|| CourseState::new(course_name, 0))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// States sorted by course name
    pub fn states(&self) -> Vec<&CourseState> {
        let mut states: Vec<_> = self.states.values().collect();
        states.sort_by(|a, b| a.course_name.cmp(&b.course_name));
        states
    }
}

impl FromIterator<CourseState> for CourseLedger {
    fn from_iter<I: IntoIterator<Item = CourseState>>(iter: I) -> Self {
        let mut ledger = Self::new();
        for state in iter {
            ledger.seed(state);
        }
        ledger
    }
}

/// Where a transcript's note goes: course, week and per-course sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub course_name: String,

    /// 1-based week of the semester
    pub week_number: u32,

    /// 1-based position among the course's notes
    pub sequence_number: u32,
}

impl Assignment {
    /// `{seq:03}-W{week:02}` prefix shared by note and transcript filenames
    pub fn file_prefix(&self) -> String {
        format!("{:03}-W{:02}", self.sequence_number, self.week_number)
    }
}
