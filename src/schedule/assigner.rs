//! Week and sequence assignment for matched transcripts.
//!
//! Week numbers count from the semester start (week 1 is its first seven
//! days). Sequence numbers continue from the last note already in the vault
//! for that course.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;

use crate::domain::{Assignment, CalendarEvent, CourseLedger, CourseState, MatchResult};

use super::error::NoMatchError;

/// 1-based semester week of `date`; dates before the semester start are week 1
pub fn week_number(date: NaiveDate, semester_start: NaiveDate) -> u32 {
    let days = (date - semester_start).num_days();
    let week = days.div_euclid(7) + 1;
    week.max(1) as u32
}

/// Assign week and next sequence number, advancing the course's ledger entry
pub fn assign(
    result: &MatchResult,
    ledger: &mut CourseLedger,
    semester_start: NaiveDate,
) -> Result<Assignment, NoMatchError> {
    let event = matched_event(result)?;
    let sequence_number = ledger.entry(&result.course_name).advance();

    Ok(Assignment {
        course_name: result.course_name.clone(),
        week_number: week_number(event.date(), semester_start),
        sequence_number,
    })
}

fn matched_event(result: &MatchResult) -> Result<&CalendarEvent, NoMatchError> {
    match (&result.matched_event, result.is_match()) {
        (Some(event), true) => Ok(event),
        _ => Err(NoMatchError {
            detail: format!("confidence {}", result.confidence),
        }),
    }
}

/// Course counters safe to share between concurrent workers.
///
/// Each course has its own lock, so increments for one course are serialised
/// while other courses proceed independently.
#[derive(Debug, Default)]
pub struct SharedLedger {
    courses: Mutex<HashMap<String, Arc<Mutex<CourseState>>>>,
}

impl SharedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a ledger built for sequential use
    pub fn from_ledger(ledger: &CourseLedger) -> Self {
        let shared = Self::new();
        for state in ledger.states() {
            shared.seed(state.clone());
        }
        shared
    }

    pub fn seed(&self, state: CourseState) {
        let mut courses = self.courses.lock().unwrap_or_else(PoisonError::into_inner);
        courses.insert(state.course_name.clone(), Arc::new(Mutex::new(state)));
    }

    /// Lock handle for one course, created at zero when absent
    pub fn course(&self, course_name: &str) -> Arc<Mutex<CourseState>> {
        let mut courses = self.courses.lock().unwrap_or_else(PoisonError::into_inner);
        courses
            .entry(course_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(CourseState::new(course_name, 0))))
            .clone()
    }

    /// Same contract as [`assign`], holding only the matched course's lock
    pub fn assign(
        &self,
        result: &MatchResult,
        semester_start: NaiveDate,
    ) -> Result<Assignment, NoMatchError> {
        let event = matched_event(result)?;
        let course = self.course(&result.course_name);
        let sequence_number = course
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .advance();

        Ok(Assignment {
            course_name: result.course_name.clone(),
            week_number: week_number(event.date(), semester_start),
            sequence_number,
        })
    }

    /// Snapshot of all course states
    pub fn snapshot(&self) -> CourseLedger {
        let courses = self.courses.lock().unwrap_or_else(PoisonError::into_inner);
        courses
            .values()
            .map(|c| c.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn matched(course: &str, day: NaiveDate) -> MatchResult {
        let begin = day.and_hms_opt(9, 0, 0).unwrap();
        MatchResult::exact(CalendarEvent::new(course, begin, begin).unwrap())
    }

    #[test]
    fn test_week_number_boundaries() {
        let start = date(2025, 9, 15);
        assert_eq!(week_number(start, start), 1);
        assert_eq!(week_number(date(2025, 9, 21), start), 1);
        assert_eq!(week_number(date(2025, 9, 22), start), 2);
        assert_eq!(week_number(date(2025, 9, 29), start), 3);
    }

    #[test]
    fn test_week_number_clamps_before_semester() {
        let start = date(2025, 9, 15);
        assert_eq!(week_number(date(2025, 9, 14), start), 1);
        assert_eq!(week_number(date(2025, 8, 1), start), 1);
    }

    #[test]
    fn test_assign_continues_from_seeded_state() {
        let mut ledger: CourseLedger = vec![CourseState::new("Anatomy", 6)].into_iter().collect();
        let assignment = assign(&matched("Anatomy", date(2025, 9, 22)), &mut ledger, date(2025, 9, 15)).unwrap();
        assert_eq!(assignment.sequence_number, 7);
        assert_eq!(assignment.week_number, 2);
        assert_eq!(ledger.get("Anatomy").unwrap().last_sequence_number, 7);
    }

    #[test]
    fn test_unmatched_leaves_ledger_untouched() {
        let mut ledger = CourseLedger::new();
        let err = assign(&MatchResult::none(), &mut ledger, date(2025, 9, 15)).unwrap_err();
        assert!(err.to_string().contains("No course event"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_shared_ledger_is_gap_free_across_threads() {
        let shared = Arc::new(SharedLedger::new());
        shared.seed(CourseState::new("Anatomy", 10));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    let course = if i % 2 == 0 { "Anatomy" } else { "Physiology" };
                    (0..25)
                        .map(|_| {
                            shared
                                .assign(&matched(course, date(2025, 9, 29)), date(2025, 9, 15))
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut anatomy: Vec<u32> = Vec::new();
        let mut physiology: Vec<u32> = Vec::new();
        for handle in handles {
            for a in handle.join().unwrap() {
                match a.course_name.as_str() {
                    "Anatomy" => anatomy.push(a.sequence_number),
                    _ => physiology.push(a.sequence_number),
                }
            }
        }
        anatomy.sort_unstable();
        physiology.sort_unstable();

        assert_eq!(anatomy, (11..=110).collect::<Vec<_>>());
        assert_eq!(physiology, (1..=100).collect::<Vec<_>>());

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.get("Anatomy").unwrap().last_sequence_number, 110);
    }
}
