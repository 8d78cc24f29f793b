//! Course matching: tie a transcript's anchor timestamp to one class session.
//!
//! Two tiers:
//! 1. Interval containment. Overlapping sessions resolve to the earliest
//!    start, then to source registration order.
//! 2. Nearest boundary (start or end) within a tolerance, inclusive. Equal
//!    distances prefer a start boundary, then the earliest start.
//!
//! Anything further away than the tolerance is reported as unmatched.

use chrono::Duration;

use crate::domain::MatchResult;

use super::calendar::CalendarIndex;
use super::timestamp::AnchorTimestamp;

/// Default distance allowed between an anchor and a session boundary
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 60;

/// Matcher with a configurable nearest-boundary tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseMatcher {
    tolerance: Duration,
}

impl Default for CourseMatcher {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_TOLERANCE_MINUTES))
    }
}

impl CourseMatcher {
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Resolve the session an anchor belongs to
    pub fn match_course(&self, anchor: AnchorTimestamp, index: &CalendarIndex) -> MatchResult {
        let at = anchor.datetime();
        let events = index.events();

        // Index order is (begin, registration order), so the first
        // containing event is the tie-break winner
        if let Some(event) = events.iter().find(|e| e.contains(at)) {
            return MatchResult::exact(event.clone());
        }

        // Key: distance, start-boundary first, then index position
        let nearest = events
            .iter()
            .enumerate()
            .map(|(pos, e)| {
                let (distance, is_start) = e.nearest_boundary(at);
                ((distance, !is_start, pos), e)
            })
            .min_by_key(|(key, _)| *key);

        match nearest {
            Some(((distance, _, _), event)) if distance <= self.tolerance => {
                MatchResult::nearest(event.clone())
            }
            _ => MatchResult::none(),
        }
    }
}

/// Match with the default one-hour tolerance
pub fn match_course(anchor: AnchorTimestamp, index: &CalendarIndex) -> MatchResult {
    CourseMatcher::default().match_course(anchor, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CalendarEvent, Confidence};
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, 29)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn event(name: &str, begin: NaiveDateTime, end: NaiveDateTime) -> CalendarEvent {
        CalendarEvent::new(name, begin, end).unwrap()
    }

    #[test]
    fn test_empty_index_is_unmatched() {
        let result = match_course(dt(9, 0).into(), &CalendarIndex::default());
        assert_eq!(result, MatchResult::none());
    }

    #[test]
    fn test_start_boundary_wins_distance_tie() {
        // 11:00 is 30 minutes after A ends and 30 minutes before B starts
        let index = CalendarIndex::from_events(vec![
            event("A", dt(9, 0), dt(10, 30)),
            event("B", dt(11, 30), dt(12, 30)),
        ]);
        let result = match_course(dt(11, 0).into(), &index);
        assert_eq!(result.confidence, Confidence::Nearest);
        assert_eq!(result.course_name, "B");
    }

    #[test]
    fn test_equal_start_boundaries_prefer_registration_order() {
        let index = CalendarIndex::from_events(vec![
            event("Second", dt(10, 0), dt(10, 30)),
            event("First", dt(10, 0), dt(11, 0)),
        ]);
        let result = match_course(dt(9, 30).into(), &index);
        assert_eq!(result.course_name, "Second");
    }

    #[test]
    fn test_tolerance_is_inclusive_and_configurable() {
        let index = CalendarIndex::from_events(vec![event("A", dt(9, 0), dt(10, 0))]);

        assert!(match_course(dt(11, 0).into(), &index).is_match());
        assert!(!match_course(dt(11, 1).into(), &index).is_match());

        let strict = CourseMatcher::new(Duration::minutes(15));
        assert!(!strict.match_course(dt(10, 30).into(), &index).is_match());
    }

    #[test]
    fn test_zero_length_event_contains_its_instant() {
        let index = CalendarIndex::from_events(vec![event("Quiz", dt(9, 0), dt(9, 0))]);
        let result = match_course(dt(9, 0).into(), &index);
        assert_eq!(result.confidence, Confidence::Exact);
    }
}
