//! Course matching and week numbering against a parsed calendar.

use audionote::schedule::{
    assign, extract, match_course, week_number, CalendarIndex, CalendarOptions, CourseMatcher,
};
use audionote::{CalendarEvent, Confidence, CourseLedger};
use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime};

fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

fn semester_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 15).unwrap()
}

fn event(course: &str, begin: &str, end: &str) -> CalendarEvent {
    CalendarEvent::new(course, dt(begin), dt(end)).unwrap()
}

fn options() -> CalendarOptions {
    CalendarOptions::new(FixedOffset::east_opt(8 * 3600).unwrap(), semester_start())
}

#[test]
fn anchor_inside_single_event_is_exact() {
    let index = CalendarIndex::from_events([
        event("Anatomy", "2025-09-29 09:00", "2025-09-29 10:30"),
        event("Physiology", "2025-09-29 13:00", "2025-09-29 14:30"),
    ]);

    for minute in ["09:01", "09:45", "10:29"] {
        let anchor = dt(&format!("2025-09-29 {}", minute)).into();
        let result = match_course(anchor, &index);
        assert_eq!(result.confidence, Confidence::Exact);
        assert_eq!(result.course_name, "Anatomy");
    }
}

#[test]
fn overlapping_events_resolve_to_earlier_begin_every_time() {
    // Registered later-begin first to make sure order of the source does not matter
    let events = vec![
        event("Late Lab", "2025-09-29 09:30", "2025-09-29 11:00"),
        event("Early Lecture", "2025-09-29 09:00", "2025-09-29 10:30"),
    ];
    let anchor = dt("2025-09-29 10:00").into();

    for _ in 0..20 {
        let index = CalendarIndex::from_events(events.clone());
        let result = match_course(anchor, &index);
        assert_eq!(result.confidence, Confidence::Exact);
        assert_eq!(result.course_name, "Early Lecture");
    }
}

#[test]
fn anchor_thirty_minutes_after_end_is_nearest() {
    let index = CalendarIndex::from_events([
        event("Anatomy", "2025-09-29 09:00", "2025-09-29 10:30"),
        event("Physiology", "2025-09-29 15:00", "2025-09-29 16:30"),
    ]);

    let result = match_course(dt("2025-09-29 11:00").into(), &index);
    assert_eq!(result.confidence, Confidence::Nearest);
    assert_eq!(result.course_name, "Anatomy");
    assert_eq!(
        result.matched_event.unwrap().begin,
        dt("2025-09-29 09:00")
    );
}

#[test]
fn anchor_ninety_minutes_from_every_boundary_is_none() {
    let index = CalendarIndex::from_events([
        event("Anatomy", "2025-09-29 09:00", "2025-09-29 10:30"),
        event("Physiology", "2025-09-29 15:00", "2025-09-29 16:30"),
    ]);

    let result = match_course(dt("2025-09-29 12:00").into(), &index);
    assert_eq!(result.confidence, Confidence::None);
    assert!(result.matched_event.is_none());
    assert!(!result.is_match());
}

#[test]
fn week_number_two_weeks_in_is_three() {
    let start = semester_start();
    assert_eq!(week_number(start, start), 1);
    assert_eq!(week_number(start + Duration::days(6), start), 1);
    assert_eq!(week_number(start + Duration::days(7), start), 2);
    assert_eq!(week_number(start + Duration::days(14), start), 3);
    assert_eq!(week_number(start - Duration::days(3), start), 1);
}

#[test]
fn scenario_exact_match_in_week_three() {
    let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:anatomy-1\r\n\
SUMMARY:Anatomy\r\n\
DTSTART;TZID=Asia/Shanghai:20250929T090000\r\n\
DTEND;TZID=Asia/Shanghai:20250929T103000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";
    let index = CalendarIndex::parse(ics, options()).unwrap();

    let anchor = extract("20250929-090500.txt").unwrap();
    let result = match_course(anchor, &index);
    assert_eq!(result.confidence, Confidence::Exact);
    assert_eq!(result.course_name, "Anatomy");

    let mut ledger = CourseLedger::new();
    let assignment = assign(&result, &mut ledger, semester_start()).unwrap();
    assert_eq!(assignment.week_number, 3);
    assert_eq!(assignment.sequence_number, 1);
    assert_eq!(assignment.file_prefix(), "001-W03");
}

#[test]
fn scenario_sixty_one_minutes_past_boundary_is_no_match() {
    let index = CalendarIndex::from_events([event(
        "Anatomy",
        "2025-09-29 09:00",
        "2025-09-29 10:30",
    )]);

    let at_limit = match_course(dt("2025-09-29 11:30").into(), &index);
    assert_eq!(at_limit.confidence, Confidence::Nearest);

    let result = match_course(dt("2025-09-29 11:31").into(), &index);
    assert_eq!(result.confidence, Confidence::None);

    let mut ledger = CourseLedger::new();
    let err = assign(&result, &mut ledger, semester_start()).unwrap_err();
    assert!(err.to_string().contains("No course event found"));
    assert!(ledger.is_empty());
}

#[test]
fn utc_calendar_times_are_shifted_to_local() {
    let ics = "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
SUMMARY:Biochemistry\r\n\
DTSTART:20250929T010000Z\r\n\
DTEND:20250929T023000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";
    let index = CalendarIndex::parse(ics, options()).unwrap();
    assert_eq!(index.events()[0].begin, dt("2025-09-29 09:00"));

    let result = match_course(extract("20250929-100000-lecture.txt").unwrap(), &index);
    assert_eq!(result.confidence, Confidence::Exact);
}

#[test]
fn weekly_recurrence_matches_later_weeks() {
    let ics = "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
SUMMARY:Histology\r\n\
DTSTART:20250915T140000\r\n\
DTEND:20250915T153000\r\n\
RRULE:FREQ=WEEKLY;COUNT=16\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";
    let index = CalendarIndex::parse(ics, options()).unwrap();
    assert_eq!(index.len(), 16);

    let result = match_course(extract("20251027-141500").unwrap(), &index);
    assert_eq!(result.course_name, "Histology");

    let mut ledger = CourseLedger::new();
    let assignment = assign(&result, &mut ledger, semester_start()).unwrap();
    assert_eq!(assignment.week_number, 7);
}

#[test]
fn custom_tolerance_is_respected() {
    let index = CalendarIndex::from_events([event(
        "Anatomy",
        "2025-09-29 09:00",
        "2025-09-29 10:30",
    )]);
    let strict = CourseMatcher::new(Duration::minutes(15));

    assert_eq!(
        strict.match_course(dt("2025-09-29 10:45").into(), &index).confidence,
        Confidence::Nearest
    );
    assert_eq!(
        strict.match_course(dt("2025-09-29 10:46").into(), &index).confidence,
        Confidence::None
    );
}

#[test]
fn bad_identifier_is_a_timestamp_error() {
    assert!(extract("lecture.txt").is_err());
    assert!(extract("20251399-090000.txt").is_err());
}
