//! In-memory calendar index built from an `.ics` file.
//!
//! The index is built once per run and is read-only afterwards. Events are
//! kept sorted by start time; events with the same start keep the order in
//! which they were registered in the source file, which the matcher relies
//! on for tie-breaking.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::domain::CalendarEvent;

use super::error::CalendarParseError;
use super::ics::{parse_date_value, parse_duration, parse_line, unescape_text, unfold, ContentLine};
use super::recurrence::{ExpansionWindow, RecurrenceRule};

/// How calendar times are interpreted and recurrences expanded
#[derive(Debug, Clone, Copy)]
pub struct CalendarOptions {
    /// Offset of the schedule's local time from UTC
    pub utc_offset: FixedOffset,

    /// Span recurring events are expanded into
    pub window: ExpansionWindow,
}

impl CalendarOptions {
    pub fn new(utc_offset: FixedOffset, semester_start: NaiveDate) -> Self {
        Self {
            utc_offset,
            window: ExpansionWindow::for_semester(semester_start),
        }
    }
}

/// A VEVENT as read from the file, before expansion
#[derive(Debug, Default)]
struct RawEvent {
    line: usize,
    uid: Option<String>,
    summary: Option<String>,
    start: Option<(NaiveDateTime, bool)>,
    end: Option<NaiveDateTime>,
    duration: Option<Duration>,
    /// Line and raw text of DURATION, for error reporting
    duration_source: Option<(usize, String)>,
    rule: Option<RecurrenceRule>,
    exdates: Vec<NaiveDateTime>,
    recurrence_id: Option<NaiveDateTime>,
}

impl RawEvent {
    fn apply(&mut self, prop: &ContentLine, local: FixedOffset) -> Result<(), CalendarParseError> {
        let invalid = || CalendarParseError::InvalidValue {
            line: prop.line,
            property: prop.name.clone(),
            value: prop.value.clone(),
        };

        match prop.name.as_str() {
            "UID" => self.uid = Some(prop.value.trim().to_string()),
            "SUMMARY" => self.summary = Some(unescape_text(&prop.value)),
            "DTSTART" => {
                let v = parse_date_value(&prop.value, local).ok_or_else(invalid)?;
                self.start = Some((v.at, v.all_day));
            }
            "DTEND" => {
                self.end = Some(parse_date_value(&prop.value, local).ok_or_else(invalid)?.at);
            }
            "DURATION" => {
                self.duration = Some(parse_duration(&prop.value).ok_or_else(invalid)?);
                self.duration_source = Some((prop.line, prop.value.clone()));
            }
            "RRULE" => {
                let rule = RecurrenceRule::parse(&prop.value, local).map_err(|message| {
                    CalendarParseError::Syntax {
                        line: prop.line,
                        message,
                    }
                })?;
                self.rule = Some(rule);
            }
            "EXDATE" => {
                for value in prop.value.split(',') {
                    self.exdates
                        .push(parse_date_value(value, local).ok_or_else(invalid)?.at);
                }
            }
            "RECURRENCE-ID" => {
                self.recurrence_id = Some(parse_date_value(&prop.value, local).ok_or_else(invalid)?.at);
            }
            _ => {}
        }

        Ok(())
    }

    /// Session length, from DTEND, DURATION, or the all-day default
    fn length(&self, begin: NaiveDateTime, all_day: bool) -> Duration {
        match (self.end, self.duration) {
            (Some(end), _) => end - begin,
            (None, Some(duration)) => duration,
            (None, None) if all_day => Duration::days(1),
            (None, None) => Duration::zero(),
        }
    }
}

/// Read-only, time-sorted collection of class sessions
#[derive(Debug, Clone, Default)]
pub struct CalendarIndex {
    events: Vec<CalendarEvent>,
}

impl CalendarIndex {
    /// Build an index from already-expanded events.
    ///
    /// Events whose end precedes their start are dropped.
    pub fn from_events(events: impl IntoIterator<Item = CalendarEvent>) -> Self {
        let mut events: Vec<CalendarEvent> = events
            .into_iter()
            .filter(|e| {
                let ok = e.begin <= e.end;
                if !ok {
                    warn!(course = %e.course_name, begin = %e.begin, "Dropping event that ends before it begins");
                }
                ok
            })
            .collect();
        // Stable: equal starts keep registration order
        events.sort_by_key(|e| e.begin);
        Self { events }
    }

    /// Load and parse an `.ics` file
    pub fn load(path: &Path, options: CalendarOptions) -> Result<Self, CalendarParseError> {
        let text = std::fs::read_to_string(path).map_err(|source| CalendarParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::parse(&text, options)?;
        debug!(path = %path.display(), events = index.len(), "Calendar loaded");
        Ok(index)
    }

    /// Parse iCalendar text
    pub fn parse(text: &str, options: CalendarOptions) -> Result<Self, CalendarParseError> {
        let raw_events = read_events(text, options.utc_offset)?;
        Ok(Self::from_events(expand(raw_events, &options.window)?))
    }

    /// All sessions, sorted by start
    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Distinct course names, sorted
    pub fn course_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.events.iter().map(|e| e.course_name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Walk components and collect VEVENTs in source order
fn read_events(text: &str, local: FixedOffset) -> Result<Vec<RawEvent>, CalendarParseError> {
    let mut events = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<RawEvent> = None;
    let mut saw_calendar = false;

    for (line_no, text_line) in unfold(text) {
        let prop = parse_line(line_no, &text_line).ok_or_else(|| CalendarParseError::Syntax {
            line: line_no,
            message: format!("expected NAME:VALUE, found '{}'", text_line),
        })?;

        match prop.name.as_str() {
            "BEGIN" => {
                let component = prop.value.trim().to_ascii_uppercase();
                if stack.is_empty() {
                    if component != "VCALENDAR" {
                        return Err(CalendarParseError::NotACalendar);
                    }
                    saw_calendar = true;
                }
                if component == "VEVENT" && stack.last().map(String::as_str) == Some("VCALENDAR") {
                    current = Some(RawEvent {
                        line: line_no,
                        ..RawEvent::default()
                    });
                }
                stack.push(component);
            }
            "END" => {
                let component = prop.value.trim().to_ascii_uppercase();
                match stack.pop() {
                    Some(open) if open == component => {}
                    Some(open) => {
                        return Err(CalendarParseError::Syntax {
                            line: line_no,
                            message: format!("END:{} closes BEGIN:{}", component, open),
                        })
                    }
                    None => {
                        return Err(CalendarParseError::Syntax {
                            line: line_no,
                            message: format!("END:{} without BEGIN", component),
                        })
                    }
                }
                if component == "VEVENT" && stack.last().map(String::as_str) == Some("VCALENDAR") {
                    if let Some(event) = current.take() {
                        if event.start.is_none() {
                            return Err(CalendarParseError::MissingStart { line: event.line });
                        }
                        events.push(event);
                    }
                }
            }
            _ => {
                // Properties of nested components (VALARM) do not belong to the event
                if stack.last().map(String::as_str) == Some("VEVENT") {
                    if let Some(event) = current.as_mut() {
                        event.apply(&prop, local)?;
                    }
                }
            }
        }
    }

    if !saw_calendar {
        return Err(CalendarParseError::NotACalendar);
    }
    if let Some(open) = stack.last() {
        return Err(CalendarParseError::Syntax {
            line: text.lines().count(),
            message: format!("BEGIN:{} is never closed", open),
        });
    }

    Ok(events)
}

/// Turn raw events into concrete sessions, in registration order
fn expand(
    raw_events: Vec<RawEvent>,
    window: &ExpansionWindow,
) -> Result<Vec<CalendarEvent>, CalendarParseError> {
    // RECURRENCE-ID overrides replace one occurrence of their master
    let mut overridden: HashMap<String, HashSet<NaiveDateTime>> = HashMap::new();
    for event in &raw_events {
        if let (Some(uid), Some(at)) = (&event.uid, event.recurrence_id) {
            overridden.entry(uid.clone()).or_default().insert(at);
        }
    }

    let mut sessions = Vec::new();

    for event in raw_events {
        let name = match event.summary.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                warn!(line = event.line, "Dropping event without SUMMARY");
                continue;
            }
        };
        let Some((begin, all_day)) = event.start else {
            continue;
        };
        let length = event.length(begin, all_day);
        if length < Duration::zero() {
            warn!(course = %name, begin = %begin, line = event.line, "Dropping event that ends before it begins");
            continue;
        }

        let starts = match (&event.rule, event.recurrence_id) {
            (Some(rule), None) => {
                let skip = event
                    .uid
                    .as_ref()
                    .and_then(|uid| overridden.get(uid));
                rule.occurrences(begin, window)
                    .into_iter()
                    .filter(|s| !event.exdates.contains(s))
                    .filter(|s| skip.map_or(true, |set| !set.contains(s)))
                    .collect()
            }
            _ => vec![begin],
        };

        for start in starts {
            let end = start.checked_add_signed(length).ok_or_else(|| {
                let (line, value) = event
                    .duration_source
                    .clone()
                    .unwrap_or_else(|| (event.line, length.to_string()));
                CalendarParseError::InvalidValue {
                    line,
                    property: "DURATION".to_string(),
                    value,
                }
            })?;
            sessions.push(CalendarEvent {
                course_name: name.clone(),
                begin: start,
                end,
            });
        }
    }

    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CalendarOptions {
        CalendarOptions::new(
            FixedOffset::east_opt(8 * 3600).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 15).unwrap(),
        )
    }

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn calendar(body: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n{}END:VCALENDAR\r\n", body)
    }

    #[test]
    fn test_parse_single_event() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY: Anatomy \r\nDTSTART:20250929T090000\r\nDTEND:20250929T103000\r\nEND:VEVENT\r\n",
        );
        let index = CalendarIndex::parse(&text, options()).unwrap();
        assert_eq!(index.len(), 1);
        let event = &index.events()[0];
        assert_eq!(event.course_name, "Anatomy");
        assert_eq!(event.begin, dt(2025, 9, 29, 9, 0));
        assert_eq!(event.end, dt(2025, 9, 29, 10, 30));
    }

    #[test]
    fn test_events_sorted_with_stable_ties() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Late\r\nDTSTART:20250929T140000\r\nDTEND:20250929T150000\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nSUMMARY:First\r\nDTSTART:20250929T090000\r\nDTEND:20250929T100000\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nSUMMARY:Second\r\nDTSTART:20250929T090000\r\nDTEND:20250929T110000\r\nEND:VEVENT\r\n",
        );
        let index = CalendarIndex::parse(&text, options()).unwrap();
        let names: Vec<_> = index.events().iter().map(|e| e.course_name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Late"]);
    }

    #[test]
    fn test_inverted_event_is_dropped_not_fatal() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Broken\r\nDTSTART:20250929T110000\r\nDTEND:20250929T090000\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nSUMMARY:Fine\r\nDTSTART:20250929T090000\r\nDTEND:20250929T100000\r\nEND:VEVENT\r\n",
        );
        let index = CalendarIndex::parse(&text, options()).unwrap();
        assert_eq!(index.course_names(), vec!["Fine"]);
    }

    #[test]
    fn test_duration_and_all_day() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Seminar\r\nDTSTART:20250929T090000\r\nDURATION:PT45M\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nSUMMARY:Exam Day\r\nDTSTART;VALUE=DATE:20250930\r\nEND:VEVENT\r\n",
        );
        let index = CalendarIndex::parse(&text, options()).unwrap();
        assert_eq!(index.events()[0].end, dt(2025, 9, 29, 9, 45));
        assert_eq!(index.events()[1].end, dt(2025, 10, 1, 0, 0));
    }

    #[test]
    fn test_out_of_range_duration_is_an_error() {
        let huge = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Seminar\r\nDTSTART:20250929T090000\r\nDURATION:P99999999D\r\nEND:VEVENT\r\n",
        );
        assert!(matches!(
            CalendarIndex::parse(&huge, options()),
            Err(CalendarParseError::InvalidValue { line: 6, ref property, .. }) if property == "DURATION"
        ));

        let overflow = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Seminar\r\nDTSTART:20250929T090000\r\nDURATION:P99999999999999W\r\nEND:VEVENT\r\n",
        );
        assert!(matches!(
            CalendarIndex::parse(&overflow, options()),
            Err(CalendarParseError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_recurrence_with_exdate_and_override() {
        let text = calendar(
            "BEGIN:VEVENT\r\nUID:phys-1\r\nSUMMARY:Physiology\r\nDTSTART:20250915T090000\r\nDTEND:20250915T103000\r\n\
             RRULE:FREQ=WEEKLY;COUNT=4\r\nEXDATE:20250922T090000\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:phys-1\r\nRECURRENCE-ID:20250929T090000\r\nSUMMARY:Physiology\r\n\
             DTSTART:20250929T130000\r\nDTEND:20250929T143000\r\nEND:VEVENT\r\n",
        );
        let index = CalendarIndex::parse(&text, options()).unwrap();
        let begins: Vec<_> = index.events().iter().map(|e| e.begin).collect();
        assert_eq!(
            begins,
            vec![dt(2025, 9, 15, 9, 0), dt(2025, 9, 29, 13, 0), dt(2025, 10, 6, 9, 0)]
        );
    }

    #[test]
    fn test_alarm_properties_are_ignored() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Pathology\r\nDTSTART:20250929T090000\r\nDTEND:20250929T100000\r\n\
             BEGIN:VALARM\r\nTRIGGER:-PT15M\r\nDESCRIPTION:Reminder\r\nSUMMARY:Alarm\r\nEND:VALARM\r\nEND:VEVENT\r\n",
        );
        let index = CalendarIndex::parse(&text, options()).unwrap();
        assert_eq!(index.events()[0].course_name, "Pathology");
    }

    #[test]
    fn test_event_without_summary_is_dropped() {
        let text = calendar("BEGIN:VEVENT\r\nDTSTART:20250929T090000\r\nEND:VEVENT\r\n");
        assert!(CalendarIndex::parse(&text, options()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_sources_fail() {
        assert!(matches!(
            CalendarIndex::parse("hello world", options()),
            Err(CalendarParseError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            CalendarIndex::parse("BEGIN:VEVENT\r\nEND:VEVENT\r\n", options()),
            Err(CalendarParseError::NotACalendar)
        ));
        assert!(matches!(
            CalendarIndex::parse("", options()),
            Err(CalendarParseError::NotACalendar)
        ));
        assert!(matches!(
            CalendarIndex::parse("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\n", options()),
            Err(CalendarParseError::Syntax { .. })
        ));
        assert!(matches!(
            CalendarIndex::parse(&calendar("BEGIN:VEVENT\r\nSUMMARY:X\r\nEND:VEVENT\r\n"), options()),
            Err(CalendarParseError::MissingStart { line: 3 })
        ));
        assert!(matches!(
            CalendarIndex::parse(
                &calendar("BEGIN:VEVENT\r\nSUMMARY:X\r\nDTSTART:tomorrow\r\nEND:VEVENT\r\n"),
                options()
            ),
            Err(CalendarParseError::InvalidValue { line: 5, .. })
        ));
    }

    #[test]
    fn test_missing_file_fails() {
        let err = CalendarIndex::load(Path::new("/nonexistent/schedule.ics"), options()).unwrap_err();
        assert!(matches!(err, CalendarParseError::Read { .. }));
    }
}
