//! RRULE parsing and eager expansion.
//!
//! Supports the subset class schedules use: DAILY/WEEKLY/MONTHLY/YEARLY with
//! INTERVAL, COUNT, UNTIL and (weekly) BYDAY. Expansion is bounded by an
//! `ExpansionWindow` so open-ended rules stay finite.

use chrono::{Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, Weekday};

use tracing::warn;

use super::ics::parse_date_value;

/// Upper bound on generated candidates per rule, whatever the window says
const MAX_CANDIDATES: usize = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// A parsed RRULE value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub count: Option<u32>,

    /// Inclusive last start, in local time
    pub until: Option<NaiveDateTime>,

    /// Weekdays for weekly rules (empty = weekday of DTSTART)
    pub by_day: Vec<Weekday>,
}

impl RecurrenceRule {
    /// Parse an RRULE value like `FREQ=WEEKLY;INTERVAL=1;BYDAY=MO,WE;COUNT=16`
    pub fn parse(value: &str, local: FixedOffset) -> Result<Self, String> {
        let mut frequency = None;
        let mut interval = 1u32;
        let mut count = None;
        let mut until = None;
        let mut by_day = Vec::new();

        for part in value.split(';').filter(|p| !p.trim().is_empty()) {
            let (key, val) = part
                .split_once('=')
                .ok_or_else(|| format!("malformed rule part '{}'", part))?;
            let val = val.trim();

            match key.trim().to_ascii_uppercase().as_str() {
                "FREQ" => {
                    frequency = Some(match val.to_ascii_uppercase().as_str() {
                        "DAILY" => Frequency::Daily,
                        "WEEKLY" => Frequency::Weekly,
                        "MONTHLY" => Frequency::Monthly,
                        "YEARLY" => Frequency::Yearly,
                        other => return Err(format!("unsupported FREQ '{}'", other)),
                    });
                }
                "INTERVAL" => {
                    interval = val
                        .parse()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| format!("invalid INTERVAL '{}'", val))?;
                }
                "COUNT" => {
                    count = Some(val.parse().map_err(|_| format!("invalid COUNT '{}'", val))?);
                }
                "UNTIL" => {
                    let parsed = parse_date_value(val, local)
                        .ok_or_else(|| format!("invalid UNTIL '{}'", val))?;
                    // A date-only UNTIL covers that whole day
                    until = Some(if parsed.all_day {
                        parsed.at + Duration::days(1) - Duration::seconds(1)
                    } else {
                        parsed.at
                    });
                }
                "BYDAY" => {
                    for day in val.split(',') {
                        by_day.push(parse_weekday(day)?);
                    }
                }
                // WKST and friends do not change weekly class schedules
                _ => {}
            }
        }

        let frequency = frequency.ok_or_else(|| "missing FREQ".to_string())?;
        by_day.sort_by_key(|d| d.num_days_from_monday());
        by_day.dedup();

        Ok(Self {
            frequency,
            interval,
            count,
            until,
            by_day,
        })
    }

    /// Occurrence starts for an event first starting at `start`.
    ///
    /// COUNT counts from `start` even when early occurrences fall before the
    /// window and are not returned. Without COUNT, candidates start at the
    /// period containing the window start.
    pub fn occurrences(&self, start: NaiveDateTime, window: &ExpansionWindow) -> Vec<NaiveDateTime> {
        let mut out = Vec::new();
        let mut emitted = 0u32;
        let mut scanned = 0usize;
        let mut finished = false;

        let skip_to = if self.count.is_none() {
            window.start
        } else {
            start
        };

        for candidate in self.candidates(start, skip_to).take(MAX_CANDIDATES) {
            scanned += 1;
            if candidate > window.end {
                finished = true;
                break;
            }
            if let Some(until) = self.until {
                if candidate > until {
                    finished = true;
                    break;
                }
            }
            if let Some(count) = self.count {
                if emitted >= count {
                    finished = true;
                    break;
                }
            }
            emitted += 1;
            if candidate >= window.start {
                out.push(candidate);
            }
        }

        if !finished && scanned == MAX_CANDIDATES {
            warn!(
                %start,
                window_end = %window.end,
                returned = out.len(),
                "Recurrence expansion stopped at {} candidates before the window end",
                MAX_CANDIDATES
            );
        }

        out
    }

    /// Whole periods between the first occurrence and `target`
    fn periods_before(&self, start: NaiveDateTime, target: NaiveDateTime) -> i64 {
        let first = start.date();
        let to = target.date();
        let interval = self.interval as i64;

        let elapsed = match self.frequency {
            Frequency::Daily => (to - first).num_days(),
            Frequency::Weekly => (to - first).num_days() / 7,
            Frequency::Monthly => {
                (to.year() as i64 - first.year() as i64) * 12 + to.month() as i64
                    - first.month() as i64
            }
            Frequency::Yearly => to.year() as i64 - first.year() as i64,
        };

        // One period early so nothing on the boundary is skipped
        (elapsed / interval - 1).max(0)
    }

    /// Ascending candidate starts (never before `start`), beginning at the
    /// period that contains `skip_to`; ends where dates run out of range
    fn candidates(
        &self,
        start: NaiveDateTime,
        skip_to: NaiveDateTime,
    ) -> Box<dyn Iterator<Item = NaiveDateTime> + '_> {
        let interval = self.interval as i64;
        let time = start.time();
        let first = start.date();
        let k0 = self.periods_before(start, skip_to);

        match self.frequency {
            Frequency::Daily => Box::new((k0..).map_while(move |k: i64| {
                let offset = Duration::try_days(k.checked_mul(interval)?)?;
                start.checked_add_signed(offset)
            })),
            Frequency::Weekly => {
                let days: Vec<Weekday> = if self.by_day.is_empty() {
                    vec![first.weekday()]
                } else {
                    self.by_day.clone()
                };
                let week_start = first
                    .checked_sub_signed(Duration::days(first.weekday().num_days_from_monday() as i64))
                    .unwrap_or(first);
                Box::new(
                    (k0..)
                        .map_while(move |k: i64| {
                            let offset = Duration::try_weeks(k.checked_mul(interval)?)?;
                            week_start.checked_add_signed(offset)
                        })
                        .flat_map(move |monday| {
                            days.clone().into_iter().filter_map(move |d| {
                                monday
                                    .checked_add_signed(Duration::days(d.num_days_from_monday() as i64))
                                    .map(|day| day.and_time(time))
                            })
                        })
                        .filter(move |c| *c >= start),
                )
            }
            Frequency::Monthly | Frequency::Yearly => {
                let step = match self.frequency {
                    Frequency::Yearly => self.interval.saturating_mul(12),
                    _ => self.interval,
                } as i64;
                Box::new(
                    (k0..)
                        .map_while(move |k: i64| {
                            let months = u32::try_from(k.checked_mul(step)?).ok()?;
                            let shifted = first.checked_add_months(Months::new(months))?;
                            // Months without this day of the month are skipped
                            Some((shifted.day() == first.day()).then(|| shifted.and_time(time)))
                        })
                        .flatten(),
                )
            }
        }
    }
}

fn parse_weekday(token: &str) -> Result<Weekday, String> {
    // Ordinal prefixes (e.g. "1MO") only matter for monthly rules
    let code: String = token
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect();
    match code.to_ascii_uppercase().as_str() {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        _ => Err(format!("invalid BYDAY '{}'", token)),
    }
}

/// Time span recurring events are expanded into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ExpansionWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// One week before the semester start through 200 days after that
    pub fn for_semester(semester_start: NaiveDate) -> Self {
        let start = semester_start
            .checked_sub_signed(Duration::days(7))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or(NaiveDateTime::MIN);
        Self {
            start,
            end: start
                .checked_add_signed(Duration::days(200))
                .unwrap_or(NaiveDateTime::MAX),
        }
    }
}
