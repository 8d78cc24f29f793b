//! Low-level iCalendar (RFC 5545) reading: content lines and value types.
//!
//! Only what the calendar index needs is understood here. Components are
//! walked by `calendar`; this module turns raw text into properties and
//! properties into chrono values.

use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};

/// One unfolded `NAME;PARAM=V:VALUE` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    /// Property name, upper-cased
    pub name: String,

    /// Parameters as (upper-cased name, raw value) pairs
    pub params: Vec<(String, String)>,

    pub value: String,

    /// 1-based physical line where the property starts
    pub line: usize,
}

impl ContentLine {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Split a document into unfolded logical lines, keeping start line numbers.
///
/// A physical line starting with a space or tab continues the previous one.
pub fn unfold(text: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some((_, last)) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        if raw.trim().is_empty() {
            continue;
        }
        lines.push((idx + 1, raw.to_string()));
    }

    lines
}

/// Parse one logical line. Returns `None` when there is no `:` separator.
pub fn parse_line(line: usize, text: &str) -> Option<ContentLine> {
    // The name/params part ends at the first ':' outside double quotes
    let mut in_quotes = false;
    let mut split_at = None;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                split_at = Some(i);
                break;
            }
            _ => {}
        }
    }
    let split_at = split_at?;
    let (head, value) = (&text[..split_at], &text[split_at + 1..]);

    let mut parts = head.split(';');
    let name = parts.next()?.trim().to_ascii_uppercase();
    if name.is_empty() {
        return None;
    }

    let params = parts
        .filter_map(|p| {
            let (k, v) = p.split_once('=')?;
            Some((k.trim().to_ascii_uppercase(), v.trim_matches('"').to_string()))
        })
        .collect();

    Some(ContentLine {
        name,
        params,
        value: value.to_string(),
        line,
    })
}

/// Undo TEXT escaping (`\,` `\;` `\n` `\\`)
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// A DATE or DATE-TIME value resolved to local wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateValue {
    pub at: NaiveDateTime,

    /// True for `VALUE=DATE` (all-day) values
    pub all_day: bool,
}

/// Parse a DATE or DATE-TIME value.
///
/// UTC values (trailing `Z`) are shifted into `local`; floating and
/// `TZID=`-qualified values are taken as local wall-clock time.
pub fn parse_date_value(value: &str, local: FixedOffset) -> Option<DateValue> {
    let value = value.trim();

    if value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        return Some(DateValue {
            at: date.and_hms_opt(0, 0, 0)?,
            all_day: true,
        });
    }

    if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
        return Some(DateValue {
            at: local.from_utc_datetime(&naive).naive_local(),
            all_day: false,
        });
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    Some(DateValue {
        at: naive,
        all_day: false,
    })
}

/// Parse a DURATION value such as `PT1H30M`, `P1D` or `-PT15M`
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (negative, rest) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };
    let rest = rest.strip_prefix('P')?;

    let mut total = Duration::zero();
    let mut in_time = false;
    let mut number = String::new();
    let mut seen_unit = false;

    for c in rest.chars() {
        match c {
            'T' => {
                if in_time || !number.is_empty() {
                    return None;
                }
                in_time = true;
            }
            '0'..='9' => number.push(c),
            unit => {
                let n: i64 = number.parse().ok()?;
                number.clear();
                seen_unit = true;
                let part = match (in_time, unit) {
                    (false, 'W') => Duration::try_weeks(n),
                    (false, 'D') => Duration::try_days(n),
                    (true, 'H') => Duration::try_hours(n),
                    (true, 'M') => Duration::try_minutes(n),
                    (true, 'S') => Duration::try_seconds(n),
                    _ => return None,
                }?;
                total = total.checked_add(&part)?;
            }
        }
    }

    if !number.is_empty() || !seen_unit {
        return None;
    }

    Some(if negative { -total } else { total })
}
