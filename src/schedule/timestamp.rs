//! Anchor timestamps from transcript identifiers.
//!
//! Recorder filenames start with `YYYYMMDD-HHMMSS`, e.g.
//! `20250929-090512-lecture.txt`. That prefix is the only source of timing
//! information; there is no fallback to file metadata.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::error::TimestampFormatError;

const PREFIX_LEN: usize = 15;

/// Point in time a transcript was recorded, in local wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnchorTimestamp(NaiveDateTime);

impl AnchorTimestamp {
    pub fn new(at: NaiveDateTime) -> Self {
        Self(at)
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }
}

impl From<NaiveDateTime> for AnchorTimestamp {
    fn from(at: NaiveDateTime) -> Self {
        Self(at)
    }
}

impl fmt::Display for AnchorTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Parse the leading `YYYYMMDD-HHMMSS` segment of an identifier.
///
/// The segment must be followed by `-`, `.` or the end of the string.
pub fn extract(identifier: &str) -> Result<AnchorTimestamp, TimestampFormatError> {
    let fail = |reason: &str| TimestampFormatError {
        identifier: identifier.to_string(),
        reason: reason.to_string(),
    };

    let bytes = identifier.as_bytes();
    if bytes.len() < PREFIX_LEN {
        return Err(fail("too short"));
    }

    let shape_ok = bytes[..PREFIX_LEN].iter().enumerate().all(|(i, b)| {
        if i == 8 {
            *b == b'-'
        } else {
            b.is_ascii_digit()
        }
    });
    if !shape_ok {
        return Err(fail("prefix is not 8 digits, '-', 6 digits"));
    }

    match bytes.get(PREFIX_LEN) {
        None | Some(b'-') | Some(b'.') => {}
        Some(_) => return Err(fail("prefix is not followed by '-' or an extension")),
    }

    // All bytes of the prefix are ASCII, so slicing on byte offsets is safe
    NaiveDateTime::parse_from_str(&identifier[..PREFIX_LEN], "%Y%m%d-%H%M%S")
        .map(AnchorTimestamp)
        .map_err(|_| fail("not a valid calendar date-time"))
}
