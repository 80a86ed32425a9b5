//! Capture date resolution
//!
//! Each file gets a textual timestamp. Embedded EXIF capture times are
//! preferred in this order: `DateTimeOriginal`, `DateTime`,
//! `DateTimeDigitized`. Files without readable EXIF data (including every
//! non-image file) fall back to their modification time. Resolution never
//! fails; the variant of [`ResolvedDate`] records which source was used.
//!
//! Dates are stored as strings so caches written by earlier versions of the
//! tool load unchanged. [`parse_date`] accepts the formats those caches and
//! this module produce.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use exif::{In, Tag, Value};
use log::trace;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// EXIF tags consulted for the capture time, most preferred first
const CAPTURE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTime, Tag::DateTimeDigitized];

/// Format used for embedded capture times
const EMBEDDED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used for modification times (local time with offset)
const MODIFIED_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Formats carrying a UTC offset
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y:%m:%d %H:%M:%S %z",
];

/// Formats without an offset; interpreted as written
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y:%m:%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Date-only formats
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y:%m:%d", "%Y/%m/%d"];

/// Where a file's timestamp came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedDate {
    /// Capture time read from embedded metadata
    Embedded(String),
    /// Filesystem modification time, used because no capture time was found
    Modified(String),
    /// Neither source was readable (the file vanished or cannot be stat'ed)
    Unavailable,
}

impl ResolvedDate {
    /// The timestamp text; empty when unavailable
    pub fn as_str(&self) -> &str {
        match self {
            ResolvedDate::Embedded(s) | ResolvedDate::Modified(s) => s,
            ResolvedDate::Unavailable => "",
        }
    }

    /// Consume into the timestamp text; empty when unavailable
    pub fn into_string(self) -> String {
        match self {
            ResolvedDate::Embedded(s) | ResolvedDate::Modified(s) => s,
            ResolvedDate::Unavailable => String::new(),
        }
    }

    /// True if the modification-time fallback was used
    pub fn is_fallback(&self) -> bool {
        !matches!(self, ResolvedDate::Embedded(_))
    }
}

/// Resolve the best available timestamp for `path`
pub fn resolve_date(path: &Path) -> ResolvedDate {
    if let Some(date) = embedded_capture_time(path) {
        return ResolvedDate::Embedded(date);
    }

    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(mtime) => {
            let local: DateTime<Local> = mtime.into();
            ResolvedDate::Modified(local.format(MODIFIED_FORMAT).to_string())
        }
        Err(e) => {
            trace!("No modification time for {}: {}", path.display(), e);
            ResolvedDate::Unavailable
        }
    }
}

/// Read the preferred EXIF capture time, if any
///
/// Any failure to open or parse the container counts as "absent".
fn embedded_capture_time(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(e) => {
            trace!("No EXIF data in {}: {}", path.display(), e);
            return None;
        }
    };

    CAPTURE_TAGS.iter().find_map(|&tag| {
        let field = exif.get_field(tag, In::PRIMARY)?;
        match field.value {
            Value::Ascii(ref parts) => parts.first().and_then(|raw| format_exif_datetime(raw)),
            _ => None,
        }
    })
}

/// Normalize an EXIF ASCII timestamp
///
/// Well-formed values become `YYYY-MM-DD HH:MM:SS`. Blank values are
/// absent. Anything else is kept verbatim so the tree builder can route it to
/// the `Invalid` bucket.
fn format_exif_datetime(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw).trim().to_string();
    if text.is_empty() || text.chars().all(|c| matches!(c, ' ' | ':')) {
        return None;
    }

    let normalized = exif::DateTime::from_ascii(raw).ok().and_then(|dt| {
        NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())?.and_hms_opt(
            dt.hour.into(),
            dt.minute.into(),
            dt.second.into(),
        )
    });

    Some(match normalized {
        Some(dt) => dt.format(EMBEDDED_FORMAT).to_string(),
        None => text,
    })
}

/// Parse a stored timestamp
///
/// Offsets are dropped without converting, so year and month are those
/// written in the text.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.naive_local());
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(value, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}
