use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::{Error, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive calendar date range, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Parse both ends as `YYYY-MM-DD`; a malformed string is reported before
    /// the ordering is checked.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let s = parse_ymd(start)?;
        let e = parse_ymd(end)?;
        Self::new(s, e).ok_or_else(|| Error::InvalidDateOrder {
            start: start.trim().to_string(),
            end: end.trim().to_string(),
        })
    }

    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

/// Strict `YYYY-MM-DD`: four-digit year, two-digit month and day.
pub fn parse_ymd(s: &str) -> Result<NaiveDate> {
    let t = s.trim();
    let b = t.as_bytes();
    let shaped = b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
    if !shaped {
        return Err(Error::InvalidDateFormat(t.to_string()));
    }
    NaiveDate::parse_from_str(t, DATE_FORMAT).map_err(|_| Error::InvalidDateFormat(t.to_string()))
}

/// UTC offset for the time-zone codes the water services put in `tz_cd`.
pub fn tz_offset(tz_cd: &str) -> Option<FixedOffset> {
    let hours = match tz_cd.trim().to_ascii_uppercase().as_str() {
        "" | "UTC" | "GMT" | "Z" => 0,
        "AST" => -4,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        "AKST" => -9,
        "AKDT" => -8,
        "HST" => -10,
        "SST" => -11,
        "CHST" => 10,
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}

/// Parse a service timestamp (`YYYY-MM-DD HH:MM[:SS]` local time, or a bare
/// date for daily values) and convert it to UTC using `tz_cd`.
pub fn parse_service_datetime(value: &str, tz_cd: Option<&str>) -> Result<DateTime<Utc>> {
    let v = value.trim();
    let naive = NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDate::parse_from_str(v, DATE_FORMAT).map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|_| Error::Parse(format!("invalid timestamp: {v}")))?;

    let Some(tz) = tz_cd.filter(|t| !t.trim().is_empty()) else {
        return Ok(Utc.from_utc_datetime(&naive));
    };
    let offset =
        tz_offset(tz).ok_or_else(|| Error::Parse(format!("unknown time zone code: {tz}")))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::Parse(format!("ambiguous local time: {v} {tz}")))
}
