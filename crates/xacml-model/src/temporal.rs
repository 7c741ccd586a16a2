// temporal.rs - date, time, dateTime and the two XACML duration types.
//
// XML Schema temporal values may or may not carry a timezone. Values keep
// the zone they were written in (arithmetic happens in that zone); for
// comparison everything is normalized to UTC, and a value without a zone
// is taken to be in UTC.

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use chrono::{
    Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike,
};
use regex::Regex;

use crate::error::ValueError;

const SECONDS_PER_DAY: i64 = 86_400;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Split a trailing `Z` or `+hh:mm` / `-hh:mm` zone off a lexical value.
fn split_timezone<'a>(
    datatype: &str,
    lexical: &'a str,
) -> Result<(&'a str, Option<FixedOffset>), ValueError> {
    if let Some(body) = lexical.strip_suffix('Z') {
        return Ok((body, FixedOffset::east_opt(0)));
    }
    let bytes = lexical.as_bytes();
    let len = bytes.len();
    if len >= 6 && matches!(bytes[len - 6], b'+' | b'-') && bytes[len - 3] == b':' {
        let (body, zone) = lexical.split_at(len - 6);
        if !zone.is_ascii() {
            return Err(ValueError::syntax(datatype, lexical, "bad timezone"));
        }
        let sign = if zone.starts_with('-') { -1 } else { 1 };
        let hours: i32 = zone[1..3]
            .parse()
            .map_err(|_| ValueError::syntax(datatype, lexical, "bad timezone hours"))?;
        let minutes: i32 = zone[4..6]
            .parse()
            .map_err(|_| ValueError::syntax(datatype, lexical, "bad timezone minutes"))?;
        if hours > 14 || minutes > 59 || (hours == 14 && minutes != 0) {
            return Err(ValueError::syntax(datatype, lexical, "timezone out of range"));
        }
        let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .ok_or_else(|| ValueError::syntax(datatype, lexical, "timezone out of range"))?;
        return Ok((body, Some(offset)));
    }
    Ok((lexical, None))
}

fn parse_time_of_day(datatype: &str, lexical: &str, body: &str) -> Result<NaiveTime, ValueError> {
    let (base, fraction) = match body.split_once('.') {
        Some((base, fraction)) => (base, Some(fraction)),
        None => (body, None),
    };
    let time = NaiveTime::parse_from_str(base, "%H:%M:%S")
        .map_err(|e| ValueError::syntax(datatype, lexical, e.to_string()))?;
    match fraction {
        None => Ok(time),
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            let mut padded: String = digits.chars().take(9).collect();
            while padded.len() < 9 {
                padded.push('0');
            }
            let nanos: u32 = padded
                .parse()
                .map_err(|_| ValueError::syntax(datatype, lexical, "bad fractional seconds"))?;
            time.with_nanosecond(nanos)
                .ok_or_else(|| ValueError::syntax(datatype, lexical, "bad fractional seconds"))
        }
        Some(_) => Err(ValueError::syntax(datatype, lexical, "bad fractional seconds")),
    }
}

fn write_time_of_day(f: &mut fmt::Formatter<'_>, time: &NaiveTime) -> fmt::Result {
    write!(f, "{}", time.format("%H:%M:%S"))?;
    let nanos = time.nanosecond();
    if nanos > 0 {
        let fraction = format!("{:09}", nanos);
        write!(f, ".{}", fraction.trim_end_matches('0'))?;
    }
    Ok(())
}

fn write_offset(f: &mut fmt::Formatter<'_>, offset: &Option<FixedOffset>) -> fmt::Result {
    match offset {
        None => Ok(()),
        Some(offset) if offset.local_minus_utc() == 0 => f.write_str("Z"),
        Some(offset) => {
            let secs = offset.local_minus_utc();
            let sign = if secs < 0 { '-' } else { '+' };
            let secs = secs.abs();
            write!(f, "{}{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60)
        }
    }
}

fn offset_seconds(offset: &Option<FixedOffset>) -> i64 {
    offset.map(|o| i64::from(o.local_minus_utc())).unwrap_or(0)
}

/// `local` shifted to UTC; `None` when that leaves chrono's range.
fn checked_utc(local: NaiveDateTime, offset: &Option<FixedOffset>) -> Option<NaiveDateTime> {
    local.checked_sub_signed(Duration::seconds(offset_seconds(offset)))
}

/// Clamp for values built by hand past the range `parse` accepts.
fn saturated_utc(local: NaiveDateTime, offset: &Option<FixedOffset>) -> NaiveDateTime {
    checked_utc(local, offset).unwrap_or(if offset_seconds(offset) > 0 {
        NaiveDateTime::MIN
    } else {
        NaiveDateTime::MAX
    })
}

/// xs:dateTime
#[derive(Debug, Clone, Copy)]
pub struct XsDateTime {
    pub datetime: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl XsDateTime {
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let (body, offset) = split_timezone("dateTime", lexical)?;
        let (date, time) = body
            .split_once('T')
            .ok_or_else(|| ValueError::syntax("dateTime", lexical, "missing 'T' separator"))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| ValueError::syntax("dateTime", lexical, e.to_string()))?;
        let time = parse_time_of_day("dateTime", lexical, time)?;
        Self::normalizable(date.and_time(time), offset)
            .ok_or_else(|| ValueError::syntax("dateTime", lexical, "out of range once normalized to UTC"))
    }

    /// A value whose UTC instant is representable, or `None`.
    pub fn normalizable(datetime: NaiveDateTime, offset: Option<FixedOffset>) -> Option<Self> {
        checked_utc(datetime, &offset)?;
        Some(Self { datetime, offset })
    }

    /// The instant as a UTC wall-clock value.
    pub fn to_utc(&self) -> NaiveDateTime {
        saturated_utc(self.datetime, &self.offset)
    }

    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        Self::normalizable(self.datetime.checked_add_signed(duration)?, self.offset)
    }

    pub fn checked_add_months(&self, months: i64) -> Option<Self> {
        let date = add_months(self.datetime.date(), months)?;
        Self::normalizable(date.and_time(self.datetime.time()), self.offset)
    }
}

impl PartialEq for XsDateTime {
    fn eq(&self, other: &Self) -> bool {
        self.to_utc() == other.to_utc()
    }
}

impl PartialOrd for XsDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.to_utc().cmp(&other.to_utc()))
    }
}

impl fmt::Display for XsDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T", self.datetime.date().format("%Y-%m-%d"))?;
        write_time_of_day(f, &self.datetime.time())?;
        write_offset(f, &self.offset)
    }
}

/// xs:date
#[derive(Debug, Clone, Copy)]
pub struct XsDate {
    pub date: NaiveDate,
    pub offset: Option<FixedOffset>,
}

impl XsDate {
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let (body, offset) = split_timezone("date", lexical)?;
        let date = NaiveDate::parse_from_str(body, "%Y-%m-%d")
            .map_err(|e| ValueError::syntax("date", lexical, e.to_string()))?;
        Self::normalizable(date, offset)
            .ok_or_else(|| ValueError::syntax("date", lexical, "out of range once normalized to UTC"))
    }

    /// A value whose UTC start of day is representable, or `None`.
    pub fn normalizable(date: NaiveDate, offset: Option<FixedOffset>) -> Option<Self> {
        checked_utc(date.and_time(NaiveTime::MIN), &offset)?;
        Some(Self { date, offset })
    }

    /// Start of the day, as a UTC wall-clock value.
    pub fn to_utc(&self) -> NaiveDateTime {
        saturated_utc(self.date.and_time(NaiveTime::MIN), &self.offset)
    }

    pub fn checked_add_months(&self, months: i64) -> Option<Self> {
        Self::normalizable(add_months(self.date, months)?, self.offset)
    }
}

impl PartialEq for XsDate {
    fn eq(&self, other: &Self) -> bool {
        self.to_utc() == other.to_utc()
    }
}

impl PartialOrd for XsDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.to_utc().cmp(&other.to_utc()))
    }
}

impl fmt::Display for XsDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))?;
        write_offset(f, &self.offset)
    }
}

/// xs:time
#[derive(Debug, Clone, Copy)]
pub struct XsTime {
    pub time: NaiveTime,
    pub offset: Option<FixedOffset>,
}

impl XsTime {
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let (body, offset) = split_timezone("time", lexical)?;
        let time = parse_time_of_day("time", lexical, body)?;
        Ok(Self { time, offset })
    }

    /// Nanoseconds since UTC midnight, wrapped into a single day.
    pub fn utc_nanos_of_day(&self) -> i64 {
        let local = i64::from(self.time.num_seconds_from_midnight()) - offset_seconds(&self.offset);
        let seconds = local.rem_euclid(SECONDS_PER_DAY);
        seconds * NANOS_PER_SECOND + i64::from(self.time.nanosecond())
    }
}

impl PartialEq for XsTime {
    fn eq(&self, other: &Self) -> bool {
        self.utc_nanos_of_day() == other.utc_nanos_of_day()
    }
}

impl PartialOrd for XsTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.utc_nanos_of_day().cmp(&other.utc_nanos_of_day()))
    }
}

impl fmt::Display for XsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_time_of_day(f, &self.time)?;
        write_offset(f, &self.offset)
    }
}

/// xs:dayTimeDuration, e.g. `P1DT2H`, `-PT30M`, `PT1.5S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DayTimeDuration(pub Duration);

fn day_time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(-)?P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.(\d+))?S)?)?$")
            .expect("static dayTimeDuration pattern")
    })
}

fn year_month_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(-)?P(?:(\d+)Y)?(?:(\d+)M)?$").expect("static yearMonthDuration pattern")
    })
}

impl DayTimeDuration {
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let syntax = |reason: &str| ValueError::syntax("dayTimeDuration", lexical, reason);
        let caps = day_time_pattern()
            .captures(lexical)
            .ok_or_else(|| syntax("not a dayTimeDuration"))?;
        if lexical.ends_with('P') || lexical.ends_with('T') {
            return Err(syntax("no duration component"));
        }
        let field = |i: usize| -> Result<i64, ValueError> {
            caps.get(i)
                .map(|m| m.as_str().parse::<i64>())
                .transpose()
                .map_err(|_| syntax("component out of range"))
                .map(|v| v.unwrap_or(0))
        };
        let seconds = field(2)?
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|d| d.checked_add(field(3).ok()?.checked_mul(3600)?))
            .and_then(|d| d.checked_add(field(4).ok()?.checked_mul(60)?))
            .and_then(|d| d.checked_add(field(5).ok()?))
            .ok_or_else(|| syntax("component out of range"))?;
        let nanos = match caps.get(6) {
            Some(m) => {
                let mut padded: String = m.as_str().chars().take(9).collect();
                while padded.len() < 9 {
                    padded.push('0');
                }
                padded.parse::<i64>().map_err(|_| syntax("bad fraction"))?
            }
            None => 0,
        };
        let total = Duration::try_seconds(seconds)
            .and_then(|d| d.checked_add(&Duration::nanoseconds(nanos)))
            .ok_or_else(|| syntax("duration out of range"))?;
        Ok(if caps.get(1).is_some() {
            DayTimeDuration(-total)
        } else {
            DayTimeDuration(total)
        })
    }
}

impl fmt::Display for DayTimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let negative = self.0 < Duration::zero();
        let magnitude = if negative { -self.0 } else { self.0 };
        let total_seconds = magnitude.num_seconds();
        let nanos = (magnitude - Duration::seconds(total_seconds))
            .num_nanoseconds()
            .unwrap_or(0);
        if negative {
            f.write_str("-")?;
        }
        f.write_str("P")?;
        let days = total_seconds / SECONDS_PER_DAY;
        let hours = (total_seconds % SECONDS_PER_DAY) / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        if days > 0 {
            write!(f, "{}D", days)?;
        }
        if hours > 0 || minutes > 0 || seconds > 0 || nanos > 0 || days == 0 {
            f.write_str("T")?;
            if hours > 0 {
                write!(f, "{}H", hours)?;
            }
            if minutes > 0 {
                write!(f, "{}M", minutes)?;
            }
            if seconds > 0 || nanos > 0 || (hours == 0 && minutes == 0) {
                write!(f, "{}", seconds)?;
                if nanos > 0 {
                    let fraction = format!("{:09}", nanos);
                    write!(f, ".{}", fraction.trim_end_matches('0'))?;
                }
                f.write_str("S")?;
            }
        }
        Ok(())
    }
}

/// xs:yearMonthDuration, stored as a signed month count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonthDuration {
    pub months: i64,
}

impl YearMonthDuration {
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let syntax = |reason: &str| ValueError::syntax("yearMonthDuration", lexical, reason);
        let caps = year_month_pattern()
            .captures(lexical)
            .ok_or_else(|| syntax("not a yearMonthDuration"))?;
        if caps.get(2).is_none() && caps.get(3).is_none() {
            return Err(syntax("no duration component"));
        }
        let field = |i: usize| -> Result<i64, ValueError> {
            caps.get(i)
                .map(|m| m.as_str().parse::<i64>())
                .transpose()
                .map_err(|_| syntax("component out of range"))
                .map(|v| v.unwrap_or(0))
        };
        let months = field(2)?
            .checked_mul(12)
            .and_then(|m| m.checked_add(field(3).ok()?))
            .ok_or_else(|| syntax("component out of range"))?;
        Ok(Self {
            months: if caps.get(1).is_some() { -months } else { months },
        })
    }
}

impl fmt::Display for YearMonthDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.months < 0 {
            f.write_str("-")?;
        }
        let magnitude = self.months.unsigned_abs();
        let (years, months) = (magnitude / 12, magnitude % 12);
        f.write_str("P")?;
        if years > 0 {
            write!(f, "{}Y", years)?;
        }
        if months > 0 || years == 0 {
            write!(f, "{}M", months)?;
        }
        Ok(())
    }
}

/// Calendar month arithmetic; the day is clamped to the end of the target month.
fn add_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        date.checked_add_months(Months::new(magnitude))
    } else {
        date.checked_sub_months(Months::new(magnitude))
    }
}
