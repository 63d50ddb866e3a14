//! X12 date and time handling

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use edi_profile::DateFormat;

/// Which end of a stop window a G62 qualifier sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Earliest,
    Latest,
}

impl Window {
    /// G62-01 date qualifier.
    pub fn from_qualifier(qualifier: &str) -> Option<Self> {
        match qualifier {
            // requested pickup, ship not before, deliver not before, promised pickup
            "10" | "37" | "53" | "69" => Some(Window::Earliest),
            // ship not later, deliver not later, requested delivery, promised delivery
            "38" | "54" | "68" | "70" => Some(Window::Latest),
            _ => None,
        }
    }
}

pub fn parse_date(value: &str, format: DateFormat) -> Option<NaiveDate> {
    let value = value.trim();
    if value.len() != format.width() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(value, format.pattern()).ok()
}

/// `HHMM` or `HHMMSS`.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    match value.len() {
        4 => NaiveTime::parse_from_str(value, "%H%M").ok(),
        6 => NaiveTime::parse_from_str(value, "%H%M%S").ok(),
        _ => None,
    }
}

/// Date plus optional time; a present but unreadable time makes the whole value unreadable.
pub fn parse_datetime(date: &str, time: Option<&str>, format: DateFormat) -> Option<NaiveDateTime> {
    let date = parse_date(date, format)?;
    let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(time) => parse_time(time)?,
        None => NaiveTime::MIN,
    };
    Some(date.and_time(time))
}
