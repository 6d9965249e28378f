//! Normalization for the dates and times callers say out loud.
//!
//! Dates are stored as `DD/MM/YYYY` and times as 24-hour `HH:MM`.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

pub const STORED_DATE_FORMAT: &str = "%d/%m/%Y";
pub const STORED_TIME_FORMAT: &str = "%H:%M";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const NUMERIC_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

const WORD_DATE_FORMATS: &[&str] = &["%d %B %Y", "%B %d %Y", "%d %b %Y", "%b %d %Y"];

const WEEKDAYS: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "mon", "tue",
    "tues", "wed", "thu", "thur", "thurs", "fri", "sat", "sun",
];

pub fn parse_date(input: &str) -> Option<NaiveDate> {
    parse_date_on(input, Local::now().date_naive())
}

/// Like [`parse_date`], resolving `today`/`tomorrow` against the given day.
pub fn parse_date_on(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let value = input.trim();
    if value.is_empty() {
        return None;
    }

    match value.to_lowercase().as_str() {
        "today" => return Some(today),
        "tomorrow" => return today.checked_add_signed(Duration::days(1)),
        _ => {}
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }

    for fmt in NUMERIC_DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d);
        }
    }

    let words = normalize_words(value);
    WORD_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&words, fmt).ok())
}

/// "Wednesday, October 15th, 2025" -> "October 15 2025"
fn normalize_words(value: &str) -> String {
    let cleaned = value.replace(',', " ");
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();

    if tokens
        .first()
        .is_some_and(|t| WEEKDAYS.contains(&t.to_lowercase().as_str()))
    {
        tokens.remove(0);
    }

    tokens
        .into_iter()
        .map(strip_ordinal)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_ordinal(token: &str) -> &str {
    let lower = token.to_ascii_lowercase();
    for suffix in ["st", "nd", "rd", "th"] {
        if lower.ends_with(suffix) {
            let digits = &token[..token.len() - suffix.len()];
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return digits;
            }
        }
    }
    token
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(STORED_DATE_FORMAT).to_string()
}

/// Long form used in spoken messages, e.g. "Monday, October 20, 2025".
pub fn spoken_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Normalizes `"3 pm"`, `"03:00 PM"`, `"11:30am"` or 24-hour `"14:00"` to
/// `"HH:MM"`. A bare hour is only accepted with an am/pm marker.
pub fn parse_time(input: &str) -> Option<String> {
    let v: String = input
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect();
    if v.is_empty() {
        return None;
    }

    let (body, pm) = if let Some(body) = v.strip_suffix("AM") {
        (body, Some(false))
    } else if let Some(body) = v.strip_suffix("PM") {
        (body, Some(true))
    } else {
        (v.as_str(), None)
    };

    let (hour, minute) = match body.split_once(':') {
        Some((h, m)) => (h, Some(m)),
        None => (body, None),
    };

    if hour.is_empty() || hour.len() > 2 || !hour.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = hour.parse().ok()?;

    let minute: u32 = match minute {
        Some(m) if m.len() == 2 && m.chars().all(|c| c.is_ascii_digit()) => m.parse().ok()?,
        Some(_) => return None,
        None if pm.is_some() => 0,
        None => return None,
    };

    let hour = match pm {
        Some(_) if !(1..=12).contains(&hour) => return None,
        Some(true) => hour % 12 + 12,
        Some(false) => hour % 12,
        None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0).map(|t| t.format(STORED_TIME_FORMAT).to_string())
}

/// `"17:00"` -> `"5PM"`, `"09:30"` -> `"9:30AM"`.
pub fn human_time(time: &str) -> Option<String> {
    let parsed = NaiveTime::parse_from_str(time.trim(), STORED_TIME_FORMAT).ok()?;
    let fmt = if parsed.format("%M").to_string() == "00" {
        "%-I%p"
    } else {
        "%-I:%M%p"
    };
    Some(parsed.format(fmt).to_string())
}

/// The next two business days after `today`. Same-day is never offered.
pub fn next_two_dates(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = next_business_day(today);
    (first, next_business_day(first))
}

fn next_business_day(from: NaiveDate) -> NaiveDate {
    let mut day = from.succ_opt().unwrap_or(from);
    while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
        day = day.succ_opt().unwrap_or(day);
    }
    day
}
