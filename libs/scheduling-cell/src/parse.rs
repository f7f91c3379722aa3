// libs/scheduling-cell/src/parse.rs
//
// Free-form date and slot-time parsing for tool arguments. The model relays
// whatever the user typed ("tomorrow", "2pm", "2:00 PM"), so parsing is
// deliberately forgiving.

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

static HOUR_MERIDIEM: OnceLock<Regex> = OnceLock::new();

/// Parse "today", "tomorrow", or an ISO date (YYYY-MM-DD, optionally with a
/// time suffix) into a calendar date.
pub fn parse_date_str(date_str: &str) -> Option<NaiveDate> {
    let s = date_str.trim();
    if s.is_empty() {
        return None;
    }
    match s.to_lowercase().as_str() {
        "today" => Some(Utc::now().date_naive()),
        "tomorrow" => Some((Utc::now() + Duration::days(1)).date_naive()),
        _ => {
            let iso = s.replace('Z', "");
            if let Ok(date) = NaiveDate::parse_from_str(&iso, "%Y-%m-%d") {
                return Some(date);
            }
            // Allow full datetimes; keep only the date part
            iso.get(..10)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        }
    }
}

/// Parse a slot time. Accepts HH:MM, HH:MM:SS, 2pm, 2 pm, 2:00 PM, etc.
pub fn parse_slot_time(slot_time: &str) -> Option<NaiveTime> {
    let s = slot_time.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in ["%H:%M", "%I:%M %p", "%I:%M%p", "%H:%M:%S"] {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Some(t);
        }
        let squeezed = s.replace(' ', "");
        if let Ok(t) = NaiveTime::parse_from_str(&squeezed, &fmt.replace(' ', "")) {
            return Some(t);
        }
    }

    // Flexible: "2pm", "10am", "12pm"
    let re = HOUR_MERIDIEM
        .get_or_init(|| Regex::new(r"^(\d{1,2})\s*[o:]?\s*(am|pm)$").expect("valid regex"));
    if let Some(caps) = re.captures(&s.to_lowercase()) {
        let mut hour: u32 = caps[1].parse().ok()?;
        match &caps[2] {
            "pm" if hour != 12 => hour += 12,
            "am" if hour == 12 => hour = 0,
            _ => {}
        }
        return NaiveTime::from_hms_opt(hour, 0, 0);
    }

    None
}

/// Parse "HH:MM" or "HH:MM:SS" store columns.
pub fn parse_stored_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_and_date_words() {
        assert_eq!(
            parse_date_str("2025-06-02"),
            NaiveDate::from_ymd_opt(2025, 6, 2)
        );
        assert_eq!(
            parse_date_str("2025-06-02T15:00:00Z"),
            NaiveDate::from_ymd_opt(2025, 6, 2)
        );
        assert_eq!(parse_date_str("today"), Some(Utc::now().date_naive()));
        assert!(parse_date_str("tomorrow").is_some());
        assert_eq!(parse_date_str("not a date"), None);
        assert_eq!(parse_date_str(""), None);
    }

    #[test]
    fn parses_flexible_slot_times() {
        let three_pm = NaiveTime::from_hms_opt(15, 0, 0).unwrap();
        assert_eq!(parse_slot_time("15:00"), Some(three_pm));
        assert_eq!(parse_slot_time("3pm"), Some(three_pm));
        assert_eq!(parse_slot_time("3 pm"), Some(three_pm));
        assert_eq!(parse_slot_time("3:00 PM"), Some(three_pm));
        assert_eq!(
            parse_slot_time("12pm"),
            NaiveTime::from_hms_opt(12, 0, 0)
        );
        assert_eq!(
            parse_slot_time("12am"),
            NaiveTime::from_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_slot_time("late"), None);
    }
}
