//! Fallback NLU: deterministic intent extraction from free text.
//!
//! `parse` is a pure, total function from the raw message (plus the current
//! date) to a tagged intent. It does no dispatching and holds no state, so it
//! can be tested exhaustively on its own. The dialogue driver decides what to
//! do with the result.

use chrono::{Duration as ChronoDuration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    Availability,
    Report,
    Booking,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIntent {
    pub kind: IntentKind,
    /// Doctor named in the text ("Dr. Ahuja"), if any. Never defaulted here:
    /// the driver falls back to the caller's bound identity or asks.
    pub doctor: Option<String>,
    /// Reference date after resolving today/yesterday/tomorrow.
    pub date: NaiveDate,
    /// Literal `YYYY-MM-DDTHH:MM` token for bookings, if present.
    pub start: Option<String>,
    /// Patient name from a "for <Name>" phrase, if present.
    pub patient: Option<String>,
    pub time_of_day: Option<String>,
}

static DOCTOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:dr\.?|doctor)\s+([a-zA-Z]+)").expect("doctor regex"));
static DATETIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}").expect("datetime regex"));
static PATIENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfor\s+([a-zA-Z][a-zA-Z ]*)").expect("patient regex"));

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn extract_doctor(text: &str) -> Option<String> {
    DOCTOR_RE
        .captures(text)
        .map(|caps| format!("Dr. {}", title_case(&caps[1])))
}

fn extract_patient(text: &str) -> Option<String> {
    PATIENT_RE.captures(text).and_then(|caps| {
        let name = caps[1].trim();
        if name.is_empty() {
            return None;
        }
        Some(
            name.split_whitespace()
                .map(title_case)
                .collect::<Vec<_>>()
                .join(" "),
        )
    })
}

fn resolve_date(lower: &str, today: NaiveDate) -> NaiveDate {
    if lower.contains("tomorrow") {
        today + ChronoDuration::days(1)
    } else if lower.contains("yesterday") {
        today - ChronoDuration::days(1)
    } else {
        today
    }
}

fn extract_time_of_day(lower: &str) -> Option<String> {
    for word in ["morning", "afternoon", "evening"] {
        if lower.contains(word) {
            return Some(word.to_string());
        }
    }
    None
}

/// Classify a message and extract everything the driver might need. Total:
/// every input maps to some intent, worst case `Unrecognized`.
pub fn parse(text: &str, today: NaiveDate) -> ParsedIntent {
    let lower = text.to_lowercase();

    let kind = if lower.contains("availability")
        || lower.contains("available")
        || lower.contains("slots")
    {
        IntentKind::Availability
    } else if lower.contains("how many") || lower.contains("patients") || lower.contains("visited")
    {
        IntentKind::Report
    } else if lower.contains("book") || lower.contains("schedule") {
        IntentKind::Booking
    } else {
        IntentKind::Unrecognized
    };

    ParsedIntent {
        kind,
        doctor: extract_doctor(text),
        date: resolve_date(&lower, today),
        start: DATETIME_RE.find(text).map(|m| m.as_str().to_string()),
        patient: extract_patient(text),
        time_of_day: extract_time_of_day(&lower),
    }
}
