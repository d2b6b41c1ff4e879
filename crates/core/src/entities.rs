//! Entity recognition primitives consumed by the prompt interpreters.
//!
//! `EntityRecognizer` is the seam: hosts with a real NLU stack swap the whole trait object.
//! `BasicEntityRecognizer` is a deterministic, dependency-light default good enough for
//! numbered menus, yes/no questions and simple dates.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use regex::Regex;

use crate::prompts::{FoundChoice, ResolvedDateTime};

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

#[derive(Clone, Debug, PartialEq)]
pub struct NumberEntity {
    pub value: f64,
    /// The token the value was read from, as it appeared in the utterance.
    pub matched: String,
}

pub trait EntityRecognizer: Send + Sync {
    fn parse_number(&self, text: &str) -> Option<NumberEntity>;
    fn parse_boolean(&self, text: &str) -> Option<bool>;
    fn find_best_match(&self, candidates: &[String], text: &str) -> Option<FoundChoice>;
    fn recognize_date_time(
        &self,
        text: &str,
        reference: Option<DateTime<Utc>>,
    ) -> Option<ResolvedDateTime>;
}

#[derive(Clone, Debug)]
pub struct BasicEntityRecognizer {
    match_threshold: f64,
}

impl Default for BasicEntityRecognizer {
    fn default() -> Self {
        Self { match_threshold: DEFAULT_MATCH_THRESHOLD }
    }
}

impl BasicEntityRecognizer {
    pub fn new(match_threshold: f64) -> Self {
        Self { match_threshold: match_threshold.clamp(0.0, 1.0) }
    }

    pub fn match_threshold(&self) -> f64 {
        self.match_threshold
    }
}

impl EntityRecognizer for BasicEntityRecognizer {
    fn parse_number(&self, text: &str) -> Option<NumberEntity> {
        if let Some(found) = numeric_pattern().and_then(|pattern| pattern.find(text)) {
            if let Ok(value) = found.as_str().parse::<f64>() {
                return Some(NumberEntity { value, matched: found.as_str().to_string() });
            }
        }

        text.split(|character: char| !character.is_alphabetic()).find_map(|token| {
            cardinal_value(&token.to_lowercase())
                .map(|value| NumberEntity { value, matched: token.to_string() })
        })
    }

    fn parse_boolean(&self, text: &str) -> Option<bool> {
        let trimmed = text.trim();
        if affirmative_pattern().is_some_and(|pattern| pattern.is_match(trimmed)) {
            return Some(true);
        }
        if negative_pattern().is_some_and(|pattern| pattern.is_match(trimmed)) {
            return Some(false);
        }
        None
    }

    fn find_best_match(&self, candidates: &[String], text: &str) -> Option<FoundChoice> {
        let needle = normalize(text);
        if needle.is_empty() {
            return None;
        }

        let mut best: Option<FoundChoice> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let score = similarity(&normalize(candidate), &needle);
            if score < self.match_threshold || score <= 0.0 {
                continue;
            }
            let better = best.as_ref().map(|current| score > current.score).unwrap_or(true);
            if better {
                best = Some(FoundChoice { index, label: candidate.clone(), score });
            }
        }
        best
    }

    fn recognize_date_time(
        &self,
        text: &str,
        reference: Option<DateTime<Utc>>,
    ) -> Option<ResolvedDateTime> {
        let reference = reference.unwrap_or_else(Utc::now);
        absolute_date(text)
            .or_else(|| relative_offset(text, reference))
            .or_else(|| named_day(text, reference))
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn similarity(candidate: &str, needle: &str) -> f64 {
    if candidate.is_empty() {
        return 0.0;
    }
    if candidate == needle {
        return 1.0;
    }

    let candidate_len = candidate.chars().count() as f64;
    let needle_len = needle.chars().count() as f64;
    if candidate.contains(needle) {
        return needle_len / candidate_len;
    }
    if needle.contains(candidate) {
        return candidate_len / needle_len;
    }

    strsim::normalized_levenshtein(candidate, needle)
}

fn cardinal_value(token: &str) -> Option<f64> {
    const CARDINALS: [&str; 21] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen",
        "eighteen", "nineteen", "twenty",
    ];
    CARDINALS.iter().position(|word| *word == token).map(|position| position as f64)
}

fn absolute_date(text: &str) -> Option<ResolvedDateTime> {
    let captures = iso_date_pattern()?.captures(text)?;
    let year = captures.get(1)?.as_str().parse::<i32>().ok()?;
    let month = captures.get(2)?.as_str().parse::<u32>().ok()?;
    let day = captures.get(3)?.as_str().parse::<u32>().ok()?;
    let hour = captures.get(4).map(|value| value.as_str().parse::<u32>()).transpose().ok()?;
    let minute = captures.get(5).map(|value| value.as_str().parse::<u32>()).transpose().ok()?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour.unwrap_or(0), minute.unwrap_or(0), 0)?;
    Some(ResolvedDateTime {
        resolved: Utc.from_utc_datetime(&naive),
        matched: captures.get(0)?.as_str().to_string(),
    })
}

fn relative_offset(text: &str, reference: DateTime<Utc>) -> Option<ResolvedDateTime> {
    let captures = relative_pattern()?.captures(text)?;
    let amount = captures.get(1)?.as_str().parse::<i64>().ok()?;
    let unit = captures.get(2)?.as_str().to_lowercase();

    let offset = match unit.as_str() {
        "minute" => TimeDelta::try_minutes(amount)?,
        "hour" => TimeDelta::try_hours(amount)?,
        "day" => TimeDelta::try_days(amount)?,
        "week" => TimeDelta::try_weeks(amount)?,
        _ => return None,
    };

    Some(ResolvedDateTime {
        resolved: reference.checked_add_signed(offset)?,
        matched: captures.get(0)?.as_str().to_string(),
    })
}

fn named_day(text: &str, reference: DateTime<Utc>) -> Option<ResolvedDateTime> {
    let found = named_day_pattern()?.find(text)?;
    let days = match found.as_str().to_lowercase().as_str() {
        "yesterday" => -1,
        "tomorrow" => 1,
        _ => 0,
    };

    Some(ResolvedDateTime {
        resolved: reference.checked_add_signed(TimeDelta::try_days(days)?)?,
        matched: found.as_str().to_string(),
    })
}

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn numeric_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, r"[+-]?(?:\d+(?:\.\d+)?|\.\d+)")
}

fn affirmative_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, r"(?i)^(?:1|y|yes|yep|sure|ok|true)(?:\W|$)")
}

fn negative_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, r"(?i)^(?:2|n|no|nope|not|false)(?:\W|$)")
}

fn iso_date_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, r"\b(\d{4})-(\d{2})-(\d{2})(?:[ T](\d{1,2}):(\d{2}))?\b")
}

fn relative_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, r"(?i)\bin (\d+) (minute|hour|day|week)s?\b")
}

fn named_day_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, r"(?i)\b(?:today|tomorrow|yesterday|now)\b")
}
