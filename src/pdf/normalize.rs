use crate::schema::PeriodType;
use crate::utils::fold_fullwidth_digits;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MULTIPLIER: i64 = 1_000_000;
pub const DEFAULT_UNIT_LABEL: &str = "default";

static UNIT_PATTERNS: Lazy<Vec<(Regex, i64, &'static str)>> = Lazy::new(|| {
    [("百万円", 1_000_000), ("千円", 1_000), ("円", 1)]
        .into_iter()
        .map(|(unit, multiplier)| {
            let pattern = format!(
                r"[（(]?\s*単位\s*[：:]\s*{unit}\s*[）)]?|[（(]\s*{unit}\s*[）)]"
            );
            (
                Regex::new(&pattern).expect("valid unit pattern"),
                multiplier,
                unit,
            )
        })
        .collect()
});

static FOOTNOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"※[０-９]*[,、]?\s*").expect("valid footnote pattern"));
static PAREN_NEGATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[（(]\s*(.+?)\s*[）)]$").expect("valid paren pattern"));
static TRIANGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[△▲]\s*").expect("valid triangle pattern"));
static MINUS_VARIANTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[－﹣−‐]").expect("valid minus pattern"));
static PLAIN_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[0-9]+\.?[0-9]*|\.[0-9]+)$").expect("valid number pattern"));

const EMPTY_CELLS: [&str; 7] = ["", "-", "－", "―", "—", "−", "–"];

const DATE_BODY: &str = r"(?:(\d{4})|(令和|平成|昭和)\s*(元|\d{1,2}))\s*年\s*(\d{1,2})\s*月\s*(\d{1,2})\s*日";

static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(DATE_BODY).expect("valid date pattern"));
static DURATION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"自\s*{DATE_BODY}")).expect("valid start pattern"));
static DURATION_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"至\s*{DATE_BODY}")).expect("valid end pattern"));

/// Finds the monetary unit in text near a table. Falls back to millions of
/// yen with the [`DEFAULT_UNIT_LABEL`] so callers can tell an assumed unit
/// from a detected one.
pub fn detect_unit(text: &str) -> (i64, &'static str) {
    UNIT_PATTERNS
        .iter()
        .find(|(pattern, _, _)| pattern.is_match(text))
        .map(|(_, multiplier, label)| (*multiplier, *label))
        .unwrap_or((DEFAULT_MULTIPLIER, DEFAULT_UNIT_LABEL))
}

pub fn is_empty_cell(text: &str) -> bool {
    EMPTY_CELLS.contains(&text.trim())
}

/// Parses a table cell into whole yen. Triangle marks, parentheses and every
/// minus variant make the value negative; blank and dash cells are `None`.
pub fn normalize_value(raw: &str, multiplier: i64) -> Option<i64> {
    let stripped = FOOTNOTE.replace_all(raw.trim(), "");
    let mut text = stripped.trim().to_string();
    if EMPTY_CELLS.contains(&text.as_str()) {
        return None;
    }

    let mut negative = false;
    if let Some(inner) = PAREN_NEGATIVE.captures(&text).map(|c| c[1].to_string()) {
        text = inner;
        negative = true;
    }
    if TRIANGLE.is_match(&text) {
        text = TRIANGLE.replace(&text, "").into_owned();
        negative = true;
    }

    let unified = MINUS_VARIANTS.replace_all(&text, "-");
    let unsigned = match unified.strip_prefix('-') {
        Some(rest) => {
            negative = true;
            rest
        }
        None => &*unified,
    };

    let digits = fold_fullwidth_digits(unsigned).replace(',', "");
    let digits = digits.trim();
    if !PLAIN_NUMBER.is_match(digits) {
        return None;
    }

    let magnitude = match digits.parse::<i64>() {
        Ok(whole) => whole.checked_mul(multiplier)?,
        Err(_) => (digits.parse::<f64>().ok()? * multiplier as f64) as i64,
    };
    Some(if negative { -magnitude.abs() } else { magnitude })
}

/// Converts a Japanese era year to its Western year.
pub fn era_to_western(era: &str, era_year: i32) -> Option<i32> {
    let offset = match era {
        "令和" => 2018,
        "平成" => 1988,
        "昭和" => 1925,
        _ => return None,
    };
    Some(offset + era_year)
}

fn date_from_captures(caps: &Captures) -> Option<NaiveDate> {
    let year = match (caps.get(1), caps.get(2), caps.get(3)) {
        (Some(western), _, _) => western.as_str().parse().ok()?,
        (None, Some(era), Some(era_year)) => {
            let era_year = match era_year.as_str() {
                "元" => 1,
                digits => digits.parse().ok()?,
            };
            era_to_western(era.as_str(), era_year)?
        }
        _ => return None,
    };
    let month = caps.get(4)?.as_str().parse().ok()?;
    let day = caps.get(5)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses the first Western (`2024年3月31日`) or era (`平成28年3月31日`) date.
pub fn parse_japanese_date(text: &str) -> Option<NaiveDate> {
    let folded = fold_fullwidth_digits(text);
    DATE.captures(&folded)
        .and_then(|caps| date_from_captures(&caps))
}

fn parse_marked_date(pattern: &Regex, text: &str) -> Option<NaiveDate> {
    pattern
        .captures(text)
        .and_then(|caps| date_from_captures(&caps))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PeriodLabel {
    Prior,
    Current,
}

/// The reporting period a value column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodColumn {
    pub period_start: Option<NaiveDate>,
    pub period_end: NaiveDate,
    pub period_type: PeriodType,
    pub label: PeriodLabel,
}

/// Reads a column header such as `前連結会計年度 (自 2023年4月1日 至 2024年3月31日)`.
/// A `自`/`至` pair gives a duration, a lone date an instant.
pub fn parse_column_header(header: &str) -> Option<PeriodColumn> {
    if header.trim().is_empty() {
        return None;
    }
    let label = if header.contains('前') {
        PeriodLabel::Prior
    } else {
        PeriodLabel::Current
    };

    let folded = fold_fullwidth_digits(header);
    if let (Some(start), Some(end)) = (
        parse_marked_date(&DURATION_START, &folded),
        parse_marked_date(&DURATION_END, &folded),
    ) {
        return Some(PeriodColumn {
            period_start: Some(start),
            period_end: end,
            period_type: PeriodType::Duration,
            label,
        });
    }

    parse_japanese_date(&folded).map(|end| PeriodColumn {
        period_start: None,
        period_end: end,
        period_type: PeriodType::Instant,
        label,
    })
}
