use crate::assembler::ObservedPeriod;
use crate::schema::{PeriodKey, PeriodType};
use crate::utils::parse_iso_date;
use chrono::NaiveDate;
use roxmltree::{Document, Node};
use std::collections::HashMap;

/// Period metadata of one `<context>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    pub id: String,
    pub period_type: PeriodType,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub instant: Option<NaiveDate>,
}

impl ContextInfo {
    pub fn period_end(&self) -> PeriodKey {
        self.instant
            .or(self.end_date)
            .map_or(PeriodKey::Unknown, PeriodKey::Date)
    }

    pub fn observed_period(&self) -> ObservedPeriod {
        ObservedPeriod {
            period_end: self.period_end(),
            period_start: self.start_date,
            period_type: self.period_type,
        }
    }

    pub fn priority(&self) -> i32 {
        context_priority(&self.id)
    }
}

/// Scores a context id so that current-year consolidated facts outrank
/// prior-year and non-consolidated duplicates of the same concept.
pub fn context_priority(context_id: &str) -> i32 {
    let id = context_id.to_lowercase();
    let mut score = 0;

    if id.contains("currentyear") {
        score += 100;
    } else if id.contains("current") {
        score += 60;
    }
    if id.contains("consolidated") {
        score += 40;
    }
    if id.contains("nonconsolidated") {
        score -= 25;
    }
    if id.contains("prior") || id.contains("previous") {
        score -= 80;
    }

    score
}

/// Builds the id-keyed context table. Contexts without an `id` or a
/// `<period>` child are skipped.
pub fn parse_contexts(document: &Document) -> HashMap<String, ContextInfo> {
    let mut contexts = HashMap::new();

    for context in document
        .descendants()
        .filter(|n| is_element_named(n, "context"))
    {
        let Some(id) = context.attribute("id") else {
            continue;
        };
        let Some(period) = context.children().find(|n| is_element_named(n, "period")) else {
            continue;
        };

        let instant_text = child_text(&period, "instant");
        let start_text = child_text(&period, "startDate");
        let end_text = child_text(&period, "endDate");

        let period_type = if instant_text.is_some() {
            PeriodType::Instant
        } else if start_text.is_some() || end_text.is_some() {
            PeriodType::Duration
        } else {
            PeriodType::Unknown
        };

        contexts.insert(
            id.to_string(),
            ContextInfo {
                id: id.to_string(),
                period_type,
                start_date: start_text.and_then(parse_iso_date),
                end_date: end_text.and_then(parse_iso_date),
                instant: instant_text.and_then(parse_iso_date),
            },
        );
    }

    contexts
}

pub(crate) fn is_element_named(node: &Node, local_name: &str) -> bool {
    node.is_element() && node.tag_name().name() == local_name
}

fn child_text<'a>(node: &Node<'a, '_>, local_name: &str) -> Option<&'a str> {
    node.children()
        .filter(|n| is_element_named(n, local_name))
        .filter_map(|n| n.text())
        .map(str::trim)
        .find(|text| !text.is_empty())
}
