use crate::aliases::{is_company_name_concept, ConceptAliasRegistry};
use crate::assembler::{PeriodFinancialAssembler, WritePolicy};
use crate::error::{DisclosureError, Result};
use crate::schema::{Amount, PeriodFinancial};
use crate::utils::fold_fullwidth_digits;
use crate::xbrl::context::parse_contexts;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::Document;
use std::path::Path;

static NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9]+(\.[0-9]+)?$").expect("valid number pattern"));

const NULL_MARKERS: [&str; 4] = ["", "-", "－", "―"];

/// Parses the text of a numeric fact. Dashes and non-numeric text are null;
/// `sign="-"` forces a negative value.
pub fn parse_numeric_value(raw: &str, sign: Option<&str>) -> Option<Amount> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if NULL_MARKERS.contains(&cleaned.as_str()) {
        return None;
    }

    let cleaned = fold_fullwidth_digits(&cleaned);
    if !NUMBER_PATTERN.is_match(&cleaned) {
        return None;
    }

    let negative = sign == Some("-");
    if !cleaned.contains('.') {
        if let Ok(value) = cleaned.parse::<i64>() {
            // Negating only positives keeps i64::MIN in range.
            let value = if negative && value > 0 { -value } else { value };
            return Some(Amount::Integer(value));
        }
    }

    let mut value: f64 = cleaned.parse().ok()?;
    if negative {
        value = -value.abs();
    }
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(Amount::Integer(value as i64))
    } else {
        Some(Amount::Decimal(value))
    }
}

/// The schema-relevant content of one XBRL instance.
#[derive(Debug, Clone, PartialEq)]
pub struct XbrlExtraction {
    pub company_name: Option<String>,
    pub periods: Vec<PeriodFinancial>,
}

pub struct XbrlConceptExtractor<'a> {
    registry: &'a ConceptAliasRegistry,
}

impl<'a> XbrlConceptExtractor<'a> {
    pub fn new(registry: &'a ConceptAliasRegistry) -> Self {
        Self { registry }
    }

    /// Decodes raw instance bytes and extracts from them. `origin` only
    /// labels errors.
    pub fn extract_bytes(&self, bytes: &[u8], origin: &Path) -> Result<XbrlExtraction> {
        let text = std::str::from_utf8(bytes).map_err(|e| DisclosureError::MalformedMarkup {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.extract(text, origin)
    }

    pub fn extract(&self, xml: &str, origin: &Path) -> Result<XbrlExtraction> {
        let xml = xml.trim_start_matches('\u{feff}');
        let document = Document::parse(xml).map_err(|e| DisclosureError::MalformedMarkup {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;

        let contexts = parse_contexts(&document);
        debug!(
            "{}: {} contexts resolved",
            origin.display(),
            contexts.len()
        );

        let mut assembler = PeriodFinancialAssembler::new(WritePolicy::PriorityWins);
        let mut company_name: Option<String> = None;
        let mut facts = 0usize;

        for element in document.descendants().filter(|n| n.is_element()) {
            let Some(context_id) = element.attribute("contextRef") else {
                continue;
            };
            let Some(context) = contexts.get(context_id) else {
                continue;
            };

            let text = element.text().map(str::trim).unwrap_or_default();
            if text.is_empty() {
                continue;
            }

            let local_name = element.tag_name().name();
            if company_name.is_none() && is_company_name_concept(local_name) {
                company_name = Some(text.to_string());
            }

            let Some(key) = self.registry.canonicalize_identifier(local_name) else {
                continue;
            };
            let Some(value) = parse_numeric_value(text, element.attribute("sign")) else {
                continue;
            };

            assembler.record(
                &context.observed_period(),
                key,
                value,
                context.priority(),
                &context.id,
            );
            facts += 1;
        }

        debug!("{}: {} schema facts recorded", origin.display(), facts);

        Ok(XbrlExtraction {
            company_name,
            periods: assembler.finish(),
        })
    }
}
