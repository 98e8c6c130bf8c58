use crate::aliases::ConceptAliasRegistry;
use crate::config::TableStrategy;
use crate::error::Result;
use crate::pdf::layout::{is_period_header_row, is_unit_row, merge_tables, PageSource, Row, Table};
use crate::pdf::locator::StatementSection;
use crate::pdf::normalize::{
    detect_unit, is_empty_cell, parse_column_header, PeriodColumn, DEFAULT_MULTIPLIER,
    DEFAULT_UNIT_LABEL,
};
use crate::schema::{CanonicalKey, Statement};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

pub const TEXT_FALLBACK_LABEL: &str = "text_fallback";

const PERIOD_HEADER_SCAN_ROWS: usize = 4;
const UNIT_SCAN_ROWS: usize = 3;
const FALLBACK_COLUMN_COUNT: usize = 3;

static TWO_VALUE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^(.+?)\s+([※０-９\d△▲（(－\-][^\n]*?)\s+([※０-９\d△▲（(－\-][^\n]*?)$",
    )
    .expect("valid two-value line pattern")
});

static ONE_VALUE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(.+?)\s+([※０-９\d△▲（(－\-][,\d０-９，．.※]+)$")
        .expect("valid one-value line pattern")
});

/// Canonical concepts found in `rows` whose value cells are not all blank.
fn concepts_with_values(registry: &ConceptAliasRegistry, rows: &[Row]) -> HashSet<CanonicalKey> {
    rows.iter()
        .filter(|row| row.len() >= 2)
        .filter(|row| row[1..].iter().any(|cell| !is_empty_cell(cell)))
        .filter_map(|row| registry.map_concept(&row[0]))
        .collect()
}

/// Number of distinct canonical concepts with a non-empty value.
/// Repeated rows for the same concept count once.
pub fn concept_score(registry: &ConceptAliasRegistry, rows: &[Row]) -> usize {
    concepts_with_values(registry, rows).len()
}

/// Rows recovered from a page's raw text: a known label followed by one
/// value per period column.
pub fn text_fallback_rows(
    registry: &ConceptAliasRegistry,
    page_text: &str,
    column_count: usize,
) -> Vec<Row> {
    let to_row = |caps: regex::Captures| -> Option<Row> {
        let label = caps.get(1)?.as_str().trim();
        registry.map_concept(label)?;
        let mut row = vec![label.to_string()];
        for group in 2..caps.len() {
            row.push(caps.get(group)?.as_str().trim().to_string());
        }
        Some(row)
    };

    if column_count >= 3 {
        TWO_VALUE_LINE
            .captures_iter(page_text)
            .filter_map(to_row)
            .collect()
    } else {
        ONE_VALUE_LINE
            .captures_iter(page_text)
            .filter_map(to_row)
            .collect()
    }
}

/// Periods, rows and unit read from the tables of a single page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageExtraction {
    pub periods: Vec<PeriodColumn>,
    pub rows: Vec<Row>,
    pub unit_multiplier: i64,
    pub unit_label: &'static str,
}

pub fn extract_page(tables: &[Table], page_text: &str, is_header_page: bool) -> PageExtraction {
    let merged = merge_tables(tables);

    let (mut unit_multiplier, mut unit_label) = detect_unit(page_text);
    if unit_label == DEFAULT_UNIT_LABEL {
        if let Some((multiplier, label)) = merged
            .iter()
            .take(UNIT_SCAN_ROWS)
            .flatten()
            .map(|cell| detect_unit(cell))
            .find(|(_, label)| *label != DEFAULT_UNIT_LABEL)
        {
            unit_multiplier = multiplier;
            unit_label = label;
        }
    }

    let mut periods = Vec::new();
    let mut data_start = 0;
    for (idx, row) in merged.iter().take(PERIOD_HEADER_SCAN_ROWS).enumerate() {
        if is_unit_row(row) {
            data_start = idx + 1;
            continue;
        }
        if is_period_header_row(row) {
            if is_header_page || periods.is_empty() {
                periods.extend(row.iter().filter_map(|cell| parse_column_header(cell)));
            }
            data_start = idx + 1;
            continue;
        }
        break;
    }

    let rows = merged
        .into_iter()
        .skip(data_start)
        .filter(|row| row.len() >= 2)
        .collect();

    PageExtraction {
        periods,
        rows,
        unit_multiplier,
        unit_label,
    }
}

/// One strategy's reading of a statement section.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyCandidate {
    pub label: String,
    pub periods: Vec<PeriodColumn>,
    pub rows: Vec<Row>,
    pub unit_multiplier: i64,
    pub unit_label: &'static str,
    pub concept_score: usize,
}

/// Picks the candidate with the most period columns, then the highest
/// concept score. Earlier candidates win ties.
pub fn select_best(candidates: Vec<StrategyCandidate>) -> Option<StrategyCandidate> {
    let mut best: Option<StrategyCandidate> = None;
    for candidate in candidates {
        let better = best.as_ref().map_or(true, |current| {
            (candidate.periods.len(), candidate.concept_score)
                > (current.periods.len(), current.concept_score)
        });
        if better {
            best = Some(candidate);
        }
    }
    best
}

/// The winning reading of one statement section.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementExtraction {
    pub statement: Statement,
    /// One-based page numbers.
    pub pages: Vec<usize>,
    pub periods: Vec<PeriodColumn>,
    pub rows: Vec<Row>,
    pub unit_multiplier: i64,
    pub unit_label: &'static str,
    pub strategy_used: String,
    pub concept_score: usize,
}

pub struct PdfTableStrategyEngine<'a> {
    registry: &'a ConceptAliasRegistry,
    strategies: &'a [TableStrategy],
}

impl<'a> PdfTableStrategyEngine<'a> {
    pub fn new(registry: &'a ConceptAliasRegistry, strategies: &'a [TableStrategy]) -> Self {
        Self {
            registry,
            strategies,
        }
    }

    fn run_strategy(
        &self,
        source: &dyn PageSource,
        section: &StatementSection,
        strategy: TableStrategy,
    ) -> Result<StrategyCandidate> {
        let mut periods = Vec::new();
        let mut rows = Vec::new();
        let mut unit_multiplier = DEFAULT_MULTIPLIER;
        let mut unit_label = DEFAULT_UNIT_LABEL;

        for (position, &page) in section.pages.iter().enumerate() {
            let is_header_page = position == 0;
            let tables = source.extract_tables(page, strategy)?;
            let extraction = extract_page(&tables, &source.page_text(page)?, is_header_page);

            if is_header_page && !extraction.periods.is_empty() {
                periods = extraction.periods;
            }
            if extraction.unit_label != DEFAULT_UNIT_LABEL {
                unit_multiplier = extraction.unit_multiplier;
                unit_label = extraction.unit_label;
            }
            rows.extend(extraction.rows);
        }

        let concept_score = concept_score(self.registry, &rows);
        Ok(StrategyCandidate {
            label: strategy.label().to_string(),
            periods,
            rows,
            unit_multiplier,
            unit_label,
            concept_score,
        })
    }

    /// Runs every configured strategy over the section, keeps the best one
    /// and tops it up with concepts recovered from the raw page text.
    pub fn extract(
        &self,
        source: &dyn PageSource,
        section: &StatementSection,
    ) -> Result<StatementExtraction> {
        let mut candidates = Vec::with_capacity(self.strategies.len());
        for &strategy in self.strategies {
            let candidate = self.run_strategy(source, section, strategy)?;
            debug!(
                "{} strategy {}: {} period(s), score {}",
                section.statement,
                candidate.label,
                candidate.periods.len(),
                candidate.concept_score
            );
            candidates.push(candidate);
        }

        let Some(best) = select_best(candidates) else {
            return Ok(StatementExtraction {
                statement: section.statement,
                pages: section.page_numbers(),
                periods: Vec::new(),
                rows: Vec::new(),
                unit_multiplier: DEFAULT_MULTIPLIER,
                unit_label: DEFAULT_UNIT_LABEL,
                strategy_used: TEXT_FALLBACK_LABEL.to_string(),
                concept_score: 0,
            });
        };

        let StrategyCandidate {
            mut label,
            periods,
            mut rows,
            unit_multiplier,
            unit_label,
            concept_score: table_score,
        } = best;

        let column_count = if !periods.is_empty() {
            periods.len() + 1
        } else {
            rows.first().map_or(FALLBACK_COLUMN_COUNT, |row| row.len())
        };

        let mut found = concepts_with_values(self.registry, &rows);
        let mut recovered = 0usize;
        for &page in &section.pages {
            let text = source.page_text(page)?;
            for row in text_fallback_rows(self.registry, &text, column_count) {
                if let Some(key) = self.registry.map_concept(&row[0]) {
                    if found.insert(key) {
                        rows.push(row);
                        recovered += 1;
                    }
                }
            }
        }

        if table_score == 0 && recovered > 0 {
            label = TEXT_FALLBACK_LABEL.to_string();
        }
        let concept_score = concept_score(self.registry, &rows);

        debug!(
            "{} selected {} ({} concept(s), {} from text)",
            section.statement, label, concept_score, recovered
        );

        Ok(StatementExtraction {
            statement: section.statement,
            pages: section.page_numbers(),
            periods,
            rows,
            unit_multiplier,
            unit_label,
            strategy_used: label,
            concept_score,
        })
    }
}
