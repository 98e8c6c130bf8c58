//! Japanese securities report (有価証券報告書) PDFs: statement location,
//! multi-strategy table reconstruction and value normalization.
//!
//! The pipeline only needs page text, supplied through [`PageSource`], so it
//! can be driven from a loaded PDF ([`TextPages::from_pdf`]) or from text
//! pages held in memory.

pub mod layout;
pub mod locator;
pub mod normalize;
pub mod strategy;

pub use layout::{PageSource, Row, Table, TextPages};
pub use locator::{classify_statement, PdfStatementLocator, StatementSection};
pub use normalize::{
    detect_unit, normalize_value, parse_column_header, parse_japanese_date, PeriodColumn,
    PeriodLabel, DEFAULT_MULTIPLIER, DEFAULT_UNIT_LABEL,
};
pub use strategy::{PdfTableStrategyEngine, StatementExtraction, TEXT_FALLBACK_LABEL};

use crate::aliases::ConceptAliasRegistry;
use crate::assembler::{ObservedPeriod, PeriodFinancialAssembler, WritePolicy};
use crate::config::{EngineConfig, TableStrategy};
use crate::correction::HalfYearPeriodCorrector;
use crate::error::{DisclosureError, Result};
use crate::manifest::ManifestEntry;
use crate::schema::{
    Amount, ParsedDocument, PeriodFinancial, PeriodKey, Provenance, SourceFile,
};
use chrono::NaiveDate;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PARSER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const EXTRACTION_METHOD: &str = "text_layer_table";
pub const REPORT_NAME_MARKER: &str = "有価証券報告書";

static YEAR_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(\d{4})(?:\.pdf)?$").expect("valid year suffix pattern"));

fn document_year(path: &Path) -> u32 {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| YEAR_SUFFIX.captures(stem))
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Finds `{ticker}_有価証券報告書_*.pdf` in `dir`, oldest year first.
pub fn discover_pdfs(dir: &Path, ticker: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(DisclosureError::MissingInput(format!(
            "Input directory not found: {}",
            dir.display()
        )));
    }

    let prefix = format!("{}_{}_", ticker, REPORT_NAME_MARKER);
    let mut pdfs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = file_name(&path);
        if path.is_file() && name.starts_with(&prefix) && name.ends_with(".pdf") {
            pdfs.push(path);
        }
    }

    if pdfs.is_empty() {
        return Err(DisclosureError::MissingInput(format!(
            "No PDF files matching pattern '{}*.pdf' found in {}",
            prefix,
            dir.display()
        )));
    }

    pdfs.sort_by_key(|path| (document_year(path), file_name(path)));
    debug!("Discovered {} PDF(s) in {}", pdfs.len(), dir.display());
    Ok(pdfs)
}

/// Turns the selected statement tables into finalized periods. Within one
/// document the first value written to a cell keeps it.
pub fn build_period_financials(
    registry: &ConceptAliasRegistry,
    statements: &[StatementExtraction],
    source_id: &str,
) -> Vec<PeriodFinancial> {
    let mut assembler = PeriodFinancialAssembler::new(WritePolicy::FirstWins);

    for statement in statements.iter().filter(|s| !s.periods.is_empty()) {
        for row in &statement.rows {
            let Some(label) = row.first() else { continue };
            let Some(key) = registry.map_concept(label) else {
                continue;
            };

            for (column, period) in statement.periods.iter().enumerate() {
                let Some(cell) = row.get(column + 1) else {
                    continue;
                };
                let Some(value) = normalize_value(cell, statement.unit_multiplier) else {
                    continue;
                };
                let observed = ObservedPeriod {
                    period_end: PeriodKey::Date(period.period_end),
                    period_start: period.period_start,
                    period_type: period.period_type,
                };
                assembler.record(&observed, key, Amount::Integer(value), 0, source_id);
            }
        }
    }

    assembler.finish()
}

/// How a PDF was read, written next to the document as `pdf_metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PdfParseMetadata {
    pub doc_id: Option<String>,
    /// File name of the source PDF.
    pub source_pdf: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<PeriodKey>,
    /// One-based pages the statements were read from.
    pub extraction_pages: Vec<usize>,
    pub parser_version: String,
    pub extraction_method: String,
    pub unit_detected: String,
    pub unit_multiplier: i64,
    #[schemars(description = "Most frequent strategy label across the extracted statements.")]
    pub strategy_used: String,
    pub concept_score: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end_original: Option<PeriodKey>,
}

fn dominant_label<'s>(labels: impl Iterator<Item = &'s str>) -> Option<&'s str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (label, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}

/// Parses securities report PDFs with the configured strategies.
pub struct PdfReportParser<'a> {
    registry: &'a ConceptAliasRegistry,
    config: &'a EngineConfig,
}

impl<'a> PdfReportParser<'a> {
    pub fn new(registry: &'a ConceptAliasRegistry, config: &'a EngineConfig) -> Self {
        Self { registry, config }
    }

    fn probe_strategy(&self) -> TableStrategy {
        self.config
            .strategies
            .first()
            .copied()
            .unwrap_or(TableStrategy::Lines)
    }

    /// Locates every statement section and reads the best table for each.
    /// Sections that yield no rows are dropped; a document with no usable
    /// section at all is an unsupported layout.
    pub fn extract_statements(
        &self,
        source: &dyn PageSource,
        origin: &Path,
    ) -> Result<Vec<StatementExtraction>> {
        let locator = PdfStatementLocator::new(self.config.max_statement_pages, self.probe_strategy());
        let sections = locator.locate(source)?;
        if sections.is_empty() {
            return Err(DisclosureError::UnsupportedLayout {
                path: origin.to_path_buf(),
                reason: "no financial statement headers found".to_string(),
            });
        }

        let engine = PdfTableStrategyEngine::new(self.registry, &self.config.strategies);
        let mut statements = Vec::with_capacity(sections.len());
        for section in &sections {
            let extraction = engine.extract(source, section)?;
            if extraction.rows.is_empty() {
                warn!(
                    "{}: no usable {} rows on page(s) {:?}",
                    origin.display(),
                    section.statement,
                    extraction.pages
                );
                continue;
            }
            statements.push(extraction);
        }

        if statements.is_empty() {
            return Err(DisclosureError::UnsupportedLayout {
                path: origin.to_path_buf(),
                reason: "no usable statement tables across all strategies".to_string(),
            });
        }
        Ok(statements)
    }

    /// Parses already-loaded pages. `entry` carries the manifest's doc id,
    /// provenance and half-year hint for this file.
    pub fn parse_pages(
        &self,
        source: &dyn PageSource,
        pdf_path: &Path,
        ticker: &str,
        entry: Option<&ManifestEntry>,
    ) -> Result<(ParsedDocument, PdfParseMetadata)> {
        let statements = self.extract_statements(source, pdf_path)?;

        let doc_id = entry
            .and_then(|e| e.doc_id.clone())
            .filter(|id| !id.is_empty());
        let document_id = doc_id.clone().unwrap_or_else(|| {
            pdf_path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        let mut periods = build_period_financials(self.registry, &statements, &document_id);

        let mut period_end_original = None;
        if self.config.half_year_correction {
            if let Some(hint) = entry.and_then(ManifestEntry::half_year_hint) {
                if let Some((original, _)) = HalfYearPeriodCorrector::new(hint).apply(&mut periods) {
                    period_end_original = Some(PeriodKey::Date(original));
                }
            }
        }

        let mut pages: Vec<usize> = statements.iter().flat_map(|s| s.pages.iter().copied()).collect();
        pages.sort_unstable();
        pages.dedup();

        let mut unit_multiplier = DEFAULT_MULTIPLIER;
        let mut unit_label = DEFAULT_UNIT_LABEL;
        for statement in &statements {
            if statement.unit_label != DEFAULT_UNIT_LABEL {
                unit_multiplier = statement.unit_multiplier;
                unit_label = statement.unit_label;
            }
        }
        if unit_label == DEFAULT_UNIT_LABEL {
            warn!(
                "{}: no unit marker found, assuming 百万円",
                pdf_path.display()
            );
        }

        let strategy_used = dominant_label(statements.iter().map(|s| s.strategy_used.as_str()))
            .unwrap_or(self.probe_strategy().label())
            .to_string();

        let latest = periods.last();
        let metadata = PdfParseMetadata {
            doc_id,
            source_pdf: file_name(pdf_path),
            period_start: latest.and_then(|p| p.period_start),
            period_end: latest.map(|p| p.period_end),
            extraction_pages: pages,
            parser_version: PARSER_VERSION.to_string(),
            extraction_method: EXTRACTION_METHOD.to_string(),
            unit_detected: unit_label.to_string(),
            unit_multiplier,
            strategy_used,
            concept_score: statements.iter().map(|s| s.concept_score).sum(),
            doc_type_code: entry.and_then(|e| e.doc_type_code()).map(str::to_string),
            period_end_original,
        };

        info!(
            "Parsed {}: {} statement(s), {} period(s), strategy {}",
            pdf_path.display(),
            statements.len(),
            periods.len(),
            metadata.strategy_used
        );

        let document = ParsedDocument {
            ticker: ticker.to_string(),
            document_id,
            source_file: SourceFile::Pdf(pdf_path.display().to_string()),
            company_name: None,
            periods,
            provenance: entry.map(ManifestEntry::provenance).unwrap_or_else(Provenance::default),
        };

        Ok((document, metadata))
    }

    /// Loads `pdf_path` with `lopdf` and parses it.
    pub fn parse_file(
        &self,
        pdf_path: &Path,
        ticker: &str,
        entry: Option<&ManifestEntry>,
    ) -> Result<(ParsedDocument, PdfParseMetadata)> {
        let pages = TextPages::from_pdf(pdf_path)?;
        self.parse_pages(&pages, pdf_path, ticker, entry)
    }
}
