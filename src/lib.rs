//! # Disclosure Parser
//!
//! A library for extracting normalized balance sheet, income statement and
//! cash flow values from Japanese corporate disclosures.
//!
//! ## Core Concepts
//!
//! - **Canonical keys**: a closed set of schema fields (`total_assets`, `revenue`, ...)
//!   that every XBRL element name and Japanese PDF row label is mapped onto
//! - **XBRL path**: facts from an EDINET zip, resolved per context with priority scoring
//!   (current year over prior, consolidated over standalone)
//! - **PDF path**: statement pages located by their 【…】 headers, tables rebuilt by
//!   several strategies, the best one chosen by period columns then concept coverage
//! - **Periods**: values keyed by `period_end`, with `free_cash_flow` and a
//!   `total_assets` fallback derived after extraction
//! - **Period index**: periods merged across all documents of a ticker, first value wins
//!
//! ## Example
//!
//! ```rust,ignore
//! use disclosure_parser::*;
//! use std::path::Path;
//!
//! let engine = DisclosureEngine::new(EngineConfig::default())?;
//! let outcome = engine.parse_directory(Path::new("data/raw/7203"), "7203", None)?;
//!
//! for document in outcome.documents() {
//!     println!("{}: {} period(s)", document.document_id, document.periods.len());
//! }
//!
//! outcome.write(Path::new("data/parsed/7203"), "7203")?;
//! ```

pub mod aliases;
pub mod assembler;
pub mod config;
pub mod correction;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod output;
pub mod pdf;
pub mod schema;
pub mod utils;
pub mod xbrl;

pub use aliases::{ConceptAliasRegistry, LABEL_ALIASES, XBRL_ALIASES};
pub use assembler::{finalize, ObservedPeriod, PeriodFinancialAssembler, WritePolicy};
pub use config::{BatchPolicy, EngineConfig, TableStrategy};
pub use correction::{half_year_end, HalfYearPeriodCorrector};
pub use error::{DisclosureError, DocumentFailure, Result};
pub use manifest::{Manifest, ManifestEntry};
pub use merge::{build_period_index, PeriodIndexEntry, PeriodIndexMerger};
pub use output::{write_outputs, AggregateReport, DocumentRecord, SourceFormat};
pub use pdf::{discover_pdfs, PageSource, PdfParseMetadata, PdfReportParser, TextPages};
pub use schema::*;
pub use xbrl::parse_edinet_zip;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Which pipeline a directory of inputs goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    Xbrl,
    Pdf,
}

impl From<InputMode> for SourceFormat {
    fn from(mode: InputMode) -> Self {
        match mode {
            InputMode::Xbrl => SourceFormat::Xbrl,
            InputMode::Pdf => SourceFormat::Pdf,
        }
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(extension))
}

fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn require_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(DisclosureError::MissingInput(format!(
            "Input directory not found: {}",
            dir.display()
        )))
    }
}

/// `Pdf` for a directory holding only PDFs, `Xbrl` for only zips, and
/// `None` when it holds both or neither.
pub fn detect_input_mode(dir: &Path) -> Result<Option<InputMode>> {
    require_dir(dir)?;
    let pdfs = files_with_extension(dir, "pdf")?.len();
    let zips = files_with_extension(dir, "zip")?.len();

    Ok(match (pdfs > 0, zips > 0) {
        (true, false) => Some(InputMode::Pdf),
        (false, true) => Some(InputMode::Xbrl),
        _ => None,
    })
}

/// The documents parsed from one directory, plus any that failed under
/// [`BatchPolicy::Continue`].
#[derive(Debug)]
pub struct BatchOutcome {
    pub format: SourceFormat,
    pub records: Vec<DocumentRecord>,
    pub failures: Vec<DocumentFailure>,
}

impl BatchOutcome {
    fn new(format: SourceFormat) -> Self {
        Self {
            format,
            records: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn documents(&self) -> impl Iterator<Item = &ParsedDocument> {
        self.records.iter().map(|record| &record.document)
    }

    pub fn period_index(&self) -> Vec<PeriodIndexEntry> {
        build_period_index(self.documents())
    }

    /// Writes the per-document files and `financials.json` into `output_dir`.
    pub fn write(&self, output_dir: &Path, ticker: &str) -> Result<BTreeMap<String, PathBuf>> {
        write_outputs(output_dir, ticker, self.format, self.records.clone())
    }
}

pub struct DisclosureEngine {
    config: EngineConfig,
    registry: ConceptAliasRegistry,
}

impl DisclosureEngine {
    /// Validates `config` and builds the standard alias registry.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_registry(config, ConceptAliasRegistry::standard()?)
    }

    pub fn with_registry(config: EngineConfig, registry: ConceptAliasRegistry) -> Result<Self> {
        config.validate()?;
        debug!(
            "Engine ready: batch policy {:?}, strategies {:?}",
            config.batch_policy, config.strategies
        );
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConceptAliasRegistry {
        &self.registry
    }

    pub fn parse_xbrl_zip(&self, zip_path: &Path, ticker: &str) -> Result<ParsedDocument> {
        parse_edinet_zip(&self.registry, zip_path, ticker)
    }

    pub fn parse_pdf(
        &self,
        pdf_path: &Path,
        ticker: &str,
        entry: Option<&ManifestEntry>,
    ) -> Result<(ParsedDocument, PdfParseMetadata)> {
        PdfReportParser::new(&self.registry, &self.config).parse_file(pdf_path, ticker, entry)
    }

    fn record_failure(
        &self,
        outcome: &mut BatchOutcome,
        path: &Path,
        error: DisclosureError,
    ) -> Result<()> {
        match self.config.batch_policy {
            BatchPolicy::Abort => Err(error),
            BatchPolicy::Continue => {
                warn!("Skipping {}: {}", path.display(), error);
                outcome.failures.push(DocumentFailure {
                    path: path.to_path_buf(),
                    error,
                });
                Ok(())
            }
        }
    }

    /// Parses every `*.zip` in `dir` in name order. A `manifest.json` beside
    /// the archives supplies provenance.
    pub fn parse_xbrl_directory(&self, dir: &Path, ticker: &str) -> Result<BatchOutcome> {
        require_dir(dir)?;
        let zips = files_with_extension(dir, "zip")?;
        if zips.is_empty() {
            return Err(DisclosureError::MissingInput(format!(
                "No .zip files found in {}",
                dir.display()
            )));
        }
        info!("Parsing {} XBRL archive(s) from {}", zips.len(), dir.display());

        let manifest = Manifest::load(dir);
        let mut outcome = BatchOutcome::new(SourceFormat::Xbrl);
        for zip_path in &zips {
            match self.parse_xbrl_zip(zip_path, ticker) {
                Ok(mut document) => {
                    let entry = zip_path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .and_then(|name| manifest.as_ref()?.entry_for(name));
                    if let Some(entry) = entry {
                        document.provenance = entry.provenance();
                    }
                    outcome.records.push(document.into());
                }
                Err(e) => self.record_failure(&mut outcome, zip_path, e)?,
            }
        }
        Ok(outcome)
    }

    /// Parses `{ticker}_有価証券報告書_*.pdf` in `dir`, oldest first. A
    /// `manifest.json` supplies doc ids, provenance and half-year hints.
    pub fn parse_pdf_directory(&self, dir: &Path, ticker: &str) -> Result<BatchOutcome> {
        let pdfs = discover_pdfs(dir, ticker)?;
        info!("Parsing {} PDF(s) from {}", pdfs.len(), dir.display());

        let manifest = Manifest::load(dir);
        if let Some(manifest) = &manifest {
            manifest.check_counts(Some(pdfs.len()));
        }

        let mut outcome = BatchOutcome::new(SourceFormat::Pdf);
        for pdf_path in &pdfs {
            let entry = pdf_path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| manifest.as_ref()?.entry_for(name));
            match self.parse_pdf(pdf_path, ticker, entry) {
                Ok((document, metadata)) => outcome.records.push(DocumentRecord {
                    document,
                    pdf_metadata: Some(metadata),
                }),
                Err(e) => self.record_failure(&mut outcome, pdf_path, e)?,
            }
        }
        Ok(outcome)
    }

    /// Parses `dir` with the given mode, or the one detected from its files.
    pub fn parse_directory(
        &self,
        dir: &Path,
        ticker: &str,
        mode: Option<InputMode>,
    ) -> Result<BatchOutcome> {
        let mode = match mode {
            Some(mode) => mode,
            None => match detect_input_mode(dir)? {
                Some(mode) => mode,
                None if files_with_extension(dir, "pdf")?.is_empty() => {
                    return Err(DisclosureError::MissingInput(format!(
                        "No .pdf or .zip files found in {}",
                        dir.display()
                    )));
                }
                None => {
                    return Err(DisclosureError::Configuration(format!(
                        "Cannot determine input mode for {}: found both PDFs and zips",
                        dir.display()
                    )));
                }
            },
        };

        match mode {
            InputMode::Xbrl => self.parse_xbrl_directory(dir, ticker),
            InputMode::Pdf => self.parse_pdf_directory(dir, ticker),
        }
    }
}
