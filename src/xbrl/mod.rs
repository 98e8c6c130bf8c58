//! EDINET XBRL bundles: zip member selection, context resolution and
//! priority-scored fact extraction.

pub mod archive;
pub mod context;
pub mod extractor;

pub use archive::{choose_xbrl_member, read_xbrl_member, XbrlMember};
pub use context::{context_priority, parse_contexts, ContextInfo};
pub use extractor::{parse_numeric_value, XbrlConceptExtractor, XbrlExtraction};

use crate::aliases::ConceptAliasRegistry;
use crate::error::Result;
use crate::schema::{ParsedDocument, Provenance, SourceFile};
use log::info;
use std::path::Path;

/// Parses one EDINET zip into a document keyed by the archive's file stem.
pub fn parse_edinet_zip(
    registry: &ConceptAliasRegistry,
    zip_path: &Path,
    ticker: &str,
) -> Result<ParsedDocument> {
    let member = read_xbrl_member(zip_path)?;
    let extraction = XbrlConceptExtractor::new(registry)
        .extract_bytes(&member.bytes, &zip_path.join(&member.name))?;

    let document_id = zip_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    info!(
        "Parsed {} ({}): {} period(s)",
        zip_path.display(),
        member.name,
        extraction.periods.len()
    );

    Ok(ParsedDocument {
        ticker: ticker.to_string(),
        document_id,
        source_file: SourceFile::Zip(zip_path.display().to_string()),
        company_name: extraction.company_name,
        periods: extraction.periods,
        provenance: Provenance::default(),
    })
}
