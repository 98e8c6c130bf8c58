use crate::error::Result;
use crate::merge::{build_period_index, PeriodIndexEntry};
use crate::pdf::PdfParseMetadata;
use crate::schema::{CanonicalKey, ParsedDocument, Statement};
use chrono::{DateTime, Utc};
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const AGGREGATE_FILE_NAME: &str = "financials.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[schemars(description = "EDINET XBRL zip archives")]
    Xbrl,
    #[schemars(description = "Securities report PDFs")]
    Pdf,
}

/// The canonical keys of each statement, in output order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaKeys {
    pub bs: Vec<CanonicalKey>,
    pub pl: Vec<CanonicalKey>,
    pub cf: Vec<CanonicalKey>,
}

impl SchemaKeys {
    pub fn canonical() -> Self {
        Self {
            bs: Statement::Bs.keys().to_vec(),
            pl: Statement::Pl.keys().to_vec(),
            cf: Statement::Cf.keys().to_vec(),
        }
    }
}

/// A parsed document as written to `{document_id}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentRecord {
    #[serde(flatten)]
    pub document: ParsedDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_metadata: Option<PdfParseMetadata>,
}

impl From<ParsedDocument> for DocumentRecord {
    fn from(document: ParsedDocument) -> Self {
        Self {
            document,
            pdf_metadata: None,
        }
    }
}

/// The `financials.json` aggregate for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AggregateReport {
    pub ticker: String,
    pub generated_at: DateTime<Utc>,
    pub document_count: usize,
    pub source_format: SourceFormat,
    pub documents: Vec<DocumentRecord>,
    #[schemars(description = "Periods merged across all documents, first non-null value per key.")]
    pub period_index: Vec<PeriodIndexEntry>,
    pub schema: SchemaKeys,
}

impl AggregateReport {
    pub fn build(ticker: &str, source_format: SourceFormat, documents: Vec<DocumentRecord>) -> Self {
        let period_index = build_period_index(documents.iter().map(|record| &record.document));
        Self {
            ticker: ticker.to_string(),
            generated_at: Utc::now(),
            document_count: documents.len(),
            source_format,
            documents,
            period_index,
            schema: SchemaKeys::canonical(),
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AggregateReport)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = Self::generate_json_schema();
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

/// Writes one `{document_id}.json` per document plus `financials.json`.
/// Returns the written paths keyed by document id, with the aggregate
/// under `"financials"`.
pub fn write_outputs(
    output_dir: &Path,
    ticker: &str,
    source_format: SourceFormat,
    documents: Vec<DocumentRecord>,
) -> Result<BTreeMap<String, PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let mut saved = BTreeMap::new();
    for record in &documents {
        let path = output_dir.join(format!("{}.json", record.document.document_id));
        std::fs::write(&path, serde_json::to_string_pretty(record)?)?;
        saved.insert(record.document.document_id.clone(), path);
    }

    let report = AggregateReport::build(ticker, source_format, documents);
    let aggregate_path = output_dir.join(AGGREGATE_FILE_NAME);
    std::fs::write(&aggregate_path, serde_json::to_string_pretty(&report)?)?;
    info!(
        "Wrote {} document(s) and {} for {}",
        report.document_count,
        aggregate_path.display(),
        ticker
    );
    saved.insert("financials".to_string(), aggregate_path);

    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Amount, PeriodFinancial, PeriodKey, PeriodType, Provenance, SourceFile};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn document(id: &str) -> ParsedDocument {
        let end = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let mut period = PeriodFinancial::new(PeriodKey::Date(end), None, PeriodType::Instant);
        period.statements.bs.total_assets = Some(Amount::Integer(1000));
        period.source_ids.push("CurrentYearInstant".to_string());
        ParsedDocument {
            ticker: "7203".to_string(),
            document_id: id.to_string(),
            source_file: SourceFile::Zip(format!("/data/{id}.zip")),
            company_name: Some("トヨタ自動車株式会社".to_string()),
            periods: vec![period],
            provenance: Provenance {
                source: Some("edinet".to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_document_json_shape() {
        let record = DocumentRecord::from(document("S100AAAA"));
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["document_id"], "S100AAAA");
        assert_eq!(value["source_zip"], "/data/S100AAAA.zip");
        assert_eq!(value["source"], "edinet");
        assert!(value.get("endpoint_or_doc_id").is_none());
        assert!(value.get("pdf_metadata").is_none());

        let period = &value["periods"][0];
        assert_eq!(period["period_end"], "2025-03-31");
        assert_eq!(period["period_type"], "instant");
        assert_eq!(period["fiscal_year"], 2025);
        assert_eq!(period["bs"]["total_assets"], 1000);
        assert!(period["bs"]["net_assets"].is_null());
        assert!(period["cf"]["free_cash_flow"].is_null());
        assert!(period.get("period_end_original").is_none());
    }

    #[test]
    fn test_aggregate_report_contents() {
        let report = AggregateReport::build(
            "7203",
            SourceFormat::Xbrl,
            vec![document("a").into(), document("b").into()],
        );
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["document_count"], 2);
        assert_eq!(value["source_format"], "xbrl");
        assert_eq!(value["schema"]["pl"][0], "revenue");
        assert_eq!(value["schema"]["cf"][3], "free_cash_flow");
        assert_eq!(value["period_index"].as_array().unwrap().len(), 1);
        assert_eq!(
            value["period_index"][0]["source_document_ids"],
            serde_json::json!(["a", "b"])
        );
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("parsed");

        let saved = write_outputs(&out, "7203", SourceFormat::Pdf, vec![document("S100BBBB").into()])
            .unwrap();
        assert_eq!(saved.len(), 2);
        assert!(out.join("S100BBBB.json").is_file());

        let aggregate: AggregateReport =
            serde_json::from_str(&std::fs::read_to_string(out.join(AGGREGATE_FILE_NAME)).unwrap())
                .unwrap();
        assert_eq!(aggregate.ticker, "7203");
        assert_eq!(aggregate.source_format, SourceFormat::Pdf);
        assert_eq!(aggregate.documents[0].document.company_name.as_deref(), Some("トヨタ自動車株式会社"));
        assert_eq!(
            aggregate.documents[0].document.periods[0].value(CanonicalKey::TotalAssets),
            Some(Amount::Integer(1000))
        );

        let written = std::fs::read_to_string(out.join("S100BBBB.json")).unwrap();
        assert!(written.contains("トヨタ自動車株式会社"));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = AggregateReport::schema_as_json().unwrap();
        assert!(schema_json.contains("period_index"));
        assert!(schema_json.contains("source_document_ids"));
    }
}
