use crate::schema::{
    ParsedDocument, PeriodFinancial, PeriodKey, PeriodType, Statements,
};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One period merged across every document of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodIndexEntry {
    pub period_end: PeriodKey,
    pub period_start: Option<NaiveDate>,
    pub period_type: PeriodType,
    pub fiscal_year: Option<i32>,
    #[serde(flatten)]
    pub statements: Statements,
    /// Documents that contributed to this period, in document order.
    pub source_document_ids: Vec<String>,
}

impl PeriodIndexEntry {
    fn from_period(period: &PeriodFinancial) -> Self {
        Self {
            period_end: period.period_end,
            period_start: period.period_start,
            period_type: period.period_type,
            fiscal_year: period.fiscal_year,
            statements: Statements::default(),
            source_document_ids: Vec::new(),
        }
    }
}

/// Merges periods sharing a `period_end` across documents. The first
/// non-null value seen for a key is kept; later documents only fill gaps.
/// Source documents are never modified.
#[derive(Debug, Default)]
pub struct PeriodIndexMerger {
    entries: BTreeMap<PeriodKey, PeriodIndexEntry>,
}

impl PeriodIndexMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, document: &ParsedDocument) {
        for period in &document.periods {
            let entry = self
                .entries
                .entry(period.period_end)
                .or_insert_with(|| PeriodIndexEntry::from_period(period));

            entry.statements.fill_missing_from(&period.statements);

            if !entry
                .source_document_ids
                .iter()
                .any(|id| *id == document.document_id)
            {
                entry
                    .source_document_ids
                    .push(document.document_id.clone());
            }
        }
    }

    /// Merged entries sorted by `period_end`.
    pub fn finish(self) -> Vec<PeriodIndexEntry> {
        self.entries.into_values().collect()
    }
}

pub fn build_period_index<'a, I>(documents: I) -> Vec<PeriodIndexEntry>
where
    I: IntoIterator<Item = &'a ParsedDocument>,
{
    let mut merger = PeriodIndexMerger::new();
    for document in documents {
        merger.add_document(document);
    }
    merger.finish()
}
