use crate::config::TableStrategy;
use crate::error::Result;
use crate::pdf::layout::{
    dominant_column_count, is_period_header_row, is_unit_row, merge_tables, PageSource, Table,
};
use crate::schema::Statement;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

const DEFAULT_COLUMN_COUNT: usize = 3;
const CONTINUATION_PROBE_ROWS: usize = 3;

fn header(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid statement header pattern")
}

static CONSOLIDATED_HEADERS: Lazy<[(Regex, Statement); 3]> = Lazy::new(|| {
    [
        (
            header(r"【(?:四半期|中間)?連結貸借対照表】"),
            Statement::Bs,
        ),
        (
            header(r"【(?:四半期|中間)?連結損益計算書(?:及び(?:四半期|中間)?連結包括利益計算書)?】"),
            Statement::Pl,
        ),
        (
            header(r"【(?:四半期|中間)?連結キャッシュ・フロー計算書】"),
            Statement::Cf,
        ),
    ]
});

static STANDALONE_HEADERS: Lazy<[(Regex, Statement); 3]> = Lazy::new(|| {
    [
        (header(r"【(?:四半期|中間)?貸借対照表】"), Statement::Bs),
        (
            header(r"【(?:四半期|中間)?損益計算書(?:及び(?:四半期|中間)?包括利益計算書)?】"),
            Statement::Pl,
        ),
        (
            header(r"【(?:四半期|中間)?キャッシュ・フロー計算書】"),
            Statement::Cf,
        ),
    ]
});

/// Classifies a page by its bracketed statement header. Consolidated
/// headers take priority over standalone ones.
pub fn classify_statement(page_text: &str) -> Option<Statement> {
    CONSOLIDATED_HEADERS
        .iter()
        .chain(STANDALONE_HEADERS.iter())
        .find(|(pattern, _)| pattern.is_match(page_text))
        .map(|(_, statement)| *statement)
}

/// Whether a page continues a statement table: one of its first rows has
/// the expected width and carries a unit or period marker.
pub fn is_continuation_page(tables: &[Table], expected_columns: usize) -> bool {
    tables.iter().any(|table| {
        table
            .iter()
            .take(CONTINUATION_PROBE_ROWS)
            .filter(|row| row.len() == expected_columns)
            .any(|row| is_unit_row(row) || is_period_header_row(row))
    })
}

/// Page range of one statement. Indices are zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementSection {
    pub statement: Statement,
    pub pages: Vec<usize>,
}

impl StatementSection {
    /// One-based page numbers for reporting.
    pub fn page_numbers(&self) -> Vec<usize> {
        self.pages.iter().map(|page| page + 1).collect()
    }
}

pub struct PdfStatementLocator {
    max_pages: usize,
    probe_strategy: TableStrategy,
}

impl PdfStatementLocator {
    pub fn new(max_pages: usize, probe_strategy: TableStrategy) -> Self {
        Self {
            max_pages: max_pages.max(1),
            probe_strategy,
        }
    }

    /// Finds the first header page of each statement type and extends it
    /// over its continuation pages.
    pub fn locate(&self, source: &dyn PageSource) -> Result<Vec<StatementSection>> {
        let page_count = source.page_count();
        let mut headers: Vec<(usize, Statement)> = Vec::new();
        let mut header_pages = Vec::new();

        for index in 0..page_count {
            if let Some(statement) = classify_statement(&source.page_text(index)?) {
                header_pages.push(index);
                if !headers.iter().any(|(_, seen)| *seen == statement) {
                    headers.push((index, statement));
                }
            }
        }

        let mut sections = Vec::with_capacity(headers.len());
        for (position, &(start, statement)) in headers.iter().enumerate() {
            let mut upper = (start + self.max_pages).min(page_count);
            if let Some(&(next_start, _)) = headers.get(position + 1) {
                upper = upper.min(next_start);
            }

            let header_tables = source.extract_tables(start, self.probe_strategy)?;
            let expected_columns = dominant_column_count(&[merge_tables(&header_tables)])
                .unwrap_or(DEFAULT_COLUMN_COUNT);

            let mut pages = vec![start];
            for index in start + 1..upper {
                if header_pages.contains(&index) {
                    break;
                }
                let tables = source.extract_tables(index, self.probe_strategy)?;
                if !is_continuation_page(&tables, expected_columns) {
                    break;
                }
                pages.push(index);
            }

            debug!(
                "{} section on page(s) {:?}",
                statement,
                pages.iter().map(|p| p + 1).collect::<Vec<_>>()
            );
            sections.push(StatementSection { statement, pages });
        }

        Ok(sections)
    }
}
