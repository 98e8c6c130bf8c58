use crate::config::TableStrategy;
use crate::error::{DisclosureError, Result};
use crate::pdf::normalize::{is_empty_cell, normalize_value};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

pub type Row = Vec<String>;
pub type Table = Vec<Row>;

static CELL_GAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\t+|[ \u{3000}]{2,}").expect("valid cell gap pattern"));

/// Page-level access to an already-opened report. Implementors supply the
/// text; table reconstruction is shared.
pub trait PageSource {
    fn page_count(&self) -> usize;

    fn page_text(&self, index: usize) -> Result<String>;

    fn extract_tables(&self, index: usize, strategy: TableStrategy) -> Result<Vec<Table>> {
        Ok(tables_from_text(&self.page_text(index)?, strategy))
    }
}

/// Pages held as plain text, one entry per page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextPages {
    pages: Vec<String>,
}

impl TextPages {
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }

    /// Loads every page's text layer with `lopdf`. A PDF without any
    /// extractable text (a scan) is rejected.
    pub fn from_pdf(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DisclosureError::MissingInput(format!(
                "PDF not found: {}",
                path.display()
            )));
        }

        let document = lopdf::Document::load(path).map_err(|e| DisclosureError::UnreadablePdf {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut pages = Vec::new();
        for page_number in document.get_pages().keys() {
            let text = match document.extract_text(&[*page_number]) {
                Ok(text) => text,
                Err(e) => {
                    debug!("{}: page {} has no text: {}", path.display(), page_number, e);
                    String::new()
                }
            };
            pages.push(text);
        }

        let source = Self { pages };
        if !source.has_text() {
            return Err(DisclosureError::UnsupportedLayout {
                path: path.to_path_buf(),
                reason: "no extractable text layer".to_string(),
            });
        }
        Ok(source)
    }

    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|page| !page.trim().is_empty())
    }
}

impl PageSource for TextPages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String> {
        self.pages.get(index).cloned().ok_or_else(|| {
            DisclosureError::MissingInput(format!(
                "page {} out of range ({} pages)",
                index + 1,
                self.pages.len()
            ))
        })
    }
}

fn split_on_gaps(line: &str) -> Row {
    let mut cells: Row = CELL_GAP
        .split(line.trim_end())
        .map(|cell| cell.trim().to_string())
        .collect();
    while cells.len() > 1 && cells.last().map_or(false, |c| c.is_empty()) {
        cells.pop();
    }
    cells
}

fn is_value_token(token: &str) -> bool {
    is_empty_cell(token) || normalize_value(token, 1).is_some()
}

/// Splits a line into a label followed by the run of value-like tokens at
/// its end.
fn cluster_tokens(line: &str) -> Row {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let label_len = tokens
        .iter()
        .rposition(|token| !is_value_token(token))
        .map_or(0, |idx| idx + 1);
    if label_len == tokens.len() {
        return vec![tokens.join(" ")];
    }

    let mut row = vec![tokens[..label_len].join(" ")];
    row.extend(tokens[label_len..].iter().map(|t| t.to_string()));
    row
}

pub fn split_row(line: &str, strategy: TableStrategy) -> Row {
    match strategy {
        TableStrategy::Lines => split_on_gaps(line),
        TableStrategy::Text => cluster_tokens(line),
        TableStrategy::Hybrid => {
            let cells = split_on_gaps(line);
            if cells.len() >= 2 {
                cells
            } else {
                cluster_tokens(line)
            }
        }
    }
}

/// Rebuilds tables from page text: consecutive multi-cell lines form one
/// table, and a blank or single-cell line closes it.
pub fn tables_from_text(text: &str, strategy: TableStrategy) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut current: Table = Vec::new();

    for line in text.lines() {
        let row = if line.trim().is_empty() {
            Vec::new()
        } else {
            split_row(line, strategy)
        };
        if row.len() >= 2 {
            current.push(row);
        } else if !current.is_empty() {
            tables.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tables.push(current);
    }

    tables
}

fn row_text(row: &[String]) -> String {
    row.join(" ")
}

pub fn is_unit_row(row: &[String]) -> bool {
    let text = row_text(row);
    text.contains("単位") || text.contains("千円") || text.contains("百万円")
}

pub fn is_period_header_row(row: &[String]) -> bool {
    row.iter()
        .any(|cell| cell.contains("年度") || (cell.contains('年') && cell.contains('月')))
}

/// The most frequent row width across `tables`; the first width seen wins
/// ties.
pub fn dominant_column_count(tables: &[Table]) -> Option<usize> {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for row in tables.iter().flatten().filter(|row| !row.is_empty()) {
        match counts.iter_mut().find(|(width, _)| *width == row.len()) {
            Some((_, count)) => *count += 1,
            None => counts.push((row.len(), 1)),
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for (width, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((width, count));
        }
    }
    best.map(|(width, _)| width)
}

/// Merges every table on a page into one row list at the dominant width.
/// Unit and period header rows are kept once; data rows without a label are
/// dropped.
pub fn merge_tables(tables: &[Table]) -> Vec<Row> {
    let Some(width) = dominant_column_count(tables) else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    let mut seen_headers = HashSet::new();
    for row in tables.iter().flatten().filter(|row| row.len() == width) {
        if is_unit_row(row) || is_period_header_row(row) {
            if seen_headers.insert(row.join("|")) {
                merged.push(row.clone());
            }
            continue;
        }
        if row[0].trim().is_empty() {
            continue;
        }
        merged.push(row.clone());
    }
    merged
}
