use crate::error::{DisclosureError, Result};
use crate::schema::Provenance;
use crate::utils::parse_iso_date;
use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// EDINET document type code of a half-year report (半期報告書).
pub const HALF_YEAR_DOC_TYPE: &str = "160";

fn code_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(code)) if !code.trim().is_empty() => {
            Some(code.trim().to_string())
        }
        Some(serde_json::Value::Number(code)) => Some(code.to_string()),
        _ => None,
    })
}

/// One collected document as described by the upstream collector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub doc_id: Option<String>,
    #[serde(default, deserialize_with = "code_from_string_or_number")]
    pub doc_type_code: Option<String>,
    #[serde(default)]
    pub doc_description: Option<String>,
    /// Stated period end (`YYYY-MM-DD`). For a half-year report this is the
    /// fiscal-year-end date the report may be mislabeled with.
    #[serde(default)]
    pub period_end: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub endpoint_or_doc_id: Option<String>,
    #[serde(default)]
    pub fetched_at: Option<String>,
}

impl ManifestEntry {
    pub fn file_name(&self) -> Option<&str> {
        self.file_path
            .as_deref()
            .and_then(|path| Path::new(path).file_name())
            .and_then(|name| name.to_str())
    }

    /// The explicit document type code, or `"160"` when the description
    /// names a half-year report (and not a quarterly one).
    pub fn doc_type_code(&self) -> Option<&str> {
        if let Some(code) = self.doc_type_code.as_deref() {
            return Some(code);
        }
        let description = self.doc_description.as_deref()?;
        if description.contains("半期報告書") && !description.contains("四半期報告書") {
            Some(HALF_YEAR_DOC_TYPE)
        } else {
            None
        }
    }

    pub fn is_half_year_report(&self) -> bool {
        self.doc_type_code() == Some(HALF_YEAR_DOC_TYPE)
    }

    /// Fiscal-year-end date to correct against, for half-year reports only.
    pub fn half_year_hint(&self) -> Option<NaiveDate> {
        if !self.is_half_year_report() {
            return None;
        }
        self.period_end.as_deref().and_then(parse_iso_date)
    }

    pub fn provenance(&self) -> Provenance {
        Provenance {
            source: self.source.clone(),
            endpoint_or_doc_id: self.endpoint_or_doc_id.clone(),
            fetched_at: self.fetched_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub results: Vec<ManifestEntry>,
    #[serde(default)]
    pub matched_doc_count: Option<usize>,
}

impl Manifest {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads `manifest.json` from `dir`. A missing manifest is `None`; an
    /// unreadable one is logged and treated as missing.
    pub fn load(dir: &Path) -> Option<Self> {
        let path = dir.join(MANIFEST_FILE_NAME);
        if !path.is_file() {
            return None;
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(DisclosureError::from)
            .and_then(|contents| Self::from_json_str(&contents));
        match parsed {
            Ok(manifest) => {
                debug!(
                    "Loaded {} with {} entries",
                    path.display(),
                    manifest.results.len()
                );
                Some(manifest)
            }
            Err(e) => {
                warn!("Ignoring unreadable manifest {}: {}", path.display(), e);
                None
            }
        }
    }

    /// The entry whose `file_path` names `file_name`.
    pub fn entry_for(&self, file_name: &str) -> Option<&ManifestEntry> {
        self.results
            .iter()
            .find(|entry| entry.file_name() == Some(file_name))
    }

    /// File name to document id, for entries carrying both.
    pub fn doc_id_map(&self) -> HashMap<String, String> {
        self.results
            .iter()
            .filter_map(|entry| {
                let name = entry.file_name()?;
                let doc_id = entry.doc_id.as_deref().filter(|id| !id.is_empty())?;
                Some((name.to_string(), doc_id.to_string()))
            })
            .collect()
    }

    pub fn doc_id_for(&self, file_name: &str) -> Option<&str> {
        self.entry_for(file_name)
            .and_then(|entry| entry.doc_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Compares `matched_doc_count` with the mapped entries and, when given,
    /// the number of discovered files. Mismatches are logged and returned.
    pub fn check_counts(&self, discovered: Option<usize>) -> Vec<String> {
        let Some(expected) = self.matched_doc_count else {
            return Vec::new();
        };

        let mut mismatches = Vec::new();
        let mapped = self.doc_id_map().len();
        if mapped != expected {
            mismatches.push(format!(
                "manifest.matched_doc_count={} but found {} file_path entries",
                expected, mapped
            ));
        }
        if let Some(found) = discovered {
            if found != expected {
                mismatches.push(format!(
                    "Found {} documents but manifest.matched_doc_count={}",
                    found, expected
                ));
            }
        }

        for message in &mismatches {
            warn!("{}", message);
        }
        mismatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MANIFEST: &str = r#"{
        "matched_doc_count": 2,
        "results": [
            {
                "file_path": "data/raw/7203_有価証券報告書_2024.pdf",
                "doc_id": "S100ABCD",
                "doc_type_code": 120,
                "period_end": "2024-03-31",
                "source": "edinet",
                "endpoint_or_doc_id": "S100ABCD",
                "fetched_at": "2025-01-01T00:00:00Z"
            },
            {
                "file_path": "data/raw/7203_半期報告書_2025.pdf",
                "doc_id": "S100WXYZ",
                "doc_description": "半期報告書－第121期(2024/04/01－2025/03/31)",
                "period_end": "2025-03-31",
                "extra": true
            }
        ]
    }"#;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_entries_and_doc_id_map() {
        let manifest = Manifest::from_json_str(MANIFEST).unwrap();
        assert_eq!(manifest.results.len(), 2);

        let map = manifest.doc_id_map();
        assert_eq!(map.get("7203_有価証券報告書_2024.pdf").map(String::as_str), Some("S100ABCD"));
        assert_eq!(manifest.doc_id_for("7203_半期報告書_2025.pdf"), Some("S100WXYZ"));
        assert_eq!(manifest.doc_id_for("unknown.pdf"), None);
    }

    #[test]
    fn test_doc_type_code_inference() {
        let manifest = Manifest::from_json_str(MANIFEST).unwrap();
        assert_eq!(manifest.results[0].doc_type_code(), Some("120"));
        assert_eq!(manifest.results[1].doc_type_code(), Some(HALF_YEAR_DOC_TYPE));

        let quarterly = ManifestEntry {
            doc_description: Some("四半期報告書－第120期第2四半期".to_string()),
            ..Default::default()
        };
        assert_eq!(quarterly.doc_type_code(), None);
        assert!(!quarterly.is_half_year_report());
    }

    #[test]
    fn test_half_year_hint_only_for_half_year_reports() {
        let manifest = Manifest::from_json_str(MANIFEST).unwrap();
        assert_eq!(manifest.results[0].half_year_hint(), None);
        assert_eq!(manifest.results[1].half_year_hint(), Some(date(2025, 3, 31)));
    }

    #[test]
    fn test_provenance() {
        let manifest = Manifest::from_json_str(MANIFEST).unwrap();
        let provenance = manifest.results[0].provenance();
        assert_eq!(provenance.source.as_deref(), Some("edinet"));
        assert_eq!(provenance.fetched_at.as_deref(), Some("2025-01-01T00:00:00Z"));
        assert_eq!(manifest.results[1].provenance(), Provenance::default());
    }

    #[test]
    fn test_count_mismatches_are_reported() {
        let manifest = Manifest::from_json_str(MANIFEST).unwrap();
        assert!(manifest.check_counts(Some(2)).is_empty());
        assert_eq!(manifest.check_counts(Some(3)).len(), 1);

        let manifest = Manifest {
            matched_doc_count: Some(5),
            ..manifest
        };
        assert_eq!(manifest.check_counts(Some(2)).len(), 2);
        assert!(Manifest::default().check_counts(Some(9)).is_empty());
    }

    #[test]
    fn test_load_missing_and_unreadable() {
        let dir = tempdir().unwrap();
        assert_eq!(Manifest::load(dir.path()), None);

        std::fs::write(dir.path().join(MANIFEST_FILE_NAME), "{ not json").unwrap();
        assert_eq!(Manifest::load(dir.path()), None);

        std::fs::write(dir.path().join(MANIFEST_FILE_NAME), MANIFEST).unwrap();
        assert_eq!(Manifest::load(dir.path()).unwrap().results.len(), 2);
    }
}
