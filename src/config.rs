use crate::error::{DisclosureError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// What a batch parse does when one document fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchPolicy {
    #[schemars(description = "Stop the batch and return the first document error.")]
    Abort,
    #[schemars(description = "Log the failure, record it, and keep parsing the remaining documents.")]
    Continue,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::Abort
    }
}

/// A table reconstruction configuration applied to the text of a page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TableStrategy {
    #[schemars(description = "Split rows on tabs or runs of two or more spaces.")]
    Lines,
    #[schemars(description = "Cluster whitespace tokens into a label followed by value-like cells.")]
    Text,
    #[schemars(description = "Line splitting, falling back to token clustering per row.")]
    Hybrid,
}

impl TableStrategy {
    pub fn label(self) -> &'static str {
        match self {
            TableStrategy::Lines => "lines",
            TableStrategy::Text => "text",
            TableStrategy::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for TableStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn default_max_statement_pages() -> usize {
    10
}

fn default_strategies() -> Vec<TableStrategy> {
    vec![
        TableStrategy::Lines,
        TableStrategy::Text,
        TableStrategy::Hybrid,
    ]
}

fn default_half_year_correction() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    #[serde(default)]
    pub batch_policy: BatchPolicy,

    #[serde(default = "default_max_statement_pages")]
    #[schemars(description = "Maximum number of pages a single statement section may span.")]
    pub max_statement_pages: usize,

    #[serde(default = "default_strategies")]
    #[schemars(description = "Table strategies in evaluation order. Earlier entries win ties.")]
    pub strategies: Vec<TableStrategy>,

    #[serde(default = "default_half_year_correction")]
    pub half_year_correction: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_policy: BatchPolicy::default(),
            max_statement_pages: default_max_statement_pages(),
            strategies: default_strategies(),
            half_year_correction: default_half_year_correction(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.strategies.is_empty() {
            return Err(DisclosureError::Configuration(
                "at least one table strategy is required".to_string(),
            ));
        }
        if self.max_statement_pages == 0 {
            return Err(DisclosureError::Configuration(
                "max_statement_pages must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.batch_policy, BatchPolicy::Abort);
        assert_eq!(config.max_statement_pages, 10);
        assert_eq!(
            config.strategies,
            vec![TableStrategy::Lines, TableStrategy::Text, TableStrategy::Hybrid]
        );
        assert!(config.half_year_correction);
    }

    #[test]
    fn test_partial_override() {
        let config =
            EngineConfig::from_json_str(r#"{"batch_policy": "continue", "strategies": ["text"]}"#)
                .unwrap();
        assert_eq!(config.batch_policy, BatchPolicy::Continue);
        assert_eq!(config.strategies, vec![TableStrategy::Text]);
        assert_eq!(config.max_statement_pages, 10);
    }

    #[test]
    fn test_validation_rejects_empty_strategies_and_zero_pages() {
        let err = EngineConfig::from_json_str(r#"{"strategies": []}"#).unwrap_err();
        assert!(matches!(err, DisclosureError::Configuration(_)));

        let err = EngineConfig::from_json_str(r#"{"max_statement_pages": 0}"#).unwrap_err();
        assert!(matches!(err, DisclosureError::Configuration(_)));
    }

    #[test]
    fn test_unknown_strategy_is_a_serialization_error() {
        let err = EngineConfig::from_json_str(r#"{"strategies": ["stream"]}"#).unwrap_err();
        assert!(matches!(err, DisclosureError::SerializationError(_)));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"half_year_correction": false}"#).unwrap();

        let config = EngineConfig::from_path(&path).unwrap();
        assert!(!config.half_year_correction);

        let missing = EngineConfig::from_path(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, DisclosureError::IoError(_)));
    }
}
