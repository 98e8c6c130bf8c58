use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisclosureError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid zip archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("No .xbrl member found in zip archive: {0}")]
    NoRelevantMember(PathBuf),

    #[error("Invalid XBRL markup in {path}: {reason}")]
    MalformedMarkup { path: PathBuf, reason: String },

    #[error("Unsupported PDF layout in {path}: {reason}")]
    UnsupportedLayout { path: PathBuf, reason: String },

    #[error("Unreadable PDF {path}: {reason}")]
    UnreadablePdf { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DisclosureError>;

/// A single document that could not be parsed, reported alongside the
/// documents that were.
#[derive(Debug)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub error: DisclosureError,
}

impl std::fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}
