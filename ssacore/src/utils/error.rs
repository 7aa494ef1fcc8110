use semver::{Version, VersionReq};
use thiserror::Error;

use crate::language::Language;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file '{file}': {source}")]
    ManifestParseError {
        source: toml::de::Error,
        file: String,
    },

    #[error("Failed to serialize configuration to '{file}': {source}")]
    ManifestSerializeError {
        source: toml::ser::Error,
        file: String,
    },

    #[error("No language builder registered for '{0}'")]
    UnsupportedLanguage(Language),

    #[error("No language builder accepts file '{path}'")]
    Skipped { path: String },

    #[error("Syntax error in '{path}': {message}")]
    SyntaxError { path: String, message: String },

    #[error("Language builder panicked while building '{path}': {message}")]
    BuildPanicked { path: String, message: String },

    #[error("Failed to encode program snapshot: {0}")]
    SnapshotEncode(String),

    #[error("Failed to decode program snapshot: {0}")]
    SnapshotDecode(String),

    #[error("Invalid magic bytes in program snapshot")]
    InvalidMagic,

    #[error("Incompatible program snapshot version. Required: {required}, found: {found}")]
    VersionMismatch { required: VersionReq, found: Version },
}

impl CoreError {
    /// Whether the file was simply not handled, as opposed to failing.
    pub fn is_skipped(&self) -> bool {
        matches!(self, CoreError::Skipped { .. })
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
