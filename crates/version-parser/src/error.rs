//! Error types for version-parser.

use thiserror::Error;

/// Errors raised while parsing versions, ranges and policy modes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The string is not a version number
    #[error("invalid version `{0}`")]
    InvalidVersion(String),

    /// The pre-release label is not a valid dot-separated identifier list
    #[error("invalid pre-release label `{label}` in version `{version}`")]
    InvalidPrerelease { version: String, label: String },

    /// The string is not a version range
    #[error("invalid version range `{0}`")]
    InvalidRange(String),

    /// Unknown policy mode name
    #[error("unknown {kind} `{value}`, expected one of: {expected}")]
    UnknownMode {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },
}
