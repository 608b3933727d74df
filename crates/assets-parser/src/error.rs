//! Error types for assets-parser.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to read or decode a restore metadata file.
#[derive(Debug, Error)]
pub enum AssetsError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed restore metadata: {0}")]
    Json(#[source] serde_json::Error),
}

/// A framework whose dependency graph could not be built.
///
/// Fatal for that framework only; the other frameworks of the project are
/// still built.
#[derive(Debug)]
pub struct GraphError {
    profile: String,
    kind: GraphErrorKind,
    source: anyhow::Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphErrorKind {
    /// No restored target for the framework
    MissingTarget,
    /// A direct reference has no restored library
    MissingLibrary(String),
    /// A restored version is not a valid version
    InvalidVersion(String),
    /// A requested range is not a valid range
    InvalidRange(String),
}

impl GraphError {
    pub fn missing_target(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            kind: GraphErrorKind::MissingTarget,
            source: anyhow::anyhow!("target not present in restore metadata"),
        }
    }

    pub fn missing_library(profile: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            kind: GraphErrorKind::MissingLibrary(package.into()),
            source: anyhow::anyhow!("package not present in restored libraries"),
        }
    }

    pub fn invalid_version(
        profile: impl Into<String>,
        package: impl Into<String>,
        e: impl Into<anyhow::Error>,
    ) -> Self {
        Self {
            profile: profile.into(),
            kind: GraphErrorKind::InvalidVersion(package.into()),
            source: e.into(),
        }
    }

    pub fn invalid_range(
        profile: impl Into<String>,
        package: impl Into<String>,
        e: impl Into<anyhow::Error>,
    ) -> Self {
        Self {
            profile: profile.into(),
            kind: GraphErrorKind::InvalidRange(package.into()),
            source: e.into(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn kind(&self) -> &GraphErrorKind {
        &self.kind
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            GraphErrorKind::MissingTarget => {
                write!(f, "no restored target for `{}`: {}", self.profile, self.source)
            }
            GraphErrorKind::MissingLibrary(package) => write!(
                f,
                "`{}` in `{}`: {}",
                package, self.profile, self.source
            ),
            GraphErrorKind::InvalidVersion(package) => write!(
                f,
                "invalid resolved version of `{}` in `{}`: {}",
                package, self.profile, self.source
            ),
            GraphErrorKind::InvalidRange(package) => write!(
                f,
                "invalid requested range of `{}` in `{}`: {}",
                package, self.profile, self.source
            ),
        }
    }
}

impl std::error::Error for GraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}
