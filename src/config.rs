use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::entity::{Dependency, PrereleaseMode, VersionLock, VersionPolicy};

const DEFAULT_DOTNET: &str = "dotnet";
const DEFAULT_TRANSITIVE_DEPTH: i64 = 1;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("transitive depth must not be negative, got {0}")]
    NegativeDepth(i64),

    #[error("{0} filter must not be empty")]
    EmptyFilter(&'static str),

    #[error("config file {}: {reason}", path.display())]
    ConfigFile { path: PathBuf, reason: String },
}

/// Settings as written in a config file or given on the command line.
///
/// Every field is optional; command line values win over the file.
#[derive(Default, Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserConfig {
    pub transitive: Option<bool>,
    pub transitive_depth: Option<i64>,
    pub pre_release: Option<PrereleaseMode>,
    pub version_lock: Option<VersionLock>,
    pub include_auto_references: Option<bool>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub restore: Option<bool>,
    pub fail_on_updates: Option<bool>,
    pub output: Option<PathBuf>,
    pub dotnet_path: Option<String>,
}

impl UserConfig {
    pub fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::ConfigFile {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))
    }

    /// Values set in `self` win, unset ones fall back to `base`.
    /// Name filters are additive.
    pub fn merge(self, base: UserConfig) -> UserConfig {
        let mut include = base.include;
        include.extend(self.include);
        let mut exclude = base.exclude;
        exclude.extend(self.exclude);

        UserConfig {
            transitive: self.transitive.or(base.transitive),
            transitive_depth: self.transitive_depth.or(base.transitive_depth),
            pre_release: self.pre_release.or(base.pre_release),
            version_lock: self.version_lock.or(base.version_lock),
            include_auto_references: self
                .include_auto_references
                .or(base.include_auto_references),
            include,
            exclude,
            restore: self.restore.or(base.restore),
            fail_on_updates: self.fail_on_updates.or(base.fail_on_updates),
            output: self.output.or(base.output),
            dotnet_path: self.dotnet_path.or(base.dotnet_path),
        }
    }
}

/// Which dependencies are resolved and reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyFilter {
    pub max_depth: u32,
    pub include_auto_references: bool,
    /// Lower-cased substrings, empty means every package
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl DependencyFilter {
    pub fn accepts(&self, dep: &Dependency) -> bool {
        if dep.depth > self.max_depth {
            return false;
        }
        if dep.is_auto_referenced && !self.include_auto_references {
            return false;
        }
        let name = dep.name.to_ascii_lowercase();
        if !self.include.is_empty() && !self.include.iter().any(|i| name.contains(i.as_str())) {
            return false;
        }
        !self.exclude.iter().any(|e| name.contains(e.as_str()))
    }
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub policy: VersionPolicy,
    pub transitive: bool,
    pub transitive_depth: u32,
    pub filter: DependencyFilter,
    pub restore: bool,
    pub fail_on_updates: bool,
    pub output: Option<PathBuf>,
    pub dotnet_path: String,
}

impl Config {
    /// Merge command line values over the optional config file and validate.
    pub fn load(cli: UserConfig, file: Option<&Path>) -> Result<Config, ValidationError> {
        let user = match file {
            Some(path) => cli.merge(UserConfig::from_path(path)?),
            None => cli,
        };
        debug!("config {:?}", user);
        Config::try_from(user)
    }
}

impl TryFrom<UserConfig> for Config {
    type Error = ValidationError;

    fn try_from(user: UserConfig) -> Result<Self, Self::Error> {
        let depth = user.transitive_depth.unwrap_or(DEFAULT_TRANSITIVE_DEPTH);
        if depth < 0 {
            return Err(ValidationError::NegativeDepth(depth));
        }
        let transitive_depth = u32::try_from(depth).unwrap_or(u32::MAX);

        let normalize = |kind: &'static str, filters: Vec<String>| {
            filters
                .into_iter()
                .map(|f| {
                    let f = f.trim().to_ascii_lowercase();
                    if f.is_empty() {
                        Err(ValidationError::EmptyFilter(kind))
                    } else {
                        Ok(f)
                    }
                })
                .collect::<Result<Vec<_>, _>>()
        };
        let include = normalize("include", user.include)?;
        let exclude = normalize("exclude", user.exclude)?;

        let transitive = user.transitive.unwrap_or(false);
        Ok(Config {
            policy: VersionPolicy::new(
                user.pre_release.unwrap_or_default(),
                user.version_lock.unwrap_or_default(),
            ),
            transitive,
            transitive_depth,
            filter: DependencyFilter {
                max_depth: if transitive { transitive_depth } else { 0 },
                include_auto_references: user.include_auto_references.unwrap_or(false),
                include,
                exclude,
            },
            restore: user.restore.unwrap_or(true),
            fail_on_updates: user.fail_on_updates.unwrap_or(false),
            output: user.output,
            dotnet_path: user
                .dotnet_path
                .unwrap_or_else(|| DEFAULT_DOTNET.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Version, VersionRange};

    fn dep(name: &str, depth: u32) -> Dependency {
        let version: Version = "1.0.0".parse().unwrap();
        if depth == 0 {
            Dependency::direct(name, VersionRange::any(), version)
        } else {
            Dependency::transitive(name, VersionRange::any(), version, depth)
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::try_from(UserConfig::default()).unwrap();
        assert_eq!(config.policy, VersionPolicy::default());
        assert!(!config.transitive);
        assert_eq!(config.transitive_depth, 1);
        assert_eq!(config.filter.max_depth, 0);
        assert!(config.restore);
        assert_eq!(config.dotnet_path, "dotnet");
    }

    #[test]
    fn test_negative_depth() {
        let user = UserConfig {
            transitive_depth: Some(-1),
            ..Default::default()
        };
        assert!(matches!(
            Config::try_from(user),
            Err(ValidationError::NegativeDepth(-1))
        ));
    }

    #[test]
    fn test_empty_filter() {
        let user = UserConfig {
            exclude: vec!["  ".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            Config::try_from(user),
            Err(ValidationError::EmptyFilter("exclude"))
        ));
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appraiser.json");
        std::fs::write(
            &path,
            r#"{ "versionLock": "minor", "preRelease": "Always", "transitiveDepth": 3, "include": ["Microsoft"] }"#,
        )
        .unwrap();

        let cli = UserConfig {
            version_lock: Some(VersionLock::Major),
            transitive: Some(true),
            include: vec!["System".to_string()],
            ..Default::default()
        };
        let config = Config::load(cli, Some(&path)).unwrap();
        assert_eq!(config.policy.lock, VersionLock::Major);
        assert_eq!(config.policy.prerelease, PrereleaseMode::Always);
        assert_eq!(config.filter.max_depth, 3);
        assert_eq!(config.filter.include, vec!["microsoft", "system"]);
    }

    #[test]
    fn test_malformed_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appraiser.json");
        std::fs::write(&path, "{ \"versionLock\": \"patch\" }").unwrap();
        assert!(matches!(
            Config::load(UserConfig::default(), Some(&path)),
            Err(ValidationError::ConfigFile { .. })
        ));
        assert!(matches!(
            Config::load(UserConfig::default(), Some(&dir.path().join("missing.json"))),
            Err(ValidationError::ConfigFile { .. })
        ));
    }

    #[test]
    fn test_filter_accepts() {
        let filter = DependencyFilter {
            max_depth: 1,
            include_auto_references: false,
            include: vec![],
            exclude: vec!["analyzers".to_string()],
        };
        assert!(filter.accepts(&dep("Newtonsoft.Json", 0)));
        assert!(filter.accepts(&dep("System.Memory", 1)));
        assert!(!filter.accepts(&dep("System.Buffers", 2)));
        assert!(!filter.accepts(&dep("Microsoft.CodeAnalysis.Analyzers", 0)));

        let mut auto = dep("Microsoft.NETCore.App.Ref", 0);
        auto.is_auto_referenced = true;
        assert!(!filter.accepts(&auto));

        let only_serilog = DependencyFilter {
            include: vec!["serilog".to_string()],
            ..filter
        };
        assert!(only_serilog.accepts(&dep("Serilog.Sinks.Console", 0)));
        assert!(!only_serilog.accepts(&dep("Newtonsoft.Json", 0)));
    }
}
