//! Serde model of `project.assets.json`.
//!
//! Only the parts needed to rebuild the dependency graph are modelled.
//! JSON objects whose key order matters for traversal are read into
//! [`OrderedMap`] so the graph does not depend on hash ordering.

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::AssetsError;

/// A JSON object read as a list of `(key, value)` pairs in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<T>(pub Vec<(String, T)>);

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> OrderedMap<T> {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<T> {
            type Value = OrderedMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Root of `project.assets.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetsFile {
    #[serde(default)]
    pub version: u32,
    /// Target key (`net8.0`, `net8.0/win-x64`, ...) -> libraries keyed by `Name/Version`
    #[serde(default)]
    pub targets: OrderedMap<OrderedMap<TargetLibrary>>,
    #[serde(default)]
    pub project: ProjectSpec,
}

/// One resolved library inside a target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetLibrary {
    /// `package` or `project`
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Package id -> requested version range
    #[serde(default)]
    pub dependencies: OrderedMap<String>,
}

impl TargetLibrary {
    pub fn is_package(&self) -> bool {
        self.kind.eq_ignore_ascii_case("package")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    #[serde(default)]
    pub restore: RestoreSpec,
    #[serde(default)]
    pub frameworks: OrderedMap<FrameworkSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSpec {
    pub project_name: Option<String>,
    pub project_path: Option<String>,
    /// Feed endpoint -> settings (unused)
    #[serde(default)]
    pub sources: OrderedMap<IgnoredAny>,
}

/// A target framework declared by the project.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkSpec {
    pub target_alias: Option<String>,
    #[serde(default)]
    pub dependencies: OrderedMap<DependencySpec>,
}

/// A package or project reference declared for a framework.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencySpec {
    /// `Package` or `Project`
    pub target: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub auto_referenced: bool,
}

impl DependencySpec {
    pub fn is_package(&self) -> bool {
        self.target
            .as_deref()
            .map_or(true, |t| t.eq_ignore_ascii_case("package"))
    }
}

impl AssetsFile {
    pub fn parse(json: &str) -> Result<Self, AssetsError> {
        serde_json::from_str(json).map_err(AssetsError::Json)
    }

    pub fn from_path(path: &Path) -> Result<Self, AssetsError> {
        let text = std::fs::read_to_string(path).map_err(|source| AssetsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Feed endpoints in the order restore used them.
    pub fn sources(&self) -> Vec<String> {
        self.project
            .restore
            .sources
            .keys()
            .map(str::to_string)
            .collect()
    }

    /// Find the libraries restored for a framework.
    ///
    /// Matches the framework key or its alias against the target keys,
    /// ignoring runtime-specific targets (`tfm/rid`). Short and long framework
    /// names compare equal (`netstandard2.0` and `.NETStandard,Version=v2.0`).
    /// A project with a single framework and a single target is paired even
    /// when the names differ.
    pub fn target_for(
        &self,
        framework: &str,
        spec: &FrameworkSpec,
    ) -> Option<&OrderedMap<TargetLibrary>> {
        let targets: Vec<(&str, &OrderedMap<TargetLibrary>)> = self
            .targets
            .iter()
            .filter(|(key, _)| !key.contains('/'))
            .collect();

        let mut wanted = vec![canonical_framework(framework)];
        if let Some(alias) = spec.target_alias.as_deref() {
            wanted.push(canonical_framework(alias));
        }

        if let Some((_, target)) = targets
            .iter()
            .find(|(key, _)| wanted.contains(&canonical_framework(key)))
        {
            return Some(*target);
        }

        if self.project.frameworks.len() == 1 && targets.len() == 1 {
            return Some(targets[0].1);
        }
        None
    }
}

/// Long, lower-cased form of a target framework moniker.
///
/// `netstandard2.0` -> `.netstandard,version=v2.0`,
/// `netcoreapp3.1` and `net8.0` -> `.netcoreapp,version=v3.1` / `v8.0`,
/// `net472` -> `.netframework,version=v4.7.2`. Anything else is only
/// lower-cased.
fn canonical_framework(name: &str) -> String {
    let name = name.trim().to_ascii_lowercase();
    if name.starts_with('.') {
        return name;
    }

    let long = |family: &str, version: &str| format!(".{family},version=v{version}");
    let is_version = |v: &str| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit() || c == '.');

    if let Some(version) = name.strip_prefix("netstandard") {
        if is_version(version) {
            return long("netstandard", version);
        }
    } else if let Some(version) = name.strip_prefix("netcoreapp") {
        if is_version(version) {
            return long("netcoreapp", version);
        }
    } else if let Some(version) = name.strip_prefix("net") {
        if is_version(version) && version.contains('.') {
            // net5.0 and later
            return long("netcoreapp", version);
        }
        if is_version(version) {
            let dotted: Vec<String> = version.chars().map(String::from).collect();
            return long("netframework", &dotted.join("."));
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSETS: &str = r#"{
        "version": 3,
        "targets": {
            "net8.0": {
                "Zeta/1.0.0": { "type": "package", "dependencies": { "B": "1.0.0", "A": "2.0.0" } },
                "Alpha/2.0.0": { "type": "package" },
                "Lib/1.0.0": { "type": "project" }
            },
            "net8.0/win-x64": {}
        },
        "project": {
            "restore": {
                "projectName": "App",
                "projectPath": "/src/App/App.csproj",
                "sources": { "https://api.nuget.org/v3/index.json": {}, "/feeds/local": { "x": 1 } }
            },
            "frameworks": {
                "net8.0": {
                    "targetAlias": "net8.0",
                    "dependencies": {
                        "Zeta": { "target": "Package", "version": "[1.0.0, )" }
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_parse_keeps_file_order() {
        let assets = AssetsFile::parse(ASSETS).unwrap();
        let target = assets.targets.get("net8.0").unwrap();
        let names: Vec<&str> = target.keys().collect();
        assert_eq!(names, vec!["Zeta/1.0.0", "Alpha/2.0.0", "Lib/1.0.0"]);

        let zeta = target.get("Zeta/1.0.0").unwrap();
        let deps: Vec<&str> = zeta.dependencies.keys().collect();
        assert_eq!(deps, vec!["B", "A"]);
        assert!(!target.get("Lib/1.0.0").unwrap().is_package());
    }

    #[test]
    fn test_sources_in_order() {
        let assets = AssetsFile::parse(ASSETS).unwrap();
        assert_eq!(
            assets.sources(),
            vec!["https://api.nuget.org/v3/index.json", "/feeds/local"]
        );
    }

    #[test]
    fn test_target_for_ignores_runtime_targets() {
        let assets = AssetsFile::parse(ASSETS).unwrap();
        let spec = assets.project.frameworks.get("net8.0").unwrap();
        let target = assets.target_for("net8.0", spec).unwrap();
        assert_eq!(target.len(), 3);
    }

    #[test]
    fn test_target_for_legacy_framework_name() {
        let json = r#"{
            "targets": { ".NETCoreApp,Version=v3.1": { "A/1.0.0": { "type": "package" } } },
            "project": { "frameworks": { "netcoreapp3.1": { "dependencies": {} } } }
        }"#;
        let assets = AssetsFile::parse(json).unwrap();
        let spec = assets.project.frameworks.get("netcoreapp3.1").unwrap();
        assert!(assets.target_for("netcoreapp3.1", spec).is_some());
    }

    #[test]
    fn test_target_for_multi_target_long_names() {
        let json = r#"{
            "targets": {
                ".NETStandard,Version=v2.0": { "A/1.0.0": { "type": "package" } },
                ".NETFramework,Version=v4.7.2": { "B/1.0.0": { "type": "package" } },
                "net8.0": { "C/1.0.0": { "type": "package" } }
            },
            "project": {
                "frameworks": {
                    "netstandard2.0": { "targetAlias": "netstandard2.0", "dependencies": {} },
                    "net472": { "targetAlias": "net472", "dependencies": {} },
                    "net8.0": { "targetAlias": "net8.0", "dependencies": {} }
                }
            }
        }"#;
        let assets = AssetsFile::parse(json).unwrap();
        let first_library = |framework: &str| {
            let spec = assets.project.frameworks.get(framework).unwrap();
            let target = assets.target_for(framework, spec).unwrap();
            target.keys().next().unwrap().to_string()
        };
        assert_eq!(first_library("netstandard2.0"), "A/1.0.0");
        assert_eq!(first_library("net472"), "B/1.0.0");
        assert_eq!(first_library("net8.0"), "C/1.0.0");
    }

    #[test]
    fn test_canonical_framework() {
        assert_eq!(canonical_framework("netstandard2.1"), ".netstandard,version=v2.1");
        assert_eq!(canonical_framework("netcoreapp3.1"), ".netcoreapp,version=v3.1");
        assert_eq!(canonical_framework("net6.0"), ".netcoreapp,version=v6.0");
        assert_eq!(canonical_framework("net48"), ".netframework,version=v4.8");
        assert_eq!(
            canonical_framework(".NETCoreApp,Version=v3.1"),
            ".netcoreapp,version=v3.1"
        );
        assert_eq!(canonical_framework("net8.0-windows"), "net8.0-windows");
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            AssetsFile::parse("{ \"targets\": [] }"),
            Err(AssetsError::Json(_))
        ));
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.assets.json");
        assert!(matches!(
            AssetsFile::from_path(&path),
            Err(AssetsError::Io { .. })
        ));
    }
}
