//! NuGet version ranges.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::VersionError;
use crate::version::Version;

/// A version constraint in NuGet interval notation.
///
/// | Notation | Meaning |
/// |----------|---------|
/// | `1.0` | `1.0 <= v` |
/// | `[1.0]` | `v == 1.0` |
/// | `[1.0,2.0)` | `1.0 <= v < 2.0` |
/// | `(1.0,)` | `1.0 < v` |
/// | `(,2.0]` | `v <= 2.0` |
/// | `1.*`, `1.0.0-*`, `*` | floating: lower bound from the prefix |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    min: Option<Version>,
    min_inclusive: bool,
    max: Option<Version>,
    max_inclusive: bool,
    text: String,
}

impl VersionRange {
    /// The range accepting every version.
    pub fn any() -> Self {
        Self {
            min: None,
            min_inclusive: false,
            max: None,
            max_inclusive: false,
            text: "*".to_string(),
        }
    }

    pub fn min(&self) -> Option<&Version> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&Version> {
        self.max.as_ref()
    }

    pub fn satisfies(&self, version: &Version) -> bool {
        let above_min = match &self.min {
            Some(min) if self.min_inclusive => version >= min,
            Some(min) => version > min,
            None => true,
        };
        let below_max = match &self.max {
            Some(max) if self.max_inclusive => version <= max,
            Some(max) => version < max,
            None => true,
        };
        above_min && below_max
    }

    fn parse_interval(text: &str, original: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidRange(original.to_string());

        let min_inclusive = text.starts_with('[');
        let max_inclusive = text.ends_with(']');
        if !(text.ends_with(']') || text.ends_with(')')) || text.len() < 2 {
            return Err(invalid());
        }
        let inner = &text[1..text.len() - 1];

        let Some((lower, upper)) = inner.split_once(',') else {
            // exact match, only valid with inclusive brackets
            if !(min_inclusive && max_inclusive) || inner.is_empty() {
                return Err(invalid());
            }
            let version: Version = inner.parse().map_err(|_| invalid())?;
            return Ok(Self {
                min: Some(version.clone()),
                min_inclusive: true,
                max: Some(version),
                max_inclusive: true,
                text: original.to_string(),
            });
        };

        let parse_bound = |bound: &str| -> Result<Option<Version>, VersionError> {
            if bound.is_empty() {
                Ok(None)
            } else {
                bound.parse().map(Some).map_err(|_| invalid())
            }
        };
        let min = parse_bound(lower)?;
        let max = parse_bound(upper)?;

        if let (Some(min), Some(max)) = (&min, &max) {
            if min > max || (min == max && !(min_inclusive && max_inclusive)) {
                return Err(invalid());
            }
        }

        Ok(Self {
            min,
            min_inclusive,
            max,
            max_inclusive,
            text: original.to_string(),
        })
    }

    /// `*`, `1.*`, `1.0.*`, `1.0.0-*`, `*-*`, `1.*-*`, `1.0.0-beta*`.
    ///
    /// The lower bound is the prefix with the lowest matching pre-release
    /// label; floating ranges have no upper bound.
    fn parse_floating(text: &str, original: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidRange(original.to_string());

        if text == "*" || text == "*-*" {
            return Ok(Self {
                text: original.to_string(),
                ..Self::any()
            });
        }

        let (release, label) = match text.split_once('-') {
            Some((release, label)) => (release, Some(label)),
            None => (text, None),
        };

        let floating_release = release == "*" || release.ends_with(".*");
        let min: Version = if release == "*" {
            Version::new(0, 0, 0)
        } else if let Some(prefix) = release.strip_suffix(".*") {
            prefix.parse().map_err(|_| invalid())?
        } else {
            release.parse().map_err(|_| invalid())?
        };

        let min = match label {
            None if floating_release => min,
            None => return Err(invalid()),
            Some(label) => {
                let stem = label.strip_suffix('*').ok_or_else(invalid)?;
                if stem.contains('*') {
                    return Err(invalid());
                }
                // lowest pre-release starting with the stem
                let stem = stem.trim_end_matches(['.', '-']);
                let lowest = if stem.is_empty() { "0" } else { stem };
                min.with_prerelease(lowest).map_err(|_| invalid())?
            }
        };

        Ok(Self {
            min: Some(min),
            min_inclusive: true,
            max: None,
            max_inclusive: false,
            text: original.to_string(),
        })
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let original = s.trim();
        let compact: String = original.chars().filter(|c| !c.is_whitespace()).collect();

        if compact.is_empty() {
            return Err(VersionError::InvalidRange(s.to_string()));
        }
        if compact.starts_with('[') || compact.starts_with('(') {
            return Self::parse_interval(&compact, original);
        }
        if compact.contains('*') {
            return Self::parse_floating(&compact, original);
        }

        let min: Version = compact
            .parse()
            .map_err(|_| VersionError::InvalidRange(s.to_string()))?;
        Ok(Self {
            min: Some(min),
            min_inclusive: true,
            max: None,
            max_inclusive: false,
            text: original.to_string(),
        })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn r(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    #[test]
    fn test_bare_version_is_minimum() {
        let range = r("1.0");
        assert!(range.satisfies(&v("1.0.0")));
        assert!(range.satisfies(&v("5.0.0")));
        assert!(!range.satisfies(&v("0.9.9")));
    }

    #[test]
    fn test_open_ended_interval() {
        let range = r("[1.0.0, )");
        assert!(range.satisfies(&v("1.0.0")));
        assert!(range.satisfies(&v("2.0.0")));
        assert!(!range.satisfies(&v("1.0.0-rc.1")));
        assert_eq!(range.to_string(), "[1.0.0, )");
    }

    #[test]
    fn test_exact() {
        let range = r("[1.2.0]");
        assert!(range.satisfies(&v("1.2.0")));
        assert!(!range.satisfies(&v("1.2.1")));
        assert_eq!(range.min(), range.max());
    }

    #[test]
    fn test_bounded_intervals() {
        let range = r("[1.0,2.0)");
        assert!(range.satisfies(&v("1.9.9")));
        assert!(!range.satisfies(&v("2.0.0")));

        let range = r("(1.0,2.0]");
        assert!(!range.satisfies(&v("1.0.0")));
        assert!(range.satisfies(&v("2.0.0")));

        let range = r("(,2.0]");
        assert!(range.satisfies(&v("0.0.1")));
        assert!(!range.satisfies(&v("2.0.1")));
    }

    #[test]
    fn test_floating() {
        let range = r("1.*");
        assert!(range.satisfies(&v("1.0.0")));
        assert!(range.satisfies(&v("3.0.0")));
        assert!(!range.satisfies(&v("0.9.0")));

        let range = r("2.0.0-*");
        assert!(range.satisfies(&v("2.0.0-alpha")));
        assert!(!range.satisfies(&v("1.9.0")));

        assert!(r("*").satisfies(&v("0.0.1-alpha")));
    }

    #[test]
    fn test_floating_prerelease() {
        let range = r("*-*");
        assert!(range.satisfies(&v("0.1.0-alpha")));
        assert!(range.satisfies(&v("9.0.0")));

        let range = r("1.*-*");
        assert!(range.satisfies(&v("1.0.0-alpha")));
        assert!(range.satisfies(&v("1.4.0-rc.1")));
        assert!(!range.satisfies(&v("0.9.0")));

        let range = r("1.0.0-beta*");
        assert!(range.satisfies(&v("1.0.0-beta")));
        assert!(range.satisfies(&v("1.0.0-beta.2")));
        assert!(range.satisfies(&v("1.0.0")));
        assert!(!range.satisfies(&v("1.0.0-alpha")));

        let range = r("2.0.*-rc.*");
        assert!(range.satisfies(&v("2.0.0-rc.1")));
        assert!(!range.satisfies(&v("2.0.0-beta")));
        assert_eq!(range.to_string(), "2.0.*-rc.*");
    }

    #[test]
    fn test_invalid_ranges() {
        for text in ["", "[", "[1.0", "(1.0)", "[2.0,1.0]", "(1.0,1.0]", "[a,b]", "1.*.0", "abc", "1.0.0-be*ta*", "1.*-beta"] {
            assert!(text.parse::<VersionRange>().is_err(), "{text:?} should not parse");
        }
    }
}
