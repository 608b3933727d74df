//! # version-parser
//!
//! NuGet version numbers, version ranges and the policy used to pick the
//! latest version of a package.
//!
//! ## Overview
//!
//! - [`Version`]: `major.minor.patch[.revision][-prerelease][+metadata]` with a
//!   total order following semantic-version precedence
//! - [`VersionRange`]: NuGet interval notation (`[1.0,2.0)`, `1.0`, `1.*`, ...)
//! - [`policy`]: pure selection rules (version lock, pre-release mode)
//!
//! ## Example
//!
//! ```
//! use version_parser::{PrereleaseMode, Version, VersionLock, VersionPolicy, VersionRange};
//!
//! let resolved: Version = "1.2.0".parse().unwrap();
//! let range: VersionRange = "[1.0.0, )".parse().unwrap();
//! let candidates: Vec<Version> = ["1.2.0", "1.3.0", "2.0.0"]
//!     .iter()
//!     .map(|v| v.parse().unwrap())
//!     .collect();
//!
//! let policy = VersionPolicy::new(PrereleaseMode::Auto, VersionLock::Major);
//! let latest = policy.select_latest(&candidates, &resolved, &range);
//! assert_eq!(latest.map(|v| v.to_string()), Some("1.3.0".to_string()));
//! ```

mod error;
pub mod policy;
mod range;
mod version;

pub use error::VersionError;
pub use policy::{PrereleaseMode, VersionLock, VersionPolicy};
pub use range::VersionRange;
pub use version::Version;
