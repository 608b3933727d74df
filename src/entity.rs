// Re-export types from version-parser
pub use version_parser::{PrereleaseMode, Version, VersionLock, VersionPolicy, VersionRange};

// Re-export types from assets-parser
pub use assets_parser::{AssetsFile, Dependency, GraphBuilder, Project, SkippedProfile, TargetProfile};
