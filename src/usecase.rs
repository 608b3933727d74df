mod analyze;
mod discovery;
mod feed;

pub use analyze::{analyze_project, AnalyzeOptions};
pub use discovery::discover_project;
pub use feed::{FeedClient, PackageSource, RemoteSource};

#[cfg(test)]
pub(crate) use feed::tests::StaticSource;
