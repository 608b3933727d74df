use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashSet;
use moka::future::Cache;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use crate::entity::Version;

/// Package ids keep `.`, `-` and `_` readable in flat container URLs
const PACKAGE_ID: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-').remove(b'_');

const PACKAGE_BASE_ADDRESS: &str = "PackageBaseAddress/3.0.0";

/// Max (package, endpoint) entries kept for one run
const CACHE_CAPACITY: u64 = 10_000;

/// Feed requests in flight at once, across all packages and endpoints
pub const MAX_IN_FLIGHT_REQUESTS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// One endpoint could not be queried (network, auth, bad response)
    #[error("feed {endpoint} is unavailable: {reason}")]
    Unavailable { endpoint: String, reason: String },

    /// Every configured endpoint failed for a package
    #[error("all {count} package sources failed for {package}")]
    AllSourcesFailed { package: String, count: usize },

    #[error("no package sources configured for {package}")]
    NoSources { package: String },
}

impl FeedError {
    fn unavailable(endpoint: &str, reason: impl ToString) -> Self {
        FeedError::Unavailable {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Lists the versions one endpoint publishes for a package.
///
/// A package the endpoint does not know is an empty list, not an error.
pub trait PackageSource: Send + Sync + 'static {
    fn list_versions(
        &self,
        package: &str,
        endpoint: &str,
    ) -> impl Future<Output = Result<Vec<Version>, FeedError>> + Send;
}

/// Queries package feeds and caches their answers for the length of a run.
///
/// Answers are cached per (package, endpoint); concurrent lookups of the
/// same key share a single request. Failures are not cached. At most
/// [`MAX_IN_FLIGHT_REQUESTS`] requests reach the source at once.
pub struct FeedClient<S> {
    source: Arc<S>,
    requests: Arc<Semaphore>,
    cache: Cache<(String, String), Arc<Vec<Version>>>,
    /// Endpoints that already failed in this run, to warn once per endpoint
    failed_endpoints: DashSet<String>,
}

impl<S: PackageSource> FeedClient<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            requests: Arc::new(Semaphore::new(MAX_IN_FLIGHT_REQUESTS)),
            cache: Cache::builder().max_capacity(CACHE_CAPACITY).build(),
            failed_endpoints: DashSet::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn source(&self) -> &S {
        &self.source
    }

    /// Versions published for `package` across `endpoints`, ascending and
    /// without duplicates.
    ///
    /// Endpoints that fail are skipped; the result only fails when every
    /// endpoint failed.
    pub async fn fetch_versions(
        &self,
        package: &str,
        endpoints: &[String],
    ) -> Result<Vec<Version>, FeedError> {
        if endpoints.is_empty() {
            return Err(FeedError::NoSources {
                package: package.to_string(),
            });
        }

        let lookups = endpoints
            .iter()
            .map(|endpoint| self.fetch_endpoint(package, endpoint));
        let results = futures::future::join_all(lookups).await;

        let mut versions = BTreeSet::new();
        let mut failures = 0;
        for (endpoint, result) in endpoints.iter().zip(results) {
            match result {
                Ok(found) => versions.extend(found.iter().cloned()),
                Err(e) => {
                    failures += 1;
                    if self.failed_endpoints.insert(endpoint.clone()) {
                        warn!("{}", e);
                    } else {
                        debug!("{} (package {})", e, package);
                    }
                }
            }
        }

        if failures == endpoints.len() {
            return Err(FeedError::AllSourcesFailed {
                package: package.to_string(),
                count: failures,
            });
        }
        if failures > 0 {
            warn!(
                "versions of {} may be incomplete: {} of {} package sources failed",
                package,
                failures,
                endpoints.len()
            );
        }

        Ok(versions.into_iter().collect())
    }

    async fn fetch_endpoint(
        &self,
        package: &str,
        endpoint: &str,
    ) -> Result<Arc<Vec<Version>>, FeedError> {
        let key = (package.to_ascii_lowercase(), endpoint.to_string());
        let source = Arc::clone(&self.source);
        let requests = Arc::clone(&self.requests);
        let (package, endpoint) = (package.to_string(), endpoint.to_string());

        self.cache
            .try_get_with(key, async move {
                let _permit = requests
                    .acquire_owned()
                    .await
                    .map_err(|e| FeedError::unavailable(&endpoint, e))?;
                debug!("cache miss for {} on {}", package, endpoint);
                source.list_versions(&package, &endpoint).await.map(Arc::new)
            })
            .await
            .map_err(|e| (*e).clone())
    }
}

/// Where a package source endpoint lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// NuGet v3 service index
    Http(Url),
    /// Local folder feed
    Folder(PathBuf),
}

impl Endpoint {
    pub fn parse(endpoint: &str) -> Self {
        match Url::parse(endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Endpoint::Http(url),
            Ok(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(path) => Endpoint::Folder(path),
                Err(_) => Endpoint::Folder(PathBuf::from(url.path())),
            },
            // plain paths, including drive letters that parse as a scheme
            _ => Endpoint::Folder(PathBuf::from(endpoint)),
        }
    }
}

#[derive(Deserialize, Debug)]
struct ServiceIndex {
    #[serde(default)]
    resources: Vec<ServiceResource>,
}

#[derive(Deserialize, Debug)]
struct ServiceResource {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: String,
}

#[derive(Deserialize, Debug)]
struct VersionIndex {
    #[serde(default)]
    versions: Vec<String>,
}

/// Production [`PackageSource`]: NuGet v3 HTTP feeds and local folder feeds.
pub struct RemoteSource {
    http_client: reqwest::Client,
    /// Service index URL -> flat container base address
    base_addresses: Cache<String, Arc<Url>>,
}

impl RemoteSource {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_addresses: Cache::builder().max_capacity(64).build(),
        }
    }

    async fn package_base_address(&self, service_index: &Url) -> Result<Arc<Url>, FeedError> {
        let client = self.http_client.clone();
        let url = service_index.clone();
        self.base_addresses
            .try_get_with(service_index.to_string(), async move {
                let endpoint = url.as_str();
                let resp = client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| FeedError::unavailable(endpoint, e))?;
                if !resp.status().is_success() {
                    return Err(FeedError::unavailable(
                        endpoint,
                        format!("service index returned {}", resp.status()),
                    ));
                }
                let index: ServiceIndex = resp
                    .json()
                    .await
                    .map_err(|e| FeedError::unavailable(endpoint, e))?;

                let resource = index
                    .resources
                    .iter()
                    .find(|r| r.kind.starts_with(PACKAGE_BASE_ADDRESS))
                    .ok_or_else(|| {
                        FeedError::unavailable(endpoint, "no PackageBaseAddress resource")
                    })?;

                let mut base =
                    Url::parse(&resource.id).map_err(|e| FeedError::unavailable(endpoint, e))?;
                if !base.path().ends_with('/') {
                    let path = format!("{}/", base.path());
                    base.set_path(&path);
                }
                debug!("package base address of {} is {}", endpoint, base);
                Ok(Arc::new(base))
            })
            .await
            .map_err(|e| (*e).clone())
    }

    async fn http_versions(
        &self,
        package: &str,
        service_index: &Url,
    ) -> Result<Vec<Version>, FeedError> {
        let endpoint = service_index.as_str();
        let base = self.package_base_address(service_index).await?;
        let id = package.to_ascii_lowercase();
        let url = base
            .join(&format!("{}/index.json", utf8_percent_encode(&id, PACKAGE_ID)))
            .map_err(|e| FeedError::unavailable(endpoint, e))?;

        let resp = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::unavailable(endpoint, e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("{} is not published on {}", package, endpoint);
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(FeedError::unavailable(
                endpoint,
                format!("returned {} for {}", resp.status(), package),
            ));
        }

        let index: VersionIndex = resp
            .json()
            .await
            .map_err(|e| FeedError::unavailable(endpoint, e))?;
        Ok(parse_versions(package, index.versions.iter().map(String::as_str)))
    }

    async fn folder_versions(package: &str, root: &Path) -> Result<Vec<Version>, FeedError> {
        let endpoint = root.display().to_string();
        let mut entries = tokio::fs::read_dir(root)
            .await
            .map_err(|e| FeedError::unavailable(&endpoint, e))?;

        let flat_prefix = format!("{}.", package.to_ascii_lowercase());
        let mut hierarchical = None;
        let mut flat = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FeedError::unavailable(&endpoint, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let lower = name.to_ascii_lowercase();
            if lower == package.to_ascii_lowercase() && entry.path().is_dir() {
                hierarchical = Some(entry.path());
            } else if lower.ends_with(".nupkg") && !lower.ends_with(".symbols.nupkg") {
                if let Some(version) = lower
                    .strip_prefix(&flat_prefix)
                    .and_then(|rest| rest.strip_suffix(".nupkg"))
                {
                    flat.push(version.to_string());
                }
            }
        }

        // <root>/<id>/<version>/
        if let Some(dir) = hierarchical {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| FeedError::unavailable(&endpoint, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| FeedError::unavailable(&endpoint, e))?
            {
                if entry.path().is_dir() {
                    flat.push(entry.file_name().to_string_lossy().to_string());
                }
            }
        }

        Ok(parse_versions(package, flat.iter().map(String::as_str)))
    }
}

impl PackageSource for RemoteSource {
    async fn list_versions(&self, package: &str, endpoint: &str) -> Result<Vec<Version>, FeedError> {
        match Endpoint::parse(endpoint) {
            Endpoint::Http(url) => self.http_versions(package, &url).await,
            Endpoint::Folder(path) => Self::folder_versions(package, &path).await,
        }
    }
}

fn parse_versions<'a>(package: &str, versions: impl Iterator<Item = &'a str>) -> Vec<Version> {
    versions
        .filter_map(|v| match v.parse::<Version>() {
            Ok(version) => Some(version),
            Err(e) => {
                debug!("skipping version of {}: {}", package, e);
                None
            }
        })
        .collect()
}
