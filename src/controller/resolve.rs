use std::sync::Arc;

use futures::{stream, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DependencyFilter;
use crate::entity::{Project, Version, VersionPolicy, VersionRange};
use crate::usecase::{FeedClient, PackageSource};

/// Feed queries in flight at once
pub const MAX_CONCURRENT_QUERIES: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no projects to resolve")]
    NoProjects,
    #[error("no target framework could be read from any project")]
    NoProfiles,
    #[error("cancelled")]
    Cancelled,
}

/// A dependency whose latest version could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveWarning {
    pub project: String,
    pub profile: String,
    pub package: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveSummary {
    /// Dependencies that were looked up
    pub queried: usize,
    /// Dependencies that got a latest version
    pub resolved: usize,
    pub warnings: Vec<ResolveWarning>,
}

/// Position of one dependency in the graph plus what its lookup needs.
struct Task {
    project: usize,
    profile: usize,
    dependency: usize,
    package: String,
    resolved: Version,
    range: VersionRange,
    sources: Arc<[String]>,
}

/// Looks up the latest version of every reported dependency.
pub struct Resolver<S> {
    client: FeedClient<S>,
    policy: VersionPolicy,
    filter: DependencyFilter,
}

impl<S: PackageSource> Resolver<S> {
    pub fn new(client: FeedClient<S>, policy: VersionPolicy, filter: DependencyFilter) -> Self {
        Self {
            client,
            policy,
            filter,
        }
    }

    /// Fill in `latest_version` for every dependency passing the filter.
    ///
    /// Lookups run concurrently; the graph is only written once all of them
    /// finished. On cancellation nothing is written.
    #[tracing::instrument(name = "resolve", level = "trace", skip_all)]
    pub async fn resolve(
        &self,
        projects: &mut [Project],
        cancel: &CancellationToken,
    ) -> Result<ResolveSummary, ResolveError> {
        if projects.is_empty() {
            return Err(ResolveError::NoProjects);
        }
        if projects.iter().all(|p| p.profiles.is_empty()) {
            return Err(ResolveError::NoProfiles);
        }

        let tasks = self.plan(projects);
        let queried = tasks.len();
        debug!("resolving {} dependencies", queried);

        let warnings = Mutex::new(Vec::new());
        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            results = self.run(tasks, projects, &warnings) => results,
        };

        let mut resolved = 0;
        for (task, latest) in results {
            if latest.is_some() {
                resolved += 1;
            }
            projects[task.project].profiles[task.profile].dependencies[task.dependency]
                .latest_version = latest;
        }

        Ok(ResolveSummary {
            queried,
            resolved,
            warnings: warnings.into_inner(),
        })
    }

    fn plan(&self, projects: &[Project]) -> Vec<Task> {
        let mut tasks = Vec::new();
        for (p, project) in projects.iter().enumerate() {
            let sources: Arc<[String]> = project.sources.clone().into();
            for (q, profile) in project.profiles.iter().enumerate() {
                for (d, dep) in profile.dependencies.iter().enumerate() {
                    if !self.filter.accepts(dep) {
                        continue;
                    }
                    tasks.push(Task {
                        project: p,
                        profile: q,
                        dependency: d,
                        package: dep.name.clone(),
                        resolved: dep.resolved_version.clone(),
                        range: dep.requested_range.clone(),
                        sources: Arc::clone(&sources),
                    });
                }
            }
        }
        tasks
    }

    async fn run(
        &self,
        tasks: Vec<Task>,
        projects: &[Project],
        warnings: &Mutex<Vec<ResolveWarning>>,
    ) -> Vec<(Task, Option<Version>)> {
        let client = &self.client;
        let policy = self.policy;

        stream::iter(tasks)
            .map(move |task| async move {
                match client.fetch_versions(&task.package, &task.sources).await {
                    Ok(versions) => {
                        let latest = policy.select_latest(&versions, &task.resolved, &task.range);
                        (task, latest)
                    }
                    Err(e) => {
                        let project = &projects[task.project];
                        let warning = ResolveWarning {
                            project: project.name.clone(),
                            profile: project.profiles[task.profile].name.clone(),
                            package: task.package.clone(),
                            message: e.to_string(),
                        };
                        warn!(
                            "{} ({}): cannot determine latest version of {}: {}",
                            warning.project, warning.profile, warning.package, warning.message
                        );
                        warnings.lock().push(warning);
                        (task, None)
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_QUERIES)
            .collect()
            .await
    }
}
