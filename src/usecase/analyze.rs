use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::discovery::{is_project, is_solution};
use crate::entity::{AssetsFile, GraphBuilder, Project, SkippedProfile};

/// `Project("{type-guid}") = "Name", "relative\path.csproj", "{guid}"`
static SOLUTION_PROJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*Project\("\{[^}]*\}"\)\s*=\s*"[^"]*"\s*,\s*"([^"]+)""#)
        .expect("valid solution project pattern")
});

const ASSETS_FILE: &str = "project.assets.json";

/// Name used for the skipped-profile entry when no framework could be read
const ALL_PROFILES: &str = "*";

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("cannot run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`dotnet restore` failed for {} ({status}): {output}", path.display())]
    Failed {
        path: PathBuf,
        status: String,
        output: String,
    },
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("cannot read solution {}: {source}", path.display())]
    Solution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a solution or project file", .0.display())]
    Unsupported(PathBuf),

    #[error(transparent)]
    Restore(#[from] RestoreError),
}

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub restore: bool,
    pub dotnet_path: String,
}

/// Build the dependency graph of every project behind `path`.
///
/// A solution expands to its member projects. Projects whose restore
/// metadata is missing or unreadable come back with no profiles and a
/// skipped-profile entry instead of failing the run.
#[tracing::instrument(name = "analyze", level = "trace", skip(builder, options))]
pub async fn analyze_project(
    path: &Path,
    builder: GraphBuilder,
    options: &AnalyzeOptions,
) -> Result<Vec<Project>, AnalyzeError> {
    let project_files = if is_solution(path) {
        solution_projects(path).await?
    } else if is_project(path) {
        vec![path.to_path_buf()]
    } else {
        return Err(AnalyzeError::Unsupported(path.to_path_buf()));
    };

    if options.restore {
        restore(&options.dotnet_path, path).await?;
    }

    let mut projects = Vec::with_capacity(project_files.len());
    for file in project_files {
        let assets_path = assets_path(&file);
        let project = match AssetsFile::from_path(&assets_path) {
            Ok(assets) => builder.build(&assets, &file),
            Err(e) => {
                warn!("skipping {}: {}", file.display(), e);
                unrestored_project(&file, e.to_string())
            }
        };
        projects.push(project);
    }
    Ok(projects)
}

/// `<project dir>/obj/project.assets.json`
fn assets_path(project_file: &Path) -> PathBuf {
    project_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("obj")
        .join(ASSETS_FILE)
}

fn unrestored_project(file: &Path, reason: String) -> Project {
    Project {
        name: file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
        path: file.to_path_buf(),
        skipped_profiles: vec![SkippedProfile {
            name: ALL_PROFILES.to_string(),
            reason,
        }],
        ..Default::default()
    }
}

/// Member project files of a solution, in solution order.
///
/// Solution folders and entries that are not project files are ignored.
async fn solution_projects(solution: &Path) -> Result<Vec<PathBuf>, AnalyzeError> {
    let text = tokio::fs::read_to_string(solution)
        .await
        .map_err(|source| AnalyzeError::Solution {
            path: solution.to_path_buf(),
            source,
        })?;
    let dir = solution.parent().unwrap_or_else(|| Path::new("."));

    Ok(parse_solution(&text)
        .into_iter()
        .map(|relative| dir.join(relative))
        .collect())
}

fn parse_solution(text: &str) -> Vec<PathBuf> {
    SOLUTION_PROJECT
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| PathBuf::from(m.as_str().replace('\\', "/")))
        .filter(|p| is_project(p))
        .collect()
}

async fn restore(dotnet: &str, path: &Path) -> Result<(), RestoreError> {
    info!("restoring {}", path.display());
    let output = Command::new(dotnet)
        .arg("restore")
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| RestoreError::Spawn {
            program: dotnet.to_string(),
            source,
        })?;

    if output.status.success() {
        debug!("restore of {} succeeded", path.display());
        return Ok(());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    // dotnet reports restore errors on stdout
    let message = [stderr.trim(), stdout.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    Err(RestoreError::Failed {
        path: path.to_path_buf(),
        status: output.status.to_string(),
        output: last_lines(message, 5),
    })
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}
