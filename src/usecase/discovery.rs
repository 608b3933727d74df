use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

const SOLUTION_EXTENSION: &str = "sln";
const PROJECT_EXTENSIONS: [&str; 3] = ["csproj", "fsproj", "vbproj"];

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no solution or project file found in {}", .0.display())]
    NotFound(PathBuf),

    #[error("{} contains more than one candidate: {}", .0.display(), display_paths(.1))]
    Ambiguous(PathBuf, Vec<PathBuf>),

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn is_solution(path: &Path) -> bool {
    has_extension(path, &[SOLUTION_EXTENSION])
}

pub fn is_project(path: &Path) -> bool {
    has_extension(path, &PROJECT_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Find the solution or project file to analyze.
///
/// A solution or project file is returned as-is. A directory must hold one
/// solution, or failing that one project file; when it holds neither, its
/// immediate subdirectories are searched the same way.
pub fn discover_project(path: &Path) -> Result<PathBuf, DiscoveryError> {
    let path = dunce::canonicalize(path).map_err(|source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if path.is_file() {
        return if is_solution(&path) || is_project(&path) {
            Ok(path)
        } else {
            Err(DiscoveryError::NotFound(path))
        };
    }

    if let Some(found) = search_dir(&path)? {
        return Ok(found);
    }

    let mut found = Vec::new();
    for dir in entries(&path)?.into_iter().filter(|p| p.is_dir()) {
        if let Some(candidate) = search_dir(&dir)? {
            found.push(candidate);
        }
    }
    match found.len() {
        0 => Err(DiscoveryError::NotFound(path)),
        1 => Ok(found.remove(0)),
        _ => Err(DiscoveryError::Ambiguous(path, found)),
    }
}

/// One solution, else one project file, directly inside `dir`.
fn search_dir(dir: &Path) -> Result<Option<PathBuf>, DiscoveryError> {
    let files: Vec<PathBuf> = entries(dir)?.into_iter().filter(|p| p.is_file()).collect();

    for matches in [is_solution as fn(&Path) -> bool, is_project] {
        let mut candidates: Vec<PathBuf> = files.iter().filter(|p| matches(p)).cloned().collect();
        match candidates.len() {
            0 => continue,
            1 => {
                debug!("found {}", candidates[0].display());
                return Ok(Some(candidates.remove(0)));
            }
            _ => return Err(DiscoveryError::Ambiguous(dir.to_path_buf(), candidates)),
        }
    }
    Ok(None)
}

/// Directory entries sorted by path.
fn entries(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let io = |source: std::io::Error| DiscoveryError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = std::fs::read_dir(dir)
        .map_err(io)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io)?;
    paths.sort();
    Ok(paths)
}
