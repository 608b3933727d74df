use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::DependencyFilter;
use crate::entity::{Dependency, Project, Version};

/// What kind of upgrade separates the resolved and the latest version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpgradeKind {
    Major,
    Minor,
    Patch,
    Revision,
    Prerelease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl UpgradeKind {
    /// `None` when `latest` is not newer than `resolved`.
    pub fn between(resolved: &Version, latest: &Version) -> Option<UpgradeKind> {
        if latest <= resolved {
            return None;
        }
        let kind = if latest.major != resolved.major {
            UpgradeKind::Major
        } else if latest.is_prerelease() || latest.same_release(resolved) {
            UpgradeKind::Prerelease
        } else if latest.minor != resolved.minor {
            UpgradeKind::Minor
        } else if latest.patch != resolved.patch {
            UpgradeKind::Patch
        } else {
            UpgradeKind::Revision
        };
        Some(kind)
    }

    pub fn severity(self) -> Severity {
        match self {
            UpgradeKind::Major | UpgradeKind::Prerelease => Severity::High,
            UpgradeKind::Minor => Severity::Medium,
            UpgradeKind::Patch | UpgradeKind::Revision => Severity::Low,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            UpgradeKind::Major => "major",
            UpgradeKind::Minor => "minor",
            UpgradeKind::Patch => "patch",
            UpgradeKind::Revision => "revision",
            UpgradeKind::Prerelease => "pre-release",
        }
    }
}

/// One reported dependency: outdated, or with an unknown latest version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub name: String,
    pub resolved: Version,
    /// `None` when the latest version could not be determined
    pub latest: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<UpgradeKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub transitive: bool,
    pub depth: u32,
}

impl ReportRow {
    fn from_dependency(dep: &Dependency) -> Option<Self> {
        let upgrade = match &dep.latest_version {
            Some(latest) => Some(UpgradeKind::between(&dep.resolved_version, latest)?),
            None => None,
        };
        Some(Self {
            name: dep.name.clone(),
            resolved: dep.resolved_version.clone(),
            latest: dep.latest_version.clone(),
            upgrade,
            severity: upgrade.map(UpgradeKind::severity),
            transitive: dep.is_transitive,
            depth: dep.depth,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportProfile {
    pub name: String,
    pub dependencies: Vec<ReportRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSkipped {
    pub profile: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportProject {
    pub name: String,
    pub path: PathBuf,
    pub profiles: Vec<ReportProfile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<ReportSkipped>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub projects: Vec<ReportProject>,
}

impl Report {
    /// Collect the dependencies worth reporting. Up-to-date dependencies and
    /// the ones the filter excluded from resolution are left out.
    pub fn new(projects: &[Project], filter: &DependencyFilter) -> Self {
        let projects = projects
            .iter()
            .map(|project| ReportProject {
                name: project.name.clone(),
                path: project.path.clone(),
                profiles: project
                    .profiles
                    .iter()
                    .map(|profile| ReportProfile {
                        name: profile.name.clone(),
                        dependencies: profile
                            .dependencies
                            .iter()
                            .filter(|dep| filter.accepts(dep))
                            .filter_map(ReportRow::from_dependency)
                            .collect(),
                    })
                    .collect(),
                skipped: project
                    .skipped_profiles
                    .iter()
                    .map(|s| ReportSkipped {
                        profile: s.name.clone(),
                        reason: s.reason.clone(),
                    })
                    .collect(),
            })
            .collect();
        Self { projects }
    }

    pub fn has_updates(&self) -> bool {
        self.rows().any(|row| row.upgrade.is_some())
    }

    fn rows(&self) -> impl Iterator<Item = &ReportRow> {
        self.projects
            .iter()
            .flat_map(|p| &p.profiles)
            .flat_map(|p| &p.dependencies)
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Plain text tables, one per project and framework.
    pub fn render(&self, out: &mut impl Write) -> std::io::Result<()> {
        for project in &self.projects {
            writeln!(out, "» {}", project.name)?;
            for skipped in &project.skipped {
                writeln!(out, "  ! {} skipped: {}", skipped.profile, skipped.reason)?;
            }
            for profile in &project.profiles {
                if profile.dependencies.is_empty() {
                    writeln!(out, "  [{}] all dependencies are up to date", profile.name)?;
                    continue;
                }
                writeln!(out, "  [{}]", profile.name)?;
                render_table(out, &profile.dependencies)?;
                for row in profile.dependencies.iter().filter(|r| r.latest.is_none()) {
                    writeln!(
                        out,
                        "  warning: latest version of {} could not be determined",
                        row.name
                    )?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

const HEADER: [&str; 5] = ["Package", "Transitive", "Resolved", "Latest", "Upgrade"];

fn render_table(out: &mut impl Write, rows: &[ReportRow]) -> std::io::Result<()> {
    let cells: Vec<[String; 5]> = rows
        .iter()
        .map(|row| {
            [
                row.name.clone(),
                if row.transitive { "yes".to_string() } else { String::new() },
                row.resolved.to_string(),
                row.latest
                    .as_ref()
                    .map_or_else(|| "unknown".to_string(), Version::to_string),
                row.upgrade.map(|u| u.as_str().to_string()).unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = HEADER.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[&str]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        format!("    {}", padded.join("  ").trim_end())
    };

    writeln!(out, "{}", line(&HEADER))?;
    for row in &cells {
        let row: Vec<&str> = row.iter().map(String::as_str).collect();
        writeln!(out, "{}", line(&row))?;
    }
    Ok(())
}
