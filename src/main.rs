use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use config::{Config, UserConfig};
use controller::{ResolveError, Resolver};
use entity::{GraphBuilder, PrereleaseMode, VersionLock};
use report::Report;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use usecase::{analyze_project, discover_project, AnalyzeOptions, FeedClient, RemoteSource};

mod config;
mod controller;
mod entity;
mod report;
mod usecase;

/// Exit code when `--fail-on-updates` is set and something is outdated
const EXIT_UPDATES_FOUND: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// solution, project file or directory to analyze
    #[arg(default_value = ".")]
    path: PathBuf,
    /// also report transitive dependencies
    #[arg(short, long)]
    transitive: bool,
    /// how many reference hops below the direct dependencies to report (default 1)
    #[arg(short = 'd', long, allow_negative_numbers = true)]
    transitive_depth: Option<i64>,
    /// when pre-release versions may be suggested: auto, always or never
    #[arg(long)]
    pre_release: Option<PrereleaseMode>,
    /// only suggest versions with the same major or minor version: none, major or minor
    #[arg(long)]
    version_lock: Option<VersionLock>,
    /// also report packages referenced implicitly by the SDK
    #[arg(long)]
    include_auto_references: bool,
    /// only report packages whose name contains this (repeatable)
    #[arg(long)]
    include: Vec<String>,
    /// do not report packages whose name contains this (repeatable)
    #[arg(long)]
    exclude: Vec<String>,
    /// skip `dotnet restore` and use the existing restore metadata
    #[arg(long)]
    no_restore: bool,
    /// exit with code 2 when an outdated dependency is found
    #[arg(long)]
    fail_on_updates: bool,
    /// also write the report as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// JSON config file; command line values take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// dotnet executable to run restore with
    #[arg(long)]
    dotnet_path: Option<String>,
    /// log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Flags that were not given stay unset so the config file can fill them.
    fn user_config(&self) -> UserConfig {
        UserConfig {
            transitive: self.transitive.then_some(true),
            transitive_depth: self.transitive_depth,
            pre_release: self.pre_release,
            version_lock: self.version_lock,
            include_auto_references: self.include_auto_references.then_some(true),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            restore: self.no_restore.then_some(false),
            fail_on_updates: self.fail_on_updates.then_some(true),
            output: self.output.clone(),
            dotnet_path: self.dotnet_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    //logging
    let default_level = if args.verbose { "info" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        error!("a rustls crypto provider was already installed");
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            interrupt.cancel();
        }
    });

    match run(args, &cancel).await {
        Ok(code) => code,
        Err(e) if cancel.is_cancelled() || is_cancelled(&e) => {
            eprintln!("cancelled");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn is_cancelled(e: &anyhow::Error) -> bool {
    e.downcast_ref::<ResolveError>() == Some(&ResolveError::Cancelled)
}

async fn run(args: Args, cancel: &CancellationToken) -> anyhow::Result<ExitCode> {
    let config = Config::load(args.user_config(), args.config.as_deref())?;

    let project_file = discover_project(&args.path)?;
    info!("analyzing {}", project_file.display());

    let builder = GraphBuilder::new(config.transitive, config.transitive_depth);
    let options = AnalyzeOptions {
        restore: config.restore,
        dotnet_path: config.dotnet_path.clone(),
    };
    let mut projects = tokio::select! {
        _ = cancel.cancelled() => return Err(ResolveError::Cancelled.into()),
        projects = analyze_project(&project_file, builder, &options) => projects?,
    };

    let http_client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("cannot build http client")?;
    let resolver = Resolver::new(
        FeedClient::new(RemoteSource::new(http_client)),
        config.policy,
        config.filter.clone(),
    );
    let summary = resolver.resolve(&mut projects, cancel).await?;
    info!(
        "resolved {} of {} dependencies, {} warnings",
        summary.resolved,
        summary.queried,
        summary.warnings.len()
    );

    let report = Report::new(&projects, &config.filter);
    report
        .render(&mut std::io::stdout().lock())
        .context("cannot write report")?;
    if let Some(path) = &config.output {
        report
            .write_json(path)
            .with_context(|| format!("cannot write {}", path.display()))?;
    }

    if config.fail_on_updates && report.has_updates() {
        return Ok(ExitCode::from(EXIT_UPDATES_FOUND));
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_leave_unset_flags_empty() {
        let args = Args::parse_from(["dotnet-appraiser", "src/App"]);
        let user = args.user_config();
        assert_eq!(user.transitive, None);
        assert_eq!(user.restore, None);
        assert_eq!(args.path, PathBuf::from("src/App"));
    }

    #[test]
    fn test_args_flags() {
        let args = Args::parse_from([
            "dotnet-appraiser",
            "--transitive",
            "--transitive-depth",
            "-1",
            "--pre-release",
            "always",
            "--version-lock",
            "Minor",
            "--no-restore",
            "--exclude",
            "Analyzers",
            "--exclude",
            "Test",
        ]);
        let user = args.user_config();
        assert_eq!(user.transitive, Some(true));
        assert_eq!(user.transitive_depth, Some(-1));
        assert_eq!(user.pre_release, Some(PrereleaseMode::Always));
        assert_eq!(user.version_lock, Some(VersionLock::Minor));
        assert_eq!(user.restore, Some(false));
        assert_eq!(user.exclude, vec!["Analyzers", "Test"]);
        assert!(Config::try_from(user).is_err());
    }
}
