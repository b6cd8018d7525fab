//! Subcommand bodies.

use anyhow::Result;
use conduit_auth::{SegmentMatcher, SegmentPath};
use conduit_plugin::{PluginArtifact, PluginManifest};
use conduit_runtime::config::ConduitConfig;
use conduit_runtime::{BatchReport, PluginManager, ResolutionError};
use conduit_types::{ErrorCode, ErrorSummary};
use semver::Version;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

fn failure<E: ErrorCode + Display>(err: &E) -> anyhow::Error {
    anyhow::anyhow!("{}", ErrorSummary::of(err))
}

/// Prints `<path>: match` or `<path>: no match` for every path.
pub fn run_match(pattern: &str, paths: &[String]) -> Result<ExitCode> {
    let matcher = SegmentMatcher::compile(pattern).map_err(|e| failure(&e))?;
    debug!(pattern = matcher.source(), greedy = matcher.is_greedy(), "pattern compiled");

    for raw in paths {
        let path = SegmentPath::parse(raw).map_err(|e| failure(&e))?;
        let verdict = if matcher.matches_segments(path.segments()) {
            "match"
        } else {
            "no match"
        };
        println!("{raw}: {verdict}");
    }
    Ok(ExitCode::SUCCESS)
}

/// Every `*.toml` file directly under `dir`, sorted.
pub fn manifests_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("cannot read plugin directory {}: {e}", dir.display()))?;
    let mut manifests = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            manifests.push(path);
        }
    }
    manifests.sort();
    debug!(dir = %dir.display(), found = manifests.len(), "scanned plugin directory");
    Ok(manifests)
}

/// Loads manifests, enables them with no-op entries and prints the outcome.
///
/// A rejected or aborted batch is an error. A forced batch with failures
/// prints them and exits with failure.
pub async fn run_resolve(
    manifests: &[PathBuf],
    protocol: Option<Version>,
    force: bool,
) -> Result<ExitCode> {
    let mut artifacts = Vec::with_capacity(manifests.len());
    for path in manifests {
        let meta = PluginManifest::load(path)
            .map_err(|e| failure(&e))?
            .into_meta();
        debug!(id = %meta.id(), version = %meta.version(), "manifest loaded");
        artifacts.push(PluginArtifact::noop(meta));
    }

    let manager = protocol.map_or_else(PluginManager::new, PluginManager::with_protocol);
    info!(protocol = %manager.protocol(), candidates = artifacts.len(), force, "resolving");

    match manager.enable_plugins(artifacts, force).await {
        Ok(report) => {
            print_report(&report);
            println!("plugins:");
            for summary in manager.list().await {
                println!("  {summary}");
            }
            if report.is_clean() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Err(err) => {
            match &err {
                ResolutionError::Rejected { issues } => {
                    for issue in issues {
                        eprintln!("rejected: {issue}");
                    }
                }
                ResolutionError::Aborted { report, .. } => print_report(report),
            }
            Err(failure(&err))
        }
    }
}

fn print_report(report: &BatchReport) {
    println!("enable order:");
    for (position, id) in report.order.iter().enumerate() {
        let note = if report.unchanged.contains(id) {
            " (unchanged)"
        } else {
            ""
        };
        println!("  {}. {id}{note}", position + 1);
    }
    if !report.satisfied.is_empty() {
        println!("satisfied:");
        for satisfied in &report.satisfied {
            println!("  {} by {}", satisfied.id, satisfied.provider);
        }
    }
    if !report.dropped_edges.is_empty() {
        println!("dropped optional edges:");
        for (dependent, dependency) in &report.dropped_edges {
            println!("  {dependent} -> {dependency}");
        }
    }
    if !report.failures.is_empty() {
        println!("failed:");
        for err in &report.failures {
            println!("  {}", ErrorSummary::of(err));
        }
    }
}

/// Prints the effective configuration.
pub fn run_config(config: &ConduitConfig) -> Result<ExitCode> {
    print!("{}", config.to_toml()?);
    Ok(ExitCode::SUCCESS)
}
