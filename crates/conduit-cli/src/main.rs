//! Conduit CLI.
//!
//! # Commands
//!
//! - `conduit match <PATTERN> <PATH>...`: test permission paths against a
//!   segment pattern
//! - `conduit resolve [MANIFEST]...`: run the plugin resolver over TOML
//!   manifests and print the enable order
//! - `conduit config`: print the effective layered configuration
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`CONDUIT_*`)
//! 3. Project config (`.conduit/config.toml` under `-C DIR`)
//! 4. Global config (`~/.conduit/config.toml`)
//! 5. Default values (lowest priority)
//!
//! Logs go to stderr so stdout stays parseable.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use conduit_runtime::config::{ConduitConfig, ConfigError, ConfigLoader, ConfigResolver};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Conduit CLI
#[derive(Parser, Debug)]
#[command(name = "conduit")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    project: Option<PathBuf>,

    /// Ignore the global config file
    #[arg(long, global = true)]
    no_global_config: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check dot-separated paths against a segment pattern
    Match {
        /// Pattern, e.g. `files.{[a-z]+}.??`
        pattern: String,

        /// Paths to test
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Resolve plugin manifests and print the enable order
    Resolve {
        /// Plugin manifest files (TOML). Defaults to every `*.toml` in
        /// `[plugins] directory`.
        manifests: Vec<PathBuf>,

        /// Keep going past failures (also: CONDUIT_FORCE_PLUGINS)
        #[arg(long)]
        force: bool,

        /// Protocol version the resolver speaks
        #[arg(long, value_name = "VERSION")]
        protocol: Option<semver::Version>,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Applies CLI flags on top of files and environment.
struct CliConfigResolver {
    debug: bool,
    force: bool,
}

impl CliConfigResolver {
    fn from_args(args: &Args) -> Self {
        let force = matches!(args.command, Command::Resolve { force: true, .. });
        Self {
            debug: args.debug,
            force,
        }
    }
}

impl ConfigResolver for CliConfigResolver {
    fn apply(&self, config: &mut ConduitConfig) {
        if self.debug {
            config.debug = true;
        }
        if self.force {
            config.plugins.force = true;
        }
    }
}

fn project_root(args: &Args) -> PathBuf {
    args.project.clone().unwrap_or_else(|| {
        std::env::current_dir().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to get current directory, using '.'");
            PathBuf::from(".")
        })
    })
}

fn load_config(args: &Args) -> Result<ConduitConfig, ConfigError> {
    let mut loader = ConfigLoader::new().with_project_root(project_root(args));
    if args.no_global_config {
        loader = loader.skip_global_config();
    }
    let mut config = loader.load()?;
    CliConfigResolver::from_args(args).apply(&mut config);
    Ok(config)
}

/// Filter: RUST_LOG > --debug > --verbose > default "warn".
fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.debug {
            EnvFilter::new("debug")
        } else if args.verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });

    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(&args);

    let config = load_config(&args).map_err(|e| anyhow::anyhow!("Config error: {e}"))?;
    tracing::debug!(project = %project_root(&args).display(), "configuration loaded");

    let outcome = match &args.command {
        Command::Match { pattern, paths } => commands::run_match(pattern, paths)?,
        Command::Resolve {
            manifests,
            protocol,
            ..
        } => {
            let manifests = if manifests.is_empty() {
                let dir = config.plugins.directory.as_ref().ok_or_else(|| {
                    anyhow::anyhow!("no manifests given and no [plugins] directory configured")
                })?;
                commands::manifests_in(&project_root(&args).join(dir))?
            } else {
                manifests.clone()
            };
            commands::run_resolve(&manifests, protocol.clone(), config.plugins.force).await?
        }
        Command::Config => commands::run_config(&config)?,
    };
    Ok(outcome)
}
