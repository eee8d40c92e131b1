//! SkillForge CLI
//!
//! The `skillforge` command profiles skills, scores them, rewrites the
//! expensive ones and promotes rewrites that pass the A/B gate.
//!
//! ## Commands
//!
//! - `profile`: Collect run samples for one skill or a directory of skills
//! - `analyze`: Score every profiled skill
//! - `optimize`: Rewrite one skill, or every flagged candidate
//! - `validate`: A/B a skill against its rewrite and promote on pass
//! - `forge`: Run the whole loop over a skills directory
//! - `export`: Write the dashboard snapshot

mod config;
mod service;

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use config::Config;
use service::ForgeService;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skillforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Profile, optimize and promote agent skills", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Record baseline run samples
    #[command(group(ArgGroup::new("target").required(true).args(["skill", "dir"])))]
    Profile {
        /// A single skill directory
        #[arg(long)]
        skill: Option<PathBuf>,

        /// A directory of skill directories
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Runs per skill (default: profiling.iterations)
        #[arg(short, long)]
        iterations: Option<usize>,
    },

    /// Score profiled skills and record the verdicts
    Analyze,

    /// Write SKILL.optimized.md for a skill, or for every flagged candidate
    Optimize {
        /// Skill directory (default: all candidates, located via the registry)
        #[arg(long)]
        skill: Option<PathBuf>,
    },

    /// Compare a skill with its optimized artifact; promotes on pass
    Validate {
        #[arg(long)]
        skill: PathBuf,

        /// Rounds of original-then-optimized (default: validation.iterations)
        #[arg(short, long)]
        iterations: Option<usize>,
    },

    /// Profile, score, optimize, validate and promote in one pass
    Forge {
        /// Skills directory
        #[arg(long, default_value = "skills")]
        dir: PathBuf,

        /// Report candidates without writing artifacts
        #[arg(long)]
        dry_run: bool,

        /// Profiling runs per skill (default: profiling.iterations)
        #[arg(short, long)]
        iterations: Option<usize>,
    },

    /// Write the dashboard export
    Export,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.json {
        config.logging.format = "json".to_string();
    }

    let service = ForgeService::new(config);
    service.run(cli.command).await
}
