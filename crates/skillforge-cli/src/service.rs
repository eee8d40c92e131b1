use crate::config::Config;
use crate::Commands;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use skillforge_engine::{
    Analyzer, Forge, ForgeOptions, Optimizer, Profiler, SimulatedExecutor, SkillExecutor,
    ValidationGate,
};
use skillforge_logging::LogFormat;
use skillforge_persistence::Ledger;
use skillforge_skills::{Skill, SkillsRegistry};
use skillforge_types::{AggregateView, CandidateScore, DashboardExport, OptimizationOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DASHBOARD_FILE: &str = "dashboard.json";
const ANALYSIS_FILE: &str = "analysis.json";

/// Builds the engine from configuration and runs one command
pub struct ForgeService {
    config: Config,
}

impl ForgeService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(self, command: Commands) -> Result<()> {
        skillforge_logging::init_logging(
            &self.config.logging.level,
            LogFormat::from_name(&self.config.logging.format),
        )?;

        let ledger = Ledger::open(&self.config.ledger.path)
            .await
            .with_context(|| format!("Failed to open ledger at {}", self.config.ledger.path))?
            .with_window(self.config.ledger.window);

        self.execute(&ledger, command).await
    }

    /// Dispatch one command against an open ledger. Commands that change the
    /// ledger leave a fresh `dashboard.json` behind.
    async fn execute(&self, ledger: &Ledger, command: Commands) -> Result<()> {
        let refresh = !matches!(command, Commands::Export | Commands::Forge { .. });

        match command {
            Commands::Profile {
                skill,
                dir,
                iterations,
            } => {
                let iterations = iterations.unwrap_or(self.config.profiling.iterations);
                match (skill, dir) {
                    (Some(skill), _) => self.profile_one(ledger, &skill, iterations).await?,
                    (None, Some(dir)) => self.profile_dir(ledger, &dir, iterations).await?,
                    (None, None) => bail!("Either --skill or --dir is required"),
                }
            }
            Commands::Analyze => self.analyze(ledger).await?,
            Commands::Optimize { skill } => self.optimize(ledger, skill.as_deref()).await?,
            Commands::Validate { skill, iterations } => {
                let iterations = iterations.unwrap_or(self.config.validation.iterations);
                self.validate(ledger, &skill, iterations).await?
            }
            Commands::Forge {
                dir,
                dry_run,
                iterations,
            } => {
                let options = ForgeOptions {
                    iterations: iterations.unwrap_or(self.config.profiling.iterations),
                    validation_iterations: self.config.validation.iterations,
                    dry_run,
                    concurrency: self.config.profiling.concurrency,
                };
                self.forge(ledger, &dir, &options).await?
            }
            Commands::Export => self.export(ledger).await?,
        }

        if refresh {
            let (_, path) = self.refresh_dashboard(ledger).await?;
            debug!("Dashboard refreshed at {}", path.display());
        }
        Ok(())
    }

    fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.config.profiling.execution_timeout_secs)
    }

    fn profiler(&self, ledger: &Ledger) -> Profiler {
        let simulation = &self.config.simulation;
        let executor: Arc<dyn SkillExecutor> = Arc::new(SimulatedExecutor::new(
            simulation.min_latency_ms,
            simulation.max_latency_ms,
            simulation.failure_rate,
        ));
        Profiler::new(ledger.clone(), executor).with_timeout(self.execution_timeout())
    }

    fn gate(&self, ledger: &Ledger) -> ValidationGate {
        ValidationGate::new(ledger.clone(), Arc::new(SimulatedExecutor::for_validation()))
            .with_timeout(self.execution_timeout())
    }

    async fn profile_one(&self, ledger: &Ledger, dir: &Path, iterations: usize) -> Result<()> {
        let skill = load_skill(dir)?;
        let view = self.profiler(ledger).profile_skill(&skill, iterations).await?;
        print_aggregate(&view);
        Ok(())
    }

    async fn profile_dir(&self, ledger: &Ledger, dir: &Path, iterations: usize) -> Result<()> {
        let mut registry = SkillsRegistry::new().add_directory(dir);
        registry.discover()?;
        if registry.is_empty() {
            bail!("No skills found in {}", dir.display());
        }
        println!(
            "Profiling {} skills:\n{}",
            registry.len(),
            registry.generate_skills_list()
        );

        let profiler = self.profiler(ledger);
        for skill in registry.skills() {
            match profiler.profile_skill(skill, iterations).await {
                Ok(view) => print_aggregate(&view),
                Err(e) if e.is_skill_local() => warn!("Skipping {}: {}", skill.id, e),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn analyze(&self, ledger: &Ledger) -> Result<()> {
        let analyzer = Analyzer::new(ledger.clone());
        let scores = analyzer.analyze_all().await?;
        analyzer.record_verdicts(&scores).await?;

        if scores.is_empty() {
            println!("No profiled skills yet. Run `skillforge profile` first.");
        }
        for candidate in &scores {
            print_score(candidate);
        }

        let path = self.write_json(ANALYSIS_FILE, &scores).await?;
        println!("Analysis written to {}", path.display());
        Ok(())
    }

    async fn optimize(&self, ledger: &Ledger, skill: Option<&Path>) -> Result<()> {
        let analyzer = Analyzer::new(ledger.clone());
        let optimizer = Optimizer::new(ledger.clone());

        if let Some(dir) = skill {
            let skill = load_skill(dir)?;
            let score = analyzer.analyze(&skill.id).await?;
            let outcome = optimizer
                .optimize(&skill, &score)
                .await
                .with_context(|| format!("Optimizing {} failed", skill.id))?;
            print_outcome(&outcome);
            return Ok(());
        }

        let mut targets = Vec::new();
        let candidates = analyzer.analyze_all().await?;
        for candidate in candidates.into_iter().filter(|s| s.is_candidate()) {
            match resolve(ledger, &candidate.skill_id).await? {
                Some(skill) => targets.push((skill, candidate)),
                None => warn!("Skipping {}: no registered location", candidate.skill_id),
            }
        }

        if targets.is_empty() {
            println!("Nothing to optimize.");
            return Ok(());
        }

        for (skill, score) in &targets {
            match optimizer.optimize(skill, score).await {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) if e.is_skill_local() => error!("Optimizing {} failed: {}", skill.id, e),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn validate(&self, ledger: &Ledger, dir: &Path, iterations: usize) -> Result<()> {
        let skill = load_skill(dir)?;
        if !skill.has_optimized() {
            bail!(
                "{} has no optimized artifact; run `skillforge optimize --skill {}` first",
                skill.id,
                dir.display()
            );
        }
        ledger
            .register_skill(&skill.id, &skill.path.to_string_lossy())
            .await?;

        let verdict = self
            .gate(ledger)
            .validate_skill(&skill, iterations)
            .await
            .with_context(|| format!("Validation of {} failed", skill.id))?;

        if verdict.passed {
            ledger
                .promote(
                    &skill.id,
                    &verdict.target_version,
                    &format!("Promoted to {}: {}", verdict.target_version, verdict.summary()),
                )
                .await?;
            println!(
                "PASSED {} -> {}: {}",
                skill.id,
                verdict.target_version,
                verdict.summary()
            );
        } else {
            ledger.mark_rejected(&skill.id).await?;
            println!("FAILED {}: {}", skill.id, verdict.summary());
        }
        Ok(())
    }

    async fn forge(&self, ledger: &Ledger, dir: &Path, options: &ForgeOptions) -> Result<()> {
        if !dir.is_dir() {
            bail!("Skills directory not found: {}", dir.display());
        }

        let forge = Forge::new(
            ledger.clone(),
            self.profiler(ledger),
            Optimizer::new(ledger.clone()),
            self.gate(ledger),
        );
        let report = forge.run(dir, options).await?;

        for candidate in &report.scores {
            print_score(candidate);
        }
        for result in &report.results {
            println!("{}: {}", result.skill_id, result.outcome.status());
        }
        println!("{}", report.summary_line());

        let path = self.write_json(DASHBOARD_FILE, &report.export).await?;
        info!("Dashboard written to {}", path.display());
        Ok(())
    }

    async fn export(&self, ledger: &Ledger) -> Result<()> {
        let (export, path) = self.refresh_dashboard(ledger).await?;
        println!(
            "{} skills, {} runs, {:.0}ms avg, {:.1}% avg token savings",
            export.summary.skills_tracked,
            export.summary.total_runs,
            export.summary.avg_runtime_ms,
            export.summary.avg_token_savings_pct
        );
        if export.summary.skipped_records > 0 {
            warn!("{} malformed records skipped", export.summary.skipped_records);
        }
        println!("Dashboard written to {}", path.display());
        Ok(())
    }

    /// Snapshot the ledger into `dashboard.json`
    async fn refresh_dashboard(&self, ledger: &Ledger) -> Result<(DashboardExport, PathBuf)> {
        let export = ledger.export().await?;
        let path = self.write_json(DASHBOARD_FILE, &export).await?;
        Ok((export, path))
    }

    async fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<PathBuf> {
        let dir = PathBuf::from(&self.config.export.dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(file);
        let json = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

fn load_skill(dir: &Path) -> Result<Skill> {
    Skill::from_dir(dir).with_context(|| format!("Not a skill: {}", dir.display()))
}

/// Find a skill through the locator it was first registered with
async fn resolve(ledger: &Ledger, skill_id: &str) -> Result<Option<Skill>> {
    let Some(record) = ledger.skill_record(skill_id).await? else {
        return Ok(None);
    };
    match Skill::from_dir(Path::new(&record.locator)) {
        Ok(skill) => Ok(Some(skill)),
        Err(e) => {
            warn!("Registered location of {} is unusable: {}", skill_id, e);
            Ok(None)
        }
    }
}

fn print_aggregate(view: &AggregateView) {
    println!(
        "{}: {} runs, {:.0}ms avg, p95 {:.0}ms, {:.0}+{:.0} tokens, {:.1}% failed",
        view.skill_id,
        view.total_runs,
        view.mean_elapsed_ms,
        view.p95_elapsed_ms,
        view.mean_tokens_in,
        view.mean_tokens_out,
        view.failure_rate * 100.0
    );
}

fn print_outcome(outcome: &OptimizationOutcome) {
    println!(
        "{}: ~{} tokens saved -> {}",
        outcome.skill_id,
        outcome.estimated_token_savings,
        outcome.optimized_path.display()
    );
    for change in &outcome.changes {
        println!("  - {change}");
    }
}

fn print_score(candidate: &CandidateScore) {
    println!(
        "{:>3}  {:<8}  {}",
        candidate.score,
        candidate.recommendation.as_str(),
        candidate.skill_id
    );
    for reason in &candidate.reasons {
        println!("       {reason}");
    }
}
