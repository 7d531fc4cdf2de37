//! `codecase` — inspect case content, journals and mission verdicts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use codecase_engine::casebook::{builtin_hints, missing_headline};
use codecase_engine::domain::Case;
use codecase_engine::ledger::case_unlock_cost;
use codecase_engine::rules::RuleRegistry;
use codecase_engine::stability::{assess, Stability};
use codecase_engine::validator::evaluate;

use codecase_runtime::config::RuntimeConfig;
use codecase_runtime::content::load_case_file;
use codecase_runtime::logging::init_tracing;
use codecase_runtime::replay::rebuild_from_journal;
use codecase_runtime::store::FileProfileStore;
use codecase_runtime::unlock::{SpendOutcome, UnlockGate};

#[derive(Parser)]
#[command(name = "codecase")]
#[command(about = "Mission progression and validation tools for CodeCase")]
struct Cli {
    /// Log filter directives
    #[arg(long, env = "CODECASE_LOG", default_value = "warn")]
    log_level: String,

    /// Runtime configuration file (JSON)
    #[arg(long, env = "CODECASE_CONFIG")]
    config: Option<PathBuf>,

    /// Profile store call timeout in milliseconds (overrides config)
    #[arg(long)]
    store_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a case file
    Check {
        case: PathBuf,
    },
    /// Replay a playthrough journal and print where it ended
    Replay {
        journal: PathBuf,
        /// Case the journal belongs to (built-in case when omitted)
        #[arg(long)]
        case: Option<PathBuf>,
    },
    /// Evaluate source files against one built-in mission
    Evaluate {
        #[arg(long)]
        mission: String,
        #[arg(long)]
        html: PathBuf,
        #[arg(long)]
        css: Option<PathBuf>,
    },
    /// Unlock a case for a learner in a file-backed profile store
    Unlock {
        #[arg(long)]
        profiles: PathBuf,
        #[arg(long)]
        user: String,
        /// Case to unlock (built-in case when omitted)
        #[arg(long)]
        case: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level).context("invalid --log-level")?;

    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_json_file(path)?,
        None => RuntimeConfig::default(),
    }
    .with_env_overrides()?;
    if let Some(ms) = cli.store_timeout_ms {
        config.store_timeout_ms = ms;
    }

    match cli.command {
        Commands::Check { case } => check(&case),
        Commands::Replay { journal, case } => replay(&journal, case.as_deref()),
        Commands::Evaluate { mission, html, css } => evaluate_mission(&mission, &html, css.as_deref()),
        Commands::Unlock { profiles, user, case } => {
            unlock(&config, &profiles, &user, case.as_deref()).await
        }
    }
}

fn load_case_or_builtin(path: Option<&Path>) -> Result<Case> {
    match path {
        Some(path) => load_case_file(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(missing_headline()),
    }
}

fn check(path: &Path) -> Result<()> {
    let case = load_case_file(path).with_context(|| format!("loading {}", path.display()))?;
    let registry = RuleRegistry::builtin();

    println!("{} ({}, {})", case.title, case.id, case.difficulty);
    println!("  beats:       {}", case.beats.len());
    println!("  missions:    {}", case.missions.len());
    println!("  unlock cost: {}", case_unlock_cost(&case)?);
    for mission in &case.missions {
        println!("  - {}: {}", mission.id, mission.title);
        for condition in &mission.conditions {
            let marker = if registry.contains(condition) { "ok" } else { "UNKNOWN" };
            println!("      {:<20} {}", condition, marker);
        }
    }
    Ok(())
}

fn replay(journal: &Path, case: Option<&Path>) -> Result<()> {
    if !journal.exists() {
        bail!("journal {} does not exist", journal.display());
    }
    let case = Arc::new(load_case_or_builtin(case)?);
    let (state, hash) = rebuild_from_journal(Arc::clone(&case), journal)?;

    println!("case:     {}", case.id);
    println!("phase:    {}", state.phase);
    println!("beat:     {}", state.beat_index);
    println!("mission:  {}", state.mission_index);
    println!("clues:");
    for clue in &state.revealed_clues {
        println!("  - {}", clue);
    }
    println!("hash:     {}", hash);
    Ok(())
}

fn evaluate_mission(mission_id: &str, html: &Path, css: Option<&Path>) -> Result<()> {
    let case = missing_headline();
    let Some(mission) = case.mission_by_id(mission_id) else {
        bail!("no built-in mission named {:?}", mission_id);
    };
    let html = std::fs::read_to_string(html).with_context(|| format!("reading {}", html.display()))?;
    let css = match css {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        }
        None => String::new(),
    };

    match assess(&html, &css) {
        Stability::Stable => println!("stability: stable"),
        Stability::Unstable(reason) => println!("stability: unstable ({})", reason),
    }

    let verdict = evaluate(&RuleRegistry::builtin(), &mission.conditions, &html, &css);
    println!("score:     {}", verdict.score);
    println!("completed: {}", verdict.is_completed);
    for id in &verdict.satisfied {
        println!("  [x] {}", id);
    }
    for id in &verdict.unsatisfied {
        println!("  [ ] {}", id);
    }

    let hint = builtin_hints().resolve(mission, &html, &css);
    println!("hint:      {}", hint.message);
    if let Some(error) = hint.error_message {
        println!("error:     {}", error);
    }
    Ok(())
}

async fn unlock(config: &RuntimeConfig, profiles: &Path, user: &str, case: Option<&Path>) -> Result<()> {
    let case = load_case_or_builtin(case)?;
    let store = Arc::new(FileProfileStore::new(profiles));
    let gate = UnlockGate::connect(store, user, config.store_timeout()).await?;
    info!(user, balance = gate.balance(), "profile loaded");

    match gate.unlock_case(&case).await? {
        SpendOutcome::Unlocked { balance } => println!("unlocked {}; balance {}", case.id, balance),
        SpendOutcome::AlreadyUnlocked => println!("{} already unlocked", case.id),
        SpendOutcome::InsufficientFunds { balance, cost } => {
            println!("insufficient funds: balance {}, cost {}", balance, cost)
        }
    }
    Ok(())
}
