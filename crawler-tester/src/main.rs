mod common;
mod logic;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use crawler_game::{FileStorage, GameEngine, SimConfig};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use common::scenarios::{expand_scenarios, get_scenario, list_scenarios};
use common::{OutputTarget, split_csv};
use logic::reports::HarnessReport;
use logic::{
    ArenaSummary, LogicTester, ScenarioResult, SimulationSummary, archive_runs, parse_archetypes,
    resolve_seed_inputs, run_arena,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TestMode {
    /// Scenario checks over headless worlds
    Simulate,
    /// Archetype tournament
    Arena,
    /// Run both scenarios and the arena
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Markdown,
    Csv,
}

#[derive(Debug, Parser)]
#[command(name = "crawler-tester", version = "0.1.0")]
#[command(about = "Headless simulation and arena harness for the Crawler engine")]
struct Args {
    /// Test mode: simulate (scenario checks), arena (tournament), or both
    #[arg(long, value_enum, default_value_t = TestMode::Simulate)]
    mode: TestMode,

    /// Scenarios to run (comma-separated, `all` for every one)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated integers or `a..b` / `a..=b` ranges)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Simulated hours per world, and the time limit of an arena bout
    #[arg(long, default_value_t = 48)]
    hours: i64,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 3)]
    iterations: usize,

    /// Archetypes entered in the arena (comma-separated, `all` for every NPC archetype)
    #[arg(long, default_value = "all")]
    archetypes: String,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON simulation config; defaults apply when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Save each seed's world here and check it restores
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let config = load_config(args.config.as_ref())?;
    let seeds = resolve_seed_inputs(&split_csv(&args.seeds))?;

    let results = run_scenarios(&args, &config, &seeds);
    let arena = run_tournament(&args, &config, &seeds)?;
    let archives = run_archives(&args, &config, &seeds)?;

    let report = HarnessReport {
        scenarios: &results,
        arena: arena.as_ref(),
        archives: &archives,
    };
    write_reports(&args, &report, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:15} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🚜 Crawler Automated Tester".bright_cyan().bold());
    println!("{}", "===========================".cyan());
}

fn load_config(path: Option<&PathBuf>) -> Result<SimConfig> {
    match path {
        Some(path) => SimConfig::load(path),
        None => Ok(SimConfig::default()),
    }
}

fn run_scenarios(args: &Args, config: &SimConfig, seeds: &[u64]) -> Vec<ScenarioResult> {
    let mut results = Vec::new();
    if !matches!(args.mode, TestMode::Simulate | TestMode::Both) {
        return results;
    }

    println!("{}", "🧠 Running Scenarios".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let tester = LogicTester::new(config.clone(), args.hours, args.verbose);
    for scenario_name in expand_scenarios(&args.scenarios) {
        if let Some(scenario) = get_scenario(&scenario_name) {
            results.extend(tester.run_scenario(&scenario, seeds, args.iterations));
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

fn run_tournament(args: &Args, config: &SimConfig, seeds: &[u64]) -> Result<Option<ArenaSummary>> {
    if !matches!(args.mode, TestMode::Arena | TestMode::Both) {
        return Ok(None);
    }

    println!("{}", "⚔️  Running Arena".bright_magenta().bold());
    println!("{}", "-".repeat(30).magenta());

    let archetypes = parse_archetypes(&args.archetypes)?;
    let summary = run_arena(&archetypes, seeds, args.hours, config, args.verbose)?;
    Ok(Some(summary))
}

fn run_archives(args: &Args, config: &SimConfig, seeds: &[u64]) -> Result<Vec<SimulationSummary>> {
    let Some(dir) = args.snapshot_dir.as_ref() else {
        return Ok(Vec::new());
    };
    let storage = FileStorage::new(dir)
        .with_context(|| format!("opening snapshot dir {}", dir.display()))?;
    let engine = GameEngine::new(config.clone(), storage);
    archive_runs(&engine, seeds, args.hours)
}

fn write_reports(args: &Args, report: &HarnessReport<'_>, start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report {
        ReportFormat::Json => logic::reports::generate_json_report(&mut output_target, report)?,
        ReportFormat::Markdown => {
            logic::reports::generate_markdown_report(&mut output_target, report)?;
        }
        ReportFormat::Csv => logic::reports::generate_csv_report(&mut output_target, report)?,
        ReportFormat::Console => {
            let duration = start_time.elapsed();
            logic::reports::generate_console_report(&mut output_target, report, duration)?;
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}
