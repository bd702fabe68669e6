use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use super::ScenarioResult;
use super::arena::ArenaSummary;
use super::simulation::SimulationSummary;

/// Everything one harness invocation produced.
#[derive(Debug, Default, Serialize)]
pub struct HarnessReport<'a> {
    pub scenarios: &'a [ScenarioResult],
    pub arena: Option<&'a ArenaSummary>,
    pub archives: &'a [SimulationSummary],
}

impl HarnessReport<'_> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty() && self.arena.is_none() && self.archives.is_empty()
    }
}

#[allow(clippy::cast_precision_loss)]
fn success_rate(results: &[ScenarioResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let passed = results.iter().filter(|r| r.passed).count();
    (passed as f64 / results.len() as f64) * 100.0
}

pub fn generate_console_report(
    out: &mut dyn Write,
    report: &HarnessReport<'_>,
    total_duration: Duration,
) -> Result<()> {
    let results = report.scenarios;
    if !results.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "📊 Scenario Results Summary".bright_cyan().bold())?;
        writeln!(out, "{}", "===========================".cyan())?;

        let passed = results.iter().filter(|r| r.passed).count();
        writeln!(out, "Total runs: {}", results.len())?;
        writeln!(out, "Passed: {}", passed.to_string().green())?;
        writeln!(out, "Failed: {}", (results.len() - passed).to_string().red())?;
        writeln!(out, "Success rate: {:.1}%", success_rate(results))?;
        writeln!(out, "Total time: {total_duration:?}")?;
        writeln!(out)?;

        for result in results {
            let status = if result.passed {
                "✅ PASS".green()
            } else {
                "❌ FAIL".red()
            };
            writeln!(out, "{status} {} (seed {})", result.scenario_name.bold(), result.seed)?;
            writeln!(
                out,
                "   Iterations: {}/{} successful",
                result.successful_iterations, result.iterations_run
            )?;
            writeln!(out, "   Average time: {:?}", result.average_duration)?;
            if let Some(note) = result.notes.last() {
                writeln!(out, "   Last: {note}")?;
            }
            if !result.failures.is_empty() {
                writeln!(out, "   Failures:")?;
                for failure in &result.failures {
                    writeln!(out, "     • {}", failure.red())?;
                }
            }
            writeln!(out)?;
        }

        let fastest = results.iter().min_by_key(|r| r.average_duration);
        let slowest = results.iter().max_by_key(|r| r.average_duration);
        if let (Some(fastest), Some(slowest)) = (fastest, slowest) {
            writeln!(out, "{}", "⚡ Performance Summary".bright_yellow().bold())?;
            writeln!(out, "{}", "=====================".yellow())?;
            writeln!(
                out,
                "Fastest: {} ({:?})",
                fastest.scenario_name.green(),
                fastest.average_duration
            )?;
            writeln!(
                out,
                "Slowest: {} ({:?})",
                slowest.scenario_name.yellow(),
                slowest.average_duration
            )?;
        }
    }

    if let Some(arena) = report.arena {
        writeln!(out)?;
        writeln!(out, "{}", "⚔️  Arena Standings".bright_magenta().bold())?;
        writeln!(out, "{}", "==================".magenta())?;
        writeln!(out, "Bouts fought: {}", arena.bouts.len())?;
        for (archetype, standing) in arena.ranking() {
            writeln!(
                out,
                "  {:12} W {:>4}  L {:>4}  D {:>4}",
                archetype.key(),
                standing.wins.to_string().green(),
                standing.losses.to_string().red(),
                standing.draws
            )?;
        }
    }

    if !report.archives.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "💾 Archived Worlds".bright_blue().bold())?;
        for summary in report.archives {
            writeln!(
                out,
                "  seed {:>8}  {}  events {:>6}  {}",
                summary.seed,
                summary.final_time,
                summary.stats.events_fired,
                &summary.fingerprint[..16]
            )?;
        }
    }

    if report.is_empty() {
        writeln!(out, "Nothing was run.")?;
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, report: &HarnessReport<'_>) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, report: &HarnessReport<'_>) -> Result<()> {
    writeln!(out, "# Crawler Harness Results\n")?;
    if report.is_empty() {
        writeln!(out, "_No scenarios executed._")?;
        return Ok(());
    }

    let results = report.scenarios;
    if !results.is_empty() {
        let passed = results.iter().filter(|r| r.passed).count();
        writeln!(out, "## Summary\n")?;
        writeln!(out, "- **Total runs**: {}", results.len())?;
        writeln!(out, "- **Passed**: {passed}")?;
        writeln!(out, "- **Failed**: {}", results.len() - passed)?;
        writeln!(out, "- **Success rate**: {:.1}%\n", success_rate(results))?;

        writeln!(out, "## Detailed Results\n")?;
        for result in results {
            let status = if result.passed { "✅" } else { "❌" };
            writeln!(out, "### {status} {} (seed {})\n", result.scenario_name, result.seed)?;
            writeln!(
                out,
                "- **Iterations**: {}/{} successful",
                result.successful_iterations, result.iterations_run
            )?;
            writeln!(out, "- **Average time**: {:?}", result.average_duration)?;
            if !result.failures.is_empty() {
                writeln!(out, "- **Failures**:")?;
                for failure in &result.failures {
                    writeln!(out, "  - {failure}")?;
                }
            }
            writeln!(out)?;
        }
    }

    if let Some(arena) = report.arena {
        writeln!(out, "## Arena\n")?;
        writeln!(out, "| Archetype | Bouts | Wins | Losses | Draws |")?;
        writeln!(out, "|---|---|---|---|---|")?;
        for (archetype, standing) in arena.ranking() {
            writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                archetype.key(),
                standing.bouts,
                standing.wins,
                standing.losses,
                standing.draws
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Flat rows: one per scenario run and one per arena bout.
pub fn generate_csv_report(out: &mut dyn Write, report: &HarnessReport<'_>) -> Result<()> {
    writeln!(out, "kind,name,seed,passed,iterations,successes,average_ms,attacks,winner")?;
    for result in report.scenarios {
        writeln!(
            out,
            "scenario,{},{},{},{},{},{},,",
            result.scenario_name,
            result.seed,
            result.passed,
            result.iterations_run,
            result.successful_iterations,
            result.average_duration.as_millis()
        )?;
    }
    if let Some(arena) = report.arena {
        for bout in &arena.bouts {
            let winner = bout.winner().map_or("draw", |winner| winner.key());
            writeln!(
                out,
                "bout,{}-vs-{},{},,,,,{},{}",
                bout.challenger.key(),
                bout.defender.key(),
                bout.seed,
                bout.attacks,
                winner
            )?;
        }
    }
    Ok(())
}
