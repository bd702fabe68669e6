//! Named checks the harness can run against a seed.

use anyhow::{Context, Result, ensure};
use crawler_game::{
    Encounter, Game, Location, LocationId, LocationKind, SimConfig, Terrain, TimeDuration,
    TimePoint, XorShift,
};
use rand::SeedableRng;

use crate::common::split_csv;
use crate::logic::simulation::{SimulationSummary, run_world};

/// Years the catch-up scenario jumps in one step.
const CATCH_UP_YEARS: i64 = 2;
/// Encounters sampled per population check.
const POPULATION_TRIALS: u64 = 400;
/// Longest window sampled per population trial.
const POPULATION_MAX_HOURS: i64 = 240;

/// Everything a scenario check gets to see.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioCtx<'a> {
    pub seed: u64,
    pub hours: i64,
    pub config: &'a SimConfig,
}

/// A check returns a short note on success.
pub type ScenarioCheck = fn(&ScenarioCtx<'_>) -> Result<String>;

#[derive(Clone, Copy)]
pub struct TestScenario {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub check: ScenarioCheck,
}

impl std::fmt::Debug for TestScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestScenario").field("key", &self.key).finish_non_exhaustive()
    }
}

const SCENARIOS: [TestScenario; 4] = [
    TestScenario {
        key: "smoke",
        name: "Smoke",
        description: "Run a world hour by hour and restore its snapshot",
        check: smoke,
    },
    TestScenario {
        key: "determinism",
        name: "Determinism",
        description: "Equal seeds produce byte-identical worlds however they are stepped",
        check: determinism,
    },
    TestScenario {
        key: "catch-up",
        name: "Catch-up",
        description: "A multi-year catch-up equals many one-hour steps",
        check: catch_up,
    },
    TestScenario {
        key: "population",
        name: "Population",
        description: "Mean sampled arrivals match the configured rate",
        check: population,
    },
];

pub fn list_scenarios() -> impl Iterator<Item = (&'static str, &'static str)> {
    SCENARIOS.iter().map(|scenario| (scenario.key, scenario.description))
}

pub fn get_scenario(key: &str) -> Option<TestScenario> {
    SCENARIOS
        .iter()
        .find(|scenario| scenario.key.eq_ignore_ascii_case(key.trim()))
        .copied()
}

/// Split the `--scenarios` argument; `all` expands to every scenario.
pub fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s.eq_ignore_ascii_case("all")) {
        scenarios.retain(|s| !s.eq_ignore_ascii_case("all"));
        for scenario in &SCENARIOS {
            if !scenarios.iter().any(|s| s == scenario.key) {
                scenarios.push(scenario.key.to_string());
            }
        }
    }
    scenarios
}

fn smoke(ctx: &ScenarioCtx<'_>) -> Result<String> {
    let game = run_world(ctx.seed, ctx.hours, ctx.config)?;
    let snapshot = game.to_json()?;
    let restored = Game::from_json(&snapshot).context("restoring snapshot")?;
    ensure!(restored.to_json()? == snapshot, "restored snapshot differs");
    let summary = SimulationSummary::capture(&game, ctx.hours)?;
    Ok(format!(
        "{} events, {} actors, {} live encounters",
        summary.stats.events_fired, summary.actors, summary.live_encounters
    ))
}

fn determinism(ctx: &ScenarioCtx<'_>) -> Result<String> {
    let stepped = run_world(ctx.seed, ctx.hours, ctx.config)?;
    let again = run_world(ctx.seed, ctx.hours, ctx.config)?;
    let mut jumped = Game::new(ctx.seed, ctx.config.clone())?;
    jumped.advance(TimeDuration::from_hours(ctx.hours))?;

    let reference = SimulationSummary::capture(&stepped, ctx.hours)?;
    for (label, other) in [("repeat run", &again), ("single jump", &jumped)] {
        let summary = SimulationSummary::capture(other, ctx.hours)?;
        ensure!(
            summary.fingerprint == reference.fingerprint,
            "{label} diverged: {} vs {}",
            summary.fingerprint,
            reference.fingerprint
        );
    }
    Ok(format!("fingerprint {}", &reference.fingerprint[..16]))
}

fn catch_up(ctx: &ScenarioCtx<'_>) -> Result<String> {
    let game = Game::new(ctx.seed, ctx.config.clone())?;
    let player = game.player()?.clone();
    let start = player.last_simulated();
    let target = start + TimeDuration::from_years(CATCH_UP_YEARS);

    let mut jump = player.clone();
    let ticks = jump.simulate_to(target, &ctx.config.upkeep)?;

    let mut stepped = player;
    let mut now = start;
    while now < target {
        now = (now + TimeDuration::from_hours(1)).min(target);
        stepped.simulate_to(now, &ctx.config.upkeep)?;
    }
    ensure!(jump == stepped, "one jump and hourly steps disagree at {target}");

    let err = stepped
        .simulate_to(start, &ctx.config.upkeep)
        .err()
        .context("rewinding an actor was accepted")?;
    ensure!(err.is_retrocausal(), "rewind failed with the wrong error: {err}");
    Ok(format!("{ticks} upkeep ticks, end state {:?}", jump.end_state()))
}

fn population(ctx: &ScenarioCtx<'_>) -> Result<String> {
    let location = Location {
        id: LocationId(0),
        name: "Proving Flats".to_string(),
        kind: LocationKind::Crossroads,
        terrain: Terrain::Flat,
        x: 0.0,
        y: 0.0,
        wealth: 1.0,
        population: 1.0,
    };
    let config = &ctx.config.encounter;
    let hours = ctx.hours.clamp(1, POPULATION_MAX_HOURS);
    let now = TimePoint::ZERO + TimeDuration::from_hours(hours);
    let expected = Encounter::arrival_rate(&location, config) * TimeDuration::from_hours(hours).as_hours_f64();

    let mut root = XorShift::seed_from_u64(ctx.seed);
    let mut total = 0_u64;
    for _ in 0..POPULATION_TRIALS {
        let mut encounter = Encounter::new(location.id, TimePoint::ZERO, root.split(), config.simulate_all);
        let admitted = encounter.sample_arrivals(now, &location, config)?;
        // Discarded arrivals still count toward the drawn total.
        total += u64::try_from(admitted.len()).unwrap_or(u64::MAX) + encounter.discarded_arrivals();
    }

    #[allow(clippy::cast_precision_loss)]
    let trials = POPULATION_TRIALS as f64;
    #[allow(clippy::cast_precision_loss)]
    let mean = total as f64 / trials;
    let tolerance = 5.0 * (expected / trials).sqrt() + 1e-9;
    ensure!(
        (mean - expected).abs() <= tolerance,
        "mean arrivals {mean:.3} over {hours}h, expected {expected:.3} ± {tolerance:.3}"
    );
    Ok(format!("mean {mean:.3} vs expected {expected:.3} over {hours}h"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(config: &SimConfig) -> ScenarioCtx<'_> {
        ScenarioCtx {
            seed: 99,
            hours: 4,
            config,
        }
    }

    #[test]
    fn every_scenario_is_listed_and_found() {
        let keys: Vec<_> = list_scenarios().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["smoke", "determinism", "catch-up", "population"]);
        assert_eq!(get_scenario(" Smoke ").map(|s| s.name), Some("Smoke"));
        assert!(get_scenario("weather").is_none());
    }

    #[test]
    fn all_expands_without_duplicates() {
        let expanded = expand_scenarios("population,all");
        assert_eq!(expanded, vec!["population", "smoke", "determinism", "catch-up"]);
        assert_eq!(expand_scenarios("smoke,bogus"), vec!["smoke", "bogus"]);
    }

    #[test]
    fn scenarios_pass_on_the_default_config() {
        let config = SimConfig::default();
        for scenario in SCENARIOS {
            let note = (scenario.check)(&ctx(&config)).unwrap();
            assert!(!note.is_empty(), "{} left no note", scenario.key);
        }
    }
}
