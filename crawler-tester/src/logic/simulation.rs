use anyhow::{Context, Result, ensure};
use crawler_game::{FileStorage, Game, GameEngine, GameStats, SimConfig, TimeDuration, TimePoint};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Outcome of one headless world run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub seed: u64,
    pub hours: i64,
    pub final_time: String,
    pub actors: usize,
    pub ended_actors: usize,
    pub live_encounters: usize,
    pub stats: GameStats,
    /// SHA-256 of the final snapshot.
    pub fingerprint: String,
}

impl SimulationSummary {
    /// Capture `game` after a run of `hours`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized.
    pub fn capture(game: &Game, hours: i64) -> Result<Self> {
        let snapshot = game.to_json().context("serializing snapshot")?;
        Ok(Self {
            seed: game.seed(),
            hours,
            final_time: game.now().to_string(),
            actors: game.actors().count(),
            ended_actors: game.actors().filter(|actor| actor.has_ended()).count(),
            live_encounters: game.encounters().count(),
            stats: game.stats(),
            fingerprint: fingerprint(&snapshot),
        })
    }
}

pub fn fingerprint(snapshot: &str) -> String {
    format!("{:x}", Sha256::digest(snapshot.as_bytes()))
}

/// Build a world from `seed` and run it for `hours` in one-hour steps.
///
/// # Errors
///
/// Returns an error if the world cannot be built, an update fails, or a
/// clock check fails after any step.
pub fn run_world(seed: u64, hours: i64, config: &SimConfig) -> Result<Game> {
    let mut game = Game::new(seed, config.clone()).with_context(|| format!("building world {seed}"))?;
    step_world(&mut game, hours)?;
    Ok(game)
}

/// Advance `game` hour by hour, checking the clocks after every step.
///
/// # Errors
///
/// Returns an error if an update fails or the clocks go wrong.
pub fn step_world(game: &mut Game, hours: i64) -> Result<()> {
    let step = TimeDuration::from_hours(1);
    for _ in 0..hours {
        let before = game.now();
        game.advance(step)
            .with_context(|| format!("advancing world {} from {before}", game.seed()))?;
        check_clocks(game, before)?;
    }
    Ok(())
}

/// No clock runs backwards and nothing is simulated past the game clock.
///
/// # Errors
///
/// Returns an error naming the first clock out of line.
pub fn check_clocks(game: &Game, before: TimePoint) -> Result<()> {
    let now = game.now();
    ensure!(now >= before, "game clock went back from {before} to {now}");
    for actor in game.actors() {
        ensure!(
            actor.last_simulated() <= now,
            "actor {} simulated to {} past the game clock {now}",
            actor.id,
            actor.last_simulated()
        );
    }
    for encounter in game.encounters() {
        ensure!(
            encounter.time() <= now,
            "encounter at {} updated to {} past the game clock {now}",
            encounter.location(),
            encounter.time()
        );
    }
    Ok(())
}

/// Run each seed, save it through `engine`, and check the stored snapshot
/// restores to the same state.
///
/// # Errors
///
/// Returns an error if a run fails, a save cannot be written or read back,
/// or the restored game differs.
pub fn archive_runs(
    engine: &GameEngine<FileStorage>,
    seeds: &[u64],
    hours: i64,
) -> Result<Vec<SimulationSummary>> {
    let mut summaries = Vec::with_capacity(seeds.len());
    for &seed in seeds {
        let mut game = engine.create_game(seed)?;
        step_world(&mut game, hours)?;
        let save_name = format!("seed-{seed}");
        engine.save_game(&save_name, &game)?;
        let restored = engine
            .load_game(&save_name)?
            .with_context(|| format!("save {save_name} vanished"))?;
        ensure!(
            restored.to_json()? == game.to_json()?,
            "save {save_name} does not restore the same world"
        );
        log::info!("archived world {seed} as {save_name}");
        summaries.push(SimulationSummary::capture(&game, hours)?);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_seeds_share_a_fingerprint() {
        let config = SimConfig::default();
        let a = SimulationSummary::capture(&run_world(11, 6, &config).unwrap(), 6).unwrap();
        let b = SimulationSummary::capture(&run_world(11, 6, &config).unwrap(), 6).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
        assert_eq!(a.seed, 11);
        assert!(a.stats.events_fired > 0);
    }

    #[test]
    fn archived_runs_can_be_read_back() {
        let dir = std::env::temp_dir().join(format!("crawler-archive-{}", std::process::id()));
        let engine = GameEngine::new(SimConfig::default(), FileStorage::new(&dir).unwrap());
        let summaries = archive_runs(&engine, &[3, 4], 2).unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(dir.join("seed-3.json").exists());
        assert!(dir.join("seed-4.json").exists());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
