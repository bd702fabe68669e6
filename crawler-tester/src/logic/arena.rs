//! Archetype tournament: pairs of crawlers fight at an empty location until
//! one side ends, surrenders, or the time limit passes.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use crawler_game::{
    ActorId, Archetype, Game, GameEvent, Location, LocationId, LocationKind, Map, SimConfig,
    Terrain, TimeDuration,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::common::split_csv;

const ARENA: LocationId = LocationId(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoutOutcome {
    Challenger,
    Defender,
    Draw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoutRecord {
    pub seed: u64,
    pub challenger: Archetype,
    pub defender: Archetype,
    pub outcome: BoutOutcome,
    pub hours: f64,
    pub attacks: u64,
}

impl BoutRecord {
    #[must_use]
    pub const fn winner(&self) -> Option<Archetype> {
        match self.outcome {
            BoutOutcome::Challenger => Some(self.challenger),
            BoutOutcome::Defender => Some(self.defender),
            BoutOutcome::Draw => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaStanding {
    pub bouts: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArenaSummary {
    pub bouts: Vec<BoutRecord>,
    pub standings: BTreeMap<Archetype, ArenaStanding>,
}

impl ArenaSummary {
    fn record(&mut self, bout: BoutRecord) {
        let winner = bout.winner();
        for side in [bout.challenger, bout.defender] {
            let standing = self.standings.entry(side).or_default();
            standing.bouts += 1;
            match winner {
                None => standing.draws += 1,
                Some(archetype) if archetype == side => standing.wins += 1,
                Some(_) => standing.losses += 1,
            }
        }
        self.bouts.push(bout);
    }

    /// Archetypes ordered by wins, then fewest losses.
    #[must_use]
    pub fn ranking(&self) -> Vec<(Archetype, &ArenaStanding)> {
        let mut ranked: Vec<_> = self.standings.iter().map(|(a, s)| (*a, s)).collect();
        ranked.sort_by(|(a, x), (b, y)| {
            y.wins
                .cmp(&x.wins)
                .then(x.losses.cmp(&y.losses))
                .then(a.cmp(b))
        });
        ranked
    }
}

/// Parse `--archetypes`; `all` means every non-player archetype.
///
/// # Errors
///
/// Returns an error for unknown keys or fewer than two archetypes.
pub fn parse_archetypes(arg: &str) -> Result<Vec<Archetype>> {
    let mut archetypes = Vec::new();
    for token in split_csv(arg) {
        if token.eq_ignore_ascii_case("all") {
            archetypes.extend(Archetype::NPC);
            continue;
        }
        let archetype =
            Archetype::from_key(&token).with_context(|| format!("unknown archetype {token}"))?;
        archetypes.push(archetype);
    }
    archetypes.sort();
    archetypes.dedup();
    if archetypes.len() < 2 {
        bail!("the arena needs at least two archetypes, got {}", archetypes.len());
    }
    Ok(archetypes)
}

/// A home settlement for the idle player and a distant, empty ring.
fn arena_map() -> Map {
    Map::from_locations(vec![
        Location {
            id: LocationId(0),
            name: "Staging Yard".to_string(),
            kind: LocationKind::Settlement,
            terrain: Terrain::Flat,
            x: 0.0,
            y: 0.0,
            wealth: 1.0,
            population: 0.0,
        },
        Location {
            id: ARENA,
            name: "Proving Ring".to_string(),
            kind: LocationKind::Crossroads,
            terrain: Terrain::Ruins,
            x: 10_000.0,
            y: 0.0,
            wealth: 1.0,
            population: 0.0,
        },
    ])
}

/// Fight one bout between freshly built crawlers.
///
/// # Errors
///
/// Returns an error if the world cannot be built or an update fails.
pub fn run_bout(
    seed: u64,
    challenger: Archetype,
    defender: Archetype,
    hours: i64,
    config: &SimConfig,
) -> Result<BoutRecord> {
    let mut game = Game::with_map(seed, config.clone(), arena_map())?;
    let a = game.spawn_now(ARENA, challenger)?;
    let b = game.spawn_now(ARENA, defender)?;
    game.attack(a, b)?;
    game.attack(b, a)?;

    let start = game.now();
    let limit = start + TimeDuration::from_hours(hours.max(1));
    let outcome = loop {
        if let Some(outcome) = judge(&game, a, b)? {
            break outcome;
        }
        if game.now() >= limit || !fighting(&game, a, b) {
            break BoutOutcome::Draw;
        }
        game.advance(TimeDuration::from_hours(1))
            .with_context(|| format!("bout {challenger} vs {defender} seed {seed}"))?;
    };

    Ok(BoutRecord {
        seed,
        challenger,
        defender,
        outcome,
        hours: (game.now() - start).as_hours_f64(),
        attacks: game.stats().attacks_resolved,
    })
}

fn judge(game: &Game, a: ActorId, b: ActorId) -> Result<Option<BoutOutcome>> {
    let (first, second) = (game.actor(a)?, game.actor(b)?);
    let outcome = match (first.has_ended(), second.has_ended()) {
        (true, true) => Some(BoutOutcome::Draw),
        (false, true) => Some(BoutOutcome::Challenger),
        (true, false) => Some(BoutOutcome::Defender),
        (false, false) if second.has_surrendered_to(a) => Some(BoutOutcome::Challenger),
        (false, false) if first.has_surrendered_to(b) => Some(BoutOutcome::Defender),
        (false, false) => None,
    };
    Ok(outcome)
}

fn fighting(game: &Game, a: ActorId, b: ActorId) -> bool {
    game.scheduler().iter().any(|scheduled| {
        matches!(scheduled.event, GameEvent::Attack { attacker, .. } if attacker == a || attacker == b)
    })
}

/// Every ordered pairing of `archetypes` on every seed.
///
/// # Errors
///
/// Returns the first bout that fails to run.
pub fn run_arena(
    archetypes: &[Archetype],
    seeds: &[u64],
    hours: i64,
    config: &SimConfig,
    verbose: bool,
) -> Result<ArenaSummary> {
    let mut summary = ArenaSummary::default();
    for &seed in seeds {
        for &challenger in archetypes {
            for &defender in archetypes {
                if challenger == defender {
                    continue;
                }
                let bout = run_bout(seed, challenger, defender, hours, config)?;
                if verbose {
                    let verdict = match bout.winner() {
                        Some(winner) => format!("{winner} wins").green(),
                        None => "draw".to_string().yellow(),
                    };
                    println!(
                        "  ⚔️  [seed {seed}] {challenger} vs {defender}: {verdict} after {:.1}h",
                        bout.hours
                    );
                }
                log::debug!("bout {challenger} vs {defender} seed {seed}: {:?}", bout.outcome);
                summary.record(bout);
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archetype_lists_parse() {
        let parsed = parse_archetypes("mercenary, bandit,mercenary").unwrap();
        assert_eq!(parsed, vec![Archetype::Bandit, Archetype::Mercenary]);
        assert_eq!(parse_archetypes("all").unwrap().len(), Archetype::NPC.len());
        assert!(parse_archetypes("bandit").is_err());
        assert!(parse_archetypes("bandit,dragon").is_err());
    }

    #[test]
    fn bouts_are_reproducible() {
        let config = SimConfig::default();
        let first = run_bout(5, Archetype::Mercenary, Archetype::Trader, 48, &config).unwrap();
        let second = run_bout(5, Archetype::Mercenary, Archetype::Trader, 48, &config).unwrap();
        assert_eq!(first.outcome, second.outcome);
        assert_eq!(first.attacks, second.attacks);
        assert!(first.hours <= 48.0);
    }

    #[test]
    fn standings_tally_both_sides() {
        let mut summary = ArenaSummary::default();
        for outcome in [BoutOutcome::Challenger, BoutOutcome::Draw] {
            summary.record(BoutRecord {
                seed: 1,
                challenger: Archetype::Bandit,
                defender: Archetype::Trader,
                outcome,
                hours: 1.0,
                attacks: 2,
            });
        }
        let bandit = &summary.standings[&Archetype::Bandit];
        let trader = &summary.standings[&Archetype::Trader];
        assert_eq!((bandit.wins, bandit.losses, bandit.draws), (1, 0, 1));
        assert_eq!((trader.wins, trader.losses, trader.draws), (0, 1, 1));
        assert_eq!(summary.ranking()[0].0, Archetype::Bandit);
    }

    #[test]
    fn arena_runs_every_ordered_pair() {
        let config = SimConfig::default();
        let archetypes = [Archetype::Bandit, Archetype::Mercenary];
        let summary = run_arena(&archetypes, &[2], 12, &config, false).unwrap();
        assert_eq!(summary.bouts.len(), 2);
        let total: u32 = summary.standings.values().map(|s| s.bouts).sum();
        assert_eq!(total, 4);
    }
}
