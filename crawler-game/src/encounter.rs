//! Location-bound encounters and their dynamic population.
//!
//! An encounter keeps its own clock. When it is advanced, the elapsed span
//! since the previous update is turned into a Poisson-distributed batch of
//! arrivals, so a location observed once a week still accumulates the right
//! population without being simulated in between. Admitting the arrivals
//! needs the rest of the game (actor creation, catch-up, scheduling), so this
//! type only samples them; `Game` admits them and then closes the update.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::actor::ActorId;
use crate::archetype::Archetype;
use crate::config::EncounterConfig;
use crate::error::SimError;
use crate::numbers::{floor_f64_to_u64, i64_to_f64, u64_to_i64};
use crate::rng::{XorShift, weighted_pick};
use crate::time::{TimeDuration, TimePoint};
use crate::world::{Location, LocationId};

/// Per-presence bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub arrived: TimePoint,
    /// Scheduled departure of a transient actor.
    pub departs: Option<TimePoint>,
}

/// A sampled arrival waiting to be admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingArrival {
    pub at: TimePoint,
    pub lifetime: TimeDuration,
    pub archetype: Archetype,
    /// Seed of the new actor's own stream.
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    location: LocationId,
    time: TimePoint,
    present: BTreeMap<ActorId, Presence>,
    rng: XorShift,
    simulate_all: bool,
    resident: Option<ActorId>,
    arrivals_admitted: u64,
    discarded_arrivals: u64,
}

impl Encounter {
    #[must_use]
    pub fn new(location: LocationId, created_at: TimePoint, rng: XorShift, simulate_all: bool) -> Self {
        Self {
            location,
            time: created_at,
            present: BTreeMap::new(),
            rng,
            simulate_all,
            resident: None,
            arrivals_admitted: 0,
            discarded_arrivals: 0,
        }
    }

    /// Hourly arrival rate for `location`.
    #[must_use]
    pub fn arrival_rate(location: &Location, config: &EncounterConfig) -> f64 {
        config.kind_rate(location.kind) * location.population * config.density
    }

    /// Lifetime of a dynamic arrival, in whole hours, never below the configured minimum.
    pub fn draw_lifetime(rng: &mut XorShift, config: &EncounterConfig) -> TimeDuration {
        let hours = u64_to_i64(rng.poisson(config.mean_lifetime_hours));
        TimeDuration::from_hours(hours.max(config.min_lifetime_hours))
    }

    #[must_use]
    pub const fn location(&self) -> LocationId {
        self.location
    }

    /// The encounter's local clock.
    #[must_use]
    pub const fn time(&self) -> TimePoint {
        self.time
    }

    #[must_use]
    pub const fn simulate_all(&self) -> bool {
        self.simulate_all
    }

    /// The permanent actor of this location (settlement or cache).
    #[must_use]
    pub const fn resident(&self) -> Option<ActorId> {
        self.resident
    }

    #[must_use]
    pub const fn arrivals_admitted(&self) -> u64 {
        self.arrivals_admitted
    }

    /// Arrivals whose whole lifetime fell between two updates.
    #[must_use]
    pub const fn discarded_arrivals(&self) -> u64 {
        self.discarded_arrivals
    }

    #[must_use]
    pub fn contains(&self, actor: ActorId) -> bool {
        self.present.contains_key(&actor)
    }

    #[must_use]
    pub fn presence(&self, actor: ActorId) -> Option<&Presence> {
        self.present.get(&actor)
    }

    /// Present actors in id order.
    #[must_use]
    pub fn actors(&self) -> Vec<ActorId> {
        self.present.keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.present.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    /// Nobody but the resident is here.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.present
            .keys()
            .all(|actor| Some(*actor) == self.resident)
    }

    /// Place the resident without announcing or syncing it.
    pub fn install_resident(&mut self, actor: ActorId) {
        self.resident = Some(actor);
        self.present.insert(
            actor,
            Presence {
                arrived: self.time,
                departs: None,
            },
        );
    }

    /// Child stream for an actor created by this encounter.
    pub fn split_rng(&mut self) -> XorShift {
        self.rng.split()
    }

    /// Sample the arrivals of `(time, now]` in arrival order.
    ///
    /// Arrivals whose lifetime ends by `now` are dropped and counted in
    /// `discarded_arrivals`. The clock is left alone so the caller can admit
    /// the survivors at their own instants; `close_update` advances it.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Retrocausality` if `now` is before the encounter
    /// clock and `SimError::InvalidTime` for `NONE`.
    pub fn sample_arrivals(
        &mut self,
        now: TimePoint,
        location: &Location,
        config: &EncounterConfig,
    ) -> Result<Vec<PendingArrival>, SimError> {
        self.check_time(now)?;
        if now == self.time {
            return Ok(Vec::new());
        }
        let elapsed = now - self.time;
        let lambda = Self::arrival_rate(location, config) * elapsed.as_hours_f64();
        let count = self.rng.poisson(lambda);
        let span = i64_to_f64(elapsed.seconds());
        let weights = Archetype::arrival_weights(location.kind);

        let mut arrivals = Vec::new();
        for _ in 0..count {
            let offset = u64_to_i64(floor_f64_to_u64(self.rng.next_f64() * span)) + 1;
            let at = self.time + TimeDuration::from_seconds(offset.min(elapsed.seconds()));
            let lifetime = Self::draw_lifetime(&mut self.rng, config);
            let archetype = weighted_pick(weights, &mut self.rng).unwrap_or(Archetype::Traveler);
            let seed = self.rng.next_u64();
            if at + lifetime <= now || at < self.time {
                self.discarded_arrivals += 1;
                continue;
            }
            arrivals.push(PendingArrival {
                at,
                lifetime,
                archetype,
                seed,
            });
        }
        arrivals.sort_by_key(|arrival| arrival.at);
        Ok(arrivals)
    }

    /// Advance the clock after the sampled arrivals have been admitted.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Retrocausality` if `now` is before the encounter clock.
    pub fn close_update(&mut self, now: TimePoint) -> Result<(), SimError> {
        self.check_time(now)?;
        if now > self.time {
            log::trace!("encounter {} ticked to {now}", self.location);
        }
        self.time = now;
        Ok(())
    }

    /// Record an actor as present from `at`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Retrocausality` if `at` is before the encounter clock.
    pub fn insert(&mut self, actor: ActorId, at: TimePoint, departs: Option<TimePoint>) -> Result<(), SimError> {
        self.check_time(at)?;
        if departs.is_some() {
            self.arrivals_admitted += 1;
        }
        self.present.insert(actor, Presence { arrived: at, departs });
        Ok(())
    }

    pub fn remove(&mut self, actor: ActorId) -> Option<Presence> {
        self.present.remove(&actor)
    }

    fn check_time(&self, requested: TimePoint) -> Result<(), SimError> {
        if requested.is_none() {
            return Err(SimError::InvalidTime);
        }
        if requested < self.time {
            return Err(SimError::retrocausal(
                format!("encounter {}", self.location),
                self.time,
                requested,
            ));
        }
        Ok(())
    }
}
