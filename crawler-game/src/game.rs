//! The game session: one scheduler, one map, every actor and encounter.
//!
//! `Game` is the explicit context every simulation entry point runs against.
//! Actors and encounters keep their own clocks and are only caught up when
//! an event needs them, so the cost of `process_events_until` tracks what is
//! observed rather than the size of the world.
//!
//! Clock discipline: an actor present in an encounter is never simulated
//! past the encounter's clock. Every handler first advances the encounter to
//! "now" (admitting the arrivals of the elapsed span), and only then touches
//! the actors in it.

use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::actor::{Actor, ActorId, Crawler, EndState, SiteKind};
use crate::archetype::{Archetype, build_site};
use crate::combat::{self, AttackReport, HitOutcome};
use crate::config::SimConfig;
use crate::constants::{DOMAIN_MAP, DOMAIN_SPAWN, DOMAIN_WORLD};
use crate::encounter::Encounter;
use crate::error::SimError;
use crate::event::GameEvent;
use crate::inventory::{Commodity, Inventory};
use crate::rng::{XorShift, derive_stream_seed};
use crate::scheduler::Scheduler;
use crate::time::{TimeDuration, TimePoint};
use crate::world::{LocationId, LocationKind, Map};

/// Running totals for reports and population statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    pub events_fired: u64,
    pub arrivals_admitted: u64,
    pub arrivals_discarded: u64,
    pub attacks_resolved: u64,
    pub encounters_materialized: u64,
    pub encounters_evicted: u64,
    /// Retrocausal updates dropped in lenient mode.
    pub skipped_updates: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    config: SimConfig,
    seed: u64,
    now: TimePoint,
    scheduler: Scheduler<GameEvent>,
    map: Map,
    actors: BTreeMap<ActorId, Actor>,
    encounters: BTreeMap<LocationId, Encounter>,
    residents: BTreeMap<LocationId, ActorId>,
    player: ActorId,
    next_actor_id: u64,
    world_rng: XorShift,
    spawn_rng: XorShift,
    /// Actors with an attack round pending.
    attacking: BTreeSet<ActorId>,
    /// Due time of the live `EncounterTick` chain.
    next_tick: Option<TimePoint>,
    stats: GameStats,
}

impl Game {
    /// Build a fresh world from `seed` and place the player at the first
    /// settlement.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` if the configuration is invalid.
    pub fn new(seed: u64, config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut map_rng = XorShift::seed_from_u64(derive_stream_seed(seed, DOMAIN_MAP));
        let map = Map::generate(&mut map_rng, &config.map);
        Self::with_map(seed, config, map)
    }

    /// Build a game over an explicit map. The player starts at location 0.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` for an invalid configuration and
    /// `SimError::UnknownLocation` for an empty map.
    pub fn with_map(seed: u64, config: SimConfig, map: Map) -> Result<Self, SimError> {
        config.validate()?;
        let start = map.location(LocationId(0))?.clone();
        let mut game = Self {
            config,
            seed,
            now: TimePoint::ZERO,
            scheduler: Scheduler::new(),
            map,
            actors: BTreeMap::new(),
            encounters: BTreeMap::new(),
            residents: BTreeMap::new(),
            player: ActorId(0),
            next_actor_id: 0,
            world_rng: XorShift::seed_from_u64(derive_stream_seed(seed, DOMAIN_WORLD)),
            spawn_rng: XorShift::seed_from_u64(derive_stream_seed(seed, DOMAIN_SPAWN)),
            attacking: BTreeSet::new(),
            next_tick: None,
            stats: GameStats::default(),
        };

        let settlements: Vec<_> = game
            .map
            .iter()
            .filter(|location| location.kind == LocationKind::Settlement)
            .cloned()
            .collect();
        for location in settlements {
            let id = game.allocate_id();
            let rng = game.world_rng.split();
            if let Some(site) = build_site(id, &location, TimePoint::ZERO, rng) {
                game.actors.insert(id, site);
                game.residents.insert(location.id, id);
            }
        }

        let player = game.allocate_id();
        let rng = game.world_rng.split();
        game.actors.insert(
            player,
            Archetype::Player.build(player, &start, TimePoint::ZERO, rng),
        );
        game.player = player;

        game.update_encounter(start.id, TimePoint::ZERO)?;
        game.add_actor_at(start.id, player, TimePoint::ZERO, None)?;
        game.start_ticks(start.id)?;
        let sweep_at = game.now + game.config.sweep_interval();
        game.schedule(sweep_at, GameEvent::Sweep)?;
        log::debug!("game {seed} ready: {} locations", game.map.len());
        Ok(game)
    }

    // Accessors -------------------------------------------------------------

    #[must_use]
    pub const fn now(&self) -> TimePoint {
        self.now
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    #[must_use]
    pub const fn map(&self) -> &Map {
        &self.map
    }

    #[must_use]
    pub const fn stats(&self) -> GameStats {
        self.stats
    }

    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler<GameEvent> {
        &self.scheduler
    }

    #[must_use]
    pub const fn player_id(&self) -> ActorId {
        self.player
    }

    /// # Errors
    ///
    /// Returns `SimError::UnknownActor` if the player record is missing.
    pub fn player(&self) -> Result<&Actor, SimError> {
        self.actor(self.player)
    }

    /// # Errors
    ///
    /// Returns `SimError::UnknownActor` for ids not in this game.
    pub fn actor(&self, id: ActorId) -> Result<&Actor, SimError> {
        self.actors.get(&id).ok_or(SimError::UnknownActor(id))
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    /// The encounter at `location`, if it is currently materialized.
    #[must_use]
    pub fn encounter(&self, location: LocationId) -> Option<&Encounter> {
        self.encounters.get(&location)
    }

    pub fn encounters(&self) -> impl Iterator<Item = &Encounter> {
        self.encounters.values()
    }

    /// Where `actor` is present right now; `None` while travelling.
    #[must_use]
    pub fn present_location(&self, actor: ActorId) -> Option<LocationId> {
        let location = self.actors.get(&actor)?.location;
        self.encounters
            .get(&location)
            .filter(|encounter| encounter.contains(actor))
            .map(|_| location)
    }

    // Scheduling ------------------------------------------------------------

    /// Queue `event` at `at`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Retrocausality` if `at` is before the game clock and
    /// `SimError::InvalidTime` for `NONE`.
    pub fn schedule(&mut self, at: TimePoint, event: GameEvent) -> Result<u64, SimError> {
        if at.is_none() {
            return Err(SimError::InvalidTime);
        }
        if at < self.now {
            log::warn!("refusing to schedule {event} at {at}; clock is at {}", self.now);
            return Err(SimError::retrocausal("game scheduler", self.now, at));
        }
        Ok(self.scheduler.schedule(at, event.priority(), event))
    }

    /// Schedule a scripted arrival of `archetype` at `location`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::UnknownLocation` or the scheduling errors of `schedule`.
    pub fn schedule_spawn(
        &mut self,
        location: LocationId,
        archetype: Archetype,
        at: TimePoint,
    ) -> Result<u64, SimError> {
        self.map.location(location)?;
        self.schedule(at, GameEvent::Spawn { location, archetype })
    }

    /// Fire every event due at or before `target`, polling `stop` before each
    /// one. The clock ends at `target` unless `stop` interrupted the run, in
    /// which case it stays at the last fired event. Returns the number of
    /// events fired.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Retrocausality` for a target before the clock, and
    /// in strict mode propagates any retrocausal update raised by a handler.
    /// Other handler errors are always propagated.
    pub fn process_events_until<S>(&mut self, target: TimePoint, mut stop: S) -> Result<usize, SimError>
    where
        S: FnMut() -> bool,
    {
        if target.is_none() {
            return Err(SimError::InvalidTime);
        }
        if target < self.now {
            let err = SimError::retrocausal("game clock", self.now, target);
            if self.config.strict_time {
                return Err(err);
            }
            log::error!("{err}; ignoring");
            self.stats.skipped_updates += 1;
            return Ok(0);
        }

        let mut fired = 0;
        let mut interrupted = false;
        loop {
            if stop() {
                interrupted = true;
                break;
            }
            let Some(scheduled) = self.scheduler.pop_due(target) else {
                break;
            };
            if scheduled.time < self.now {
                let err = SimError::retrocausal("game clock", self.now, scheduled.time);
                self.lenient(err)?;
                continue;
            }
            self.now = scheduled.time;
            fired += 1;
            self.stats.events_fired += 1;
            if let Err(err) = self.dispatch(scheduled.event) {
                if err.is_retrocausal() {
                    self.lenient(err)?;
                } else {
                    return Err(err);
                }
            }
        }
        if !interrupted {
            self.now = target;
        }
        Ok(fired)
    }

    /// Run for `span` without interruption.
    ///
    /// # Errors
    ///
    /// See `process_events_until`.
    pub fn advance(&mut self, span: TimeDuration) -> Result<usize, SimError> {
        let target = self.now + span;
        self.process_events_until(target, || false)
    }

    fn lenient(&mut self, err: SimError) -> Result<(), SimError> {
        if self.config.strict_time {
            return Err(err);
        }
        log::error!("{err}; update skipped");
        self.stats.skipped_updates += 1;
        Ok(())
    }

    fn dispatch(&mut self, event: GameEvent) -> Result<(), SimError> {
        log::trace!("{} fire {event}", self.now);
        match event {
            GameEvent::Arrival { actor, location } => self.on_arrival(actor, location),
            GameEvent::Departure { actor, location } => self.on_departure(actor, location),
            GameEvent::Travel { actor, from, to } => self.on_travel(actor, from, to),
            GameEvent::Spawn { location, archetype } => self.spawn_now(location, archetype).map(|_| ()),
            GameEvent::Attack { attacker, target } => self.on_attack(attacker, target),
            GameEvent::EncounterTick { location } => self.on_tick(location),
            GameEvent::Sweep => self.on_sweep(),
        }
    }

    // Encounters ------------------------------------------------------------

    fn allocate_id(&mut self) -> ActorId {
        let id = ActorId(self.next_actor_id);
        self.next_actor_id += 1;
        id
    }

    /// Create the encounter at `location` on first observation. Its clock
    /// starts one dynamic lifetime in the past so the location already holds
    /// a standing population when first seen.
    fn materialize(&mut self, location: LocationId) -> Result<(), SimError> {
        if self.encounters.contains_key(&location) {
            return Ok(());
        }
        let site = self.map.location(location)?.clone();
        let mut rng = self.world_rng.split();
        let backdate = Encounter::draw_lifetime(&mut rng, &self.config.encounter);
        let mut encounter = Encounter::new(
            location,
            self.now - backdate,
            rng,
            self.config.encounter.simulate_all,
        );

        let resident = match self.residents.get(&location) {
            Some(id) => Some(*id),
            None if site.kind.has_cache() => {
                let id = self.allocate_id();
                let rng = encounter.split_rng();
                build_site(id, &site, encounter.time(), rng).map(|actor| {
                    self.actors.insert(id, actor);
                    self.residents.insert(location, id);
                    id
                })
            }
            None => None,
        };
        if let Some(id) = resident {
            encounter.install_resident(id);
        }
        log::debug!(
            "materialized encounter at {} ({}), clock {}",
            site.name,
            location,
            encounter.time()
        );
        self.encounters.insert(location, encounter);
        self.stats.encounters_materialized += 1;
        Ok(())
    }

    /// Advance the encounter at `location` to `now`, admitting the dynamic
    /// arrivals of the elapsed span in arrival order.
    fn update_encounter(&mut self, location: LocationId, now: TimePoint) -> Result<(), SimError> {
        self.materialize(location)?;
        let site = self.map.location(location)?.clone();
        let encounter = self
            .encounters
            .get_mut(&location)
            .ok_or(SimError::UnknownLocation(location))?;
        let discarded_before = encounter.discarded_arrivals();
        let arrivals = encounter.sample_arrivals(now, &site, &self.config.encounter)?;
        self.stats.arrivals_discarded += encounter.discarded_arrivals() - discarded_before;

        for arrival in arrivals {
            let id = self.allocate_id();
            let mut actor = arrival.archetype.build(
                id,
                &site,
                arrival.at,
                XorShift::seed_from_u64(arrival.seed),
            );
            actor.transient = true;
            self.actors.insert(id, actor);
            self.add_actor_at(location, id, arrival.at, Some(arrival.lifetime))?;
            self.stats.arrivals_admitted += 1;
        }

        self.encounters
            .get_mut(&location)
            .ok_or(SimError::UnknownLocation(location))?
            .close_update(now)
    }

    /// Bring every present crawler up to `at`. Static sites have no upkeep
    /// and keep their own clock.
    fn sync_present(&mut self, location: LocationId, at: TimePoint) -> Result<(), SimError> {
        let present = self
            .encounters
            .get(&location)
            .map(Encounter::actors)
            .unwrap_or_default();
        for id in present {
            let actor = self.actors.get_mut(&id).ok_or(SimError::UnknownActor(id))?;
            if actor.crawler().is_some() {
                actor.simulate_to(at, &self.config.upkeep)?;
            }
        }
        Ok(())
    }

    fn sync_actor(&mut self, id: ActorId, at: TimePoint) -> Result<(), SimError> {
        self.actors
            .get_mut(&id)
            .ok_or(SimError::UnknownActor(id))?
            .simulate_to(at, &self.config.upkeep)
            .map(|_| ())
    }

    /// Admit `actor` to the encounter at `location` at instant `at`.
    ///
    /// In simulate-all mode every present crawler is caught up to `at` first,
    /// so the arrival sees a time-consistent encounter. A finite `lifetime`
    /// schedules the actor's departure.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Retrocausality` if `at` is before the encounter clock
    /// or the actor's own clock, and the lookup errors for unknown ids.
    pub fn add_actor_at(
        &mut self,
        location: LocationId,
        actor: ActorId,
        at: TimePoint,
        lifetime: Option<TimeDuration>,
    ) -> Result<(), SimError> {
        self.materialize(location)?;
        let site_name = self.map.location(location)?.name.clone();
        let (clock, simulate_all, present) = {
            let encounter = self
                .encounters
                .get(&location)
                .ok_or(SimError::UnknownLocation(location))?;
            (encounter.time(), encounter.simulate_all(), encounter.actors())
        };
        if at < clock {
            return Err(SimError::retrocausal(
                format!("encounter {location}"),
                clock,
                at,
            ));
        }
        if simulate_all {
            self.sync_present(location, at)?;
        }

        let departs = lifetime.map(|span| at + span);
        let name = {
            let arriving = self
                .actors
                .get_mut(&actor)
                .ok_or(SimError::UnknownActor(actor))?;
            arriving.simulate_to(at, &self.config.upkeep)?;
            arriving.location = location;
            arriving.destination = None;
            arriving.mark_visited(location, at);
            arriving.message(at, format!("Arrived at {site_name}."));
            arriving.name.clone()
        };
        for other in &present {
            if let Some(other) = self.actors.get_mut(other) {
                other.message(at, format!("{name} arrived."));
            }
        }
        self.encounters
            .get_mut(&location)
            .ok_or(SimError::UnknownLocation(location))?
            .insert(actor, at, departs)?;
        log::debug!("{at} {name} ({actor}) arrived at {location}");

        if let Some(departs) = departs {
            self.schedule(departs, GameEvent::Departure { actor, location })?;
        }
        self.consider_combat(location, actor)?;
        for other in present {
            self.consider_combat(location, other)?;
        }
        Ok(())
    }

    /// Take `actor` out of the encounter at `location` and tell the others.
    /// The actor record itself stays.
    ///
    /// # Errors
    ///
    /// Returns `SimError::NotPresent` if the actor is not there.
    pub fn remove_actor(&mut self, location: LocationId, actor: ActorId) -> Result<(), SimError> {
        let now = self.now;
        let encounter = self
            .encounters
            .get_mut(&location)
            .ok_or(SimError::NotPresent { actor, location })?;
        encounter
            .remove(actor)
            .ok_or(SimError::NotPresent { actor, location })?;
        let others = encounter.actors();
        let name = self.actor(actor)?.name.clone();
        for other in others {
            if let Some(other) = self.actors.get_mut(&other) {
                other.message(now, format!("{name} left."));
            }
        }
        log::debug!("{now} {name} ({actor}) left {location}");
        Ok(())
    }

    /// Materialize the encounter at `location` if needed, advance it to now
    /// and catch up every crawler present.
    ///
    /// # Errors
    ///
    /// Returns `SimError::UnknownLocation` or a retrocausal update error.
    pub fn observe(&mut self, location: LocationId) -> Result<&Encounter, SimError> {
        let now = self.now;
        self.update_encounter(location, now)?;
        self.sync_present(location, now)?;
        self.encounters
            .get(&location)
            .ok_or(SimError::UnknownLocation(location))
    }

    /// Catch `actor` up to the game clock, advancing its encounter first.
    ///
    /// # Errors
    ///
    /// Returns `SimError::UnknownActor` or a retrocausal update error.
    pub fn simulate_actor(&mut self, actor: ActorId) -> Result<&Actor, SimError> {
        let now = self.now;
        if let Some(location) = self.present_location(actor) {
            self.update_encounter(location, now)?;
        }
        self.sync_actor(actor, now)?;
        self.actor(actor)
    }

    // Player and scripted actions ---------------------------------------------

    /// Create a crawler of `archetype` at `location` right now. Scripted
    /// crawlers are permanent and never player-controlled.
    ///
    /// # Errors
    ///
    /// Returns `SimError::UnknownLocation` or a retrocausal update error.
    pub fn spawn_now(&mut self, location: LocationId, archetype: Archetype) -> Result<ActorId, SimError> {
        let now = self.now;
        self.update_encounter(location, now)?;
        let site = self.map.location(location)?.clone();
        let id = self.allocate_id();
        let rng = self.spawn_rng.split();
        let mut actor = archetype.build(id, &site, now, rng);
        actor.player = false;
        self.actors.insert(id, actor);
        self.add_actor_at(location, id, now, None)?;
        Ok(id)
    }

    fn travel_plan(
        &self,
        actor: ActorId,
        from: LocationId,
        to: LocationId,
    ) -> Result<(TimeDuration, f64), SimError> {
        let traveller = self.actor(actor)?;
        let (speed_kmh, fuel_per_km) = traveller
            .crawler()
            .and_then(Crawler::traction)
            .ok_or(SimError::CannotTravel {
                actor,
                reason: "no working traction",
            })?;
        let distance = self.map.distance(from, to)?;
        let fuel = distance * fuel_per_km;
        if !traveller.inventory.covers(Commodity::Fuel, fuel) {
            return Err(SimError::CannotTravel {
                actor,
                reason: "not enough fuel",
            });
        }
        let duration = TimeDuration::from_hours_f64(distance / speed_kmh).max(TimeDuration::from_seconds(1));
        Ok((duration, fuel))
    }

    /// Send `actor` from where it is to `to`. Departure fires now; returns the
    /// expected arrival time.
    ///
    /// # Errors
    ///
    /// Returns `SimError::CannotTravel` without traction, fuel or a distinct
    /// destination, `SimError::NotPresent` while already on the road, and
    /// `SimError::ActorEnded` for ended actors.
    pub fn begin_travel(&mut self, actor: ActorId, to: LocationId) -> Result<TimePoint, SimError> {
        self.map.location(to)?;
        let traveller = self.actor(actor)?;
        if traveller.has_ended() {
            return Err(SimError::ActorEnded(actor));
        }
        let from = traveller.location;
        if from == to {
            return Err(SimError::CannotTravel {
                actor,
                reason: "already there",
            });
        }
        if self.present_location(actor) != Some(from) {
            return Err(SimError::NotPresent {
                actor,
                location: from,
            });
        }
        let (duration, _) = self.travel_plan(actor, from, to)?;
        let now = self.now;
        self.schedule(now, GameEvent::Travel { actor, from, to })?;
        Ok(now + duration)
    }

    /// Set `actor`'s declared stance toward `target` to hostile.
    ///
    /// # Errors
    ///
    /// Returns `SimError::UnknownActor` for unknown ids.
    pub fn declare_hostile(&mut self, actor: ActorId, target: ActorId) -> Result<(), SimError> {
        let faction = self.actor(target)?.faction;
        let source = self.actors.get_mut(&actor).ok_or(SimError::UnknownActor(actor))?;
        let relation = source.relation_mut(target, faction);
        relation.hostile = true;
        relation.worsen(1.0);
        Ok(())
    }

    /// Stop attacking a target that has surrendered and let it go. A spared
    /// target thinks better of its captor.
    ///
    /// # Errors
    ///
    /// Returns `SimError::UnknownActor` for unknown ids.
    pub fn spare(&mut self, actor: ActorId, target: ActorId) -> Result<(), SimError> {
        let surrendered = self.actor(target)?.has_surrendered_to(actor);
        let faction = self.actor(target)?.faction;
        let source = self.actors.get_mut(&actor).ok_or(SimError::UnknownActor(actor))?;
        let source_faction = source.faction;
        let relation = source.relation_mut(target, faction);
        relation.hostile = false;
        relation.spared = surrendered;
        if surrendered {
            let reputation = self.config.combat.spare_reputation;
            if let Some(spared) = self.actors.get_mut(&target) {
                spared.relation_mut(actor, source_faction).improve(reputation);
            }
        }
        Ok(())
    }

    /// Open fire on `target`: declare hostility and start an attack chain at
    /// the current instant.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ActorEnded` if either side has ended and
    /// `SimError::NotPresent` unless both are present at the same location.
    pub fn attack(&mut self, attacker: ActorId, target: ActorId) -> Result<(), SimError> {
        for id in [attacker, target] {
            if self.actor(id)?.has_ended() {
                return Err(SimError::ActorEnded(id));
            }
        }
        let location = self.actor(attacker)?.location;
        for id in [attacker, target] {
            if self.present_location(id) != Some(location) {
                return Err(SimError::NotPresent { actor: id, location });
            }
        }
        self.declare_hostile(attacker, target)?;
        if !self.attacking.contains(&attacker) {
            let now = self.now;
            self.queue_attack(attacker, target, now)?;
        }
        Ok(())
    }

    /// Harvest the cache at `actor`'s location. Hazards hurt the harvester
    /// first. Returns what was taken; an already consumed or missing cache
    /// yields an empty inventory.
    ///
    /// # Errors
    ///
    /// Returns `SimError::NotPresent` while travelling and
    /// `SimError::ActorEnded` for an ended harvester.
    pub fn harvest(&mut self, actor: ActorId) -> Result<Inventory, SimError> {
        let location = self.present_location(actor).ok_or_else(|| SimError::NotPresent {
            actor,
            location: self.actors.get(&actor).map_or(LocationId(0), |a| a.location),
        })?;
        self.observe(location)?;
        if self.actor(actor)?.has_ended() {
            return Err(SimError::ActorEnded(actor));
        }
        let now = self.now;
        let cache_id = self.encounters.get(&location).and_then(Encounter::resident);
        let Some(cache_id) = cache_id else {
            return Ok(Inventory::new());
        };
        let Some((mut harvester, mut cache)) = self.take_pair(actor, cache_id) else {
            return Ok(Inventory::new());
        };
        let mut loot = Inventory::new();
        let harvestable = matches!(cache.site(), Some(SiteKind::Cache | SiteKind::Hazard { .. }));
        if harvestable && !cache.has_ended() {
            if let Some(SiteKind::Hazard { damage }) = cache.site() {
                let (report, crew_lost) =
                    combat::apply_damage(&mut harvester, damage, HitOutcome::Hit, &self.config.combat);
                harvester.message(
                    now,
                    format!(
                        "The wreck field bit back: {} damage, {crew_lost:.0} crew lost.",
                        report.total()
                    ),
                );
                if harvester.crawler().is_some_and(Crawler::all_destroyed) {
                    harvester.end(EndState::Destroyed, now, "The wreck field swallowed us.");
                } else if harvester.crew() <= 0.0 {
                    harvester.end(EndState::Killed, now, "Nobody came back from the wreck field.");
                }
            }
            cache.inventory.transfer_all(&mut loot);
            for (commodity, amount) in loot.iter() {
                harvester.inventory.add(commodity, amount);
            }
            cache.end(
                EndState::Consumed,
                now,
                &format!("Stripped bare by {}.", harvester.name),
            );
            harvester.message(now, format!("Harvested {}.", cache.name));
        }
        self.actors.insert(actor, harvester);
        self.actors.insert(cache_id, cache);
        Ok(loot)
    }

    /// Travel the player to `to`.
    ///
    /// # Errors
    ///
    /// See `begin_travel`.
    pub fn player_travel(&mut self, to: LocationId) -> Result<TimePoint, SimError> {
        self.begin_travel(self.player, to)
    }

    // Event handlers ----------------------------------------------------------

    fn on_travel(&mut self, actor: ActorId, from: LocationId, to: LocationId) -> Result<(), SimError> {
        let now = self.now;
        if self.present_location(actor) != Some(from) || self.actor(actor)?.has_ended() {
            log::trace!("travel of {actor} fizzled");
            return Ok(());
        }
        // Start: leave the origin, paying for the whole trip up front.
        self.update_encounter(from, now)?;
        self.sync_actor(actor, now)?;
        let (duration, fuel) = match self.travel_plan(actor, from, to) {
            Ok(plan) => plan,
            Err(SimError::CannotTravel { reason, .. }) => {
                if let Some(traveller) = self.actors.get_mut(&actor) {
                    traveller.message(now, format!("Could not leave: {reason}."));
                }
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        if self.actor(actor)?.has_ended() {
            return Ok(());
        }
        self.remove_actor(from, actor)?;
        let destination = self.map.location(to)?.name.clone();
        let traveller = self.actors.get_mut(&actor).ok_or(SimError::UnknownActor(actor))?;
        traveller.inventory.remove(Commodity::Fuel, fuel);
        traveller.destination = Some(to);
        traveller.message(now, format!("Departed for {destination}."));

        // End: the arrival is its own event.
        self.schedule(now + duration, GameEvent::Arrival { actor, location: to })?;
        Ok(())
    }

    fn on_arrival(&mut self, actor: ActorId, location: LocationId) -> Result<(), SimError> {
        let now = self.now;
        if self.actor(actor)?.destination != Some(location) {
            log::trace!("arrival of {actor} at {location} fizzled");
            return Ok(());
        }
        // Start: bring the destination up to date before anyone new shows up.
        self.update_encounter(location, now)?;
        // End: join it.
        self.add_actor_at(location, actor, now, None)?;
        if actor == self.player {
            self.start_ticks(location)?;
        }
        Ok(())
    }

    fn on_departure(&mut self, actor: ActorId, location: LocationId) -> Result<(), SimError> {
        let now = self.now;
        let due = self
            .encounters
            .get(&location)
            .and_then(|encounter| encounter.presence(actor))
            .and_then(|presence| presence.departs);
        if due != Some(now) {
            log::trace!("departure of {actor} from {location} fizzled");
            return Ok(());
        }
        self.update_encounter(location, now)?;
        self.sync_actor(actor, now)?;
        self.remove_actor(location, actor)?;
        if self.actor(actor)?.transient {
            self.actors.remove(&actor);
            self.attacking.remove(&actor);
        }
        Ok(())
    }

    fn on_tick(&mut self, location: LocationId) -> Result<(), SimError> {
        let now = self.now;
        if self.next_tick != Some(now) || self.present_location(self.player) != Some(location) {
            return Ok(());
        }
        let present = self.observe(location)?.actors();
        for id in present {
            self.consider_combat(location, id)?;
        }
        self.next_tick = None;
        self.start_ticks(location)
    }

    fn start_ticks(&mut self, location: LocationId) -> Result<(), SimError> {
        let at = self.now + TimeDuration::from_hours(1);
        self.next_tick = Some(at);
        self.schedule(at, GameEvent::EncounterTick { location })?;
        Ok(())
    }

    /// Drop encounters that hold nothing but their resident, have nothing
    /// pending and are not where the player is.
    fn on_sweep(&mut self) -> Result<(), SimError> {
        let pinned: BTreeSet<LocationId> = self
            .scheduler
            .iter()
            .filter_map(|scheduled| scheduled.event.location())
            .collect();
        let player_at = self.actors.get(&self.player).map(|player| player.location);
        let idle: Vec<LocationId> = self
            .encounters
            .iter()
            .filter(|(location, encounter)| {
                encounter.is_idle() && !pinned.contains(location) && player_at != Some(**location)
            })
            .map(|(location, _)| *location)
            .collect();
        for location in idle {
            self.encounters.remove(&location);
            self.stats.encounters_evicted += 1;
            log::debug!("evicted idle encounter at {location}");
        }
        let next = self.now + self.config.sweep_interval();
        self.schedule(next, GameEvent::Sweep)?;
        Ok(())
    }

    // Combat ------------------------------------------------------------------

    fn queue_attack(&mut self, attacker: ActorId, target: ActorId, at: TimePoint) -> Result<(), SimError> {
        self.schedule(at, GameEvent::Attack { attacker, target })?;
        self.attacking.insert(attacker);
        Ok(())
    }

    fn take_pair(&mut self, a: ActorId, b: ActorId) -> Option<(Actor, Actor)> {
        if a == b {
            return None;
        }
        let first = self.actors.remove(&a)?;
        match self.actors.remove(&b) {
            Some(second) => Some((first, second)),
            None => {
                self.actors.insert(a, first);
                None
            }
        }
    }

    /// Location where `attacker` can legitimately fire on `target` right now.
    fn attack_site(&self, attacker: ActorId, target: ActorId) -> Option<LocationId> {
        let a = self.actors.get(&attacker)?;
        let t = self.actors.get(&target)?;
        let location = self.present_location(attacker)?;
        let armed = a.crawler().is_some_and(Crawler::has_weapons);
        let valid = armed
            && t.crawler().is_some()
            && !a.has_ended()
            && !t.has_ended()
            && self.present_location(target) == Some(location)
            && combat::regards_as_hostile(a, t, &self.config.combat)
            && !a.has_surrendered_to(target)
            && (a.player || !t.has_surrendered_to(attacker));
        valid.then_some(location)
    }

    fn on_attack(&mut self, attacker: ActorId, target: ActorId) -> Result<(), SimError> {
        self.attacking.remove(&attacker);
        let now = self.now;
        let Some(location) = self.attack_site(attacker, target) else {
            log::trace!("attack by {attacker} on {target} fizzled");
            return Ok(());
        };
        self.update_encounter(location, now)?;
        self.sync_actor(attacker, now)?;
        self.sync_actor(target, now)?;
        if self.attack_site(attacker, target).is_none() {
            return Ok(());
        }
        let Some((mut a, mut t)) = self.take_pair(attacker, target) else {
            return Ok(());
        };
        let report = combat::resolve_attack(&mut a, &mut t, now, &self.config.combat);
        log::debug!(
            "{now} {} -> {}: {} shots, {} landed, ended {:?}",
            a.name,
            t.name,
            report.shots,
            report.landed,
            report.target_ended
        );
        self.actors.insert(attacker, a);
        self.actors.insert(target, t);
        self.stats.attacks_resolved += 1;

        if Self::continues(&report) {
            self.queue_attack(attacker, target, now + report.delay)?;
        }
        self.consider_combat(location, target)?;
        self.consider_combat(location, attacker)?;
        Ok(())
    }

    const fn continues(report: &AttackReport) -> bool {
        report.target_ended.is_none() && !report.target_surrendered
    }

    /// NPC decision: open fire on the first crawler present it regards as
    /// hostile, notorious ones included, sparing any that have surrendered.
    fn consider_combat(&mut self, location: LocationId, id: ActorId) -> Result<(), SimError> {
        if self.attacking.contains(&id) {
            return Ok(());
        }
        let Some(actor) = self.actors.get(&id) else {
            return Ok(());
        };
        if actor.player || actor.has_ended() || !actor.crawler().is_some_and(Crawler::has_weapons) {
            return Ok(());
        }
        let Some(encounter) = self.encounters.get(&location) else {
            return Ok(());
        };
        if !encounter.contains(id) {
            return Ok(());
        }

        let mut chosen = None;
        let mut spared = Vec::new();
        for other_id in encounter.actors() {
            if other_id == id {
                continue;
            }
            let Some(other) = self.actors.get(&other_id) else {
                continue;
            };
            if other.has_ended()
                || other.crawler().is_none()
                || !combat::regards_as_hostile(actor, other, &self.config.combat)
                || actor.has_surrendered_to(other_id)
            {
                continue;
            }
            if other.has_surrendered_to(id) {
                if !actor.relation(other_id).is_some_and(|rel| rel.spared) {
                    spared.push(other_id);
                }
                continue;
            }
            chosen = Some(other_id);
            break;
        }

        for other in spared {
            self.spare(id, other)?;
        }
        if let Some(target) = chosen {
            let now = self.now;
            self.queue_attack(id, target, now)?;
        }
        Ok(())
    }

    // Persistence -------------------------------------------------------------

    /// Full snapshot: clocks, streams, pending events and every actor.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Snapshot` if serialization fails.
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore a snapshot written by `to_json`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Snapshot` for malformed input (including an all-zero
    /// stream state) and `SimError::Config` for an invalid configuration.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let game: Self = serde_json::from_str(json)?;
        game.config.validate()?;
        Ok(game)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Location, Terrain};
    use rand::SeedableRng;

    fn location(kind: LocationKind, x: f64, population: f64) -> Location {
        Location {
            id: LocationId(0),
            name: format!("{kind:?}"),
            kind,
            terrain: Terrain::Flat,
            x,
            y: 0.0,
            wealth: 50.0,
            population,
        }
    }

    /// A quiet three-stop map: no dynamic arrivals anywhere.
    fn quiet_game() -> Game {
        quiet_game_with(SimConfig::default())
    }

    fn quiet_game_with(config: SimConfig) -> Game {
        let map = Map::from_locations(vec![
            location(LocationKind::Settlement, 0.0, 0.0),
            location(LocationKind::Crossroads, 80.0, 0.0),
            location(LocationKind::Resource, 160.0, 0.0),
        ]);
        Game::with_map(7, config, map).unwrap()
    }

    fn disarm(game: &mut Game, id: ActorId) {
        let crawler = game.actors.get_mut(&id).unwrap().crawler_mut().unwrap();
        for segment in &mut crawler.segments {
            if segment.is_weapon() {
                segment.hits = segment.max_hits;
            }
        }
    }

    /// Put a new traveler into the settlement at `at` without advancing the game.
    fn admit_traveler(game: &mut Game, at: TimePoint) -> ActorId {
        let site = game.map.location(LocationId(0)).unwrap().clone();
        let id = game.allocate_id();
        let mut actor = Archetype::Traveler.build(id, &site, TimePoint::ZERO, XorShift::seed_from_u64(9));
        actor.player = false;
        game.actors.insert(id, actor);
        game.add_actor_at(LocationId(0), id, at, None).unwrap();
        id
    }

    #[test]
    fn player_starts_present_at_the_first_settlement() {
        let game = quiet_game();
        assert_eq!(game.present_location(game.player_id()), Some(LocationId(0)));
        let encounter = game.encounter(LocationId(0)).unwrap();
        assert!(encounter.resident().is_some());
        assert!(encounter.contains(game.player_id()));
        assert_eq!(game.now(), TimePoint::ZERO);
    }

    #[test]
    fn scheduling_in_the_past_is_rejected() {
        let mut game = quiet_game();
        game.advance(TimeDuration::from_hours(2)).unwrap();
        let err = game.schedule(TimePoint::ZERO, GameEvent::Sweep).unwrap_err();
        assert!(err.is_retrocausal());
        let err = game
            .process_events_until(TimePoint::ZERO, || false)
            .unwrap_err();
        assert!(err.is_retrocausal());
    }

    #[test]
    fn lenient_mode_skips_backwards_targets() {
        let map = Map::from_locations(vec![
            location(LocationKind::Settlement, 0.0, 0.0),
            location(LocationKind::Crossroads, 80.0, 0.0),
        ]);
        let config = SimConfig {
            strict_time: false,
            ..SimConfig::default()
        };
        let mut game = Game::with_map(1, config, map).unwrap();
        game.advance(TimeDuration::from_hours(2)).unwrap();
        assert_eq!(game.process_events_until(TimePoint::ZERO, || false).unwrap(), 0);
        assert_eq!(game.stats().skipped_updates, 1);
        assert_eq!(game.now(), TimePoint::ZERO + TimeDuration::from_hours(2));
    }

    #[test]
    fn travel_moves_the_player_and_burns_fuel_up_front() {
        let mut game = quiet_game();
        let player = game.player_id();
        let fuel_before = game.player().unwrap().inventory.get(Commodity::Fuel);
        let eta = game.player_travel(LocationId(1)).unwrap();
        // 80 km at 40 km/h.
        assert_eq!(eta, TimePoint::ZERO + TimeDuration::from_hours(2));

        game.process_events_until(TimePoint::ZERO + TimeDuration::from_minutes(10), || false)
            .unwrap();
        assert_eq!(game.present_location(player), None);
        assert_eq!(game.player().unwrap().destination, Some(LocationId(1)));
        let spent = fuel_before - game.player().unwrap().inventory.get(Commodity::Fuel);
        assert!((spent - 80.0 * 0.05).abs() < 1e-9);

        game.process_events_until(eta, || false).unwrap();
        assert_eq!(game.present_location(player), Some(LocationId(1)));
        assert!(game.player().unwrap().visit(LocationId(1)).is_some());
        assert_eq!(game.player().unwrap().last_simulated(), eta);
    }

    #[test]
    fn travel_errors_are_reported_before_anything_moves() {
        let mut game = quiet_game();
        let player = game.player_id();
        assert!(matches!(
            game.player_travel(LocationId(0)),
            Err(SimError::CannotTravel { .. })
        ));
        assert!(matches!(
            game.player_travel(LocationId(99)),
            Err(SimError::UnknownLocation(_))
        ));
        game.actors
            .get_mut(&player)
            .unwrap()
            .inventory
            .set(Commodity::Fuel, 0.0);
        assert!(matches!(
            game.player_travel(LocationId(2)),
            Err(SimError::CannotTravel { reason: "not enough fuel", .. })
        ));
    }

    #[test]
    fn stop_predicate_interrupts_between_events() {
        let mut game = quiet_game();
        let mut polls = 0;
        let fired = game
            .process_events_until(TimePoint::ZERO + TimeDuration::from_days(1), || {
                polls += 1;
                polls > 3
            })
            .unwrap();
        assert_eq!(fired, 3);
        assert!(game.now() < TimePoint::ZERO + TimeDuration::from_days(1));
    }

    #[test]
    fn caches_are_harvested_once() {
        let mut game = quiet_game();
        let player = game.player_id();
        let eta = game.player_travel(LocationId(2)).unwrap();
        game.process_events_until(eta, || false).unwrap();

        let scrap_before = game.player().unwrap().inventory.get(Commodity::Scrap);
        let loot = game.harvest(player).unwrap();
        assert!(loot.get(Commodity::Scrap) > 0.0);
        let scrap_after = game.player().unwrap().inventory.get(Commodity::Scrap);
        assert!((scrap_after - scrap_before - loot.get(Commodity::Scrap)).abs() < 1e-9);

        let cache = game.encounter(LocationId(2)).unwrap().resident().unwrap();
        assert_eq!(game.actor(cache).unwrap().end_state(), Some(EndState::Consumed));
        assert!(game.harvest(player).unwrap().is_empty());
    }

    #[test]
    fn player_attack_chains_until_the_target_ends() {
        let mut game = quiet_game();
        let player = game.player_id();
        let traveler = game.spawn_now(LocationId(0), Archetype::Traveler).unwrap();
        game.attack(player, traveler).unwrap();
        game.advance(TimeDuration::from_days(5)).unwrap();

        let target = game.actor(traveler).unwrap();
        let surrendered = target.has_surrendered_to(player);
        assert!(target.has_ended() || surrendered);
        assert!(game.stats().attacks_resolved > 1);
        let relation = target.relation(player).unwrap();
        assert!(relation.damage_taken > 0);
        assert!(relation.blooded);
    }

    #[test]
    fn bandits_open_fire_on_arrival() {
        let mut game = quiet_game();
        let bandit = game.spawn_now(LocationId(0), Archetype::Bandit).unwrap();
        assert!(game.attacking.contains(&bandit));
        game.advance(TimeDuration::from_hours(1)).unwrap();
        assert!(game.stats().attacks_resolved > 0);
    }

    #[test]
    fn idle_encounters_are_swept() {
        let mut game = quiet_game();
        let eta = game.player_travel(LocationId(1)).unwrap();
        game.process_events_until(eta, || false).unwrap();
        game.advance(TimeDuration::from_hours(2)).unwrap();
        // Only the settlement itself is left behind.
        assert!(game.encounter(LocationId(0)).is_none());
        assert!(game.encounter(LocationId(1)).is_some());
        assert!(game.stats().encounters_evicted >= 1);

        // Coming back re-materializes it around the same resident.
        let resident = game.residents[&LocationId(0)];
        let eta = game.player_travel(LocationId(0)).unwrap();
        game.process_events_until(eta, || false).unwrap();
        assert_eq!(game.encounter(LocationId(0)).unwrap().resident(), Some(resident));
    }

    #[test]
    fn snapshots_continue_the_same_timeline() {
        let mut game = Game::new(42, SimConfig::default()).unwrap();
        game.advance(TimeDuration::from_hours(5)).unwrap();
        let mut restored = Game::from_json(&game.to_json().unwrap()).unwrap();
        game.advance(TimeDuration::from_hours(30)).unwrap();
        restored.advance(TimeDuration::from_hours(30)).unwrap();
        assert_eq!(game.to_json().unwrap(), restored.to_json().unwrap());
    }

    #[test]
    fn killing_a_neutral_is_friendly_fire() {
        let mut game = quiet_game();
        let player = game.player_id();
        let traveler = game.spawn_now(LocationId(0), Archetype::Traveler).unwrap();
        disarm(&mut game, traveler);
        assert!(!game.player().unwrap().is_hostile_to(game.actor(traveler).unwrap()));

        for _ in 0..240 {
            if game.actor(traveler).unwrap().has_ended() {
                break;
            }
            game.attack(player, traveler).unwrap();
            game.advance(TimeDuration::from_hours(1)).unwrap();
        }
        assert!(game.actor(traveler).unwrap().has_ended());
        let player = game.player().unwrap();
        assert!(player.relation(traveler).unwrap().aggressor);
        assert!(player.evil_points > 0);
        assert!(player.messages().any(|m| m.text.contains("never wronged us")));
        assert!(!player.messages().any(|m| m.text.contains("The crew cheers")));
    }

    #[test]
    fn notorious_actors_draw_fire_from_neutrals() {
        let mut game = quiet_game();
        let player = game.player_id();
        let calm = game.spawn_now(LocationId(0), Archetype::Traveler).unwrap();
        assert!(!game.attacking.contains(&calm));
        let faction = game.player().unwrap().faction;
        game.actors
            .get_mut(&calm)
            .unwrap()
            .relation_mut(player, faction)
            .improve(10.0);

        let threshold = game.config.combat.evil_hostility_threshold;
        game.actors.get_mut(&player).unwrap().evil_points = threshold;
        let wary = game.spawn_now(LocationId(0), Archetype::Traveler).unwrap();
        assert!(game.attacking.contains(&wary));
        assert!(game.attack_site(wary, player).is_some());
        assert!(!game.attacking.contains(&calm));
    }

    #[test]
    fn sparing_earns_the_captives_trust() {
        let mut game = quiet_game();
        let player = game.player_id();
        let traveler = game.spawn_now(LocationId(0), Archetype::Traveler).unwrap();
        let faction = game.player().unwrap().faction;
        game.actors
            .get_mut(&traveler)
            .unwrap()
            .relation_mut(player, faction)
            .surrendered = true;
        game.spare(player, traveler).unwrap();
        assert!(game.player().unwrap().relation(traveler).unwrap().spared);
        let trust = game.actor(traveler).unwrap().relation(player).unwrap().trust();
        assert!(trust > 0.0);
    }

    #[test]
    fn arrivals_catch_up_everyone_present() {
        let mut game = quiet_game();
        let at = TimePoint::ZERO + TimeDuration::from_hours(3);
        let traveler = admit_traveler(&mut game, at);
        assert_eq!(game.actor(traveler).unwrap().last_simulated(), at);
        assert_eq!(game.player().unwrap().last_simulated(), at);
        assert!(game.player().unwrap().messages().any(|m| m.text.contains("arrived")));
    }

    #[test]
    fn single_actor_mode_leaves_the_others_alone() {
        let mut config = SimConfig::default();
        config.encounter.simulate_all = false;
        let mut game = quiet_game_with(config);
        let player = game.player_id();
        let at = TimePoint::ZERO + TimeDuration::from_hours(3);
        let traveler = admit_traveler(&mut game, at);
        assert_eq!(game.actor(traveler).unwrap().last_simulated(), at);
        assert_eq!(game.actor(player).unwrap().last_simulated(), TimePoint::ZERO);
    }
}
