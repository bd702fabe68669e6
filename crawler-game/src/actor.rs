//! Actors and their lazy catch-up to a target time.
//!
//! An actor is only brought up to date when something needs its state. The
//! catch-up applies one upkeep tick per whole-hour boundary crossed since the
//! actor was last simulated, so one long catch-up and many short ones leave
//! the actor in the same state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::archetype::Archetype;
use crate::config::UpkeepConfig;
use crate::constants::MESSAGE_LOG_CAPACITY;
use crate::error::SimError;
use crate::inventory::{Commodity, Inventory};
use crate::power;
use crate::relations::ActorToActor;
use crate::rng::XorShift;
use crate::segment::{Segment, SegmentKind};
use crate::time::TimePoint;
use crate::world::LocationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Faction {
    Player,
    Independent,
    Merchant,
    Bandit,
    Mercenary,
    Settlement,
}

impl Faction {
    /// Stance a fresh relationship starts with.
    #[must_use]
    pub const fn default_hostility(self, other: Self) -> bool {
        match (self, other) {
            (Self::Bandit, Self::Bandit) => false,
            (Self::Bandit, _) | (_, Self::Bandit) => true,
            _ => false,
        }
    }
}

/// Terminal outcomes. Once set, an actor no longer ticks or fights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndState {
    /// No surviving segments.
    Destroyed,
    /// Crew lost to combat.
    Killed,
    /// Crew lost to hunger, thirst or suffocation.
    Starved,
    /// Morale exhausted.
    Revolt,
    /// A harvested cache.
    Consumed,
}

/// A line of in-game narrative addressed to an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub time: TimePoint,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationVisit {
    pub first: TimePoint,
    pub last: TimePoint,
    pub count: u32,
}

/// Mobile vehicle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crawler {
    pub archetype: Archetype,
    pub segments: Vec<Segment>,
    /// Latched while fuel cannot cover generator demand.
    pub depowered: bool,
}

impl Crawler {
    #[must_use]
    pub fn new(archetype: Archetype, segments: Vec<Segment>) -> Self {
        Self {
            archetype,
            segments,
            depowered: false,
        }
    }

    /// Every working part is gone. Shields and armor never take hull hits,
    /// so they only count for a loadout made of nothing else.
    #[must_use]
    pub fn all_destroyed(&self) -> bool {
        let mut working = self.segments.iter().filter(|segment| !segment.is_defense()).peekable();
        if working.peek().is_none() {
            return self.segments.iter().all(Segment::is_destroyed);
        }
        working.all(Segment::is_destroyed)
    }

    /// Speed and per-km fuel of the fastest active traction segment.
    #[must_use]
    pub fn traction(&self) -> Option<(f64, f64)> {
        self.segments
            .iter()
            .filter(|segment| segment.is_active())
            .filter_map(|segment| match segment.kind {
                SegmentKind::Traction {
                    speed_kmh,
                    fuel_per_km,
                } if speed_kmh > 0.0 => Some((speed_kmh, fuel_per_km)),
                _ => None,
            })
            .max_by(|a, b| a.0.total_cmp(&b.0))
    }

    /// Whether any weapon could still fire after repairs or recharge.
    #[must_use]
    pub fn has_weapons(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| segment.is_weapon() && !segment.is_destroyed())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteKind {
    Settlement,
    /// Harvestable cache at a resource location.
    Cache,
    /// Cache that deals `damage` to its harvester.
    Hazard { damage: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActorKind {
    Crawler(Crawler),
    Static(SiteKind),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub faction: Faction,
    pub location: LocationId,
    /// Set while travelling; `location` is the origin until arrival.
    pub destination: Option<LocationId>,
    pub inventory: Inventory,
    pub kind: ActorKind,
    pub evil_points: u32,
    /// Dynamic population discarded when its lifetime ends.
    pub transient: bool,
    pub player: bool,
    last_simulated: TimePoint,
    rng: XorShift,
    relations: BTreeMap<ActorId, ActorToActor>,
    visits: BTreeMap<LocationId, LocationVisit>,
    end_state: Option<EndState>,
    messages: VecDeque<Message>,
}

impl Actor {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ActorId,
        name: impl Into<String>,
        faction: Faction,
        location: LocationId,
        kind: ActorKind,
        inventory: Inventory,
        created_at: TimePoint,
        rng: XorShift,
    ) -> Self {
        debug_assert!(created_at.is_valid(), "actor created at NONE");
        Self {
            id,
            name: name.into(),
            faction,
            location,
            destination: None,
            inventory,
            kind,
            evil_points: 0,
            transient: false,
            player: false,
            last_simulated: created_at,
            rng,
            relations: BTreeMap::new(),
            visits: BTreeMap::new(),
            end_state: None,
            messages: VecDeque::new(),
        }
    }

    #[must_use]
    pub const fn last_simulated(&self) -> TimePoint {
        self.last_simulated
    }

    pub fn rng_mut(&mut self) -> &mut XorShift {
        &mut self.rng
    }

    #[must_use]
    pub const fn rng(&self) -> &XorShift {
        &self.rng
    }

    #[must_use]
    pub const fn end_state(&self) -> Option<EndState> {
        self.end_state
    }

    #[must_use]
    pub const fn has_ended(&self) -> bool {
        self.end_state.is_some()
    }

    /// Set the terminal state once; later calls keep the first outcome.
    pub fn end(&mut self, state: EndState, at: TimePoint, text: &str) {
        if self.end_state.is_some() {
            return;
        }
        log::debug!("{} ({}) ended: {state:?} at {at}", self.name, self.id);
        self.end_state = Some(state);
        self.message(at, text);
    }

    #[must_use]
    pub const fn crawler(&self) -> Option<&Crawler> {
        match &self.kind {
            ActorKind::Crawler(crawler) => Some(crawler),
            ActorKind::Static(_) => None,
        }
    }

    pub fn crawler_mut(&mut self) -> Option<&mut Crawler> {
        match &mut self.kind {
            ActorKind::Crawler(crawler) => Some(crawler),
            ActorKind::Static(_) => None,
        }
    }

    #[must_use]
    pub const fn site(&self) -> Option<SiteKind> {
        match self.kind {
            ActorKind::Static(site) => Some(site),
            ActorKind::Crawler(_) => None,
        }
    }

    #[must_use]
    pub fn crew(&self) -> f64 {
        self.inventory.get(Commodity::Crew)
    }

    #[must_use]
    pub fn morale(&self) -> f64 {
        self.inventory.get(Commodity::Morale)
    }

    pub fn adjust_morale(&mut self, delta: f64) {
        let morale = self.morale() + delta;
        self.inventory.set(Commodity::Morale, morale);
    }

    /// Queue a narrative line, dropping the oldest past the log capacity.
    pub fn message(&mut self, time: TimePoint, text: impl Into<String>) {
        if self.messages.len() == MESSAGE_LOG_CAPACITY {
            self.messages.pop_front();
        }
        self.messages.push_back(Message {
            time,
            text: text.into(),
        });
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn mark_visited(&mut self, location: LocationId, at: TimePoint) {
        self.visits
            .entry(location)
            .and_modify(|visit| {
                visit.last = at;
                visit.count += 1;
            })
            .or_insert(LocationVisit {
                first: at,
                last: at,
                count: 1,
            });
    }

    #[must_use]
    pub fn visit(&self, location: LocationId) -> Option<&LocationVisit> {
        self.visits.get(&location)
    }

    #[must_use]
    pub fn relation(&self, other: ActorId) -> Option<&ActorToActor> {
        self.relations.get(&other)
    }

    /// Get or lazily create the record for `other`, seeding its stance from
    /// the two factions.
    pub fn relation_mut(&mut self, other: ActorId, other_faction: Faction) -> &mut ActorToActor {
        let faction = self.faction;
        self.relations
            .entry(other)
            .or_insert_with(|| ActorToActor::with_stance(faction.default_hostility(other_faction)))
    }

    #[must_use]
    pub fn is_hostile_to(&self, other: &Self) -> bool {
        self.relation(other.id).map_or_else(
            || self.faction.default_hostility(other.faction),
            ActorToActor::is_hostile,
        )
    }

    /// Whether this actor has surrendered to `other`.
    #[must_use]
    pub fn has_surrendered_to(&self, other: ActorId) -> bool {
        self.relation(other).is_some_and(|rel| rel.surrendered)
    }

    /// Bring upkeep up to `target`, applying each crossed hour boundary once.
    /// Returns the number of hourly ticks applied.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Retrocausality` if `target` is earlier than the
    /// last simulated time and `SimError::InvalidTime` for the `NONE` sentinel.
    pub fn simulate_to(&mut self, target: TimePoint, upkeep: &UpkeepConfig) -> Result<i64, SimError> {
        if target.is_none() {
            return Err(SimError::InvalidTime);
        }
        if target < self.last_simulated {
            return Err(SimError::retrocausal(
                format!("actor {}", self.id),
                self.last_simulated,
                target,
            ));
        }
        let first_hour = self.last_simulated.hour_index() + 1;
        let crossed = self.last_simulated.hour_boundaries_until(target);
        let mut applied = 0;
        for offset in 0..crossed {
            if self.has_ended() {
                break;
            }
            self.tick_hour(TimePoint::from_hour_index(first_hour + offset), upkeep);
            applied += 1;
        }
        self.last_simulated = target;
        Ok(applied)
    }

    fn tick_hour(&mut self, at: TimePoint, upkeep: &UpkeepConfig) {
        if !matches!(self.kind, ActorKind::Crawler(_)) {
            return;
        }
        self.tick_power(at, upkeep);
        self.tick_shields(upkeep);
        self.tick_wages(upkeep);
        self.tick_life_support(at, upkeep);
        if self.has_ended() {
            return;
        }
        if self.morale() <= 0.0 {
            self.end(EndState::Revolt, at, "The crew has mutinied.");
            return;
        }
        if !self.player {
            self.field_repair(upkeep);
        }
        if self.crawler().is_some_and(Crawler::all_destroyed) {
            self.end(EndState::Destroyed, at, "Nothing of the crawler still works.");
        }
    }

    fn tick_power(&mut self, at: TimePoint, upkeep: &UpkeepConfig) {
        let ActorKind::Crawler(crawler) = &mut self.kind else {
            return;
        };
        let demand = power::fuel_demand(&crawler.segments);
        let shortfall = self.inventory.remove(Commodity::Fuel, demand);
        let burned = if demand > 0.0 {
            (demand - shortfall) / demand
        } else {
            1.0
        };
        let generation = power::total_generation(&crawler.segments) * burned;
        power::feed(&mut crawler.segments, generation);

        let powered = shortfall <= 0.0;
        if !powered && !crawler.depowered {
            crawler.depowered = true;
            self.adjust_morale(-upkeep.depowered_morale_penalty);
            self.message(at, "Fuel exhausted. Life support is running dark.");
        } else if powered && crawler.depowered {
            crawler.depowered = false;
            self.message(at, "Power restored.");
        }
    }

    fn tick_shields(&mut self, upkeep: &UpkeepConfig) {
        let ActorKind::Crawler(crawler) = &mut self.kind else {
            return;
        };
        if crawler.depowered {
            return;
        }
        for index in 0..crawler.segments.len() {
            let wanted = match crawler.segments[index].kind {
                SegmentKind::Shield {
                    pool,
                    capacity,
                    recharge,
                } if crawler.segments[index].is_active() => {
                    recharge.min(capacity.saturating_sub(pool))
                }
                _ => continue,
            };
            let affordable = crate::numbers::floor_f64_to_u64(
                power::total_charge(&crawler.segments) / upkeep.shield_power_per_point,
            );
            let points = wanted.min(u32::try_from(affordable).unwrap_or(u32::MAX));
            if points == 0 {
                continue;
            }
            power::draw(
                &mut crawler.segments,
                f64::from(points) * upkeep.shield_power_per_point,
            );
            if let SegmentKind::Shield { pool, .. } = &mut crawler.segments[index].kind {
                *pool += points;
            }
        }
    }

    fn tick_wages(&mut self, upkeep: &UpkeepConfig) {
        let wage = self.crew() * upkeep.wage_per_crew;
        if wage <= 0.0 {
            return;
        }
        let unpaid = self.inventory.remove(Commodity::Scrap, wage);
        if unpaid > 0.0 {
            self.adjust_morale(-upkeep.unpaid_wage_morale_penalty * unpaid / wage);
        }
    }

    fn tick_life_support(&mut self, at: TimePoint, upkeep: &UpkeepConfig) {
        let crew = self.crew();
        if crew <= 0.0 {
            return;
        }
        let depowered = self.crawler().is_some_and(|crawler| crawler.depowered);
        let air_rate = if depowered {
            upkeep.air_per_crew
        } else {
            upkeep.air_per_crew * (1.0 - upkeep.air_recycling)
        };
        let needs = [
            (Commodity::Rations, upkeep.rations_per_crew),
            (Commodity::Water, upkeep.water_per_crew),
            (Commodity::Air, air_rate),
        ];
        let mut shortfall_ratio = 0.0;
        for (commodity, rate) in needs {
            let need = crew * rate;
            if need <= 0.0 {
                continue;
            }
            let short = self.inventory.remove(commodity, need);
            shortfall_ratio += short / need;
        }
        if shortfall_ratio <= 0.0 {
            return;
        }
        let lost = (crew * upkeep.attrition_rate * shortfall_ratio).ceil().min(crew);
        self.inventory.set(Commodity::Crew, crew - lost);
        self.message(at, format!("{lost:.0} crew lost to hunger, thirst or bad air."));
        if self.crew() <= 0.0 {
            self.end(EndState::Starved, at, "The last of the crew has perished.");
        }
    }

    fn field_repair(&mut self, upkeep: &UpkeepConfig) {
        if !self.inventory.covers(Commodity::Scrap, upkeep.repair_scrap_cost) {
            return;
        }
        let Some(crawler) = self.crawler_mut() else {
            return;
        };
        let repaired = crawler
            .segments
            .iter_mut()
            .find(|segment| segment.hits > 0 && !segment.is_destroyed())
            .is_some_and(Segment::repair_one);
        if repaired {
            self.inventory.remove(Commodity::Scrap, upkeep.repair_scrap_cost);
        }
    }
}
