//! Crawler loadouts and static-site builders.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::actor::{Actor, ActorId, ActorKind, Crawler, Faction, SiteKind};
use crate::inventory::{Commodity, Inventory};
use crate::numbers::floor_f64_to_u64;
use crate::rng::XorShift;
use crate::segment::Segment;
use crate::time::{TimeDuration, TimePoint};
use crate::world::{Location, LocationKind};

/// Hours of rations, water and air a fresh crawler carries.
const PROVISION_HOURS: f64 = 300.0;
const BASE_FUEL: f64 = 200.0;
const BASE_MORALE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Archetype {
    Player,
    Traveler,
    Trader,
    Bandit,
    Mercenary,
}

impl Archetype {
    pub const ALL: [Self; 5] = [
        Self::Player,
        Self::Traveler,
        Self::Trader,
        Self::Bandit,
        Self::Mercenary,
    ];

    /// Archetypes that populate encounters on their own.
    pub const NPC: [Self; 4] = [Self::Traveler, Self::Trader, Self::Bandit, Self::Mercenary];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Traveler => "traveler",
            Self::Trader => "trader",
            Self::Bandit => "bandit",
            Self::Mercenary => "mercenary",
        }
    }

    /// Parse a key as produced by `key`.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|archetype| archetype.key().eq_ignore_ascii_case(key.trim()))
    }

    #[must_use]
    pub const fn faction(self) -> Faction {
        match self {
            Self::Player => Faction::Player,
            Self::Traveler => Faction::Independent,
            Self::Trader => Faction::Merchant,
            Self::Bandit => Faction::Bandit,
            Self::Mercenary => Faction::Mercenary,
        }
    }

    const fn crew(self) -> f64 {
        match self {
            Self::Player => 20.0,
            Self::Traveler => 8.0,
            Self::Trader => 12.0,
            Self::Bandit => 15.0,
            Self::Mercenary => 18.0,
        }
    }

    /// Segment loadout for this archetype.
    #[must_use]
    pub fn segments(self) -> Vec<Segment> {
        let minutes = TimeDuration::from_minutes;
        match self {
            Self::Player => vec![
                Segment::reactor("fusion reactor", 40.0, 8.0, 1.0, 6),
                Segment::traction("heavy treads", 40.0, 0.05, 6),
                Segment::weapon("autocannon", 4, 2, 0.1, 4.0, minutes(5), 4),
                Segment::weapon("rail driver", 8, 1, 0.2, 8.0, minutes(9), 4),
                Segment::shield("deflector", 12, 4, 4),
                Segment::armor("hull armor", 2, 8),
                Segment::plating("ablative plating", 3, 6),
            ],
            Self::Traveler => vec![
                Segment::reactor("salvaged reactor", 30.0, 6.0, 0.8, 4),
                Segment::traction("wheels", 35.0, 0.04, 4),
                Segment::weapon("carbine turret", 3, 1, 0.0, 3.0, minutes(6), 3),
                Segment::armor("scrap armor", 1, 6),
            ],
            Self::Trader => vec![
                Segment::reactor("cargo reactor", 50.0, 8.0, 1.2, 6),
                Segment::charger("solar skin", 4.0, 0.0, 3),
                Segment::traction("cargo treads", 30.0, 0.06, 6),
                Segment::weapon("deterrent gun", 3, 2, 0.0, 4.0, minutes(7), 3),
                Segment::shield("cargo screen", 10, 3, 3),
                Segment::armor("cargo armor", 2, 8),
            ],
            Self::Bandit => vec![
                Segment::reactor("hot reactor", 30.0, 8.0, 1.0, 4),
                Segment::traction("raider wheels", 45.0, 0.05, 4),
                Segment::weapon("harpoon", 4, 2, 0.15, 4.0, minutes(5), 3),
                Segment::weapon("flamer", 5, 1, 0.1, 5.0, minutes(6), 3),
                Segment::plating("spiked plating", 2, 5),
            ],
            Self::Mercenary => vec![
                Segment::reactor("military reactor", 45.0, 10.0, 1.2, 6),
                Segment::traction("military treads", 40.0, 0.06, 6),
                Segment::weapon("twin cannon", 5, 2, 0.2, 5.0, minutes(5), 4),
                Segment::weapon("missile rack", 7, 1, 0.25, 7.0, minutes(8), 3),
                Segment::weapon("point gun", 2, 3, 0.1, 2.0, minutes(3), 3),
                Segment::shield("combat shield", 8, 3, 4),
                Segment::armor("composite armor", 3, 8),
            ],
        }
    }

    /// Starting stock, scaled by the spawning location's wealth.
    #[must_use]
    pub fn starting_inventory(self, wealth: f64, rng: &mut XorShift) -> Inventory {
        let crew = self.crew();
        let scale = rng.gen_range(0.5..1.5);
        let scrap = 50.0 + wealth * scale;
        let mut inventory = Inventory::new()
            .with(Commodity::Crew, crew)
            .with(Commodity::Morale, BASE_MORALE)
            .with(Commodity::Scrap, scrap)
            .with(Commodity::Fuel, BASE_FUEL * scale)
            .with(Commodity::Rations, crew * 0.05 * PROVISION_HOURS)
            .with(Commodity::Water, crew * 0.1 * PROVISION_HOURS)
            .with(Commodity::Air, crew * 0.2 * PROVISION_HOURS);
        if self == Self::Trader {
            inventory.add(Commodity::Goods, wealth * 2.0 * scale);
        }
        inventory
    }

    /// Build a crawler of this archetype at `location`.
    #[must_use]
    pub fn build(self, id: ActorId, location: &Location, at: TimePoint, mut rng: XorShift) -> Actor {
        let inventory = self.starting_inventory(location.wealth, &mut rng);
        let name = if self == Self::Player {
            "Player".to_string()
        } else {
            format!("{} {}-{}", self, location.name, id.0)
        };
        let mut actor = Actor::new(
            id,
            name,
            self.faction(),
            location.id,
            ActorKind::Crawler(Crawler::new(self, self.segments())),
            inventory,
            at,
            rng,
        );
        actor.player = self == Self::Player;
        actor
    }

    /// Weighted arrival mix for dynamic population at a location kind.
    #[must_use]
    pub const fn arrival_weights(kind: LocationKind) -> &'static [(Self, u32)] {
        match kind {
            LocationKind::Settlement => &[
                (Self::Traveler, 4),
                (Self::Trader, 5),
                (Self::Bandit, 1),
                (Self::Mercenary, 2),
            ],
            LocationKind::Crossroads => &[
                (Self::Traveler, 4),
                (Self::Trader, 2),
                (Self::Bandit, 3),
                (Self::Mercenary, 2),
            ],
            LocationKind::Resource => &[
                (Self::Traveler, 2),
                (Self::Trader, 1),
                (Self::Bandit, 3),
                (Self::Mercenary, 1),
            ],
            LocationKind::Hazard => &[(Self::Traveler, 1), (Self::Bandit, 2), (Self::Mercenary, 1)],
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Player => "Player",
            Self::Traveler => "Traveler",
            Self::Trader => "Trader",
            Self::Bandit => "Bandit",
            Self::Mercenary => "Mercenary",
        };
        f.write_str(label)
    }
}

/// Build the resident static actor of a location, if its kind has one.
#[must_use]
pub fn build_site(id: ActorId, location: &Location, at: TimePoint, rng: XorShift) -> Option<Actor> {
    let wealth = location.wealth;
    let (site, name, inventory) = match location.kind {
        LocationKind::Settlement => (
            SiteKind::Settlement,
            location.name.clone(),
            Inventory::new()
                .with(Commodity::Scrap, wealth * 5.0)
                .with(Commodity::Goods, wealth * 3.0)
                .with(Commodity::Fuel, wealth * 2.0),
        ),
        LocationKind::Resource => (
            SiteKind::Cache,
            format!("{} cache", location.name),
            Inventory::new()
                .with(Commodity::Scrap, wealth * 2.0)
                .with(Commodity::Fuel, wealth * 3.0)
                .with(Commodity::Rations, wealth),
        ),
        LocationKind::Hazard => (
            SiteKind::Hazard {
                damage: u32::try_from(4 + floor_f64_to_u64(wealth / 5.0)).unwrap_or(u32::MAX),
            },
            format!("{} wreck field", location.name),
            Inventory::new()
                .with(Commodity::Scrap, wealth * 6.0)
                .with(Commodity::Goods, wealth),
        ),
        LocationKind::Crossroads => return None,
    };
    Some(Actor::new(
        id,
        name,
        Faction::Settlement,
        location.id,
        ActorKind::Static(site),
        inventory,
        at,
        rng,
    ))
}
