//! Locations and a minimal deterministic map.
//!
//! The map only needs to give the simulation somewhere to be: positions for
//! travel times, and a kind, wealth and population per location to drive
//! encounter population and archetype loadouts.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::MapConfig;
use crate::error::SimError;
use crate::rng::{XorShift, weighted_pick};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub u32);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LocationKind {
    Settlement,
    Crossroads,
    /// Holds a single harvestable cache.
    Resource,
    /// Holds a single cache that hurts whoever harvests it.
    Hazard,
}

impl LocationKind {
    /// Kinds whose encounter owns one permanent cache actor.
    #[must_use]
    pub const fn has_cache(self) -> bool {
        matches!(self, Self::Resource | Self::Hazard)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terrain {
    Flat,
    Rough,
    Mountain,
    Ruins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub kind: LocationKind,
    pub terrain: Terrain,
    pub x: f64,
    pub y: f64,
    pub wealth: f64,
    pub population: f64,
}

impl Location {
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

const NAME_HEADS: [&str; 10] = [
    "Rust", "Ash", "Cinder", "Dust", "Iron", "Salt", "Glass", "Bone", "Tar", "Coil",
];
const NAME_TAILS: [&str; 8] = [
    "hollow", "gate", "pit", "reach", "works", "yard", "spire", "flats",
];

/// All locations of a game, indexed by `LocationId`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Map {
    locations: Vec<Location>,
}

impl Map {
    /// Scatter `config.locations` locations over a square of side
    /// `config.extent_km`. The first location is always a settlement.
    #[must_use]
    pub fn generate(rng: &mut XorShift, config: &MapConfig) -> Self {
        let kinds = [
            (LocationKind::Settlement, 3),
            (LocationKind::Crossroads, 4),
            (LocationKind::Resource, 3),
            (LocationKind::Hazard, 2),
        ];
        let terrains = [
            (Terrain::Flat, 5),
            (Terrain::Rough, 3),
            (Terrain::Mountain, 1),
            (Terrain::Ruins, 2),
        ];
        let mut locations = Vec::with_capacity(config.locations);
        for index in 0..config.locations {
            let id = LocationId(u32::try_from(index).unwrap_or(u32::MAX));
            let kind = if index == 0 {
                LocationKind::Settlement
            } else {
                weighted_pick(&kinds, rng).unwrap_or(LocationKind::Crossroads)
            };
            let terrain = weighted_pick(&terrains, rng).unwrap_or(Terrain::Flat);
            let (wealth, population) = match kind {
                LocationKind::Settlement => (rng.gen_range(100.0..400.0), rng.gen_range(500.0..3_000.0)),
                LocationKind::Crossroads => (rng.gen_range(30.0..120.0), rng.gen_range(50.0..400.0)),
                LocationKind::Resource => (rng.gen_range(10.0..60.0), rng.gen_range(10.0..80.0)),
                LocationKind::Hazard => (rng.gen_range(5.0..30.0), rng.gen_range(1.0..20.0)),
            };
            let name = format!(
                "{}{}",
                NAME_HEADS[rng.gen_range(0..NAME_HEADS.len())],
                NAME_TAILS[rng.gen_range(0..NAME_TAILS.len())]
            );
            locations.push(Location {
                id,
                name,
                kind,
                terrain,
                x: rng.gen_range(0.0..config.extent_km),
                y: rng.gen_range(0.0..config.extent_km),
                wealth,
                population,
            });
        }
        Self { locations }
    }

    /// Build a map from explicit locations; ids are reassigned by position.
    #[must_use]
    pub fn from_locations(mut locations: Vec<Location>) -> Self {
        for (index, location) in locations.iter_mut().enumerate() {
            location.id = LocationId(u32::try_from(index).unwrap_or(u32::MAX));
        }
        Self { locations }
    }

    #[must_use]
    pub fn get(&self, id: LocationId) -> Option<&Location> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.locations.get(index))
    }

    /// # Errors
    ///
    /// Returns `SimError::UnknownLocation` for ids outside the map.
    pub fn location(&self, id: LocationId) -> Result<&Location, SimError> {
        self.get(id).ok_or(SimError::UnknownLocation(id))
    }

    /// # Errors
    ///
    /// Returns `SimError::UnknownLocation` if either end is unknown.
    pub fn distance(&self, from: LocationId, to: LocationId) -> Result<f64, SimError> {
        Ok(self.location(from)?.distance_to(self.location(to)?))
    }

    /// Closest other location accepted by `filter`, ties broken by id.
    #[must_use]
    pub fn nearest<F>(&self, from: LocationId, mut filter: F) -> Option<LocationId>
    where
        F: FnMut(&Location) -> bool,
    {
        let origin = self.get(from)?;
        self.locations
            .iter()
            .filter(|location| location.id != from && filter(location))
            .min_by(|a, b| {
                origin
                    .distance_to(a)
                    .total_cmp(&origin.distance_to(b))
                    .then(a.id.cmp(&b.id))
            })
            .map(|location| location.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
