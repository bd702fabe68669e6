//! Crawler segments: the modular parts that generate power, move, fight and
//! defend.
//!
//! Each segment kind is a variant of `SegmentKind`; behavior that differs by
//! kind is dispatched with `match` instead of a type hierarchy.

use serde::{Deserialize, Serialize};

use crate::constants::DISABLED_SOAK_FACTOR;
use crate::time::TimeDuration;

/// Kind-specific stats and mutable pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Generator with storage.
    Reactor {
        capacity: f64,
        charge: f64,
        generation: f64,
        fuel_per_hour: f64,
    },
    /// Generator without storage.
    Charger { generation: f64, fuel_per_hour: f64 },
    Traction { speed_kmh: f64, fuel_per_km: f64 },
    Weapon {
        damage: u32,
        shots: u32,
        aim: f64,
        drain: f64,
        delay: TimeDuration,
    },
    Shield {
        pool: u32,
        capacity: u32,
        recharge: u32,
    },
    /// Flat reduction that never wears.
    Armor { reduction: u32 },
    /// Flat reduction that takes a hit whenever it absorbs damage.
    Plating { reduction: u32 },
}

/// Derived operating state, in order of precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentState {
    Destroyed,
    Disabled,
    Inactive,
    Active,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub kind: SegmentKind,
    pub hits: u32,
    pub max_hits: u32,
    pub switched_on: bool,
}

impl Segment {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: SegmentKind, max_hits: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            hits: 0,
            max_hits: max_hits.max(1),
            switched_on: true,
        }
    }

    /// A fully charged reactor.
    #[must_use]
    pub fn reactor(name: &str, capacity: f64, generation: f64, fuel_per_hour: f64, max_hits: u32) -> Self {
        Self::new(
            name,
            SegmentKind::Reactor {
                capacity,
                charge: capacity,
                generation,
                fuel_per_hour,
            },
            max_hits,
        )
    }

    #[must_use]
    pub fn charger(name: &str, generation: f64, fuel_per_hour: f64, max_hits: u32) -> Self {
        Self::new(
            name,
            SegmentKind::Charger {
                generation,
                fuel_per_hour,
            },
            max_hits,
        )
    }

    #[must_use]
    pub fn traction(name: &str, speed_kmh: f64, fuel_per_km: f64, max_hits: u32) -> Self {
        Self::new(
            name,
            SegmentKind::Traction {
                speed_kmh,
                fuel_per_km,
            },
            max_hits,
        )
    }

    #[must_use]
    pub fn weapon(
        name: &str,
        damage: u32,
        shots: u32,
        aim: f64,
        drain: f64,
        delay: TimeDuration,
        max_hits: u32,
    ) -> Self {
        Self::new(
            name,
            SegmentKind::Weapon {
                damage,
                shots,
                aim,
                drain,
                delay,
            },
            max_hits,
        )
    }

    /// A shield starting at full pool.
    #[must_use]
    pub fn shield(name: &str, capacity: u32, recharge: u32, max_hits: u32) -> Self {
        Self::new(
            name,
            SegmentKind::Shield {
                pool: capacity,
                capacity,
                recharge,
            },
            max_hits,
        )
    }

    #[must_use]
    pub fn armor(name: &str, reduction: u32, max_hits: u32) -> Self {
        Self::new(name, SegmentKind::Armor { reduction }, max_hits)
    }

    #[must_use]
    pub fn plating(name: &str, reduction: u32, max_hits: u32) -> Self {
        Self::new(name, SegmentKind::Plating { reduction }, max_hits)
    }

    #[must_use]
    pub fn state(&self) -> SegmentState {
        if self.hits >= self.max_hits {
            SegmentState::Destroyed
        } else if self.hits > 0 && self.hits.saturating_mul(2) >= self.max_hits {
            SegmentState::Disabled
        } else if !self.switched_on {
            SegmentState::Inactive
        } else {
            SegmentState::Active
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SegmentState::Active
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.state() == SegmentState::Destroyed
    }

    /// Shields, armor and plating: the layers damage passes before the hull.
    #[must_use]
    pub const fn is_defense(&self) -> bool {
        matches!(
            self.kind,
            SegmentKind::Shield { .. } | SegmentKind::Armor { .. } | SegmentKind::Plating { .. }
        )
    }

    #[must_use]
    pub const fn is_armor_class(&self) -> bool {
        matches!(
            self.kind,
            SegmentKind::Armor { .. } | SegmentKind::Plating { .. }
        )
    }

    #[must_use]
    pub const fn is_weapon(&self) -> bool {
        matches!(self.kind, SegmentKind::Weapon { .. })
    }

    /// Hits left before destruction.
    #[must_use]
    pub const fn hits_remaining(&self) -> u32 {
        self.max_hits.saturating_sub(self.hits)
    }

    /// Hourly generation when active; zero for non-generators.
    #[must_use]
    pub fn generation(&self) -> f64 {
        if !self.is_active() {
            return 0.0;
        }
        match self.kind {
            SegmentKind::Reactor { generation, .. } | SegmentKind::Charger { generation, .. } => {
                generation
            }
            _ => 0.0,
        }
    }

    /// Hourly fuel burn when active.
    #[must_use]
    pub fn fuel_per_hour(&self) -> f64 {
        if !self.is_active() {
            return 0.0;
        }
        match self.kind {
            SegmentKind::Reactor { fuel_per_hour, .. }
            | SegmentKind::Charger { fuel_per_hour, .. } => fuel_per_hour,
            _ => 0.0,
        }
    }

    /// Phase 0: shield absorbs from its pool. Returns unabsorbed damage.
    pub fn shield_absorb(&mut self, damage: u32) -> u32 {
        match &mut self.kind {
            SegmentKind::Shield { pool, .. } => {
                let absorbed = damage.min(*pool);
                *pool -= absorbed;
                damage - absorbed
            }
            _ => damage,
        }
    }

    /// Phase 1: armor-class soak. Disabled segments soak a reduced amount;
    /// plating takes a hit whenever it absorbs anything.
    pub fn soak(&mut self, damage: u32) -> u32 {
        let disabled = self.state() == SegmentState::Disabled;
        let (rated, ablates) = match self.kind {
            SegmentKind::Armor { reduction } => (reduction, false),
            SegmentKind::Plating { reduction } => (reduction, true),
            _ => return damage,
        };
        let reduction = if disabled {
            rated / DISABLED_SOAK_FACTOR
        } else {
            rated
        };
        let absorbed = damage.min(reduction);
        if ablates && absorbed > 0 {
            self.hits = (self.hits + 1).min(self.max_hits);
        }
        damage - absorbed
    }

    /// Phase 2: take damage directly as hits. Returns unabsorbed damage.
    pub fn absorb_hits(&mut self, damage: u32) -> u32 {
        let absorbed = damage.min(self.hits_remaining());
        self.hits += absorbed;
        damage - absorbed
    }

    /// Remove one hit of damage. Destroyed segments are beyond field repair.
    pub fn repair_one(&mut self) -> bool {
        if self.hits == 0 || self.is_destroyed() {
            return false;
        }
        self.hits -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_derives_from_hits_and_switch() {
        let mut seg = Segment::armor("hull plate", 4, 4);
        assert_eq!(seg.state(), SegmentState::Active);
        seg.switched_on = false;
        assert_eq!(seg.state(), SegmentState::Inactive);
        seg.hits = 2;
        assert_eq!(seg.state(), SegmentState::Disabled);
        seg.hits = 4;
        assert_eq!(seg.state(), SegmentState::Destroyed);
    }

    #[test]
    fn single_hit_segments_are_not_born_disabled() {
        let seg = Segment::traction("wheels", 10.0, 0.1, 1);
        assert_eq!(seg.state(), SegmentState::Active);
    }

    #[test]
    fn shield_drains_its_pool_first() {
        let mut shield = Segment::shield("deflector", 5, 1, 3);
        assert_eq!(shield.shield_absorb(3), 0);
        assert_eq!(shield.shield_absorb(4), 2);
        assert_eq!(shield.shield_absorb(4), 4);
    }

    #[test]
    fn disabled_armor_soaks_less_and_plating_ablates() {
        let mut armor = Segment::armor("armor", 6, 4);
        assert_eq!(armor.soak(10), 4);
        assert_eq!(armor.hits, 0);
        armor.hits = 2;
        assert_eq!(armor.soak(10), 7);

        let mut plating = Segment::plating("plating", 3, 2);
        assert_eq!(plating.soak(2), 0);
        assert_eq!(plating.hits, 1);
        assert_eq!(plating.state(), SegmentState::Disabled);
    }

    #[test]
    fn hull_hits_cap_at_destruction() {
        let mut seg = Segment::traction("treads", 10.0, 0.1, 5);
        assert_eq!(seg.absorb_hits(3), 0);
        assert_eq!(seg.absorb_hits(4), 2);
        assert!(seg.is_destroyed());
        assert!(!seg.repair_one());
    }

    #[test]
    fn only_active_generators_produce() {
        let mut reactor = Segment::reactor("core", 10.0, 4.0, 1.0, 4);
        assert!((reactor.generation() - 4.0).abs() < f64::EPSILON);
        reactor.switched_on = false;
        assert!(reactor.generation().abs() < f64::EPSILON);
        assert!(reactor.fuel_per_hour().abs() < f64::EPSILON);
    }
}
