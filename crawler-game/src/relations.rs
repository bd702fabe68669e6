//! Directed actor-to-actor relationship records.

use serde::{Deserialize, Serialize};

/// How one actor regards another. Created lazily on first interaction and
/// kept for the rest of the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorToActor {
    /// Declared stance, seeded from faction defaults.
    pub hostile: bool,
    /// This actor has surrendered to the other.
    pub surrendered: bool,
    /// This actor has spared the other after it surrendered.
    pub spared: bool,
    /// The other attacked this actor after sparing it.
    pub betrayed: bool,
    /// Latched on the first damage taken from the other.
    pub blooded: bool,
    /// This actor opened fire on the other without cause. Decided once, on
    /// the first round fired at it.
    #[serde(default)]
    pub aggressor: bool,
    /// Damage this actor has fired at the other, landed or not.
    pub damage_created: u64,
    /// Damage this actor has landed on the other.
    pub damage_inflicted: u64,
    /// Damage this actor has taken from the other.
    pub damage_taken: u64,
    pub positive: f64,
    pub negative: f64,
}

impl ActorToActor {
    #[must_use]
    pub fn with_stance(hostile: bool) -> Self {
        Self {
            hostile,
            ..Self::default()
        }
    }

    /// Hostile by stance, or because the other has drawn blood.
    #[must_use]
    pub const fn is_hostile(&self) -> bool {
        self.hostile || self.damage_taken > 0
    }

    /// Net standing in `(-1, 1)`; zero with no history.
    #[must_use]
    pub fn trust(&self) -> f64 {
        (self.positive - self.negative) / (self.positive + self.negative + 1.0)
    }

    pub fn improve(&mut self, amount: f64) {
        self.positive += amount.max(0.0);
    }

    pub fn worsen(&mut self, amount: f64) {
        self.negative += amount.max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_is_bounded_and_signed() {
        let mut rel = ActorToActor::default();
        assert!(rel.trust().abs() < f64::EPSILON);
        rel.improve(9.0);
        assert!(rel.trust() > 0.8 && rel.trust() < 1.0);
        rel.worsen(30.0);
        assert!(rel.trust() < 0.0 && rel.trust() > -1.0);
    }

    #[test]
    fn damage_makes_a_neutral_hostile() {
        let mut rel = ActorToActor::with_stance(false);
        assert!(!rel.is_hostile());
        rel.damage_taken = 1;
        assert!(rel.is_hostile());
    }
}
