//! Scheduled game events.
//!
//! Events carry data only. `Game` dispatches them in two phases: `on_start`
//! takes the actor out of wherever it was, `on_end` puts it where it goes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::actor::ActorId;
use crate::archetype::Archetype;
use crate::world::LocationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// `actor` reaches `location` at the end of a journey.
    Arrival { actor: ActorId, location: LocationId },
    /// A transient actor's lifetime at `location` is over.
    Departure { actor: ActorId, location: LocationId },
    /// `actor` leaves `from`; the matching `Arrival` is scheduled on completion.
    Travel {
        actor: ActorId,
        from: LocationId,
        to: LocationId,
    },
    /// A scripted arrival of a fresh crawler.
    Spawn {
        location: LocationId,
        archetype: Archetype,
    },
    /// One attack round; the next one is rescheduled after the weapon delay.
    Attack { attacker: ActorId, target: ActorId },
    /// Hourly update of an observed encounter.
    EncounterTick { location: LocationId },
    /// Hourly encounter eviction pass.
    Sweep,
}

impl GameEvent {
    /// Tiebreak between events due at the same instant; lower fires first.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        match self {
            Self::Arrival { .. } => 0,
            Self::Departure { .. } => 1,
            Self::Travel { .. } => 2,
            Self::Spawn { .. } => 3,
            Self::Attack { .. } => 5,
            Self::EncounterTick { .. } => 8,
            Self::Sweep => 9,
        }
    }

    /// Location whose encounter must stay materialized while this is pending.
    #[must_use]
    pub const fn location(&self) -> Option<LocationId> {
        match self {
            Self::Arrival { location, .. }
            | Self::Departure { location, .. }
            | Self::Spawn { location, .. }
            | Self::EncounterTick { location } => Some(*location),
            Self::Travel { from, .. } => Some(*from),
            Self::Attack { .. } | Self::Sweep => None,
        }
    }

    /// Actors this event acts on.
    #[must_use]
    pub fn actors(&self) -> Vec<ActorId> {
        match self {
            Self::Arrival { actor, .. } | Self::Departure { actor, .. } | Self::Travel { actor, .. } => {
                vec![*actor]
            }
            Self::Attack { attacker, target } => vec![*attacker, *target],
            Self::Spawn { .. } | Self::EncounterTick { .. } | Self::Sweep => Vec::new(),
        }
    }
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arrival { actor, location } => write!(f, "arrival of {actor} at {location}"),
            Self::Departure { actor, location } => write!(f, "departure of {actor} from {location}"),
            Self::Travel { actor, from, to } => write!(f, "travel of {actor} from {from} to {to}"),
            Self::Spawn { location, archetype } => write!(f, "spawn of {archetype} at {location}"),
            Self::Attack { attacker, target } => write!(f, "attack by {attacker} on {target}"),
            Self::EncounterTick { location } => write!(f, "tick of {location}"),
            Self::Sweep => f.write_str("encounter sweep"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrivals_win_ties_and_sweeps_come_last() {
        let arrival = GameEvent::Arrival {
            actor: ActorId(1),
            location: LocationId(0),
        };
        let attack = GameEvent::Attack {
            attacker: ActorId(1),
            target: ActorId(2),
        };
        assert!(arrival.priority() < attack.priority());
        assert!(attack.priority() < GameEvent::Sweep.priority());
    }

    #[test]
    fn travel_pins_its_origin() {
        let travel = GameEvent::Travel {
            actor: ActorId(3),
            from: LocationId(1),
            to: LocationId(2),
        };
        assert_eq!(travel.location(), Some(LocationId(1)));
        assert_eq!(travel.actors(), vec![ActorId(3)]);
        assert_eq!(GameEvent::Sweep.location(), None);
        assert_eq!(travel.to_string(), "travel of A3 from L1 to L2");
    }
}
