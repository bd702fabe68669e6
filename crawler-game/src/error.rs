//! Error types for the simulation core.

use thiserror::Error;

use crate::actor::ActorId;
use crate::config::ConfigError;
use crate::time::TimePoint;
use crate::world::LocationId;

/// Invalid internal states and rejected operations.
///
/// Resource exhaustion, missed shots and empty queues are simulation
/// outcomes, not errors, and never show up here.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("retrocausal update of {entity}: clock at {current}, requested {requested}")]
    Retrocausality {
        entity: String,
        current: TimePoint,
        requested: TimePoint,
    },
    #[error("unknown actor {0}")]
    UnknownActor(ActorId),
    #[error("unknown location {0}")]
    UnknownLocation(LocationId),
    #[error("actor {actor} is not present at {location}")]
    NotPresent {
        actor: ActorId,
        location: LocationId,
    },
    #[error("actor {0} has already ended")]
    ActorEnded(ActorId),
    #[error("actor {actor} cannot travel: {reason}")]
    CannotTravel {
        actor: ActorId,
        reason: &'static str,
    },
    #[error("random stream state is corrupt (all-zero xorshift state)")]
    CorruptRng,
    #[error("the NONE time sentinel cannot be used here")]
    InvalidTime,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl SimError {
    pub(crate) fn retrocausal(
        entity: impl Into<String>,
        current: TimePoint,
        requested: TimePoint,
    ) -> Self {
        Self::Retrocausality {
            entity: entity.into(),
            current,
            requested,
        }
    }

    /// Whether this error reports an attempt to move a clock backwards.
    #[must_use]
    pub const fn is_retrocausal(&self) -> bool {
        matches!(self, Self::Retrocausality { .. })
    }
}
