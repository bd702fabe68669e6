//! Crawler Simulation Engine
//!
//! Platform-agnostic core of the Crawler world simulation: a discrete-event
//! scheduler, lazily caught-up actors, location-bound encounters with
//! Poisson-driven population, and power-budgeted segment combat. The crate
//! carries no UI; a front end drives it through `Game::process_events_until`.

pub mod actor;
pub mod archetype;
pub mod combat;
pub mod config;
pub mod constants;
pub mod encounter;
pub mod error;
pub mod event;
pub mod game;
pub mod inventory;
pub mod numbers;
pub mod power;
pub mod relations;
pub mod rng;
pub mod scheduler;
pub mod segment;
pub mod storage;
pub mod time;
pub mod world;

// Re-export commonly used types
pub use actor::{Actor, ActorId, ActorKind, Crawler, EndState, Faction, Message, SiteKind};
pub use archetype::{Archetype, build_site};
pub use combat::{AttackReport, DamageReport, HitOutcome, HitRecord, apply_damage, resolve_attack};
pub use config::{CombatConfig, ConfigError, EncounterConfig, MapConfig, SimConfig, UpkeepConfig};
pub use encounter::{Encounter, PendingArrival, Presence};
pub use error::SimError;
pub use event::GameEvent;
pub use game::{Game, GameStats};
pub use inventory::{Commodity, Inventory};
pub use relations::ActorToActor;
pub use rng::{XorShift, derive_stream_seed};
pub use scheduler::{Scheduled, Scheduler};
pub use segment::{Segment, SegmentKind, SegmentState};
pub use storage::FileStorage;
pub use time::{TimeDuration, TimePoint};
pub use world::{Location, LocationId, LocationKind, Map, Terrain};

/// Trait for abstracting save/load operations.
/// Snapshots are the JSON produced by `Game::to_json`.
pub trait GameStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save a snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save_game(&self, save_name: &str, snapshot: &str) -> Result<(), Self::Error>;

    /// Load a snapshot, `None` if there is no save under that name
    ///
    /// # Errors
    ///
    /// Returns an error if the save exists but cannot be read.
    fn load_game(&self, save_name: &str) -> Result<Option<String>, Self::Error>;

    /// Delete a saved snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error>;
}

/// Creates games from one configuration and persists them through a storage
/// backend.
pub struct GameEngine<S>
where
    S: GameStorage,
{
    config: SimConfig,
    storage: S,
}

impl<S> GameEngine<S>
where
    S: GameStorage,
{
    /// Create a new engine with the provided configuration and storage
    pub const fn new(config: SimConfig, storage: S) -> Self {
        Self { config, storage }
    }

    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Create a new game world from `seed`
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn create_game(&self, seed: u64) -> Result<Game, SimError> {
        Game::new(seed, self.config.clone())
    }

    /// Save a game under `save_name`
    ///
    /// # Errors
    ///
    /// Returns an error if the game cannot be serialized or stored.
    pub fn save_game(&self, save_name: &str, game: &Game) -> anyhow::Result<()>
    where
        S::Error: Into<anyhow::Error>,
    {
        use anyhow::Context;

        let snapshot = game.to_json().context("serializing game snapshot")?;
        self.storage
            .save_game(save_name, &snapshot)
            .map_err(Into::<anyhow::Error>::into)
            .with_context(|| format!("saving {save_name}"))
    }

    /// Load a game saved under `save_name`
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be read or is not a valid snapshot.
    pub fn load_game(&self, save_name: &str) -> anyhow::Result<Option<Game>>
    where
        S::Error: Into<anyhow::Error>,
    {
        use anyhow::Context;

        let Some(snapshot) = self.storage.load_game(save_name).map_err(Into::<anyhow::Error>::into)? else {
            return Ok(None);
        };
        let game = Game::from_json(&snapshot).with_context(|| format!("restoring {save_name}"))?;
        Ok(Some(game))
    }

    /// Delete the save under `save_name`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to delete it.
    pub fn delete_game(&self, save_name: &str) -> Result<(), S::Error> {
        self.storage.delete_save(save_name)
    }
}
