//! Centralized balance and tuning constants for the crawler simulation.
//!
//! Configuration defaults point here so the shipped balance lives in one
//! reviewed place; `SimConfig` JSON can still override any of them.

// Stream domains -----------------------------------------------------------
pub(crate) const DOMAIN_MAP: &[u8] = b"crawler.map";
pub(crate) const DOMAIN_WORLD: &[u8] = b"crawler.world";
pub(crate) const DOMAIN_SPAWN: &[u8] = b"crawler.spawn";

// Messages -----------------------------------------------------------------
pub(crate) const MESSAGE_LOG_CAPACITY: usize = 64;

// Encounter population -----------------------------------------------------
pub(crate) const ARRIVAL_DENSITY: f64 = 0.0005;
pub(crate) const ARRIVAL_RATE_SETTLEMENT: f64 = 1.0;
pub(crate) const ARRIVAL_RATE_CROSSROADS: f64 = 0.6;
pub(crate) const ARRIVAL_RATE_RESOURCE: f64 = 0.25;
pub(crate) const ARRIVAL_RATE_HAZARD: f64 = 0.1;
pub(crate) const MEAN_LIFETIME_HOURS: f64 = 12.0;
pub(crate) const MIN_LIFETIME_HOURS: i64 = 1;

// Upkeep -------------------------------------------------------------------
pub(crate) const WAGE_PER_CREW: f64 = 0.1;
pub(crate) const RATIONS_PER_CREW: f64 = 0.05;
pub(crate) const WATER_PER_CREW: f64 = 0.1;
pub(crate) const AIR_PER_CREW: f64 = 0.2;
pub(crate) const AIR_RECYCLING: f64 = 0.9;
pub(crate) const ATTRITION_RATE: f64 = 0.1;
pub(crate) const DEPOWERED_MORALE_PENALTY: f64 = 5.0;
pub(crate) const UNPAID_WAGE_MORALE_PENALTY: f64 = 1.0;
pub(crate) const REPAIR_SCRAP_COST: f64 = 10.0;
pub(crate) const SHIELD_POWER_PER_POINT: f64 = 1.0;

// Combat -------------------------------------------------------------------
pub(crate) const MISS_THRESHOLD: f64 = 0.3;
pub(crate) const PIERCE_THRESHOLD: f64 = 0.9;
pub(crate) const NO_FIRE_DELAY_SECONDS: i64 = 500;
pub(crate) const CREW_PER_DAMAGE: f64 = 1.0;
pub(crate) const MORALE_PER_CREW_LOST: f64 = 0.5;
pub(crate) const FIRST_BLOOD_MORALE_PENALTY: f64 = 2.0;
pub(crate) const HOSTILE_KILL_MORALE_BONUS: f64 = 5.0;
pub(crate) const FRIENDLY_FIRE_MORALE_PENALTY: f64 = 10.0;
pub(crate) const SURRENDER_MORALE: f64 = 5.0;
pub(crate) const BETRAYAL_EVIL_POINTS: u32 = 3;
/// NPCs treat an actor at or above this many evil points as hostile.
pub(crate) const EVIL_HOSTILITY_THRESHOLD: u32 = 3;
pub(crate) const REPUTATION_PER_DAMAGE: f64 = 0.1;
pub(crate) const SPARE_REPUTATION: f64 = 5.0;

// Segments -----------------------------------------------------------------
/// Disabled armor and plating soak their rated reduction divided by this.
pub(crate) const DISABLED_SOAK_FACTOR: u32 = 2;

// World --------------------------------------------------------------------
pub(crate) const MAP_LOCATIONS: usize = 24;
pub(crate) const MAP_EXTENT_KM: f64 = 400.0;
pub(crate) const SWEEP_INTERVAL_HOURS: i64 = 1;
