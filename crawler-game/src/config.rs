//! Simulation tuning loaded from JSON.
//!
//! Every field has a serde default, so `{}` yields the shipped balance.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::constants;
use crate::error::SimError;
use crate::time::TimeDuration;
use crate::world::LocationKind;

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least {min:.3} (got {value:.3})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be between {min:.3} and {max:.3} (got {value:.3})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("hit thresholds out of order (miss {miss:.2} >= pierce {pierce:.2})")]
    ThresholdOrder { miss: f64, pierce: f64 },
}

fn check_min(field: &'static str, min: f64, value: f64) -> Result<(), ConfigError> {
    if value.is_nan() || value < min {
        return Err(ConfigError::MinViolation { field, min, value });
    }
    Ok(())
}

fn check_range(field: &'static str, min: f64, max: f64, value: f64) -> Result<(), ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

/// Dynamic population of encounters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterConfig {
    /// Catch every present actor up before announcing an arrival.
    #[serde(default = "EncounterConfig::default_simulate_all")]
    pub simulate_all: bool,
    #[serde(default = "EncounterConfig::default_density")]
    pub density: f64,
    #[serde(default = "EncounterConfig::default_rate_settlement")]
    pub rate_settlement: f64,
    #[serde(default = "EncounterConfig::default_rate_crossroads")]
    pub rate_crossroads: f64,
    #[serde(default = "EncounterConfig::default_rate_resource")]
    pub rate_resource: f64,
    #[serde(default = "EncounterConfig::default_rate_hazard")]
    pub rate_hazard: f64,
    #[serde(default = "EncounterConfig::default_mean_lifetime_hours")]
    pub mean_lifetime_hours: f64,
    #[serde(default = "EncounterConfig::default_min_lifetime_hours")]
    pub min_lifetime_hours: i64,
}

impl EncounterConfig {
    const fn default_simulate_all() -> bool {
        true
    }

    const fn default_density() -> f64 {
        constants::ARRIVAL_DENSITY
    }

    const fn default_rate_settlement() -> f64 {
        constants::ARRIVAL_RATE_SETTLEMENT
    }

    const fn default_rate_crossroads() -> f64 {
        constants::ARRIVAL_RATE_CROSSROADS
    }

    const fn default_rate_resource() -> f64 {
        constants::ARRIVAL_RATE_RESOURCE
    }

    const fn default_rate_hazard() -> f64 {
        constants::ARRIVAL_RATE_HAZARD
    }

    const fn default_mean_lifetime_hours() -> f64 {
        constants::MEAN_LIFETIME_HOURS
    }

    const fn default_min_lifetime_hours() -> i64 {
        constants::MIN_LIFETIME_HOURS
    }

    /// Base hourly arrival rate for a location kind, before population scaling.
    #[must_use]
    pub const fn kind_rate(&self, kind: LocationKind) -> f64 {
        match kind {
            LocationKind::Settlement => self.rate_settlement,
            LocationKind::Crossroads => self.rate_crossroads,
            LocationKind::Resource => self.rate_resource,
            LocationKind::Hazard => self.rate_hazard,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_min("encounter.density", 0.0, self.density)?;
        check_min("encounter.rate_settlement", 0.0, self.rate_settlement)?;
        check_min("encounter.rate_crossroads", 0.0, self.rate_crossroads)?;
        check_min("encounter.rate_resource", 0.0, self.rate_resource)?;
        check_min("encounter.rate_hazard", 0.0, self.rate_hazard)?;
        check_range(
            "encounter.mean_lifetime_hours",
            1.0,
            10_000.0,
            self.mean_lifetime_hours,
        )?;
        if self.min_lifetime_hours < 1 {
            return Err(ConfigError::MinViolation {
                field: "encounter.min_lifetime_hours",
                min: 1.0,
                value: crate::numbers::i64_to_f64(self.min_lifetime_hours),
            });
        }
        Ok(())
    }
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            simulate_all: Self::default_simulate_all(),
            density: Self::default_density(),
            rate_settlement: Self::default_rate_settlement(),
            rate_crossroads: Self::default_rate_crossroads(),
            rate_resource: Self::default_rate_resource(),
            rate_hazard: Self::default_rate_hazard(),
            mean_lifetime_hours: Self::default_mean_lifetime_hours(),
            min_lifetime_hours: Self::default_min_lifetime_hours(),
        }
    }
}

/// Hourly consumption and life-support tuning for crawlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpkeepConfig {
    #[serde(default = "UpkeepConfig::default_wage_per_crew")]
    pub wage_per_crew: f64,
    #[serde(default = "UpkeepConfig::default_rations_per_crew")]
    pub rations_per_crew: f64,
    #[serde(default = "UpkeepConfig::default_water_per_crew")]
    pub water_per_crew: f64,
    #[serde(default = "UpkeepConfig::default_air_per_crew")]
    pub air_per_crew: f64,
    /// Fraction of air consumption recycled while life support is powered.
    #[serde(default = "UpkeepConfig::default_air_recycling")]
    pub air_recycling: f64,
    /// Fraction of crew lost per hour at a full shortfall of one necessity.
    #[serde(default = "UpkeepConfig::default_attrition_rate")]
    pub attrition_rate: f64,
    #[serde(default = "UpkeepConfig::default_depowered_morale_penalty")]
    pub depowered_morale_penalty: f64,
    #[serde(default = "UpkeepConfig::default_unpaid_wage_morale_penalty")]
    pub unpaid_wage_morale_penalty: f64,
    #[serde(default = "UpkeepConfig::default_repair_scrap_cost")]
    pub repair_scrap_cost: f64,
    #[serde(default = "UpkeepConfig::default_shield_power_per_point")]
    pub shield_power_per_point: f64,
}

impl UpkeepConfig {
    const fn default_wage_per_crew() -> f64 {
        constants::WAGE_PER_CREW
    }

    const fn default_rations_per_crew() -> f64 {
        constants::RATIONS_PER_CREW
    }

    const fn default_water_per_crew() -> f64 {
        constants::WATER_PER_CREW
    }

    const fn default_air_per_crew() -> f64 {
        constants::AIR_PER_CREW
    }

    const fn default_air_recycling() -> f64 {
        constants::AIR_RECYCLING
    }

    const fn default_attrition_rate() -> f64 {
        constants::ATTRITION_RATE
    }

    const fn default_depowered_morale_penalty() -> f64 {
        constants::DEPOWERED_MORALE_PENALTY
    }

    const fn default_unpaid_wage_morale_penalty() -> f64 {
        constants::UNPAID_WAGE_MORALE_PENALTY
    }

    const fn default_repair_scrap_cost() -> f64 {
        constants::REPAIR_SCRAP_COST
    }

    const fn default_shield_power_per_point() -> f64 {
        constants::SHIELD_POWER_PER_POINT
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_min("upkeep.wage_per_crew", 0.0, self.wage_per_crew)?;
        check_min("upkeep.rations_per_crew", 0.0, self.rations_per_crew)?;
        check_min("upkeep.water_per_crew", 0.0, self.water_per_crew)?;
        check_min("upkeep.air_per_crew", 0.0, self.air_per_crew)?;
        check_range("upkeep.air_recycling", 0.0, 1.0, self.air_recycling)?;
        check_range("upkeep.attrition_rate", 0.0, 1.0, self.attrition_rate)?;
        check_min(
            "upkeep.depowered_morale_penalty",
            0.0,
            self.depowered_morale_penalty,
        )?;
        check_min(
            "upkeep.unpaid_wage_morale_penalty",
            0.0,
            self.unpaid_wage_morale_penalty,
        )?;
        check_min("upkeep.repair_scrap_cost", 0.0, self.repair_scrap_cost)?;
        check_min(
            "upkeep.shield_power_per_point",
            0.01,
            self.shield_power_per_point,
        )?;
        Ok(())
    }
}

impl Default for UpkeepConfig {
    fn default() -> Self {
        Self {
            wage_per_crew: Self::default_wage_per_crew(),
            rations_per_crew: Self::default_rations_per_crew(),
            water_per_crew: Self::default_water_per_crew(),
            air_per_crew: Self::default_air_per_crew(),
            air_recycling: Self::default_air_recycling(),
            attrition_rate: Self::default_attrition_rate(),
            depowered_morale_penalty: Self::default_depowered_morale_penalty(),
            unpaid_wage_morale_penalty: Self::default_unpaid_wage_morale_penalty(),
            repair_scrap_cost: Self::default_repair_scrap_cost(),
            shield_power_per_point: Self::default_shield_power_per_point(),
        }
    }
}

/// Hit thresholds and combat side-effect magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Rolls (draw + aim) below this miss.
    #[serde(default = "CombatConfig::default_miss_threshold")]
    pub miss_threshold: f64,
    /// Rolls at or above this pierce armor.
    #[serde(default = "CombatConfig::default_pierce_threshold")]
    pub pierce_threshold: f64,
    #[serde(default = "CombatConfig::default_no_fire_delay_seconds")]
    pub no_fire_delay_seconds: i64,
    #[serde(default = "CombatConfig::default_crew_per_damage")]
    pub crew_per_damage: f64,
    #[serde(default = "CombatConfig::default_morale_per_crew_lost")]
    pub morale_per_crew_lost: f64,
    #[serde(default = "CombatConfig::default_first_blood_morale_penalty")]
    pub first_blood_morale_penalty: f64,
    #[serde(default = "CombatConfig::default_hostile_kill_morale_bonus")]
    pub hostile_kill_morale_bonus: f64,
    #[serde(default = "CombatConfig::default_friendly_fire_morale_penalty")]
    pub friendly_fire_morale_penalty: f64,
    #[serde(default = "CombatConfig::default_surrender_morale")]
    pub surrender_morale: f64,
    #[serde(default = "CombatConfig::default_betrayal_evil_points")]
    pub betrayal_evil_points: u32,
    /// Evil points at which NPCs open fire unprompted, unless they trust the actor.
    #[serde(default = "CombatConfig::default_evil_hostility_threshold")]
    pub evil_hostility_threshold: u32,
    /// Standing lost toward an attacker per point of damage landed.
    #[serde(default = "CombatConfig::default_reputation_per_damage")]
    pub reputation_per_damage: f64,
    /// Standing gained toward an actor that spares us.
    #[serde(default = "CombatConfig::default_spare_reputation")]
    pub spare_reputation: f64,
}

impl CombatConfig {
    const fn default_miss_threshold() -> f64 {
        constants::MISS_THRESHOLD
    }

    const fn default_pierce_threshold() -> f64 {
        constants::PIERCE_THRESHOLD
    }

    const fn default_no_fire_delay_seconds() -> i64 {
        constants::NO_FIRE_DELAY_SECONDS
    }

    const fn default_crew_per_damage() -> f64 {
        constants::CREW_PER_DAMAGE
    }

    const fn default_morale_per_crew_lost() -> f64 {
        constants::MORALE_PER_CREW_LOST
    }

    const fn default_first_blood_morale_penalty() -> f64 {
        constants::FIRST_BLOOD_MORALE_PENALTY
    }

    const fn default_hostile_kill_morale_bonus() -> f64 {
        constants::HOSTILE_KILL_MORALE_BONUS
    }

    const fn default_friendly_fire_morale_penalty() -> f64 {
        constants::FRIENDLY_FIRE_MORALE_PENALTY
    }

    const fn default_surrender_morale() -> f64 {
        constants::SURRENDER_MORALE
    }

    const fn default_betrayal_evil_points() -> u32 {
        constants::BETRAYAL_EVIL_POINTS
    }

    const fn default_evil_hostility_threshold() -> u32 {
        constants::EVIL_HOSTILITY_THRESHOLD
    }

    const fn default_reputation_per_damage() -> f64 {
        constants::REPUTATION_PER_DAMAGE
    }

    const fn default_spare_reputation() -> f64 {
        constants::SPARE_REPUTATION
    }

    /// Time cost of an attack round that fired nothing.
    #[must_use]
    pub const fn no_fire_delay(&self) -> TimeDuration {
        TimeDuration::from_seconds(self.no_fire_delay_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_range("combat.miss_threshold", 0.0, 1.0, self.miss_threshold)?;
        check_range("combat.pierce_threshold", 0.0, 2.0, self.pierce_threshold)?;
        if self.miss_threshold >= self.pierce_threshold {
            return Err(ConfigError::ThresholdOrder {
                miss: self.miss_threshold,
                pierce: self.pierce_threshold,
            });
        }
        if self.no_fire_delay_seconds < 1 {
            return Err(ConfigError::MinViolation {
                field: "combat.no_fire_delay_seconds",
                min: 1.0,
                value: crate::numbers::i64_to_f64(self.no_fire_delay_seconds),
            });
        }
        check_min("combat.crew_per_damage", 0.0, self.crew_per_damage)?;
        check_min("combat.morale_per_crew_lost", 0.0, self.morale_per_crew_lost)?;
        check_min(
            "combat.first_blood_morale_penalty",
            0.0,
            self.first_blood_morale_penalty,
        )?;
        check_min(
            "combat.hostile_kill_morale_bonus",
            0.0,
            self.hostile_kill_morale_bonus,
        )?;
        check_min(
            "combat.friendly_fire_morale_penalty",
            0.0,
            self.friendly_fire_morale_penalty,
        )?;
        check_min("combat.surrender_morale", 0.0, self.surrender_morale)?;
        if self.evil_hostility_threshold < 1 {
            return Err(ConfigError::MinViolation {
                field: "combat.evil_hostility_threshold",
                min: 1.0,
                value: f64::from(self.evil_hostility_threshold),
            });
        }
        check_min("combat.reputation_per_damage", 0.0, self.reputation_per_damage)?;
        check_min("combat.spare_reputation", 0.0, self.spare_reputation)?;
        Ok(())
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            miss_threshold: Self::default_miss_threshold(),
            pierce_threshold: Self::default_pierce_threshold(),
            no_fire_delay_seconds: Self::default_no_fire_delay_seconds(),
            crew_per_damage: Self::default_crew_per_damage(),
            morale_per_crew_lost: Self::default_morale_per_crew_lost(),
            first_blood_morale_penalty: Self::default_first_blood_morale_penalty(),
            hostile_kill_morale_bonus: Self::default_hostile_kill_morale_bonus(),
            friendly_fire_morale_penalty: Self::default_friendly_fire_morale_penalty(),
            surrender_morale: Self::default_surrender_morale(),
            betrayal_evil_points: Self::default_betrayal_evil_points(),
            evil_hostility_threshold: Self::default_evil_hostility_threshold(),
            reputation_per_damage: Self::default_reputation_per_damage(),
            spare_reputation: Self::default_spare_reputation(),
        }
    }
}

/// Size of the generated world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "MapConfig::default_locations")]
    pub locations: usize,
    #[serde(default = "MapConfig::default_extent_km")]
    pub extent_km: f64,
}

impl MapConfig {
    const fn default_locations() -> usize {
        constants::MAP_LOCATIONS
    }

    const fn default_extent_km() -> f64 {
        constants::MAP_EXTENT_KM
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=10_000).contains(&self.locations) {
            return Err(ConfigError::RangeViolation {
                field: "map.locations",
                min: 2.0,
                max: 10_000.0,
                value: crate::numbers::u64_to_f64(self.locations as u64),
            });
        }
        check_range("map.extent_km", 1.0, 100_000.0, self.extent_km)
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            locations: Self::default_locations(),
            extent_km: Self::default_extent_km(),
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub encounter: EncounterConfig,
    #[serde(default)]
    pub upkeep: UpkeepConfig,
    #[serde(default)]
    pub combat: CombatConfig,
    #[serde(default)]
    pub map: MapConfig,
    /// Propagate retrocausal updates as errors instead of logging and skipping them.
    #[serde(default = "SimConfig::default_strict_time")]
    pub strict_time: bool,
    #[serde(default = "SimConfig::default_sweep_interval_hours")]
    pub sweep_interval_hours: i64,
}

impl SimConfig {
    #[must_use]
    pub const fn default_strict_time() -> bool {
        true
    }

    #[must_use]
    pub const fn default_sweep_interval_hours() -> i64 {
        constants::SWEEP_INTERVAL_HOURS
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> TimeDuration {
        TimeDuration::from_hours(self.sweep_interval_hours)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.encounter.validate()?;
        self.upkeep.validate()?;
        self.combat.validate()?;
        self.map.validate()?;
        if !(1..=1_000).contains(&self.sweep_interval_hours) {
            return Err(ConfigError::RangeViolation {
                field: "sweep_interval_hours",
                min: 1.0,
                max: 1_000.0,
                value: crate::numbers::i64_to_f64(self.sweep_interval_hours),
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Snapshot` for malformed JSON and `SimError::Config`
    /// for values outside their bounds.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails `from_json`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            encounter: EncounterConfig::default(),
            upkeep: UpkeepConfig::default(),
            combat: CombatConfig::default(),
            map: MapConfig::default(),
            strict_time: Self::default_strict_time(),
            sweep_interval_hours: Self::default_sweep_interval_hours(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = SimConfig::from_json("{}").unwrap();
        assert_eq!(config, SimConfig::default());
        assert!(config.strict_time);
        assert!(config.encounter.simulate_all);
    }

    #[test]
    fn partial_json_overrides_single_fields() {
        let config =
            SimConfig::from_json(r#"{"strict_time": false, "combat": {"miss_threshold": 0.1}}"#)
                .unwrap();
        assert!(!config.strict_time);
        assert!((config.combat.miss_threshold - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.upkeep, UpkeepConfig::default());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = SimConfig::default();
        config.upkeep.air_recycling = 1.5;
        assert_eq!(
            config.validate(),
            Err(ConfigError::RangeViolation {
                field: "upkeep.air_recycling",
                min: 0.0,
                max: 1.0,
                value: 1.5,
            })
        );

        let mut config = SimConfig::default();
        config.encounter.density = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MinViolation {
                field: "encounter.density",
                ..
            })
        ));
    }

    #[test]
    fn evil_threshold_must_be_positive() {
        let config = SimConfig::from_json(r#"{"combat": {"evil_hostility_threshold": 5}}"#).unwrap();
        assert_eq!(config.combat.evil_hostility_threshold, 5);

        let mut config = SimConfig::default();
        config.combat.evil_hostility_threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MinViolation {
                field: "combat.evil_hostility_threshold",
                ..
            })
        ));
        config.combat.evil_hostility_threshold = 1;
        config.combat.reputation_per_damage = -0.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MinViolation {
                field: "combat.reputation_per_damage",
                ..
            })
        ));
    }

    #[test]
    fn thresholds_must_be_ordered() {
        let mut config = SimConfig::default();
        config.combat.miss_threshold = 0.95;
        config.combat.pierce_threshold = 0.9;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOrder { .. })
        ));
    }

    #[test]
    fn invalid_json_surfaces_as_config_error() {
        let err = SimConfig::from_json(r#"{"sweep_interval_hours": 0}"#).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
        let err = SimConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, SimError::Snapshot(_)));
    }

    #[test]
    fn kind_rates_follow_location_kind() {
        let config = EncounterConfig::default();
        assert!(
            config.kind_rate(LocationKind::Settlement) > config.kind_rate(LocationKind::Hazard)
        );
    }
}
