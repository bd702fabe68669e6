//! Commodity stocks carried by actors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Everything an actor can hold a quantity of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Commodity {
    /// Currency for wages, trade and repairs.
    Scrap,
    Fuel,
    Crew,
    Morale,
    Rations,
    Water,
    Air,
    Goods,
}

impl Commodity {
    pub const ALL: [Self; 8] = [
        Self::Scrap,
        Self::Fuel,
        Self::Crew,
        Self::Morale,
        Self::Rations,
        Self::Water,
        Self::Air,
        Self::Goods,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Scrap => "scrap",
            Self::Fuel => "fuel",
            Self::Crew => "crew",
            Self::Morale => "morale",
            Self::Rations => "rations",
            Self::Water => "water",
            Self::Air => "air",
            Self::Goods => "goods",
        }
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Non-negative commodity quantities. Absent entries read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    stock: BTreeMap<Commodity, f64>,
}

impl Inventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style constructor used by archetypes and tests.
    #[must_use]
    pub fn with(mut self, commodity: Commodity, amount: f64) -> Self {
        self.set(commodity, amount);
        self
    }

    #[must_use]
    pub fn get(&self, commodity: Commodity) -> f64 {
        self.stock.get(&commodity).copied().unwrap_or(0.0)
    }

    /// Overwrite a quantity; negative or non-finite values store zero.
    pub fn set(&mut self, commodity: Commodity, amount: f64) {
        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        if amount <= 0.0 {
            self.stock.remove(&commodity);
        } else {
            self.stock.insert(commodity, amount);
        }
    }

    pub fn add(&mut self, commodity: Commodity, amount: f64) {
        if amount > 0.0 {
            self.set(commodity, self.get(commodity) + amount);
        }
    }

    /// Remove up to `amount`, returning the shortfall that could not be covered.
    pub fn remove(&mut self, commodity: Commodity, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        let held = self.get(commodity);
        if held >= amount {
            self.set(commodity, held - amount);
            0.0
        } else {
            self.set(commodity, 0.0);
            amount - held
        }
    }

    /// Whether `amount` can be removed without a shortfall.
    #[must_use]
    pub fn covers(&self, commodity: Commodity, amount: f64) -> bool {
        self.get(commodity) >= amount
    }

    /// Move everything into `other`, leaving this inventory empty.
    pub fn transfer_all(&mut self, other: &mut Self) {
        for (commodity, amount) in std::mem::take(&mut self.stock) {
            other.add(commodity, amount);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stock.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Commodity, f64)> + '_ {
        self.stock.iter().map(|(commodity, amount)| (*commodity, *amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_reports_shortfall() {
        let mut inv = Inventory::new().with(Commodity::Fuel, 3.0);
        assert!((inv.remove(Commodity::Fuel, 2.0)).abs() < f64::EPSILON);
        assert!((inv.remove(Commodity::Fuel, 4.0) - 3.0).abs() < f64::EPSILON);
        assert!(inv.get(Commodity::Fuel).abs() < f64::EPSILON);
        assert!(inv.is_empty());
    }

    #[test]
    fn quantities_never_go_negative() {
        let mut inv = Inventory::new();
        inv.set(Commodity::Morale, -5.0);
        inv.add(Commodity::Morale, -1.0);
        inv.set(Commodity::Air, f64::NAN);
        assert!(inv.is_empty());
    }

    #[test]
    fn transfer_moves_everything() {
        let mut cache = Inventory::new()
            .with(Commodity::Scrap, 40.0)
            .with(Commodity::Goods, 2.0);
        let mut hold = Inventory::new().with(Commodity::Scrap, 1.0);
        cache.transfer_all(&mut hold);
        assert!(cache.is_empty());
        assert!((hold.get(Commodity::Scrap) - 41.0).abs() < f64::EPSILON);
        assert!(hold.covers(Commodity::Goods, 2.0));
    }

    #[test]
    fn serializes_as_a_flat_map() {
        let inv = Inventory::new().with(Commodity::Water, 1.5);
        assert_eq!(serde_json::to_string(&inv).unwrap(), r#"{"Water":1.5}"#);
    }
}
