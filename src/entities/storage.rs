use serde::{Deserialize, Serialize};

use super::{annualised_cost, WaterSource};
use crate::error::ConfigError;

/// On-farm water storage. Composes a named water source; gross seasonal
/// availability through the storage is capped by both the storage
/// capacity and the source entitlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterStorage {
    pub name: String,
    pub capacity_ml: f64,
    /// Construction cost per ML of capacity.
    pub cost_per_ml: f64,
    /// Annual maintenance as a fraction of construction cost.
    pub maintenance_rate: f64,
    pub discount_rate: f64,
    pub lifespan_years: f64,
    /// Name of the water source feeding this storage.
    pub source: String,
}

impl WaterStorage {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_ml < 0.0 || self.lifespan_years <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "storage '{}' has invalid capacity or lifespan",
                self.name
            )));
        }
        Ok(())
    }

    /// Annualised construction plus maintenance, per ML of water used.
    pub fn annual_cost_per_ml(&self) -> f64 {
        annualised_cost(self.cost_per_ml, self.discount_rate, self.lifespan_years)
            + self.maintenance_rate * self.cost_per_ml
    }

    /// Seasonal water obtainable through this storage from `source`.
    pub fn gross_availability_ml(&self, source: &WaterSource) -> f64 {
        if source.name == self.source {
            self.capacity_ml.min(source.entitlement_ml)
        } else {
            source.entitlement_ml
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_capped_by_capacity_for_own_source() {
        let storage = WaterStorage {
            name: "turkey-nest".into(),
            capacity_ml: 60.0,
            cost_per_ml: 900.0,
            maintenance_rate: 0.01,
            discount_rate: 0.07,
            lifespan_years: 30.0,
            source: "river".into(),
        };
        let river = WaterSource::new_for_tests("river", 100.0);
        let bore = WaterSource::new_for_tests("bore", 40.0);
        assert_eq!(storage.gross_availability_ml(&river), 60.0);
        assert_eq!(storage.gross_availability_ml(&bore), 40.0);
    }
}
