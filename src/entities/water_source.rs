use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A seasonal water entitlement shared across the farm's fields. The
/// seasonal pool is write-once (reset at season start) and read-many;
/// consumption is implicit in the optimiser's area allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterSource {
    pub name: String,
    /// Seasonal entitlement, ML.
    pub entitlement_ml: f64,
    /// Purchase/usage cost per ML.
    pub cost_per_ml: f64,
    /// Market value of water left unused, per ML (saved-water credit).
    #[serde(default)]
    pub saved_water_value_per_ml: f64,
    /// Total pumping head, metres.
    pub pumping_head_m: f64,
    /// Energy cost of lifting one ML by one metre.
    #[serde(default = "default_pump_cost")]
    pub pumping_cost_per_ml_per_m: f64,
    /// Water available this season. Refreshed at every season opening.
    #[serde(default, skip_serializing)]
    pub available_ml: f64,
}

fn default_pump_cost() -> f64 {
    0.25
}

impl WaterSource {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entitlement_ml < 0.0 || self.pumping_head_m < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "water source '{}' has negative entitlement or head",
                self.name
            )));
        }
        Ok(())
    }

    /// Cost of pumping one ML from this source.
    pub fn pumping_cost_per_ml(&self) -> f64 {
        self.pumping_head_m * self.pumping_cost_per_ml_per_m
    }

    /// Refreshes the seasonal pool to the full entitlement.
    pub fn reset_season(&mut self) {
        self.available_ml = self.entitlement_ml;
    }

    #[cfg(test)]
    pub fn new_for_tests(name: &str, entitlement_ml: f64) -> Self {
        Self {
            name: name.into(),
            entitlement_ml,
            cost_per_ml: 30.0,
            saved_water_value_per_ml: 0.0,
            pumping_head_m: 10.0,
            pumping_cost_per_ml_per_m: default_pump_cost(),
            available_ml: entitlement_ml,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pumping_cost_scales_with_head() {
        let source = WaterSource::new_for_tests("bore", 50.0);
        assert!((source.pumping_cost_per_ml() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn season_reset_restores_entitlement() {
        let mut source = WaterSource::new_for_tests("river", 75.0);
        source.available_ml = 10.0;
        source.reset_season();
        assert_eq!(source.available_ml, 75.0);
    }
}
