use serde::{Deserialize, Serialize};

use super::annualised_cost;
use crate::error::ConfigError;

/// An irrigation technology option. Capital cost is incurred once, the
/// first season the practice is put to use on a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrigationPractice {
    pub name: String,
    /// Application efficiency, fraction of gross water reaching the root
    /// zone, in (0, 1].
    pub efficiency: f64,
    pub capital_cost_per_ha: f64,
    /// Annual maintenance as a fraction of capital cost.
    pub maintenance_rate: f64,
    pub discount_rate: f64,
    pub lifespan_years: f64,
    /// Largest area this technology can service, hectares.
    pub max_area_ha: f64,
    #[serde(default)]
    pub implemented: bool,
}

impl IrrigationPractice {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.efficiency > 0.0 && self.efficiency <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "irrigation practice '{}' efficiency {} outside (0, 1]",
                self.name, self.efficiency
            )));
        }
        if self.lifespan_years <= 0.0 || self.max_area_ha < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "irrigation practice '{}' has invalid lifespan or max area",
                self.name
            )));
        }
        Ok(())
    }

    /// Annualised capital plus maintenance, per hectare.
    pub fn annual_cost_per_ha(&self) -> f64 {
        annualised_cost(self.capital_cost_per_ha, self.discount_rate, self.lifespan_years)
            + self.maintenance_rate * self.capital_cost_per_ha
    }

    /// Gross water needed to deliver `net_ml` to the crop.
    pub fn gross_water_ml(&self, net_ml: f64) -> f64 {
        net_ml / self.efficiency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drip() -> IrrigationPractice {
        IrrigationPractice {
            name: "drip".into(),
            efficiency: 0.9,
            capital_cost_per_ha: 4_000.0,
            maintenance_rate: 0.02,
            discount_rate: 0.07,
            lifespan_years: 15.0,
            max_area_ha: 100.0,
            implemented: false,
        }
    }

    #[test]
    fn annual_cost_includes_maintenance() {
        let practice = drip();
        let annuity = annualised_cost(4_000.0, 0.07, 15.0);
        assert!((practice.annual_cost_per_ha() - (annuity + 80.0)).abs() < 1e-9);
    }

    #[test]
    fn gross_water_scales_by_efficiency() {
        assert!((drip().gross_water_ml(9.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn efficiency_bounds_enforced() {
        let mut practice = drip();
        practice.efficiency = 0.0;
        assert!(practice.validate().is_err());
        practice.efficiency = 1.2;
        assert!(practice.validate().is_err());
    }
}
