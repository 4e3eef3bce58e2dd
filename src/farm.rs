//! The farm aggregate: entity collections plus the managed fields.
//! Fields are kept in configuration order; every iteration over them is
//! in that stable order.

use crate::entities::{Crop, IrrigationPractice, WaterSource, WaterStorage};
use crate::error::ConfigError;
use crate::field::Field;

#[derive(Debug, Clone, Default)]
pub struct Farm {
    pub fields: Vec<Field>,
    pub water_sources: Vec<WaterSource>,
    pub storages: Vec<WaterStorage>,
    pub irrigation_practices: Vec<IrrigationPractice>,
    pub crops: Vec<Crop>,
}

impl Farm {
    /// Cross-checks the whole configuration. Must pass before the first
    /// simulation step; any failure here is fatal at setup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fields.is_empty() {
            return Err(ConfigError::Invalid("farm has no fields".into()));
        }
        if self.water_sources.is_empty() {
            return Err(ConfigError::Invalid("farm has no water sources".into()));
        }
        for source in &self.water_sources {
            source.validate()?;
        }
        for storage in &self.storages {
            storage.validate()?;
            if self.source(&storage.source).is_none() {
                return Err(ConfigError::UnknownReference {
                    kind: "water source",
                    name: storage.source.clone(),
                });
            }
        }
        for practice in &self.irrigation_practices {
            practice.validate()?;
        }
        for crop in &self.crops {
            crop.validate()?;
        }
        for field in &self.fields {
            if !field.area_ha.is_finite() || field.area_ha <= 0.0 {
                return Err(ConfigError::ZeroArea {
                    field: field.name.clone(),
                    area_ha: field.area_ha,
                });
            }
            if self.source(&field.storage.source).is_none() {
                return Err(ConfigError::UnknownReference {
                    kind: "water source",
                    name: field.storage.source.clone(),
                });
            }
        }
        let mut names: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.fields.len() {
            return Err(ConfigError::Invalid("duplicate field names".into()));
        }
        Ok(())
    }

    pub fn source(&self, name: &str) -> Option<&WaterSource> {
        self.water_sources.iter().find(|s| s.name == name)
    }

    pub fn source_mut(&mut self, name: &str) -> Option<&mut WaterSource> {
        self.water_sources.iter_mut().find(|s| s.name == name)
    }

    /// Refreshes every source's seasonal pool to its entitlement.
    /// Called exactly once per season, at opening.
    pub fn reset_entitlements(&mut self) {
        for source in &mut self.water_sources {
            source.reset_season();
        }
    }

    pub fn total_area_ha(&self) -> f64 {
        self.fields.iter().map(|f| f.area_ha).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Soil, WaterSource};

    fn minimal_farm() -> Farm {
        let soil = Soil {
            name: "loam".into(),
            taw_mm_per_m: 140.0,
        };
        let storage = WaterStorage {
            name: "dam".into(),
            capacity_ml: 100.0,
            cost_per_ml: 700.0,
            maintenance_rate: 0.01,
            discount_rate: 0.07,
            lifespan_years: 25.0,
            source: "river".into(),
        };
        let practice = IrrigationPractice {
            name: "flood".into(),
            efficiency: 0.6,
            capital_cost_per_ha: 1_000.0,
            maintenance_rate: 0.02,
            discount_rate: 0.07,
            lifespan_years: 20.0,
            max_area_ha: 200.0,
            implemented: true,
        };
        let field = Field::new("home", 25.0, soil, storage.clone(), practice.clone()).unwrap();
        Farm {
            fields: vec![field],
            water_sources: vec![WaterSource::new_for_tests("river", 120.0)],
            storages: vec![storage],
            irrigation_practices: vec![practice],
            crops: vec![],
        }
    }

    #[test]
    fn valid_farm_passes() {
        assert!(minimal_farm().validate().is_ok());
    }

    #[test]
    fn dangling_storage_source_rejected() {
        let mut farm = minimal_farm();
        farm.storages[0].source = "ghost".into();
        farm.fields[0].storage.source = "ghost".into();
        assert!(matches!(
            farm.validate(),
            Err(ConfigError::UnknownReference { .. })
        ));
    }

    #[test]
    fn entitlement_reset_touches_every_source() {
        let mut farm = minimal_farm();
        farm.water_sources[0].available_ml = 0.0;
        farm.reset_entitlements();
        assert_eq!(farm.water_sources[0].available_ml, 120.0);
    }
}
