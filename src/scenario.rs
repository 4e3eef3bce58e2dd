//! YAML scenario files: the whole farm configuration, the synthetic
//! climate parameters and the run settings, loaded relative to a base
//! directory and cross-validated before anything runs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tracing::warn;

use crate::climate::{ClimateGenerator, ClimateSeries};
use crate::entities::{Crop, IrrigationPractice, Soil, WaterSource, WaterStorage};
use crate::error::ConfigError;
use crate::farm::Farm;
use crate::field::Field;
use crate::manager::ManagerSettings;

fn default_years() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    pub start_date: NaiveDate,
    #[serde(default = "default_years")]
    pub years: u32,
    #[serde(default)]
    pub manager: ManagerSettings,
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
    pub climate: ClimateConfig,
    pub soils: Vec<Soil>,
    pub water_sources: Vec<WaterSource>,
    pub storages: Vec<WaterStorage>,
    pub irrigation_practices: Vec<IrrigationPractice>,
    pub crops: Vec<Crop>,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub overrides: Vec<ParameterOverride>,
}

/// Monthly climate means the synthetic generator expands into a daily
/// series.
#[derive(Debug, Clone, Deserialize)]
pub struct ClimateConfig {
    pub monthly_rainfall_mm: Vec<f64>,
    pub monthly_eto_mm: Vec<f64>,
}

/// A field referencing its soil, storage and installed irrigation system
/// by name.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    pub area_ha: f64,
    pub soil: String,
    pub storage: String,
    pub irrigation: String,
}

/// A bounded scalar override applied on top of the run settings. The
/// value must sit inside [min, max] or setup fails.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterOverride {
    pub name: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl ParameterOverride {
    fn checked_value(&self) -> Result<f64, ConfigError> {
        if self.min > self.max || self.value < self.min || self.value > self.max {
            return Err(ConfigError::InvalidBounds {
                name: self.name.clone(),
                min: self.min,
                max: self.max,
            });
        }
        Ok(self.value)
    }
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    /// End of the simulated horizon.
    pub fn end_date(&self) -> NaiveDate {
        self.start_date + Duration::days(self.years as i64 * 365)
    }

    /// Number of fixed-size steps covering the horizon.
    pub fn steps(&self, step_days: u32) -> usize {
        let step = step_days.max(1) as i64;
        ((self.end_date() - self.start_date).num_days() / step) as usize
    }

    /// Run settings with every override applied. Unknown override names
    /// are ignored with a warning; out-of-bounds values fail setup.
    pub fn manager_settings(&self) -> Result<ManagerSettings, ConfigError> {
        let mut settings = self.manager.clone();
        for over in &self.overrides {
            let value = over.checked_value()?;
            match over.name.as_str() {
                "step_days" => settings.step_days = value as u32,
                "carryover_fraction" => settings.carryover_fraction = value,
                "effective_rain_fraction" => settings.effective_rain_fraction = value,
                // Entity-level overrides are applied in build_farm.
                "pumping_cost_per_ml_per_m" => {}
                other => warn!(parameter = other, "ignoring unknown parameter override"),
            }
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Expands the monthly climate means into a seeded daily series
    /// spanning the full horizon plus the preceding year, so the first
    /// season's summer-rain lookback has data to read.
    pub fn build_climate(&self) -> Result<ClimateSeries, ConfigError> {
        for (name, values) in [
            ("monthly_rainfall_mm", &self.climate.monthly_rainfall_mm),
            ("monthly_eto_mm", &self.climate.monthly_eto_mm),
        ] {
            if values.len() != 12 {
                return Err(ConfigError::Invalid(format!(
                    "climate table '{name}' has {} entries, expected 12",
                    values.len()
                )));
            }
        }
        let mut monthly_rainfall_mm = [0.0; 12];
        monthly_rainfall_mm.copy_from_slice(&self.climate.monthly_rainfall_mm);
        let mut monthly_eto_mm = [0.0; 12];
        monthly_eto_mm.copy_from_slice(&self.climate.monthly_eto_mm);

        let generator = ClimateGenerator {
            monthly_rainfall_mm,
            monthly_eto_mm,
            seed: self.seed,
        };
        let start = self.start_date - Duration::days(365);
        // One extra year past the end so the last season can mature.
        let end = self.end_date() + Duration::days(365);
        Ok(generator.generate(start, end))
    }

    /// Resolves every by-name reference and assembles the validated farm.
    pub fn build_farm(&self) -> Result<Farm, ConfigError> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for config in &self.fields {
            let soil = self
                .soils
                .iter()
                .find(|s| s.name == config.soil)
                .ok_or_else(|| ConfigError::UnknownReference {
                    kind: "soil",
                    name: config.soil.clone(),
                })?;
            let storage = self
                .storages
                .iter()
                .find(|s| s.name == config.storage)
                .ok_or_else(|| ConfigError::UnknownReference {
                    kind: "water storage",
                    name: config.storage.clone(),
                })?;
            let irrigation = self
                .irrigation_practices
                .iter()
                .find(|p| p.name == config.irrigation)
                .ok_or_else(|| ConfigError::UnknownReference {
                    kind: "irrigation practice",
                    name: config.irrigation.clone(),
                })?;
            fields.push(Field::new(
                config.name.clone(),
                config.area_ha,
                soil.clone(),
                storage.clone(),
                irrigation.clone(),
            )?);
        }

        let mut farm = Farm {
            fields,
            water_sources: self.water_sources.clone(),
            storages: self.storages.clone(),
            irrigation_practices: self.irrigation_practices.clone(),
            crops: self.crops.clone(),
        };
        for over in &self.overrides {
            if over.name == "pumping_cost_per_ml_per_m" {
                let value = over.checked_value()?;
                for source in &mut farm.water_sources {
                    source.pumping_cost_per_ml_per_m = value;
                }
            }
        }
        farm.reset_entitlements();
        farm.validate()?;
        Ok(farm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name: minimal
seed: 42
start_date: 2020-05-01
climate:
  monthly_rainfall_mm: [30, 30, 40, 40, 50, 50, 50, 45, 40, 40, 35, 30]
  monthly_eto_mm: [210, 180, 150, 100, 70, 50, 55, 75, 105, 145, 175, 205]
soils:
  - name: loam
    taw_mm_per_m: 140.0
water_sources:
  - name: river
    entitlement_ml: 120.0
    cost_per_ml: 30.0
    pumping_head_m: 8.0
storages:
  - name: dam
    capacity_ml: 100.0
    cost_per_ml: 700.0
    maintenance_rate: 0.01
    discount_rate: 0.07
    lifespan_years: 25.0
    source: river
irrigation_practices:
  - name: flood
    efficiency: 0.6
    capital_cost_per_ha: 1000.0
    maintenance_rate: 0.02
    discount_rate: 0.07
    lifespan_years: 20.0
    max_area_ha: 200.0
    implemented: true
crops:
  - name: wheat
    price_per_tonne: 320.0
    yield_t_per_ha: 5.5
    variable_cost_per_ha: 450.0
    water_applied_ml_per_ha: 3.0
    season_start_month: 5
    season_start_day: 15
    stages:
      - { name: establishment, days: 30, kc: 0.4, depletion: 0.5, root_depth_m: 0.3 }
      - { name: maturity, days: 160, kc: 0.5, depletion: 0.8, root_depth_m: 1.0 }
fields:
  - name: home
    area_ha: 25.0
    soil: loam
    storage: dam
    irrigation: flood
"#;

    #[test]
    fn minimal_scenario_builds_a_valid_farm() {
        let scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        let farm = scenario.build_farm().unwrap();
        assert_eq!(farm.fields.len(), 1);
        assert_eq!(farm.fields[0].soil.name, "loam");
        assert_eq!(farm.water_sources[0].available_ml, 120.0);
        assert_eq!(scenario.manager_settings().unwrap().step_days, 14);
    }

    #[test]
    fn dangling_soil_reference_fails_setup() {
        let mut scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        scenario.fields[0].soil = "podzol".into();
        assert!(matches!(
            scenario.build_farm(),
            Err(ConfigError::UnknownReference { kind: "soil", .. })
        ));
    }

    #[test]
    fn out_of_bounds_override_fails_setup() {
        let mut scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        scenario.overrides.push(ParameterOverride {
            name: "carryover_fraction".into(),
            value: 1.4,
            min: 0.0,
            max: 1.0,
        });
        assert!(matches!(
            scenario.manager_settings(),
            Err(ConfigError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        scenario.overrides.push(ParameterOverride {
            name: "carryover_fraction".into(),
            value: 0.1,
            min: 0.0,
            max: 1.0,
        });
        let settings = scenario.manager_settings().unwrap();
        assert!((settings.carryover_fraction - 0.1).abs() < 1e-12);
    }

    #[test]
    fn entity_override_reaches_every_source() {
        let mut scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        scenario.overrides.push(ParameterOverride {
            name: "pumping_cost_per_ml_per_m".into(),
            value: 0.4,
            min: 0.0,
            max: 2.0,
        });
        let farm = scenario.build_farm().unwrap();
        assert!((farm.water_sources[0].pumping_cost_per_ml_per_m - 0.4).abs() < 1e-12);
    }

    #[test]
    fn climate_table_length_checked() {
        let mut scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        scenario.climate.monthly_eto_mm.pop();
        assert!(scenario.build_climate().is_err());
    }
}
