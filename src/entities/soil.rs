use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Soil water-holding parameters. Total available water is expressed per
/// metre of root depth; the field scales it by the crop stage's effective
/// root zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Soil {
    pub name: String,
    /// Water held between field capacity and wilting point, mm per metre
    /// of root depth.
    pub taw_mm_per_m: f64,
}

impl Soil {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.taw_mm_per_m.is_finite() || self.taw_mm_per_m <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "soil '{}' must have positive available water, got {}",
                self.name, self.taw_mm_per_m
            )));
        }
        Ok(())
    }
}
