//! Per-field state: cultivated area, soil, the current assignment of
//! crop/storage/irrigation, and the running soil-water-deficit counter.

use serde::{Deserialize, Serialize};

use crate::entities::{Crop, GrowthStage, IrrigationPractice, Soil, WaterStorage};
use crate::error::ConfigError;

/// Area irrigated from one water source, as decided by the optimiser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAllocation {
    pub source: String,
    pub area_ha: f64,
}

/// Outcome of one water-balance update, reported for logging.
#[derive(Debug, Clone, Copy)]
pub struct WaterBalance {
    pub deficit_before_mm: f64,
    pub deficit_after_mm: f64,
    pub rain_mm: f64,
    pub applied_mm: f64,
    /// Water pushed past field capacity, lost to recharge.
    pub seepage_mm: f64,
}

/// Readily available water: the depletion-fraction-scaled share of total
/// available water. Exact and monotonic in both arguments.
pub fn readily_available_water(taw_mm: f64, depletion: f64) -> f64 {
    taw_mm * depletion
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub area_ha: f64,
    pub soil: Soil,
    pub storage: WaterStorage,
    pub irrigation: IrrigationPractice,
    pub crop: Option<Crop>,
    pub allocations: Vec<SourceAllocation>,
    /// Soil water deficit relative to field capacity, mm. Always within
    /// [-TAW, 0] after an update.
    pub deficit_mm: f64,
}

impl Field {
    pub fn new(
        name: impl Into<String>,
        area_ha: f64,
        soil: Soil,
        storage: WaterStorage,
        irrigation: IrrigationPractice,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if !area_ha.is_finite() || area_ha <= 0.0 {
            return Err(ConfigError::ZeroArea {
                field: name,
                area_ha,
            });
        }
        soil.validate()?;
        storage.validate()?;
        irrigation.validate()?;
        Ok(Self {
            name,
            area_ha,
            soil,
            storage,
            irrigation,
            crop: None,
            allocations: Vec::new(),
            deficit_mm: 0.0,
        })
    }

    /// Total available water for the given growth stage, mm.
    pub fn total_available_water_mm(&self, stage: &GrowthStage) -> f64 {
        self.soil.taw_mm_per_m * stage.root_depth_m
    }

    /// Net irrigation depth for the stage: the readily available water
    /// over the stage's effective root zone.
    pub fn net_irrigation_depth_mm(&self, stage: &GrowthStage) -> f64 {
        readily_available_water(self.total_available_water_mm(stage), stage.depletion)
    }

    /// Depth to apply this step: whole multiples of the net irrigation
    /// depth until the deficit would be wiped. A non-negative deficit
    /// sends no water.
    pub fn irrigation_depth_mm(&self, net_irrigation_depth_mm: f64) -> f64 {
        if net_irrigation_depth_mm <= 0.0 {
            return 0.0;
        }
        let mut candidate = 0.0;
        while self.deficit_mm + candidate < 0.0 {
            candidate += net_irrigation_depth_mm;
        }
        candidate
    }

    /// Converts an applied depth to the gross volume to send, accounting
    /// for delivery losses.
    pub fn gross_application_ml(&self, depth_mm: f64) -> f64 {
        self.irrigation.gross_water_ml(depth_mm * self.area_ha / 100.0)
    }

    /// Runs the deficit update for one step. `rain_ml` and `applied_ml`
    /// are net volumes reaching the root zone over the whole field.
    ///
    /// Water in excess of zero deficit becomes seepage above the TAW
    /// threshold and is reported, not retained; the deficit is clamped
    /// into [-taw_mm, 0].
    pub fn update_deficit(&mut self, etc_mm: f64, rain_ml: f64, applied_ml: f64, taw_mm: f64) -> WaterBalance {
        assert!(
            applied_ml >= 0.0 && rain_ml >= 0.0,
            "negative water input on field '{}'",
            self.name
        );
        let rain_mm = rain_ml / self.area_ha * 100.0;
        let applied_mm = applied_ml / self.area_ha * 100.0;
        let before = self.deficit_mm;

        let mut deficit = before - etc_mm + rain_mm + applied_mm;
        let seepage_mm = if deficit > 0.0 {
            let excess = (deficit - taw_mm).max(0.0);
            deficit = 0.0;
            excess
        } else {
            0.0
        };
        deficit = deficit.max(-taw_mm);
        self.deficit_mm = deficit;

        WaterBalance {
            deficit_before_mm: before,
            deficit_after_mm: deficit,
            rain_mm,
            applied_mm,
            seepage_mm,
        }
    }

    /// Total area currently irrigated across all sources.
    pub fn allocated_area_ha(&self) -> f64 {
        self.allocations.iter().map(|a| a.area_ha).sum()
    }

    /// Share of the field's allocation drawn from `source`.
    pub fn allocation_share(&self, source: &str) -> f64 {
        let total = self.allocated_area_ha();
        if total <= 0.0 {
            return 0.0;
        }
        self.allocations
            .iter()
            .filter(|a| a.source == source)
            .map(|a| a.area_ha)
            .sum::<f64>()
            / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_field(area_ha: f64) -> Field {
        Field::new(
            "north",
            area_ha,
            Soil {
                name: "clay loam".into(),
                taw_mm_per_m: 160.0,
            },
            WaterStorage {
                name: "dam".into(),
                capacity_ml: 200.0,
                cost_per_ml: 800.0,
                maintenance_rate: 0.01,
                discount_rate: 0.07,
                lifespan_years: 30.0,
                source: "river".into(),
            },
            IrrigationPractice {
                name: "sprinkler".into(),
                efficiency: 0.8,
                capital_cost_per_ha: 2_500.0,
                maintenance_rate: 0.02,
                discount_rate: 0.07,
                lifespan_years: 15.0,
                max_area_ha: 50.0,
                implemented: true,
            },
        )
        .unwrap()
    }

    #[test]
    fn raw_is_exact_product() {
        assert_eq!(readily_available_water(120.0, 0.5), 60.0);
        assert_eq!(readily_available_water(0.0, 0.9), 0.0);
        assert_eq!(readily_available_water(80.0, 1.0), 80.0);
    }

    #[test]
    fn zero_area_rejected_at_setup() {
        let field = test_field(10.0);
        let err = Field::new("bad", 0.0, field.soil.clone(), field.storage.clone(), field.irrigation.clone());
        assert!(matches!(err, Err(ConfigError::ZeroArea { .. })));
    }

    #[test]
    fn one_nid_multiple_clears_moderate_deficit() {
        // 10 ha, NID 20 mm, deficit -15 mm, no rain.
        let mut field = test_field(10.0);
        field.deficit_mm = -15.0;
        let depth = field.irrigation_depth_mm(20.0);
        assert_eq!(depth, 20.0);

        let applied_ml = depth * field.area_ha / 100.0;
        let taw = 40.0;
        let balance = field.update_deficit(0.0, 0.0, applied_ml, taw);
        assert_eq!(balance.applied_mm, 20.0);
        assert_eq!(balance.deficit_after_mm, 0.0);
        // Surplus of 5 mm is below the 40 mm TAW threshold: no seepage.
        assert_eq!(balance.seepage_mm, (5.0f64 - taw).max(0.0));
    }

    #[test]
    fn deep_deficit_takes_several_multiples() {
        let mut field = test_field(10.0);
        field.deficit_mm = -45.0;
        assert_eq!(field.irrigation_depth_mm(20.0), 60.0);
    }

    #[test]
    fn non_negative_deficit_sends_no_water() {
        let mut field = test_field(10.0);
        field.deficit_mm = 0.0;
        assert_eq!(field.irrigation_depth_mm(20.0), 0.0);
    }

    #[test]
    fn deficit_clamps_to_negative_taw() {
        let mut field = test_field(10.0);
        let balance = field.update_deficit(500.0, 0.0, 0.0, 120.0);
        assert_eq!(balance.deficit_after_mm, -120.0);
        assert_eq!(balance.seepage_mm, 0.0);
    }

    #[test]
    fn gross_application_accounts_for_losses() {
        let field = test_field(10.0);
        // 20 mm over 10 ha = 2 ML net, / 0.8 efficiency = 2.5 ML gross.
        assert!((field.gross_application_ml(20.0) - 2.5).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "negative water input")]
    fn negative_applied_water_asserts() {
        let mut field = test_field(10.0);
        field.update_deficit(0.0, 0.0, -1.0, 100.0);
    }

    #[test]
    fn allocation_share_sums_by_source() {
        let mut field = test_field(10.0);
        field.allocations = vec![
            SourceAllocation {
                source: "river".into(),
                area_ha: 6.0,
            },
            SourceAllocation {
                source: "bore".into(),
                area_ha: 2.0,
            },
        ];
        assert!((field.allocation_share("river") - 0.75).abs() < 1e-9);
        assert!((field.allocation_share("bore") - 0.25).abs() < 1e-9);
    }
}
