use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One entry of a crop's growth-stage schedule. `days` is the cumulative
/// offset from planting at which the stage ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthStage {
    pub name: String,
    pub days: u32,
    /// Crop coefficient (kc) scaling reference evapotranspiration.
    pub kc: f64,
    /// Fraction of total available water the crop can deplete before
    /// stress, in [0, 1].
    pub depletion: f64,
    /// Effective root zone depth during this stage, metres.
    pub root_depth_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crop {
    pub name: String,
    pub price_per_tonne: f64,
    pub yield_t_per_ha: f64,
    pub variable_cost_per_ha: f64,
    /// Estimated net water applied over a season, ML per hectare.
    pub water_applied_ml_per_ha: f64,
    /// Month and day the planting window opens each year.
    pub season_start_month: u32,
    pub season_start_day: u32,
    pub stages: Vec<GrowthStage>,
    #[serde(default, skip_serializing)]
    pub planted: bool,
    #[serde(default, skip_serializing)]
    pub plant_date: Option<NaiveDate>,
}

impl Crop {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "crop '{}' has no growth stages",
                self.name
            )));
        }
        let mut previous = 0u32;
        for stage in &self.stages {
            if stage.days <= previous && previous != 0 {
                return Err(ConfigError::Invalid(format!(
                    "crop '{}': stage '{}' offset {} does not increase",
                    self.name, stage.name, stage.days
                )));
            }
            if !(0.0..=1.0).contains(&stage.depletion) {
                return Err(ConfigError::Invalid(format!(
                    "crop '{}': stage '{}' depletion {} outside [0, 1]",
                    self.name, stage.name, stage.depletion
                )));
            }
            if stage.root_depth_m <= 0.0 || stage.kc < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "crop '{}': stage '{}' has invalid kc/root depth",
                    self.name, stage.name
                )));
            }
            previous = stage.days;
        }
        if NaiveDate::from_ymd_opt(2001, self.season_start_month, self.season_start_day).is_none() {
            return Err(ConfigError::Invalid(format!(
                "crop '{}': season start {}-{} is not a valid date",
                self.name, self.season_start_month, self.season_start_day
            )));
        }
        Ok(())
    }

    /// Revenue minus variable production cost, per hectare.
    pub fn gross_margin_per_ha(&self) -> f64 {
        self.price_per_tonne * self.yield_t_per_ha - self.variable_cost_per_ha
    }

    /// Cumulative day offset at which the crop is harvestable.
    pub fn harvest_offset_days(&self) -> u32 {
        self.stages.last().map(|s| s.days).unwrap_or(0)
    }

    /// True when `date` falls in the planting window opening at the
    /// season start and spanning one scheduler step.
    pub fn in_planting_window(&self, date: NaiveDate, step_days: u32) -> bool {
        let start = match NaiveDate::from_ymd_opt(
            date.year(),
            self.season_start_month,
            self.season_start_day,
        ) {
            Some(start) => start,
            None => return false,
        };
        let elapsed = (date - start).num_days();
        elapsed >= 0 && elapsed < step_days as i64
    }

    pub fn plant(&mut self, date: NaiveDate) {
        self.planted = true;
        self.plant_date = Some(date);
    }

    pub fn harvest(&mut self) {
        self.planted = false;
        self.plant_date = None;
    }

    fn elapsed_days(&self, date: NaiveDate) -> i64 {
        assert!(self.planted, "crop '{}' queried before planting", self.name);
        let planted = self
            .plant_date
            .unwrap_or_else(|| panic!("crop '{}' has no plant date", self.name));
        (date - planted).num_days()
    }

    /// Growth stage active at `date`: the first stage whose cumulative
    /// offset covers the elapsed days. Past the final offset the last
    /// stage is returned (post-maturity plateau, by policy).
    ///
    /// Panics if the crop is not planted; querying an unplanted crop is
    /// a logic error, not a recoverable condition.
    pub fn stage_at(&self, date: NaiveDate) -> &GrowthStage {
        let elapsed = self.elapsed_days(date);
        self.stages
            .iter()
            .find(|stage| stage.days as i64 >= elapsed)
            .unwrap_or_else(|| self.stages.last().expect("stages validated non-empty"))
    }

    /// True iff the elapsed days reach the harvest stage's cumulative
    /// offset. Panics if the crop is not planted.
    pub fn harvest_ready(&self, date: NaiveDate) -> bool {
        self.elapsed_days(date) >= self.harvest_offset_days() as i64
    }

    /// Days from planting until harvest, useful for sizing a season.
    pub fn season_length(&self) -> Duration {
        Duration::days(self.harvest_offset_days() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wheat() -> Crop {
        Crop {
            name: "wheat".into(),
            price_per_tonne: 320.0,
            yield_t_per_ha: 5.5,
            variable_cost_per_ha: 450.0,
            water_applied_ml_per_ha: 3.0,
            season_start_month: 5,
            season_start_day: 15,
            stages: vec![
                GrowthStage {
                    name: "establishment".into(),
                    days: 30,
                    kc: 0.4,
                    depletion: 0.5,
                    root_depth_m: 0.3,
                },
                GrowthStage {
                    name: "development".into(),
                    days: 90,
                    kc: 0.9,
                    depletion: 0.55,
                    root_depth_m: 0.8,
                },
                GrowthStage {
                    name: "maturity".into(),
                    days: 160,
                    kc: 0.5,
                    depletion: 0.8,
                    root_depth_m: 1.0,
                },
            ],
            planted: false,
            plant_date: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn stage_lookup_selects_first_covering_offset() {
        let mut crop = wheat();
        crop.plant(date(2020, 5, 15));
        assert_eq!(crop.stage_at(date(2020, 5, 20)).name, "establishment");
        assert_eq!(crop.stage_at(date(2020, 6, 14)).name, "establishment");
        assert_eq!(crop.stage_at(date(2020, 6, 16)).name, "development");
    }

    #[test]
    fn past_maturity_returns_last_stage() {
        let mut crop = wheat();
        crop.plant(date(2020, 5, 15));
        assert_eq!(crop.stage_at(date(2021, 3, 1)).name, "maturity");
    }

    #[test]
    fn harvest_exactly_at_offset() {
        let mut crop = wheat();
        crop.plant(date(2020, 5, 15));
        let harvest = date(2020, 5, 15) + Duration::days(160);
        assert!(!crop.harvest_ready(harvest - Duration::days(1)));
        assert!(crop.harvest_ready(harvest));
        assert!(crop.harvest_ready(harvest + Duration::days(1)));
    }

    #[test]
    #[should_panic(expected = "queried before planting")]
    fn unplanted_stage_query_panics() {
        let crop = wheat();
        crop.stage_at(date(2020, 5, 15));
    }

    #[test]
    fn planting_window_spans_one_step() {
        let crop = wheat();
        assert!(crop.in_planting_window(date(2020, 5, 15), 14));
        assert!(crop.in_planting_window(date(2020, 5, 28), 14));
        assert!(!crop.in_planting_window(date(2020, 5, 29), 14));
        assert!(!crop.in_planting_window(date(2020, 5, 14), 14));
    }

    #[test]
    fn gross_margin_is_revenue_minus_variable_cost() {
        let crop = wheat();
        assert!((crop.gross_margin_per_ha() - (320.0 * 5.5 - 450.0)).abs() < 1e-9);
    }

    #[test]
    fn non_increasing_stage_offsets_rejected() {
        let mut crop = wheat();
        crop.stages[1].days = 30;
        assert!(crop.validate().is_err());
    }
}
