//! The season scheduler: drives the fixed-step time loop, opens a season
//! when a planting window arrives (re-running the optimiser), steps the
//! soil water balance on every planted field, detects harvest, and
//! closes the season once every participating field is done.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tracing::{debug, info};

use crate::climate::ClimateSeries;
use crate::entities::annualised_cost;
use crate::error::{ConfigError, SimError};
use crate::farm::Farm;
use crate::field::SourceAllocation;
use crate::optimiser::{LpSolver, Plan, Planner};
use crate::report::{FieldStepRecord, ReportWriter, SeasonSummary};

#[derive(Debug, Clone, Deserialize)]
pub struct ManagerSettings {
    /// Simulation step, days.
    #[serde(default = "default_step_days")]
    pub step_days: u32,
    /// Summer month range for the soil-moisture carryover estimate; may
    /// wrap the year end (December through February by default).
    #[serde(default = "default_summer_start")]
    pub summer_start_month: u32,
    #[serde(default = "default_summer_end")]
    pub summer_end_month: u32,
    /// Share of summer rainfall assumed stored in the profile at
    /// planting (adapted French-Schultz).
    #[serde(default = "default_carryover")]
    pub carryover_fraction: f64,
    /// Share of gross rainfall effective in the root zone.
    #[serde(default = "default_effective_rain")]
    pub effective_rain_fraction: f64,
    /// Whether freed water's market value joins the margin (unresolved
    /// product question; both readings are configurable).
    #[serde(default)]
    pub credit_saved_water: bool,
}

fn default_step_days() -> u32 {
    14
}

fn default_summer_start() -> u32 {
    12
}

fn default_summer_end() -> u32 {
    2
}

fn default_carryover() -> f64 {
    0.25
}

fn default_effective_rain() -> f64 {
    0.8
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            step_days: default_step_days(),
            summer_start_month: default_summer_start(),
            summer_end_month: default_summer_end(),
            carryover_fraction: default_carryover(),
            effective_rain_fraction: default_effective_rain(),
            credit_saved_water: false,
        }
    }
}

impl ManagerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_days == 0 {
            return Err(ConfigError::Invalid("step_days must be positive".into()));
        }
        for month in [self.summer_start_month, self.summer_end_month] {
            if !(1..=12).contains(&month) {
                return Err(ConfigError::Invalid(format!("invalid summer month {month}")));
            }
        }
        for (name, value) in [
            ("carryover_fraction", self.carryover_fraction),
            ("effective_rain_fraction", self.effective_rain_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} {value} outside [0, 1]")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPhase {
    Fallow,
    Planted,
    Harvested,
}

/// What one simulation step produced.
#[derive(Debug)]
pub struct StepOutcome {
    pub date: NaiveDate,
    pub records: Vec<FieldStepRecord>,
    pub season_closed: Option<SeasonSummary>,
}

/// Accounting for the currently open season.
struct SeasonLedger {
    season: u32,
    opened: NaiveDate,
    profit: f64,
    capital_invested: f64,
    capital_annuity: f64,
    pumping: BTreeMap<String, f64>,
    applied_ml: f64,
    participants: Vec<usize>,
    steps: Vec<FieldStepRecord>,
}

pub struct FarmManager {
    farm: Farm,
    climate: ClimateSeries,
    planner: Planner,
    settings: ManagerSettings,
    writer: ReportWriter,
    phases: Vec<FieldPhase>,
    date: NaiveDate,
    season: u32,
    ledger: Option<SeasonLedger>,
    summaries: Vec<SeasonSummary>,
}

impl FarmManager {
    pub fn new(
        farm: Farm,
        climate: ClimateSeries,
        solver: Box<dyn LpSolver>,
        settings: ManagerSettings,
        start: NaiveDate,
        writer: ReportWriter,
    ) -> Result<Self, ConfigError> {
        farm.validate()?;
        settings.validate()?;
        let phases = vec![FieldPhase::Fallow; farm.fields.len()];
        let planner = Planner::new(solver, settings.credit_saved_water);
        Ok(Self {
            farm,
            climate,
            planner,
            settings,
            writer,
            phases,
            date: start,
            season: 0,
            ledger: None,
            summaries: Vec::new(),
        })
    }

    pub fn farm(&self) -> &Farm {
        &self.farm
    }

    pub fn current_date(&self) -> NaiveDate {
        self.date
    }

    pub fn season(&self) -> u32 {
        self.season
    }

    pub fn season_open(&self) -> bool {
        self.ledger.is_some()
    }

    pub fn phases(&self) -> &[FieldPhase] {
        &self.phases
    }

    pub fn summaries(&self) -> &[SeasonSummary] {
        &self.summaries
    }

    /// Runs `steps` fixed-size steps from the current date.
    pub fn run(&mut self, steps: usize) -> Result<(), SimError> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Advances the simulation by one step.
    pub fn step(&mut self) -> Result<StepOutcome, SimError> {
        let date = self.date;

        if self.ledger.is_none() && self.planting_window_open(date) {
            self.open_season(date)?;
        }

        let mut records = Vec::new();
        for idx in 0..self.farm.fields.len() {
            if self.phases[idx] != FieldPhase::Planted {
                continue;
            }
            let ready = {
                let crop = self.farm.fields[idx]
                    .crop
                    .as_ref()
                    .expect("planted field has a crop");
                crop.harvest_ready(date)
            };
            if ready {
                self.harvest_field(idx, date);
            } else if let Some(record) = self.step_field(idx, date) {
                records.push(record);
            }
        }
        if let Some(ledger) = &mut self.ledger {
            ledger.steps.extend(records.iter().cloned());
        }

        let season_closed = self.maybe_close_season(date)?;
        self.date = date + Duration::days(self.settings.step_days as i64);
        Ok(StepOutcome {
            date,
            records,
            season_closed,
        })
    }

    fn planting_window_open(&self, date: NaiveDate) -> bool {
        self.farm
            .crops
            .iter()
            .any(|crop| crop.in_planting_window(date, self.settings.step_days))
    }

    /// Opens a season: entitlements refresh, the optimiser sizes every
    /// field's allocation, crops are planted and the starting deficit is
    /// estimated from stored summer moisture. Refuses to replan while a
    /// season is already open.
    pub fn open_season(&mut self, date: NaiveDate) -> Result<(), SimError> {
        if self.ledger.is_some() {
            return Err(SimError::SeasonAlreadyOpen {
                season: self.season,
            });
        }

        self.farm.reset_entitlements();
        let plan = self
            .planner
            .plan(&self.farm, date, self.settings.step_days)?;
        if plan.fields.is_empty() {
            info!(date = %date, "optimiser allocated no area; season not opened");
            return Ok(());
        }

        let summer_rain_mm = self.climate.summer_rainfall(
            date,
            self.settings.summer_start_month,
            self.settings.summer_end_month,
        );
        let stored_mm = self.settings.carryover_fraction * summer_rain_mm;

        let mut ledger = SeasonLedger {
            season: self.season,
            opened: date,
            profit: plan.profit,
            capital_invested: 0.0,
            capital_annuity: 0.0,
            pumping: BTreeMap::new(),
            applied_ml: 0.0,
            participants: Vec::new(),
            steps: Vec::new(),
        };
        self.apply_plan(&plan, date, stored_mm, &mut ledger);
        info!(
            season = ledger.season,
            date = %date,
            profit = ledger.profit,
            fields = ledger.participants.len(),
            summer_rain_mm,
            "season opened"
        );
        self.ledger = Some(ledger);
        Ok(())
    }

    fn apply_plan(&mut self, plan: &Plan, date: NaiveDate, stored_mm: f64, ledger: &mut SeasonLedger) {
        for field_plan in &plan.fields {
            let combination = field_plan.combination;
            let mut crop = self.farm.crops[combination.crop].clone();
            let storage = self.farm.storages[combination.storage].clone();
            let practice = &mut self.farm.irrigation_practices[combination.irrigation];

            let allocated = field_plan.allocated_area_ha();
            if !practice.implemented {
                let capital = practice.capital_cost_per_ha * allocated;
                ledger.capital_invested += capital;
                ledger.capital_annuity +=
                    annualised_cost(capital, practice.discount_rate, practice.lifespan_years);
                practice.implemented = true;
            }
            let practice = practice.clone();

            crop.plant(date);
            let initial_stage = crop.stage_at(date).clone();

            let allocations = field_plan
                .allocations
                .iter()
                .map(|&(source_idx, area_ha)| SourceAllocation {
                    source: self.farm.water_sources[source_idx].name.clone(),
                    area_ha,
                })
                .collect();

            let field = &mut self.farm.fields[field_plan.field];
            field.crop = Some(crop);
            field.storage = storage;
            field.irrigation = practice;
            field.allocations = allocations;

            let taw = field.total_available_water_mm(&initial_stage);
            field.deficit_mm = (stored_mm.min(taw) - taw).min(0.0);

            self.phases[field_plan.field] = FieldPhase::Planted;
            ledger.participants.push(field_plan.field);
            debug!(
                field = %field.name,
                area = field.allocated_area_ha(),
                deficit = field.deficit_mm,
                "field planted"
            );
        }
    }

    /// One water-balance step on a planted field.
    fn step_field(&mut self, idx: usize, date: NaiveDate) -> Option<FieldStepRecord> {
        let end = date + Duration::days(self.settings.step_days as i64);
        let (stage, crop_name) = {
            let field = &self.farm.fields[idx];
            let crop = field.crop.as_ref()?;
            (crop.stage_at(date).clone(), crop.name.clone())
        };

        let eto_mm = self.climate.eto_between(date, end);
        let etc_mm = eto_mm * stage.kc;
        let rain_mm = self.climate.rainfall_between(date, end);
        let effective_rain_mm = rain_mm * self.settings.effective_rain_fraction;

        let field = &mut self.farm.fields[idx];
        let taw_mm = field.total_available_water_mm(&stage);
        let nid_mm = field.net_irrigation_depth_mm(&stage);
        let depth_mm = field.irrigation_depth_mm(nid_mm);
        let applied_net_ml = depth_mm * field.area_ha / 100.0;
        let applied_gross_ml = field.gross_application_ml(depth_mm);
        let rain_ml = effective_rain_mm * field.area_ha / 100.0;

        let balance = field.update_deficit(etc_mm, rain_ml, applied_net_ml, taw_mm);

        // Pumping cost, split by each source's share of the allocation.
        let mut pumping_cost = 0.0;
        let shares: Vec<(String, f64)> = field
            .allocations
            .iter()
            .map(|a| (a.source.clone(), field.allocation_share(&a.source)))
            .collect();
        let field_name = field.name.clone();
        for (source_name, share) in shares {
            if let Some(source) = self.farm.source(&source_name) {
                let cost = applied_gross_ml * share * source.pumping_cost_per_ml();
                pumping_cost += cost;
                if let Some(ledger) = &mut self.ledger {
                    *ledger.pumping.entry(source_name).or_insert(0.0) += cost;
                }
            }
        }
        if let Some(ledger) = &mut self.ledger {
            ledger.applied_ml += applied_gross_ml;
        }

        let record = FieldStepRecord {
            date,
            field: field_name,
            crop: crop_name,
            etc_mm,
            effective_rain_mm,
            applied_mm: balance.applied_mm,
            applied_gross_ml,
            deficit_before_mm: balance.deficit_before_mm,
            deficit_after_mm: balance.deficit_after_mm,
            seepage_mm: balance.seepage_mm,
            pumping_cost,
        };
        debug!(
            field = %record.field,
            date = %record.date,
            etc = record.etc_mm,
            applied = record.applied_mm,
            deficit = record.deficit_after_mm,
            seepage = record.seepage_mm,
            "water balance step"
        );
        Some(record)
    }

    fn harvest_field(&mut self, idx: usize, date: NaiveDate) {
        let field = &mut self.farm.fields[idx];
        if let Some(crop) = field.crop.as_mut() {
            info!(field = %field.name, crop = %crop.name, date = %date, "harvested");
            crop.harvest();
        }
        field.crop = None;
        field.allocations.clear();
        self.phases[idx] = FieldPhase::Harvested;
    }

    /// Closes the season once every participating field has harvested.
    fn maybe_close_season(&mut self, date: NaiveDate) -> Result<Option<SeasonSummary>, SimError> {
        let done = match &self.ledger {
            Some(ledger) => {
                !ledger.participants.is_empty()
                    && ledger
                        .participants
                        .iter()
                        .all(|&idx| self.phases[idx] == FieldPhase::Harvested)
            }
            None => false,
        };
        if !done {
            return Ok(None);
        }

        let ledger = self.ledger.take().expect("season is open");
        let summary = SeasonSummary {
            season: ledger.season,
            opened: ledger.opened,
            closed: date,
            profit: ledger.profit,
            capital_invested: ledger.capital_invested,
            capital_annuity: ledger.capital_annuity,
            pumping_cost_by_source: ledger.pumping,
            total_applied_ml: ledger.applied_ml,
            harvested_fields: ledger
                .participants
                .iter()
                .map(|&idx| self.farm.fields[idx].name.clone())
                .collect(),
        };
        self.writer.write_summary(&summary)?;
        self.writer.write_steps(summary.season, &ledger.steps)?;

        for &idx in &ledger.participants {
            self.phases[idx] = FieldPhase::Fallow;
        }
        self.season += 1;
        self.planner.invalidate_cache();
        info!(
            season = summary.season,
            date = %date,
            profit = summary.profit,
            pumping = summary.total_pumping_cost(),
            "season closed"
        );
        self.summaries.push(summary.clone());
        Ok(Some(summary))
    }
}
