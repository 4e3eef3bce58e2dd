//! Translation of candidate combinations into a linear program whose
//! minimised objective is total negated farm profit.

use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use crate::farm::Farm;
use crate::optimiser::combinations::{CandidateSet, Combination};

/// One constraint row: coefficients aligned with the variable index.
#[derive(Debug, Clone)]
pub struct LpRow {
    pub coefficients: Vec<f64>,
    pub bound: f64,
    pub label: String,
}

/// A fully assembled problem: minimise `objective · x` subject to
/// `ub_rows` (≤), `eq_rows` (=) and per-variable bounds. Equality rows
/// exist only where applicable; they are never zero-filled.
#[derive(Debug, Clone, Default)]
pub struct LpProblem {
    pub objective: Vec<f64>,
    pub labels: Vec<String>,
    pub bounds: Vec<(f64, f64)>,
    pub ub_rows: Vec<LpRow>,
    pub eq_rows: Vec<LpRow>,
}

impl LpProblem {
    pub fn variable_count(&self) -> usize {
        self.objective.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objective.is_empty()
    }
}

impl fmt::Display for LpProblem {
    /// Renders the full coefficient/constraint state, used when a solve
    /// fails so the offending problem can be diagnosed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "minimise:")?;
        for (i, c) in self.objective.iter().enumerate() {
            let (lo, hi) = self.bounds[i];
            writeln!(f, "  {:<40} c = {c:>12.4}  x in [{lo:.3}, {hi:.3}]", self.labels[i])?;
        }
        for row in &self.ub_rows {
            writeln!(f, "subject to (<= {:.4}) {}: {:?}", row.bound, row.label, row.coefficients)?;
        }
        for row in &self.eq_rows {
            writeln!(f, "subject to (== {:.4}) {}: {:?}", row.bound, row.label, row.coefficients)?;
        }
        Ok(())
    }
}

/// Per-variable derived terms, cached across a season's planning cycle.
#[derive(Debug, Clone, Copy)]
pub struct VariableTerms {
    /// Objective coefficient: total cost minus total margin, per ha.
    pub objective: f64,
    /// Gross water drawn per allocated hectare, ML.
    pub gross_ml_per_ha: f64,
    /// Largest area this variable may take, ha.
    pub upper_bound: f64,
}

pub type CoefficientCache = HashMap<(Combination, usize), VariableTerms>;

pub struct CoefficientBuilder<'a> {
    farm: &'a Farm,
    credit_saved_water: bool,
}

impl<'a> CoefficientBuilder<'a> {
    pub fn new(farm: &'a Farm, credit_saved_water: bool) -> Self {
        Self {
            farm,
            credit_saved_water,
        }
    }

    /// Assembles the problem. Combinations with any non-finite
    /// coefficient are dropped before matrix assembly (never passed
    /// through as zero); the returned candidate set reflects what was
    /// kept and defines the variable ordering of the problem.
    pub fn build(
        &self,
        candidates: &CandidateSet,
        cache: &mut CoefficientCache,
    ) -> (LpProblem, CandidateSet) {
        let mut kept = Vec::new();
        let mut terms_by_combination: Vec<Vec<VariableTerms>> = Vec::new();
        for combination in &candidates.combinations {
            let terms: Vec<VariableTerms> = candidates
                .sources
                .iter()
                .map(|&s| self.terms(*combination, s, cache))
                .collect();
            let usable = terms
                .iter()
                .all(|t| t.objective.is_finite() && t.upper_bound.is_finite());
            if usable {
                kept.push(*combination);
                terms_by_combination.push(terms);
            } else {
                warn!(?combination, "dropping combination with undefined coefficients");
            }
        }

        let kept_set = CandidateSet {
            combinations: kept,
            sources: candidates.sources.clone(),
        };
        let n_vars = kept_set.variable_count();
        let mut problem = LpProblem {
            objective: vec![0.0; n_vars],
            labels: vec![String::new(); n_vars],
            bounds: vec![(0.0, 0.0); n_vars],
            ub_rows: Vec::new(),
            eq_rows: Vec::new(),
        };

        for (ci, combination) in kept_set.combinations.iter().enumerate() {
            let field = &self.farm.fields[combination.field];
            for (sp, &source_idx) in kept_set.sources.iter().enumerate() {
                let var = kept_set.variable(ci, sp);
                let terms = terms_by_combination[ci][sp];
                problem.objective[var] = terms.objective;
                problem.bounds[var] = (0.0, terms.upper_bound);
                problem.labels[var] = format!(
                    "{}/{}/{}/{}/{}",
                    field.name,
                    self.farm.crops[combination.crop].name,
                    self.farm.storages[combination.storage].name,
                    self.farm.irrigation_practices[combination.irrigation].name,
                    self.farm.water_sources[source_idx].name,
                );
            }
        }

        // (i) one row per (field, source): gross water drawn across that
        // field's candidates stays within the source's seasonal pool.
        for field_idx in 0..self.farm.fields.len() {
            let field_combos = kept_set.combinations_for_field(field_idx);
            if field_combos.is_empty() {
                continue;
            }
            for (sp, &source_idx) in kept_set.sources.iter().enumerate() {
                let source = &self.farm.water_sources[source_idx];
                let mut coefficients = vec![0.0; n_vars];
                for &ci in &field_combos {
                    coefficients[kept_set.variable(ci, sp)] = terms_by_combination[ci][sp].gross_ml_per_ha;
                }
                problem.ub_rows.push(LpRow {
                    coefficients,
                    bound: source.available_ml,
                    label: format!("water[{}][{}]", self.farm.fields[field_idx].name, source.name),
                });
            }

            // (ii) one row per field: total allocated area within the
            // field boundary.
            let mut coefficients = vec![0.0; n_vars];
            for &ci in &field_combos {
                for sp in 0..kept_set.sources.len() {
                    coefficients[kept_set.variable(ci, sp)] = 1.0;
                }
            }
            let field = &self.farm.fields[field_idx];
            problem.ub_rows.push(LpRow {
                coefficients,
                bound: field.area_ha,
                label: format!("area[{}]", field.name),
            });

            // Equality only when the field's system is newly implemented
            // this cycle: capital is incurred across the whole field.
            let all_new = field_combos.iter().all(|&ci| {
                let combo = kept_set.combinations[ci];
                !self.farm.irrigation_practices[combo.irrigation].implemented
            });
            if all_new {
                let mut coefficients = vec![0.0; n_vars];
                for &ci in &field_combos {
                    for sp in 0..kept_set.sources.len() {
                        coefficients[kept_set.variable(ci, sp)] = 1.0;
                    }
                }
                problem.eq_rows.push(LpRow {
                    coefficients,
                    bound: field.area_ha,
                    label: format!("implement[{}]", field.name),
                });
            }
        }

        (problem, kept_set)
    }

    /// Derived terms for one (combination, source) pair.
    pub fn terms(
        &self,
        combination: Combination,
        source_idx: usize,
        cache: &mut CoefficientCache,
    ) -> VariableTerms {
        if let Some(terms) = cache.get(&(combination, source_idx)) {
            return *terms;
        }

        let field = &self.farm.fields[combination.field];
        let crop = &self.farm.crops[combination.crop];
        let storage = &self.farm.storages[combination.storage];
        let practice = &self.farm.irrigation_practices[combination.irrigation];
        let source = &self.farm.water_sources[source_idx];

        let net_ml_per_ha = crop.water_applied_ml_per_ha;
        let (gross_ml_per_ha, water_limited_area) = if net_ml_per_ha > 0.0 {
            let gross = practice.gross_water_ml(net_ml_per_ha);
            (gross, storage.gross_availability_ml(source) / gross)
        } else {
            // Zero requirement: substitute the field-area sentinel so no
            // division reaches the optimiser.
            warn!(
                crop = %crop.name,
                "crop has zero water requirement; water bound defaults to field area"
            );
            (0.0, field.area_ha)
        };

        let mut cost = practice.annual_cost_per_ha()
            + gross_ml_per_ha * source.cost_per_ml
            + gross_ml_per_ha * storage.annual_cost_per_ml();
        if practice.implemented {
            cost += gross_ml_per_ha * source.pumping_cost_per_ml();
        }

        // No crop income accrues while the system is being implemented.
        let mut margin = if practice.implemented {
            crop.gross_margin_per_ha()
        } else {
            0.0
        };
        if self.credit_saved_water {
            let baseline_gross = field.irrigation.gross_water_ml(net_ml_per_ha);
            let saved_ml = (baseline_gross - gross_ml_per_ha).max(0.0);
            margin += saved_ml * source.saved_water_value_per_ml;
        }

        let terms = VariableTerms {
            objective: cost - margin,
            gross_ml_per_ha,
            upper_bound: field
                .area_ha
                .min(practice.max_area_ha)
                .min(water_limited_area),
        };
        cache.insert((combination, source_idx), terms);
        terms
    }
}
