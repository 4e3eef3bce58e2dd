//! The combinatorial planning layer: candidate enumeration, coefficient
//! construction, the external solve, and mapping the solution vector
//! back onto field/water-source allocations.

pub mod combinations;
pub mod matrix;
pub mod solve;

pub use combinations::{enumerate, CandidateSet, Combination};
pub use matrix::{CoefficientBuilder, CoefficientCache, LpProblem, LpRow, VariableTerms};
pub use solve::{GoodLpSolver, LpSolution, LpSolver};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::PlanError;
use crate::farm::Farm;

const AREA_EPS: f64 = 1e-6;

/// The optimiser's decision for one field.
#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub field: usize,
    pub combination: Combination,
    /// (water-source index, allocated area ha), source order fixed.
    pub allocations: Vec<(usize, f64)>,
}

impl FieldPlan {
    pub fn allocated_area_ha(&self) -> f64 {
        self.allocations.iter().map(|(_, a)| a).sum()
    }
}

/// A planning-cycle result: the solved allocation and its profit
/// (negated minimised objective).
#[derive(Debug, Clone)]
pub struct Plan {
    pub objective: f64,
    pub profit: f64,
    pub fields: Vec<FieldPlan>,
}

/// Owns the solver and the per-season coefficient cache. The season
/// scheduler clears the cache at every season boundary.
pub struct Planner {
    solver: Box<dyn LpSolver>,
    credit_saved_water: bool,
    cache: CoefficientCache,
}

impl Planner {
    pub fn new(solver: Box<dyn LpSolver>, credit_saved_water: bool) -> Self {
        Self {
            solver,
            credit_saved_water,
            cache: CoefficientCache::new(),
        }
    }

    /// Runs one full planning cycle for `date`.
    pub fn plan(&mut self, farm: &Farm, date: NaiveDate, step_days: u32) -> Result<Plan, PlanError> {
        let candidates = enumerate(farm, date, step_days);
        if candidates.is_empty() {
            return Err(PlanError::NoCandidates { date });
        }

        let builder = CoefficientBuilder::new(farm, self.credit_saved_water);
        let (problem, kept) = builder.build(&candidates, &mut self.cache);
        if kept.is_empty() {
            return Err(PlanError::NoCandidates { date });
        }
        debug!(
            variables = problem.variable_count(),
            ub_rows = problem.ub_rows.len(),
            eq_rows = problem.eq_rows.len(),
            solver = self.solver.name(),
            "solving planning problem"
        );

        let solution = self.solver.solve(&problem)?;
        let plan = map_solution(farm, &kept, &solution);
        info!(
            date = %date,
            profit = plan.profit,
            planted_fields = plan.fields.len(),
            "planning cycle complete"
        );
        Ok(plan)
    }

    /// Drops every cached coefficient. Called at season boundaries so
    /// stale `implemented` states never leak into the next cycle.
    pub fn invalidate_cache(&mut self) {
        self.cache.clear();
    }

    #[cfg(test)]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Maps the solution vector back to per-field allocations. Each field
/// takes the combination carrying the most area; area the solver left
/// on degenerate alternates of the same field is folded into it.
fn map_solution(farm: &Farm, kept: &CandidateSet, solution: &LpSolution) -> Plan {
    let mut fields = Vec::new();
    for field_idx in 0..farm.fields.len() {
        let combos = kept.combinations_for_field(field_idx);
        if combos.is_empty() {
            continue;
        }

        let mut best: Option<(usize, f64)> = None;
        let mut by_source = vec![0.0; kept.sources.len()];
        for &ci in &combos {
            let mut total = 0.0;
            for sp in 0..kept.sources.len() {
                let x = solution.values[kept.variable(ci, sp)];
                total += x;
                by_source[sp] += x;
            }
            if best.map_or(true, |(_, t)| total > t) {
                best = Some((ci, total));
            }
        }

        let (best_ci, best_total) = best.expect("field has combinations");
        let allocated: f64 = by_source.iter().sum();
        if allocated <= AREA_EPS || best_total <= AREA_EPS {
            continue;
        }
        fields.push(FieldPlan {
            field: field_idx,
            combination: kept.combinations[best_ci],
            allocations: kept
                .sources
                .iter()
                .enumerate()
                .filter(|(sp, _)| by_source[*sp] > AREA_EPS)
                .map(|(sp, &source_idx)| (source_idx, by_source[sp]))
                .collect(),
        });
    }

    Plan {
        objective: solution.objective,
        profit: -solution.objective,
        fields,
    }
}
