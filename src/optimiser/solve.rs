//! Adapter around the external LP backend. Infeasibility is a typed
//! error carrying the rendered problem, not a process abort; the caller
//! decides whether to terminate.

use good_lp::{
    variable, variables, Expression, ResolutionError, Solution as GoodLpSolution, SolverModel,
    Variable as GoodLpVariable,
};

use crate::error::PlanError;
use crate::optimiser::matrix::LpProblem;

#[derive(Debug, Clone)]
pub struct LpSolution {
    /// Minimised objective: total negated farm profit.
    pub objective: f64,
    pub values: Vec<f64>,
}

pub trait LpSolver {
    fn name(&self) -> &str;
    fn solve(&self, problem: &LpProblem) -> Result<LpSolution, PlanError>;
}

/// Solver backed by `good_lp`'s bundled backend.
#[derive(Debug, Default)]
pub struct GoodLpSolver;

impl GoodLpSolver {
    pub fn new() -> Self {
        Self
    }
}

impl LpSolver for GoodLpSolver {
    fn name(&self) -> &str {
        "good_lp"
    }

    fn solve(&self, problem: &LpProblem) -> Result<LpSolution, PlanError> {
        if problem.is_empty() {
            return Err(PlanError::Solver("empty problem handed to solver".into()));
        }

        let mut vars = variables!();
        let lp_variables: Vec<GoodLpVariable> = problem
            .bounds
            .iter()
            .map(|&(lower, upper)| vars.add(variable().min(lower).max(upper)))
            .collect();

        let mut objective: Expression = 0.into();
        for (i, &coefficient) in problem.objective.iter().enumerate() {
            if coefficient != 0.0 {
                objective += coefficient * lp_variables[i];
            }
        }

        let mut model = vars.minimise(objective).using(good_lp::default_solver);
        for row in &problem.ub_rows {
            let mut lhs: Expression = 0.into();
            for (i, &coefficient) in row.coefficients.iter().enumerate() {
                if coefficient != 0.0 {
                    lhs += coefficient * lp_variables[i];
                }
            }
            model = model.with(lhs.leq(row.bound));
        }
        for row in &problem.eq_rows {
            let mut lhs: Expression = 0.into();
            for (i, &coefficient) in row.coefficients.iter().enumerate() {
                if coefficient != 0.0 {
                    lhs += coefficient * lp_variables[i];
                }
            }
            model = model.with(lhs.eq(row.bound));
        }

        match model.solve() {
            Ok(solution) => {
                let values: Vec<f64> = lp_variables.iter().map(|&v| solution.value(v)).collect();
                let objective = problem
                    .objective
                    .iter()
                    .zip(&values)
                    .map(|(c, x)| c * x)
                    .sum();
                Ok(LpSolution { objective, values })
            }
            Err(ResolutionError::Infeasible) => Err(PlanError::Infeasible {
                detail: problem.to_string(),
            }),
            Err(ResolutionError::Unbounded) => Err(PlanError::Unbounded {
                detail: problem.to_string(),
            }),
            Err(other) => Err(PlanError::Solver(format!("{other:?}"))),
        }
    }
}
