use thiserror::Error;

/// Setup-time failures. All of these must surface before the first
/// simulation step runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("field '{field}' has non-positive area {area_ha} ha")]
    ZeroArea { field: String, area_ha: f64 },

    #[error("missing required parameter '{name}'")]
    MissingParameter { name: String },

    #[error("parameter '{name}' has inconsistent bounds (min {min} > max {max})")]
    InvalidBounds { name: String, min: f64, max: f64 },

    #[error("{kind} '{name}' is referenced but not defined")]
    UnknownReference { kind: &'static str, name: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Planning-cycle failures. Infeasibility carries the rendered problem so
/// the failing coefficient/constraint state can be inspected by the caller.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no eligible combinations to plan on {date}")]
    NoCandidates { date: chrono::NaiveDate },

    #[error("linear program is infeasible\n{detail}")]
    Infeasible { detail: String },

    #[error("linear program is unbounded\n{detail}")]
    Unbounded { detail: String },

    #[error("solver failure: {0}")]
    Solver(String),
}

/// Failures raised by the season scheduler while stepping.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("season {season} is already open; refusing to replan mid-season")]
    SeasonAlreadyOpen { season: u32 },

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("report output failed: {0}")]
    Report(#[from] std::io::Error),
}
