pub mod climate;
pub mod entities;
pub mod error;
pub mod farm;
pub mod field;
pub mod manager;
pub mod optimiser;
pub mod report;
pub mod scenario;

pub use error::{ConfigError, PlanError, SimError};
pub use farm::Farm;
pub use manager::{FarmManager, ManagerSettings};
pub use optimiser::{GoodLpSolver, Plan, Planner};
pub use scenario::{Scenario, ScenarioLoader};
