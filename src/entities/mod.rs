//! Entity models: pure parameter holders with their cost and yield
//! formulas. Nothing here depends on the simulator or the optimiser.

mod crop;
mod irrigation;
mod soil;
mod storage;
mod water_source;

pub use crop::{Crop, GrowthStage};
pub use irrigation::IrrigationPractice;
pub use soil::Soil;
pub use storage::WaterStorage;
pub use water_source::WaterSource;

/// Annuity-discounted annual cost of a capital outlay:
/// `capital / [(1 - (1 + rate)^-years) / rate]`.
///
/// A zero rate degenerates to straight-line recovery over the lifespan.
pub fn annualised_cost(capital: f64, rate: f64, years: f64) -> f64 {
    if capital == 0.0 || years <= 0.0 {
        return 0.0;
    }
    if rate.abs() < 1e-12 {
        return capital / years;
    }
    let factor = (1.0 - (1.0 + rate).powf(-years)) / rate;
    capital / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annuity_matches_hand_calculation() {
        // $100,000 at 7% over 20 years: factor ~ 10.594, annual ~ $9,439.
        let annual = annualised_cost(100_000.0, 0.07, 20.0);
        assert!((annual - 9_439.29).abs() < 1.0, "annual cost {annual}");
    }

    #[test]
    fn zero_rate_is_straight_line() {
        assert!((annualised_cost(50_000.0, 0.0, 10.0) - 5_000.0).abs() < 1e-9);
    }

    #[test]
    fn zero_capital_costs_nothing() {
        assert_eq!(annualised_cost(0.0, 0.07, 20.0), 0.0);
    }
}
