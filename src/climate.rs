//! Date-indexed climate series consumed by the water balance.
//!
//! Ingestion of real climate files is out of scope; the series is either
//! handed over fully formed or synthesised from monthly means with a
//! seeded generator so runs stay reproducible.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use rand::Rng;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClimateRecord {
    pub date: NaiveDate,
    pub rainfall_mm: f64,
    pub eto_mm: f64,
}

/// Daily {rainfall, reference evapotranspiration} keyed by date.
#[derive(Debug, Clone, Default)]
pub struct ClimateSeries {
    records: BTreeMap<NaiveDate, (f64, f64)>,
}

impl ClimateSeries {
    /// Builds a series, dropping malformed rows (non-finite or negative
    /// values) with a warning rather than failing the whole table.
    pub fn from_records(records: impl IntoIterator<Item = ClimateRecord>) -> Self {
        let mut map = BTreeMap::new();
        for record in records {
            let ok = record.rainfall_mm.is_finite()
                && record.eto_mm.is_finite()
                && record.rainfall_mm >= 0.0
                && record.eto_mm >= 0.0;
            if !ok {
                warn!(
                    date = %record.date,
                    rainfall = record.rainfall_mm,
                    eto = record.eto_mm,
                    "skipping malformed climate record"
                );
                continue;
            }
            map.insert(record.date, (record.rainfall_mm, record.eto_mm));
        }
        Self { records: map }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.keys().next_back().copied()
    }

    /// Total rainfall (mm) over the half-open range `[start, end)`.
    pub fn rainfall_between(&self, start: NaiveDate, end: NaiveDate) -> f64 {
        self.records
            .range(start..end)
            .map(|(_, (rain, _))| rain)
            .sum()
    }

    /// Total reference evapotranspiration (mm) over `[start, end)`.
    pub fn eto_between(&self, start: NaiveDate, end: NaiveDate) -> f64 {
        self.records.range(start..end).map(|(_, (_, eto))| eto).sum()
    }

    /// Cumulative rainfall over the most recent completed summer period
    /// before `before`. The summer month range may wrap the year end
    /// (e.g. December through February in the southern hemisphere).
    pub fn summer_rainfall(&self, before: NaiveDate, start_month: u32, end_month: u32) -> f64 {
        let wraps = start_month > end_month;
        // Year in which the summer period ends.
        let mut end_year = before.year();
        loop {
            let end = last_day_of_month(end_year, end_month);
            if end < before {
                let start_year = if wraps { end_year - 1 } else { end_year };
                let start = NaiveDate::from_ymd_opt(start_year, start_month, 1)
                    .expect("month validated at setup");
                return self.rainfall_between(start, end + Duration::days(1));
            }
            end_year -= 1;
        }
    }
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("month validated at setup")
        - Duration::days(1)
}

/// Synthesises a daily series from monthly means. Daily rainfall and ET0
/// are the monthly mean split evenly across the month with a seeded
/// multiplicative jitter, so the same seed reproduces the same weather.
#[derive(Debug, Clone)]
pub struct ClimateGenerator {
    pub monthly_rainfall_mm: [f64; 12],
    pub monthly_eto_mm: [f64; 12],
    pub seed: u64,
}

impl ClimateGenerator {
    pub fn generate(&self, start: NaiveDate, end: NaiveDate) -> ClimateSeries {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut records = Vec::new();
        let mut date = start;
        while date < end {
            let month = date.month() as usize - 1;
            let days = days_in_month(date.year(), date.month()) as f64;
            let rain_fluct: f64 = rng.gen_range(0.5..1.5);
            let eto_fluct: f64 = rng.gen_range(0.9..1.1);
            records.push(ClimateRecord {
                date,
                rainfall_mm: (self.monthly_rainfall_mm[month] / days * rain_fluct).max(0.0),
                eto_mm: (self.monthly_eto_mm[month] / days * eto_fluct).max(0.0),
            });
            date += Duration::days(1);
        }
        ClimateSeries::from_records(records)
    }
}

fn days_in_month(year: i32, month: u32) -> i64 {
    (last_day_of_month(year, month)
        - NaiveDate::from_ymd_opt(year, month, 1).expect("valid month")
        + Duration::days(1))
    .num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn generator(seed: u64) -> ClimateGenerator {
        ClimateGenerator {
            monthly_rainfall_mm: [40.0; 12],
            monthly_eto_mm: [120.0; 12],
            seed,
        }
    }

    #[test]
    fn same_seed_reproduces_series() {
        let a = generator(7).generate(date(2020, 1, 1), date(2021, 1, 1));
        let b = generator(7).generate(date(2020, 1, 1), date(2021, 1, 1));
        assert_eq!(a.len(), b.len());
        assert_eq!(
            a.rainfall_between(date(2020, 1, 1), date(2021, 1, 1)),
            b.rainfall_between(date(2020, 1, 1), date(2021, 1, 1)),
        );
    }

    #[test]
    fn malformed_records_are_skipped() {
        let series = ClimateSeries::from_records(vec![
            ClimateRecord {
                date: date(2020, 1, 1),
                rainfall_mm: 4.0,
                eto_mm: 5.0,
            },
            ClimateRecord {
                date: date(2020, 1, 2),
                rainfall_mm: f64::NAN,
                eto_mm: 5.0,
            },
            ClimateRecord {
                date: date(2020, 1, 3),
                rainfall_mm: -1.0,
                eto_mm: 5.0,
            },
        ]);
        assert_eq!(series.len(), 1);
        assert_eq!(series.rainfall_between(date(2020, 1, 1), date(2020, 2, 1)), 4.0);
    }

    #[test]
    fn summer_rainfall_wraps_year_end() {
        // 1 mm/day through December-February, dry otherwise.
        let mut records = Vec::new();
        let mut d = date(2019, 11, 1);
        while d < date(2020, 7, 1) {
            let rain = matches!(d.month(), 12 | 1 | 2) as i32 as f64;
            records.push(ClimateRecord {
                date: d,
                rainfall_mm: rain,
                eto_mm: 3.0,
            });
            d += Duration::days(1);
        }
        let series = ClimateSeries::from_records(records);
        let total = series.summer_rainfall(date(2020, 6, 1), 12, 2);
        // Dec 2019 (31) + Jan 2020 (31) + Feb 2020 (29, leap year).
        assert_eq!(total, 91.0);
    }

    #[test]
    fn range_queries_are_half_open() {
        let series = ClimateSeries::from_records(vec![
            ClimateRecord {
                date: date(2020, 3, 1),
                rainfall_mm: 2.0,
                eto_mm: 1.0,
            },
            ClimateRecord {
                date: date(2020, 3, 2),
                rainfall_mm: 3.0,
                eto_mm: 1.0,
            },
        ]);
        assert_eq!(series.rainfall_between(date(2020, 3, 1), date(2020, 3, 2)), 2.0);
        assert_eq!(series.eto_between(date(2020, 3, 1), date(2020, 3, 3)), 2.0);
    }
}
