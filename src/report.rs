//! Simulation outputs: the per-field per-step log record and the
//! season-level summary, plus a writer that persists summaries as JSON
//! under an output directory.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One water-balance step on one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldStepRecord {
    pub date: NaiveDate,
    pub field: String,
    pub crop: String,
    pub etc_mm: f64,
    pub effective_rain_mm: f64,
    pub applied_mm: f64,
    pub applied_gross_ml: f64,
    pub deficit_before_mm: f64,
    pub deficit_after_mm: f64,
    pub seepage_mm: f64,
    pub pumping_cost: f64,
}

/// Closed-season accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub season: u32,
    pub opened: NaiveDate,
    pub closed: NaiveDate,
    /// Planned farm profit, the negated LP objective (annualised costs).
    pub profit: f64,
    /// Up-front capital spent on newly implemented systems this season.
    pub capital_invested: f64,
    /// The same capital expressed as an annuity-discounted annual cost.
    pub capital_annuity: f64,
    pub pumping_cost_by_source: BTreeMap<String, f64>,
    pub total_applied_ml: f64,
    pub harvested_fields: Vec<String>,
}

impl SeasonSummary {
    pub fn total_pumping_cost(&self) -> f64 {
        self.pumping_cost_by_source.values().sum()
    }
}

/// Writes season artifacts under an output directory. A writer built
/// with no directory is disabled and writes nothing.
pub struct ReportWriter {
    out_dir: Option<PathBuf>,
}

impl ReportWriter {
    pub fn new(out_dir: Option<impl AsRef<Path>>) -> io::Result<Self> {
        let out_dir = match out_dir {
            Some(dir) => {
                let dir = dir.as_ref().to_path_buf();
                fs::create_dir_all(&dir)?;
                Some(dir)
            }
            None => None,
        };
        Ok(Self { out_dir })
    }

    pub fn disabled() -> Self {
        Self { out_dir: None }
    }

    pub fn write_summary(&self, summary: &SeasonSummary) -> io::Result<Option<PathBuf>> {
        let Some(dir) = &self.out_dir else {
            return Ok(None);
        };
        let path = dir.join(format!("season_{:03}.json", summary.season));
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&path, json)?;
        debug!(path = %path.display(), "wrote season summary");
        Ok(Some(path))
    }

    pub fn write_steps(&self, season: u32, steps: &[FieldStepRecord]) -> io::Result<Option<PathBuf>> {
        let Some(dir) = &self.out_dir else {
            return Ok(None);
        };
        let path = dir.join(format!("season_{season:03}_steps.jsonl"));
        let mut out = String::new();
        for step in steps {
            let line = serde_json::to_string(step)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            out.push_str(&line);
            out.push('\n');
        }
        fs::write(&path, out)?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn summary() -> SeasonSummary {
        SeasonSummary {
            season: 1,
            opened: NaiveDate::from_ymd_opt(2020, 5, 15).unwrap(),
            closed: NaiveDate::from_ymd_opt(2020, 11, 1).unwrap(),
            profit: 12_500.0,
            capital_invested: 0.0,
            capital_annuity: 0.0,
            pumping_cost_by_source: BTreeMap::from([("river".to_string(), 310.0)]),
            total_applied_ml: 84.0,
            harvested_fields: vec!["home".into()],
        }
    }

    #[test]
    fn disabled_writer_writes_nothing() {
        let writer = ReportWriter::disabled();
        assert!(writer.write_summary(&summary()).unwrap().is_none());
    }

    #[test]
    fn summary_round_trips_through_json() {
        let dir = env::temp_dir().join("irriplan_report_test");
        let writer = ReportWriter::new(Some(&dir)).unwrap();
        let path = writer.write_summary(&summary()).unwrap().unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let loaded: SeasonSummary = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded.season, 1);
        assert_eq!(loaded.harvested_fields, vec!["home".to_string()]);
        assert!((loaded.total_pumping_cost() - 310.0).abs() < 1e-9);
        fs::remove_dir_all(&dir).ok();
    }
}
