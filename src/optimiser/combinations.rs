//! Candidate-combination enumeration: the cartesian product of storages,
//! irrigation practices and in-window crops over each field, paired with
//! every water source when the matrix is assembled.

use chrono::NaiveDate;

use crate::farm::Farm;

/// One candidate assignment for a field, by index into the farm's
/// collections. Lives for a single planning cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Combination {
    pub field: usize,
    pub crop: usize,
    pub storage: usize,
    pub irrigation: usize,
}

/// The candidate set plus the fixed orderings every matrix row and
/// column are derived from. Variables are combination-major,
/// source-minor; nothing downstream may rely on map iteration order.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    pub combinations: Vec<Combination>,
    /// Water-source indices, in farm configuration order.
    pub sources: Vec<usize>,
}

impl CandidateSet {
    pub fn variable_count(&self) -> usize {
        self.combinations.len() * self.sources.len()
    }

    /// Column index of (combination, source position).
    pub fn variable(&self, combination: usize, source_pos: usize) -> usize {
        combination * self.sources.len() + source_pos
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty() || self.sources.is_empty()
    }

    /// Indices of combinations belonging to `field`.
    pub fn combinations_for_field(&self, field: usize) -> Vec<usize> {
        self.combinations
            .iter()
            .enumerate()
            .filter(|(_, c)| c.field == field)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Enumerates candidates for every field whose planting window contains
/// `date`. Practices with no usable area are not eligible.
pub fn enumerate(farm: &Farm, date: NaiveDate, step_days: u32) -> CandidateSet {
    let mut combinations = Vec::new();
    for (field_idx, _field) in farm.fields.iter().enumerate() {
        for (crop_idx, crop) in farm.crops.iter().enumerate() {
            if !crop.in_planting_window(date, step_days) {
                continue;
            }
            for (storage_idx, _) in farm.storages.iter().enumerate() {
                for (irrigation_idx, practice) in farm.irrigation_practices.iter().enumerate() {
                    if practice.max_area_ha <= 0.0 {
                        continue;
                    }
                    combinations.push(Combination {
                        field: field_idx,
                        crop: crop_idx,
                        storage: storage_idx,
                        irrigation: irrigation_idx,
                    });
                }
            }
        }
    }
    CandidateSet {
        combinations,
        sources: (0..farm.water_sources.len()).collect(),
    }
}
