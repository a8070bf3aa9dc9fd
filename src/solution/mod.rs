//! Synthesis result: per-stage placements plus statistics

pub mod statistics;

pub use statistics::SynthesisStatistics;

use crate::catalog::{Catalog, CompressorId, Shape};
use crate::heap::RangeState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One compressor instance at a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub compressor: CompressorId,
    /// Anchor column
    pub column: usize,
    /// Realized middle width of a variable compressor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_width: Option<usize>,
}

impl Placement {
    pub fn new(compressor: CompressorId, column: usize) -> Self {
        Self {
            compressor,
            column,
            middle_width: None,
        }
    }

    pub fn with_middle_width(mut self, width: Option<usize>) -> Self {
        self.middle_width = width;
        self
    }

    /// Realized shape, or `None` if the compressor is not in `catalog`
    pub fn shape(&self, catalog: &Catalog) -> Option<Shape> {
        catalog
            .get(self.compressor)
            .map(|c| c.realize(self.middle_width.unwrap_or(0)))
    }
}

/// Final range of a modular solution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModularSummary {
    pub modulus: u64,
    pub range_min: i64,
    pub range_max: i64,
    /// Sum of the negative residues, to be added back by the consumer
    pub constant: i64,
    /// `constant` as constant-one bits, bit `j` in column `j`, summed by the
    /// final adder with the final heights
    #[serde(default)]
    pub constant_bits: u64,
}

impl ModularSummary {
    pub fn new(modulus: u64, range: &RangeState) -> Self {
        let clamp = |v: i128| v.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Self {
            modulus,
            range_min: clamp(range.min),
            range_max: clamp(range.max),
            constant: clamp(range.constant),
            constant_bits: range.constant_vector(modulus),
        }
    }

    /// Columns holding a constant-one bit
    pub fn constant_columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..u64::BITS as usize).filter(move |&j| (self.constant_bits >> j) & 1 == 1)
    }

    /// Columns where `heights` plus the constant bit exceed `capacity`
    pub fn crowded_columns(&self, heights: &[i32], capacity: u32) -> Vec<usize> {
        self.constant_columns()
            .filter(|&j| heights.get(j).copied().unwrap_or(0).max(0) + 1 > capacity as i32)
            .collect()
    }

    /// Whether the range lies inside `[-modulus, modulus)`
    pub fn fits(&self) -> bool {
        let m = self.modulus as i128;
        self.range_min as i128 >= -m && (self.range_max as i128) < m
    }
}

/// A finalized compression tree
#[derive(Debug, Clone)]
pub struct Solution {
    stages: Vec<Vec<Placement>>,
    catalog: Catalog,
    total_area: f64,
    final_heights: Vec<i32>,
    modular: Option<ModularSummary>,
    statistics: SynthesisStatistics,
}

impl Solution {
    /// An empty solution referring to `catalog`
    pub fn new(catalog: Catalog) -> Self {
        Self {
            stages: Vec::new(),
            catalog,
            total_area: 0.0,
            final_heights: Vec::new(),
            modular: None,
            statistics: SynthesisStatistics::default(),
        }
    }

    pub fn push(&mut self, stage: usize, placement: Placement) {
        while self.stages.len() <= stage {
            self.stages.push(Vec::new());
        }
        self.stages[stage].push(placement);
    }

    /// Placements at `stage`; stages past the end are empty
    pub fn stage(&self, stage: usize) -> &[Placement] {
        self.stages.get(stage).map(|s| s.as_slice()).unwrap_or(&[])
    }

    pub fn stages(&self) -> &[Vec<Placement>] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Placements of every stage, pass-throughs included
    pub fn placements(&self) -> impl Iterator<Item = (usize, &Placement)> {
        self.stages
            .iter()
            .enumerate()
            .flat_map(|(s, ps)| ps.iter().map(move |p| (s, p)))
    }

    /// Number of placements of the compressor called `name`
    pub fn count_of(&self, name: &str) -> usize {
        self.placements()
            .filter(|(_, p)| {
                self.catalog
                    .get(p.compressor)
                    .is_some_and(|c| c.name == name)
            })
            .count()
    }

    /// Trim trailing empty stages and compute the total area
    pub fn finalize(&mut self, final_heights: Vec<i32>) {
        while self.stages.last().is_some_and(|s| s.is_empty()) {
            self.stages.pop();
        }
        self.total_area = self
            .placements()
            .filter_map(|(_, p)| p.shape(&self.catalog))
            .map(|shape| shape.area)
            .sum();
        self.final_heights = final_heights;
        self.statistics.stages = self.stages.iter().filter(|s| !s.is_empty()).count();
    }

    pub fn total_area(&self) -> f64 {
        self.total_area
    }

    pub fn final_heights(&self) -> &[i32] {
        &self.final_heights
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn modular(&self) -> Option<&ModularSummary> {
        self.modular.as_ref()
    }

    pub fn set_modular(&mut self, summary: ModularSummary) {
        self.modular = Some(summary);
    }

    pub fn statistics(&self) -> &SynthesisStatistics {
        &self.statistics
    }

    pub fn statistics_mut(&mut self) -> &mut SynthesisStatistics {
        &mut self.statistics
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} stages, total area {:.3}",
            self.stage_count(),
            self.total_area
        )?;
        let pass = self.catalog.pass_through();
        for (s, placements) in self.stages.iter().enumerate() {
            let carried = placements.iter().filter(|p| p.compressor == pass).count();
            writeln!(f, "stage {}:", s)?;
            for p in placements.iter().filter(|p| p.compressor != pass) {
                let name = self
                    .catalog
                    .get(p.compressor)
                    .map(|c| c.name.as_str())
                    .unwrap_or("?");
                match p.middle_width {
                    Some(w) => writeln!(f, "  {} (width {}) @ column {}", name, w, p.column)?,
                    None => writeln!(f, "  {} @ column {}", name, p.column)?,
                }
            }
            if carried > 0 {
                writeln!(f, "  {} bits passed through", carried)?;
            }
        }
        let heights: Vec<String> = self.final_heights.iter().map(|h| h.to_string()).collect();
        write!(f, "final heights: [{}]", heights.join(", "))?;
        if let Some(m) = &self.modular {
            write!(
                f,
                "\nmodulus {}: range [{}, {}], constant {}",
                m.modulus, m.range_min, m.range_max, m.constant
            )?;
            if m.constant_bits != 0 {
                write!(f, " (constant bits {:#b})", m.constant_bits)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Compressor, Ranking};

    fn catalog() -> Catalog {
        Catalog::new(
            vec![Compressor::fixed("fa", vec![3], vec![1, 1], 1.0)],
            0.5,
            Ranking::Efficiency,
        )
    }

    #[test]
    fn test_finalize_trims_and_sums_area() {
        let catalog = catalog();
        let fa = catalog.find("fa").unwrap();
        let pass = catalog.pass_through();
        let mut solution = Solution::new(catalog);
        solution.push(0, Placement::new(fa, 0));
        solution.push(0, Placement::new(pass, 1));
        solution.push(3, Placement::new(fa, 0));
        solution.stages[3].clear();

        solution.finalize(vec![2, 1]);
        assert_eq!(solution.stage_count(), 1);
        assert_eq!(solution.total_area(), 1.5);
        assert_eq!(solution.final_heights(), &[2, 1]);
        assert_eq!(solution.statistics().stages, 1);
        assert_eq!(solution.count_of("fa"), 1);
    }

    #[test]
    fn test_stage_past_end_is_empty() {
        let solution = Solution::new(catalog());
        assert!(solution.stage(5).is_empty());
    }

    #[test]
    fn test_modular_summary_fits() {
        let summary = ModularSummary::new(
            5,
            &RangeState {
                min: -2,
                max: 4,
                constant: -2,
            },
        );
        assert!(summary.fits());
        assert_eq!(summary.constant, -2);
        assert_eq!(summary.constant_bits, 0b1110);
        assert_eq!(summary.constant_columns().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(summary.crowded_columns(&[2, 2, 1, 0], 2), vec![1]);
    }

    #[test]
    fn test_display_lists_compressors() {
        let catalog = catalog();
        let fa = catalog.find("fa").unwrap();
        let mut solution = Solution::new(catalog);
        solution.push(0, Placement::new(fa, 2));
        solution.finalize(vec![1, 1]);
        let text = solution.to_string();
        assert!(text.contains("fa @ column 2"));
        assert!(text.contains("final heights: [1, 1]"));
    }
}
