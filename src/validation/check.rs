//! Replay a solution against its heap

use crate::catalog::CompressorKind;
use crate::heap::{HeapModel, RangeState};
use crate::solution::{ModularSummary, Solution};
use crate::strategy::config::CompressionConfig;
use std::fmt;

/// A property a replayed solution breaks
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    UnknownCompressor { stage: usize, index: usize },
    AnchorOutside { stage: usize, column: usize },
    MissingWidth { stage: usize, index: usize },
    Unconsumed { stage: usize, column: usize, count: i32 },
    LateBits { stage: usize },
    OverCapacity { column: usize, height: i32 },
    HeightMismatch { column: usize, replayed: i32, reported: i32 },
    AreaMismatch { replayed: f64, reported: f64 },
    RangeOutside { min: i64, max: i64, modulus: u64 },
    RangeMismatch { replayed: ModularSummary, reported: ModularSummary },
    ConstantOverCapacity { column: usize, height: i32 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UnknownCompressor { stage, index } => {
                write!(f, "stage {}: placement {} names an unknown compressor", stage, index)
            }
            Violation::AnchorOutside { stage, column } => {
                write!(f, "stage {}: anchor column {} is outside the heap", stage, column)
            }
            Violation::MissingWidth { stage, index } => write!(
                f,
                "stage {}: variable placement {} has no middle width",
                stage, index
            ),
            Violation::Unconsumed {
                stage,
                column,
                count,
            } => write!(
                f,
                "stage {}: {} bits left in column {}",
                stage, count, column
            ),
            Violation::LateBits { stage } => {
                write!(f, "stage {}: bits left behind before later arrivals", stage)
            }
            Violation::OverCapacity { column, height } => {
                write!(f, "final column {} holds {} bits", column, height)
            }
            Violation::HeightMismatch {
                column,
                replayed,
                reported,
            } => write!(
                f,
                "final column {}: replay gives {}, solution reports {}",
                column, replayed, reported
            ),
            Violation::AreaMismatch { replayed, reported } => write!(
                f,
                "area: replay gives {}, solution reports {}",
                replayed, reported
            ),
            Violation::RangeOutside { min, max, modulus } => {
                write!(f, "range [{}, {}] outside [-{}, {})", min, max, modulus, modulus)
            }
            Violation::RangeMismatch { replayed, reported } => write!(
                f,
                "range: replay gives [{}, {}] constant {}, solution reports [{}, {}] constant {}",
                replayed.range_min,
                replayed.range_max,
                replayed.constant,
                reported.range_min,
                reported.range_max,
                reported.constant
            ),
            Violation::ConstantOverCapacity { column, height } => write!(
                f,
                "final column {} holds {} bits and a constant one",
                column, height
            ),
        }
    }
}

/// Per-stage bit accounting of a replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageAccount {
    /// Real bits present when the stage started
    pub bits_in: u64,
    /// Input bits taken by placements
    pub consumed: u64,
    /// Output bits emitted into the next stage, dropped ones excluded
    pub produced: u64,
    /// Output bits past the top column
    pub dropped: u64,
}

impl StageAccount {
    /// Bits removed by the stage's compressors
    pub fn net_reduction(&self) -> i64 {
        self.consumed as i64 - self.produced as i64 - self.dropped as i64
    }
}

/// Outcome of replaying a solution
#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    pub stages: Vec<StageAccount>,
    pub final_heights: Vec<i32>,
    pub area: f64,
    pub violations: Vec<Violation>,
}

impl ReplayReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Replay every placement of `solution` on a copy of `heap`
///
/// Checks that each stage consumes all of its bits, that the final stage
/// fits the final adder and matches the reported heights, and that the
/// reported area is the sum of the placed shapes. A modular range is
/// recomputed from the pseudo placements and must match the reported one,
/// fit the modulus and leave room for the constant bits.
pub fn replay(solution: &Solution, heap: &HeapModel, config: &CompressionConfig) -> ReplayReport {
    let catalog = solution.catalog();
    let mut work = heap.clone().with_growable(solution.modular().is_some());
    let mut report = ReplayReport::default();

    for (stage, placements) in solution.stages().iter().enumerate() {
        let mut account = StageAccount {
            bits_in: work.stage_total(stage),
            ..Default::default()
        };
        for (index, placement) in placements.iter().enumerate() {
            let Some(compressor) = catalog.get(placement.compressor) else {
                report
                    .violations
                    .push(Violation::UnknownCompressor { stage, index });
                continue;
            };
            if placement.column >= work.width() {
                report.violations.push(Violation::AnchorOutside {
                    stage,
                    column: placement.column,
                });
                continue;
            }
            if compressor.is_variable() && placement.middle_width.is_none() {
                report
                    .violations
                    .push(Violation::MissingWidth { stage, index });
            }
            let shape = compressor.realize(placement.middle_width.unwrap_or(0));
            report.area += shape.area;

            let taken = work.consume(stage, placement.column, &shape.inputs);
            account.consumed += taken.iter().map(|&t| t as u64).sum::<u64>();
            let holes = if config.allow_holes {
                shape.interior_holes()
            } else {
                Vec::new()
            };
            let dropped = work.produce(
                stage + 1,
                shape.output_base(placement.column),
                &shape.outputs,
                &holes,
            );
            account.dropped += dropped as u64;
            account.produced += (shape.output_total() - dropped) as u64;
        }

        for (column, &h) in work.row(stage).iter().enumerate() {
            if h > 0 {
                report.violations.push(Violation::Unconsumed {
                    stage,
                    column,
                    count: h,
                });
            }
        }
        // Unfilled holes die with their stage
        work.close_stage(stage);
        report.stages.push(account);
    }

    // Stages without placements may still precede late arrivals
    let mut last = solution.stage_count();
    while !work.later_stages_empty(last) {
        if work.stage_total(last) > 0 {
            report.violations.push(Violation::LateBits { stage: last });
        }
        last += 1;
    }
    report.final_heights = work.row(last).iter().map(|&h| h.max(0)).collect();

    for (column, &height) in report.final_heights.iter().enumerate() {
        if height > config.capacity() as i32 {
            report
                .violations
                .push(Violation::OverCapacity { column, height });
        }
    }
    let reported = solution.final_heights();
    let columns = report.final_heights.len().max(reported.len());
    for column in 0..columns {
        let replayed = report.final_heights.get(column).copied().unwrap_or(0);
        let claimed = reported.get(column).copied().unwrap_or(0);
        if replayed != claimed {
            report.violations.push(Violation::HeightMismatch {
                column,
                replayed,
                reported: claimed,
            });
        }
    }

    if (report.area - solution.total_area()).abs() > 1e-6 {
        report.violations.push(Violation::AreaMismatch {
            replayed: report.area,
            reported: solution.total_area(),
        });
    }
    if let Some(summary) = solution.modular() {
        let mut range = RangeState::from_heap(heap);
        for (_, placement) in solution.placements() {
            if let Some(CompressorKind::Pseudo { residue }) =
                catalog.get(placement.compressor).map(|c| &c.kind)
            {
                range.apply_residue(placement.column, *residue);
            }
        }
        let replayed = ModularSummary::new(summary.modulus, &range);
        if replayed != *summary {
            report.violations.push(Violation::RangeMismatch {
                replayed,
                reported: *summary,
            });
        }
        if !summary.fits() {
            report.violations.push(Violation::RangeOutside {
                min: summary.range_min,
                max: summary.range_max,
                modulus: summary.modulus,
            });
        }
        for column in replayed.crowded_columns(&report.final_heights, config.capacity()) {
            report.violations.push(Violation::ConstantOverCapacity {
                column,
                height: report.final_heights.get(column).copied().unwrap_or(0),
            });
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::device::Device;
    use crate::catalog::pseudo::PseudoCache;
    use crate::catalog::{Catalog, Compressor, Ranking};
    use crate::solution::Placement;
    use crate::strategy::{CompressionStrategy, HeuristicStrategy, ModularStrategy};

    fn fa_catalog() -> Catalog {
        Catalog::new(
            vec![Compressor::fixed("fa", vec![3], vec![1, 1], 1.0)],
            0.0,
            Ranking::Efficiency,
        )
    }

    #[test]
    fn test_heuristic_solution_replays() {
        let heap = HeapModel::from_rows(vec![vec![6, 6, 6, 6, 0, 0, 0, 0]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let config = CompressionConfig::default();
        let solution = HeuristicStrategy::new()
            .synthesize(&heap, &catalog, &config)
            .unwrap();
        let report = replay(&solution, &heap, &config);
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.final_heights, solution.final_heights());
        for account in &report.stages {
            assert_eq!(account.consumed, account.bits_in);
        }
    }

    #[test]
    fn test_conservation_without_holes() {
        let heap = HeapModel::from_rows(vec![vec![3, 0]]);
        let catalog = fa_catalog();
        let mut solution = Solution::new(catalog.clone());
        solution.push(0, Placement::new(catalog.find("fa").unwrap(), 0));
        solution.finalize(vec![1, 1]);
        let report = replay(&solution, &heap, &CompressionConfig::default());
        assert!(report.is_valid(), "{:?}", report.violations);
        let account = &report.stages[0];
        assert_eq!(account.bits_in, 3);
        assert_eq!(account.net_reduction(), 1);
    }

    #[test]
    fn test_unconsumed_bits_reported() {
        let heap = HeapModel::from_rows(vec![vec![4, 0]]);
        let catalog = fa_catalog();
        let mut solution = Solution::new(catalog.clone());
        solution.push(0, Placement::new(catalog.find("fa").unwrap(), 0));
        solution.finalize(vec![1, 1]);
        let report = replay(&solution, &heap, &CompressionConfig::default());
        assert!(report.violations.contains(&Violation::Unconsumed {
            stage: 0,
            column: 0,
            count: 1
        }));
    }

    #[test]
    fn test_over_capacity_and_mismatch_reported() {
        let heap = HeapModel::from_rows(vec![vec![3]]);
        let mut solution = Solution::new(fa_catalog());
        solution.finalize(vec![2]);
        let report = replay(&solution, &heap, &CompressionConfig::default());
        assert!(report.violations.contains(&Violation::OverCapacity {
            column: 0,
            height: 3
        }));
        assert!(report.violations.contains(&Violation::HeightMismatch {
            column: 0,
            replayed: 3,
            reported: 2
        }));
    }

    #[test]
    fn test_late_arrivals_without_placements() {
        let heap = HeapModel::from_rows(vec![vec![0, 0], vec![0, 0], vec![2, 1]]);
        let solution = HeuristicStrategy::new()
            .synthesize(&heap, &fa_catalog(), &CompressionConfig::default())
            .unwrap();
        assert_eq!(solution.stage_count(), 0);
        let report = replay(&solution, &heap, &CompressionConfig::default());
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.final_heights, vec![2, 1]);
    }

    #[test]
    fn test_range_recomputed_from_pseudo_placements() {
        let heap = HeapModel::from_rows(vec![vec![0, 0, 0, 1]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let config = CompressionConfig::default().with_modulus(5);
        let mut solution = ModularStrategy::new()
            .synthesize(&heap, &catalog, &config)
            .unwrap();
        assert!(replay(&solution, &heap, &config).is_valid());

        let honest = *solution.modular().unwrap();
        let claimed = ModularSummary {
            range_max: 1,
            ..honest
        };
        solution.set_modular(claimed);
        let report = replay(&solution, &heap, &config);
        assert_eq!(
            report.violations,
            vec![Violation::RangeMismatch {
                replayed: honest,
                reported: claimed
            }]
        );
    }

    #[test]
    fn test_constant_bits_over_capacity_reported() {
        let heap = HeapModel::from_rows(vec![vec![0, 1, 0, 1]]);
        let mut catalog = fa_catalog();
        let pseudo = PseudoCache::new().get_or_insert(&mut catalog, 3, -2).unwrap();
        let pass = catalog.pass_through();
        let mut solution = Solution::new(catalog);
        solution.push(0, Placement::new(pseudo, 3));
        solution.push(0, Placement::new(pass, 1));
        solution.finalize(vec![0, 2, 0, 0]);
        solution.set_modular(ModularSummary::new(
            5,
            &RangeState {
                min: -2,
                max: 2,
                constant: -2,
            },
        ));

        // -2 = 0b1110 puts a constant one beside the two bits of column 1
        let report = replay(&solution, &heap, &CompressionConfig::default().with_modulus(5));
        assert_eq!(
            report.violations,
            vec![Violation::ConstantOverCapacity {
                column: 1,
                height: 2
            }]
        );
    }

    #[test]
    fn test_anchor_outside_reported() {
        let heap = HeapModel::from_rows(vec![vec![1]]);
        let catalog = fa_catalog();
        let mut solution = Solution::new(catalog.clone());
        solution.push(0, Placement::new(catalog.find("fa").unwrap(), 4));
        let report = replay(&solution, &heap, &CompressionConfig::default());
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, Violation::AnchorOutside { column: 4, .. })));
    }
}
