//! Greedy max-efficiency compression
//!
//! At every stage the most efficient valid and necessary placement is
//! committed until none is left, then the remaining bits are carried to the
//! next stage. The loop stops at the first stage that fits the final adder.

use crate::catalog::Catalog;
use crate::error::CompressionError;
use crate::heap::HeapModel;
use crate::scoring::Scorer;
use crate::solution::{Solution, SynthesisStatistics};
use crate::strategy::config::{CompressionConfig, Mode};
use crate::strategy::{run_stages, CompressionStrategy, StagePolicy, Workspace};
use std::time::Instant;

/// Greedy max-efficiency strategy
pub struct HeuristicStrategy {
    statistics: SynthesisStatistics,
}

impl HeuristicStrategy {
    pub fn new() -> Self {
        Self {
            statistics: SynthesisStatistics::new(Mode::Heuristic),
        }
    }
}

impl Default for HeuristicStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// Commit the best candidate of `stage` until none is left
///
/// `capacity` decides necessity; the modular strategy lowers it to force
/// carries out of the residue window.
pub(crate) fn greedy_reduce(
    scorer: &mut Scorer,
    work: &mut Workspace,
    stage: usize,
    lower_bound: f64,
    capacity: u32,
    config: &CompressionConfig,
) -> Result<u64, CompressionError> {
    let cap = config.tuning.max_iterations_per_stage;
    let mut committed = 0usize;
    while let Some(candidate) =
        scorer.best(work.solution.catalog(), &work.heap, stage, lower_bound, capacity)
    {
        if committed >= cap {
            return Err(CompressionError::IterationCap {
                stage,
                iterations: committed,
            });
        }
        work.commit(stage, candidate.placement())?;
        committed += 1;
    }
    Ok(committed as u64)
}

struct GreedyPolicy {
    scorer: Scorer,
}

impl StagePolicy for GreedyPolicy {
    fn reduce(
        &mut self,
        work: &mut Workspace,
        stage: usize,
        lower_bound: f64,
        config: &CompressionConfig,
    ) -> Result<u64, CompressionError> {
        greedy_reduce(
            &mut self.scorer,
            work,
            stage,
            lower_bound,
            config.capacity(),
            config,
        )
    }
}

impl CompressionStrategy for HeuristicStrategy {
    fn synthesize(
        &mut self,
        heap: &HeapModel,
        catalog: &Catalog,
        config: &CompressionConfig,
    ) -> Result<Solution, CompressionError> {
        config.validate()?;
        let start = Instant::now();
        let mut policy = GreedyPolicy {
            scorer: Scorer::new(catalog, config.tuning.epsilon)
                .with_max_width(config.tuning.max_variable_width),
        };
        let mut work = Workspace::new(heap.clone(), catalog, Mode::Heuristic, config.allow_holes);
        work.stats.rejected_compressors = policy.scorer.violations().len() as u64;

        log::info!(
            "heuristic: {} bits over {} columns, {} usable compressors",
            heap.total_bits(),
            heap.width(),
            policy.scorer.usable().len()
        );
        let result = run_stages(&mut policy, &mut work, config);
        work.stats.candidates_scored = policy.scorer.scored();
        work.stats.elapsed_time = start.elapsed();
        self.statistics = work.stats.clone();

        let final_stage = result?;
        let solution = work.finish(final_stage);
        self.statistics = solution.statistics().clone();
        Ok(solution)
    }

    fn statistics(&self) -> SynthesisStatistics {
        self.statistics.clone()
    }

    fn reset(&mut self) {
        self.statistics = SynthesisStatistics::new(Mode::Heuristic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::device::Device;
    use crate::catalog::{Compressor, Ranking};
    use crate::strategy::config::{FinalAdder, Tuning};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn six_three_only() -> Catalog {
        Catalog::new(
            vec![Compressor::fixed("6:3", vec![6], vec![1, 1, 1], 3.0)],
            0.0,
            Ranking::Efficiency,
        )
    }

    #[test]
    fn test_six_three_first_placement() {
        init();
        let heap = HeapModel::from_rows(vec![vec![6, 3, 0, 0]]);
        let catalog = six_three_only();
        let mut strategy = HeuristicStrategy::new();
        let solution = strategy
            .synthesize(&heap, &catalog, &CompressionConfig::default())
            .unwrap();

        let six_three = catalog.find("6:3").unwrap();
        let first = solution
            .stage(0)
            .iter()
            .find(|p| p.compressor == six_three)
            .unwrap();
        assert_eq!(first.column, 0);
        assert!(solution.final_heights().iter().all(|&h| h <= 2));
        assert_eq!(solution.final_heights(), &[1, 1, 2, 1]);
    }

    #[test]
    fn test_interior_zero_output_leaves_hole() {
        init();
        let heap = HeapModel::from_rows(vec![vec![4, 1, 0, 0]]);
        let catalog = Catalog::new(
            vec![Compressor::fixed("4:2h", vec![4], vec![1, 0, 1], 1.0)],
            0.0,
            Ranking::Efficiency,
        );
        let config = CompressionConfig::default().with_holes(true);
        let solution = HeuristicStrategy::new()
            .synthesize(&heap, &catalog, &config)
            .unwrap();

        assert_eq!(solution.count_of("4:2h"), 1);
        assert_eq!(solution.statistics().pass_throughs, 1);
        // The carried column 1 bit fills the hole
        assert_eq!(solution.final_heights(), &[1, 0, 1, 0]);
        let report = crate::validation::replay(&solution, &heap, &config);
        assert!(report.is_valid(), "{:?}", report.violations);

        let report = crate::validation::replay(&solution, &heap, &CompressionConfig::default());
        assert!(report
            .violations
            .contains(&crate::validation::Violation::HeightMismatch {
                column: 1,
                replayed: 1,
                reported: 0
            }));

        let solution = HeuristicStrategy::new()
            .synthesize(&heap, &catalog, &CompressionConfig::default())
            .unwrap();
        assert_eq!(solution.final_heights(), &[1, 1, 1, 0]);
    }

    #[test]
    fn test_variable_width_follows_tuning() {
        let mut row = vec![3; 16];
        row.extend([0, 0]);
        let heap = HeapModel::from_rows(vec![row]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let config = CompressionConfig::default()
            .with_tuning(Tuning::default().with_max_variable_width(2));
        let solution = HeuristicStrategy::new()
            .synthesize(&heap, &catalog, &config)
            .unwrap();
        assert!(solution
            .placements()
            .filter_map(|(_, p)| p.middle_width)
            .all(|w| w <= 2));
        assert!(solution.final_heights().iter().all(|&h| h <= 2));
    }

    #[test]
    fn test_already_final_heap() {
        let heap = HeapModel::from_rows(vec![vec![2, 1, 2]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let solution = HeuristicStrategy::new()
            .synthesize(&heap, &catalog, &CompressionConfig::default())
            .unwrap();
        assert_eq!(solution.stage_count(), 0);
        assert_eq!(solution.total_area(), 0.0);
        assert_eq!(solution.final_heights(), &[2, 1, 2]);
    }

    #[test]
    fn test_pass_through_only_stalls() {
        init();
        let heap = HeapModel::from_rows(vec![vec![5, 0]]);
        let catalog = Catalog::new(Vec::new(), 0.0, Ranking::Efficiency);
        let err = HeuristicStrategy::new()
            .synthesize(&heap, &catalog, &CompressionConfig::default())
            .unwrap_err();
        assert!(matches!(err, CompressionError::Stalled { stage: 0 }));
    }

    #[test]
    fn test_lower_bound_retry_before_stall() {
        let heap = HeapModel::from_rows(vec![vec![3, 0, 0]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let config = CompressionConfig::default().with_lower_bounds(vec![5.0]);
        let mut strategy = HeuristicStrategy::new();
        let solution = strategy.synthesize(&heap, &catalog, &config).unwrap();
        assert_eq!(solution.statistics().stall_retries, 1);
        assert!(solution.final_heights().iter().all(|&h| h <= 2));
    }

    #[test]
    fn test_ternary_adder_needs_fewer_stages() {
        let heap = HeapModel::from_rows(vec![vec![3, 3, 3, 3, 0, 0]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let config = CompressionConfig::default().with_final_adder(FinalAdder::Ternary);
        let solution = HeuristicStrategy::new()
            .synthesize(&heap, &catalog, &config)
            .unwrap();
        assert_eq!(solution.stage_count(), 0);
    }

    #[test]
    fn test_stage_limit() {
        let heap = HeapModel::from_rows(vec![vec![9, 9, 9, 9, 0, 0, 0, 0]]);
        let catalog = Catalog::new(
            vec![Compressor::fixed("fa", vec![3], vec![1, 1], 1.0)],
            0.0,
            Ranking::Efficiency,
        );
        let config =
            CompressionConfig::default().with_tuning(Tuning::default().with_max_stages(1));
        let err = HeuristicStrategy::new()
            .synthesize(&heap, &catalog, &config)
            .unwrap_err();
        assert!(matches!(err, CompressionError::StageLimit { max_stages: 1 }));
    }

    #[test]
    fn test_iteration_cap() {
        let heap = HeapModel::from_rows(vec![vec![9, 0, 0]]);
        let catalog = Catalog::new(
            vec![Compressor::fixed("fa", vec![3], vec![1, 1], 1.0)],
            0.0,
            Ranking::Efficiency,
        );
        let config =
            CompressionConfig::default().with_tuning(Tuning::default().with_max_iterations(1));
        let err = HeuristicStrategy::new()
            .synthesize(&heap, &catalog, &config)
            .unwrap_err();
        assert!(matches!(
            err,
            CompressionError::IterationCap {
                stage: 0,
                iterations: 1
            }
        ));
    }

    #[test]
    fn test_statistics_and_reset() {
        let heap = HeapModel::from_rows(vec![vec![7, 7, 7, 0, 0, 0]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let mut strategy = HeuristicStrategy::new();
        strategy
            .synthesize(&heap, &catalog, &CompressionConfig::default())
            .unwrap();
        let stats = strategy.statistics();
        assert!(stats.placements > 0);
        assert!(stats.candidates_scored > 0);
        strategy.reset();
        assert_eq!(strategy.statistics().placements, 0);
    }
}
