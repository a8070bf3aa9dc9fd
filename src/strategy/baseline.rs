//! First-fit baseline compression
//!
//! Columns are visited by descending height. For a column over capacity the
//! first catalog compressor that yields a valid placement is looked up twice,
//! once anchored on the column and once ending on it, and the more efficient
//! of the two is committed.

use crate::catalog::Catalog;
use crate::error::CompressionError;
use crate::heap::HeapModel;
use crate::scoring::{Anchor, Candidate, Scorer};
use crate::solution::{Solution, SynthesisStatistics};
use crate::strategy::config::{CompressionConfig, Mode};
use crate::strategy::{run_stages, CompressionStrategy, StagePolicy, Workspace};
use std::time::Instant;

/// First-fit baseline strategy
pub struct BaselineStrategy {
    statistics: SynthesisStatistics,
}

impl BaselineStrategy {
    pub fn new() -> Self {
        Self {
            statistics: SynthesisStatistics::new(Mode::Baseline),
        }
    }
}

impl Default for BaselineStrategy {
    fn default() -> Self {
        Self::new()
    }
}

struct FirstFitPolicy {
    scorer: Scorer,
    epsilon: f64,
}

impl FirstFitPolicy {
    /// Left placement unless the right one is strictly better
    fn pick(&self, left: Option<Candidate>, right: Option<Candidate>) -> Option<Candidate> {
        match (left, right) {
            (Some(l), Some(r)) => {
                if r.efficiency > l.efficiency + self.epsilon {
                    Some(r)
                } else {
                    Some(l)
                }
            }
            (l, r) => l.or(r),
        }
    }
}

impl StagePolicy for FirstFitPolicy {
    fn reduce(
        &mut self,
        work: &mut Workspace,
        stage: usize,
        lower_bound: f64,
        config: &CompressionConfig,
    ) -> Result<u64, CompressionError> {
        let capacity = config.capacity();
        let cap = config.tuning.max_iterations_per_stage;
        let mut committed = 0usize;

        for column in work.heap.columns_by_height(stage) {
            while work.heap.height(stage, column) > 0
                && work.heap.remaining_in_column(stage, column) > capacity as u64
            {
                let catalog = work.solution.catalog();
                let left = self.scorer.first_fit(
                    catalog,
                    &work.heap,
                    stage,
                    column,
                    Anchor::Left,
                    lower_bound,
                    capacity,
                );
                let right = self.scorer.first_fit(
                    catalog,
                    &work.heap,
                    stage,
                    column,
                    Anchor::Right,
                    lower_bound,
                    capacity,
                );
                let Some(candidate) = self.pick(left, right) else {
                    break;
                };
                if committed >= cap {
                    return Err(CompressionError::IterationCap {
                        stage,
                        iterations: committed,
                    });
                }
                work.commit(stage, candidate.placement())?;
                committed += 1;
            }
        }
        Ok(committed as u64)
    }
}

impl CompressionStrategy for BaselineStrategy {
    fn synthesize(
        &mut self,
        heap: &HeapModel,
        catalog: &Catalog,
        config: &CompressionConfig,
    ) -> Result<Solution, CompressionError> {
        config.validate()?;
        let start = Instant::now();
        let mut policy = FirstFitPolicy {
            scorer: Scorer::new(catalog, config.tuning.epsilon)
                .with_max_width(config.tuning.max_variable_width),
            epsilon: config.tuning.epsilon,
        };
        let mut work = Workspace::new(heap.clone(), catalog, Mode::Baseline, config.allow_holes);
        work.stats.rejected_compressors = policy.scorer.violations().len() as u64;

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
        self.statistics = SynthesisStatistics::new(Mode::Baseline);
    }
}
