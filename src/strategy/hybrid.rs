//! Heuristic first, then the exact search bounded by its result

use crate::catalog::Catalog;
use crate::error::CompressionError;
use crate::heap::HeapModel;
use crate::solution::{Solution, SynthesisStatistics};
use crate::strategy::config::{CompressionConfig, Mode};
use crate::strategy::optimal::{OptimalStrategy, SolutionBound};
use crate::strategy::{CompressionStrategy, HeuristicStrategy, ModularStrategy};
use std::time::Instant;

/// Two-phase strategy: a greedy solution bounds the exact search
pub struct HybridStrategy {
    exact: OptimalStrategy,
    statistics: SynthesisStatistics,
}

impl HybridStrategy {
    pub fn new(exact: OptimalStrategy) -> Self {
        Self {
            exact,
            statistics: SynthesisStatistics::new(Mode::Hybrid),
        }
    }

    fn greedy(
        &self,
        heap: &HeapModel,
        catalog: &Catalog,
        config: &CompressionConfig,
    ) -> (Result<Solution, CompressionError>, SynthesisStatistics) {
        let mut strategy: Box<dyn CompressionStrategy> = if config.modulus.is_some() {
            Box::new(ModularStrategy::new())
        } else {
            Box::new(HeuristicStrategy::new())
        };
        let result = strategy.synthesize(heap, catalog, config);
        (result, strategy.statistics())
    }
}

impl CompressionStrategy for HybridStrategy {
    fn synthesize(
        &mut self,
        heap: &HeapModel,
        catalog: &Catalog,
        config: &CompressionConfig,
    ) -> Result<Solution, CompressionError> {
        config.validate()?;
        let start = Instant::now();
        let mut stats = SynthesisStatistics::new(Mode::Hybrid);

        let (greedy, greedy_stats) = self.greedy(heap, catalog, config);
        stats.absorb(&greedy_stats);
        let greedy = match greedy {
            Ok(solution) => Some(solution),
            Err(e) => {
                log::info!("hybrid: greedy phase failed ({}), exact search unbounded", e);
                None
            }
        };

        let bound = greedy
            .as_ref()
            .map(|s| SolutionBound::from_solution(s, config.optimal.area_scale));
        self.exact.set_bound(bound);
        let exact = self.exact.synthesize(heap, catalog, config);
        stats.absorb(&self.exact.statistics());

        let mut chosen = match (exact, greedy) {
            (Ok(exact), Some(greedy)) => {
                if exact.total_area() <= greedy.total_area() + config.tuning.epsilon {
                    log::info!(
                        "hybrid: exact area {} against greedy {}",
                        exact.total_area(),
                        greedy.total_area()
                    );
                    exact
                } else {
                    greedy
                }
            }
            (Ok(exact), None) => exact,
            (Err(CompressionError::Infeasible { max_stages }), Some(greedy)) => {
                log::info!(
                    "hybrid: nothing within {} stages, keeping greedy solution",
                    max_stages
                );
                greedy
            }
            (Err(e), _) => return Err(e),
        };

        let picked = chosen.statistics().clone();
        stats.placements = picked.placements;
        stats.pass_throughs = picked.pass_throughs;
        stats.pseudo_placements = picked.pseudo_placements;
        stats.dropped_bits = picked.dropped_bits;
        stats.stages = picked.stages;
        stats.elapsed_time = start.elapsed();
        *chosen.statistics_mut() = stats.clone();
        self.statistics = stats;
        Ok(chosen)
    }

    fn statistics(&self) -> SynthesisStatistics {
        self.statistics.clone()
    }

    fn reset(&mut self) {
        self.exact.reset();
        self.statistics = SynthesisStatistics::new(Mode::Hybrid);
    }
}
