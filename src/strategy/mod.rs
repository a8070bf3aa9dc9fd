//! Compression strategies
//!
//! This module provides the strategies that turn a bit heap into a
//! compression tree:
//! - Heuristic: stage-by-stage placement of the most efficient compressor
//! - Baseline: per-column first-fit placement
//! - Modular: the heuristic extended with pseudo-compressors for a modulus
//! - Optimal: exact integer-program formulation behind a solver backend
//! - Hybrid: heuristic first, then the exact search bounded by its result

pub mod baseline;
pub mod config;
pub mod heuristic;
pub mod hybrid;
pub mod modular;
pub mod optimal;

pub use baseline::BaselineStrategy;
pub use config::{CompressionConfig, FinalAdder, Mode, OptimalConfig, Tuning};
pub use heuristic::HeuristicStrategy;
pub use hybrid::HybridStrategy;
pub use modular::ModularStrategy;
pub use optimal::OptimalStrategy;

use crate::catalog::Catalog;
use crate::error::CompressionError;
use crate::heap::HeapModel;
use crate::solution::{Placement, Solution, SynthesisStatistics};

/// Trait for strategies that synthesize a compression tree
pub trait CompressionStrategy {
    /// Reduce `heap` to the final-adder shape using compressors of `catalog`
    ///
    /// The heap is cloned into a working copy; the caller's heap and catalog
    /// are left untouched.
    fn synthesize(
        &mut self,
        heap: &HeapModel,
        catalog: &Catalog,
        config: &CompressionConfig,
    ) -> Result<Solution, CompressionError>;

    /// Get statistics from the most recent synthesis
    fn statistics(&self) -> SynthesisStatistics;

    /// Reset the strategy state for a new synthesis
    fn reset(&mut self);
}

/// Strategy implementing `config.mode`
///
/// A heuristic run with a modulus configured becomes the modular strategy.
/// The exact and hybrid modes need a solver backend compiled in.
pub fn for_config(
    config: &CompressionConfig,
) -> Result<Box<dyn CompressionStrategy>, CompressionError> {
    match config.mode {
        Mode::Heuristic if config.modulus.is_some() => Ok(Box::new(ModularStrategy::new())),
        Mode::Heuristic => Ok(Box::new(HeuristicStrategy::new())),
        Mode::Baseline => Ok(Box::new(BaselineStrategy::new())),
        Mode::Modular => Ok(Box::new(ModularStrategy::new())),
        #[cfg(feature = "has-z3")]
        Mode::Optimal => Ok(Box::new(OptimalStrategy::new(Box::new(
            optimal::z3_backend::Z3Backend::new(),
        )))),
        #[cfg(feature = "has-z3")]
        Mode::Hybrid => Ok(Box::new(HybridStrategy::new(OptimalStrategy::new(
            Box::new(optimal::z3_backend::Z3Backend::new()),
        )))),
        #[cfg(not(feature = "has-z3"))]
        Mode::Optimal | Mode::Hybrid => Err(CompressionError::NoSolverBackend),
    }
}

/// Synthesize with the strategy selected by `config`
pub fn synthesize(
    heap: &HeapModel,
    catalog: &Catalog,
    config: &CompressionConfig,
) -> Result<Solution, CompressionError> {
    config.validate()?;
    let mut strategy = for_config(config)?;
    strategy.synthesize(heap, catalog, config)
}

/// Working state of a stage-by-stage strategy
#[derive(Debug, Clone)]
pub(crate) struct Workspace {
    pub heap: HeapModel,
    pub solution: Solution,
    pub stats: SynthesisStatistics,
    allow_holes: bool,
}

impl Workspace {
    pub fn new(heap: HeapModel, catalog: &Catalog, mode: Mode, allow_holes: bool) -> Self {
        Self {
            heap,
            solution: Solution::new(catalog.clone()),
            stats: SynthesisStatistics::new(mode),
            allow_holes,
        }
    }

    /// Consume the inputs of `placement` at `stage` and emit its outputs at `stage + 1`
    pub fn commit(&mut self, stage: usize, placement: Placement) -> Result<(), CompressionError> {
        let compressor = self
            .solution
            .catalog()
            .get(placement.compressor)
            .ok_or_else(|| {
                CompressionError::InvalidConfig(format!(
                    "unknown compressor {}",
                    placement.compressor
                ))
            })?;
        let shape = compressor.realize(placement.middle_width.unwrap_or(0));
        let pseudo = compressor.is_pseudo();
        log::debug!(
            "stage {}: {} @ column {}",
            stage,
            compressor.name,
            placement.column
        );

        self.heap.consume(stage, placement.column, &shape.inputs);
        let holes = if self.allow_holes {
            shape.interior_holes()
        } else {
            Vec::new()
        };
        let base = shape.output_base(placement.column);
        let dropped = self.heap.produce(stage + 1, base, &shape.outputs, &holes);

        self.stats.dropped_bits += dropped as u64;
        if pseudo {
            self.stats.pseudo_placements += 1;
        } else {
            self.stats.placements += 1;
        }
        self.solution.push(stage, placement);
        Ok(())
    }

    /// Carry the bits left at `stage` forward as pass-through placements
    pub fn carry_leftovers(&mut self, stage: usize) {
        let pass = self.solution.catalog().pass_through();
        for (column, count) in self.heap.close_stage(stage) {
            for _ in 0..count {
                self.solution.push(stage, Placement::new(pass, column));
            }
            self.stats.pass_throughs += count as u64;
        }
    }

    /// Finalize the solution with the heights of `final_stage`
    pub fn finish(mut self, final_stage: usize) -> Solution {
        let heights = self
            .heap
            .row(final_stage)
            .iter()
            .map(|&h| h.max(0))
            .collect();
        *self.solution.statistics_mut() = self.stats;
        self.solution.finalize(heights);
        self.solution
    }
}

/// Per-stage behavior of a stage-by-stage strategy
pub(crate) trait StagePolicy {
    /// Whether `stage` is the final stage
    fn is_final(&self, heap: &HeapModel, stage: usize, config: &CompressionConfig) -> bool {
        heap.within_capacity(stage, config.capacity()) && heap.later_stages_empty(stage)
    }

    /// Commit the placements of `stage`; returns how many were committed
    fn reduce(
        &mut self,
        work: &mut Workspace,
        stage: usize,
        lower_bound: f64,
        config: &CompressionConfig,
    ) -> Result<u64, CompressionError>;
}

/// Run `policy` stage by stage until the heap reaches its final shape
///
/// Returns the final stage. A stage that commits nothing while no later bits
/// are pending is retried with a zero lower bound, then reported as stalled.
pub(crate) fn run_stages<P: StagePolicy>(
    policy: &mut P,
    work: &mut Workspace,
    config: &CompressionConfig,
) -> Result<usize, CompressionError> {
    let mut stage = 0;
    loop {
        if policy.is_final(&work.heap, stage, config) {
            log::info!("reached final shape at stage {}", stage);
            return Ok(stage);
        }
        if stage >= config.tuning.max_stages {
            return Err(CompressionError::StageLimit {
                max_stages: config.tuning.max_stages,
            });
        }

        let lower_bound = config.lower_bound(stage);
        let mut committed = policy.reduce(work, stage, lower_bound, config)?;
        if committed == 0 && work.heap.later_stages_empty(stage) {
            if lower_bound > 0.0 {
                log::debug!(
                    "stage {}: nothing beats lower bound {}, retrying with 0",
                    stage,
                    lower_bound
                );
                work.stats.stall_retries += 1;
                committed = policy.reduce(work, stage, 0.0, config)?;
            }
            if committed == 0 {
                return Err(CompressionError::Stalled { stage });
            }
        }
        log::debug!("stage {}: {} placements", stage, committed);

        work.carry_leftovers(stage);
        stage += 1;
    }
}
