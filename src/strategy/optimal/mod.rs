//! Exact compression-tree synthesis
//!
//! The stage count is fixed per attempt: the strategy formulates an integer
//! program for the smallest plausible stage count, hands it to the backend,
//! and moves one stage up on every infeasible or undecided attempt.

pub mod backend;
pub mod formulation;
pub mod model;
#[cfg(feature = "has-z3")]
pub mod z3_backend;

pub use backend::{IlpBackend, SolveOutcome};
pub use formulation::{scaled_area, Formulation};
pub use model::{IlpModel, Relation, VarId};

use crate::catalog::Catalog;
use crate::error::CompressionError;
use crate::heap::HeapModel;
use crate::solution::{Solution, SynthesisStatistics};
use crate::strategy::config::{CompressionConfig, Mode};
use crate::strategy::CompressionStrategy;
use std::fs::File;
use std::io::BufWriter;
use std::time::Instant;

/// Limits taken from a known solution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolutionBound {
    /// Scaled area the exact solution may not exceed
    pub objective: i64,
    /// Stage count the exact search may not exceed
    pub stages: usize,
}

impl SolutionBound {
    pub fn from_solution(solution: &Solution, area_scale: f64) -> Self {
        let objective = solution
            .placements()
            .filter_map(|(_, p)| p.shape(solution.catalog()))
            .map(|shape| scaled_area(shape.area, area_scale))
            .sum();
        Self {
            objective,
            stages: solution.stage_count(),
        }
    }
}

/// Fewest stages any tree can use: bits arriving late must still pass
/// through, and a column over capacity needs at least one reduction
pub fn minimal_stages(heap: &HeapModel, capacity: u32) -> usize {
    let last = heap.last_input_stage();
    let fits = (0..heap.width()).all(|c| heap.remaining_in_column(0, c) <= capacity as u64);
    if fits {
        last
    } else {
        last + 1
    }
}

/// Exact strategy over a pluggable solver backend
pub struct OptimalStrategy {
    backend: Box<dyn IlpBackend>,
    bound: Option<SolutionBound>,
    statistics: SynthesisStatistics,
}

impl OptimalStrategy {
    pub fn new(backend: Box<dyn IlpBackend>) -> Self {
        Self {
            backend,
            bound: None,
            statistics: SynthesisStatistics::new(Mode::Optimal),
        }
    }

    pub fn with_bound(mut self, bound: Option<SolutionBound>) -> Self {
        self.bound = bound;
        self
    }

    pub fn set_bound(&mut self, bound: Option<SolutionBound>) {
        self.bound = bound;
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn stage_budget(&self, heap: &HeapModel, config: &CompressionConfig) -> (usize, usize) {
        let first = minimal_stages(heap, config.capacity());
        let mut last = config
            .optimal
            .max_stages
            .unwrap_or(first + config.tuning.extra_exact_stages);
        if let Some(bound) = self.bound {
            last = last.min(bound.stages);
        }
        (first, last)
    }

    fn dump(&self, formulation: &Formulation, config: &CompressionConfig) -> Result<(), CompressionError> {
        let Some(path) = &config.optimal.lp_dump else {
            return Ok(());
        };
        let mut out = BufWriter::new(File::create(path)?);
        formulation.model().write_lp(&mut out)?;
        log::info!(
            "exact: wrote {}-stage model to {}",
            formulation.stages(),
            path.display()
        );
        Ok(())
    }
}

impl CompressionStrategy for OptimalStrategy {
    fn synthesize(
        &mut self,
        heap: &HeapModel,
        catalog: &Catalog,
        config: &CompressionConfig,
    ) -> Result<Solution, CompressionError> {
        config.validate()?;
        let start = Instant::now();
        let mut stats = SynthesisStatistics::new(Mode::Optimal);

        let (mut usable, violations) = catalog.scorable();
        usable.push(catalog.pass_through());
        stats.rejected_compressors = violations.len() as u64;

        let (first, last) = self.stage_budget(heap, config);
        let objective_bound = self.bound.map(|b| b.objective);
        log::info!(
            "exact: {} backend, stages {}..={}, bound {:?}",
            self.backend.name(),
            first,
            last,
            objective_bound
        );

        for stages in first..=last {
            let formulation =
                Formulation::build(heap, catalog, &usable, config, stages, objective_bound)?;
            self.dump(&formulation, config)?;
            log::debug!(
                "exact: {} stages, {} variables, {} constraints",
                stages,
                formulation.model().variables().len(),
                formulation.model().constraints().len()
            );

            stats.solver_calls += 1;
            stats.trial_stages.push(stages);
            let outcome = self
                .backend
                .solve(formulation.model(), config.optimal.solver_timeout)?;
            match outcome {
                SolveOutcome::Optimal { values, objective } => {
                    log::info!("exact: {} stages, objective {}", stages, objective);
                    let mut solution =
                        formulation.decode(&values, heap, catalog, config, Mode::Optimal)?;
                    let decoded = solution.statistics().clone();
                    stats.placements = decoded.placements;
                    stats.pass_throughs = decoded.pass_throughs;
                    stats.pseudo_placements = decoded.pseudo_placements;
                    stats.dropped_bits = decoded.dropped_bits;
                    stats.stages = decoded.stages;
                    stats.elapsed_time = start.elapsed();
                    *solution.statistics_mut() = stats.clone();
                    self.statistics = stats;
                    return Ok(solution);
                }
                SolveOutcome::Infeasible => {
                    log::debug!("exact: {} stages infeasible", stages);
                }
                SolveOutcome::Unknown(reason) => {
                    log::info!("exact: {} stages undecided ({})", stages, reason);
                }
            }
        }

        stats.elapsed_time = start.elapsed();
        self.statistics = stats;
        Err(CompressionError::Infeasible { max_stages: last })
    }

    fn statistics(&self) -> SynthesisStatistics {
        self.statistics.clone()
    }

    fn reset(&mut self) {
        self.statistics = SynthesisStatistics::new(Mode::Optimal);
    }
}
