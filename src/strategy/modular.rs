//! Modular-arithmetic compression
//!
//! The heap only has to stay congruent to its sum modulo `M`. Bits of weight
//! at least `M` (overflow columns) are replaced by pseudo-compressors that
//! emit the binary digits of a residue, and the provable range of the heap
//! value is tracked until it fits in `[-M, M)`. The heap is growable so
//! carries are never dropped.

use crate::catalog::pseudo::{column_weight, residues, PseudoCache, MAX_MODULAR_COLUMN};
use crate::catalog::Catalog;
use crate::error::CompressionError;
use crate::heap::{HeapModel, RangeState};
use crate::scoring::Scorer;
use crate::solution::{ModularSummary, Placement, Solution, SynthesisStatistics};
use crate::strategy::config::{CompressionConfig, Mode};
use crate::strategy::heuristic::greedy_reduce;
use crate::strategy::{run_stages, CompressionStrategy, StagePolicy, Workspace};
use std::time::Instant;

/// Greedy strategy with modular reduction
pub struct ModularStrategy {
    statistics: SynthesisStatistics,
}

impl ModularStrategy {
    pub fn new() -> Self {
        Self {
            statistics: SynthesisStatistics::new(Mode::Modular),
        }
    }
}

impl Default for ModularStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowest column whose weight reaches `modulus`
pub fn first_overflow_column(modulus: u64) -> usize {
    (0..MAX_MODULAR_COLUMN)
        .find(|&c| column_weight(c) >= modulus as i128)
        .unwrap_or(MAX_MODULAR_COLUMN)
}

/// Whether `column` is in the upper half of the residue window
pub fn in_upper_window(column: usize, modulus: u64) -> bool {
    let v = column_weight(column);
    let m = modulus as i128;
    v < m && 2 * v > m
}

pub(crate) struct ModularPolicy {
    scorer: Scorer,
    modulus: u64,
    overflow: usize,
    range: RangeState,
    cache: PseudoCache,
}

impl ModularPolicy {
    pub fn new(scorer: Scorer, modulus: u64, heap: &HeapModel) -> Self {
        Self {
            scorer,
            modulus,
            overflow: first_overflow_column(modulus),
            range: RangeState::from_heap(heap),
            cache: PseudoCache::new(),
        }
    }

    pub fn range(&self) -> &RangeState {
        &self.range
    }

    /// Whether the constant-one bits fit beside the bits of `stage`
    fn constant_fits(&self, heap: &HeapModel, stage: usize, capacity: u32) -> bool {
        ModularSummary::new(self.modulus, &self.range)
            .crowded_columns(heap.row(stage), capacity)
            .is_empty()
    }

    /// Whether any overflow column holds a bit at `stage` or later
    fn overflow_remaining(&self, heap: &HeapModel, stage: usize) -> bool {
        (stage..heap.stage_count())
            .any(|s| (self.overflow..heap.width()).any(|c| heap.height(s, c) > 0))
    }

    fn place_pseudo(
        &mut self,
        work: &mut Workspace,
        stage: usize,
        column: usize,
        residue: i64,
    ) -> Result<(), CompressionError> {
        let id = self
            .cache
            .get_or_insert(work.solution.catalog_mut(), column, residue)
            .map_err(|v| CompressionError::InvalidConfig(v.to_string()))?;
        self.range.apply_residue(column, residue);
        work.commit(stage, Placement::new(id, column))
    }

    /// Replace the bits of sparse overflow columns, highest column first
    fn pseudo_prepass(
        &mut self,
        work: &mut Workspace,
        stage: usize,
        max_bits: u32,
    ) -> Result<u64, CompressionError> {
        let mut placed = 0;
        for column in (self.overflow..work.heap.width()).rev() {
            let height = work.heap.height(stage, column);
            if height < 1 || height as u32 > max_bits {
                continue;
            }
            for _ in 0..height {
                let residue = self.range.choose_residue(column, self.modulus);
                self.place_pseudo(work, stage, column, residue)?;
                placed += 1;
            }
        }
        Ok(placed)
    }

    /// Give upper-window bits negative residues while that shrinks the overshoot
    /// and keeps the lower bound at or above `-modulus`
    fn range_repair(&mut self, work: &mut Workspace, stage: usize) -> Result<u64, CompressionError> {
        let mut placed = 0;
        let top = self.overflow.min(work.heap.width());
        for column in (0..top).rev() {
            if !in_upper_window(column, self.modulus) {
                continue;
            }
            while work.heap.height(stage, column) > 0 {
                let (_, negative) = residues(column, self.modulus);
                let next = self.range.after_residue(column, negative);
                if next.overshoot(self.modulus) >= self.range.overshoot(self.modulus)
                    || next.min < -(self.modulus as i128)
                {
                    return Ok(placed);
                }
                self.place_pseudo(work, stage, column, negative)?;
                placed += 1;
            }
        }
        Ok(placed)
    }
}

impl StagePolicy for ModularPolicy {
    fn is_final(&self, heap: &HeapModel, stage: usize, config: &CompressionConfig) -> bool {
        heap.within_capacity(stage, config.capacity())
            && heap.later_stages_empty(stage)
            && self.range.fits(self.modulus)
            && self.constant_fits(heap, stage, config.capacity())
    }

    fn reduce(
        &mut self,
        work: &mut Workspace,
        stage: usize,
        lower_bound: f64,
        config: &CompressionConfig,
    ) -> Result<u64, CompressionError> {
        let mut committed = self.pseudo_prepass(work, stage, config.capacity())?;

        let settled = !self.overflow_remaining(&work.heap, stage);
        if settled && !self.range.fits(self.modulus) {
            committed += self.range_repair(work, stage)?;
        }

        // Range mode: every column is pushed down to one bit, zero-gain
        // placements included, so carries reach the overflow columns.
        let range_mode =
            !self.range.fits(self.modulus) && !self.overflow_remaining(&work.heap, stage);
        // Constant-one bits take a final-adder row in their columns
        let crowded = !range_mode
            && work.heap.within_capacity(stage, config.capacity())
            && !self.constant_fits(&work.heap, stage, config.capacity());
        let relaxed = lower_bound.min(0.0) - 2.0 * config.tuning.epsilon;
        let (capacity, bound) = if range_mode {
            log::debug!(
                "stage {}: range {} outside modulus, capacity 1",
                stage,
                self.range
            );
            (1, relaxed)
        } else if crowded {
            let capacity = config.capacity().saturating_sub(1).max(1);
            log::debug!(
                "stage {}: constant {} crowds the final adder, capacity {}",
                stage,
                self.range.constant,
                capacity
            );
            (capacity, relaxed)
        } else {
            (config.capacity(), lower_bound)
        };
        committed += greedy_reduce(&mut self.scorer, work, stage, bound, capacity, config)?;
        Ok(committed)
    }
}

impl CompressionStrategy for ModularStrategy {
    fn synthesize(
        &mut self,
        heap: &HeapModel,
        catalog: &Catalog,
        config: &CompressionConfig,
    ) -> Result<Solution, CompressionError> {
        config.validate()?;
        let modulus = config.modulus.ok_or(CompressionError::MissingModulus)?;
        if heap.width() > MAX_MODULAR_COLUMN {
            return Err(CompressionError::InvalidConfig(format!(
                "heap width {} exceeds the modular limit of {} columns",
                heap.width(),
                MAX_MODULAR_COLUMN
            )));
        }
        let start = Instant::now();

        let working = heap.clone().with_growable(true);
        let mut policy = ModularPolicy::new(
            Scorer::new(catalog, config.tuning.epsilon)
                .with_max_width(config.tuning.max_variable_width),
            modulus,
            &working,
        );
        let mut work = Workspace::new(working, catalog, Mode::Modular, config.allow_holes);
        work.stats.rejected_compressors = policy.scorer.violations().len() as u64;
        log::info!(
            "modular: modulus {}, initial range {}",
            modulus,
            policy.range()
        );

        let result = run_stages(&mut policy, &mut work, config);
        work.stats.candidates_scored = policy.scorer.scored();
        work.stats.elapsed_time = start.elapsed();
        self.statistics = work.stats.clone();

        let final_stage = result?;
        let summary = ModularSummary::new(modulus, policy.range());
        log::info!("modular: final range {}", policy.range());
        let mut solution = work.finish(final_stage);
        solution.set_modular(summary);
        self.statistics = solution.statistics().clone();
        Ok(solution)
    }

    fn statistics(&self) -> SynthesisStatistics {
        self.statistics.clone()
    }

    fn reset(&mut self) {
        self.statistics = SynthesisStatistics::new(Mode::Modular);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::device::Device;
    use crate::catalog::Ranking;
    use test_case::test_case;

    fn modular_config(modulus: u64) -> CompressionConfig {
        CompressionConfig::default()
            .with_mode(Mode::Modular)
            .with_modulus(modulus)
    }

    #[test_case(5, 3; "five")]
    #[test_case(8, 3; "eight")]
    #[test_case(7, 3; "seven")]
    #[test_case(16, 4; "sixteen")]
    fn test_first_overflow_column(modulus: u64, expected: usize) {
        assert_eq!(first_overflow_column(modulus), expected);
    }

    #[test]
    fn test_upper_window() {
        // M = 5: weights 1, 2, 4; only 4 is above M / 2
        assert!(in_upper_window(2, 5));
        assert!(!in_upper_window(1, 5));
        assert!(!in_upper_window(3, 5));
    }

    #[test]
    fn test_single_bit_of_weight_eight_mod_five() {
        let _ = env_logger::builder().is_test(true).try_init();
        let heap = HeapModel::from_rows(vec![vec![0, 0, 0, 1]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let solution = ModularStrategy::new()
            .synthesize(&heap, &catalog, &modular_config(5))
            .unwrap();

        let placed = solution.stage(0);
        assert_eq!(placed.len(), 1);
        let pseudo = &solution.catalog()[placed[0].compressor];
        assert!(pseudo.is_pseudo());
        assert_eq!(pseudo.outputs, vec![1, 1]);

        let summary = solution.modular().unwrap();
        assert_eq!(summary.range_max, 3);
        assert_eq!(summary.range_min, 0);
        assert!(summary.fits());
        assert_eq!(solution.statistics().pseudo_placements, 1);
        assert_eq!(solution.final_heights(), &[1, 1, 0, 0]);
    }

    #[test]
    fn test_negative_residues_leave_constant_bits() {
        let heap = HeapModel::from_rows(vec![vec![0, 0, 3, 1]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let config = modular_config(5);
        let solution = ModularStrategy::new()
            .synthesize(&heap, &catalog, &config)
            .unwrap();

        // 8 takes -2, then two of the 4s take -1
        let summary = solution.modular().unwrap();
        assert_eq!((summary.range_min, summary.range_max), (-4, 4));
        assert_eq!(summary.constant, -4);
        assert_eq!(summary.constant_bits, 0b1100);
        assert_eq!(solution.final_heights(), &[2, 1, 1, 0]);
        assert!(summary.crowded_columns(solution.final_heights(), 2).is_empty());

        let report = crate::validation::replay(&solution, &heap, &config);
        assert!(report.is_valid(), "{:?}", report.violations);
    }

    #[test]
    fn test_constant_bits_block_final_stage() {
        let heap = HeapModel::from_rows(vec![vec![0, 0, 2, 0]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let config = modular_config(5);
        let mut policy = ModularPolicy::new(Scorer::new(&catalog, 1e-4), 5, &heap);
        policy.range = RangeState {
            min: -4,
            max: 4,
            constant: -4,
        };
        // Column 2 holds two bits and a constant one
        assert!(!policy.is_final(&heap, 0, &config));

        let heap = HeapModel::from_rows(vec![vec![2, 0, 1, 0]]);
        assert!(policy.is_final(&heap, 0, &config));
        let ternary = config.with_final_adder(crate::strategy::config::FinalAdder::Ternary);
        assert!(policy.is_final(&HeapModel::from_rows(vec![vec![0, 0, 2, 0]]), 0, &ternary));
    }

    #[test]
    fn test_zero_residue_drops_bit() {
        let heap = HeapModel::from_rows(vec![vec![1, 0, 1]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let solution = ModularStrategy::new()
            .synthesize(&heap, &catalog, &modular_config(4))
            .unwrap();
        let summary = solution.modular().unwrap();
        assert_eq!(summary.range_max, 1);
        assert_eq!(solution.final_heights(), &[1, 0, 0]);
    }

    #[test]
    fn test_wide_heap_fits_modulus() {
        let heap = HeapModel::from_rows(vec![vec![3, 3, 3, 3, 3, 3]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let solution = ModularStrategy::new()
            .synthesize(&heap, &catalog, &modular_config(13))
            .unwrap();
        let summary = solution.modular().unwrap();
        assert!(summary.fits());
        assert!(solution.final_heights().iter().all(|&h| h <= 2));
    }

    #[test]
    fn test_missing_modulus() {
        let heap = HeapModel::from_rows(vec![vec![1]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let config = CompressionConfig::default().with_mode(Mode::Modular);
        assert!(matches!(
            ModularStrategy::new().synthesize(&heap, &catalog, &config),
            Err(CompressionError::MissingModulus)
        ));
    }

    #[test]
    fn test_caller_catalog_untouched() {
        let heap = HeapModel::from_rows(vec![vec![0, 0, 0, 2]]);
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let before = catalog.len();
        let solution = ModularStrategy::new()
            .synthesize(&heap, &catalog, &modular_config(5))
            .unwrap();
        assert_eq!(catalog.len(), before);
        assert!(solution.catalog().len() > before);
    }
}
