//! Random and structured heap generation for validation

use crate::heap::HeapModel;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Configuration for random heap generation
#[derive(Debug, Clone)]
pub struct RandomHeapConfig {
    /// Number of weight columns
    pub width: usize,
    /// Tallest column a stage can receive
    pub max_height: u32,
    /// Stages that receive input bits
    pub stages: usize,
    /// Probability that a column of a later stage receives bits
    pub late_density: f64,
    /// Random seed (None = seed from the OS)
    pub seed: Option<u64>,
}

impl Default for RandomHeapConfig {
    fn default() -> Self {
        RandomHeapConfig {
            width: 8,
            max_height: 8,
            stages: 1,
            late_density: 0.25,
            seed: None,
        }
    }
}

impl RandomHeapConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn with_max_height(mut self, height: u32) -> Self {
        self.max_height = height;
        self
    }

    pub fn with_stages(mut self, stages: usize) -> Self {
        self.stages = stages.max(1);
        self
    }
}

/// Generate a random heap
///
/// Stage 0 draws every column uniformly from `0..=max_height`. Later stages
/// receive a few bits in sparse columns. The top column is left empty so
/// carries out of the heap stay rare.
pub fn random_heap(config: &RandomHeapConfig) -> HeapModel {
    let mut rng: ChaCha8Rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_os_rng(),
    };
    let max_height = i32::try_from(config.max_height).unwrap_or(i32::MAX);
    let filled = config.width.saturating_sub(1);
    let mut rows = vec![vec![0; config.width]; config.stages.max(1)];
    for count in rows[0].iter_mut().take(filled) {
        *count = rng.random_range(0..=max_height);
    }
    for row in rows.iter_mut().skip(1) {
        for count in row.iter_mut().take(filled) {
            if rng.random_bool(config.late_density.clamp(0.0, 1.0)) {
                *count = rng.random_range(1..=max_height.clamp(1, 3));
            }
        }
    }
    HeapModel::from_rows(rows)
}

/// Partial-product heap of an unsigned `a_bits` x `b_bits` multiplier
pub fn multiplier_heap(a_bits: usize, b_bits: usize) -> HeapModel {
    let mut row = vec![0; a_bits + b_bits];
    for i in 0..a_bits {
        for j in 0..b_bits {
            row[i + j] += 1;
        }
    }
    HeapModel::from_rows(vec![row])
}
