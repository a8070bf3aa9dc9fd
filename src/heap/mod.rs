//! Heap model: bit counts per pipeline stage and weight column
//!
//! `bits[stage][column]` holds the number of bits waiting at that position. A
//! negative count is a hole: a slot reserved by an earlier compressor output
//! row that a later bit can fill. The model keeps the matrix it was populated
//! with so an attempt can be restored or replayed.

pub mod range;

pub use range::{constant_width, RangeState};

use crate::catalog::pseudo::column_weight;
use crate::error::CompressionError;

/// Dense `[stage][column]` matrix of signed bit counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapModel {
    width: usize,
    bits: Vec<Vec<i32>>,
    original: Vec<Vec<i32>>,
    growable: bool,
}

impl HeapModel {
    /// An empty heap with a single stage
    pub fn new(width: usize) -> Self {
        let rows = vec![vec![0; width]];
        Self {
            width,
            bits: rows.clone(),
            original: rows,
            growable: false,
        }
    }

    /// Build from explicit rows; the width is the longest row
    pub fn from_rows(rows: Vec<Vec<i32>>) -> Self {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut heap = Self::new(width);
        for (stage, row) in rows.iter().enumerate() {
            for (column, &count) in row.iter().enumerate() {
                if count > 0 {
                    heap.ensure_stage(stage);
                    heap.bits[stage][column] = count;
                }
            }
        }
        heap.original = heap.bits.clone();
        heap
    }

    /// Let outputs past the top column widen the heap instead of being dropped
    pub fn with_growable(mut self, growable: bool) -> Self {
        self.growable = growable;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn stage_count(&self) -> usize {
        self.bits.len()
    }

    pub fn is_growable(&self) -> bool {
        self.growable
    }

    /// Populate the heap with `count` input bits
    ///
    /// Input bits define the heap, so both the working matrix and the
    /// retained original are updated. A column taller than `i32::MAX` is
    /// rejected and leaves the heap unchanged.
    pub fn add_bits(
        &mut self,
        stage: usize,
        column: usize,
        count: u32,
    ) -> Result<(), CompressionError> {
        let too_tall = || {
            CompressionError::InvalidConfig(format!(
                "column {} at stage {} would exceed {} bits",
                column,
                stage,
                i32::MAX
            ))
        };
        let count = i32::try_from(count).map_err(|_| too_tall())?;
        let total = self
            .original
            .get(stage)
            .and_then(|row| row.get(column))
            .copied()
            .unwrap_or(0)
            .checked_add(count)
            .ok_or_else(too_tall)?;
        let working = self.height(stage, column).checked_add(count).ok_or_else(too_tall)?;
        self.ensure_stage(stage);
        self.ensure_width(column + 1);
        while self.original.len() <= stage {
            self.original.push(vec![0; self.width]);
        }
        self.bits[stage][column] = working;
        self.original[stage][column] = total;
        Ok(())
    }

    pub fn ensure_stage(&mut self, stage: usize) {
        while self.bits.len() <= stage {
            self.bits.push(vec![0; self.width]);
        }
    }

    pub fn ensure_width(&mut self, width: usize) {
        if width <= self.width {
            return;
        }
        self.width = width;
        for row in self.bits.iter_mut().chain(self.original.iter_mut()) {
            row.resize(width, 0);
        }
    }

    /// Count at a position; positions outside the matrix read as 0
    pub fn height(&self, stage: usize, column: usize) -> i32 {
        self.bits
            .get(stage)
            .and_then(|row| row.get(column))
            .copied()
            .unwrap_or(0)
    }

    pub fn row(&self, stage: usize) -> &[i32] {
        self.bits.get(stage).map(|r| r.as_slice()).unwrap_or(&[])
    }

    pub fn rows(&self) -> &[Vec<i32>] {
        &self.bits
    }

    /// Real bits at a stage (holes ignored)
    pub fn stage_total(&self, stage: usize) -> u64 {
        self.row(stage).iter().map(|&h| h.max(0) as u64).sum()
    }

    pub fn total_bits(&self) -> u64 {
        (0..self.stage_count()).map(|s| self.stage_total(s)).sum()
    }

    /// Real bits in `column` at `stage` and every later stage
    pub fn remaining_in_column(&self, stage: usize, column: usize) -> u64 {
        (stage..self.stage_count())
            .map(|s| self.height(s, column).max(0) as u64)
            .sum()
    }

    /// Whether every column of `stage` holds at most `capacity` bits
    pub fn within_capacity(&self, stage: usize, capacity: u32) -> bool {
        self.row(stage).iter().all(|&h| h <= capacity as i32)
    }

    /// Whether no real bit waits at a stage after `stage`
    pub fn later_stages_empty(&self, stage: usize) -> bool {
        (stage + 1..self.stage_count()).all(|s| self.stage_total(s) == 0)
    }

    /// Last stage of the original matrix holding an input bit
    pub fn last_input_stage(&self) -> usize {
        self.original
            .iter()
            .rposition(|row| row.iter().any(|&h| h > 0))
            .unwrap_or(0)
    }

    /// Columns of `stage` by descending height; ties keep the lower column first
    pub fn columns_by_height(&self, stage: usize) -> Vec<usize> {
        let row = self.row(stage);
        let mut columns: Vec<usize> = (0..self.width).collect();
        columns.sort_by(|&a, &b| {
            let ha = row.get(a).copied().unwrap_or(0);
            let hb = row.get(b).copied().unwrap_or(0);
            hb.cmp(&ha)
        });
        columns
    }

    /// Remove the bits an input pattern anchored at `column` covers
    ///
    /// Returns the covered count per input offset.
    pub fn consume(&mut self, stage: usize, column: usize, inputs: &[u32]) -> Vec<u32> {
        self.ensure_stage(stage);
        let width = self.width;
        let row = &mut self.bits[stage];
        inputs
            .iter()
            .enumerate()
            .map(|(i, &want)| {
                let c = column + i;
                if c >= width {
                    return 0;
                }
                let take = (row[c].max(0) as u32).min(want);
                row[c] -= take as i32;
                take
            })
            .collect()
    }

    /// Add an output pattern starting at column `base` of `stage`
    ///
    /// Interior holes listed in `holes` reserve a slot. Returns the number of
    /// output bits that fell past the top column and were dropped.
    pub fn produce(&mut self, stage: usize, base: usize, outputs: &[i32], holes: &[usize]) -> u32 {
        self.ensure_stage(stage);
        if self.growable {
            let top = outputs
                .iter()
                .rposition(|&o| o != 0)
                .map(|i| base + i + 1)
                .unwrap_or(0);
            self.ensure_width(top);
        }
        let width = self.width;
        let row = &mut self.bits[stage];
        let mut dropped = 0;
        for (i, &o) in outputs.iter().enumerate() {
            let c = base + i;
            let count = o.unsigned_abs();
            if count == 0 {
                continue;
            }
            if c >= width {
                dropped += count;
                continue;
            }
            row[c] += count as i32;
        }
        for &i in holes {
            let c = base + i;
            if c < width {
                row[c] -= 1;
            }
        }
        dropped
    }

    /// Move the bits left at `stage` to the next stage and discard its holes
    ///
    /// Returns the moved `(column, count)` pairs.
    pub fn close_stage(&mut self, stage: usize) -> Vec<(usize, u32)> {
        self.ensure_stage(stage + 1);
        let mut moved = Vec::new();
        for column in 0..self.width {
            let h = self.bits[stage][column];
            if h > 0 {
                self.bits[stage + 1][column] += h;
                moved.push((column, h as u32));
            }
            self.bits[stage][column] = 0;
        }
        moved
    }

    /// Largest value the real bits can represent
    pub fn max_value(&self) -> i128 {
        let mut total = 0i128;
        for row in &self.bits {
            for (column, &h) in row.iter().enumerate() {
                if h > 0 {
                    total += h as i128 * column_weight(column);
                }
            }
        }
        total
    }

    pub fn original(&self) -> &[Vec<i32>] {
        &self.original
    }

    /// Make the current matrix the retained original
    pub fn checkpoint(&mut self) {
        self.original = self.bits.clone();
    }

    /// Discard every change since the last checkpoint
    pub fn restore(&mut self) {
        self.bits = self.original.clone();
        for row in &mut self.bits {
            row.resize(self.width, 0);
        }
    }
}
