//! Range tracking for modular compression

use crate::catalog::pseudo::{column_weight, residues};
use crate::heap::HeapModel;
use crate::strategy::modular::first_overflow_column;
use std::fmt;

/// Columns of the constant vector, enough to hold any value of `[-modulus, modulus)`
pub fn constant_width(modulus: u64) -> usize {
    first_overflow_column(modulus) + 1
}

/// Provable bounds of the signed value a heap represents
///
/// `constant` is the sum of the negative residues placed so far. It is part of
/// the represented value and already included in `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeState {
    pub min: i128,
    pub max: i128,
    pub constant: i128,
}

impl RangeState {
    /// Range of a heap holding only plain (non-negative) bits
    pub fn from_heap(heap: &HeapModel) -> Self {
        Self {
            min: 0,
            max: heap.max_value(),
            constant: 0,
        }
    }

    /// Whether the range lies inside `[-modulus, modulus)`
    pub fn fits(&self, modulus: u64) -> bool {
        let m = modulus as i128;
        self.min >= -m && self.max < m
    }

    /// How far the range sticks out of `[-modulus, modulus)`
    pub fn overshoot(&self, modulus: u64) -> i128 {
        let m = modulus as i128;
        (self.max - (m - 1)).max(0) + (-m - self.min).max(0)
    }

    /// Range after replacing one bit at `column` by `residue`
    ///
    /// The upper bound never drops below the lower bound.
    pub fn after_residue(&self, column: usize, residue: i64) -> Self {
        let v = column_weight(column);
        let r = residue as i128;
        if r >= 0 {
            Self {
                max: (self.max - v + r).max(self.min),
                ..*self
            }
        } else {
            let min = self.min + r;
            Self {
                min,
                max: (self.max - v).max(min),
                constant: self.constant + r,
            }
        }
    }

    pub fn apply_residue(&mut self, column: usize, residue: i64) {
        *self = self.after_residue(column, residue);
    }

    /// `constant` in two's complement over `constant_width(modulus)` columns
    ///
    /// Each set bit is a constant one the final adder sums with the heap.
    pub fn constant_vector(&self, modulus: u64) -> u64 {
        let wrap = 1i128 << constant_width(modulus);
        self.constant.rem_euclid(wrap) as u64
    }

    /// Pick the residue for a bit at an overflow column
    ///
    /// The non-negative residue is kept while it leaves the upper bound
    /// inside the window. Otherwise the residue with the smaller magnitude
    /// wins, the non-negative one on ties. A negative residue is never taken
    /// if it would push the lower bound under `-modulus`.
    pub fn choose_residue(&self, column: usize, modulus: u64) -> i64 {
        let (positive, negative) = residues(column, modulus);
        if positive == 0 {
            return 0;
        }
        if self.after_residue(column, positive).max < modulus as i128 {
            return positive;
        }
        let floor_ok = self.after_residue(column, negative).min >= -(modulus as i128);
        if floor_ok && negative.unsigned_abs() < positive.unsigned_abs() {
            negative
        } else {
            positive
        }
    }
}

impl fmt::Display for RangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)?;
        if self.constant != 0 {
            write!(f, " (constant {})", self.constant)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_bit_weight_eight_mod_five() {
        let heap = HeapModel::from_rows(vec![vec![0, 0, 0, 1]]);
        let mut range = RangeState::from_heap(&heap);
        assert_eq!(range.max, 8);
        assert!(!range.fits(5));

        let residue = range.choose_residue(3, 5);
        assert_eq!(residue, 3);
        range.apply_residue(3, residue);
        assert_eq!(range.max, 3);
        assert_eq!(range.min, 0);
        assert!(range.fits(5));
    }

    #[test]
    fn test_negative_residue_when_positive_overflows() {
        let range = RangeState {
            min: 0,
            max: 20,
            constant: 0,
        };
        // 8 mod 5: +3 leaves max at 15, -2 has the smaller magnitude
        assert_eq!(range.choose_residue(3, 5), -2);
        let after = range.after_residue(3, -2);
        assert_eq!(after.max, 12);
        assert_eq!(after.min, -2);
        assert_eq!(after.constant, -2);
    }

    #[test]
    fn test_negative_residue_respects_floor() {
        let range = RangeState {
            min: -4,
            max: 20,
            constant: -4,
        };
        assert_eq!(range.choose_residue(3, 5), 3);
    }

    #[test]
    fn test_upper_bound_clamped_to_lower() {
        let range = RangeState {
            min: -3,
            max: 2,
            constant: -3,
        };
        let after = range.after_residue(4, 1);
        assert_eq!(after.max, -3);
        assert_eq!(after.min, -3);
    }

    #[test]
    fn test_zero_residue() {
        let range = RangeState {
            min: 0,
            max: 16,
            constant: 0,
        };
        assert_eq!(range.choose_residue(4, 4), 0);
        assert_eq!(range.after_residue(4, 0).max, 0);
    }

    #[test]
    fn test_constant_vector_is_twos_complement() {
        let range = RangeState {
            min: -2,
            max: 0,
            constant: -2,
        };
        // M = 5 needs 4 columns: -2 = 0b1110
        assert_eq!(constant_width(5), 4);
        assert_eq!(range.constant_vector(5), 0b1110);
        assert_eq!(
            RangeState {
                min: 0,
                max: 3,
                constant: 0
            }
            .constant_vector(5),
            0
        );
    }

    #[test]
    fn test_overshoot() {
        let range = RangeState {
            min: -7,
            max: 6,
            constant: -7,
        };
        assert_eq!(range.overshoot(5), 2 + 2);
        assert_eq!(
            RangeState {
                min: 0,
                max: 4,
                constant: 0
            }
            .overshoot(5),
            0
        );
    }
}
