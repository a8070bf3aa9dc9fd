//! Pseudo-compressors for modular reduction
//!
//! A pseudo-compressor takes one bit of weight `2^c` and replaces it with the
//! binary digits of a residue `r ≡ 2^c (mod M)`. For a negative residue the
//! digits of `|r|` are driven by the inverted bit and `r` is added to the
//! heap constant, so every output still counts as an ordinary bit.

use crate::catalog::{Catalog, Compressor, CompressorId, CompressorKind};
use crate::error::CatalogViolation;
use std::collections::HashMap;

/// Area charged per output bit of a pseudo-compressor
pub const PSEUDO_AREA_PER_BIT: f64 = 0.125;

/// Widest column whose weight fits the range arithmetic
pub const MAX_MODULAR_COLUMN: usize = 120;

/// Weight of a column
pub fn column_weight(column: usize) -> i128 {
    1i128 << column
}

/// The non-negative residue of `2^column` and its negative congruent
pub fn residues(column: usize, modulus: u64) -> (i64, i64) {
    let m = modulus as i128;
    let positive = column_weight(column).rem_euclid(m);
    (positive as i64, (positive - m) as i64)
}

/// Build the pseudo-compressor for a bit at `column` mapped to `residue`
pub fn pseudo_compressor(column: usize, residue: i64) -> Compressor {
    let magnitude = residue.unsigned_abs();
    let sign = if residue < 0 { -1 } else { 1 };
    let width = (u64::BITS - magnitude.leading_zeros()) as usize;
    let outputs: Vec<i32> = (0..width)
        .map(|j| if (magnitude >> j) & 1 == 1 { sign } else { 0 })
        .collect();
    let bits = magnitude.count_ones().max(1);

    Compressor {
        name: format!(
            "pseudo_c{}_{}{}",
            column,
            if residue < 0 { "m" } else { "p" },
            magnitude
        ),
        inputs: vec![1],
        outputs,
        area: PSEUDO_AREA_PER_BIT * bits as f64,
        kind: CompressorKind::Pseudo { residue },
    }
}

/// Lookup table of pseudo-compressors already added to a working catalog
#[derive(Debug, Default, Clone)]
pub struct PseudoCache {
    entries: HashMap<(usize, i64), CompressorId>,
}

impl PseudoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the compressor for `(column, residue)` or synthesize and register it
    pub fn get_or_insert(
        &mut self,
        catalog: &mut Catalog,
        column: usize,
        residue: i64,
    ) -> Result<CompressorId, CatalogViolation> {
        if let Some(&id) = self.entries.get(&(column, residue)) {
            return Ok(id);
        }
        let compressor = pseudo_compressor(column, residue);
        compressor.check()?;
        let id = catalog.push(compressor);
        self.entries.insert((column, residue), id);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{OutputOrigin, Ranking};

    #[test]
    fn test_residues_of_eight_mod_five() {
        assert_eq!(residues(3, 5), (3, -2));
        assert_eq!(residues(2, 4), (0, -4));
    }

    #[test]
    fn test_pseudo_outputs_positive_residue() {
        let c = pseudo_compressor(3, 3);
        assert_eq!(c.outputs, vec![1, 1]);
        assert_eq!(c.inputs, vec![1]);
        assert!(c.check().is_ok());
        assert_eq!(c.realize(0).origin, OutputOrigin::Absolute);
    }

    #[test]
    fn test_pseudo_outputs_negative_residue() {
        let c = pseudo_compressor(3, -2);
        assert_eq!(c.outputs, vec![0, -1]);
        assert!(c.check().is_ok());
        assert_eq!(c.realize(0).output_total(), 1);
    }

    #[test]
    fn test_zero_residue_drops_the_bit() {
        let c = pseudo_compressor(4, 0);
        assert!(c.outputs.is_empty());
        assert!(c.area > 0.0);
    }

    #[test]
    fn test_cache_reuses_entries() {
        let mut catalog = Catalog::new(Vec::new(), 0.0, Ranking::Efficiency);
        let mut cache = PseudoCache::new();
        let a = cache.get_or_insert(&mut catalog, 3, 3).unwrap();
        let b = cache.get_or_insert(&mut catalog, 3, 3).unwrap();
        let c = cache.get_or_insert(&mut catalog, 3, -2).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(cache.len(), 2);
        assert_eq!(catalog.len(), 3);
    }
}
