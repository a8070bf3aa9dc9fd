//! Efficiency scoring of candidate placements
//!
//! A candidate is a compressor anchored at a column of one stage. Its
//! efficiency is the number of bits it removes per unit area:
//!
//! ```text
//! covered    = Σ_i min(max(bits[stage][column + i], 0), inputs[i])
//! reduced    = covered - output bits
//! efficiency = reduced / area
//! ```

use crate::catalog::{Catalog, CompressorId, Shape};
use crate::error::CatalogViolation;
use crate::heap::HeapModel;
use crate::solution::Placement;

/// A scored placement candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub compressor: CompressorId,
    /// Anchor column (offset 0 of the inputs)
    pub column: usize,
    /// Realized middle width, `None` for non-variable compressors
    pub middle_width: Option<usize>,
    pub efficiency: f64,
    pub covered: u32,
    pub reduced: i64,
}

impl Candidate {
    pub fn placement(&self) -> Placement {
        Placement::new(self.compressor, self.column).with_middle_width(self.middle_width)
    }
}

/// Which end of a compressor lands on the column being reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Input offset 0 on the column, the rest toward higher weights
    Left,
    /// Last input offset on the column
    Right,
}

/// Bits an input pattern anchored at `column` would consume
pub fn covered_bits(heap: &HeapModel, stage: usize, column: usize, inputs: &[u32]) -> u32 {
    inputs
        .iter()
        .enumerate()
        .map(|(i, &want)| {
            let c = column + i;
            if c >= heap.width() {
                0
            } else {
                (heap.height(stage, c).max(0) as u32).min(want)
            }
        })
        .sum()
}

/// Efficiency, covered and reduced bits of a shape at `column`
///
/// Returns `None` for shapes without a positive area.
pub fn efficiency(
    heap: &HeapModel,
    stage: usize,
    column: usize,
    shape: &Shape,
) -> Option<(f64, u32, i64)> {
    if shape.area <= 0.0 {
        return None;
    }
    let covered = covered_bits(heap, stage, column, &shape.inputs);
    let reduced = covered as i64 - shape.output_total() as i64;
    Some((reduced as f64 / shape.area, covered, reduced))
}

/// Whether a covered column still holds more than `capacity` bits
/// across this and every later stage
pub fn is_necessary(
    heap: &HeapModel,
    stage: usize,
    column: usize,
    inputs: &[u32],
    capacity: u32,
) -> bool {
    inputs.iter().enumerate().any(|(i, &want)| {
        let c = column + i;
        c < heap.width()
            && want > 0
            && heap.height(stage, c) > 0
            && heap.remaining_in_column(stage, c) > capacity as u64
    })
}

/// Searches a catalog for the best placement at one stage
#[derive(Debug, Clone)]
pub struct Scorer {
    usable: Vec<CompressorId>,
    violations: Vec<CatalogViolation>,
    epsilon: f64,
    max_width: usize,
    scored: u64,
}

impl Scorer {
    /// Build a scorer over the compressors of `catalog` that pass the contract
    pub fn new(catalog: &Catalog, epsilon: f64) -> Self {
        let (usable, violations) = catalog.scorable();
        Self {
            usable,
            violations,
            epsilon,
            max_width: usize::MAX,
            scored: 0,
        }
    }

    /// Cap the middle widths tried for variable compressors
    pub fn with_max_width(mut self, width: usize) -> Self {
        self.max_width = width;
        self
    }

    pub fn usable(&self) -> &[CompressorId] {
        &self.usable
    }

    pub fn violations(&self) -> &[CatalogViolation] {
        &self.violations
    }

    /// Number of (compressor, column, width) triples scored so far
    pub fn scored(&self) -> u64 {
        self.scored
    }

    /// Best valid and necessary realization of one compressor at `column`
    ///
    /// Variable compressors are tried at every middle width up to the heap
    /// width or the scorer's cap, whichever is smaller; a wider realization
    /// must beat a narrower one by more than epsilon.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &mut self,
        catalog: &Catalog,
        heap: &HeapModel,
        stage: usize,
        id: CompressorId,
        column: usize,
        anchor: Anchor,
        lower_bound: f64,
        capacity: u32,
    ) -> Option<Candidate> {
        let compressor = catalog.get(id)?;
        let widths = compressor.middle_widths();
        let first = *widths.start();
        let last = (*widths.end())
            .min(heap.width().max(first))
            .min(self.max_width.max(first));

        let mut best: Option<Candidate> = None;
        for width in first..=last {
            let shape = compressor.realize(width);
            let anchor_column = match anchor {
                Anchor::Left => column,
                Anchor::Right => match (column + 1).checked_sub(shape.inputs.len()) {
                    Some(c) => c,
                    None => continue,
                },
            };
            self.scored += 1;
            let Some((eff, covered, reduced)) = efficiency(heap, stage, anchor_column, &shape)
            else {
                continue;
            };
            if eff <= lower_bound + self.epsilon {
                continue;
            }
            if !is_necessary(heap, stage, anchor_column, &shape.inputs, capacity) {
                continue;
            }
            let better = best
                .as_ref()
                .map_or(true, |b| eff > b.efficiency + self.epsilon);
            if better {
                best = Some(Candidate {
                    compressor: id,
                    column: anchor_column,
                    middle_width: compressor.is_variable().then_some(width),
                    efficiency: eff,
                    covered,
                    reduced,
                });
            }
        }
        best
    }

    /// Highest-efficiency valid and necessary candidate of the stage
    ///
    /// Columns are visited by descending height, the catalog in ranked order.
    pub fn best(
        &mut self,
        catalog: &Catalog,
        heap: &HeapModel,
        stage: usize,
        lower_bound: f64,
        capacity: u32,
    ) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        let usable = self.usable.clone();
        for column in heap.columns_by_height(stage) {
            for &id in &usable {
                let Some(candidate) = self.evaluate(
                    catalog,
                    heap,
                    stage,
                    id,
                    column,
                    Anchor::Left,
                    lower_bound,
                    capacity,
                ) else {
                    continue;
                };
                let better = best
                    .as_ref()
                    .map_or(true, |b| candidate.efficiency > b.efficiency + self.epsilon);
                if better {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// First compressor in ranked order that yields a candidate at `column`
    #[allow(clippy::too_many_arguments)]
    pub fn first_fit(
        &mut self,
        catalog: &Catalog,
        heap: &HeapModel,
        stage: usize,
        column: usize,
        anchor: Anchor,
        lower_bound: f64,
        capacity: u32,
    ) -> Option<Candidate> {
        let usable = self.usable.clone();
        usable.into_iter().find_map(|id| {
            self.evaluate(
                catalog,
                heap,
                stage,
                id,
                column,
                anchor,
                lower_bound,
                capacity,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::device::Device;
    use crate::catalog::{Compressor, MiddleSection, Ranking};

    const EPS: f64 = 1e-4;

    fn catalog_of(primitives: Vec<Compressor>) -> Catalog {
        Catalog::new(primitives, 0.0, Ranking::Efficiency)
    }

    #[test]
    fn test_covered_bits_ignores_holes_and_overflow() {
        let mut heap = HeapModel::from_rows(vec![vec![4, 1, 0]]);
        heap.produce(0, 2, &[0], &[0]);
        assert_eq!(heap.height(0, 2), -1);
        assert_eq!(covered_bits(&heap, 0, 0, &[3, 2, 2]), 4);
        assert_eq!(covered_bits(&heap, 0, 2, &[1, 5]), 0);
    }

    #[test]
    fn test_efficiency_of_full_adder() {
        let heap = HeapModel::from_rows(vec![vec![3, 0]]);
        let fa = Compressor::fixed("fa", vec![3], vec![1, 1], 1.0).realize(0);
        let (eff, covered, reduced) = efficiency(&heap, 0, 0, &fa).unwrap();
        assert_eq!(covered, 3);
        assert_eq!(reduced, 1);
        assert!((eff - 1.0).abs() < EPS);
    }

    #[test]
    fn test_zero_area_cannot_be_scored() {
        let heap = HeapModel::from_rows(vec![vec![3]]);
        let pass = Compressor::pass_through(0.0).realize(0);
        assert!(efficiency(&heap, 0, 0, &pass).is_none());
    }

    #[test]
    fn test_necessity_counts_later_stages() {
        let heap = HeapModel::from_rows(vec![vec![2, 0], vec![1, 0]]);
        assert!(is_necessary(&heap, 0, 0, &[3], 2));
        assert!(!is_necessary(&heap, 0, 0, &[3], 3));
        assert!(!is_necessary(&heap, 0, 1, &[3], 0));
    }

    #[test]
    fn test_best_prefers_tallest_column() {
        let catalog = catalog_of(vec![Compressor::fixed("fa", vec![3], vec![1, 1], 1.0)]);
        let heap = HeapModel::from_rows(vec![vec![3, 5, 0, 0]]);
        let mut scorer = Scorer::new(&catalog, EPS);
        let best = scorer.best(&catalog, &heap, 0, 0.0, 2).unwrap();
        assert_eq!(best.column, 1);
        assert_eq!(best.middle_width, None);
        assert!(scorer.scored() > 0);
    }

    #[test]
    fn test_half_adder_never_valid_at_zero_bound() {
        let catalog = catalog_of(vec![Compressor::fixed("ha", vec![2], vec![1, 1], 1.0)]);
        let heap = HeapModel::from_rows(vec![vec![5, 0]]);
        let mut scorer = Scorer::new(&catalog, EPS);
        assert!(scorer.best(&catalog, &heap, 0, 0.0, 2).is_none());
        assert!(scorer.best(&catalog, &heap, 0, -1.0, 2).is_some());
    }

    #[test]
    fn test_variable_ties_keep_narrowest_width() {
        let catalog = catalog_of(vec![Compressor::variable(
            "rca",
            (vec![3], vec![1]),
            MiddleSection {
                input_height: 2,
                output_height: 1,
                area_per_column: 1.0,
                min_width: 0,
                max_width: 8,
            },
            (vec![2], vec![1, 1]),
            2.0,
        )]);
        let heap = HeapModel::from_rows(vec![vec![3, 3, 3, 3, 3, 0, 0]]);
        let mut scorer = Scorer::new(&catalog, EPS);
        let best = scorer.best(&catalog, &heap, 0, 0.0, 2).unwrap();
        assert_eq!(best.middle_width, Some(0));
        assert!((best.efficiency - 1.0).abs() < EPS);
    }

    #[test]
    fn test_width_cap_bounds_variable_realizations() {
        let catalog = catalog_of(vec![Compressor::variable(
            "rca",
            (vec![3], vec![1]),
            MiddleSection {
                input_height: 2,
                output_height: 1,
                area_per_column: 1.0,
                min_width: 0,
                max_width: 64,
            },
            (vec![2], vec![1, 1]),
            2.0,
        )]);
        let rca = catalog.find("rca").unwrap();
        let heap = HeapModel::from_rows(vec![vec![3; 40]]);

        let mut scorer = Scorer::new(&catalog, EPS);
        scorer.evaluate(&catalog, &heap, 0, rca, 0, Anchor::Left, 0.0, 2);
        assert_eq!(scorer.scored(), 41);

        let mut capped = Scorer::new(&catalog, EPS).with_max_width(4);
        let best = capped
            .evaluate(&catalog, &heap, 0, rca, 0, Anchor::Left, 0.0, 2)
            .unwrap();
        assert_eq!(capped.scored(), 5);
        assert!(best.middle_width.is_some_and(|w| w <= 4));
    }

    #[test]
    fn test_first_fit_right_anchor() {
        let catalog = catalog_of(vec![Compressor::fixed(
            "(1,5;3)",
            vec![5, 1],
            vec![1, 1, 1],
            3.0,
        )]);
        let heap = HeapModel::from_rows(vec![vec![5, 4, 0, 0]]);
        let mut scorer = Scorer::new(&catalog, EPS);
        let right = scorer
            .first_fit(&catalog, &heap, 0, 1, Anchor::Right, 0.0, 2)
            .unwrap();
        assert_eq!(right.column, 0);
        assert_eq!(right.covered, 6);
        assert!(scorer
            .first_fit(&catalog, &heap, 0, 0, Anchor::Right, 0.0, 2)
            .is_none());
    }

    #[test]
    fn test_default_device_picks_gpc() {
        let catalog = Device::default().catalog(Ranking::Efficiency);
        let heap = HeapModel::from_rows(vec![vec![5, 1, 4, 1, 0, 0, 0, 0]]);
        let mut scorer = Scorer::new(&catalog, EPS);
        let best = scorer.best(&catalog, &heap, 0, 0.0, 2).unwrap();
        assert_eq!(catalog[best.compressor].name, "(1,4,1,5;5)");
        assert_eq!(best.column, 0);
        assert_eq!(best.reduced, 6);
    }
}
