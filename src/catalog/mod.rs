//! Compressor catalog
//!
//! A catalog is an arena of reduction primitives addressed by [`CompressorId`].
//! It is built once per device (see [`device`]) and only read by the
//! strategies; the modular strategy works on a clone that it extends with
//! synthesized pseudo-compressors (see [`pseudo`]).

pub mod device;
pub mod pseudo;

use crate::error::CatalogViolation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Index of a compressor inside its catalog
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct CompressorId(pub usize);

impl fmt::Display for CompressorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parametrizable middle section of a variable compressor
///
/// A realized variable compressor of middle width `w` has inputs
/// `lower ++ [input_height; w] ++ upper` and the matching outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiddleSection {
    pub input_height: u32,
    pub output_height: i32,
    pub area_per_column: f64,
    pub min_width: usize,
    pub max_width: usize,
}

/// Kind tag of a compressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompressorKind {
    /// Shape is constant
    Fixed,
    /// `inputs`/`outputs` hold the lower section; the middle repeats
    Variable {
        middle: MiddleSection,
        upper_inputs: Vec<u32>,
        upper_outputs: Vec<i32>,
    },
    /// Consumes one bit and produces the binary digits of `residue`,
    /// placed from column 0 regardless of the anchor
    Pseudo { residue: i64 },
}

/// Where a shape's outputs start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputOrigin {
    /// Output offset 0 lands on the anchor column
    Anchor,
    /// Output offset 0 lands on column 0
    Absolute,
}

/// A compressor realized for one middle width
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub inputs: Vec<u32>,
    pub outputs: Vec<i32>,
    pub origin: OutputOrigin,
    pub area: f64,
}

impl Shape {
    pub fn input_total(&self) -> u32 {
        self.inputs.iter().sum()
    }

    /// Number of output bits; inverted outputs count like plain ones
    pub fn output_total(&self) -> u32 {
        self.outputs.iter().map(|o| o.unsigned_abs()).sum()
    }

    /// First output column for a placement anchored at `column`
    pub fn output_base(&self, column: usize) -> usize {
        match self.origin {
            OutputOrigin::Anchor => column,
            OutputOrigin::Absolute => 0,
        }
    }

    /// Offsets of zero outputs flanked by non-zero outputs
    pub fn interior_holes(&self) -> Vec<usize> {
        let first = self.outputs.iter().position(|&o| o != 0);
        let last = self.outputs.iter().rposition(|&o| o != 0);
        match (first, last) {
            (Some(first), Some(last)) => (first..=last)
                .filter(|&i| self.outputs[i] == 0)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A reduction primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compressor {
    pub name: String,
    /// Input heights from the anchor column upward (lower section for variable kinds)
    pub inputs: Vec<u32>,
    /// Output heights at the next stage; negative entries are inverted bits
    pub outputs: Vec<i32>,
    pub area: f64,
    #[serde(flatten)]
    pub kind: CompressorKind,
}

impl Compressor {
    /// Create a fixed-shape compressor
    pub fn fixed(name: impl Into<String>, inputs: Vec<u32>, outputs: Vec<i32>, area: f64) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
            area,
            kind: CompressorKind::Fixed,
        }
    }

    /// Create a variable compressor from its lower, middle and upper sections
    pub fn variable(
        name: impl Into<String>,
        lower: (Vec<u32>, Vec<i32>),
        middle: MiddleSection,
        upper: (Vec<u32>, Vec<i32>),
        area: f64,
    ) -> Self {
        Self {
            name: name.into(),
            inputs: lower.0,
            outputs: lower.1,
            area,
            kind: CompressorKind::Variable {
                middle,
                upper_inputs: upper.0,
                upper_outputs: upper.1,
            },
        }
    }

    /// The 1-input/1-output register or wire that carries a bit unchanged
    pub fn pass_through(area: f64) -> Self {
        Self::fixed("pass", vec![1], vec![1], area)
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self.kind, CompressorKind::Fixed) && self.inputs == [1] && self.outputs == [1]
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, CompressorKind::Variable { .. })
    }

    pub fn is_pseudo(&self) -> bool {
        matches!(self.kind, CompressorKind::Pseudo { .. })
    }

    /// Middle widths this compressor can be realized with
    pub fn middle_widths(&self) -> RangeInclusive<usize> {
        match &self.kind {
            CompressorKind::Variable { middle, .. } => middle.min_width..=middle.max_width,
            _ => 0..=0,
        }
    }

    /// Realize the compressor; `middle_width` is ignored for non-variable kinds
    pub fn realize(&self, middle_width: usize) -> Shape {
        match &self.kind {
            CompressorKind::Fixed => Shape {
                inputs: self.inputs.clone(),
                outputs: self.outputs.clone(),
                origin: OutputOrigin::Anchor,
                area: self.area,
            },
            CompressorKind::Variable {
                middle,
                upper_inputs,
                upper_outputs,
            } => {
                let mut inputs = self.inputs.clone();
                inputs.extend(std::iter::repeat(middle.input_height).take(middle_width));
                inputs.extend_from_slice(upper_inputs);

                let mut outputs = self.outputs.clone();
                outputs.extend(std::iter::repeat(middle.output_height).take(middle_width));
                outputs.extend_from_slice(upper_outputs);

                Shape {
                    inputs,
                    outputs,
                    origin: OutputOrigin::Anchor,
                    area: self.area + middle.area_per_column * middle_width as f64,
                }
            }
            CompressorKind::Pseudo { .. } => Shape {
                inputs: self.inputs.clone(),
                outputs: self.outputs.clone(),
                origin: OutputOrigin::Absolute,
                area: self.area,
            },
        }
    }

    /// Bits removed per unit area when every input is filled
    pub fn nominal_efficiency(&self) -> f64 {
        self.sample_widths()
            .map(|w| {
                let shape = self.realize(w);
                if shape.area <= 0.0 {
                    0.0
                } else {
                    (shape.input_total() as f64 - shape.output_total() as f64) / shape.area
                }
            })
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Classic input/output ratio at the narrowest width
    pub fn compression_ratio(&self) -> f64 {
        let shape = self.realize(*self.middle_widths().start());
        let out = shape.output_total();
        if out == 0 {
            f64::INFINITY
        } else {
            shape.input_total() as f64 / out as f64
        }
    }

    fn sample_widths(&self) -> impl Iterator<Item = usize> {
        let widths = self.middle_widths();
        let start = *widths.start();
        let end = (*widths.end()).min(start + 32);
        start..=end
    }

    /// Check the catalog contract
    pub fn check(&self) -> Result<(), CatalogViolation> {
        let violation = |reason: &str| Err(CatalogViolation::new(self.name.clone(), reason));

        if !self.area.is_finite() || self.area < 0.0 {
            return violation("area must be finite and non-negative");
        }
        if self.inputs.iter().all(|&h| h == 0) && !self.is_variable() {
            return violation("compressor has no inputs");
        }

        let mut all_outputs: Vec<i32> = self.outputs.clone();
        match &self.kind {
            CompressorKind::Fixed => {}
            CompressorKind::Variable {
                middle,
                upper_outputs,
                ..
            } => {
                if self.area <= 0.0 {
                    return violation("variable compressor with zero area");
                }
                if !middle.area_per_column.is_finite() || middle.area_per_column < 0.0 {
                    return violation("middle section area must be finite and non-negative");
                }
                if middle.min_width > middle.max_width {
                    return violation("middle section minimum width exceeds its maximum");
                }
                all_outputs.push(middle.output_height);
                all_outputs.extend_from_slice(upper_outputs);
            }
            CompressorKind::Pseudo { .. } => {
                if self.area <= 0.0 {
                    return violation("pseudo-compressor with zero area");
                }
            }
        }

        let positive = all_outputs.iter().any(|&o| o > 0);
        let negative = all_outputs.iter().any(|&o| o < 0);
        if positive && negative {
            return violation("non-constant output sign");
        }
        if negative && !self.is_pseudo() {
            return violation("inverted outputs are reserved for pseudo-compressors");
        }

        if !self.is_pass_through() && !self.is_pseudo() {
            let widths = self.middle_widths();
            for w in [*widths.start(), *widths.end()] {
                let shape = self.realize(w);
                if shape.input_total() == 0 {
                    return violation("compressor has no inputs");
                }
                if shape.output_total() > shape.input_total() {
                    return violation("produces more bits than it consumes");
                }
            }
        }

        Ok(())
    }
}

/// Ordering applied to a device's primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ranking {
    /// Descending bits removed per unit area
    #[default]
    Efficiency,
    /// Descending input/output bit ratio
    Ratio,
}

impl fmt::Display for Ranking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ranking::Efficiency => write!(f, "efficiency"),
            Ranking::Ratio => write!(f, "ratio"),
        }
    }
}

impl std::str::FromStr for Ranking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "efficiency" | "eff" => Ok(Ranking::Efficiency),
            "ratio" | "classic" => Ok(Ranking::Ratio),
            _ => Err(format!(
                "Unknown ranking: '{}'. Valid options: efficiency, ratio",
                s
            )),
        }
    }
}

/// Ranked, read-only list of compressors with the pass-through last
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    compressors: Vec<Compressor>,
    pass_through: CompressorId,
}

impl Catalog {
    /// Rank `primitives` and append the pass-through with the given area
    pub fn new(mut primitives: Vec<Compressor>, pass_through_area: f64, ranking: Ranking) -> Self {
        primitives.retain(|c| !c.is_pass_through());
        match ranking {
            Ranking::Efficiency => primitives
                .sort_by(|a, b| b.nominal_efficiency().total_cmp(&a.nominal_efficiency())),
            Ranking::Ratio => primitives
                .sort_by(|a, b| b.compression_ratio().total_cmp(&a.compression_ratio())),
        }
        let pass_through = CompressorId(primitives.len());
        primitives.push(Compressor::pass_through(pass_through_area));
        Self {
            compressors: primitives,
            pass_through,
        }
    }

    pub fn len(&self) -> usize {
        self.compressors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compressors.is_empty()
    }

    pub fn get(&self, id: CompressorId) -> Option<&Compressor> {
        self.compressors.get(id.0)
    }

    pub fn pass_through(&self) -> CompressorId {
        self.pass_through
    }

    pub fn iter(&self) -> impl Iterator<Item = (CompressorId, &Compressor)> {
        self.compressors
            .iter()
            .enumerate()
            .map(|(i, c)| (CompressorId(i), c))
    }

    pub fn find(&self, name: &str) -> Option<CompressorId> {
        self.compressors
            .iter()
            .position(|c| c.name == name)
            .map(CompressorId)
    }

    /// Append a compressor (used for synthesized pseudo-compressors)
    pub fn push(&mut self, compressor: Compressor) -> CompressorId {
        self.compressors.push(compressor);
        CompressorId(self.compressors.len() - 1)
    }

    /// Compressors the scorer may place, in ranked order
    ///
    /// Contract violations are returned alongside and the offending
    /// compressors are left out. The pass-through and pseudo-compressors are
    /// never scored.
    pub fn scorable(&self) -> (Vec<CompressorId>, Vec<CatalogViolation>) {
        let mut usable = Vec::new();
        let mut violations = Vec::new();
        for (id, compressor) in self.iter() {
            if id == self.pass_through || compressor.is_pseudo() {
                continue;
            }
            match compressor.check() {
                Ok(()) => usable.push(id),
                Err(v) => {
                    log::warn!("{}", v);
                    violations.push(v);
                }
            }
        }
        (usable, violations)
    }
}

impl std::ops::Index<CompressorId> for Catalog {
    type Output = Compressor;

    fn index(&self, id: CompressorId) -> &Compressor {
        &self.compressors[id.0]
    }
}
