//! Target device model
//!
//! The device decides which primitives exist and what they cost. Costs are in
//! LUT-equivalents of a 6-input LUT FPGA with a fast carry chain.

use crate::catalog::{Catalog, Compressor, MiddleSection, Ranking};

/// Area of the pass-through on a pipelined target (one register)
pub const PIPELINED_PASS_THROUGH_AREA: f64 = 0.5;

/// A target device exposing a compressor catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: String,
    pub pipelined: bool,
    primitives: Vec<Compressor>,
}

impl Device {
    /// A device with a custom primitive list
    pub fn new(name: impl Into<String>, pipelined: bool, primitives: Vec<Compressor>) -> Self {
        Self {
            name: name.into(),
            pipelined,
            primitives,
        }
    }

    /// Generic 6-LUT device with carry chains
    pub fn generic(pipelined: bool) -> Self {
        Self::new("generic-lut6", pipelined, default_primitives())
    }

    pub fn with_pipelined(mut self, pipelined: bool) -> Self {
        self.pipelined = pipelined;
        self
    }

    /// Cost of carrying one bit unchanged to the next stage
    pub fn pass_through_area(&self) -> f64 {
        if self.pipelined {
            PIPELINED_PASS_THROUGH_AREA
        } else {
            0.0
        }
    }

    pub fn primitives(&self) -> &[Compressor] {
        &self.primitives
    }

    /// The ranked catalog for this device
    pub fn catalog(&self, ranking: Ranking) -> Catalog {
        Catalog::new(self.primitives.clone(), self.pass_through_area(), ranking)
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::generic(false)
    }
}

/// Primitives of the generic device
pub fn default_primitives() -> Vec<Compressor> {
    vec![
        Compressor::fixed("fa", vec![3], vec![1, 1], 1.0),
        Compressor::fixed("ha", vec![2], vec![1, 1], 1.0),
        Compressor::fixed("6:3", vec![6], vec![1, 1, 1], 3.0),
        Compressor::fixed("(1,5;3)", vec![5, 1], vec![1, 1, 1], 3.0),
        Compressor::fixed("(1,4,1,5;5)", vec![5, 1, 4, 1], vec![1, 1, 1, 1, 1], 4.0),
        Compressor::variable(
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
        ),
    ]
}
