//! Compression-tree synthesis for bit heaps
//!
//! A bit heap is a set of weighted bits to be summed. This crate reduces it,
//! stage by stage, to a shape a final carry-propagate adder accepts, by
//! placing compressors from a device catalog. Strategies range from a greedy
//! efficiency heuristic to an exact integer-program search, with a modular
//! variant that folds high weights back below a modulus.

pub mod catalog;
pub mod error;
pub mod heap;
pub mod io;
pub mod scoring;
pub mod solution;
pub mod strategy;
pub mod validation;

pub use catalog::device::Device;
pub use catalog::{Catalog, Compressor, CompressorId, Ranking};
pub use error::CompressionError;
pub use heap::HeapModel;
pub use solution::{Placement, Solution, SynthesisStatistics};
pub use strategy::{synthesize, CompressionConfig, CompressionStrategy, FinalAdder, Mode};
