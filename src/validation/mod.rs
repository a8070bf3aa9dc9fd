//! Validation utilities: solution replay and heap generation

pub mod check;
pub mod random;

pub use check::{replay, ReplayReport, StageAccount, Violation};
pub use random::{multiplier_heap, random_heap, RandomHeapConfig};
