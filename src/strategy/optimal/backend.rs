//! Solver backend interface

use crate::error::CompressionError;
use crate::strategy::optimal::model::IlpModel;
use std::time::Duration;

/// Result of one backend solve
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    /// An optimal assignment, one value per model variable
    Optimal { values: Vec<i64>, objective: i64 },
    Infeasible,
    /// Timeout or an undecided result
    Unknown(String),
}

impl SolveOutcome {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveOutcome::Optimal { .. })
    }
}

/// A solver that minimizes an [`IlpModel`]
pub trait IlpBackend {
    fn name(&self) -> &str;

    /// Solve `model`, giving up after `timeout` when set
    fn solve(
        &mut self,
        model: &IlpModel,
        timeout: Option<Duration>,
    ) -> Result<SolveOutcome, CompressionError>;
}
