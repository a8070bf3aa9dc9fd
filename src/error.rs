//! Error types for compression-tree synthesis

use std::fmt;

/// Errors that abort a synthesis call
#[derive(Debug)]
pub enum CompressionError {
    /// The exact model had no feasible assignment within the stage budget
    Infeasible { max_stages: usize },
    /// A stage's selection loop exceeded the configured iteration cap
    IterationCap { stage: usize, iterations: usize },
    /// The heap did not reach its final shape within the stage cap
    StageLimit { max_stages: usize },
    /// No placement can make progress and no later bits will arrive
    Stalled { stage: usize },
    /// Modular synthesis requested without a modulus
    MissingModulus,
    /// Inconsistent configuration or heap description
    InvalidConfig(String),
    /// Exact synthesis requested but no solver backend is compiled in
    NoSolverBackend,
    /// The solver backend failed
    Solver(String),
    /// I/O failure while writing a model dump
    Io(std::io::Error),
}

impl fmt::Display for CompressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionError::Infeasible { max_stages } => write!(
                f,
                "no feasible compression found within {} stages",
                max_stages
            ),
            CompressionError::IterationCap { stage, iterations } => write!(
                f,
                "stage {} exceeded the iteration cap ({} iterations)",
                stage, iterations
            ),
            CompressionError::StageLimit { max_stages } => write!(
                f,
                "heap did not reach its final shape within {} stages",
                max_stages
            ),
            CompressionError::Stalled { stage } => write!(
                f,
                "compression stalled at stage {}: no compressor in the catalog can reduce the heap further",
                stage
            ),
            CompressionError::MissingModulus => {
                write!(f, "modular compression requires a modulus")
            }
            CompressionError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            CompressionError::NoSolverBackend => write!(
                f,
                "exact compression needs a solver backend (build with feature `with-z3-system` or `with-z3-built`)"
            ),
            CompressionError::Solver(msg) => write!(f, "solver error: {}", msg),
            CompressionError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for CompressionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompressionError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CompressionError {
    fn from(err: std::io::Error) -> Self {
        CompressionError::Io(err)
    }
}

/// A compressor that broke the catalog contract and was excluded from use
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogViolation {
    pub compressor: String,
    pub reason: String,
}

impl CatalogViolation {
    pub fn new(compressor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            compressor: compressor.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CatalogViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compressor '{}' rejected: {}", self.compressor, self.reason)
    }
}

impl std::error::Error for CatalogViolation {}
