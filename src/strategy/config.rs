//! Configuration types for compression strategies

use crate::catalog::Ranking;
use crate::error::CompressionError;
use std::path::PathBuf;
use std::time::Duration;

/// Strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Stage-by-stage greedy placement of the most efficient compressor
    #[default]
    Heuristic,
    /// Per-column first-fit placement, left anchor before right anchor
    Baseline,
    /// Greedy placement with pseudo-compressors for a modulus
    Modular,
    /// Exact integer-program formulation
    Optimal,
    /// Heuristic first, then the exact search bounded by its result
    Hybrid,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Heuristic => write!(f, "heuristic"),
            Mode::Baseline => write!(f, "baseline"),
            Mode::Modular => write!(f, "modular"),
            Mode::Optimal => write!(f, "optimal"),
            Mode::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "heuristic" | "greedy" | "max-efficiency" => Ok(Mode::Heuristic),
            "baseline" | "first-fit" => Ok(Mode::Baseline),
            "modular" | "mod" => Ok(Mode::Modular),
            "optimal" | "ilp" | "exact" => Ok(Mode::Optimal),
            "hybrid" => Ok(Mode::Hybrid),
            _ => Err(format!(
                "Unknown mode: '{}'. Valid options: heuristic, baseline, modular, optimal, hybrid",
                s
            )),
        }
    }
}

/// Final adder consuming the last stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalAdder {
    /// Carry/sum pair: two rows
    #[default]
    Binary,
    /// Ternary adder: three rows
    Ternary,
}

impl FinalAdder {
    /// Rows the final adder accepts per column
    pub fn width(&self) -> u32 {
        match self {
            FinalAdder::Binary => 2,
            FinalAdder::Ternary => 3,
        }
    }
}

impl std::fmt::Display for FinalAdder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinalAdder::Binary => write!(f, "binary"),
            FinalAdder::Ternary => write!(f, "ternary"),
        }
    }
}

impl std::str::FromStr for FinalAdder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binary" | "2" => Ok(FinalAdder::Binary),
            "ternary" | "3" => Ok(FinalAdder::Ternary),
            _ => Err(format!(
                "Unknown final adder: '{}'. Valid options: binary, ternary",
                s
            )),
        }
    }
}

/// Empirically tuned constants
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Tolerance for efficiency comparisons
    pub epsilon: f64,
    /// Placements allowed in one stage before the loop is aborted
    pub max_iterations_per_stage: usize,
    /// Stages allowed before a heuristic gives up
    pub max_stages: usize,
    /// Stages the exact search may add above its lower bound
    pub extra_exact_stages: usize,
    /// Widest middle section the greedy scorer tries for variable compressors
    pub max_variable_width: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            epsilon: 1e-4,
            max_iterations_per_stage: 100_000,
            max_stages: 64,
            extra_exact_stages: 4,
            max_variable_width: 32,
        }
    }
}

impl Tuning {
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations_per_stage = iterations;
        self
    }

    pub fn with_max_stages(mut self, stages: usize) -> Self {
        self.max_stages = stages;
        self
    }

    pub fn with_extra_exact_stages(mut self, stages: usize) -> Self {
        self.extra_exact_stages = stages;
        self
    }

    pub fn with_max_variable_width(mut self, width: usize) -> Self {
        self.max_variable_width = width;
        self
    }
}

/// Configuration for the exact strategy
#[derive(Debug, Clone)]
pub struct OptimalConfig {
    /// Timeout for each solver call
    pub solver_timeout: Option<Duration>,
    /// Largest trial stage count (None = lower bound + extra stages)
    pub max_stages: Option<usize>,
    /// Widest middle section expanded for variable compressors
    pub max_variable_width: usize,
    /// Multiplier turning area costs into integer objective coefficients
    pub area_scale: f64,
    /// Write each trial model in LP format to this file; the last trial remains
    pub lp_dump: Option<PathBuf>,
}

impl Default for OptimalConfig {
    fn default() -> Self {
        Self {
            solver_timeout: Some(Duration::from_secs(60)),
            max_stages: None,
            max_variable_width: 8,
            area_scale: 1000.0,
            lp_dump: None,
        }
    }
}

impl OptimalConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.solver_timeout = Some(timeout);
        self
    }

    pub fn with_timeout_option(mut self, timeout: Option<Duration>) -> Self {
        self.solver_timeout = timeout;
        self
    }

    pub fn with_max_stages(mut self, stages: usize) -> Self {
        self.max_stages = Some(stages);
        self
    }

    pub fn with_max_variable_width(mut self, width: usize) -> Self {
        self.max_variable_width = width;
        self
    }

    pub fn with_lp_dump(mut self, path: PathBuf) -> Self {
        self.lp_dump = Some(path);
        self
    }
}

/// Main compression configuration
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Strategy to run
    pub mode: Mode,
    /// Final adder consuming the last stage
    pub final_adder: FinalAdder,
    /// Modulus for modular reduction
    pub modulus: Option<u64>,
    /// Per-stage efficiency lower bounds; missing stages use 0
    pub lower_bounds: Vec<f64>,
    /// Ranking used when the catalog is built
    pub ranking: Ranking,
    /// Record interior zero outputs as holes
    pub allow_holes: bool,
    /// Tuned thresholds
    pub tuning: Tuning,
    /// Exact-strategy options
    pub optimal: OptimalConfig,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            final_adder: FinalAdder::default(),
            modulus: None,
            lower_bounds: Vec::new(),
            ranking: Ranking::default(),
            allow_holes: false,
            tuning: Tuning::default(),
            optimal: OptimalConfig::default(),
        }
    }
}

impl CompressionConfig {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_final_adder(mut self, final_adder: FinalAdder) -> Self {
        self.final_adder = final_adder;
        self
    }

    pub fn with_modulus(mut self, modulus: u64) -> Self {
        self.modulus = Some(modulus);
        self
    }

    pub fn with_modulus_option(mut self, modulus: Option<u64>) -> Self {
        self.modulus = modulus;
        self
    }

    pub fn with_lower_bounds(mut self, bounds: Vec<f64>) -> Self {
        self.lower_bounds = bounds;
        self
    }

    pub fn with_ranking(mut self, ranking: Ranking) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_holes(mut self, allow: bool) -> Self {
        self.allow_holes = allow;
        self
    }

    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_optimal(mut self, optimal: OptimalConfig) -> Self {
        self.optimal = optimal;
        self
    }

    /// Rows allowed per column at the final stage
    pub fn capacity(&self) -> u32 {
        self.final_adder.width()
    }

    /// Efficiency a placement must beat at `stage`
    pub fn lower_bound(&self, stage: usize) -> f64 {
        self.lower_bounds.get(stage).copied().unwrap_or(0.0)
    }

    /// Reject configurations no strategy can honor
    pub fn validate(&self) -> Result<(), CompressionError> {
        if let Some(m) = self.modulus {
            if m < 2 {
                return Err(CompressionError::InvalidConfig(format!(
                    "modulus must be at least 2, got {}",
                    m
                )));
            }
            if m >= 1 << 62 {
                return Err(CompressionError::InvalidConfig(format!(
                    "modulus {} is too large",
                    m
                )));
            }
        }
        if self.mode == Mode::Modular && self.modulus.is_none() {
            return Err(CompressionError::MissingModulus);
        }
        if self.mode == Mode::Baseline && self.modulus.is_some() {
            return Err(CompressionError::InvalidConfig(
                "baseline mode does not support a modulus".to_string(),
            ));
        }
        if let Some(bound) = self.lower_bounds.iter().find(|b| !b.is_finite()) {
            return Err(CompressionError::InvalidConfig(format!(
                "lower bound {} is not finite",
                bound
            )));
        }
        if !(self.tuning.epsilon > 0.0) {
            return Err(CompressionError::InvalidConfig(
                "epsilon must be positive".to_string(),
            ));
        }
        if self.tuning.max_stages == 0 || self.tuning.max_iterations_per_stage == 0 {
            return Err(CompressionError::InvalidConfig(
                "stage and iteration caps must be positive".to_string(),
            ));
        }
        if !(self.optimal.area_scale > 0.0) {
            return Err(CompressionError::InvalidConfig(
                "area scale must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("heuristic".parse::<Mode>().unwrap(), Mode::Heuristic);
        assert_eq!("ilp".parse::<Mode>().unwrap(), Mode::Optimal);
        assert_eq!("first-fit".parse::<Mode>().unwrap(), Mode::Baseline);
        assert_eq!("MODULAR".parse::<Mode>().unwrap(), Mode::Modular);
        assert!("annealing".parse::<Mode>().is_err());
    }

    #[test]
    fn test_mode_display_roundtrips() {
        for mode in [
            Mode::Heuristic,
            Mode::Baseline,
            Mode::Modular,
            Mode::Optimal,
            Mode::Hybrid,
        ] {
            assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_final_adder_width() {
        assert_eq!(FinalAdder::Binary.width(), 2);
        assert_eq!(FinalAdder::Ternary.width(), 3);
        assert_eq!("3".parse::<FinalAdder>().unwrap(), FinalAdder::Ternary);
    }

    #[test]
    fn test_lower_bound_defaults_to_zero() {
        let config = CompressionConfig::default().with_lower_bounds(vec![0.5]);
        assert_eq!(config.lower_bound(0), 0.5);
        assert_eq!(config.lower_bound(7), 0.0);
    }

    #[test]
    fn test_validate_modular_without_modulus() {
        let config = CompressionConfig::default().with_mode(Mode::Modular);
        assert!(matches!(
            config.validate(),
            Err(CompressionError::MissingModulus)
        ));
        assert!(config.with_modulus(7).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_modulus() {
        let config = CompressionConfig::default().with_modulus(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_baseline_modulus() {
        let config = CompressionConfig::default()
            .with_mode(Mode::Baseline)
            .with_modulus(5);
        assert!(matches!(
            config.validate(),
            Err(CompressionError::InvalidConfig(_))
        ));
        assert!(config.with_mode(Mode::Heuristic).validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = CompressionConfig::default()
            .with_mode(Mode::Hybrid)
            .with_final_adder(FinalAdder::Ternary)
            .with_tuning(Tuning::default().with_max_stages(10));
        assert_eq!(config.mode, Mode::Hybrid);
        assert_eq!(config.capacity(), 3);
        assert_eq!(config.tuning.max_stages, 10);
    }
}
