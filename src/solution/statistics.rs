//! Synthesis statistics

use crate::strategy::config::Mode;
use std::time::Duration;

/// Counters collected during one synthesis call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisStatistics {
    /// Strategy that produced the solution
    pub mode: Mode,
    /// Wall-clock time of the call
    pub elapsed_time: Duration,
    /// Candidate realizations scored
    pub candidates_scored: u64,
    /// Compressor placements committed, pass-throughs excluded
    pub placements: u64,
    /// Bits carried to the next stage by pass-throughs
    pub pass_throughs: u64,
    /// Pseudo-compressors placed
    pub pseudo_placements: u64,
    /// Stages with at least one placement
    pub stages: usize,
    /// Stages retried with a zero lower bound
    pub stall_retries: u64,
    /// Compressors excluded for breaking the catalog contract
    pub rejected_compressors: u64,
    /// Output bits discarded past the top column
    pub dropped_bits: u64,
    /// Backend solve calls
    pub solver_calls: u64,
    /// Stage counts tried by the exact search
    pub trial_stages: Vec<usize>,
}

impl SynthesisStatistics {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Candidates scored per second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.candidates_scored as f64 / secs
        }
    }

    /// Fold the counters of a sub-run into these
    pub fn absorb(&mut self, other: &SynthesisStatistics) {
        self.candidates_scored += other.candidates_scored;
        self.solver_calls += other.solver_calls;
        self.stall_retries += other.stall_retries;
        self.rejected_compressors = self.rejected_compressors.max(other.rejected_compressors);
        self.trial_stages.extend_from_slice(&other.trial_stages);
    }

    /// Format statistics as a human-readable string
    pub fn format_summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Mode: {}\n", self.mode));
        s.push_str(&format!("Time: {:.2?}\n", self.elapsed_time));
        s.push_str(&format!("Stages: {}\n", self.stages));
        s.push_str(&format!("Placements: {}\n", self.placements));
        s.push_str(&format!("Pass-throughs: {}\n", self.pass_throughs));
        s.push_str(&format!("Candidates scored: {}\n", self.candidates_scored));

        if self.pseudo_placements > 0 {
            s.push_str(&format!(
                "Pseudo-compressors: {}\n",
                self.pseudo_placements
            ));
        }
        if self.stall_retries > 0 {
            s.push_str(&format!("Stall retries: {}\n", self.stall_retries));
        }
        if self.rejected_compressors > 0 {
            s.push_str(&format!(
                "Rejected compressors: {}\n",
                self.rejected_compressors
            ));
        }
        if self.dropped_bits > 0 {
            s.push_str(&format!("Dropped bits: {}\n", self.dropped_bits));
        }
        if self.solver_calls > 0 {
            s.push_str(&format!("Solver calls: {}\n", self.solver_calls));
            let trials: Vec<String> = self.trial_stages.iter().map(|s| s.to_string()).collect();
            s.push_str(&format!("Trial stage counts: {}\n", trials.join(", ")));
        }

        s
    }
}
