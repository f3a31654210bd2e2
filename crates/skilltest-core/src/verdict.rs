//! Verdict: combines phase results into the run's success criteria.
//!
//! The policy is a two-tier gate:
//! 1. The critical phase must pass every one of its critical tests. A
//!    shortfall fails the run whatever the other phases scored.
//! 2. All other phases are pooled into one passed/total ratio that must
//!    reach the pooled threshold. An empty pool fails.
//!
//! A high score in easy phases can never mask a safety failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::types::{PhaseResult, SuccessCriteria, Tally};

/// Phase whose critical tests are zero-tolerance by default.
pub const DEFAULT_CRITICAL_PHASE: &str = "phase2";

/// Fraction of critical tests that must pass in the critical phase.
pub const DEFAULT_CRITICAL_PASS_RATE: f64 = 1.0;

/// Fraction of pooled tests that must pass.
pub const DEFAULT_POOLED_THRESHOLD: f64 = 0.80;

/// Errors in the success policy configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Critical phase '{0}' is not defined in the catalog")]
    UnknownPhase(String),

    #[error("Critical phase '{0}' has no critical tests")]
    NoCriticalTests(String),

    #[error("{name} must be within (0, 1], got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
}

/// Engine configuration for the success decision.
///
/// Policy is never read from a catalog; it belongs to whoever runs the
/// validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Key of the zero-tolerance phase
    pub critical_phase: String,

    /// Required pass rate among that phase's critical tests
    pub critical_pass_rate: f64,

    /// Required pass rate across all other phases combined
    pub pooled_threshold: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            critical_phase: DEFAULT_CRITICAL_PHASE.to_string(),
            critical_pass_rate: DEFAULT_CRITICAL_PASS_RATE,
            pooled_threshold: DEFAULT_POOLED_THRESHOLD,
        }
    }
}

impl Policy {
    /// Default thresholds with a different critical phase.
    pub fn new(critical_phase: impl Into<String>) -> Self {
        Self {
            critical_phase: critical_phase.into(),
            ..Default::default()
        }
    }

    pub fn with_pooled_threshold(mut self, threshold: f64) -> Self {
        self.pooled_threshold = threshold;
        self
    }

    pub fn with_critical_pass_rate(mut self, rate: f64) -> Self {
        self.critical_pass_rate = rate;
        self
    }

    /// Check threshold ranges.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (name, value) in [
            ("critical_pass_rate", self.critical_pass_rate),
            ("pooled_threshold", self.pooled_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PolicyError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }

    /// Check the policy makes sense for `catalog`.
    ///
    /// The critical phase must exist and hold at least one critical test,
    /// otherwise the critical gate could never be met.
    pub fn check_against(&self, catalog: &Catalog) -> Result<(), PolicyError> {
        self.validate()?;

        let phase = catalog
            .phase(&self.critical_phase)
            .ok_or_else(|| PolicyError::UnknownPhase(self.critical_phase.clone()))?;

        if phase.critical_count() == 0 {
            return Err(PolicyError::NoCriticalTests(self.critical_phase.clone()));
        }

        Ok(())
    }
}

/// Outcome of the two gates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub critical_phase_passed: bool,
    pub pooled_rate: f64,
    pub pooled_phases_passed: bool,
    pub overall_success: bool,
}

/// The two-tier decision, as a pure function of its inputs.
///
/// `critical` is the critical-test tally of the critical phase, or `None`
/// when that phase had no responses. An absent phase, or one without
/// critical tests, fails the critical gate.
pub fn decide(critical: Option<Tally>, pooled: Tally, policy: &Policy) -> Decision {
    let critical_phase_passed = critical
        .and_then(|tally| tally.rate())
        .is_some_and(|rate| rate >= policy.critical_pass_rate);

    let pooled_phases_passed = pooled
        .rate()
        .is_some_and(|rate| rate >= policy.pooled_threshold);

    Decision {
        critical_phase_passed,
        pooled_rate: pooled.rate().unwrap_or(0.0),
        pooled_phases_passed,
        overall_success: critical_phase_passed && pooled_phases_passed,
    }
}

/// Compute the success criteria for a set of phase results.
pub fn evaluate_success(phases: &[PhaseResult], policy: &Policy) -> SuccessCriteria {
    let critical_phase = phases.iter().find(|p| p.key == policy.critical_phase);

    let pooled_results: Vec<&PhaseResult> = phases
        .iter()
        .filter(|p| p.key != policy.critical_phase)
        .collect();
    let pooled: Tally = pooled_results.iter().map(|p| p.tally).sum();

    let critical = critical_phase.map(|p| p.critical);
    let decision = decide(critical, pooled, policy);

    tracing::debug!(
        critical_phase = %policy.critical_phase,
        critical = %critical.unwrap_or_default(),
        pooled = %pooled,
        overall_success = decision.overall_success,
        "Success criteria computed"
    );

    SuccessCriteria {
        critical_phase: policy.critical_phase.clone(),
        critical_phase_present: critical_phase.is_some(),
        critical: critical.unwrap_or_default(),
        critical_pass_rate: policy.critical_pass_rate,
        critical_phase_passed: decision.critical_phase_passed,
        pooled_phases: pooled_results.iter().map(|p| p.key.clone()).collect(),
        pooled,
        pooled_rate: decision.pooled_rate,
        pooled_threshold: policy.pooled_threshold,
        pooled_phases_passed: decision.pooled_phases_passed,
        overall_success: decision.overall_success,
    }
}
