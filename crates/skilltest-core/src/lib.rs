//! # skilltest-core
//!
//! Deterministic, rule-based validation of agent responses.
//!
//! A [`Catalog`] groups tests into ordered phases; each test carries a
//! [`Criterion`] of required and forbidden terms. Given a [`ResponseSet`]
//! from some agent, the engine answers:
//! - Which tests passed, and why did the others fail?
//! - Did the critical phase pass every critical test?
//! - Did the remaining phases, pooled together, reach the threshold?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same catalog, policy and responses always produce
//!    the same result and the same report bytes
//! 2. **Literal**: Matching is case-insensitive term containment, no NLU
//! 3. **Asymmetric**: A critical failure vetoes the run regardless of
//!    every other score
//! 4. **Shareable**: A [`Validator`] only reads its catalog, so one
//!    instance can serve concurrent runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use skilltest_core::{Catalog, Policy, ResponseSet, Validator, report};
//!
//! let validator = Validator::new(Catalog::nrepl()?, Policy::default())?;
//! let responses = ResponseSet::from_file("responses.json")?;
//! let result = validator.run(&responses);
//!
//! println!("{}", report::render(&result));
//! std::process::exit(report::exit_code(&result).into());
//! ```

pub mod aggregator;
pub mod catalog;
pub mod matcher;
pub mod report;
pub mod responses;
pub mod types;
pub mod verdict;

// Re-export main types at crate root
pub use aggregator::aggregate_phase;
pub use catalog::{Catalog, CatalogError, Criterion, Phase, TestCase};
pub use matcher::{check_response, MatchOutcome, SubstringMatcher, TermMatcher, WordBoundaryMatcher};
pub use responses::{PhaseResponses, ResponseError, ResponseSet};
pub use types::{PhaseResult, RunResult, SuccessCriteria, Tally, TestResult};
pub use verdict::{decide, evaluate_success, Decision, Policy, PolicyError};

use thiserror::Error;

/// Errors that can stop a validation before any test is judged.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid responses: {0}")]
    Responses(#[from] ResponseError),

    #[error("Invalid policy: {0}")]
    Policy(#[from] PolicyError),
}

/// A catalog and policy ready to judge response sets.
pub struct Validator {
    catalog: Catalog,
    policy: Policy,
    matcher: Box<dyn TermMatcher>,
}

impl Validator {
    /// Create a validator using substring matching.
    ///
    /// Fails if the policy does not fit the catalog.
    pub fn new(catalog: Catalog, policy: Policy) -> Result<Self, ValidationError> {
        policy.check_against(&catalog)?;
        Ok(Self {
            catalog,
            policy,
            matcher: Box::new(SubstringMatcher),
        })
    }

    /// Replace the term comparison strategy.
    pub fn with_matcher(mut self, matcher: Box<dyn TermMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Judge a response set.
    ///
    /// Catalog phases absent from `responses` are logged, listed in
    /// `missing_phases` and left out of every tally. Tests absent from a
    /// present phase are judged as empty responses.
    pub fn run(&self, responses: &ResponseSet) -> RunResult {
        for key in responses.unknown_phases(&self.catalog) {
            tracing::debug!(phase = %key, "Ignoring responses for phase not in catalog");
        }

        let mut phases = Vec::with_capacity(self.catalog.phases.len());
        let mut missing_phases = Vec::new();

        for phase in &self.catalog.phases {
            match responses.phase(&phase.key) {
                Some(phase_responses) => {
                    phases.push(aggregate_phase(phase, phase_responses, self.matcher.as_ref()));
                }
                None => {
                    tracing::warn!(phase = %phase.key, "No responses for phase");
                    missing_phases.push(phase.key.clone());
                }
            }
        }

        let success = evaluate_success(&phases, &self.policy);

        tracing::info!(
            matcher = self.matcher.name(),
            phases = phases.len(),
            missing = missing_phases.len(),
            overall_success = success.overall_success,
            "Validation complete"
        );

        RunResult {
            catalog: self.catalog.name.clone(),
            phases,
            missing_phases,
            success,
        }
    }
}

/// Validate `responses` against `catalog` under `policy`.
///
/// This is the main entry point for one-off validation.
pub fn validate(
    catalog: &Catalog,
    responses: &ResponseSet,
    policy: &Policy,
) -> Result<RunResult, ValidationError> {
    let validator = Validator::new(catalog.clone(), policy.clone())?;
    Ok(validator.run(responses))
}
