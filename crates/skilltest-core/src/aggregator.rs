//! Phase aggregation: run the matcher over every test of a phase.

use std::collections::HashMap;

use crate::catalog::Phase;
use crate::matcher::{check_response, TermMatcher};
use crate::types::{PhaseResult, Tally, TestResult};

/// Evaluate every test of `phase` against its response.
///
/// Tests are visited in catalog order. A test with no entry in `responses`
/// is judged against the empty string. The caller decides what to do with
/// phases that have no responses at all; this function assumes the phase
/// was present.
pub fn aggregate_phase(
    phase: &Phase,
    responses: &HashMap<String, String>,
    matcher: &dyn TermMatcher,
) -> PhaseResult {
    let mut tests = Vec::with_capacity(phase.tests.len());
    let mut tally = Tally::default();
    let mut critical = Tally::default();

    for test in &phase.tests {
        let response = responses.get(&test.key).map(String::as_str).unwrap_or("");
        let outcome = check_response(response, &test.criterion, matcher);
        let is_critical = test.criterion.critical;

        tally.record(outcome.passed);
        if is_critical {
            critical.record(outcome.passed);
        }

        tracing::debug!(
            phase = %phase.key,
            test = %test.key,
            passed = outcome.passed,
            critical = is_critical,
            reason = %outcome.reason,
            "Test evaluated"
        );

        tests.push(TestResult {
            key: test.key.clone(),
            name: test.name.clone(),
            passed: outcome.passed,
            reason: outcome.reason,
            critical: is_critical,
        });
    }

    PhaseResult {
        key: phase.key.clone(),
        name: phase.name.clone(),
        target: phase.target,
        tests,
        tally,
        critical,
    }
}
