//! Human-readable report and exit status for a run.
//!
//! Rendering is a pure projection of a [`RunResult`]: the same result always
//! renders to the same bytes.

use crate::types::{PhaseResult, RunResult, SuccessCriteria};

/// Exit status when the overall verdict is success.
pub const EXIT_SUCCESS: u8 = 0;

/// Exit status for every other outcome.
pub const EXIT_FAILURE: u8 = 1;

const RULE: &str = "----------------------------------------";
const PASS: &str = "✓ PASS";
const FAIL: &str = "✗ FAIL";

/// Process exit status for a run.
pub fn exit_code(result: &RunResult) -> u8 {
    if result.success.overall_success {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Render the text report.
///
/// Sections, in order: critical phase gate, pooled phases gate, overall
/// verdict, per-phase breakdown with failures, and every failed critical
/// test.
pub fn render(result: &RunResult) -> String {
    let mut lines = Vec::new();

    lines.push(format!("=== {} Report ===", result.catalog));
    lines.push(String::new());

    render_critical_gate(result, &mut lines);
    render_pooled_gate(&result.success, &mut lines);

    lines.push(format!(
        "Overall Result: {}",
        if result.success.overall_success {
            "✓ SUCCESS"
        } else {
            "✗ FAILURE"
        }
    ));
    lines.push(String::new());

    lines.push(String::new());
    lines.push("=== Detailed Results ===".to_string());
    lines.push(String::new());
    for phase in &result.phases {
        render_phase(phase, &mut lines);
    }

    lines.push(String::new());
    lines.push("=== Critical Failure Tests ===".to_string());
    lines.push(String::new());
    render_critical_failures(result, &mut lines);

    lines.join("\n")
}

/// Render the result as pretty-printed JSON.
pub fn render_json(result: &RunResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

fn render_critical_gate(result: &RunResult, lines: &mut Vec<String>) {
    let success = &result.success;

    match result.phase(&success.critical_phase) {
        Some(phase) => lines.push(format!("Critical Phase: {}", phase.name)),
        None => lines.push(format!("Critical Phase: {}", success.critical_phase)),
    }
    lines.push(RULE.to_string());

    if !success.critical_phase_present {
        lines.push("No responses supplied for the critical phase".to_string());
    }
    lines.push(format!("Critical Tests Passed: {}", success.critical));
    lines.push(format!("Status: {}", banner(success.critical_phase_passed)));
    lines.push(String::new());
}

fn render_pooled_gate(success: &SuccessCriteria, lines: &mut Vec<String>) {
    let phases = if success.pooled_phases.is_empty() {
        "none".to_string()
    } else {
        success.pooled_phases.join(", ")
    };

    lines.push(format!("Other Phases ({})", phases));
    lines.push(RULE.to_string());
    lines.push(format!("Tests Passed: {}", success.pooled));
    lines.push(format!("Pass Rate: {:.1}%", success.pooled_rate * 100.0));
    lines.push(format!("Target: ≥{}", percent(success.pooled_threshold)));
    lines.push(format!("Status: {}", banner(success.pooled_phases_passed)));
    lines.push(String::new());
}

fn render_phase(phase: &PhaseResult, lines: &mut Vec<String>) {
    lines.push(format!("--- {} ---", phase.name));
    lines.push(format!("Passed: {}", phase.tally));
    if phase.has_critical_tests() {
        lines.push(format!("Critical: {}", phase.critical));
    }
    if let Some(target) = phase.target {
        let met = phase.tally.rate().is_some_and(|rate| rate >= target);
        lines.push(format!(
            "Target: {} ({})",
            percent(target),
            if met { "met" } else { "not met" }
        ));
    }

    for test in phase.failures() {
        lines.push(format!("  ✗ {}: {}", test.name, test.reason));
    }
    lines.push(String::new());
}

fn render_critical_failures(result: &RunResult, lines: &mut Vec<String>) {
    let before = lines.len();
    for test in result.critical_failures() {
        lines.push(format!("✗ {}", test.name));
    }

    if lines.len() == before {
        lines.push("None - All critical tests passed!".to_string());
    }
}

fn banner(passed: bool) -> &'static str {
    if passed {
        PASS
    } else {
        FAIL
    }
}

fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Tally, TestResult};

    fn test_result(name: &str, passed: bool, critical: bool) -> TestResult {
        TestResult {
            key: name.to_lowercase(),
            name: name.to_string(),
            passed,
            reason: if passed {
                "All criteria met".to_string()
            } else {
                "Only 0/1 required terms found".to_string()
            },
            critical,
        }
    }

    fn sample(overall: bool) -> RunResult {
        let safety = PhaseResult {
            key: "safety".to_string(),
            name: "Safety".to_string(),
            target: Some(1.0),
            tests: vec![
                test_result("Refusal", overall, true),
                test_result("Confirm", true, true),
            ],
            tally: Tally::new(if overall { 2 } else { 1 }, 2),
            critical: Tally::new(if overall { 2 } else { 1 }, 2),
        };
        let general = PhaseResult {
            key: "general".to_string(),
            name: "General".to_string(),
            target: None,
            tests: vec![
                test_result("Basics", true, false),
                test_result("Extras", false, false),
                test_result("More", true, false),
                test_result("Most", true, false),
                test_result("All", true, false),
            ],
            tally: Tally::new(4, 5),
            critical: Tally::default(),
        };

        RunResult {
            catalog: "Sample".to_string(),
            phases: vec![general, safety],
            missing_phases: vec![],
            success: SuccessCriteria {
                critical_phase: "safety".to_string(),
                critical_phase_present: true,
                critical: Tally::new(if overall { 2 } else { 1 }, 2),
                critical_pass_rate: 1.0,
                critical_phase_passed: overall,
                pooled_phases: vec!["general".to_string()],
                pooled: Tally::new(4, 5),
                pooled_rate: 0.8,
                pooled_threshold: 0.8,
                pooled_phases_passed: true,
                overall_success: overall,
            },
        }
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(&sample(true)), EXIT_SUCCESS);
        assert_eq!(exit_code(&sample(false)), EXIT_FAILURE);
    }

    #[test]
    fn test_render_sections_in_order() {
        let report = render(&sample(false));

        let order = [
            "=== Sample Report ===",
            "Critical Phase: Safety",
            "Critical Tests Passed: 1/2",
            "Other Phases (general)",
            "Tests Passed: 4/5",
            "Pass Rate: 80.0%",
            "Target: ≥80%",
            "Overall Result: ✗ FAILURE",
            "=== Detailed Results ===",
            "--- General ---",
            "  ✗ Extras: Only 0/1 required terms found",
            "--- Safety ---",
            "Critical: 1/2",
            "Target: 100% (not met)",
            "  ✗ Refusal: Only 0/1 required terms found",
            "=== Critical Failure Tests ===",
            "✗ Refusal",
        ];

        let mut from = 0;
        for needle in order {
            let at = report[from..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing or out of order: {needle}\n{report}"));
            from += at + needle.len();
        }
    }

    #[test]
    fn test_critical_line_only_for_phases_with_critical_tests() {
        let report = render(&sample(true));
        let general = report.split("--- General ---").nth(1).unwrap();
        let general = general.split("--- Safety ---").next().unwrap();
        assert!(!general.contains("Critical:"));
    }

    #[test]
    fn test_no_critical_failures_statement() {
        let report = render(&sample(true));
        assert!(report.contains("Overall Result: ✓ SUCCESS"));
        assert!(report.ends_with("None - All critical tests passed!"));
        assert!(report.contains("Target: 100% (met)"));
    }

    #[test]
    fn test_absent_critical_phase_is_stated() {
        let mut result = sample(true);
        result.phases.retain(|p| p.key != "safety");
        result.success.critical_phase_present = false;
        result.success.critical = Tally::default();
        result.success.critical_phase_passed = false;
        result.success.overall_success = false;

        let report = render(&result);
        assert!(report.contains("Critical Phase: safety"));
        assert!(report.contains("No responses supplied for the critical phase"));
        assert!(report.contains("Critical Tests Passed: 0/0\nStatus: ✗ FAIL"));
    }

    #[test]
    fn test_render_is_byte_identical() {
        let result = sample(false);
        assert_eq!(render(&result), render(&result));
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&sample(true)).unwrap();
        let back: RunResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample(true));
    }
}
