//! Result types derived from a validation run.
//!
//! Nothing here is stored between runs; every value is recomputed from the
//! catalog and the response set.

use serde::{Deserialize, Serialize};

/// A passed/total pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub passed: usize,
    pub total: usize,
}

impl Tally {
    pub fn new(passed: usize, total: usize) -> Self {
        Self { passed, total }
    }

    /// Record one outcome.
    pub fn record(&mut self, passed: bool) {
        self.total += 1;
        if passed {
            self.passed += 1;
        }
    }

    /// Pass rate, or `None` when nothing was counted.
    pub fn rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.passed as f64 / self.total as f64)
        }
    }
}

impl std::ops::Add for Tally {
    type Output = Tally;

    fn add(self, other: Tally) -> Tally {
        Tally {
            passed: self.passed + other.passed,
            total: self.total + other.total,
        }
    }
}

impl std::iter::Sum for Tally {
    fn sum<I: Iterator<Item = Tally>>(iter: I) -> Tally {
        iter.fold(Tally::default(), |acc, t| acc + t)
    }
}

impl std::fmt::Display for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.passed, self.total)
    }
}

/// Outcome of one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub key: String,
    pub name: String,
    pub passed: bool,
    pub reason: String,
    pub critical: bool,
}

/// Outcome of every test in one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub key: String,
    pub name: String,

    /// Informational target copied from the catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,

    /// Results in catalog order
    pub tests: Vec<TestResult>,

    /// All tests in the phase
    pub tally: Tally,

    /// Critical tests only
    pub critical: Tally,
}

impl PhaseResult {
    pub fn has_critical_tests(&self) -> bool {
        self.critical.total > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.tests.iter().filter(|t| !t.passed)
    }
}

/// The two-tier verdict for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessCriteria {
    /// Key of the zero-tolerance phase
    pub critical_phase: String,

    /// Whether that phase had responses at all
    pub critical_phase_present: bool,

    /// Critical tests of the critical phase
    pub critical: Tally,

    /// Required critical pass rate (1.0 by default)
    pub critical_pass_rate: f64,

    pub critical_phase_passed: bool,

    /// Keys of the phases pooled into the shared threshold
    pub pooled_phases: Vec<String>,

    /// Every test of the pooled phases, summed
    pub pooled: Tally,

    /// `pooled.passed / pooled.total`, 0.0 when nothing was pooled
    pub pooled_rate: f64,

    pub pooled_threshold: f64,

    pub pooled_phases_passed: bool,

    pub overall_success: bool,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Catalog name, used as the report title
    pub catalog: String,

    /// Results for phases present in the response set, in catalog order
    pub phases: Vec<PhaseResult>,

    /// Catalog phases with no responses; excluded from every tally
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_phases: Vec<String>,

    pub success: SuccessCriteria,
}

impl RunResult {
    pub fn phase(&self, key: &str) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.key == key)
    }

    /// Failed critical tests across all phases, in catalog order.
    pub fn critical_failures(&self) -> impl Iterator<Item = &TestResult> {
        self.phases
            .iter()
            .flat_map(|p| p.failures())
            .filter(|t| t.critical)
    }
}
