//! Catalog parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_catalog_schema;

/// Errors that can occur when loading a catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Catalog does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Catalog validation failed: {0}")]
    ValidationError(String),
}

/// The pass/fail rule attached to a single test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Criterion {
    /// Terms that should appear in the response
    #[serde(default)]
    pub must_include: Vec<String>,

    /// Terms that fail the test outright when present
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_not_include: Vec<String>,

    /// How many of `must_include` are needed (defaults to all of them)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_matches: Option<usize>,

    /// Whether a failure of this test can veto the whole run
    #[serde(default)]
    pub critical: bool,
}

impl Criterion {
    /// Criterion requiring every one of `terms`.
    pub fn requiring<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            must_include: terms.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Add forbidden terms.
    pub fn forbidding<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.must_not_include = terms.into_iter().map(Into::into).collect();
        self
    }

    /// Override the required match count.
    pub fn with_min_matches(mut self, min_matches: usize) -> Self {
        self.min_matches = Some(min_matches);
        self
    }

    /// Mark the criterion critical.
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Number of required terms a response must contain to pass.
    pub fn threshold(&self) -> usize {
        self.min_matches.unwrap_or(self.must_include.len())
    }
}

/// A single test: one prompt and the rule its response is judged by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCase {
    /// Identifier, unique within its phase
    pub key: String,

    /// Human-readable name
    pub name: String,

    /// Prompt given to the agent (informational only)
    #[serde(default)]
    pub prompt: String,

    #[serde(flatten)]
    pub criterion: Criterion,
}

impl TestCase {
    pub fn new(key: impl Into<String>, name: impl Into<String>, criterion: Criterion) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            prompt: String::new(),
            criterion,
        }
    }
}

/// A named, ordered group of tests evaluated together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase {
    /// Unique identifier (e.g., "phase2")
    pub key: String,

    /// Human-readable name
    pub name: String,

    /// Informational pass rate target; never consulted by the verdict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,

    /// Tests in evaluation and reporting order
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

impl Phase {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            target: None,
            tests: Vec::new(),
        }
    }

    pub fn with_test(mut self, test: TestCase) -> Self {
        self.tests.push(test);
        self
    }

    pub fn with_target(mut self, target: f64) -> Self {
        self.target = Some(target);
        self
    }

    /// Look up a test by key.
    pub fn test(&self, key: &str) -> Option<&TestCase> {
        self.tests.iter().find(|t| t.key == key)
    }

    /// Number of tests flagged critical.
    pub fn critical_count(&self) -> usize {
        self.tests.iter().filter(|t| t.criterion.critical).count()
    }
}

/// A test catalog: phases of tests with their matching criteria.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    /// Human-readable name, used as the report title
    pub name: String,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Phases in catalog order
    pub phases: Vec<Phase>,
}

impl Catalog {
    /// Build a catalog in code. Runs the same structural checks as parsing.
    pub fn new(name: impl Into<String>, phases: Vec<Phase>) -> Result<Self, CatalogError> {
        let catalog = Self {
            name: name.into(),
            description: None,
            phases,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a catalog from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a catalog from JSON string.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a catalog from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a catalog from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a catalog file, choosing the format by extension (YAML unless `.json`).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_yaml_file(path)
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, CatalogError> {
        validate_catalog_schema(&value).map_err(CatalogError::SchemaError)?;
        let catalog: Catalog = serde_json::from_value(value)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Look up a phase by key.
    pub fn phase(&self, key: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.key == key)
    }

    /// Phase keys in catalog order.
    pub fn phase_keys(&self) -> impl Iterator<Item = &str> {
        self.phases.iter().map(|p| p.key.as_str())
    }

    /// Total number of tests across all phases.
    pub fn test_count(&self) -> usize {
        self.phases.iter().map(|p| p.tests.len()).sum()
    }

    /// Validate the catalog structure.
    fn validate(&self) -> Result<(), CatalogError> {
        if self.phases.is_empty() {
            return Err(CatalogError::ValidationError(
                "Catalog defines no phases".to_string(),
            ));
        }

        let mut seen_phases = HashSet::new();
        for phase in &self.phases {
            if !seen_phases.insert(phase.key.as_str()) {
                return Err(CatalogError::ValidationError(format!(
                    "Duplicate phase key: {}",
                    phase.key
                )));
            }
            Self::validate_phase(phase)?;
        }

        Ok(())
    }

    /// Test keys must be unique within a phase and thresholds reachable.
    fn validate_phase(phase: &Phase) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();

        for test in &phase.tests {
            if !seen.insert(test.key.as_str()) {
                return Err(CatalogError::ValidationError(format!(
                    "Duplicate test key in {}: {}",
                    phase.key, test.key
                )));
            }

            let available = test.criterion.must_include.len();
            if test.criterion.threshold() > available {
                return Err(CatalogError::ValidationError(format!(
                    "{}.{}: min_matches {} exceeds the {} required terms",
                    phase.key,
                    test.key,
                    test.criterion.threshold(),
                    available
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CATALOG: &str = r#"
name: "Test Catalog"
phases:
  - key: basics
    name: "Basics"
    target: 0.5
    tests:
      - key: greet
        name: "Greeting"
        prompt: "Say hello"
        must_include: ["hello", "world"]
        min_matches: 1
  - key: safety
    name: "Safety"
    tests:
      - key: refuse
        name: "Refusal"
        must_include: ["cannot"]
        must_not_include: ["sure"]
        critical: true
"#;

    #[test]
    fn test_parse_valid_catalog() {
        let catalog = Catalog::from_yaml(VALID_CATALOG).unwrap();
        assert_eq!(catalog.name, "Test Catalog");
        assert_eq!(catalog.phase_keys().collect::<Vec<_>>(), vec!["basics", "safety"]);
        assert_eq!(catalog.test_count(), 2);

        let greet = catalog.phase("basics").unwrap().test("greet").unwrap();
        assert_eq!(greet.prompt, "Say hello");
        assert_eq!(greet.criterion.threshold(), 1);
        assert!(!greet.criterion.critical);

        let refuse = catalog.phase("safety").unwrap().test("refuse").unwrap();
        assert!(refuse.criterion.critical);
        assert_eq!(refuse.criterion.must_not_include, vec!["sure"]);
    }

    #[test]
    fn test_threshold_defaults_to_required_count() {
        let criterion = Criterion::requiring(["a", "b", "c"]);
        assert_eq!(criterion.threshold(), 3);
        assert_eq!(Criterion::default().threshold(), 0);
        assert_eq!(criterion.with_min_matches(1).threshold(), 1);
    }

    #[test]
    fn test_json_catalog() {
        let json = r#"{
            "name": "J",
            "phases": [
                {"key": "p1", "name": "P1", "tests": [
                    {"key": "t1", "name": "T1", "must_include": ["x"]}
                ]}
            ]
        }"#;
        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.phases[0].tests[0].criterion.must_include, vec!["x"]);
    }

    #[test]
    fn test_duplicate_phase_keys() {
        let yaml = r#"
name: "Dup"
phases:
  - key: p1
    name: "One"
    tests: []
  - key: p1
    name: "Again"
    tests: []
"#;
        let result = Catalog::from_yaml(yaml);
        assert!(matches!(result, Err(CatalogError::ValidationError(_))));
    }

    #[test]
    fn test_duplicate_test_keys_within_phase() {
        let yaml = r#"
name: "Dup"
phases:
  - key: p1
    name: "One"
    tests:
      - key: t
        name: "First"
      - key: t
        name: "Second"
"#;
        let result = Catalog::from_yaml(yaml);
        assert!(matches!(result, Err(CatalogError::ValidationError(_))));
    }

    #[test]
    fn test_same_test_key_in_different_phases() {
        let yaml = r#"
name: "Shared keys"
phases:
  - key: p1
    name: "One"
    tests:
      - key: t
        name: "First"
  - key: p2
    name: "Two"
    tests:
      - key: t
        name: "Second"
"#;
        assert!(Catalog::from_yaml(yaml).is_ok());
    }

    #[test]
    fn test_unreachable_min_matches() {
        let yaml = r#"
name: "Bad threshold"
phases:
  - key: p1
    name: "One"
    tests:
      - key: t
        name: "T"
        must_include: ["a"]
        min_matches: 2
"#;
        let result = Catalog::from_yaml(yaml);
        assert!(matches!(result, Err(CatalogError::ValidationError(_))));
    }

    #[test]
    fn test_schema_rejects_unknown_fields() {
        let yaml = r#"
name: "Extra"
phases:
  - key: p1
    name: "One"
    tests:
      - key: t
        name: "T"
        must_inclued: ["typo"]
"#;
        let result = Catalog::from_yaml(yaml);
        assert!(matches!(result, Err(CatalogError::SchemaError(_))));
    }

    #[test]
    fn test_malformed_yaml() {
        let result = Catalog::from_yaml("name: [unclosed");
        assert!(matches!(result, Err(CatalogError::YamlError(_))));
    }

    #[test]
    fn test_catalog_built_in_code() {
        let phase = Phase::new("p", "P")
            .with_test(TestCase::new("t", "T", Criterion::requiring(["x"]).critical()));
        let catalog = Catalog::new("Code", vec![phase]).unwrap();
        assert_eq!(catalog.phase("p").unwrap().critical_count(), 1);

        assert!(Catalog::new("Empty", vec![]).is_err());
    }
}
