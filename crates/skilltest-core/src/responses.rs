//! The response set: phase key -> test key -> response text.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::catalog::Catalog;

/// Errors that can occur when reading a response set.
///
/// Any of these means the document does not have the expected
/// phase -> test -> text shape, and the run must not continue.
#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("Failed to read responses: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed JSON responses: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Malformed YAML responses: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Responses for one phase, keyed by test key.
pub type PhaseResponses = HashMap<String, String>;

/// Agent responses, grouped by phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseSet {
    phases: HashMap<String, PhaseResponses>,
}

impl ResponseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one response.
    pub fn insert(
        &mut self,
        phase: impl Into<String>,
        test: impl Into<String>,
        response: impl Into<String>,
    ) {
        self.phases
            .entry(phase.into())
            .or_default()
            .insert(test.into(), response.into());
    }

    /// Mark a phase as present without any responses.
    pub fn insert_phase(&mut self, phase: impl Into<String>) {
        self.phases.entry(phase.into()).or_default();
    }

    /// Builder form of [`ResponseSet::insert`].
    pub fn with_response(
        mut self,
        phase: impl Into<String>,
        test: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.insert(phase, test, response);
        self
    }

    /// Parse a response set from JSON string.
    pub fn from_json(json: &str) -> Result<Self, ResponseError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a response set from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ResponseError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a JSON response set from any reader (e.g. stdin).
    pub fn from_reader(mut reader: impl Read) -> Result<Self, ResponseError> {
        let mut contents = String::new();
        reader.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }

    /// Read a response set file; `.yaml`/`.yml` are YAML, anything else JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ResponseError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::from_yaml(&contents)
        } else {
            Self::from_json(&contents)
        }
    }

    /// Responses for a phase, if the phase is present at all.
    pub fn phase(&self, key: &str) -> Option<&PhaseResponses> {
        self.phases.get(key)
    }

    /// Response text for one test, if given.
    pub fn response(&self, phase: &str, test: &str) -> Option<&str> {
        self.phases
            .get(phase)
            .and_then(|tests| tests.get(test))
            .map(String::as_str)
    }

    /// Phase keys not defined by `catalog`, sorted.
    pub fn unknown_phases(&self, catalog: &Catalog) -> Vec<&str> {
        let mut unknown: Vec<&str> = self
            .phases
            .keys()
            .map(String::as_str)
            .filter(|key| catalog.phase(key).is_none())
            .collect();
        unknown.sort_unstable();
        unknown
    }

    /// A JSON skeleton with an empty response for every test of `catalog`.
    pub fn template(catalog: &Catalog) -> serde_json::Value {
        let mut phases = serde_json::Map::new();
        for phase in &catalog.phases {
            let tests: serde_json::Map<String, serde_json::Value> = phase
                .tests
                .iter()
                .map(|t| (t.key.clone(), serde_json::Value::String(String::new())))
                .collect();
            phases.insert(phase.key.clone(), serde_json::Value::Object(tests));
        }
        serde_json::Value::Object(phases)
    }
}
