//! Test catalog loading and validation.
//!
//! A catalog is plain data: phases of tests, each with the criterion its
//! response is judged by. Catalogs are YAML/JSON documents validated against
//! JSON Schema, then checked for key uniqueness and reachable thresholds.

mod parser;
mod schema;

pub use parser::{Catalog, CatalogError, Criterion, Phase, TestCase};

/// The nREPL skill catalog shipped with the crate.
const NREPL_CATALOG_YAML: &str = include_str!("../../../../catalogs/nrepl.yaml");

impl Catalog {
    /// Load the built-in nREPL skill catalog.
    pub fn nrepl() -> Result<Self, CatalogError> {
        Self::from_yaml(NREPL_CATALOG_YAML)
    }
}
