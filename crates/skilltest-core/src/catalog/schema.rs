//! JSON Schema check run on every catalog before it is deserialized, so
//! structural mistakes are reported with their location.

use std::sync::OnceLock;

use serde_json::Value;

const CATALOG_SCHEMA: &str = include_str!("../../../../schema/catalog.schema.json");

fn catalog_schema() -> Result<&'static jsonschema::Validator, String> {
    static SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

    SCHEMA
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(CATALOG_SCHEMA).map_err(|e| e.to_string())?;
            jsonschema::validator_for(&schema).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| format!("Catalog schema is unusable: {}", e))
}

/// Check `catalog` against the embedded schema.
///
/// Each violation is reported as `"<message> at <instance path>"`.
pub fn validate_catalog_schema(catalog: &Value) -> Result<(), Vec<String>> {
    let schema = catalog_schema().map_err(|e| vec![e])?;

    let errors: Vec<String> = schema
        .iter_errors(catalog)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
