//! Validation of override requests and JSON Schema constraints

use crate::contract::{Dimension, SettingsError};
use jsonschema::Validator;
use serde_json::Value;

/// A compiled JSON Schema a setting value must satisfy.
pub struct Constraint {
    schema: Value,
    validator: Validator,
}

impl Constraint {
    /// Compile a schema. Invalid schemas are reported as text.
    pub fn compile(schema: Value) -> Result<Self, String> {
        let validator = Validator::new(&schema).map_err(|e| format!("invalid JSON Schema: {}", e))?;
        Ok(Self { schema, validator })
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validate a value, reporting the first violation.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        self.validator.validate(value).map_err(|error| error.to_string())
    }
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint").field("schema", &self.schema).finish()
    }
}

/// Reject empty or blank setting names
pub fn require_setting_name(name: &str) -> Result<&str, SettingsError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SettingsError::MissingSettingName);
    }
    Ok(name)
}

/// Parse an optional data center name.
///
/// A missing or blank value means "all data centers"; an unrecognized name is an error.
pub fn parse_data_center<D: Dimension>(value: Option<&str>) -> Result<Option<D>, SettingsError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => D::parse(text).map(Some).ok_or_else(|| SettingsError::UnknownDataCenter {
            value: text.to_string(),
        }),
    }
}

/// Display name for an optional data center.
pub fn data_center_label<D: Dimension>(data_center: Option<D>) -> String {
    data_center.map_or_else(|| "all data centers".to_string(), |d| d.name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    crate::dimension! {
        enum DataCenter { Local, London }
    }

    #[test]
    fn test_require_setting_name() {
        assert_eq!(require_setting_name(" Foo.Bar "), Ok("Foo.Bar"));
        assert_eq!(require_setting_name("   "), Err(SettingsError::MissingSettingName));
    }

    #[test]
    fn test_parse_data_center() {
        assert_eq!(parse_data_center::<DataCenter>(None), Ok(None));
        assert_eq!(parse_data_center::<DataCenter>(Some("")), Ok(None));
        assert_eq!(
            parse_data_center::<DataCenter>(Some("london")),
            Ok(Some(DataCenter::London))
        );
        assert!(matches!(
            parse_data_center::<DataCenter>(Some("Tokyo")),
            Err(SettingsError::UnknownDataCenter { value }) if value == "Tokyo"
        ));
    }

    #[test]
    fn test_constraint_checks_values() {
        let constraint = Constraint::compile(json!({"type": "integer", "minimum": 1, "maximum": 10}))
            .expect("schema compiles");
        assert!(constraint.check(&json!(5)).is_ok());
        assert!(constraint.check(&json!(11)).is_err());
        assert!(constraint.check(&json!("5")).is_err());
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let result = Constraint::compile(json!({"type": "no-such-type"}));
        assert!(result.is_err());
    }
}
