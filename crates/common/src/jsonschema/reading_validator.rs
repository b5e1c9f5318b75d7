//! Reading validator backed by a JSON Schema.

use crate::domain::{DomainError, DomainResult, Reading, ValidationIssue};
use anyhow::anyhow;
use jsonschema::Validator;

/// Schema every submitted reading must satisfy.
///
/// `timestamp` is only required to be non-empty; its format is resolved when the
/// reading is indexed.
pub const READING_SCHEMA: &str = r#"{
    "type": "object",
    "required": ["site_id", "device_id", "power_reading", "timestamp"],
    "additionalProperties": false,
    "properties": {
        "site_id": { "type": "string", "minLength": 1 },
        "device_id": { "type": "string", "minLength": 1 },
        "power_reading": { "type": "number" },
        "timestamp": { "type": "string", "minLength": 1 }
    }
}"#;

/// Validates request bodies against [`READING_SCHEMA`], collecting every violation.
pub struct ReadingValidator {
    validator: Validator,
}

impl ReadingValidator {
    pub fn new() -> anyhow::Result<Self> {
        let schema: serde_json::Value = serde_json::from_str(READING_SCHEMA)?;
        let validator = Validator::new(&schema)
            .map_err(|e| anyhow!("Invalid reading schema: {}", e))?;
        Ok(Self { validator })
    }

    /// Validate a decoded JSON body and convert it into a [`Reading`]
    pub fn validate(&self, body: &serde_json::Value) -> DomainResult<Reading> {
        let issues: Vec<ValidationIssue> = self
            .validator
            .iter_errors(body)
            .map(|e| {
                let schema_path = e.schema_path.to_string();
                let keyword = schema_path
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                ValidationIssue::new(e.instance_path.to_string(), schema_path, keyword, e.to_string())
            })
            .collect();

        if !issues.is_empty() {
            return Err(DomainError::Validation(issues));
        }

        let reading: Reading = serde_json::from_value(body.clone()).map_err(|e| {
            DomainError::Validation(vec![ValidationIssue::new("", "", "type", e.to_string())])
        })?;

        if !reading.power_reading.is_finite() {
            return Err(DomainError::Validation(vec![ValidationIssue::new(
                "/power_reading",
                "/properties/power_reading/type",
                "type",
                "power_reading must be a finite number",
            )]));
        }

        Ok(reading)
    }
}
