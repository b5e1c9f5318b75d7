use serde::Serialize;
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// A single violated input constraint, reported back to clients as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// JSON pointer into the submitted document ("" for the document root)
    pub instance_path: String,
    /// JSON pointer into the reading schema
    pub schema_path: String,
    /// Schema keyword that failed (`required`, `type`, `minLength`, ...)
    pub keyword: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        instance_path: impl Into<String>,
        schema_path: impl Into<String>,
        keyword: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            instance_path: instance_path.into(),
            schema_path: schema_path.into(),
            keyword: keyword.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("validation failed with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    #[error("Dependency error: {0:#}")]
    Dependency(#[from] anyhow::Error),

    #[error("Processing failed for entry {entry_id}: {reason}")]
    Processing { entry_id: String, reason: String },

    #[error("Entry {entry_id} can never be indexed: {reason}")]
    InvalidEntry { entry_id: String, reason: String },

    #[error("No readings found for site: {0}")]
    NotFound(String),
}

impl DomainError {
    pub fn processing(entry_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Processing {
            entry_id: entry_id.into(),
            reason: reason.into(),
        }
    }

    /// True for failures caused by an unreachable or misbehaving Redis.
    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::Dependency(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_reports_issue_count() {
        let err = DomainError::Validation(vec![
            ValidationIssue::new("", "/required", "required", "\"site_id\" is a required property"),
            ValidationIssue::new("/timestamp", "/properties/timestamp/minLength", "minLength", "too short"),
        ]);

        assert_eq!(err.to_string(), "validation failed with 2 issue(s)");
    }

    #[test]
    fn test_anyhow_converts_to_dependency_error() {
        let err: DomainError = anyhow::anyhow!("connection refused").into();

        assert!(err.is_dependency());
        assert!(err.to_string().contains("connection refused"));
    }
}
