use serde_json::Value;
use thiserror::Error;

/// Request shapes the platform would reject, caught before anything is sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("json_schema and regex are mutually exclusive")]
    StructuredOutputConflict,

    #[error("at least one message is required")]
    EmptyMessages,

    #[error("model must not be empty")]
    EmptyModel,

    #[error("a batch job needs at least one model configuration")]
    EmptyModelParameters,

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

pub fn check_structured_output(
    json_schema: Option<&Value>,
    regex: Option<&str>,
) -> Result<(), ValidationError> {
    match (json_schema, regex) {
        (Some(schema), Some(_)) if !schema.is_null() => {
            Err(ValidationError::StructuredOutputConflict)
        }
        _ => Ok(()),
    }
}
