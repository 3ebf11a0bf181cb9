use std::fmt;
use std::path::PathBuf;

use axum::http::StatusCode;
use thiserror::Error;

use crate::types::FieldKind;

/// Fatal errors raised before the server starts listening.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("model artifact not readable at {path}")]
    ModelMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact at {path} is corrupt")]
    ModelCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("model warmup failed")]
    Warmup(#[source] ModelError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Per-request prediction failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("input schema mismatch (missing: {missing:?}, unexpected: {unexpected:?})")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("feature length mismatch: got {got}, expected {expected}")]
    FeatureCount { expected: usize, got: usize },

    #[error("input {feature} is not finite: {value}")]
    NonFiniteInput { feature: String, value: f64 },

    #[error("model produced a non-finite value: {0}")]
    NonFinite(f64),

    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvalidField {
    pub name: &'static str,
    pub value: String,
    pub expected: FieldKind,
}

/// Missing or unparsable form fields, in schema order.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub missing: Vec<&'static str>,
    pub invalid: Vec<InvalidField>,
}

impl ValidationError {
    pub fn message(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("Missing field(s): {}.", self.missing.join(", ")));
        }
        for f in &self.invalid {
            parts.push(format!("{} must be {} (got \"{}\").", f.name, f.expected.as_str(), f.value));
        }
        parts.join(" ")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Everything a prediction request can fail with.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl PredictError {
    pub fn status(&self) -> StatusCode {
        match self {
            PredictError::Validation(_) => StatusCode::BAD_REQUEST,
            PredictError::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the user. Model internals stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            PredictError::Validation(e) => e.message(),
            PredictError::Model(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

pub const GENERIC_FAILURE: &str = "Prediction failed. Please try again later.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_missing_then_invalid() {
        let e = ValidationError {
            missing: vec!["Y", "rain"],
            invalid: vec![InvalidField { name: "X", value: "abc".into(), expected: FieldKind::Integer }],
        };
        assert_eq!(
            e.to_string(),
            "Missing field(s): Y, rain. X must be an integer (got \"abc\")."
        );
    }

    #[test]
    fn model_errors_are_hidden_from_users() {
        let e = PredictError::from(ModelError::NonFinite(f64::NAN));
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.user_message(), GENERIC_FAILURE);
    }
}
