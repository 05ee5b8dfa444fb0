use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes the content server reports in its JSON error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unknown page, component or data file.
    NotFound,
    /// A contact submission failed validation.
    Validation,
    Internal,
}

/// Body of every non-2xx JSON response from the content server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{what} not found"))
    }
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiException {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Validation,
            message: message.into(),
        }
    }
}

impl From<ApiException> for ApiError {
    fn from(value: ApiException) -> Self {
        Self::new(value.code, value.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_bodies_use_snake_case_codes() {
        let body = serde_json::to_value(ApiError::not_found("about.html")).expect("json");
        assert_eq!(body["code"], "not_found");
        assert_eq!(body["message"], "about.html not found");

        let error = ApiError::from(ApiException::validation("email must contain '@'"));
        assert_eq!(error.code, ErrorCode::Validation);
    }
}
