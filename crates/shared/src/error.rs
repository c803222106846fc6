use serde::{Deserialize, Serialize};

use crate::domain::ParameterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotFound,
    Internal,
}

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
}

impl From<ParameterError> for ApiError {
    fn from(value: ParameterError) -> Self {
        Self::new(ErrorCode::Validation, value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_serializes_snake_case() {
        let body = serde_json::to_string(&ApiError::new(ErrorCode::NotFound, "no such room"))
            .expect("serialize");
        assert_eq!(body, r#"{"code":"not_found","message":"no such room"}"#);
    }

    #[test]
    fn parameter_errors_map_to_validation() {
        let api: ApiError = ParameterError::EmptyRoomName.into();
        assert_eq!(api.code, ErrorCode::Validation);
        assert!(api.message.contains("room name"));
    }
}
