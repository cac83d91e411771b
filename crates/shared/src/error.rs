use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 | 406 => ErrorCode::NotFound,
            409 => ErrorCode::Conflict,
            400 | 422 => ErrorCode::Validation,
            429 => ErrorCode::RateLimited,
            _ => ErrorCode::Internal,
        }
    }
}

/// Error body returned by the table API on non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl RestErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{code:?}: {message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_rest(status: u16, body: RestErrorBody) -> Self {
        let message = match body.details {
            Some(details) if !details.is_empty() => format!("{} ({details})", body.message),
            _ => body.message,
        };
        Self::new(ErrorCode::from_status(status), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_body_tolerates_missing_fields() {
        let body: RestErrorBody =
            serde_json::from_str(r#"{"message":"permission denied for table major_word"}"#)
                .expect("body");
        assert_eq!(body.code, None);
        assert_eq!(body.message, "permission denied for table major_word");
    }

    #[test]
    fn exception_keeps_details_and_maps_status() {
        let body = RestErrorBody {
            code: Some("23502".into()),
            message: "null value in column \"word_en\"".into(),
            details: Some("Failing row contains".into()),
            hint: None,
        };
        let err = ApiException::from_rest(400, body);
        assert_eq!(err.code, ErrorCode::Validation);
        assert!(err.message.ends_with("(Failing row contains)"));
        assert_eq!(
            ApiException::from_rest(401, RestErrorBody::new("jwt expired")).code,
            ErrorCode::Unauthorized
        );
    }
}
