//! Error types for the table store, the auth client and the list components.

use std::fmt;

use shared::error::{ApiException, ErrorCode, RestErrorBody};
use thiserror::Error;

/// Message shown in place of the list when a count or page fetch fails.
pub const FETCH_FAILED_MESSAGE: &str = "단어를 불러오지 못했습니다.";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("table store rejected request ({status}): {}", body.message)]
    Rejected { status: u16, body: RestErrorBody },
    #[error("failed to decode table store response: {0}")]
    Decode(String),
    #[error("count response carried no usable Content-Range header")]
    MissingCountHeader,
    #[error("invalid table store url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl StoreError {
    pub fn into_exception(self) -> ApiException {
        match self {
            StoreError::Rejected { status, body } => ApiException::from_rest(status, body),
            other => ApiException::new(ErrorCode::Internal, other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("auth rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("redirect url carried no session: {0}")]
    InvalidRedirect(String),
    #[error("unexpected auth response: {0}")]
    UnexpectedResponse(String),
    #[error("access token could not be decoded: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("invalid auth url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("no active session")]
    NoSession,
}

impl AuthError {
    /// User-facing text for the sign-in screens.
    pub fn localized(&self) -> String {
        match self {
            AuthError::Rejected { message, .. } => localize_auth_message(message),
            AuthError::NoSession => "로그인 정보가 없습니다. 다시 로그인 후 시도해주세요.".into(),
            _ => "인증 중 오류가 발생했습니다.".into(),
        }
    }
}

pub fn localize_auth_message(message: &str) -> String {
    match message {
        "Invalid login credentials" => "이메일 또는 비밀번호가 올바르지 않습니다.".into(),
        "User already registered" => "이미 가입된 이메일입니다.".into(),
        "Password should be at least 6 characters" => {
            "비밀번호는 6자리 이상이어야 합니다.".into()
        }
        "Invalid email" => "유효하지 않은 이메일 형식입니다.".into(),
        "Email not confirmed" => "이메일 인증을 완료해주세요.".into(),
        "" => "인증 중 오류가 발생했습니다.".into(),
        other => other.to_string(),
    }
}

/// Field-level messages produced by form validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub word_en: Option<String>,
    pub word_kr: Option<String>,
    pub major_name: Option<String>,
    pub other: Option<String>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        [&self.word_en, &self.word_kr, &self.major_name, &self.other]
            .into_iter()
            .filter_map(|m| m.as_deref())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.messages().collect::<Vec<_>>().join(", ");
        f.write_str(&joined)
    }
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("not signed in")]
    NotAuthenticated,
    #[error("{message}")]
    FetchFailed { message: String },
    #[error("validation failed: {0}")]
    ValidationFailed(ValidationErrors),
    #[error("table {0} does not group words by subject")]
    SubjectUnsupported(shared::domain::CategoryTable),
    #[error(transparent)]
    Store(#[from] StoreError),
}
