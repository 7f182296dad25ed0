use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid phone number or email: {0}")]
    InvalidContact(String),

    #[error("an account already exists for this contact")]
    AccountExists,

    #[error("no account found for this contact")]
    AccountNotFound,

    #[error("invalid or expired verification code")]
    CodeInvalid,

    #[error("user not found")]
    UserNotFound,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("payment link is no longer available")]
    Gone,

    #[error("payment link has already been used")]
    AlreadyUsed,

    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token")]
    TokenInvalid,

    #[error("token expired")]
    TokenExpired,

    #[error("failed to deliver verification code: {0}")]
    Notifier(String),

    #[error("failed to persist data: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Notifier(_) | AppError::Store(_) | AppError::Internal(_)
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidContact(_)
            | AppError::AccountExists
            | AppError::CodeInvalid
            | AppError::AlreadyUsed => StatusCode::BAD_REQUEST,
            AppError::AccountNotFound | AppError::UserNotFound | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::Gone => StatusCode::GONE,
            AppError::MissingToken => StatusCode::UNAUTHORIZED,
            AppError::TokenInvalid | AppError::TokenExpired => StatusCode::FORBIDDEN,
            AppError::Notifier(_) | AppError::Store(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = if self.is_internal() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}
