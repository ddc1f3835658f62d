use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;
use tracing::error;

use crate::envelope::{Envelope, Messages};
use crate::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request the handler never saw, e.g. a broken body.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("validation failed")]
    Validation(ValidationErrors),

    #[error("{0}")]
    AuthenticationMismatch(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    /// The source is logged, only `message` reaches the client.
    #[error("{message}")]
    Server {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn server<E: Into<anyhow::Error>>(message: &'static str) -> impl FnOnce(E) -> ApiError {
        move |source| ApiError::Server {
            message,
            source: source.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Rejected {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Rejected { status, .. } => *status,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::AuthenticationMismatch(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Server { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let messages = match self {
            ApiError::Validation(errors) => Messages::Fields(errors.into_inner()),
            ApiError::Server { message, source } => {
                error!(error = ?source, reason = message, "server error");
                Messages::Error {
                    error: message.to_string(),
                }
            }
            other => Messages::Error {
                error: other.to_string(),
            },
        };
        Envelope::failure(status, messages).into_response()
    }
}
