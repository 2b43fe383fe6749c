use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Error body returned by every route
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

/// Errors surfaced at the HTTP boundary
///
/// The message is the route's generic message; root causes are logged by
/// the handler and never reach the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Missing or malformed request fields
    #[error("{0}")]
    InvalidInput(String),

    /// The provider rejected the call or answered with something unusable
    #[error("{0}")]
    Upstream(String),

    /// The provider did not answer in time
    #[error("{0}")]
    Timeout(String),

    /// Local fault, e.g. the model is unavailable
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn message(&self) -> &str {
        match self {
            ApiError::InvalidInput(m)
            | ApiError::Upstream(m)
            | ApiError::Timeout(m)
            | ApiError::Internal(m) => m,
        }
    }

    /// Upstream or timeout, depending on how the call failed
    pub fn from_upstream(timed_out: bool, message: &str) -> Self {
        if timed_out {
            ApiError::Timeout(message.to_string())
        } else {
            ApiError::Upstream(message.to_string())
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.message(),
        })
    }
}
