use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reelvote_core::ReelError;
use thiserror::Error;

use crate::{config::ConfigError, ledger::LedgerError, state::StateError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Core(#[from] ReelError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::Core(err) => ApiError::Core(err),
            StateError::Ledger(err) => ApiError::Ledger(err),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(ReelError::QuotaExceeded { .. }) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Core(err) if err.is_validation() => StatusCode::BAD_REQUEST,
            ApiError::Core(err) if err.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Ledger(LedgerError::DuplicateReceipt(_)) => StatusCode::CONFLICT,
            ApiError::Ledger(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Failures that stop the server from starting or shutting down cleanly.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}
