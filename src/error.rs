use axum::http::StatusCode;
use thiserror::Error;

use crate::fitbit::FitbitError;

/// Every failure the food-log API can surface to a client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    MissingSession(String),

    #[error(transparent)]
    Fitbit(#[from] FitbitError),

    #[error("{0}")]
    Internal(String),

    /// Local write failed after a remote log line was created, and removing
    /// that line failed too.
    #[error("{0}")]
    Partial(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::MissingSession(_) => "AUTH_MISSING_SESSION",
            ApiError::Fitbit(e) => match e {
                FitbitError::CredentialsMissing => "FITBIT_CREDENTIALS_MISSING",
                FitbitError::TokenInvalid => "FITBIT_TOKEN_INVALID",
                FitbitError::NotConnected => "FITBIT_NOT_CONNECTED",
                FitbitError::Timeout => "FITBIT_TIMEOUT",
                FitbitError::Api(_) => "FITBIT_API_ERROR",
            },
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Partial(_) => "PARTIAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingSession(_) => StatusCode::UNAUTHORIZED,
            ApiError::Fitbit(e) => match e {
                FitbitError::CredentialsMissing => StatusCode::FAILED_DEPENDENCY,
                FitbitError::TokenInvalid => StatusCode::UNAUTHORIZED,
                FitbitError::NotConnected => StatusCode::BAD_REQUEST,
                FitbitError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                FitbitError::Api(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) | ApiError::Partial(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
