use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use prizes::{DrawError, PrizeError};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::{config::ConfigError, database::StoreError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Invalid distribution: {0}")]
    InvalidDistribution(#[from] PrizeError),

    #[error("No eligible entries")]
    NoEligibleEntries,

    #[error("Spin limit of {0} reached")]
    SpinLimitReached(u32),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DrawError> for AppError {
    fn from(error: DrawError) -> Self {
        match error {
            DrawError::NoEligibleEntries => AppError::NoEligibleEntries,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            // an empty raffle is a normal state for the admin page, not a failure
            AppError::NoEligibleEntries => {
                return (
                    StatusCode::OK,
                    Json(json!({ "winner": null, "reason": self.to_string() })),
                )
                    .into_response();
            }
            AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::SpinLimitReached(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::StoreUnavailable(e) => {
                warn!("Store unavailable: {e}");
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::InvalidDistribution(_) | AppError::Config(_) | AppError::Io(_) => {
                error!("{self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}
