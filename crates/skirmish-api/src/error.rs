//! Skirmish — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use skirmish_combat::domain::errors::{CombatError, ErrorKind};
use skirmish_core::error::DomainError;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migrations could not be applied.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The span exporter could not be built.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// What the caller can do about it, when there is something.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

/// HTTP-layer wrapper around `CombatError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub CombatError);

impl From<CombatError> for ApiError {
    fn from(err: CombatError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(CombatError::Domain(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match self.0.kind() {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, "validation_error"),
            ErrorKind::IllegalStateTransition => {
                (StatusCode::CONFLICT, "illegal_state_transition")
            }
            ErrorKind::ConcurrentModification => (StatusCode::CONFLICT, "concurrency_conflict"),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ErrorKind::Infrastructure => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
        };

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
            hint: self.0.hint(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use skirmish_combat::domain::errors::{TransitionError, ValidationError};
    use uuid::Uuid;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        let response = err.into().into_response();
        response.status()
    }

    #[test]
    fn test_aggregate_not_found_maps_to_404() {
        let id = Uuid::new_v4();
        assert_eq!(
            status_of(DomainError::AggregateNotFound(id)),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_unknown_participant_maps_to_404() {
        assert_eq!(
            status_of(CombatError::from(ValidationError::ParticipantNotFound(
                Uuid::new_v4()
            ))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_concurrency_conflict_maps_to_409() {
        assert_eq!(
            status_of(DomainError::ConcurrencyConflict {
                aggregate_id: Uuid::new_v4(),
                expected: 1,
                actual: 2,
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_illegal_transition_maps_to_409() {
        assert_eq!(
            status_of(CombatError::from(TransitionError::CombatAlreadyEnded)),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_validation_maps_to_400() {
        assert_eq!(
            status_of(CombatError::from(ValidationError::NegativeAmount(-1))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::Validation("bad input".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_infrastructure_maps_to_500() {
        assert_eq!(
            status_of(DomainError::Infrastructure("db down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
