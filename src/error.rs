use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::model::{AlertStatus, EntityKind};

/// Outcomes the core reports to its callers. None of them are retried internally.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("Cannot delete {kind} '{id}': still referenced by {blocked_by} '{blocking_id}'")]
    ReferentialIntegrity {
        kind: EntityKind,
        id: Uuid,
        blocked_by: EntityKind,
        blocking_id: Uuid,
    },

    #[error("Invalid alert transition from {from} to {to}")]
    InvalidTransition { from: AlertStatus, to: AlertStatus },

    #[error("{kind} '{id}' was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        kind: EntityKind,
        id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] sea_orm::DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    #[must_use]
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    /// Stable machine-readable tag for the error category.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::ReferentialIntegrity { .. } => "referential_integrity_error",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Conflict { .. } => "conflict",
            Self::Persistence(_) | Self::Internal(_) => "internal_error",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// HTTP boundary wrapper; handlers return it so `?` on a [`CoreError`] maps
/// straight to a status code and a `{"error", "kind"}` body.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct AppError(#[from] CoreError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let e = &self.0;
        let status = match e {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::ReferentialIntegrity { .. }
            | CoreError::InvalidTransition { .. }
            | CoreError::Conflict { .. } => StatusCode::CONFLICT,
            CoreError::Persistence(db) => {
                tracing::error!("Database error: {db:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            CoreError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let error_message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            e.to_string()
        };

        let body = Json(json!({
            "error": error_message,
            "kind": e.code(),
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
