use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::schedule::{AvailabilityError, PlanError};
use crate::sync::{GatewayError, SyncError};
use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Need at least 2 members, found {found}")]
    InsufficientMembers { found: usize },

    #[error("Not all members have completed their schedules ({member} is missing days)")]
    IncompleteSchedule { member: String },

    #[error("{0}")]
    Conflict(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_)
            | AppError::InsufficientMembers { .. }
            | AppError::IncompleteSchedule { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Persistence(_) | AppError::Database(_) | AppError::Cache(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            AppError::Unauthorized => error_codes::AUTH_FAILED,
            AppError::Forbidden(_) => error_codes::PERMISSION_DENIED,
            AppError::Validation(_) => error_codes::VALIDATION_ERROR,
            AppError::NotFound(_) => error_codes::NOT_FOUND,
            AppError::InsufficientMembers { .. } => error_codes::INSUFFICIENT_MEMBERS,
            AppError::IncompleteSchedule { .. } => error_codes::INCOMPLETE_SCHEDULE,
            AppError::Conflict(_) => error_codes::CONFLICT,
            AppError::Network(_) => error_codes::NETWORK_ERROR,
            AppError::Persistence(_) | AppError::Database(_) | AppError::Cache(_) => {
                error_codes::INTERNAL_ERROR
            }
        }
    }
}

impl From<PlanError> for AppError {
    fn from(error: PlanError) -> Self {
        match error {
            PlanError::InsufficientMembers { found } => AppError::InsufficientMembers { found },
            PlanError::IncompleteSchedule { member } => AppError::IncompleteSchedule { member },
        }
    }
}

impl From<AvailabilityError> for AppError {
    fn from(error: AvailabilityError) -> Self {
        AppError::Validation(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Persistence(format!("stored record is unreadable: {}", error))
    }
}

impl From<SyncError> for AppError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::AuthOffline | SyncError::OfflineNoCache(_) => {
                AppError::Network(error.to_string())
            }
            SyncError::NotQueueable { .. } | SyncError::Rejected { .. } => {
                AppError::Validation(error.to_string())
            }
            SyncError::Persistence(e) => AppError::Persistence(e.to_string()),
            SyncError::Gateway(e @ GatewayError::Client { .. }) => {
                AppError::Validation(e.to_string())
            }
            SyncError::Gateway(e) => AppError::Network(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 内部错误不把细节暴露给客户端
        let msg = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!("{}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, error_to_api_response::<()>(self.code(), msg)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_errors_are_client_failures() {
        let err = AppError::from(PlanError::InsufficientMembers { found: 1 });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), error_codes::INSUFFICIENT_MEMBERS);

        let err = AppError::from(PlanError::IncompleteSchedule {
            member: "Ben".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("Ben"));
    }

    #[test]
    fn sync_errors_keep_offline_distinct_from_rejections() {
        assert_eq!(
            AppError::from(SyncError::AuthOffline).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(SyncError::Gateway(GatewayError::Client {
                status: StatusCode::BAD_REQUEST,
                message: "Invalid amount".into(),
            }))
            .status(),
            StatusCode::BAD_REQUEST
        );
    }
}
