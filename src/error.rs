use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::DatabaseErrorKind;
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

pub type BatesResult<T> = Result<T, BatesError>;

/// Failure taxonomy shared by the allocator, production manager and privilege log.
#[derive(Debug, Error)]
pub enum BatesError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0} is not implemented")]
    NotImplemented(String),
    #[error("database error: {0}")]
    Database(diesel::result::Error),
    #[error("export failed: {0}")]
    Export(#[from] csv::Error),
}

impl BatesError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<diesel::result::Error> for BatesError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => BatesError::NotFound("record"),
            diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation | DatabaseErrorKind::SerializationFailure,
                ref info,
            ) => BatesError::Conflict(format!("concurrent allocation detected: {}", info.message())),
            // lock_timeout and statement_timeout cancellations
            diesel::result::Error::DatabaseError(_, ref info)
                if info.message().starts_with("canceling statement due to") =>
            {
                BatesError::Conflict(format!("allocation timed out: {}", info.message()))
            }
            other => BatesError::Database(other),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "resource not found")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_IMPLEMENTED, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<BatesError> for AppError {
    fn from(value: BatesError) -> Self {
        match value {
            BatesError::InvalidArgument(message) => AppError::bad_request(message),
            BatesError::NotFound(_) => AppError::new(StatusCode::NOT_FOUND, value.to_string()),
            BatesError::Conflict(message) => AppError::conflict(message),
            BatesError::NotImplemented(_) => AppError::not_implemented(value.to_string()),
            BatesError::Database(err) => AppError::internal(err),
            BatesError::Export(err) => AppError::internal(err),
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found(),
            _ => AppError::internal(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        let cases = [
            (BatesError::invalid("count must be at least 1"), StatusCode::BAD_REQUEST),
            (BatesError::NotFound("document"), StatusCode::NOT_FOUND),
            (BatesError::Conflict("overlap".into()), StatusCode::CONFLICT),
            (
                BatesError::NotImplemented("pdf export".into()),
                StatusCode::NOT_IMPLEMENTED,
            ),
            (
                BatesError::Database(diesel::result::Error::RollbackTransaction),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(AppError::from(error).status(), expected);
        }
    }

    #[test]
    fn diesel_not_found_becomes_domain_not_found() {
        let error = BatesError::from(diesel::result::Error::NotFound);
        assert!(matches!(error, BatesError::NotFound(_)));
    }

    #[test]
    fn not_implemented_message_names_the_feature() {
        let error = BatesError::NotImplemented("pdf privilege log export".into());
        assert_eq!(
            error.to_string(),
            "pdf privilege log export is not implemented"
        );
    }
}
