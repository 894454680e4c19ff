use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;

use crate::db::PoolError;
use crate::geocoding::GeocodingError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned by every handler. The message of `Internal` is logged and
/// never sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadGateway(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(detail) => log::error!("Request failed: {}", detail),
            ApiError::BadGateway(_) | ApiError::ServiceUnavailable(_) => {
                log::error!("Request failed with {}: {}", status, self)
            }
            _ => log::warn!("Request rejected with {}: {}", status, self),
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => ApiError::not_found("Record not found"),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                log::info!("Unique violation: {}", info.message());
                ApiError::conflict("Record already exists")
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                log::info!("Foreign key violation: {}", info.message());
                ApiError::bad_request("Referenced record does not exist")
            }
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                log::info!("Check violation: {}", info.message());
                ApiError::bad_request("Value violates a database constraint")
            }
            DieselError::DatabaseError(DatabaseErrorKind::Unknown, info)
                if info.message().starts_with("value too long") =>
            {
                log::info!("String truncation: {}", info.message());
                ApiError::bad_request("Value is too long")
            }
            DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
                ApiError::ServiceUnavailable("Database connection lost".to_string())
            }
            other => ApiError::internal(format!("Database error: {}", other)),
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        log::error!("{}", err);
        ApiError::ServiceUnavailable("Database unavailable".to_string())
    }
}

impl From<GeocodingError> for ApiError {
    fn from(err: GeocodingError) -> Self {
        match err {
            GeocodingError::NotConfigured => {
                ApiError::ServiceUnavailable("Geocoding is not configured".to_string())
            }
            GeocodingError::EmptyAddress => ApiError::bad_request("Address must not be empty"),
            GeocodingError::NoResults(address) => {
                ApiError::not_found(format!("No location found for {:?}", address))
            }
            other => ApiError::BadGateway(format!("Geocoding failed: {}", other)),
        }
    }
}
