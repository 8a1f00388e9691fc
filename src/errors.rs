use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Resource not found (or not owned by the requesting user).
    NotFound {
        /// Machine-readable error code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },
    /// Invalid input, rejected before any persistence or network I/O.
    BadRequest {
        code: &'static str,
        message: String,
    },
    /// Business-rule rejection: this CNPJ+produto pair was successfully
    /// consulted within the last 3 months.
    RecentlyConsulted {
        last_consultation_at: DateTime<Utc>,
        next_allowed_at: DateTime<Utc>,
    },
    /// Another request for the same CNPJ+produto pair is in flight.
    ConsultationInProgress,
    /// The consultation reached the external registries and failed; the
    /// aggregated message is returned to the client.
    ConsultationFailed(String),
    /// Internal server error.
    InternalError(String),
    /// Unauthorized access error.
    Unauthorized(String),
    /// Error with context chain for better debugging.
    WithContext {
        source: Box<AppError>,
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound { message, .. } => write!(f, "Not found: {}", message),
            AppError::BadRequest { message, .. } => write!(f, "Bad request: {}", message),
            AppError::RecentlyConsulted { next_allowed_at, .. } => write!(
                f,
                "CNPJ recently consulted, next allowed at {}",
                next_allowed_at
            ),
            AppError::ConsultationInProgress => {
                write!(f, "A consultation for this CNPJ is already in progress")
            }
            AppError::ConsultationFailed(msg) => write!(f, "Consultation failed: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each variant to a status code and a JSON body of the form
    /// `{"success": false, "error": ..., "code": ..., "data": ...?}`.
    fn into_response(self) -> Response {
        let (status, code, error_message, data) = match &self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Database error".to_string(),
                    None,
                )
            }
            AppError::NotFound { code, message } => {
                (StatusCode::NOT_FOUND, *code, message.clone(), None)
            }
            AppError::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, *code, message.clone(), None)
            }
            AppError::RecentlyConsulted {
                last_consultation_at,
                next_allowed_at,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                "CNPJ_RECENTLY_CONSULTED",
                "This CNPJ was already consulted for this product in the last 3 months"
                    .to_string(),
                Some(json!({
                    "lastConsultationAt": last_consultation_at.to_rfc3339(),
                    "nextAllowedAt": next_allowed_at.to_rfc3339(),
                })),
            ),
            AppError::ConsultationInProgress => (
                StatusCode::TOO_MANY_REQUESTS,
                "CONSULTATION_IN_PROGRESS",
                "A consultation for this CNPJ and product is already in progress".to_string(),
                None,
            ),
            AppError::ConsultationFailed(msg) => {
                tracing::error!("Consultation failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONSULTATION_FAILED",
                    msg.clone(),
                    None,
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Unauthorized".to_string(),
                    None,
                )
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return source.clone().into_response();
            }
        };

        let mut body = json!({
            "success": false,
            "error": error_message,
            "code": code,
        });
        if let Some(data) = data {
            body["data"] = data;
        }

        (status, Json(body)).into_response()
    }
}

// Make AppError cloneable for WithContext variant
impl Clone for AppError {
    /// Note: `sqlx::Error` is not cloneable, so `DatabaseError` is
    /// simplified to `RowNotFound` during cloning.
    fn clone(&self) -> Self {
        match self {
            AppError::DatabaseError(_e) => AppError::DatabaseError(sqlx::Error::RowNotFound),
            AppError::NotFound { code, message } => AppError::NotFound {
                code,
                message: message.clone(),
            },
            AppError::BadRequest { code, message } => AppError::BadRequest {
                code,
                message: message.clone(),
            },
            AppError::RecentlyConsulted {
                last_consultation_at,
                next_allowed_at,
            } => AppError::RecentlyConsulted {
                last_consultation_at: *last_consultation_at,
                next_allowed_at: *next_allowed_at,
            },
            AppError::ConsultationInProgress => AppError::ConsultationInProgress,
            AppError::ConsultationFailed(msg) => AppError::ConsultationFailed(msg.clone()),
            AppError::InternalError(msg) => AppError::InternalError(msg.clone()),
            AppError::Unauthorized(msg) => AppError::Unauthorized(msg.clone()),
            AppError::WithContext { source, context } => AppError::WithContext {
                source: source.clone(),
                context: context.clone(),
            },
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }
}
