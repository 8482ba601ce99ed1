//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Problems found while declaring or resolving entities. Always fatal at startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("schema reference: {context} references undeclared entity '{name}'")]
    Reference { context: String, name: String },
    #[error("schema conflict: {0}")]
    Conflict(String),
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),
    #[error("invalid field {entity}.{field}: {reason}")]
    InvalidField {
        entity: String,
        field: String,
        reason: String,
    },
    #[error("unknown field {entity}.{field}")]
    UnknownField { entity: String, field: String },
    #[error("invalid cardinality '{0}' (expected 1, 0..1, 1..*, 0..* or *)")]
    InvalidCardinality(String),
}

/// Router declaration errors plus the recoverable lookup miss.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("invalid route template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error("route '{0}' is already declared")]
    Duplicate(String),
    #[error("handler for '{template}' must accept parameter '{parameter}'")]
    MissingParameter { template: String, parameter: String },
    #[error("parameter '{parameter}' appears more than once in '{template}'")]
    RepeatedParameter { template: String, parameter: String },
    #[error("route not found: {0}")]
    NotFound(String),
}

impl RouteError {
    /// Whether this is a lookup miss rather than a declaration error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RouteError::NotFound(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("route: {0}")]
    Route(RouteError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("integrity violation: {0}")]
    Integrity(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
}

impl From<RouteError> for AppError {
    fn from(e: RouteError) -> Self {
        match e {
            RouteError::NotFound(path) => AppError::NotFound(path),
            other => AppError::Route(other),
        }
    }
}

impl AppError {
    /// Stable machine-readable kind used in the error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Schema(_) => "schema_error",
            AppError::Config(_) => "config_error",
            AppError::Route(_) => "route_error",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation_error",
            AppError::Integrity(_) => "integrity_error",
            AppError::Db(_) => "database_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::MethodNotAllowed(_) => "method_not_allowed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Schema(_) | AppError::Config(_) | AppError::Route(_) | AppError::Db(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Integrity(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
