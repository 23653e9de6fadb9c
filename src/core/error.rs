//! Typed error handling for crudgate
//!
//! Every failure that can surface through an entity handler, the REST
//! exposure or the client session layer is a [`GateError`]. Errors never
//! cross the entity handler boundary as `Err`: they are folded into the
//! uniform envelope via [`GateError::to_body`].
//!
//! # Example
//!
//! ```rust,ignore
//! use crudgate::prelude::*;
//!
//! match handler.get(GetParams { uuid }).await.into_result() {
//!     Ok(item) => println!("Found: {}", item),
//!     Err(body) if body.status == Some(404) => println!("{} not found", uuid),
//!     Err(body) => eprintln!("Other error: {}", body.message),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Message returned to the caller when token renewal did not succeed
pub const TOKEN_NOT_VALID: &str = "token not valid";

/// The main error type for crudgate
#[derive(Debug, Clone, PartialEq)]
pub enum GateError {
    /// Item is missing on get, update or delete
    NotFound { entity: String, id: Uuid },

    /// No handler is registered under this entity name
    UnknownEntity { entity: String },

    /// The entity does not expose this method
    UnknownMethod { entity: String, method: String },

    /// The entity exposes the method but it is restricted
    Forbidden { entity: String, method: String },

    /// Malformed request data
    BadRequest { message: String },

    /// A `$`-prefixed condition key has no native operator
    UnknownOperator { operator: String },

    /// The renewal endpoint rejected the token, timed out or answered garbage
    RenewalFailed { reason: String },

    /// Durable storage holds a session that cannot be parsed
    PersistedSessionCorrupt { key: String, message: String },

    /// The persistence collaborator failed
    Storage { operation: String, message: String },

    /// The HTTP transport failed before a reply was received
    Transport { message: String },

    /// Should not happen in normal operation
    Internal(String),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::NotFound { entity, id } => {
                write!(f, "Can't find {} item '{}'", entity, id)
            }
            GateError::UnknownEntity { entity } => write!(f, "Unknown entity: {}", entity),
            GateError::UnknownMethod { entity, method } => {
                write!(f, "Entity {} has no method '{}'", entity, method)
            }
            GateError::Forbidden { entity, method } => {
                write!(f, "Method '{}' of {} is not allowed", method, entity)
            }
            GateError::BadRequest { message } => write!(f, "Bad request: {}", message),
            GateError::UnknownOperator { operator } => {
                write!(f, "Unknown query operator: ${}", operator)
            }
            GateError::RenewalFailed { .. } => f.write_str(TOKEN_NOT_VALID),
            GateError::PersistedSessionCorrupt { key, message } => {
                write!(f, "Saved session '{}' is corrupt: {}", key, message)
            }
            GateError::Storage { operation, message } => {
                write!(f, "Failed to {}: {}", operation, message)
            }
            GateError::Transport { message } => write!(f, "Transport error: {}", message),
            GateError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for GateError {}

/// Error part of the wire envelope: `{"message": ..., "status"?: ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }
}

impl GateError {
    /// Wrap a collaborator failure
    pub fn storage(operation: impl Into<String>, err: impl fmt::Display) -> Self {
        GateError::Storage {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::NotFound { .. } => StatusCode::NOT_FOUND,
            GateError::UnknownEntity { .. } => StatusCode::NOT_FOUND,
            GateError::UnknownMethod { .. } => StatusCode::NOT_FOUND,
            GateError::Forbidden { .. } => StatusCode::FORBIDDEN,
            GateError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            GateError::UnknownOperator { .. } => StatusCode::BAD_REQUEST,
            GateError::RenewalFailed { .. } => StatusCode::UNAUTHORIZED,
            GateError::PersistedSessionCorrupt { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Transport { .. } => StatusCode::BAD_GATEWAY,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            GateError::NotFound { .. } => "NOT_FOUND",
            GateError::UnknownEntity { .. } => "UNKNOWN_ENTITY",
            GateError::UnknownMethod { .. } => "UNKNOWN_METHOD",
            GateError::Forbidden { .. } => "FORBIDDEN",
            GateError::BadRequest { .. } => "BAD_REQUEST",
            GateError::UnknownOperator { .. } => "UNKNOWN_OPERATOR",
            GateError::RenewalFailed { .. } => "RENEWAL_FAILED",
            GateError::PersistedSessionCorrupt { .. } => "PERSISTED_SESSION_CORRUPT",
            GateError::Storage { .. } => "STORAGE_ERROR",
            GateError::Transport { .. } => "TRANSPORT_ERROR",
            GateError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Status carried in the envelope body
    ///
    /// Client-side failures (renewal, transport) have no server status and
    /// leave the field out, so a failed renewal serializes to exactly
    /// `{"message": "token not valid"}`.
    pub fn wire_status(&self) -> Option<u16> {
        match self {
            GateError::RenewalFailed { .. } | GateError::Transport { .. } => None,
            _ => Some(self.status_code().as_u16()),
        }
    }

    /// Convert to the error part of the envelope
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.to_string(), self.wire_status())
    }
}

impl From<GateError> for ErrorBody {
    fn from(err: GateError) -> Self {
        err.to_body()
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.to_body() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_and_status() {
        let err = GateError::NotFound {
            entity: "Order".to_string(),
            id: Uuid::nil(),
        };
        assert!(err.to_string().contains("Order"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_body().status, Some(404));
    }

    #[test]
    fn test_renewal_failed_body_has_no_status() {
        let err = GateError::RenewalFailed {
            reason: "expired".to_string(),
        };
        let body = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(body, serde_json::json!({ "message": "token not valid" }));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unknown_operator_is_bad_request() {
        let err = GateError::UnknownOperator {
            operator: "near".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "UNKNOWN_OPERATOR");
        assert!(err.to_string().contains("$near"));
    }

    #[test]
    fn test_storage_helper() {
        let err = GateError::storage("update Order", "disk full");
        assert_eq!(err.to_string(), "Failed to update Order: disk full");
        assert_eq!(err.wire_status(), Some(500));
    }

    #[test]
    fn test_error_body_deserializes_without_status() {
        let body: ErrorBody = serde_json::from_str(r#"{"message":"x"}"#).unwrap();
        assert_eq!(body, ErrorBody::new("x", None));
    }
}
