//! The uniform `{response}` / `{error}` wrapper for all operation results

use crate::core::error::{ErrorBody, GateError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of every entity operation and every client request
///
/// Serializes to exactly `{"response": <value>}` or
/// `{"error": {"message": ..., "status"?: ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T = Value> {
    Response { response: T },
    Error { error: ErrorBody },
}

impl<T> Envelope<T> {
    pub fn ok(response: T) -> Self {
        Envelope::Response { response }
    }

    pub fn err(error: impl Into<ErrorBody>) -> Self {
        Envelope::Error {
            error: error.into(),
        }
    }

    pub fn from_result(result: Result<T, GateError>) -> Self {
        match result {
            Ok(response) => Envelope::ok(response),
            Err(err) => Envelope::err(err),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Envelope::Error { .. })
    }

    pub fn response(&self) -> Option<&T> {
        match self {
            Envelope::Response { response } => Some(response),
            Envelope::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            Envelope::Response { .. } => None,
            Envelope::Error { error } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, ErrorBody> {
        match self {
            Envelope::Response { response } => Ok(response),
            Envelope::Error { error } => Err(error),
        }
    }

    /// HTTP status matching this envelope (200 for success)
    pub fn status_code(&self) -> StatusCode {
        self.error()
            .and_then(|e| e.status)
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(if self.is_error() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            })
    }
}

impl<T: Serialize> Envelope<T> {
    /// Erase the response type, serializing the payload to JSON
    pub fn into_json(self) -> Envelope {
        match self {
            Envelope::Response { response } => match serde_json::to_value(response) {
                Ok(value) => Envelope::ok(value),
                Err(e) => Envelope::err(GateError::Internal(e.to_string())),
            },
            Envelope::Error { error } => Envelope::Error { error },
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let env = Envelope::ok(json!({"ok": true}));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"response": {"ok": true}})
        );
        assert_eq!(env.status_code(), StatusCode::OK);
    }

    #[test]
    fn test_error_shape() {
        let env: Envelope = Envelope::err(ErrorBody::new("gone", Some(404)));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"error": {"message": "gone", "status": 404}})
        );
        assert_eq!(env.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_parse_both_variants() {
        let ok: Envelope = serde_json::from_value(json!({"response": [1, 2]})).unwrap();
        assert_eq!(ok.response(), Some(&json!([1, 2])));

        let err: Envelope =
            serde_json::from_value(json!({"error": {"message": "token not valid"}})).unwrap();
        assert_eq!(err.error().map(|e| e.message.as_str()), Some("token not valid"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_null_response_is_still_success() {
        let env: Envelope = serde_json::from_value(json!({"response": null})).unwrap();
        assert!(!env.is_error());
    }
}
