//! Outbound request plumbing
//!
//! A [`Transport`] sends one request and always produces a [`Reply`]: the
//! HTTP status and the parsed envelope. Network failures are folded into an
//! error envelope so that callers only ever inspect envelopes.

use crate::core::envelope::Envelope;
use crate::core::error::{ErrorBody, GateError};
use crate::server::entity_registry::EntityRegistry;
use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;

/// Method, headers and JSON body of one request
#[derive(Debug, Clone)]
pub struct RequestParams {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl RequestParams {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    /// Set `Authorization: Bearer <token>`, replacing any previous value
    pub fn bearer(mut self, token: &str) -> Self {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => {
                self.headers.insert(AUTHORIZATION, value);
            }
            Err(e) => tracing::warn!(error = %e, "token is not a valid header value"),
        }
        self
    }

    /// Token carried in the authorization header, if any
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }
}

/// Status and envelope of a completed request
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub envelope: Envelope,
}

impl Reply {
    pub fn new(status: StatusCode, envelope: Envelope) -> Self {
        Self { status, envelope }
    }

    /// Reply whose status mirrors the envelope
    pub fn from_envelope(envelope: Envelope) -> Self {
        Self {
            status: envelope.status_code(),
            envelope,
        }
    }

    pub fn from_error(error: GateError) -> Self {
        Self {
            status: error.status_code(),
            envelope: Envelope::err(error),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, url: &str, params: RequestParams) -> Reply;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn request(&self, url: &str, params: RequestParams) -> Reply {
        (**self).request(url, params).await
    }
}

/// Transport calling an in-process [`EntityRegistry`]
///
/// URLs have the `/{entity}/{method}` form served by the REST exposure.
#[derive(Clone)]
pub struct LocalTransport {
    registry: Arc<EntityRegistry>,
}

impl LocalTransport {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn request(&self, url: &str, params: RequestParams) -> Reply {
        let path = url.split('?').next().unwrap_or_default();
        let mut segments = path.trim_matches('/').split('/');
        let (Some(entity), Some(method), None) = (segments.next(), segments.next(), segments.next()) else {
            return Reply::from_error(GateError::BadRequest {
                message: format!("'{}' is not an entity method url", url),
            });
        };
        let envelope = self
            .registry
            .dispatch(entity, method, params.body.unwrap_or(Value::Null))
            .await;
        Reply::from_envelope(envelope)
    }
}

/// Transport over HTTP, resolving urls against a base url
#[cfg(feature = "http-client")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

#[cfg(feature = "http-client")]
impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[cfg(feature = "http-client")]
#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, url: &str, params: RequestParams) -> Reply {
        let mut request = self
            .client
            .request(params.method, format!("{}{}", self.base_url, url))
            .headers(params.headers);
        if let Some(body) = &params.body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%url, error = %e, "request failed");
                return Reply::from_error(GateError::Transport {
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();
        match response.json::<Envelope>().await {
            Ok(envelope) => Reply::new(status, envelope),
            Err(_) if !status.is_success() => {
                let reason = status.canonical_reason().unwrap_or("request failed");
                Reply::new(status, Envelope::err(ErrorBody::new(reason, Some(status.as_u16()))))
            }
            Err(e) => Reply::new(
                status,
                Envelope::err(GateError::Transport {
                    message: format!("response is not an envelope: {}", e),
                }),
            ),
        }
    }
}
