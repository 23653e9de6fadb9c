//! Authenticated request wrapper with transparent token renewal

use crate::client::session::{AuthPayload, SessionStore};
use crate::client::transport::{Reply, RequestParams, Transport};
use crate::config::ClientConfig;
use crate::core::error::GateError;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;

/// Sends requests on behalf of the session
///
/// While authenticated every request carries the bearer token. A 401 on
/// anything but the renewal endpoint triggers one renewal and one retry with
/// the fresh token. A failed renewal logs the session out and yields
/// `{"error": {"message": "token not valid"}}`.
pub struct AuthenticatedRequester<T> {
    transport: T,
    session: SessionStore,
    renew_path: String,
    renewal_timeout: Duration,
    renewal: Mutex<()>,
}

impl<T: Transport> AuthenticatedRequester<T> {
    pub fn new(transport: T, session: SessionStore) -> Self {
        Self::from_config(transport, session, &ClientConfig::default())
    }

    pub fn from_config(transport: T, session: SessionStore, config: &ClientConfig) -> Self {
        Self {
            transport,
            session,
            renew_path: config.renew_path.clone(),
            renewal_timeout: config.renewal_timeout(),
            renewal: Mutex::new(()),
        }
    }

    pub fn with_renewal_timeout(mut self, timeout: Duration) -> Self {
        self.renewal_timeout = timeout;
        self
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn post(&self, url: &str, body: Value) -> Reply {
        self.request(url, RequestParams::post(body)).await
    }

    pub async fn request(&self, url: &str, params: RequestParams) -> Reply {
        let Some(token) = self.session.token() else {
            return self.transport.request(url, params).await;
        };

        let reply = self.transport.request(url, params.clone().bearer(&token)).await;
        if !reply.is_unauthorized() || self.is_renewal(url) {
            return reply;
        }

        tracing::debug!(%url, "token rejected, renewing");
        match self.renew(&token).await {
            Ok(fresh) => self.transport.request(url, params.bearer(&fresh)).await,
            Err(err) => {
                tracing::warn!(error = ?err, "token renewal failed");
                self.session.logout_token(&token);
                Reply::from_error(err)
            }
        }
    }

    fn is_renewal(&self, url: &str) -> bool {
        let path = url.split('?').next().unwrap_or_default();
        path.trim_end_matches('/').ends_with(self.renew_path.as_str())
    }

    /// Exchange `stale` for a fresh token, at most one renewal in flight
    async fn renew(&self, stale: &str) -> Result<String, GateError> {
        let _guard = self.renewal.lock().await;

        match self.session.token() {
            Some(current) if current != stale => return Ok(current),
            Some(_) => {}
            None => {
                return Err(GateError::RenewalFailed {
                    reason: "session ended during renewal".to_string(),
                });
            }
        }
        let request = self.session.renewal_request().ok_or_else(|| GateError::RenewalFailed {
            reason: "no user to renew".to_string(),
        })?;
        let body = serde_json::to_value(&request).map_err(|e| GateError::Internal(e.to_string()))?;

        self.session.mark_renewal_pending();
        let call = self
            .transport
            .request(&self.renew_path, RequestParams::post(body).bearer(stale));
        let reply = tokio::time::timeout(self.renewal_timeout, call)
            .await
            .map_err(|_| GateError::RenewalFailed {
                reason: format!("no answer within {:?}", self.renewal_timeout),
            })?;

        let response = reply
            .envelope
            .into_result()
            .map_err(|e| GateError::RenewalFailed { reason: e.message })?;
        let payload: AuthPayload = serde_json::from_value(response).map_err(|e| GateError::RenewalFailed {
            reason: format!("malformed renewal response: {}", e),
        })?;

        let fresh = payload.token.clone();
        if !self.session.complete_renewal(stale, payload) {
            return Err(GateError::RenewalFailed {
                reason: "session changed during renewal".to_string(),
            });
        }
        tracing::info!("token renewed");
        Ok(fresh)
    }
}
