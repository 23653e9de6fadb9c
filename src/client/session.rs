//! Client session state
//!
//! A [`SessionStore`] is the single holder of the current token, device id,
//! user identity and roles. It is a cheap handle: clones share the same
//! state, so the requester, the access evaluator and the application all
//! observe one session. Only login, renewal and logout write it.
//!
//! Lifecycle:
//!
//! ```text
//! Anonymous ──login──▶ Authenticating ──ok──▶ Authenticated ◀──ok── RenewalPending
//!     ▲                     │                      │                  │
//!     └────────fail─────────┘                      └──────401─────────┘
//!     ▲                                                               │
//!     └──────────────────── logout / renewal failure ─────────────────┘
//! ```

use crate::client::storage::{DurableStorage, MemoryStorage};
use crate::config::ClientConfig;
use crate::core::error::GateError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
    RenewalPending,
}

/// Identity record of the logged-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub uuid: Uuid,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Descriptive record of a role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleMetadata {
    #[serde(default)]
    pub title: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Successful login or renewal response; also the persisted session format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub token: String,

    pub user: UserIdentity,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default, alias = "rolesProps")]
    pub role_metadata: HashMap<String, RoleMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

/// Body of the renewal call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalRequest {
    pub uuid: Uuid,
    pub token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

/// Point-in-time copy of the session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub token: Option<String>,
    pub device: Option<String>,
    pub user: Option<UserIdentity>,
    pub roles: Vec<String>,
    pub role_metadata: HashMap<String, RoleMetadata>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn authenticated(payload: AuthPayload, device: Option<String>) -> Self {
        Self {
            phase: SessionPhase::Authenticated,
            token: Some(payload.token),
            device,
            user: Some(payload.user),
            roles: payload.roles,
            role_metadata: payload.role_metadata,
        }
    }
}

/// Shared handle on the client session
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<SessionSnapshot>>,
    storage: Arc<dyn DurableStorage>,
    auth_key: Arc<str>,
    device_key: Arc<str>,
    remember: bool,
}

impl SessionStore {
    /// Create an empty session persisted under `<package>-auth` / `<package>-device`
    pub fn new(storage: Arc<dyn DurableStorage>, package: &str, remember: bool) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionSnapshot::default())),
            storage,
            auth_key: Arc::from(format!("{}-auth", package)),
            device_key: Arc::from(format!("{}-device", package)),
            remember,
        }
    }

    pub fn from_config(storage: Arc<dyn DurableStorage>, config: &ClientConfig) -> Self {
        Self::new(storage, &config.package, config.remember_session)
    }

    /// Session that is never persisted
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), "crudgate", false)
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionSnapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionSnapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.read().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.read().phase
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn device(&self) -> Option<String> {
        self.read().device.clone()
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    pub fn auth_key(&self) -> &str {
        &self.auth_key
    }

    pub fn device_key(&self) -> &str {
        &self.device_key
    }

    /// Anonymous → Authenticating, before the login call goes out
    pub fn begin_authentication(&self) {
        let mut state = self.write();
        if state.phase == SessionPhase::Anonymous {
            state.phase = SessionPhase::Authenticating;
        }
    }

    /// Authenticating → Anonymous, when the login call was rejected
    pub fn fail_authentication(&self) {
        let mut state = self.write();
        if state.phase == SessionPhase::Authenticating {
            state.phase = SessionPhase::Anonymous;
        }
    }

    /// Authenticated → RenewalPending
    pub fn mark_renewal_pending(&self) {
        let mut state = self.write();
        if state.token.is_some() {
            state.phase = SessionPhase::RenewalPending;
        }
    }

    /// Install the result of a successful login or renewal
    pub fn authenticate(&self, payload: AuthPayload) {
        let mut state = self.write();
        self.install(&mut state, payload);
    }

    /// Install a renewed token only if the session still holds `stale`
    ///
    /// Returns false when a logout or another login replaced the session
    /// while the renewal was in flight; nothing is written in that case.
    pub fn complete_renewal(&self, stale: &str, payload: AuthPayload) -> bool {
        let mut state = self.write();
        if state.phase != SessionPhase::RenewalPending || state.token.as_deref() != Some(stale) {
            tracing::warn!(phase = ?state.phase, "session changed during renewal, discarding token");
            return false;
        }
        self.install(&mut state, payload);
        true
    }

    fn install(&self, state: &mut SessionSnapshot, payload: AuthPayload) {
        let device = payload.device.clone().or_else(|| state.device.take());
        if self.remember {
            self.persist(&payload, device.as_deref());
        }
        tracing::info!(user = %payload.user.uuid, "session authenticated");
        *state = SessionSnapshot::authenticated(payload, device);
    }

    fn persist(&self, payload: &AuthPayload, device: Option<&str>) {
        let saved = AuthPayload {
            device: None,
            ..payload.clone()
        };
        let result = serde_json::to_string(&saved)
            .map_err(|e| e.to_string())
            .and_then(|json| self.storage.set(&self.auth_key, &json).map_err(|e| e.to_string()));
        if let Err(e) = result {
            tracing::warn!(key = %self.auth_key, error = %e, "could not save session");
        }

        if let Some(device) = device {
            if let Err(e) = self.storage.set(&self.device_key, device) {
                tracing::warn!(key = %self.device_key, error = %e, "could not save device");
            }
        }
    }

    /// What the renewal endpoint needs; `None` without a token and user
    pub fn renewal_request(&self) -> Option<RenewalRequest> {
        let state = self.read();
        Some(RenewalRequest {
            uuid: state.user.as_ref()?.uuid,
            token: state.token.clone()?,
            device: state.device.clone(),
        })
    }

    /// Unconditional transition to Anonymous; forgets the saved session
    pub fn logout(&self) {
        self.end(None);
    }

    /// Logout only while the session still holds `token`
    ///
    /// Returns false when a newer login already replaced it.
    pub fn logout_token(&self, token: &str) -> bool {
        self.end(Some(token))
    }

    fn end(&self, only: Option<&str>) -> bool {
        {
            let mut state = self.write();
            if only.is_some_and(|token| state.token.as_deref() != Some(token)) {
                return false;
            }
            let device = state.device.take();
            *state = SessionSnapshot {
                device,
                ..SessionSnapshot::default()
            };
        }
        if let Err(e) = self.storage.remove(&self.auth_key) {
            tracing::warn!(key = %self.auth_key, error = %e, "could not remove saved session");
        }
        tracing::info!("session logged out");
        true
    }

    /// Restore the saved session, once at startup
    ///
    /// Returns whether the session is authenticated afterwards. A corrupt
    /// saved session is reported as [`GateError::PersistedSessionCorrupt`]
    /// and leaves the session Anonymous.
    pub fn restore(&self) -> Result<bool, GateError> {
        if self.is_authenticated() {
            return Ok(true);
        }
        if !self.remember {
            return Ok(false);
        }

        let corrupt = |message: String| {
            tracing::warn!(key = %self.auth_key, %message, "saved session is corrupt");
            GateError::PersistedSessionCorrupt {
                key: self.auth_key.to_string(),
                message,
            }
        };

        let Some(saved) = self.storage.get(&self.auth_key).map_err(|e| corrupt(e.to_string()))? else {
            return Ok(false);
        };
        let payload: AuthPayload = serde_json::from_str(&saved).map_err(|e| corrupt(e.to_string()))?;
        let device = self.storage.get(&self.device_key).ok().flatten();

        tracing::info!(user = %payload.user.uuid, "session restored");
        let mut state = self.write();
        let device = device.or_else(|| state.device.take());
        *state = SessionSnapshot::authenticated(payload, device);
        Ok(true)
    }
}
