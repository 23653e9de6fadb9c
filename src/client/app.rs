//! Client application: session, requester, access rules and menu together

use crate::client::access::{AccessEvaluator, AccessRule};
use crate::client::menu::{LOGOUT_FORM, MenuItem, filter_menu};
use crate::client::requester::AuthenticatedRequester;
use crate::client::session::{AuthPayload, SessionStore};
use crate::client::storage::DurableStorage;
use crate::client::transport::{Reply, RequestParams, Transport};
use crate::config::ClientConfig;
use crate::core::error::ErrorBody;
use serde_json::{Value, json};
use std::sync::Arc;

/// What to show once [`ClientApp::start`] returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Startup {
    /// The menu is usable
    Ready,
    /// Open the login form first
    RequireLogin { form: String },
}

/// Menu header for the logged-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLabel {
    pub title: String,
    /// Title of the user's first role
    pub role: Option<String>,
}

pub struct ClientApp<T> {
    requester: AuthenticatedRequester<T>,
    evaluator: AccessEvaluator,
    menu: Vec<MenuItem>,
    config: ClientConfig,
}

impl<T: Transport> ClientApp<T> {
    pub fn new(transport: T, storage: Arc<dyn DurableStorage>, config: ClientConfig) -> Self {
        let session = SessionStore::from_config(storage, &config);
        Self {
            requester: AuthenticatedRequester::from_config(transport, session, &config),
            evaluator: AccessEvaluator::allow_all(),
            menu: config.menu.clone(),
            config,
        }
    }

    pub fn with_evaluator(mut self, evaluator: AccessEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_menu(mut self, menu: Vec<MenuItem>) -> Self {
        self.menu = menu;
        self
    }

    pub fn session(&self) -> &SessionStore {
        self.requester.session()
    }

    pub fn requester(&self) -> &AuthenticatedRequester<T> {
        &self.requester
    }

    pub fn menu(&self) -> &[MenuItem] {
        &self.menu
    }

    /// Restore the saved session, then decide whether login is needed
    pub async fn start(&mut self) -> Startup {
        if let Err(e) = self.session().restore() {
            tracing::warn!(error = %e, "starting without saved session");
        }
        if self.session().is_authenticated() {
            self.ensure_logout_item();
            return Startup::Ready;
        }
        if self.config.skip_authorization {
            return Startup::Ready;
        }

        let reply = self
            .requester
            .post(&self.config.need_authorization_path, json!({ "data": {} }))
            .await;
        let need = match reply.envelope.response() {
            Some(Value::Object(answer)) => answer
                .get("needAuthorization")
                .is_some_and(|v| v.as_bool().unwrap_or(!v.is_null())),
            Some(Value::Null) | None => true,
            Some(_) => false,
        };
        tracing::debug!(need_authorization = need, "authorization check");

        if need {
            Startup::RequireLogin {
                form: self.config.auth_form.clone(),
            }
        } else {
            self.config.skip_authorization = true;
            Startup::Ready
        }
    }

    /// Log in and return the form to open, if any item is visible
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Option<String>, ErrorBody> {
        self.session().begin_authentication();
        let body = json!({ "data": { "username": username, "password": password } });
        let reply = self.requester.post(&self.config.auth_path, body).await;

        let payload = reply.envelope.into_result().and_then(|response| {
            serde_json::from_value::<AuthPayload>(response)
                .map_err(|e| ErrorBody::new(format!("malformed auth response: {}", e), None))
        });
        match payload {
            Ok(payload) => {
                self.session().authenticate(payload);
                self.ensure_logout_item();
                Ok(self.landing_form())
            }
            Err(e) => {
                tracing::warn!(%username, message = %e.message, "login rejected");
                self.session().fail_authentication();
                Err(e)
            }
        }
    }

    /// End the session; returns the form to show next
    pub fn logout(&self) -> String {
        self.session().logout();
        self.config.auth_form.clone()
    }

    pub fn visible_menu(&self) -> Vec<&MenuItem> {
        filter_menu(&self.menu, &self.evaluator, &self.session().snapshot())
    }

    pub fn allow(&self, rule: impl Into<AccessRule>) -> bool {
        self.evaluator.allow(rule, &self.session().snapshot())
    }

    pub fn user_label(&self) -> Option<UserLabel> {
        let snapshot = self.session().snapshot();
        let user = snapshot.user?;
        let role = user
            .roles
            .first()
            .and_then(|role| snapshot.role_metadata.get(role))
            .map(|meta| meta.title.clone());
        Some(UserLabel {
            title: user.title,
            role,
        })
    }

    pub async fn request(&self, url: &str, params: RequestParams) -> Reply {
        self.requester.request(url, params).await
    }

    fn ensure_logout_item(&mut self) {
        if !self.menu.iter().any(|item| item.form == LOGOUT_FORM) {
            self.menu.push(MenuItem::logout());
        }
    }

    fn landing_form(&self) -> Option<String> {
        self.visible_menu()
            .into_iter()
            .find(|item| item.form != LOGOUT_FORM)
            .map(|item| item.form.clone())
    }
}
