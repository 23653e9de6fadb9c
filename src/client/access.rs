//! Access rules: may the current user call a given entity method?

use crate::client::session::{SessionSnapshot, UserIdentity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An `(entity, method)` pair guarding a feature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessRule {
    pub entity: String,
    pub method: String,
}

impl AccessRule {
    pub fn new(entity: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            method: method.into(),
        }
    }
}

impl From<(&str, &str)> for AccessRule {
    fn from((entity, method): (&str, &str)) -> Self {
        Self::new(entity, method)
    }
}

impl From<&AccessRule> for AccessRule {
    fn from(rule: &AccessRule) -> Self {
        rule.clone()
    }
}

/// Everything a policy gets to decide on
#[derive(Debug, Clone, Copy)]
pub struct AllowRequest<'a> {
    pub entity: &'a str,
    pub method: &'a str,
    pub user: Option<&'a UserIdentity>,
    pub user_roles: &'a [String],
}

/// Application supplied authorization decision
pub trait AllowPolicy: Send + Sync {
    fn allow(&self, request: &AllowRequest<'_>) -> bool;
}

impl<F> AllowPolicy for F
where
    F: Fn(&AllowRequest<'_>) -> bool + Send + Sync,
{
    fn allow(&self, request: &AllowRequest<'_>) -> bool {
        self(request)
    }
}

/// Policy permitting everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AllowPolicy for AllowAll {
    fn allow(&self, _request: &AllowRequest<'_>) -> bool {
        true
    }
}

#[derive(Clone)]
pub struct AccessEvaluator {
    policy: Arc<dyn AllowPolicy>,
}

impl AccessEvaluator {
    pub fn new(policy: impl AllowPolicy + 'static) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    /// Evaluator deciding with a plain function
    pub fn from_fn<F>(policy: F) -> Self
    where
        F: Fn(&AllowRequest<'_>) -> bool + Send + Sync + 'static,
    {
        Self::new(policy)
    }

    pub fn allow_all() -> Self {
        Self::new(AllowAll)
    }

    /// Evaluate `rule` against the user and roles of `session`
    pub fn allow(&self, rule: impl Into<AccessRule>, session: &SessionSnapshot) -> bool {
        let rule = rule.into();
        self.policy.allow(&AllowRequest {
            entity: &rule.entity,
            method: &rule.method,
            user: session.user.as_ref(),
            user_roles: &session.roles,
        })
    }
}

impl Default for AccessEvaluator {
    fn default() -> Self {
        Self::allow_all()
    }
}
