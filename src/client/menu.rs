//! Menu filtering by access rules

use crate::client::access::{AccessEvaluator, AccessRule};
use crate::client::session::SessionSnapshot;
use serde::{Deserialize, Serialize};

/// Form name of the menu item appended after login
pub const LOGOUT_FORM: &str = "Logout";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub title: String,
    pub form: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<AccessRule>,
}

impl MenuItem {
    pub fn new(title: impl Into<String>, form: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            form: form.into(),
            icon: None,
            rule: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_rule(mut self, rule: impl Into<AccessRule>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn logout() -> Self {
        Self::new("Logout", LOGOUT_FORM).with_icon("logout")
    }

    pub fn is_visible(&self, evaluator: &AccessEvaluator, session: &SessionSnapshot) -> bool {
        self.rule
            .as_ref()
            .is_none_or(|rule| evaluator.allow(rule, session))
    }
}

/// Items without a rule or with an allowed rule, order preserved
pub fn filter_menu<'a>(
    items: &'a [MenuItem],
    evaluator: &AccessEvaluator,
    session: &SessionSnapshot,
) -> Vec<&'a MenuItem> {
    items
        .iter()
        .filter(|item| item.is_visible(evaluator, session))
        .collect()
}

/// First visible item; the form to open after login
pub fn first_allowed<'a>(
    items: &'a [MenuItem],
    evaluator: &AccessEvaluator,
    session: &SessionSnapshot,
) -> Option<&'a MenuItem> {
    items.iter().find(|item| item.is_visible(evaluator, session))
}
