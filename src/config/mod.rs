//! Configuration loading and management

use crate::client::menu::MenuItem;
use crate::core::entity::RelatedWrites;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Configuration for one entity handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Entity name, also the collection name (e.g., "Order")
    pub name: String,

    /// Related tables replaced on every put (e.g., ["lines"])
    #[serde(default)]
    pub tables: Vec<String>,

    /// Load related tables on reads
    #[serde(default)]
    pub eager: bool,

    #[serde(default)]
    pub related_writes: RelatedWrites,

    /// Restrict the exposed methods; all four when absent
    #[serde(default)]
    pub methods: Option<Vec<String>>,
}

impl EntityConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            eager: false,
            related_writes: RelatedWrites::default(),
            methods: None,
        }
    }
}

/// Client session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix of the durable storage keys (`<package>-auth`, `<package>-device`)
    pub package: String,

    /// Persist the session and restore it on start
    pub remember_session: bool,

    pub auth_path: String,
    pub renew_path: String,
    pub need_authorization_path: String,

    /// Upper bound for one renewal round-trip
    pub renewal_timeout_ms: u64,

    /// Never ask the server whether login is required
    pub skip_authorization: bool,

    /// Form opened when login is required
    pub auth_form: String,

    pub menu: Vec<MenuItem>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            package: "crudgate".to_string(),
            remember_session: true,
            auth_path: "/User/auth".to_string(),
            renew_path: "/User/renew".to_string(),
            need_authorization_path: "/User/needAuthorization".to_string(),
            renewal_timeout_ms: 10_000,
            skip_authorization: false,
            auth_form: "Auth".to_string(),
            menu: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn renewal_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.renewal_timeout_ms)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub entities: Vec<EntityConfig>,

    #[serde(default)]
    pub client: ClientConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Find an entity configuration by name
    pub fn entity(&self, name: &str) -> Option<&EntityConfig> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Create a default configuration for testing
    pub fn default_config() -> Self {
        Self {
            entities: vec![
                EntityConfig {
                    tables: vec!["lines".to_string()],
                    eager: true,
                    ..EntityConfig::new("Order")
                },
                EntityConfig::new("Customer"),
                EntityConfig {
                    methods: Some(vec!["get".to_string(), "query".to_string()]),
                    ..EntityConfig::new("Product")
                },
            ],
            client: ClientConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default_config();

        assert_eq!(config.entities.len(), 3);
        assert_eq!(config.client.renew_path, "/User/renew");
        assert!(config.entity("Order").is_some_and(|e| e.eager));
    }

    #[test]
    fn test_yaml_serialization() {
        let config = AppConfig::default_config();
        let yaml = serde_yaml::to_string(&config).unwrap();

        let parsed = AppConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
entities:
  - name: Order
    tables: [lines]
    related_writes: detached
client:
  package: shop
  renewal_timeout_ms: 500
  menu:
    - title: Orders
      form: OrderList
      rule: { entity: Order, method: query }
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        let order = config.entity("Order").unwrap();
        assert_eq!(order.related_writes, RelatedWrites::Detached);
        assert!(!order.eager);
        assert_eq!(config.client.package, "shop");
        assert!(config.client.remember_session);
        assert_eq!(config.client.renewal_timeout().as_millis(), 500);
        assert_eq!(config.client.auth_form, "Auth");
        assert_eq!(config.client.menu[0].rule.as_ref().map(|r| r.method.as_str()), Some("query"));
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.yaml");
        std::fs::write(&path, "entities:\n  - name: Customer\n").unwrap();

        let config = AppConfig::from_yaml_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.entities[0].name, "Customer");
        assert_eq!(config.client, ClientConfig::default());
    }
}
