//! Connection and mapper configuration.
//!
//! Loaded from a TOML file, then overridden by `NEOGM_*` environment
//! variables, then validated.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use neogm_core::{OgmError, OgmResult};

use crate::load_strategy::LoadStrategy;

/// What [`crate::Ogm::init`] does with the declared schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStrategy {
    /// Drop everything, then create the declared schema.
    Assert,
    /// Fail when the database schema differs from the declared one.
    Validate,
    #[default]
    Ignore,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OgmConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: usize,
    pub fetch_size: usize,
    pub default_depth: i32,
    pub load_strategy: LoadStrategy,
    pub index_strategy: IndexStrategy,
}

impl Default for OgmConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
            database: "neo4j".to_string(),
            max_connections: 4,
            fetch_size: 200,
            default_depth: crate::session::DEFAULT_DEPTH,
            load_strategy: LoadStrategy::Path,
            index_strategy: IndexStrategy::Ignore,
        }
    }
}

impl OgmConfig {
    /// Parse a TOML configuration file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> OgmResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| OgmError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Override connection settings from `NEOGM_URI`, `NEOGM_USER`,
    /// `NEOGM_PASSWORD` and `NEOGM_DATABASE`.
    pub fn apply_env(self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        for (key, slot) in [
            ("NEOGM_URI", &mut self.uri),
            ("NEOGM_USER", &mut self.user),
            ("NEOGM_PASSWORD", &mut self.password),
            ("NEOGM_DATABASE", &mut self.database),
        ] {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = value;
            }
        }
        self
    }

    pub fn validate(&self) -> OgmResult<()> {
        if self.uri.trim().is_empty() {
            return Err(OgmError::Config("uri must not be empty".to_string()));
        }
        if !["bolt://", "bolt+s://", "bolt+ssc://", "neo4j://", "neo4j+s://", "neo4j+ssc://"]
            .iter()
            .any(|scheme| self.uri.starts_with(scheme))
        {
            return Err(OgmError::Config(format!("unsupported uri scheme in '{}'", self.uri)));
        }
        if self.max_connections == 0 {
            return Err(OgmError::Config("max_connections must be at least 1".to_string()));
        }
        if self.fetch_size == 0 {
            return Err(OgmError::Config("fetch_size must be at least 1".to_string()));
        }
        if self.default_depth < 0 {
            return Err(OgmError::Config(format!(
                "default_depth must not be negative, got {}",
                self.default_depth
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = OgmConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_depth, 1);
        assert_eq!(config.index_strategy, IndexStrategy::Ignore);
    }

    #[test]
    fn test_partial_toml() {
        let config: OgmConfig = toml::from_str(
            r#"
            uri = "neo4j://db.internal:7687"
            index_strategy = "validate"
            load_strategy = "path"
            "#,
        )
        .unwrap();
        assert_eq!(config.uri, "neo4j://db.internal:7687");
        assert_eq!(config.index_strategy, IndexStrategy::Validate);
        assert_eq!(config.user, "neo4j");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [("NEOGM_PASSWORD", "secret"), ("NEOGM_USER", "")].into();
        let config = OgmConfig::default().apply_vars(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.password, "secret");
        assert_eq!(config.user, "neo4j");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = OgmConfig {
            uri: "http://localhost:7474".to_string(),
            ..OgmConfig::default()
        };
        assert!(matches!(config.validate(), Err(OgmError::Config(_))));

        let config = OgmConfig {
            default_depth: -1,
            ..OgmConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("neogm-config-{}.toml", std::process::id()));
        std::fs::write(&path, "max_connections = 8\n").unwrap();
        let config = OgmConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.max_connections, 8);

        assert!(matches!(OgmConfig::from_file(&path), Err(OgmError::Io(_))));
    }
}
