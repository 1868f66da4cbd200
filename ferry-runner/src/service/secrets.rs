//! Environment-scoped secrets
//!
//! Secrets live in named scopes (`production`, `staging`, ...). A stage that
//! declares an `environment` gets that scope's table; other stages get none.
//!
//! Sources, later ones overriding earlier ones:
//! - a TOML file with one table per scope
//! - `FERRY_SECRET__<SCOPE>__<NAME>` variables
//!
//! Scope names are matched case-insensitively.

use ferry_core::domain::secret::{SecretTable, SecretValue};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const ENV_PREFIX: &str = "FERRY_SECRET__";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to read secrets file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid secrets file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default)]
pub struct SecretStore {
    scopes: BTreeMap<String, BTreeMap<String, SecretValue>>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a document such as `[production]\nDATABASE_URI = "..."`
    pub fn from_toml_str(source: &str) -> Result<Self, SecretError> {
        let parsed: BTreeMap<String, BTreeMap<String, SecretValue>> = toml::from_str(source)?;
        let mut store = Self::new();
        for (scope, values) in parsed {
            for (name, value) in values {
                store.insert(&scope, name, value);
            }
        }
        Ok(store)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SecretError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SecretError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Scope names are case-insensitive and stored lowercased
    pub fn insert(&mut self, scope: &str, name: impl Into<String>, value: SecretValue) {
        self.scopes
            .entry(scope.to_lowercase())
            .or_default()
            .insert(name.into(), value);
    }

    /// Applies `FERRY_SECRET__<SCOPE>__<NAME>` entries from the given variables
    pub fn with_overrides<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let Some((scope, name)) = rest.split_once("__") else {
                continue;
            };
            if scope.is_empty() || name.is_empty() {
                continue;
            }
            debug!(scope = %scope.to_lowercase(), name = %name, "Secret overridden from environment");
            self.insert(scope, name, SecretValue::new(value));
        }
        self
    }

    /// Applies overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(std::env::vars())
    }

    /// The secrets of a scope; no scope means no secrets
    pub fn scope(&self, scope: Option<&str>) -> SecretTable {
        scope
            .and_then(|s| self.scopes.get(&s.to_lowercase()))
            .map(|values| {
                values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_scopes_from_toml() {
        let store = SecretStore::from_toml_str(
            r#"
            [production]
            DATABASE_URI = "postgres://prod"
            DD_API_KEY = "dd-prod"

            [staging]
            DATABASE_URI = "postgres://staging"
            "#,
        )
        .unwrap();

        let production = store.scope(Some("production"));
        assert_eq!(
            production.get("DATABASE_URI").map(|v| v.expose()),
            Some("postgres://prod")
        );
        assert!(production.get("MISSING").is_none());

        let staging = store.scope(Some("staging"));
        assert!(staging.get("DD_API_KEY").is_none());

        assert!(store.scope(None).is_empty());
        assert!(store.scope(Some("unknown")).is_empty());
        assert_eq!(store.scopes().collect::<Vec<_>>(), vec!["production", "staging"]);
    }

    #[test]
    fn test_env_overrides() {
        let store = SecretStore::from_toml_str("[production]\nDATABASE_URI = \"from-file\"\n")
            .unwrap()
            .with_overrides(vec![
                (
                    "FERRY_SECRET__PRODUCTION__DATABASE_URI".to_string(),
                    "from-env".to_string(),
                ),
                ("FERRY_SECRET__STAGING__TOKEN".to_string(), "t".to_string()),
                ("FERRY_SECRET__BROKEN".to_string(), "x".to_string()),
                ("UNRELATED".to_string(), "y".to_string()),
            ]);

        assert_eq!(
            store
                .scope(Some("production"))
                .get("DATABASE_URI")
                .map(|v| v.expose()),
            Some("from-env")
        );
        assert!(store.scope(Some("staging")).get("TOKEN").is_some());
        assert_eq!(store.scopes().count(), 2);
    }

    #[test]
    fn test_scope_names_ignore_case() {
        let store = SecretStore::from_toml_str("[Production]\nDATABASE_URI = \"postgres://prod\"\n")
            .unwrap()
            .with_overrides(vec![(
                "FERRY_SECRET__PRODUCTION__SIGNING_KEY".to_string(),
                "key".to_string(),
            )]);

        assert_eq!(store.scopes().collect::<Vec<_>>(), vec!["production"]);
        for name in ["Production", "production", "PRODUCTION"] {
            let table = store.scope(Some(name));
            assert!(table.get("DATABASE_URI").is_some(), "{name}");
            assert!(table.get("SIGNING_KEY").is_some(), "{name}");
        }
    }

    #[test]
    fn test_invalid_file() {
        assert!(matches!(
            SecretStore::from_toml_str("production = 3"),
            Err(SecretError::Parse(_))
        ));
        assert!(matches!(
            SecretStore::from_file("/nonexistent/secrets.toml"),
            Err(SecretError::Io { .. })
        ));
    }
}
