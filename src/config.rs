//! Store endpoint configuration.
//!
//! Precedence, highest first: explicit overrides (CLI flags), environment, TOML file, defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::DbError;

pub const DEFAULT_URL: &str = "file://racelite_data";
pub const DEFAULT_DATABASE: &str = "test";
pub const DEFAULT_COLLECTION: &str = "race1";

pub const ENV_URL: &str = "RACELITE_URL";
pub const ENV_DATABASE: &str = "RACELITE_DATABASE";
pub const ENV_COLLECTION: &str = "RACELITE_COLLECTION";
pub const ENV_CONFIG: &str = "RACELITE_CONFIG";
pub const LOCAL_CONFIG_FILE: &str = "racelite.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    pub database: String,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

/// A config file may set any subset of the keys.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    url: Option<String>,
    database: Option<String>,
    collection: Option<String>,
}

/// Reads a variable from the process environment.
#[must_use]
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl StoreConfig {
    /// Builds the configuration from defaults, the config file and the environment.
    ///
    /// The file is `config_path` when given, else `$RACELITE_CONFIG`, else `./racelite.toml`
    /// if present. `env` is the variable lookup, normally [`process_env`].
    ///
    /// # Errors
    /// `DbError::Config` when an explicitly named file is missing or any file is malformed.
    pub fn resolve(
        config_path: Option<&Path>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, DbError> {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        let explicit = config_path.map(Path::to_path_buf).or_else(|| lookup(ENV_CONFIG).map(PathBuf::from));
        let file = match explicit {
            Some(p) => Some(read_file(&p)?),
            None => {
                let local = PathBuf::from(LOCAL_CONFIG_FILE);
                if local.exists() { Some(read_file(&local)?) } else { None }
            }
        };
        if let Some(f) = file {
            if let Some(v) = f.url {
                cfg.url = v;
            }
            if let Some(v) = f.database {
                cfg.database = v;
            }
            if let Some(v) = f.collection {
                cfg.collection = v;
            }
        }

        if let Some(v) = lookup(ENV_URL) {
            cfg.url = v;
        }
        if let Some(v) = lookup(ENV_DATABASE) {
            cfg.database = v;
        }
        if let Some(v) = lookup(ENV_COLLECTION) {
            cfg.collection = v;
        }
        Ok(cfg)
    }

    /// Applies explicit overrides on top of the resolved values.
    #[must_use]
    pub fn with_overrides(
        mut self,
        url: Option<String>,
        database: Option<String>,
        collection: Option<String>,
    ) -> Self {
        if let Some(v) = url {
            self.url = v;
        }
        if let Some(v) = database {
            self.database = v;
        }
        if let Some(v) = collection {
            self.collection = v;
        }
        self
    }
}

fn read_file(path: &Path) -> Result<FileConfig, DbError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DbError::Config(format!("cannot read config {}: {e}", path.display())))?;
    toml::from_str::<FileConfig>(&text)
        .map_err(|e| DbError::Config(format!("invalid config {}: {e}", path.display())))
}
