//! Layered settings: CLI flags > environment > TOML files > built-in defaults.
use crate::errors::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DB: &str = "plp_bookstore";
pub const DEFAULT_COLLECTION: &str = "books";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const CONFIG_FILE: &str = "bookstore.toml";

/// One configuration layer. Unset fields fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub uri: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl AppConfig {
    /// Fills every unset field from `lower`.
    #[must_use]
    pub fn or(self, lower: Self) -> Self {
        Self {
            uri: self.uri.or(lower.uri),
            database: self.database.or(lower.database),
            collection: self.collection.or(lower.collection),
            log_dir: self.log_dir.or(lower.log_dir),
            log_level: self.log_level.or(lower.log_level),
        }
    }

    /// Reads `BOOKSTORE_*` variables through `get`.
    pub fn from_env_with(get: impl Fn(&str) -> Option<String>) -> Self {
        let var = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        Self {
            uri: var("BOOKSTORE_URI"),
            database: var("BOOKSTORE_DB"),
            collection: var("BOOKSTORE_COLLECTION"),
            log_dir: var("BOOKSTORE_LOG_DIR").map(PathBuf::from),
            log_level: var("BOOKSTORE_LOG_LEVEL"),
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// # Errors
    /// Returns `StoreError::Io` when the file cannot be read and `StoreError::Config` when it is
    /// not valid TOML for this shape.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))
    }

    /// Merges discovered config files, earlier candidates winning. Malformed files are skipped;
    /// one warning per skipped file is returned for the caller to log once logging is up.
    #[must_use]
    pub fn discover(candidates: &[PathBuf]) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();
        let merged = candidates.iter().filter(|p| p.is_file()).fold(Self::default(), |acc, p| {
            match Self::from_file(p) {
                Ok(file) => acc.or(file),
                Err(e) => {
                    warnings.push(format!("ignoring config file: {e}"));
                    acc
                }
            }
        });
        (merged, warnings)
    }

    #[must_use]
    pub fn into_settings(self) -> Settings {
        Settings {
            uri: self.uri.unwrap_or_else(|| DEFAULT_URI.to_string()),
            database: self.database.unwrap_or_else(|| DEFAULT_DB.to_string()),
            collection: self.collection.unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            log_dir: self.log_dir.unwrap_or_else(|| PathBuf::from("logs")),
            log_level: self.log_level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }
}

/// Config files probed when no explicit `--config` is given: `$BOOKSTORE_CONFIG`, the user
/// config directory, then the working directory.
#[must_use]
pub fn candidate_paths(env_config: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = env_config {
        paths.push(p);
    }
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join(CONFIG_FILE));
    }
    paths.push(PathBuf::from(CONFIG_FILE));
    paths
}

/// Settings plus the warnings raised while resolving them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub settings: Settings,
    pub warnings: Vec<String>,
}

/// Resolves the final settings.
///
/// # Errors
/// An explicit config file that cannot be read or parsed is an error; discovered files are not.
pub fn resolve(
    cli: AppConfig,
    explicit: Option<&Path>,
    env: AppConfig,
    env_config: Option<PathBuf>,
) -> Result<Resolved, StoreError> {
    let (files, warnings) = match explicit {
        Some(path) => (AppConfig::from_file(path)?, Vec::new()),
        None => AppConfig::discover(&candidate_paths(env_config)),
    };
    Ok(Resolved { settings: cli.or(env).or(files).into_settings(), warnings })
}
