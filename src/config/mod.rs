//! Runtime configuration.
//!
//! Values come from built-in defaults, then an optional YAML file, then
//! environment variables, each layer overriding the previous one. API keys
//! are never compiled in; a remote service without a key fails validation.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// An API key. Its `Debug` output never shows the value.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        ApiKey(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("ApiKey(<unset>)")
        } else {
            f.write_str("ApiKey(<redacted>)")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeApiConfig {
    pub base_url: String,
    pub api_key: ApiKey,
    /// Number of recipes requested for the general lists.
    pub page_size: u32,
    /// Number of recipes requested from the random endpoint.
    pub random_count: u32,
}

impl Default for RecipeApiConfig {
    fn default() -> Self {
        RecipeApiConfig {
            base_url: "https://api.spoonacular.com".into(),
            api_key: ApiKey::default(),
            page_size: 20,
            random_count: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub base_url: String,
    pub api_key: ApiKey,
    pub model: String,
    /// Language the answers are requested in.
    pub answer_language: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        AssistantConfig {
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: ApiKey::default(),
            model: "gemini-2.0-flash".into(),
            answer_language: "English".into(),
        }
    }
}

/// Which account backend the context wires up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountBackend {
    #[default]
    Remote,
    /// In-process identity and storage, nothing leaves the device.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub backend: AccountBackend,
    pub identity_url: String,
    pub database_url: String,
    pub api_key: ApiKey,
}

impl Default for AccountConfig {
    fn default() -> Self {
        AccountConfig {
            backend: AccountBackend::Remote,
            identity_url: "https://identitytoolkit.googleapis.com".into(),
            database_url: String::new(),
            api_key: ApiKey::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig { timeout_secs: 30 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub recipes: RecipeApiConfig,
    pub assistant: AssistantConfig,
    pub account: AccountConfig,
    pub http: HttpConfig,
    /// File holding the device-local preferences.
    pub preferences_path: Utf8PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            recipes: RecipeApiConfig::default(),
            assistant: AssistantConfig::default(),
            account: AccountConfig::default(),
            http: HttpConfig::default(),
            preferences_path: Utf8PathBuf::from("app_prefs.json"),
        }
    }
}

impl AppConfig {
    /// Loads configuration from an optional YAML file and the process
    /// environment, then validates it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed, an
    /// environment variable holds an unparsable value, or a required
    /// setting is missing.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from YAML text. Missing keys take defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Overrides settings from environment variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("RECIPE_API_KEY") {
            self.recipes.api_key = ApiKey::new(value);
        }
        if let Some(value) = lookup("RECIPE_API_URL") {
            self.recipes.base_url = value;
        }
        if let Some(value) = lookup("GEMINI_API_KEY") {
            self.assistant.api_key = ApiKey::new(value);
        }
        if let Some(value) = lookup("GEMINI_MODEL") {
            self.assistant.model = value;
        }
        if let Some(value) = lookup("ACCOUNT_API_KEY") {
            self.account.api_key = ApiKey::new(value);
        }
        if let Some(value) = lookup("ACCOUNT_IDENTITY_URL") {
            self.account.identity_url = value;
        }
        if let Some(value) = lookup("ACCOUNT_DATABASE_URL") {
            self.account.database_url = value;
        }
        if let Some(value) = lookup("ACCOUNT_BACKEND") {
            self.account.backend = match value.to_lowercase().as_str() {
                "remote" => AccountBackend::Remote,
                "memory" => AccountBackend::Memory,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "ACCOUNT_BACKEND",
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "HTTP_TIMEOUT_SECS",
                value,
            })?;
        }
        if let Some(value) = lookup("PREFERENCES_PATH") {
            self.preferences_path = Utf8PathBuf::from(value);
        }
        Ok(())
    }

    /// Checks that every enabled service has what it needs to run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recipes.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("recipes.base_url"));
        }
        if self.recipes.api_key.is_empty() {
            return Err(ConfigError::Missing("recipes.api_key"));
        }
        if self.recipes.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "recipes.page_size",
                value: "0".into(),
            });
        }
        if self.recipes.random_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "recipes.random_count",
                value: "0".into(),
            });
        }
        if self.assistant.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("assistant.base_url"));
        }
        if self.assistant.api_key.is_empty() {
            return Err(ConfigError::Missing("assistant.api_key"));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "http.timeout_secs",
                value: "0".into(),
            });
        }
        if self.account.backend == AccountBackend::Remote {
            if self.account.identity_url.trim().is_empty() {
                return Err(ConfigError::Missing("account.identity_url"));
            }
            if self.account.database_url.trim().is_empty() {
                return Err(ConfigError::Missing("account.database_url"));
            }
            if self.account.api_key.is_empty() {
                return Err(ConfigError::Missing("account.api_key"));
            }
        }
        Ok(())
    }
}
