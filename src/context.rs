//! The process-wide owner of every client.
//!
//! Screens never build their own clients; they borrow `Arc`s from the one
//! [`AppContext`] the host creates at startup.

use crate::account::{
    AccountStore, IdentityProvider, MemoryIdentity, MemoryUserStore, RemoteIdentity,
    RemoteUserStore, UserStore,
};
use crate::assistant::{GeminiClient, RecipeQa};
use crate::config::{AccountBackend, AppConfig, ConfigError};
use crate::fetcher::{RecipeApiClient, RecipeSource};
use crate::prefs::Preferences;
use crate::state::{FavoritesList, TaskScope};
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::info;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct AppContext {
    config: AppConfig,
    recipes: Arc<dyn RecipeSource>,
    assistant: Arc<dyn RecipeQa>,
    account: Arc<AccountStore>,
    favorites: Arc<FavoritesList>,
    preferences: Preferences,
    runtime: Handle,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Builds every client from validated configuration. All HTTP clients
    /// share one connection pool.
    ///
    /// `runtime` is where screen tasks are spawned.
    pub fn new(config: AppConfig, runtime: Handle) -> Result<Self, ContextError> {
        config.validate()?;
        let http = Client::builder().timeout(config.http.timeout()).build()?;

        let recipes = Arc::new(RecipeApiClient::with_client(
            http.clone(),
            &config.recipes.base_url,
            config.recipes.api_key.clone(),
        ));
        let assistant = Arc::new(GeminiClient::with_client(http.clone(), &config.assistant));

        let (identity, users): (Arc<dyn IdentityProvider>, Arc<dyn UserStore>) =
            match config.account.backend {
                AccountBackend::Remote => (
                    Arc::new(RemoteIdentity::new(
                        http.clone(),
                        &config.account.identity_url,
                        config.account.api_key.clone(),
                    )),
                    Arc::new(RemoteUserStore::new(http, &config.account.database_url)),
                ),
                AccountBackend::Memory => (
                    Arc::new(MemoryIdentity::new()),
                    Arc::new(MemoryUserStore::new()),
                ),
            };

        info!(
            recipes = %config.recipes.base_url,
            model = %config.assistant.model,
            backend = ?config.account.backend,
            "app context ready"
        );
        let account = Arc::new(AccountStore::new(identity, users));
        Ok(Self::from_parts(config, recipes, assistant, account, runtime))
    }

    /// Assembles a context from already built parts.
    pub fn from_parts(
        config: AppConfig,
        recipes: Arc<dyn RecipeSource>,
        assistant: Arc<dyn RecipeQa>,
        account: Arc<AccountStore>,
        runtime: Handle,
    ) -> Self {
        AppContext {
            preferences: Preferences::new(config.preferences_path.clone()),
            favorites: Arc::new(FavoritesList::new(Arc::clone(&account))),
            config,
            recipes,
            assistant,
            account,
            runtime,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn recipes(&self) -> Arc<dyn RecipeSource> {
        Arc::clone(&self.recipes)
    }

    pub fn assistant(&self) -> Arc<dyn RecipeQa> {
        Arc::clone(&self.assistant)
    }

    pub fn account(&self) -> Arc<AccountStore> {
        Arc::clone(&self.account)
    }

    /// The favorites list shared by every screen.
    pub fn favorites(&self) -> Arc<FavoritesList> {
        Arc::clone(&self.favorites)
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// A fresh task scope for one screen.
    pub fn task_scope(&self) -> TaskScope {
        TaskScope::new(self.runtime.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiKey;
    use indoc::indoc;

    #[tokio::test]
    async fn test_builds_from_memory_config() {
        let mut config = AppConfig::from_yaml_str(indoc! {"
            account:
              backend: memory
            http:
              timeout_secs: 5
        "})
        .unwrap();
        config.recipes.api_key = ApiKey::new("r");
        config.assistant.api_key = ApiKey::new("g");

        let ctx = AppContext::new(config, Handle::current()).unwrap();
        assert!(!ctx.account().is_logged_in());
        ctx.account()
            .sign_up("cook", "cook@example.com", "secret1")
            .await
            .unwrap();
        assert!(ctx.favorites().entries().is_empty());
        assert!(ctx.account().is_logged_in());
    }

    #[tokio::test]
    async fn test_rejects_missing_keys() {
        let result = AppContext::new(AppConfig::default(), Handle::current());
        assert!(matches!(
            result,
            Err(ContextError::Config(ConfigError::Missing(_)))
        ));
    }
}
