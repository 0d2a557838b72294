//! UniFFI bindings for cross-platform support (iOS, Android).
//!
//! The mobile shells hold one [`RecipeApp`] per process. Recipes cross the
//! boundary as [`FfiRecipe`] records carrying the display fields plus the
//! full recipe as JSON, so a record handed back (to ask about it or to
//! favorite it) loses nothing.

use crate::account::AccountError;
use crate::assistant::AssistantError;
use crate::config::{AppConfig, ConfigError};
use crate::context::{AppContext, ContextError};
use crate::fetcher::FetchError;
use crate::logging::LoggingConfig;
use crate::model::{ProfileUpdate, Recipe, RecipePage, User};
use crate::prefs::PrefsError;
use crate::search::{RandomFilters, SearchFilters};
use crate::state::{validate_registration, FormError, TaskScope};
use camino::Utf8PathBuf;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// FFI-safe error type that wraps all possible errors.
#[derive(Debug, uniffi::Error, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Recipe not found: {message}")]
    NotFound { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("{message}")]
    NotSignedIn { message: String },

    #[error("Authentication error: {message}")]
    Auth { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Assistant error: {message}")]
    Assistant { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<FetchError> for DiscoveryError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::NotFound(_) => DiscoveryError::NotFound {
                message: e.to_string(),
            },
            _ => DiscoveryError::Network {
                message: e.to_string(),
            },
        }
    }
}

impl From<AccountError> for DiscoveryError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::NotSignedIn => DiscoveryError::NotSignedIn {
                message: e.to_string(),
            },
            AccountError::Auth { .. } => DiscoveryError::Auth {
                message: crate::state::describe_auth_error(&e),
            },
            AccountError::Transport(_) => DiscoveryError::Network {
                message: e.to_string(),
            },
            AccountError::Store(_) | AccountError::Decode(_) => DiscoveryError::Storage {
                message: e.to_string(),
            },
        }
    }
}

impl From<AssistantError> for DiscoveryError {
    fn from(e: AssistantError) -> Self {
        match e {
            AssistantError::EmptyQuestion => DiscoveryError::InvalidInput {
                message: e.to_string(),
            },
            _ => DiscoveryError::Assistant {
                message: e.to_string(),
            },
        }
    }
}

impl From<ConfigError> for DiscoveryError {
    fn from(e: ConfigError) -> Self {
        DiscoveryError::Config {
            message: e.to_string(),
        }
    }
}

impl From<ContextError> for DiscoveryError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::Config(e) => e.into(),
            ContextError::Http(_) => DiscoveryError::Config {
                message: e.to_string(),
            },
        }
    }
}

impl From<PrefsError> for DiscoveryError {
    fn from(e: PrefsError) -> Self {
        DiscoveryError::Storage {
            message: e.to_string(),
        }
    }
}

impl From<FormError> for DiscoveryError {
    fn from(e: FormError) -> Self {
        DiscoveryError::InvalidInput {
            message: e.to_string(),
        }
    }
}

/// FFI-safe representation of a recipe.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecipe {
    pub id: i64,
    pub title: String,
    pub image: Option<String>,
    pub ready_in_minutes: Option<u32>,
    pub servings: Option<u32>,
    pub cuisines: Vec<String>,
    pub summary: Option<String>,
    /// One display line per ingredient
    pub ingredients: Vec<String>,
    /// Instruction steps in order
    pub steps: Vec<String>,
    /// The complete recipe as JSON
    pub raw_json: String,
}

impl From<&Recipe> for FfiRecipe {
    fn from(r: &Recipe) -> Self {
        FfiRecipe {
            id: r.id,
            title: r.title.clone(),
            image: r.image.clone(),
            ready_in_minutes: r.ready_in_minutes,
            servings: r.servings,
            cuisines: r.cuisines.clone().unwrap_or_default(),
            summary: r.summary.clone(),
            ingredients: r.ingredient_lines(),
            steps: r.step_texts(),
            raw_json: serde_json::to_string(r).unwrap_or_default(),
        }
    }
}

impl FfiRecipe {
    /// Rebuilds the full recipe, falling back to the record's own fields
    /// when `raw_json` is missing or unreadable.
    fn to_recipe(&self) -> Recipe {
        serde_json::from_str(&self.raw_json).unwrap_or_else(|_| Recipe {
            id: self.id,
            title: self.title.clone(),
            image: self.image.clone(),
            ready_in_minutes: self.ready_in_minutes,
            servings: self.servings,
            cuisines: Some(self.cuisines.clone()),
            summary: self.summary.clone(),
            ..Default::default()
        })
    }
}

fn to_ffi(recipes: &[Recipe]) -> Vec<FfiRecipe> {
    recipes.iter().map(FfiRecipe::from).collect()
}

/// One page of search results.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecipePage {
    pub results: Vec<FfiRecipe>,
    pub offset: u32,
    pub number: u32,
    pub total_results: u32,
}

impl From<&RecipePage> for FfiRecipePage {
    fn from(p: &RecipePage) -> Self {
        FfiRecipePage {
            results: to_ffi(&p.results),
            offset: p.offset,
            number: p.number,
            total_results: p.total_results,
        }
    }
}

/// Search filters exposed to the mobile shells. Unset fields are not sent.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiSearchFilters {
    pub query: Option<String>,
    pub cuisine: Option<String>,
    pub diet: Option<String>,
    pub intolerances: Vec<String>,
    pub include_ingredients: Vec<String>,
    pub exclude_ingredients: Vec<String>,
    pub max_ready_time: Option<u32>,
    pub offset: Option<u32>,
    pub number: Option<u32>,
}

impl From<FfiSearchFilters> for SearchFilters {
    fn from(f: FfiSearchFilters) -> Self {
        SearchFilters {
            query: f.query,
            cuisine: f.cuisine,
            diet: f.diet,
            intolerances: f.intolerances,
            include_ingredients: f.include_ingredients,
            exclude_ingredients: f.exclude_ingredients,
            max_ready_time: f.max_ready_time,
            offset: f.offset,
            number: f.number,
            ..Default::default()
        }
    }
}

/// FFI-safe representation of a user profile.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub avatar: String,
    pub favorite_topics: HashMap<String, i64>,
}

impl From<User> for FfiUser {
    fn from(u: User) -> Self {
        FfiUser {
            id: u.id,
            email: u.email,
            username: u.username,
            avatar: u.avatar,
            favorite_topics: u.favorite_topics.into_iter().collect(),
        }
    }
}

/// A partial profile edit. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub password: Option<String>,
}

impl From<FfiProfileUpdate> for ProfileUpdate {
    fn from(u: FfiProfileUpdate) -> Self {
        ProfileUpdate {
            username: u.username,
            email: u.email,
            avatar: u.avatar,
            password: u.password,
        }
    }
}

/// Implemented by the mobile shells to hear about sign-in and sign-out.
#[uniffi::export(with_foreign)]
pub trait SessionObserver: Send + Sync {
    fn on_session_changed(&self, logged_in: bool);
}

/// A live [`SessionObserver`] registration. Dropping it stops delivery.
#[derive(uniffi::Object)]
pub struct SessionSubscription {
    listener: TaskScope,
}

#[uniffi::export]
impl SessionSubscription {
    pub fn cancel(&self) {
        self.listener.cancel();
    }
}

/// The app core as seen from the mobile shells.
#[derive(uniffi::Object)]
pub struct RecipeApp {
    ctx: AppContext,
}

#[uniffi::export(async_runtime = "tokio")]
impl RecipeApp {
    /// Opens the app core from an optional YAML config file plus the
    /// environment.
    #[uniffi::constructor]
    pub async fn open(config_path: Option<String>) -> Result<Arc<Self>, DiscoveryError> {
        let path = config_path.map(Utf8PathBuf::from);
        let config = AppConfig::load(path.as_deref())?;
        let ctx = AppContext::new(config, Handle::current())?;
        Ok(Arc::new(RecipeApp { ctx }))
    }

    pub async fn search(&self, filters: FfiSearchFilters) -> Result<FfiRecipePage, DiscoveryError> {
        let page = self.ctx.recipes().search(&filters.into()).await?;
        Ok(FfiRecipePage::from(&page))
    }

    pub async fn recipe_details(&self, id: i64) -> Result<FfiRecipe, DiscoveryError> {
        let recipe = self.ctx.recipes().get_by_id(id).await?;
        Ok(FfiRecipe::from(&recipe))
    }

    /// Random recipes; every tag in `tags` must match.
    pub async fn random_recipes(
        &self,
        number: u32,
        tags: Vec<String>,
    ) -> Result<Vec<FfiRecipe>, DiscoveryError> {
        let filters = tags
            .into_iter()
            .fold(RandomFilters::new(number), RandomFilters::with_tag);
        let recipes = self.ctx.recipes().get_random(&filters).await?;
        Ok(to_ffi(&recipes))
    }

    /// Asks the assistant about one recipe.
    pub async fn ask(&self, recipe: FfiRecipe, question: String) -> Result<String, DiscoveryError> {
        let answer = self
            .ctx
            .assistant()
            .ask(&recipe.to_recipe(), &question)
            .await?;
        Ok(answer)
    }

    pub async fn sign_up(
        &self,
        username: String,
        email: String,
        password: String,
        confirmation: String,
    ) -> Result<FfiUser, DiscoveryError> {
        validate_registration(&username, &email, &password, &confirmation)?;
        let user = self
            .ctx
            .account()
            .sign_up(username.trim(), email.trim(), &password)
            .await?;
        Ok(user.into())
    }

    pub async fn sign_in(&self, email: String, password: String) -> Result<FfiUser, DiscoveryError> {
        if email.trim().is_empty() || password.trim().is_empty() {
            return Err(FormError::MissingCredentials.into());
        }
        let user = self.ctx.account().sign_in(email.trim(), &password).await?;
        Ok(user.into())
    }

    pub fn sign_out(&self) {
        self.ctx.account().sign_out();
    }

    pub fn is_logged_in(&self) -> bool {
        self.ctx.account().is_logged_in()
    }

    pub async fn current_user(&self) -> Result<Option<FfiUser>, DiscoveryError> {
        Ok(self.ctx.account().current_user().await?.map(FfiUser::from))
    }

    pub async fn update_profile(&self, update: FfiProfileUpdate) -> Result<(), DiscoveryError> {
        self.ctx.account().update_profile(&update.into()).await?;
        Ok(())
    }

    /// Deletes the signed-in account and signs out.
    pub async fn delete_account(&self) -> Result<(), DiscoveryError> {
        self.ctx.account().delete_account().await?;
        Ok(())
    }

    /// Replaces the signed-in user's topic weights.
    pub async fn set_favorite_topics(
        &self,
        topics: HashMap<String, i64>,
    ) -> Result<(), DiscoveryError> {
        let topics: BTreeMap<String, i64> = topics.into_iter().collect();
        self.ctx.account().set_favorite_topics(&topics).await?;
        Ok(())
    }

    /// Calls `observer` with the current sign-in state, then again on every
    /// change until the returned subscription is cancelled or dropped.
    pub fn watch_session(&self, observer: Arc<dyn SessionObserver>) -> Arc<SessionSubscription> {
        let mut session = self.ctx.account().subscribe_session();
        observer.on_session_changed(*session.borrow_and_update());

        let listener = self.ctx.task_scope();
        listener.spawn(async move {
            while session.changed().await.is_ok() {
                let logged_in = *session.borrow_and_update();
                debug!(logged_in, "forwarding session change");
                observer.on_session_changed(logged_in);
            }
        });
        Arc::new(SessionSubscription { listener })
    }

    pub async fn favorites(&self) -> Result<Vec<FfiRecipe>, DiscoveryError> {
        let recipes = self.ctx.account().list_favorites().await?;
        Ok(to_ffi(&recipes))
    }

    pub async fn add_favorite(&self, recipe: FfiRecipe) -> Result<(), DiscoveryError> {
        self.ctx.account().add_favorite(&recipe.to_recipe()).await?;
        Ok(())
    }

    pub async fn remove_favorite(&self, recipe_id: i64) -> Result<(), DiscoveryError> {
        self.ctx.account().remove_favorite(recipe_id).await?;
        Ok(())
    }

    pub fn first_launch_seen(&self) -> Result<bool, DiscoveryError> {
        Ok(self.ctx.preferences().first_launch_seen()?)
    }

    pub fn mark_first_launch_seen(&self) -> Result<(), DiscoveryError> {
        Ok(self.ctx.preferences().mark_first_launch_seen()?)
    }
}

/// Installs the log subscriber configured by `RUST_LOG` and `LOG_FORMAT`.
/// Returns `false` if one was already installed.
#[uniffi::export]
pub fn init_logging() -> bool {
    LoggingConfig::from_env().init().is_ok()
}

/// Returns the library version.
#[uniffi::export]
pub fn library_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
