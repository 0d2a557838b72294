//! Recipe fetching over HTTP.
//!
//! This module wraps the three recipe-service endpoints the app uses:
//! complex search, recipe information by id and random recipes. The
//! [`RecipeSource`] trait is the seam the view-state containers depend on.

use crate::config::{ApiKey, RecipeApiConfig};
use crate::model::{Recipe, RecipePage};
use crate::search::{RandomFilters, SearchFilters};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};

/// Flags sent with every search so results carry enough detail for the
/// recipe cards without a second request.
const SEARCH_DEFAULTS: [(&str, &str); 5] = [
    ("instructionsRequired", "true"),
    ("fillIngredients", "false"),
    ("addRecipeInformation", "true"),
    ("addRecipeInstructions", "true"),
    ("addRecipeNutrition", "false"),
];

const DETAIL_DEFAULTS: [(&str, &str); 3] = [
    ("includeNutrition", "true"),
    ("addWinePairing", "true"),
    ("addTasteData", "false"),
];

const RANDOM_DEFAULTS: [(&str, &str); 1] = [("includeNutrition", "true")];

/// Errors that can occur when fetching recipes.
///
/// Every variant reads as a fetch failure to the user; the variants only
/// exist so logs can tell the causes apart. An empty search result is not
/// an error.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Fetch failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Fetch failed: service returned status {0}")]
    Status(u16),

    #[error("Fetch failed: unreadable response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Fetch failed: recipe {0} not found")]
    NotFound(i64),
}

/// Anything that can produce recipes for the screens.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    /// Runs a filtered search. Zero matches is `Ok` with an empty page.
    async fn search(&self, filters: &SearchFilters) -> Result<RecipePage, FetchError>;

    /// Loads the full information for one recipe.
    async fn get_by_id(&self, id: i64) -> Result<Recipe, FetchError>;

    /// Picks random recipes, optionally restricted by tags.
    async fn get_random(&self, filters: &RandomFilters) -> Result<Vec<Recipe>, FetchError>;
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RandomResponse {
    #[serde(alias = "results")]
    recipes: Vec<Recipe>,
}

/// HTTP client for the recipe-search service.
///
/// The API key travels as the `apiKey` query parameter on every request.
#[derive(Clone)]
pub struct RecipeApiClient {
    client: Client,
    base_url: String,
    api_key: ApiKey,
}

impl std::fmt::Debug for RecipeApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .finish()
    }
}

impl RecipeApiClient {
    /// Creates a client from configuration with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &RecipeApiConfig, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, &config.base_url, config.api_key.clone()))
    }

    /// Creates a client around an existing `reqwest::Client`.
    pub fn with_client(client: Client, base_url: &str, api_key: ApiKey) -> Self {
        RecipeApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn get_json<T, Q>(&self, path: &str, query: &Q) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.expose())])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), path, "recipe service error");
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, path, "failed to decode recipe response");
            FetchError::Decode(e)
        })
    }
}

#[async_trait]
impl RecipeSource for RecipeApiClient {
    #[instrument(skip(self, filters), fields(query = ?filters.query, cuisine = ?filters.cuisine))]
    async fn search(&self, filters: &SearchFilters) -> Result<RecipePage, FetchError> {
        let mut query = filters.to_query();
        query.extend(SEARCH_DEFAULTS.iter().map(|(k, v)| (*k, v.to_string())));

        let page: RecipePage = self.get_json("/recipes/complexSearch", &query).await?;
        debug!(
            count = page.results.len(),
            total = page.total_results,
            "search complete"
        );
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: i64) -> Result<Recipe, FetchError> {
        let path = format!("/recipes/{id}/information");
        let recipe: Option<Recipe> = self.get_json(&path, &DETAIL_DEFAULTS).await?;

        match recipe {
            Some(recipe) if recipe.id != 0 => {
                debug!(title = %recipe.title, "recipe loaded");
                Ok(recipe)
            }
            _ => Err(FetchError::NotFound(id)),
        }
    }

    #[instrument(skip(self, filters), fields(tags = ?filters.include_tags))]
    async fn get_random(&self, filters: &RandomFilters) -> Result<Vec<Recipe>, FetchError> {
        let mut query = filters.to_query();
        query.extend(RANDOM_DEFAULTS.iter().map(|(k, v)| (*k, v.to_string())));

        let response: RandomResponse = self.get_json("/recipes/random", &query).await?;
        debug!(count = response.recipes.len(), "random recipes loaded");
        Ok(response.recipes)
    }
}
