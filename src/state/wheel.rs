use super::fetch::{lock, FetchSlot, FetchState, TaskScope};
use super::home::cuisine_filter;
use crate::context::AppContext;
use crate::fetcher::{FetchError, RecipeSource};
use crate::model::Recipe;
use crate::search::SearchFilters;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

const WHEEL_SEARCH_SIZE: u32 = 10;

/// Pick-for-me wheel: search for candidates, put some on the wheel, spin.
pub struct RecipeWheel {
    source: Arc<dyn RecipeSource>,
    search_mode: AtomicBool,
    results: Arc<FetchSlot<Vec<Recipe>>>,
    wheel: Mutex<Vec<Recipe>>,
    scope: TaskScope,
}

impl RecipeWheel {
    pub fn new(ctx: &AppContext) -> Self {
        RecipeWheel {
            source: ctx.recipes(),
            search_mode: AtomicBool::new(false),
            results: Arc::new(FetchSlot::new("wheel_search")),
            wheel: Mutex::default(),
            scope: ctx.task_scope(),
        }
    }

    pub fn is_search_mode(&self) -> bool {
        self.search_mode.load(Ordering::SeqCst)
    }

    /// Flips between the wheel and the search panel. Either way the search
    /// results start over from `Idle`.
    pub fn toggle_search_mode(&self) {
        self.search_mode.fetch_xor(true, Ordering::SeqCst);
        self.results.reset();
    }

    pub fn search(&self, query: &str, cuisine: &str) {
        let mut filters = SearchFilters::new()
            .with_query(query)
            .with_page(0, WHEEL_SEARCH_SIZE);
        if let Some(cuisine) = cuisine_filter(cuisine) {
            filters = filters.with_cuisine(cuisine.to_lowercase());
        }
        let source = Arc::clone(&self.source);
        self.results.load(&self.scope, async move {
            let page = source.search(&filters).await?;
            Ok::<_, FetchError>(page.results)
        });
    }

    pub fn results(&self) -> FetchState<Vec<Recipe>> {
        self.results.current()
    }

    /// Puts a recipe on the wheel. Returns `false` if it is already there.
    pub fn add(&self, recipe: &Recipe) -> bool {
        let mut wheel = lock(&self.wheel);
        if wheel.iter().any(|r| r.id == recipe.id) {
            return false;
        }
        wheel.push(recipe.clone());
        debug!(recipe_id = recipe.id, "added to wheel");
        true
    }

    pub fn remove(&self, recipe_id: i64) {
        lock(&self.wheel).retain(|r| r.id != recipe_id);
        debug!(recipe_id, "removed from wheel");
    }

    pub fn entries(&self) -> Vec<Recipe> {
        lock(&self.wheel).clone()
    }

    /// Picks one wheel entry uniformly at random.
    pub fn spin(&self) -> Option<Recipe> {
        self.spin_with(&mut rand::thread_rng())
    }

    pub fn spin_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Recipe> {
        lock(&self.wheel).choose(rng).cloned()
    }

    pub async fn settle(&self) {
        self.scope.settle().await;
    }
}
