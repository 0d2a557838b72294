use super::favorites::FavoritesList;
use super::fetch::{lock, FetchSlot, FetchState, TaskScope};
use super::home::{cuisine_filter, CUISINES};
use crate::context::AppContext;
use crate::fetcher::{FetchError, RecipeSource};
use crate::model::Recipe;
use crate::search::SearchFilters;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const TRENDING_FETCH: u32 = 10;
const TRENDING_SHOWN: usize = 5;

/// The explore screen.
///
/// The general list, text search and cuisine filter all write the same
/// result slot; whichever was issued last is what the slot shows. The
/// trending strip has its own slot and never shows an error.
pub struct ExploreScreen {
    source: Arc<dyn RecipeSource>,
    page_size: u32,
    results: Arc<FetchSlot<Vec<Recipe>>>,
    trending: Arc<FetchSlot<Vec<Recipe>>>,
    query: Mutex<String>,
    cuisine: Mutex<String>,
    favorites: Arc<FavoritesList>,
    scope: TaskScope,
}

impl ExploreScreen {
    /// Creates the screen and starts the general, trending and favorites
    /// loads.
    pub fn new(ctx: &AppContext) -> Self {
        let screen = ExploreScreen {
            source: ctx.recipes(),
            page_size: ctx.config().recipes.page_size,
            results: Arc::new(FetchSlot::new("explore")),
            trending: Arc::new(FetchSlot::new("explore_trending")),
            query: Mutex::default(),
            cuisine: Mutex::new(CUISINES[0].to_string()),
            favorites: ctx.favorites(),
            scope: ctx.task_scope(),
        };
        screen.fetch_general();
        screen.fetch_trending();
        screen.load_favorites();
        screen
    }

    fn run_search(&self, filters: SearchFilters) {
        let source = Arc::clone(&self.source);
        self.results.load(&self.scope, async move {
            let page = source.search(&filters).await?;
            Ok::<_, FetchError>(page.results)
        });
    }

    fn first_page(&self) -> SearchFilters {
        SearchFilters::new().with_page(0, self.page_size)
    }

    pub fn fetch_general(&self) {
        self.run_search(self.first_page());
    }

    pub fn fetch_trending(&self) {
        let source = Arc::clone(&self.source);
        let filters = SearchFilters::new().with_page(0, TRENDING_FETCH);
        self.trending.load(&self.scope, async move {
            match source.search(&filters).await {
                Ok(page) => Ok::<_, FetchError>(
                    page.results.into_iter().take(TRENDING_SHOWN).collect(),
                ),
                Err(e) => {
                    warn!(error = %e, "trending recipes unavailable");
                    Ok(Vec::new())
                }
            }
        });
    }

    fn load_favorites(&self) {
        let favorites = Arc::clone(&self.favorites);
        self.scope.spawn(async move {
            if let Err(e) = favorites.load().await {
                warn!(error = %e, "favorites unavailable on explore");
            }
        });
    }

    /// Filters the result list by cuisine; "All" drops the filter.
    pub fn fetch_by_cuisine(&self, cuisine: &str) {
        *lock(&self.cuisine) = cuisine.to_string();
        let mut filters = self.first_page();
        if let Some(cuisine) = cuisine_filter(cuisine) {
            filters = filters.with_cuisine(cuisine);
        }
        self.run_search(filters);
    }

    /// Records what is typed in the search box without searching.
    pub fn update_query(&self, query: &str) {
        *lock(&self.query) = query.to_string();
    }

    pub fn search(&self, query: &str) {
        self.update_query(query);
        debug!(query, "explore search");
        self.run_search(self.first_page().with_query(query));
    }

    pub fn clear_search(&self) {
        lock(&self.query).clear();
        self.fetch_general();
    }

    /// Repeats the search if there is a query, otherwise reloads the
    /// general list.
    pub fn retry(&self) {
        let query = self.query();
        if query.is_empty() {
            self.fetch_general();
        } else {
            self.search(&query);
        }
    }

    pub fn query(&self) -> String {
        lock(&self.query).clone()
    }

    pub fn selected_cuisine(&self) -> String {
        lock(&self.cuisine).clone()
    }

    pub fn results(&self) -> FetchState<Vec<Recipe>> {
        self.results.current()
    }

    pub fn subscribe_results(&self) -> tokio::sync::watch::Receiver<FetchState<Vec<Recipe>>> {
        self.results.subscribe()
    }

    /// The trending strip; empty rather than an error when it fails.
    pub fn trending(&self) -> Vec<Recipe> {
        self.trending.current().success().cloned().unwrap_or_default()
    }

    pub fn is_favorite(&self, recipe_id: i64) -> bool {
        self.favorites.contains(recipe_id)
    }

    pub fn favorites(&self) -> Vec<Recipe> {
        self.favorites.recipes()
    }

    pub fn toggle_favorite(&self, recipe: &Recipe) {
        let favorites = Arc::clone(&self.favorites);
        let recipe = recipe.clone();
        self.scope.spawn(async move {
            favorites.toggle(&recipe).await;
        });
    }

    /// Toggles a recipe shown in the results or the trending strip.
    /// Returns `false` when the id is in neither.
    pub fn toggle_favorite_by_id(&self, recipe_id: i64) -> bool {
        let found = self
            .results
            .current()
            .success()
            .and_then(|recipes| recipes.iter().find(|r| r.id == recipe_id).cloned())
            .or_else(|| self.trending().into_iter().find(|r| r.id == recipe_id));

        match found {
            Some(recipe) => {
                self.toggle_favorite(&recipe);
                true
            }
            None => {
                warn!(recipe_id, "recipe to favorite is not on screen");
                false
            }
        }
    }

    pub async fn settle(&self) {
        self.scope.settle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{context_from, recipe, FakeQa, FakeSource};
    use crate::state::SyncStatus;

    fn catalogue() -> Vec<Recipe> {
        (1..=12)
            .map(|id| {
                let (title, cuisine) = match id % 3 {
                    0 => ("Pasta", "Italian"),
                    1 => ("Soup", "Chinese"),
                    _ => ("Curry", "Indian"),
                };
                recipe(id, &format!("{title} {id}"), cuisine)
            })
            .collect()
    }

    fn setup() -> (Arc<FakeSource>, AppContext) {
        let source = Arc::new(FakeSource::new(catalogue()));
        let ctx = context_from(Arc::clone(&source), Arc::new(FakeQa::answering("ok")));
        (source, ctx)
    }

    #[tokio::test]
    async fn test_initial_loads() {
        let (source, ctx) = setup();
        let explore = ExploreScreen::new(&ctx);
        assert!(explore.results().is_loading());
        explore.settle().await;

        assert_eq!(explore.results().success().unwrap().len(), 12);
        assert_eq!(explore.trending().len(), 5);
        let numbers: Vec<_> = source.searches().iter().map(|f| f.number).collect();
        assert!(numbers.contains(&Some(20)));
        assert!(numbers.contains(&Some(10)));
    }

    #[tokio::test]
    async fn test_trending_failure_is_empty_not_error() {
        let (source, ctx) = setup();
        source.set_failing(true);
        let explore = ExploreScreen::new(&ctx);
        explore.settle().await;

        assert!(explore.results().error().is_some());
        assert!(explore.trending().is_empty());
        assert_eq!(explore.trending.current(), FetchState::Success(Vec::new()));
    }

    #[tokio::test]
    async fn test_search_without_matches_is_empty_success() {
        let (_, ctx) = setup();
        let explore = ExploreScreen::new(&ctx);
        explore.settle().await;

        explore.search("zzz");
        assert!(explore.results().is_loading());
        explore.settle().await;
        assert_eq!(explore.results(), FetchState::Success(Vec::new()));
    }

    #[tokio::test]
    async fn test_later_search_wins_over_late_earlier_one() {
        let (source, ctx) = setup();
        let explore = ExploreScreen::new(&ctx);
        explore.settle().await;

        let release_pasta = source.gate("pasta");
        let release_soup = source.gate("soup");
        explore.search("pasta");
        explore.search("soup");

        let mut rx = explore.subscribe_results();
        release_soup.send(()).unwrap();
        rx.wait_for(|state| state.success().is_some()).await.unwrap();
        release_pasta.send(()).unwrap();
        explore.settle().await;

        let results = explore.results();
        let titles = results.success().unwrap();
        assert!(!titles.is_empty());
        assert!(titles.iter().all(|r| r.title.starts_with("Soup")));
    }

    #[tokio::test]
    async fn test_cuisine_filter_and_retry() {
        let (source, ctx) = setup();
        let explore = ExploreScreen::new(&ctx);
        explore.settle().await;

        explore.fetch_by_cuisine("Indian");
        explore.settle().await;
        assert_eq!(explore.results().success().unwrap().len(), 4);
        assert_eq!(explore.selected_cuisine(), "Indian");

        explore.fetch_by_cuisine("All");
        explore.settle().await;
        assert_eq!(source.searches().last().unwrap().cuisine, None);

        explore.update_query("curry");
        explore.retry();
        explore.settle().await;
        assert_eq!(
            source.searches().last().unwrap().query.as_deref(),
            Some("curry")
        );

        explore.clear_search();
        explore.settle().await;
        assert_eq!(source.searches().last().unwrap().query, None);
        assert_eq!(explore.query(), "");
    }

    #[tokio::test]
    async fn test_toggle_favorite_signed_out_is_silent() {
        let (_, ctx) = setup();
        let explore = ExploreScreen::new(&ctx);
        explore.settle().await;

        assert!(explore.toggle_favorite_by_id(3));
        explore.settle().await;
        assert!(!explore.is_favorite(3));
        assert!(explore.favorites().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_favorite_by_id_signed_in() {
        let (_, ctx) = setup();
        ctx.account()
            .sign_up("cook", "cook@example.com", "secret1")
            .await
            .unwrap();
        let explore = ExploreScreen::new(&ctx);
        explore.settle().await;

        assert!(explore.toggle_favorite_by_id(3));
        explore.settle().await;
        assert!(explore.is_favorite(3));
        assert_eq!(ctx.favorites().status(3), Some(SyncStatus::Confirmed));
        assert!(!explore.toggle_favorite_by_id(404));

        let stored = ctx.account().list_favorites().await.unwrap();
        assert_eq!(stored[0].title, "Pasta 3");
    }

    #[tokio::test]
    async fn test_dropped_screen_commits_nothing() {
        let (source, ctx) = setup();
        let release = source.gate("stew");
        let explore = ExploreScreen::new(&ctx);
        explore.settle().await;
        explore.search("stew");
        let mut rx = explore.subscribe_results();
        drop(explore);

        let _ = release.send(());
        tokio::task::yield_now().await;
        assert!(rx.borrow_and_update().is_loading());
    }
}
