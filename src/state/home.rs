use super::fetch::{lock, FetchSlot, FetchState, TaskScope, Ticket};
use crate::context::AppContext;
use crate::fetcher::{FetchError, RecipeSource};
use crate::model::Recipe;
use crate::search::{RandomFilters, SearchFilters};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Cuisine chips shown on the home screen. The first entry means "no filter".
pub const CUISINES: [&str; 8] = [
    "All",
    "Italian",
    "Mexican",
    "Chinese",
    "Indian",
    "French",
    "Japanese",
    "Mediterranean",
];

/// Returns the cuisine to filter by, or `None` for the "All" chip.
pub(crate) fn cuisine_filter(cuisine: &str) -> Option<&str> {
    let cuisine = cuisine.trim();
    if cuisine.is_empty() || cuisine.eq_ignore_ascii_case(CUISINES[0]) {
        None
    } else {
        Some(cuisine)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    General,
    Random,
}

type RecipeCache = Arc<Mutex<HashMap<i64, Recipe>>>;

/// Resolves `slot` and, only if the result is still the latest, folds it
/// into the cache. The cache stays locked across both steps.
fn accept(
    slot: &FetchSlot<Vec<Recipe>>,
    ticket: Ticket,
    result: Result<Vec<Recipe>, FetchError>,
    cache: &Mutex<HashMap<i64, Recipe>>,
    fill: impl FnOnce(&mut HashMap<i64, Recipe>, &[Recipe]),
) {
    let recipes = match result {
        Ok(recipes) => recipes,
        Err(e) => {
            slot.resolve(ticket, Err(e.to_string()));
            return;
        }
    };
    let mut cache = lock(cache);
    if slot.resolve(ticket, Ok(recipes.clone())) {
        fill(&mut cache, &recipes);
    } else {
        debug!(count = recipes.len(), "stale recipes kept out of home cache");
    }
}

/// The home screen: a general list, a random pick for the selected
/// cuisine, and an id lookup over everything either has loaded.
pub struct HomeScreen {
    source: Arc<dyn RecipeSource>,
    page_size: u32,
    random_count: u32,
    recipes: Arc<FetchSlot<Vec<Recipe>>>,
    random: Arc<FetchSlot<Vec<Recipe>>>,
    cache: RecipeCache,
    cuisine: Mutex<String>,
    last_mode: Mutex<FetchMode>,
    scope: TaskScope,
}

impl HomeScreen {
    /// Creates the screen and starts loading the general list.
    pub fn new(ctx: &AppContext) -> Self {
        let screen = HomeScreen {
            source: ctx.recipes(),
            page_size: ctx.config().recipes.page_size,
            random_count: ctx.config().recipes.random_count,
            recipes: Arc::new(FetchSlot::new("home")),
            random: Arc::new(FetchSlot::new("home_random")),
            cache: Arc::default(),
            cuisine: Mutex::new(CUISINES[0].to_string()),
            last_mode: Mutex::new(FetchMode::General),
            scope: ctx.task_scope(),
        };
        screen.fetch_general();
        screen
    }

    pub fn cuisines(&self) -> &'static [&'static str] {
        &CUISINES
    }

    pub fn selected_cuisine(&self) -> String {
        lock(&self.cuisine).clone()
    }

    /// Changes the cuisine used by the next random fetch.
    pub fn select_cuisine(&self, cuisine: &str) {
        *lock(&self.cuisine) = cuisine.to_string();
        debug!(cuisine, "home cuisine selected");
    }

    pub fn fetch_general(&self) {
        *lock(&self.last_mode) = FetchMode::General;
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let filters = SearchFilters::new().with_page(0, self.page_size);

        let ticket = self.recipes.begin();
        let slot = Arc::clone(&self.recipes);
        self.scope.spawn(async move {
            let result = source.search(&filters).await.map(|page| page.results);
            accept(&slot, ticket, result, &cache, |cache, recipes| {
                cache.clear();
                cache.extend(recipes.iter().map(|r| (r.id, r.clone())));
            });
        });
    }

    pub fn fetch_random(&self) {
        *lock(&self.last_mode) = FetchMode::Random;
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let mut filters = RandomFilters::new(self.random_count);
        if let Some(cuisine) = cuisine_filter(&self.selected_cuisine()) {
            filters = filters.with_tag(cuisine.to_lowercase());
        }

        let ticket = self.random.begin();
        let slot = Arc::clone(&self.random);
        self.scope.spawn(async move {
            let result = source.get_random(&filters).await;
            accept(&slot, ticket, result, &cache, |cache, recipes| {
                cache.extend(recipes.iter().map(|r| (r.id, r.clone())));
            });
        });
    }

    /// Re-runs whichever fetch was issued last.
    pub fn retry(&self) {
        let mode = *lock(&self.last_mode);
        match mode {
            FetchMode::General => self.fetch_general(),
            FetchMode::Random => self.fetch_random(),
        }
    }

    pub fn retry_random(&self) {
        self.fetch_random();
    }

    /// Looks a recipe up among everything loaded so far.
    pub fn recipe_by_id(&self, id: i64) -> Option<Recipe> {
        let recipe = lock(&self.cache).get(&id).cloned();
        if recipe.is_none() {
            debug!(recipe_id = id, "recipe not in home cache");
        }
        recipe
    }

    pub fn recipes(&self) -> FetchState<Vec<Recipe>> {
        self.recipes.current()
    }

    pub fn random_recipes(&self) -> FetchState<Vec<Recipe>> {
        self.random.current()
    }

    pub async fn settle(&self) {
        self.scope.settle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{context_from, recipe, FakeQa, FakeSource};

    fn catalogue() -> Vec<Recipe> {
        vec![
            recipe(1, "Margherita", "Italian"),
            recipe(2, "Tacos al pastor", "Mexican"),
            recipe(3, "Carbonara", "Italian"),
        ]
    }

    fn setup() -> (Arc<FakeSource>, HomeScreen) {
        let source = Arc::new(FakeSource::new(catalogue()));
        let ctx = context_from(Arc::clone(&source), Arc::new(FakeQa::answering("ok")));
        (source, HomeScreen::new(&ctx))
    }

    #[tokio::test]
    async fn test_general_list_loads_on_creation() {
        let (source, home) = setup();
        assert!(home.recipes().is_loading());
        assert_eq!(home.random_recipes(), FetchState::Idle);

        home.settle().await;
        assert_eq!(home.recipes().success().unwrap().len(), 3);
        assert_eq!(source.searches()[0].number, Some(20));
        assert_eq!(home.recipe_by_id(2).unwrap().title, "Tacos al pastor");
        assert!(home.recipe_by_id(99).is_none());
    }

    #[tokio::test]
    async fn test_random_uses_lowercased_cuisine_tag() {
        let (source, home) = setup();
        home.fetch_random();
        home.settle().await;
        assert!(source.randoms()[0].include_tags.is_empty());

        home.select_cuisine("Italian");
        home.fetch_random();
        assert!(home.random_recipes().is_loading());
        home.settle().await;

        let last = source.randoms().pop().unwrap();
        assert_eq!(last.include_tags, vec!["italian"]);
        assert_eq!(last.number, Some(5));
        let titles: Vec<_> = home
            .random_recipes()
            .success()
            .unwrap()
            .iter()
            .map(|r| r.title.clone())
            .collect();
        assert_eq!(titles, ["Margherita", "Carbonara"]);
    }

    #[tokio::test]
    async fn test_retry_repeats_last_mode() {
        let (source, home) = setup();
        home.settle().await;
        source.set_failing(true);

        home.fetch_random();
        home.settle().await;
        assert!(home.random_recipes().error().unwrap().starts_with("Fetch failed"));

        source.set_failing(false);
        home.retry();
        home.settle().await;
        assert!(home.random_recipes().success().is_some());
        assert_eq!(source.searches().len(), 1);
        assert_eq!(source.randoms().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_general_list_leaves_cache_alone() {
        // One full general page, then a recipe only the random pick reaches.
        let mut recipes: Vec<Recipe> = (1..=20)
            .map(|id| recipe(id, &format!("Pasta no. {id}"), "Italian"))
            .collect();
        recipes.push(recipe(25, "Green curry", "Thai"));
        let source = Arc::new(FakeSource::new(recipes));
        let release_first = source.gate("");
        let ctx = context_from(Arc::clone(&source), Arc::new(FakeQa::answering("ok")));
        let home = HomeScreen::new(&ctx);

        home.fetch_general();
        home.recipes
            .subscribe()
            .wait_for(|state| state.success().is_some())
            .await
            .unwrap();

        home.select_cuisine("Thai");
        home.fetch_random();
        home.random
            .subscribe()
            .wait_for(|state| state.success().is_some())
            .await
            .unwrap();
        assert_eq!(home.recipe_by_id(25).unwrap().title, "Green curry");

        release_first.send(()).unwrap();
        home.settle().await;
        assert_eq!(source.searches().len(), 2);
        assert_eq!(home.recipe_by_id(25).unwrap().title, "Green curry");
        assert_eq!(home.recipes().success().unwrap().len(), 20);
    }

    #[test]
    fn test_cuisine_filter() {
        assert_eq!(cuisine_filter("All"), None);
        assert_eq!(cuisine_filter(""), None);
        assert_eq!(cuisine_filter("French"), Some("French"));
    }
}
