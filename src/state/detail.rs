use super::favorites::FavoritesList;
use super::fetch::{FetchSlot, FetchState, TaskScope};
use crate::context::AppContext;
use crate::fetcher::RecipeSource;
use crate::model::Recipe;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Full details of one recipe.
///
/// Unlike searches, a lookup that finds nothing ends in `Error`.
pub struct RecipeDetailScreen {
    source: Arc<dyn RecipeSource>,
    detail: Arc<FetchSlot<Recipe>>,
    favorites: Arc<FavoritesList>,
    scope: TaskScope,
}

impl RecipeDetailScreen {
    pub fn new(ctx: &AppContext) -> Self {
        RecipeDetailScreen {
            source: ctx.recipes(),
            detail: Arc::new(FetchSlot::new("recipe_detail")),
            favorites: ctx.favorites(),
            scope: ctx.task_scope(),
        }
    }

    pub fn load(&self, recipe_id: i64) {
        debug!(recipe_id, "loading recipe details");
        let source = Arc::clone(&self.source);
        self.detail.load(&self.scope, async move {
            source.get_by_id(recipe_id).await
        });
    }

    pub fn state(&self) -> FetchState<Recipe> {
        self.detail.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<Recipe>> {
        self.detail.subscribe()
    }

    pub fn is_favorite(&self, recipe_id: i64) -> bool {
        self.favorites.contains(recipe_id)
    }

    /// Toggles the loaded recipe. Does nothing until a recipe has loaded.
    pub fn toggle_favorite(&self) {
        let Some(recipe) = self.detail.current().success().cloned() else {
            debug!("no recipe loaded to favorite");
            return;
        };
        let favorites = Arc::clone(&self.favorites);
        self.scope.spawn(async move {
            favorites.toggle(&recipe).await;
        });
    }

    pub async fn settle(&self) {
        self.scope.settle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{context_with, recipe};

    #[tokio::test]
    async fn test_load_found() {
        let ctx = context_with(vec![recipe(7, "Pho", "Vietnamese")]);
        let screen = RecipeDetailScreen::new(&ctx);
        assert_eq!(screen.state(), FetchState::Idle);

        screen.load(7);
        assert!(screen.state().is_loading());
        screen.settle().await;
        assert_eq!(screen.state().success().unwrap().title, "Pho");
    }

    #[tokio::test]
    async fn test_missing_recipe_is_error() {
        let ctx = context_with(vec![recipe(7, "Pho", "Vietnamese")]);
        let screen = RecipeDetailScreen::new(&ctx);
        screen.load(8);
        screen.settle().await;
        assert!(screen.state().error().unwrap().contains('8'));
    }

    #[tokio::test]
    async fn test_toggle_favorite_after_load() {
        let ctx = context_with(vec![recipe(7, "Pho", "Vietnamese")]);
        ctx.account()
            .sign_up("cook", "cook@example.com", "secret1")
            .await
            .unwrap();
        let screen = RecipeDetailScreen::new(&ctx);

        screen.toggle_favorite();
        screen.settle().await;
        assert!(!screen.is_favorite(7));

        screen.load(7);
        screen.settle().await;
        screen.toggle_favorite();
        screen.settle().await;
        assert!(screen.is_favorite(7));

        screen.toggle_favorite();
        screen.settle().await;
        assert!(!screen.is_favorite(7));
    }
}
