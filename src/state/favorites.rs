use super::fetch::{lock, FetchSlot, FetchState, TaskScope};
use crate::account::{AccountError, AccountStore};
use crate::context::AppContext;
use crate::model::Recipe;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Where a favorite stands relative to the account store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Shown optimistically; the store has not answered yet.
    Pending,
    Confirmed,
    /// The store rejected the add. Toggling again retries it.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteEntry {
    pub recipe: Recipe,
    pub status: SyncStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// Nobody is signed in; nothing changed.
    Skipped,
    /// Another change to the same recipe has not finished; nothing changed.
    Busy,
    /// The store call failed; the list shows the outcome.
    Failed,
}

/// The signed-in user's favorites as the screens see them.
///
/// Separate from any fetch slot. Adds and removes apply to the list
/// first and are then confirmed or rolled back by the account store.
/// At most one change per recipe id is in flight at a time.
#[derive(Debug)]
pub struct FavoritesList {
    account: Arc<AccountStore>,
    entries: watch::Sender<Vec<FavoriteEntry>>,
    in_flight: Mutex<HashSet<i64>>,
}

/// Marks a recipe id as having a store call in flight until dropped.
struct Claim<'a> {
    ids: &'a Mutex<HashSet<i64>>,
    recipe_id: i64,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        lock(self.ids).remove(&self.recipe_id);
    }
}

impl FavoritesList {
    pub fn new(account: Arc<AccountStore>) -> Self {
        let (entries, _) = watch::channel(Vec::new());
        FavoritesList {
            account,
            entries,
            in_flight: Mutex::default(),
        }
    }

    /// Replaces the list with the stored favorites. Signed out, the list
    /// is simply emptied.
    pub async fn load(&self) -> Result<(), AccountError> {
        if !self.account.is_logged_in() {
            self.entries.send_replace(Vec::new());
            return Ok(());
        }
        let recipes = self.account.list_favorites().await?;
        self.entries.send_replace(
            recipes
                .into_iter()
                .map(|recipe| FavoriteEntry {
                    recipe,
                    status: SyncStatus::Confirmed,
                })
                .collect(),
        );
        Ok(())
    }

    pub fn entries(&self) -> Vec<FavoriteEntry> {
        self.entries.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<FavoriteEntry>> {
        self.entries.subscribe()
    }

    /// Recipes currently shown as favorites, pending ones included.
    pub fn recipes(&self) -> Vec<Recipe> {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.status != SyncStatus::Failed)
            .map(|entry| entry.recipe.clone())
            .collect()
    }

    pub fn contains(&self, recipe_id: i64) -> bool {
        self.status(recipe_id)
            .is_some_and(|status| status != SyncStatus::Failed)
    }

    pub fn status(&self, recipe_id: i64) -> Option<SyncStatus> {
        self.entries
            .borrow()
            .iter()
            .find(|entry| entry.recipe.id == recipe_id)
            .map(|entry| entry.status)
    }

    fn upsert(&self, recipe: Recipe, status: SyncStatus) {
        self.entries.send_modify(|entries| {
            match entries.iter_mut().find(|entry| entry.recipe.id == recipe.id) {
                Some(entry) => {
                    entry.recipe = recipe;
                    entry.status = status;
                }
                None => entries.push(FavoriteEntry { recipe, status }),
            }
        });
    }

    fn set_status(&self, recipe_id: i64, status: SyncStatus) {
        self.entries.send_modify(|entries| {
            if let Some(entry) = entries.iter_mut().find(|entry| entry.recipe.id == recipe_id) {
                entry.status = status;
            }
        });
    }

    fn claim(&self, recipe_id: i64) -> Option<Claim<'_>> {
        let claimed = lock(&self.in_flight).insert(recipe_id);
        claimed.then(|| Claim {
            ids: &self.in_flight,
            recipe_id,
        })
    }

    fn take(&self, recipe_id: i64) -> Option<FavoriteEntry> {
        let mut taken = None;
        self.entries.send_if_modified(|entries| {
            let index = entries.iter().position(|entry| entry.recipe.id == recipe_id);
            taken = index.map(|index| entries.remove(index));
            taken.is_some()
        });
        taken
    }

    /// Adds `recipe` if it is not a favorite, removes it otherwise.
    ///
    /// Signed out, this does nothing and reports `Skipped`. While an
    /// earlier change to the same recipe is in flight it reports `Busy`.
    pub async fn toggle(&self, recipe: &Recipe) -> ToggleOutcome {
        if !self.account.is_logged_in() {
            debug!(recipe_id = recipe.id, "favorite toggle ignored, not signed in");
            return ToggleOutcome::Skipped;
        }
        let Some(_claim) = self.claim(recipe.id) else {
            debug!(recipe_id = recipe.id, "favorite change already in flight");
            return ToggleOutcome::Busy;
        };
        if self.contains(recipe.id) {
            self.delete(recipe.id).await
        } else {
            self.add(recipe).await
        }
    }

    async fn add(&self, recipe: &Recipe) -> ToggleOutcome {
        self.upsert(recipe.clone(), SyncStatus::Pending);
        match self.account.add_favorite(recipe).await {
            Ok(()) => {
                self.set_status(recipe.id, SyncStatus::Confirmed);
                ToggleOutcome::Added
            }
            Err(e) => {
                warn!(recipe_id = recipe.id, error = %e, "favorite add failed");
                self.set_status(recipe.id, SyncStatus::Failed);
                ToggleOutcome::Failed
            }
        }
    }

    /// Removes a favorite, restoring it if the store refuses.
    pub async fn remove(&self, recipe_id: i64) -> ToggleOutcome {
        if !self.account.is_logged_in() {
            debug!(recipe_id, "favorite removal ignored, not signed in");
            return ToggleOutcome::Skipped;
        }
        let Some(_claim) = self.claim(recipe_id) else {
            debug!(recipe_id, "favorite change already in flight");
            return ToggleOutcome::Busy;
        };
        self.delete(recipe_id).await
    }

    async fn delete(&self, recipe_id: i64) -> ToggleOutcome {
        let previous = self.take(recipe_id);
        match self.account.remove_favorite(recipe_id).await {
            Ok(()) => ToggleOutcome::Removed,
            Err(e) => {
                warn!(recipe_id, error = %e, "favorite removal failed");
                if let Some(entry) = previous {
                    self.upsert(entry.recipe, SyncStatus::Confirmed);
                }
                ToggleOutcome::Failed
            }
        }
    }
}

/// The favorites screen: the stored favorites sorted by title.
#[derive(Debug)]
pub struct FavoritesScreen {
    favorites: Arc<FavoritesList>,
    recipes: Arc<FetchSlot<Vec<Recipe>>>,
    scope: TaskScope,
}

impl FavoritesScreen {
    pub fn new(ctx: &AppContext) -> Self {
        FavoritesScreen {
            favorites: ctx.favorites(),
            recipes: Arc::new(FetchSlot::new("favorites")),
            scope: ctx.task_scope(),
        }
    }

    pub fn refresh(&self) {
        let favorites = Arc::clone(&self.favorites);
        self.recipes.load(&self.scope, async move {
            favorites.load().await?;
            Ok::<_, AccountError>(sorted_by_title(favorites.recipes()))
        });
    }

    /// Removes one favorite and republishes the list.
    pub fn remove(&self, recipe_id: i64) {
        let favorites = Arc::clone(&self.favorites);
        let recipes = Arc::clone(&self.recipes);
        self.scope.spawn(async move {
            favorites.remove(recipe_id).await;
            let ticket = recipes.begin();
            recipes.resolve(ticket, Ok(sorted_by_title(favorites.recipes())));
        });
    }

    pub fn state(&self) -> FetchState<Vec<Recipe>> {
        self.recipes.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<Vec<Recipe>>> {
        self.recipes.subscribe()
    }

    pub async fn settle(&self) {
        self.scope.settle().await;
    }
}

fn sorted_by_title(mut recipes: Vec<Recipe>) -> Vec<Recipe> {
    recipes.sort_by(|a, b| a.title.cmp(&b.title));
    recipes
}
