//! In-crate fakes for exercising the screens without a network.

use crate::account::AccountStore;
use crate::assistant::{AssistantError, RecipeQa};
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::fetcher::{FetchError, RecipeSource};
use crate::model::{Recipe, RecipePage};
use crate::search::{RandomFilters, SearchFilters};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

pub(crate) fn recipe(id: i64, title: &str, cuisine: &str) -> Recipe {
    Recipe {
        id,
        title: title.into(),
        cuisines: Some(vec![cuisine.into()]),
        ..Default::default()
    }
}

/// Serves a fixed catalogue. Searches match titles case-insensitively.
#[derive(Default)]
pub(crate) struct FakeSource {
    catalogue: Vec<Recipe>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    searches: Mutex<Vec<SearchFilters>>,
    randoms: Mutex<Vec<RandomFilters>>,
    failing: AtomicBool,
}

impl FakeSource {
    pub(crate) fn new(catalogue: Vec<Recipe>) -> Self {
        FakeSource {
            catalogue,
            ..Default::default()
        }
    }

    /// Holds the next search for `query` until the returned sender fires.
    /// An empty `query` holds the next search without one.
    pub(crate) fn gate(&self, query: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap()
            .insert(query.to_string(), rx);
        tx
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn searches(&self) -> Vec<SearchFilters> {
        self.searches.lock().unwrap().clone()
    }

    pub(crate) fn randoms(&self) -> Vec<RandomFilters> {
        self.randoms.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), FetchError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(FetchError::Status(500))
        } else {
            Ok(())
        }
    }
}

fn has_cuisine(recipe: &Recipe, cuisine: &str) -> bool {
    recipe
        .cuisines
        .iter()
        .flatten()
        .any(|c| c.eq_ignore_ascii_case(cuisine))
}

#[async_trait]
impl RecipeSource for FakeSource {
    async fn search(&self, filters: &SearchFilters) -> Result<RecipePage, FetchError> {
        self.searches.lock().unwrap().push(filters.clone());
        let key = filters.query.clone().unwrap_or_default();
        let gate = self.gates.lock().unwrap().remove(&key);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.check()?;

        let query = filters.query.clone().unwrap_or_default().to_lowercase();
        let results: Vec<Recipe> = self
            .catalogue
            .iter()
            .filter(|r| r.title.to_lowercase().contains(&query))
            .filter(|r| {
                filters
                    .cuisine
                    .as_deref()
                    .map_or(true, |cuisine| has_cuisine(r, cuisine))
            })
            .take(filters.number.unwrap_or(10) as usize)
            .cloned()
            .collect();
        Ok(RecipePage {
            total_results: results.len() as u32,
            number: results.len() as u32,
            offset: 0,
            results,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Recipe, FetchError> {
        self.check()?;
        self.catalogue
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(FetchError::NotFound(id))
    }

    async fn get_random(&self, filters: &RandomFilters) -> Result<Vec<Recipe>, FetchError> {
        self.randoms.lock().unwrap().push(filters.clone());
        self.check()?;
        Ok(self
            .catalogue
            .iter()
            .filter(|r| filters.include_tags.iter().all(|tag| has_cuisine(r, tag)))
            .take(filters.number.unwrap_or(1) as usize)
            .cloned()
            .collect())
    }
}

/// Answers every question with the same reply.
pub(crate) struct FakeQa {
    reply: Result<String, u16>,
}

impl FakeQa {
    pub(crate) fn answering(answer: &str) -> Self {
        FakeQa {
            reply: Ok(answer.to_string()),
        }
    }

    pub(crate) fn failing(status: u16) -> Self {
        FakeQa { reply: Err(status) }
    }
}

#[async_trait]
impl RecipeQa for FakeQa {
    async fn ask(&self, _recipe: &Recipe, question: &str) -> Result<String, AssistantError> {
        if question.trim().is_empty() {
            return Err(AssistantError::EmptyQuestion);
        }
        match &self.reply {
            Ok(answer) => Ok(answer.clone()),
            Err(status) => Err(AssistantError::Status {
                status: *status,
                message: "unavailable".into(),
            }),
        }
    }
}

pub(crate) fn context_from(source: Arc<FakeSource>, qa: Arc<FakeQa>) -> AppContext {
    AppContext::from_parts(
        AppConfig::default(),
        source,
        qa,
        Arc::new(AccountStore::in_memory()),
        Handle::current(),
    )
}

pub(crate) fn context_with(catalogue: Vec<Recipe>) -> AppContext {
    context_from(
        Arc::new(FakeSource::new(catalogue)),
        Arc::new(FakeQa::answering("Yes.")),
    )
}
