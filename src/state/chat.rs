use super::fetch::{lock, FetchSlot, FetchState, TaskScope};
use crate::assistant::RecipeQa;
use crate::context::AppContext;
use crate::model::{ChatTurn, Recipe, Transcript};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Default)]
struct ChatLog {
    // Bumped by `reset`; answers to questions asked before it are dropped.
    epoch: u64,
    transcript: Transcript,
}

/// The question panel on the recipe detail screen.
///
/// Every answer, and every failure, is appended to the transcript as a
/// turn. The transcript is never sent to the assistant; each question is
/// answered on its own.
pub struct RecipeChat {
    assistant: Arc<dyn RecipeQa>,
    answer: Arc<FetchSlot<String>>,
    log: Arc<Mutex<ChatLog>>,
    scope: TaskScope,
}

impl RecipeChat {
    pub fn new(ctx: &AppContext) -> Self {
        RecipeChat {
            assistant: ctx.assistant(),
            answer: Arc::new(FetchSlot::new("recipe_chat")),
            log: Arc::default(),
            scope: ctx.task_scope(),
        }
    }

    pub fn ask(&self, recipe: &Recipe, question: &str) {
        let ticket = self.answer.begin();
        let epoch = lock(&self.log).epoch;
        let assistant = Arc::clone(&self.assistant);
        let slot = Arc::clone(&self.answer);
        let log = Arc::clone(&self.log);
        let recipe = recipe.clone();
        let question = question.to_string();

        self.scope.spawn(async move {
            let result = assistant
                .ask(&recipe, &question)
                .await
                .map_err(|e| e.to_string());
            {
                let mut log = lock(&log);
                if log.epoch != epoch {
                    debug!(recipe_id = recipe.id, "chat was reset, dropping answer");
                    return;
                }
                let shown = match &result {
                    Ok(answer) => answer,
                    Err(message) => message,
                };
                log.transcript.push(question, shown.as_str());
            }
            slot.resolve(ticket, result);
        });
    }

    /// Clears the transcript and returns the panel to `Idle`.
    pub fn reset(&self) {
        {
            let mut log = lock(&self.log);
            log.epoch += 1;
            log.transcript.clear();
        }
        self.answer.reset();
    }

    pub fn state(&self) -> FetchState<String> {
        self.answer.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<String>> {
        self.answer.subscribe()
    }

    pub fn history(&self) -> Vec<ChatTurn> {
        lock(&self.log).transcript.turns().to_vec()
    }

    pub async fn settle(&self) {
        self.scope.settle().await;
    }
}
