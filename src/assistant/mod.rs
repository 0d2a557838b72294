//! Question answering about a recipe through a generative-text service.
//!
//! Each question is one stateless `generateContent` call carrying a prompt
//! built from the recipe. The answer is taken from the first candidate,
//! else from the response's error message, else [`NO_ANSWER`].

mod prompt;

pub use prompt::build_prompt;

use crate::config::{ApiKey, AssistantConfig};
use crate::model::Recipe;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

/// Returned when the service answers with neither a candidate nor an error.
pub const NO_ANSWER: &str = "no result";

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("Assistant request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Assistant returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Assistant response unreadable: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Answers questions about a recipe.
#[async_trait]
pub trait RecipeQa: Send + Sync {
    async fn ask(&self, recipe: &Recipe, question: &str) -> Result<String, AssistantError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    message: String,
}

impl GenerateResponse {
    fn first_candidate_text(&self) -> Option<&str> {
        self.candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .first()
            .map(|part| part.text.as_str())
            .filter(|text| !text.trim().is_empty())
    }

    fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .map(|error| error.message.as_str())
            .filter(|message| !message.trim().is_empty())
    }

    fn into_answer(self) -> String {
        if let Some(text) = self.first_candidate_text() {
            return text.to_string();
        }
        if let Some(message) = self.error_message() {
            warn!(message, "assistant answered with an error field");
            return message.to_string();
        }
        NO_ANSWER.to_string()
    }
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: ApiKey,
    model: String,
    answer_language: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a client from configuration with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `AssistantError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &AssistantConfig, timeout: Duration) -> Result<Self, AssistantError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &AssistantConfig) -> Self {
        GeminiClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            answer_language: config.answer_language.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl RecipeQa for GeminiClient {
    #[instrument(skip(self, recipe, question), fields(recipe_id = recipe.id, model = %self.model))]
    async fn ask(&self, recipe: &Recipe, question: &str) -> Result<String, AssistantError> {
        if question.trim().is_empty() {
            return Err(AssistantError::EmptyQuestion);
        }

        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![TextPart {
                    text: build_prompt(recipe, question, &self.answer_language),
                }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<GenerateResponse>(&body)
                .ok()
                .and_then(|parsed| parsed.error_message().map(str::to_string))
                .unwrap_or(body);
            error!(status = status.as_u16(), "assistant request rejected");
            return Err(AssistantError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        let answer = parsed.into_answer();
        debug!(chars = answer.len(), "assistant answered");
        Ok(answer)
    }
}
