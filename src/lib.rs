pub mod account;
pub mod assistant;
pub mod config;
pub mod context;
pub mod fetcher;
pub mod ffi;
pub mod logging;
pub mod model;
pub mod prefs;
pub mod search;
pub mod state;

pub use account::{AccountError, AccountStore};
pub use assistant::{GeminiClient, RecipeQa};
pub use config::AppConfig;
pub use context::AppContext;
pub use fetcher::{FetchError, RecipeApiClient, RecipeSource};
pub use model::*;
pub use search::{RandomFilters, SearchFilters};
pub use state::{FavoritesList, FetchState};

uniffi::setup_scaffolding!();
