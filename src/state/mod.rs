//! Observable per-screen state.
//!
//! Each screen owns its [`FetchSlot`]s and a [`TaskScope`]; dropping the
//! screen cancels its requests. Favorites are shared across screens through
//! one [`FavoritesList`] held by the [`AppContext`](crate::context::AppContext).

mod auth;
mod chat;
mod detail;
mod explore;
mod favorites;
mod fetch;
mod home;
mod session;
mod splash;
mod wheel;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{describe_auth_error, validate_registration, FormError, LoginForm, RegisterForm};
pub use chat::RecipeChat;
pub use detail::RecipeDetailScreen;
pub use explore::ExploreScreen;
pub use favorites::{FavoriteEntry, FavoritesList, FavoritesScreen, SyncStatus, ToggleOutcome};
pub use fetch::{FetchSlot, FetchState, TaskScope, Ticket};
pub use home::{HomeScreen, CUISINES};
pub use session::{Route, SessionGate};
pub use splash::SplashScreen;
pub use wheel::RecipeWheel;
