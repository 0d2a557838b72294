//! User accounts, favorites and favorite topics.
//!
//! Authentication and record storage are two separate services joined by
//! the signed-in user's id: [`IdentityProvider`] answers "who is signed
//! in", [`UserStore`] holds the `users/{uid}` tree. [`AccountStore`] is
//! the only type the rest of the crate talks to.

mod identity;
mod memory;
mod store;

pub use identity::RemoteIdentity;
pub use memory::{MemoryIdentity, MemoryUserStore};
pub use store::RemoteUserStore;

use crate::model::{ProfileUpdate, Recipe, User};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

#[derive(Error, Debug)]
pub enum AccountError {
    /// An operation that needs a signed-in user was called without one.
    #[error("not signed in")]
    NotSignedIn,

    /// The identity service refused the request. `code` is the service's
    /// error code, e.g. `EMAIL_EXISTS`.
    #[error("Authentication failed: {code}")]
    Auth { code: String },

    #[error("Account storage failed: {0}")]
    Store(String),

    #[error("Account request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Account data unreadable: {0}")]
    Decode(#[from] serde_json::Error),
}

/// An authenticated identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub uid: String,
    pub email: String,
    pub id_token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("id_token", &"[REDACTED]")
            .finish()
    }
}

/// The authentication half of an account backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates an identity and signs it in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AccountError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AccountError>;

    /// Changes the signed-in identity's email.
    async fn update_email(&self, email: &str) -> Result<(), AccountError>;

    /// Changes the signed-in identity's password.
    async fn update_password(&self, password: &str) -> Result<(), AccountError>;

    /// Deletes the signed-in identity and signs out.
    async fn delete_current(&self) -> Result<(), AccountError>;

    fn sign_out(&self);

    /// The live authentication state. Never cached by callers.
    fn current_session(&self) -> Option<Session>;
}

/// The storage half of an account backend: a JSON tree addressed by
/// slash-separated paths, every call carrying the caller's id token.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Reads the value at `path`; `None` when nothing is stored there.
    async fn get(&self, path: &str, token: &str) -> Result<Option<Value>, AccountError>;

    /// Replaces the value at `path`.
    async fn set(&self, path: &str, value: &Value, token: &str) -> Result<(), AccountError>;

    /// Merges `fields` into the object at `path`.
    async fn update(
        &self,
        path: &str,
        fields: &Map<String, Value>,
        token: &str,
    ) -> Result<(), AccountError>;

    async fn remove(&self, path: &str, token: &str) -> Result<(), AccountError>;
}

fn user_path(uid: &str) -> String {
    format!("users/{uid}")
}

fn favorites_path(uid: &str) -> String {
    format!("users/{uid}/favoriteRecipes")
}

fn favorite_path(uid: &str, recipe_id: i64) -> String {
    format!("users/{uid}/favoriteRecipes/{recipe_id}")
}

fn topics_path(uid: &str) -> String {
    format!("users/{uid}/favoriteTopics")
}

/// Account operations over an identity provider and a user store.
///
/// Every storage operation first asks the identity provider for the live
/// session and fails with [`AccountError::NotSignedIn`] when there is
/// none. Sign-in state changes are published on a watch channel, see
/// [`AccountStore::subscribe_session`].
pub struct AccountStore {
    identity: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserStore>,
    session_tx: watch::Sender<bool>,
    skipped: AtomicU64,
}

impl std::fmt::Debug for AccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountStore")
            .field("logged_in", &self.is_logged_in())
            .field("skipped", &self.skipped_records())
            .finish_non_exhaustive()
    }
}

impl AccountStore {
    pub fn new(identity: Arc<dyn IdentityProvider>, users: Arc<dyn UserStore>) -> Self {
        let (session_tx, _) = watch::channel(identity.current_session().is_some());
        AccountStore {
            identity,
            users,
            session_tx,
            skipped: AtomicU64::new(0),
        }
    }

    /// An account store backed entirely by memory.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryIdentity::new()),
            Arc::new(MemoryUserStore::new()),
        )
    }

    pub fn is_logged_in(&self) -> bool {
        self.identity.current_session().is_some()
    }

    /// Receives `true` on sign-in and `false` on sign-out or deletion.
    pub fn subscribe_session(&self) -> watch::Receiver<bool> {
        self.session_tx.subscribe()
    }

    /// Number of stored favorite records that failed to decode and were
    /// left out of results since this store was created.
    pub fn skipped_records(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    fn publish(&self, logged_in: bool) {
        self.session_tx.send_if_modified(|current| {
            if *current == logged_in {
                return false;
            }
            *current = logged_in;
            true
        });
    }

    fn require_session(&self) -> Result<Session, AccountError> {
        self.identity
            .current_session()
            .ok_or(AccountError::NotSignedIn)
    }

    /// Creates an identity and its user record. If the record cannot be
    /// written the identity is deleted again and the call fails.
    #[instrument(skip(self, password))]
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AccountError> {
        let session = self.identity.sign_up(email, password).await?;
        let user = User::new(session.uid.clone(), email, username);
        if let Err(e) = self.store_new_user(&session, &user).await {
            warn!(
                uid = %session.uid,
                error = %e,
                "user record not written, rolling back sign-up"
            );
            if let Err(rollback) = self.identity.delete_current().await {
                warn!(uid = %session.uid, error = %rollback, "identity rollback failed");
                self.identity.sign_out();
            }
            self.publish(false);
            return Err(e);
        }

        info!(uid = %session.uid, "account created");
        self.publish(true);
        Ok(user)
    }

    async fn store_new_user(&self, session: &Session, user: &User) -> Result<(), AccountError> {
        self.users
            .set(
                &user_path(&session.uid),
                &serde_json::to_value(user)?,
                &session.id_token,
            )
            .await
    }

    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let session = self.identity.sign_in(email, password).await?;
        info!(uid = %session.uid, "signed in");
        self.publish(true);

        match self.load_user(&session).await? {
            Some(user) => Ok(user),
            None => {
                warn!(uid = %session.uid, "signed in without a stored user record");
                Ok(User::new(session.uid, session.email, ""))
            }
        }
    }

    pub fn sign_out(&self) {
        self.identity.sign_out();
        info!("signed out");
        self.publish(false);
    }

    /// The signed-in user's record, or `None` when signed out.
    pub async fn current_user(&self) -> Result<Option<User>, AccountError> {
        match self.identity.current_session() {
            Some(session) => self.load_user(&session).await,
            None => Ok(None),
        }
    }

    async fn load_user(&self, session: &Session) -> Result<Option<User>, AccountError> {
        let value = self
            .users
            .get(&user_path(&session.uid), &session.id_token)
            .await?;
        value.map(|value| self.decode_user(value)).transpose()
    }

    /// Decodes a user record, dropping favorites that do not parse rather
    /// than failing the whole record.
    fn decode_user(&self, mut value: Value) -> Result<User, AccountError> {
        let favorites = value
            .as_object_mut()
            .and_then(|record| record.remove("favoriteRecipes"));
        let mut user: User = serde_json::from_value(value)?;
        user.favorite_recipes = self
            .decode_favorites(favorites)
            .into_iter()
            .map(|recipe| (recipe.id.to_string(), recipe))
            .collect();
        Ok(user)
    }

    fn decode_favorites(&self, value: Option<Value>) -> Vec<Recipe> {
        let Some(Value::Object(entries)) = value else {
            return Vec::new();
        };

        entries
            .into_iter()
            .filter_map(|(key, entry)| match serde_json::from_value::<Recipe>(entry) {
                Ok(recipe) => Some(recipe),
                Err(e) => {
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, error = %e, "skipping malformed favorite record");
                    None
                }
            })
            .collect()
    }

    /// Applies a profile edit.
    ///
    /// Email and password changes go to the identity service first, then
    /// the record fields are written. The two steps are independent: if
    /// the second fails the first is not undone.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), AccountError> {
        let session = self.require_session()?;

        if let Some(email) = update.email.as_deref() {
            if !email.trim().is_empty() && email != session.email {
                self.identity.update_email(email).await?;
                debug!(uid = %session.uid, "identity email updated");
            }
        }
        if let Some(password) = update.password.as_deref() {
            if !password.is_empty() {
                self.identity.update_password(password).await?;
                debug!(uid = %session.uid, "identity password updated");
            }
        }

        let fields = update.record_fields();
        if fields.is_empty() {
            return Ok(());
        }
        // The identity calls above may have rotated the token.
        let session = self.require_session()?;
        self.users
            .update(&user_path(&session.uid), &fields, &session.id_token)
            .await?;
        info!(uid = %session.uid, fields = fields.len(), "profile updated");
        Ok(())
    }

    /// Deletes the user record, then the identity.
    #[instrument(skip(self))]
    pub async fn delete_account(&self) -> Result<(), AccountError> {
        let session = self.require_session()?;
        self.users
            .remove(&user_path(&session.uid), &session.id_token)
            .await?;
        self.identity.delete_current().await?;
        info!(uid = %session.uid, "account deleted");
        self.publish(false);
        Ok(())
    }

    /// The signed-in user's favorite recipe snapshots.
    pub async fn list_favorites(&self) -> Result<Vec<Recipe>, AccountError> {
        let session = self.require_session()?;
        let value = self
            .users
            .get(&favorites_path(&session.uid), &session.id_token)
            .await?;
        let favorites = self.decode_favorites(value);
        debug!(uid = %session.uid, count = favorites.len(), "favorites loaded");
        Ok(favorites)
    }

    /// Stores a snapshot of `recipe` under its id. Adding the same id
    /// again overwrites the snapshot.
    #[instrument(skip(self, recipe), fields(recipe_id = recipe.id))]
    pub async fn add_favorite(&self, recipe: &Recipe) -> Result<(), AccountError> {
        let session = self.require_session()?;
        self.users
            .set(
                &favorite_path(&session.uid, recipe.id),
                &serde_json::to_value(recipe)?,
                &session.id_token,
            )
            .await?;
        debug!(uid = %session.uid, "favorite saved");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_favorite(&self, recipe_id: i64) -> Result<(), AccountError> {
        let session = self.require_session()?;
        self.users
            .remove(&favorite_path(&session.uid, recipe_id), &session.id_token)
            .await?;
        debug!(uid = %session.uid, "favorite removed");
        Ok(())
    }

    /// Replaces the topic to weight map.
    pub async fn set_favorite_topics(
        &self,
        topics: &BTreeMap<String, i64>,
    ) -> Result<(), AccountError> {
        let session = self.require_session()?;
        self.users
            .set(
                &topics_path(&session.uid),
                &serde_json::to_value(topics)?,
                &session.id_token,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipe(id: i64, title: &str) -> Recipe {
        Recipe {
            id,
            title: title.into(),
            ready_in_minutes: Some(25),
            cuisines: Some(vec!["Italian".into()]),
            ..Default::default()
        }
    }

    async fn signed_in_store() -> AccountStore {
        let store = AccountStore::in_memory();
        store
            .sign_up("chef", "chef@example.com", "secret1")
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_add_favorite_requires_sign_in() {
        let store = AccountStore::in_memory();
        let err = store.add_favorite(&recipe(1, "Soup")).await.unwrap_err();
        assert!(matches!(err, AccountError::NotSignedIn));
        assert_eq!(err.to_string(), "not signed in");

        store
            .sign_up("chef", "chef@example.com", "secret1")
            .await
            .unwrap();
        assert!(store.list_favorites().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_favorite_twice_keeps_one_entry() {
        let store = signed_in_store().await;
        let soup = recipe(7, "Soup");
        store.add_favorite(&soup).await.unwrap();
        store.add_favorite(&soup).await.unwrap();

        let favorites = store.list_favorites().await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, 7);
    }

    #[tokio::test]
    async fn test_favorite_round_trips_field_for_field() {
        let store = signed_in_store().await;
        let pasta: Recipe = serde_json::from_value(json!({
            "id": 716429,
            "title": "Pasta with Garlic",
            "image": "https://img.example/716429.jpg",
            "servings": 2,
            "readyInMinutes": 45,
            "diets": ["vegetarian"],
            "extendedIngredients": [{"id": 1, "name": "garlic", "amount": 2.0, "unit": "cloves"}],
            "analyzedInstructions": [{"name": "", "steps": [{"number": 1, "step": "Boil."}]}]
        }))
        .unwrap();

        store.add_favorite(&pasta).await.unwrap();
        let favorites = store.list_favorites().await.unwrap();
        assert_eq!(favorites, vec![pasta]);
    }

    #[tokio::test]
    async fn test_remove_favorite() {
        let store = signed_in_store().await;
        store.add_favorite(&recipe(1, "A")).await.unwrap();
        store.add_favorite(&recipe(2, "B")).await.unwrap();
        store.remove_favorite(1).await.unwrap();

        let ids: Vec<i64> = store
            .list_favorites()
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_malformed_favorites_are_skipped_and_counted() {
        let identity = Arc::new(MemoryIdentity::new());
        let users = Arc::new(MemoryUserStore::new());
        let store = AccountStore::new(identity.clone(), users.clone());
        let user = store
            .sign_up("chef", "chef@example.com", "secret1")
            .await
            .unwrap();
        store.add_favorite(&recipe(1, "Good")).await.unwrap();

        let token = identity.current_session().unwrap().id_token;
        users
            .set(
                &favorite_path(&user.id, 2),
                &json!({"id": "not a number", "title": 5}),
                &token,
            )
            .await
            .unwrap();

        let favorites = store.list_favorites().await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(store.skipped_records(), 1);

        let current = store.current_user().await.unwrap().unwrap();
        assert_eq!(current.favorite_recipes.len(), 1);
        assert_eq!(store.skipped_records(), 2);
    }

    #[tokio::test]
    async fn test_session_notifications() {
        let store = AccountStore::in_memory();
        let mut rx = store.subscribe_session();
        assert!(!*rx.borrow_and_update());

        store
            .sign_up("chef", "chef@example.com", "secret1")
            .await
            .unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());

        store.sign_out();
        assert!(!*rx.borrow_and_update());
        assert!(!store.is_logged_in());

        store.sign_in("chef@example.com", "secret1").await.unwrap();
        assert!(*rx.borrow_and_update());
        store.delete_account().await.unwrap();
        assert!(!*rx.borrow_and_update());
    }

    struct UnwritableStore;

    #[async_trait]
    impl UserStore for UnwritableStore {
        async fn get(&self, _: &str, _: &str) -> Result<Option<Value>, AccountError> {
            Ok(None)
        }
        async fn set(&self, _: &str, _: &Value, _: &str) -> Result<(), AccountError> {
            Err(AccountError::Store("permission denied".into()))
        }
        async fn update(&self, _: &str, _: &Map<String, Value>, _: &str) -> Result<(), AccountError> {
            Ok(())
        }
        async fn remove(&self, _: &str, _: &str) -> Result<(), AccountError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sign_up_without_record_leaves_everyone_signed_out() {
        let identity = Arc::new(MemoryIdentity::new());
        let store = AccountStore::new(identity.clone(), Arc::new(UnwritableStore));
        let rx = store.subscribe_session();

        let err = store
            .sign_up("chef", "chef@example.com", "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Store(_)));
        assert!(!store.is_logged_in());
        assert!(!*rx.borrow());
        assert!(identity.current_session().is_none());

        // The half-created identity is gone, so the email can register again.
        let retry = AccountStore::new(identity, Arc::new(MemoryUserStore::new()));
        retry
            .sign_up("chef", "chef@example.com", "secret1")
            .await
            .unwrap();
        assert!(retry.is_logged_in());
    }

    #[tokio::test]
    async fn test_sign_in_returns_stored_record() {
        let store = signed_in_store().await;
        store
            .set_favorite_topics(&BTreeMap::from([("dessert".to_string(), 3)]))
            .await
            .unwrap();
        store.sign_out();
        assert!(store.current_user().await.unwrap().is_none());

        let user = store.sign_in("chef@example.com", "secret1").await.unwrap();
        assert_eq!(user.username, "chef");
        assert_eq!(user.favorite_topics.get("dessert"), Some(&3));
    }

    #[tokio::test]
    async fn test_update_profile_never_stores_password() {
        let identity = Arc::new(MemoryIdentity::new());
        let users = Arc::new(MemoryUserStore::new());
        let store = AccountStore::new(identity.clone(), users.clone());
        let user = store
            .sign_up("chef", "chef@example.com", "secret1")
            .await
            .unwrap();

        store
            .update_profile(&ProfileUpdate {
                username: Some("head chef".into()),
                email: Some("head@example.com".into()),
                avatar: None,
                password: Some("newsecret".into()),
            })
            .await
            .unwrap();

        let token = identity.current_session().unwrap().id_token;
        let record = users.get(&user_path(&user.id), &token).await.unwrap().unwrap();
        assert_eq!(record["username"], "head chef");
        assert_eq!(record["email"], "head@example.com");
        assert!(record.get("password").is_none());

        store.sign_out();
        store.sign_in("head@example.com", "newsecret").await.unwrap();
    }

    #[tokio::test]
    async fn test_operations_without_session() {
        let store = AccountStore::in_memory();
        assert!(matches!(
            store.list_favorites().await,
            Err(AccountError::NotSignedIn)
        ));
        assert!(matches!(
            store.update_profile(&ProfileUpdate::default()).await,
            Err(AccountError::NotSignedIn)
        ));
        assert!(matches!(
            store.delete_account().await,
            Err(AccountError::NotSignedIn)
        ));
    }
}
