use super::{AccountError, IdentityProvider, Session, UserStore};
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;
use tracing::debug;

const MIN_PASSWORD_LEN: usize = 6;

fn auth_error(code: &str) -> AccountError {
    AccountError::Auth { code: code.into() }
}

fn new_uid() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(28)
        .map(char::from)
        .collect()
}

struct Credentials {
    uid: String,
    password: String,
}

#[derive(Default)]
struct IdentityState {
    accounts: HashMap<String, Credentials>,
    current: Option<Session>,
}

/// An identity provider that keeps accounts in process memory.
///
/// Rejects the same conditions as the remote service and reports them
/// with the same codes (`EMAIL_EXISTS`, `WEAK_PASSWORD`,
/// `INVALID_LOGIN_CREDENTIALS`).
#[derive(Default)]
pub struct MemoryIdentity {
    state: Mutex<IdentityState>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, IdentityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_session(state: &mut IdentityState, uid: &str, email: &str) -> Session {
        let session = Session {
            uid: uid.to_string(),
            email: email.to_string(),
            id_token: format!("memory-{}", new_uid()),
        };
        state.current = Some(session.clone());
        session
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AccountError> {
        let mut state = self.lock();
        if state.accounts.contains_key(email) {
            return Err(auth_error("EMAIL_EXISTS"));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(auth_error("WEAK_PASSWORD"));
        }

        let uid = new_uid();
        state.accounts.insert(
            email.to_string(),
            Credentials {
                uid: uid.clone(),
                password: password.to_string(),
            },
        );
        debug!(%uid, "memory identity created");
        Ok(Self::start_session(&mut state, &uid, email))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AccountError> {
        let mut state = self.lock();
        let uid = match state.accounts.get(email) {
            Some(credentials) if credentials.password == password => credentials.uid.clone(),
            _ => return Err(auth_error("INVALID_LOGIN_CREDENTIALS")),
        };
        Ok(Self::start_session(&mut state, &uid, email))
    }

    async fn update_email(&self, email: &str) -> Result<(), AccountError> {
        let mut state = self.lock();
        let session = state.current.clone().ok_or(AccountError::NotSignedIn)?;
        if state.accounts.contains_key(email) {
            return Err(auth_error("EMAIL_EXISTS"));
        }
        if let Some(credentials) = state.accounts.remove(&session.email) {
            state.accounts.insert(email.to_string(), credentials);
        }
        if let Some(current) = state.current.as_mut() {
            current.email = email.to_string();
        }
        Ok(())
    }

    async fn update_password(&self, password: &str) -> Result<(), AccountError> {
        let mut state = self.lock();
        let session = state.current.clone().ok_or(AccountError::NotSignedIn)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(auth_error("WEAK_PASSWORD"));
        }
        if let Some(credentials) = state.accounts.get_mut(&session.email) {
            credentials.password = password.to_string();
        }
        Ok(())
    }

    async fn delete_current(&self) -> Result<(), AccountError> {
        let mut state = self.lock();
        let session = state.current.take().ok_or(AccountError::NotSignedIn)?;
        state.accounts.remove(&session.email);
        Ok(())
    }

    fn sign_out(&self) {
        self.lock().current = None;
    }

    fn current_session(&self) -> Option<Session> {
        self.lock().current.clone()
    }
}

/// A user store holding the whole tree as one JSON value.
///
/// Tokens are accepted without checking.
pub struct MemoryUserStore {
    root: RwLock<Value>,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        MemoryUserStore {
            root: RwLock::new(Value::Object(Map::new())),
        }
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |node, segment| node.get(segment))
}

/// Walks to `path`, creating empty objects on the way and replacing any
/// non-object found in between.
fn lookup_or_create<'a>(root: &'a mut Value, path: &str) -> &'a mut Value {
    segments(path).fold(root, |node, segment| {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        &mut node[segment]
    })
}

fn remove_at(root: &mut Value, path: &str) {
    let mut parts: Vec<&str> = segments(path).collect();
    let Some(leaf) = parts.pop() else {
        *root = Value::Object(Map::new());
        return;
    };
    let mut node = root;
    for segment in parts {
        match node.get_mut(segment) {
            Some(child) => node = child,
            None => return,
        }
    }
    if let Value::Object(children) = node {
        children.remove(leaf);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, path: &str, _token: &str) -> Result<Option<Value>, AccountError> {
        let root = self.root.read().await;
        Ok(lookup(&root, path).filter(|value| !value.is_null()).cloned())
    }

    async fn set(&self, path: &str, value: &Value, _token: &str) -> Result<(), AccountError> {
        let mut root = self.root.write().await;
        if value.is_null() {
            remove_at(&mut root, path);
        } else {
            *lookup_or_create(&mut root, path) = value.clone();
        }
        Ok(())
    }

    async fn update(
        &self,
        path: &str,
        fields: &Map<String, Value>,
        _token: &str,
    ) -> Result<(), AccountError> {
        let mut root = self.root.write().await;
        let node = lookup_or_create(&mut root, path);
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        if let Value::Object(children) = node {
            for (key, value) in fields {
                children.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn remove(&self, path: &str, _token: &str) -> Result<(), AccountError> {
        remove_at(&mut *self.root.write().await, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_tree_paths() {
        let store = MemoryUserStore::new();
        store
            .set("users/u1/favoriteRecipes/3", &json!({"id": 3, "title": "Stew"}), "t")
            .await
            .unwrap();

        let recipes = store.get("users/u1/favoriteRecipes", "t").await.unwrap();
        assert_eq!(recipes, Some(json!({"3": {"id": 3, "title": "Stew"}})));

        store.remove("users/u1/favoriteRecipes/3", "t").await.unwrap();
        let recipes = store.get("users/u1/favoriteRecipes", "t").await.unwrap();
        assert_eq!(recipes, Some(json!({})));
        assert_eq!(store.get("users/u2", "t").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryUserStore::new();
        store
            .set("users/u1", &json!({"username": "a", "email": "a@x.io"}), "t")
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("username".into(), json!("b"));
        store.update("users/u1", &fields, "t").await.unwrap();

        let user = store.get("users/u1", "t").await.unwrap().unwrap();
        assert_eq!(user, json!({"username": "b", "email": "a@x.io"}));
    }

    #[tokio::test]
    async fn test_identity_error_codes() {
        let identity = MemoryIdentity::new();
        identity.sign_up("a@x.io", "secret1").await.unwrap();

        let exists = identity.sign_up("a@x.io", "secret1").await.unwrap_err();
        assert!(matches!(exists, AccountError::Auth { code } if code == "EMAIL_EXISTS"));

        let weak = identity.sign_up("b@x.io", "123").await.unwrap_err();
        assert!(matches!(weak, AccountError::Auth { code } if code == "WEAK_PASSWORD"));

        identity.sign_out();
        assert!(identity.current_session().is_none());
        assert!(identity.sign_in("a@x.io", "wrong").await.is_err());
        let session = identity.sign_in("a@x.io", "secret1").await.unwrap();
        assert_eq!(session.email, "a@x.io");
        assert_eq!(session.uid.len(), 28);
    }
}
