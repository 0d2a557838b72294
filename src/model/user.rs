use super::Recipe;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A user account record as stored under `users/{uid}`.
///
/// Favorite recipes are full snapshots keyed by the recipe id rendered as a
/// string, so listing favorites never needs a second fetch from the recipe
/// service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub avatar: String,
    pub favorite_topics: BTreeMap<String, i64>,
    pub favorite_recipes: BTreeMap<String, Recipe>,
}

impl User {
    /// Creates a fresh record for a newly registered identity.
    pub fn new(id: impl Into<String>, email: impl Into<String>, username: impl Into<String>) -> Self {
        User {
            id: id.into(),
            email: email.into(),
            username: username.into(),
            ..Default::default()
        }
    }
}

/// A partial profile edit. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    /// Only forwarded to the identity service, never written to the record.
    pub password: Option<String>,
}

impl ProfileUpdate {
    /// Returns the record fields this update touches, in storage naming.
    pub(crate) fn record_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut fields = serde_json::Map::new();
        if let Some(username) = &self.username {
            fields.insert("username".into(), username.clone().into());
        }
        if let Some(email) = &self.email {
            fields.insert("email".into(), email.clone().into());
        }
        if let Some(avatar) = &self.avatar {
            fields.insert("avatar".into(), avatar.clone().into());
        }
        fields
    }
}
