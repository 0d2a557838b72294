use super::{AccountError, UserStore};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

/// User store over the realtime database REST API.
///
/// A path `users/abc` maps to `{database_url}/users/abc.json?auth={token}`.
/// Missing nodes read back as JSON `null`.
#[derive(Debug, Clone)]
pub struct RemoteUserStore {
    client: Client,
    database_url: String,
}

impl RemoteUserStore {
    pub fn new(client: Client, database_url: &str) -> Self {
        RemoteUserStore {
            client,
            database_url: database_url.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        let url = format!(
            "{}/{}.json",
            self.database_url,
            path.trim_matches('/')
        );
        self.client
            .request(method, url)
            .query(&[("auth", token)])
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<String, AccountError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(path, status = status.as_u16(), "user store request rejected");
            return Err(AccountError::Store(format!(
                "status {} for {}",
                status.as_u16(),
                path
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl UserStore for RemoteUserStore {
    #[instrument(skip(self, token))]
    async fn get(&self, path: &str, token: &str) -> Result<Option<Value>, AccountError> {
        let body = self
            .send(self.request(Method::GET, path, token), path)
            .await?;
        let value: Value = serde_json::from_str(&body)?;
        debug!(found = !value.is_null(), "user store read");
        Ok(Some(value).filter(|value| !value.is_null()))
    }

    #[instrument(skip(self, value, token))]
    async fn set(&self, path: &str, value: &Value, token: &str) -> Result<(), AccountError> {
        let request = self.request(Method::PUT, path, token).json(value);
        self.send(request, path).await.map(drop)
    }

    #[instrument(skip(self, fields, token))]
    async fn update(
        &self,
        path: &str,
        fields: &Map<String, Value>,
        token: &str,
    ) -> Result<(), AccountError> {
        let request = self.request(Method::PATCH, path, token).json(fields);
        self.send(request, path).await.map(drop)
    }

    #[instrument(skip(self, token))]
    async fn remove(&self, path: &str, token: &str) -> Result<(), AccountError> {
        let request = self.request(Method::DELETE, path, token);
        self.send(request, path).await.map(drop)
    }
}
