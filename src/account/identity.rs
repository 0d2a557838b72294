use super::{AccountError, IdentityProvider, Session};
use crate::config::ApiKey;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, instrument, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct AuthResponse {
    local_id: String,
    email: String,
    id_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Reduces a service error message such as
/// `"WEAK_PASSWORD : Password should be at least 6 characters"` to its code.
fn error_code(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| {
            envelope
                .error
                .message
                .split(" : ")
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        })
        .unwrap_or_else(|_| "UNKNOWN".to_string())
}

/// Identity provider over the Identity Toolkit REST API.
///
/// The session from the last successful sign-in is held in memory until
/// sign-out; nothing is written to disk.
pub struct RemoteIdentity {
    client: Client,
    base_url: String,
    api_key: ApiKey,
    session: RwLock<Option<Session>>,
}

impl std::fmt::Debug for RemoteIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteIdentity")
            .field("base_url", &self.base_url)
            .field("session", &self.current_session())
            .finish_non_exhaustive()
    }
}

impl RemoteIdentity {
    pub fn new(client: Client, base_url: &str, api_key: ApiKey) -> Self {
        RemoteIdentity {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            session: RwLock::new(None),
        }
    }

    fn replace_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        action: &str,
        body: &B,
    ) -> Result<AuthResponse, AccountError> {
        let url = format!("{}/v1/accounts:{}", self.base_url, action);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.expose())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let code = error_code(&text);
            warn!(action, status = status.as_u16(), %code, "identity request rejected");
            return Err(AccountError::Auth { code });
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn authenticate(
        &self,
        action: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AccountError> {
        let request = CredentialsRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response = self.call(action, &request).await?;
        let session = Session {
            uid: response.local_id,
            email: if response.email.is_empty() {
                email.to_string()
            } else {
                response.email
            },
            id_token: response.id_token.unwrap_or_default(),
        };
        self.replace_session(Some(session.clone()));
        debug!(uid = %session.uid, action, "identity session started");
        Ok(session)
    }

    async fn update(&self, email: Option<&str>, password: Option<&str>) -> Result<(), AccountError> {
        let current = self.current_session().ok_or(AccountError::NotSignedIn)?;
        let request = UpdateRequest {
            id_token: &current.id_token,
            email,
            password,
            return_secure_token: true,
        };
        let response = self.call("update", &request).await?;

        let mut next = current;
        if let Some(email) = email {
            next.email = email.to_string();
        }
        if let Some(token) = response.id_token.filter(|token| !token.is_empty()) {
            next.id_token = token;
        }
        self.replace_session(Some(next));
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for RemoteIdentity {
    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AccountError> {
        self.authenticate("signUp", email, password).await
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AccountError> {
        self.authenticate("signInWithPassword", email, password).await
    }

    async fn update_email(&self, email: &str) -> Result<(), AccountError> {
        self.update(Some(email), None).await
    }

    async fn update_password(&self, password: &str) -> Result<(), AccountError> {
        self.update(None, Some(password)).await
    }

    async fn delete_current(&self) -> Result<(), AccountError> {
        let current = self.current_session().ok_or(AccountError::NotSignedIn)?;
        self.call(
            "delete",
            &DeleteRequest {
                id_token: &current.id_token,
            },
        )
        .await?;
        self.replace_session(None);
        Ok(())
    }

    fn sign_out(&self) {
        self.replace_session(None);
    }

    fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn identity_for(server: &MockServer) -> RemoteIdentity {
        RemoteIdentity::new(Client::new(), &server.uri(), ApiKey::new("web-key"))
    }

    #[tokio::test]
    async fn test_sign_in_starts_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .and(query_param("key", "web-key"))
            .and(body_partial_json(json!({
                "email": "cook@example.com",
                "password": "secret1",
                "returnSecureToken": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "uid-123",
                "email": "cook@example.com",
                "idToken": "token-abc",
                "refreshToken": "refresh",
                "expiresIn": "3600"
            })))
            .mount(&server)
            .await;

        let identity = identity_for(&server);
        assert!(identity.current_session().is_none());
        let session = identity.sign_in("cook@example.com", "secret1").await.unwrap();
        assert_eq!(session.uid, "uid-123");
        assert_eq!(identity.current_session(), Some(session));

        identity.sign_out();
        assert!(identity.current_session().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signUp"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "WEAK_PASSWORD : Password should be at least 6 characters",
                    "errors": []
                }
            })))
            .mount(&server)
            .await;

        let err = identity_for(&server)
            .sign_up("cook@example.com", "123")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Auth { code } if code == "WEAK_PASSWORD"));
    }

    #[tokio::test]
    async fn test_update_email_rotates_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "uid-1", "email": "old@example.com", "idToken": "t1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:update"))
            .and(body_partial_json(json!({"idToken": "t1", "email": "new@example.com"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "uid-1", "email": "new@example.com", "idToken": "t2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let identity = identity_for(&server);
        identity.sign_in("old@example.com", "secret1").await.unwrap();
        identity.update_email("new@example.com").await.unwrap();

        let session = identity.current_session().unwrap();
        assert_eq!(session.email, "new@example.com");
        assert_eq!(session.id_token, "t2");
    }

    #[tokio::test]
    async fn test_update_without_session() {
        let server = MockServer::start().await;
        let result = identity_for(&server).update_password("secret2").await;
        assert!(matches!(result, Err(AccountError::NotSignedIn)));
    }

    #[test]
    fn test_error_code_parsing() {
        assert_eq!(
            error_code(r#"{"error":{"message":"EMAIL_EXISTS"}}"#),
            "EMAIL_EXISTS"
        );
        assert_eq!(error_code("<html>"), "UNKNOWN");
    }
}
