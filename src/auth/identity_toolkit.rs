use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{AuthError, AuthSession, IdentityProvider, User};

/// REST client for the hosted identity service (`/v1/accounts:*`).
pub struct IdentityToolkitProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    display_name: Option<String>,
    id_token: String,
    #[serde(default)]
    refresh_token: String,
}

impl From<TokenResponse> for AuthSession {
    fn from(resp: TokenResponse) -> Self {
        AuthSession {
            user: User {
                uid: resp.local_id,
                email: resp.email,
                display_name: resp.display_name.filter(|n| !n.is_empty()),
            },
            id_token: resp.id_token,
            refresh_token: resp.refresh_token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Form-encoded credential for `signInWithIdp`
fn idp_post_body(provider_id: &str, access_token: &str) -> Result<String, AuthError> {
    serde_urlencoded::to_string([("access_token", access_token), ("providerId", provider_id)])
        .map_err(|e| AuthError::Service(e.to_string()))
}

fn map_error_message(message: &str) -> AuthError {
    match message {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            AuthError::InvalidCredentials
        }
        "EMAIL_EXISTS" => AuthError::EmailExists,
        "USER_NOT_FOUND" => AuthError::UserNotFound,
        m if m.starts_with("WEAK_PASSWORD") => AuthError::WeakPassword,
        m => AuthError::Service(m.to_string()),
    }
}

impl IdentityToolkitProvider {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, AuthError> {
        if self.api_key.is_empty() {
            return Err(AuthError::Service("identity API key is not configured".to_string()));
        }

        debug!(method, "calling identity service");
        let response = self
            .client
            .post(format!("{}/v1/accounts:{}", self.base_url, method))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(envelope) => map_error_message(&envelope.error.message),
                Err(_) => AuthError::Service(format!("{}: {}", status, text)),
            });
        }

        serde_json::from_str(&text).map_err(|e| AuthError::Service(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let resp: TokenResponse = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        Ok(resp.into())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthSession, AuthError> {
        let resp: TokenResponse = self
            .call(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let mut session: AuthSession = resp.into();

        if let Some(name) = display_name.filter(|n| !n.is_empty()) {
            let _: Value = self
                .call(
                    "update",
                    json!({
                        "idToken": session.id_token,
                        "displayName": name,
                        "returnSecureToken": false,
                    }),
                )
                .await?;
            session.user.display_name = Some(name.to_string());
        }
        Ok(session)
    }

    async fn sign_in_with_provider(
        &self,
        provider_id: &str,
        access_token: &str,
    ) -> Result<AuthSession, AuthError> {
        let post_body = idp_post_body(provider_id, access_token)?;
        let resp: TokenResponse = self
            .call(
                "signInWithIdp",
                json!({
                    "postBody": post_body,
                    "requestUri": "http://localhost",
                    "returnIdpCredential": true,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        Ok(resp.into())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let _: Value = self
            .call(
                "sendOobCode",
                json!({ "requestType": "PASSWORD_RESET", "email": email }),
            )
            .await?;
        Ok(())
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError> {
        // Password sessions have no server-side sign-out; dropping the tokens is enough
        debug!(uid = %session.user.uid, "local sign-out");
        Ok(())
    }
}
