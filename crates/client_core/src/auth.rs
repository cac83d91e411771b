//! Session handling against the hosted auth API.
//!
//! Tokens are issued and verified by the platform; this module only obtains,
//! refreshes and stores them, and reads the owner id out of the access token.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::domain::UserId;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::{error::AuthError, BaasConfig};

/// Refresh this many seconds before the access token actually expires.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Source of the current owner and bearer token.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn owner_id(&self) -> Option<UserId>;
    async fn access_token(&self) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: SessionUser,
}

impl Session {
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - now <= margin
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    /// The account exists but the email address must be confirmed first.
    ConfirmationRequired { user_id: Option<UserId> },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    #[serde(default)]
    provider: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: UserId,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    app_metadata: Option<AppMetadata>,
    #[serde(default)]
    user_metadata: Option<UserMetadata>,
}

/// Reads the user out of an access token. The signature is checked by the
/// platform on every request, not here.
pub fn user_from_access_token(access_token: &str) -> Result<SessionUser, AuthError> {
    Ok(decode_claims(access_token)?.into_user())
}

fn decode_claims(access_token: &str) -> Result<AccessClaims, AuthError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    let data = jsonwebtoken::decode::<AccessClaims>(
        access_token,
        &DecodingKey::from_secret(&[]),
        &validation,
    )?;
    Ok(data.claims)
}

impl AccessClaims {
    fn into_user(self) -> SessionUser {
        let meta = self.user_metadata.unwrap_or_default();
        SessionUser {
            id: self.sub,
            email: self.email.or(meta.email),
            provider: self.app_metadata.and_then(|m| m.provider),
            avatar_url: meta.avatar_url,
            user_name: meta.user_name.or(meta.full_name),
        }
    }
}

fn expiry(
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    token_exp: Option<i64>,
) -> DateTime<Utc> {
    expires_at
        .or(token_exp)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(|| Utc::now() + Duration::seconds(expires_in.unwrap_or(3600)))
}

fn session_from_tokens(
    access_token: String,
    refresh_token: String,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
) -> Result<Session, AuthError> {
    let claims = decode_claims(&access_token)?;
    let expires_at = expiry(expires_at, expires_in, claims.exp);
    Ok(Session {
        access_token,
        refresh_token,
        expires_at,
        user: claims.into_user(),
    })
}

pub struct AuthClient {
    http: Client,
    config: BaasConfig,
}

impl AuthClient {
    pub fn new(config: BaasConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http: Client, config: BaasConfig) -> Self {
        Self { http, config }
    }

    fn auth_url(&self, path: &str) -> Result<Url, AuthError> {
        Ok(self.config.endpoint(&format!("auth/v1/{path}"))?)
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = self.auth_url("token")?;
        let response = self
            .http
            .post(url)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let tokens: TokenResponse = checked(response).await?.json().await?;
        let session = session_from_tokens(
            tokens.access_token,
            tokens.refresh_token,
            tokens.expires_at,
            tokens.expires_in,
        )?;
        info!(user_id = %session.user.id, "signed in with password");
        Ok(session)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let url = self.auth_url("signup")?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: Value = checked(response).await?.json().await?;
        if body.get("access_token").is_some() {
            let tokens: TokenResponse = serde_json::from_value(body)
                .map_err(|err| AuthError::UnexpectedResponse(err.to_string()))?;
            let session = session_from_tokens(
                tokens.access_token,
                tokens.refresh_token,
                tokens.expires_at,
                tokens.expires_in,
            )?;
            return Ok(SignUpOutcome::SignedIn(session));
        }

        let user_id = body
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| id.parse().ok());
        info!("sign-up requires email confirmation");
        Ok(SignUpOutcome::ConfirmationRequired { user_id })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let url = self.auth_url("token")?;
        let response = self
            .http
            .post(url)
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let tokens: TokenResponse = checked(response).await?.json().await?;
        let session = session_from_tokens(
            tokens.access_token,
            tokens.refresh_token,
            tokens.expires_at,
            tokens.expires_in,
        )?;
        debug!(user_id = %session.user.id, expires_at = %session.expires_at, "refreshed session");
        Ok(session)
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = self.auth_url("logout")?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        checked(response).await?;
        Ok(())
    }

    /// Browser URL that starts the OAuth flow for `provider` (e.g. `kakao`).
    pub fn authorize_url(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<Url, AuthError> {
        let mut url = self.auth_url("authorize")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("provider", provider);
            if let Some(redirect_to) = redirect_to {
                pairs.append_pair("redirect_to", redirect_to);
            }
        }
        Ok(url)
    }
}

/// Builds a session from the URL the OAuth flow redirected back to.
pub fn session_from_redirect(redirect: &str) -> Result<Session, AuthError> {
    let url = Url::parse(redirect.trim())?;
    let params: HashMap<String, String> = url
        .fragment()
        .map(|fragment| {
            url::form_urlencoded::parse(fragment.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();

    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .cloned()
            .unwrap_or_else(|| error.clone());
        return Err(AuthError::InvalidRedirect(description));
    }

    let access_token = params
        .get("access_token")
        .cloned()
        .ok_or_else(|| AuthError::InvalidRedirect("missing access_token".into()))?;
    let refresh_token = params
        .get("refresh_token")
        .cloned()
        .ok_or_else(|| AuthError::InvalidRedirect("missing refresh_token".into()))?;
    let expires_at = params.get("expires_at").and_then(|v| v.parse().ok());
    let expires_in = params.get("expires_in").and_then(|v| v.parse().ok());

    session_from_tokens(access_token, refresh_token, expires_at, expires_in)
}

async fn checked(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or(body);
    warn!(status = status.as_u16(), %message, "auth request rejected");
    Err(AuthError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Holds the signed-in session, if any.
#[derive(Default)]
pub struct SessionStore {
    session: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }

    pub async fn current(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn set(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    pub async fn clear(&self) -> Option<Session> {
        self.session.write().await.take()
    }

    /// Refreshes the stored session when it is about to expire. Returns the
    /// session in effect afterwards.
    pub async fn ensure_fresh(&self, auth: &AuthClient) -> Result<Option<Session>, AuthError> {
        let Some(current) = self.current().await else {
            return Ok(None);
        };
        if !current.expires_within(Utc::now(), Duration::seconds(REFRESH_MARGIN_SECS)) {
            return Ok(Some(current));
        }

        let refreshed = auth.refresh(&current.refresh_token).await?;
        self.set(Some(refreshed.clone())).await;
        Ok(Some(refreshed))
    }
}

#[async_trait]
impl SessionProvider for SessionStore {
    async fn owner_id(&self) -> Option<UserId> {
        self.session.read().await.as_ref().map(|s| s.user.id)
    }

    async fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
