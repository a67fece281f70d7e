use std::sync::Arc;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{watch, Mutex};

use crate::error::AuthError;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

/// Refresh the id token when it has less than this left.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// A federated credential, e.g. the id token from a Google sign-in.
#[derive(Debug, Clone)]
pub struct ProviderCredential {
    /// Provider id such as `google.com`
    pub provider_id: String,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

impl ProviderCredential {
    pub fn google(id_token: String) -> Self {
        Self {
            provider_id: "google.com".to_string(),
            id_token: Some(id_token),
            access_token: None,
        }
    }

    fn post_body(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref t) = self.id_token {
            parts.push(format!("id_token={}", t));
        }
        if let Some(ref t) = self.access_token {
            parts.push(format!("access_token={}", t));
        }
        parts.push(format!("providerId={}", self.provider_id));
        parts.join("&")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshTokenResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    id_token: String,
    expires_at: DateTime<Utc>,
}

fn expiry_from(expires_in: &str) -> DateTime<Utc> {
    let secs: i64 = expires_in.parse().unwrap_or(3600);
    Utc::now() + Duration::seconds(secs)
}

/// Turn a failed Identity Toolkit response into an [`AuthError`].
async fn auth_failure(resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(env) => AuthError::from_code(&env.error.message).into(),
        Err(_) => anyhow!("identity provider returned {} - {}", status, body),
    }
}

/// Identity provider client. Owns the observable "current user".
#[derive(Clone)]
pub struct FirebaseAuth {
    client: Client,
    api_key: String,
    current: Arc<watch::Sender<Option<AuthUser>>>,
}

impl FirebaseAuth {
    pub fn new(api_key: String) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            client: Client::new(),
            api_key,
            current: Arc::new(tx),
        }
    }

    /// Stream of the signed-in user; `None` while signed out.
    pub fn current_user(&self) -> watch::Receiver<Option<AuthUser>> {
        self.current.subscribe()
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.password_flow("accounts:signInWithPassword", email, password)
            .await
    }

    /// Create an account and sign it in.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        self.password_flow("accounts:signUp", email, password).await
    }

    async fn password_flow(&self, endpoint: &str, email: &str, password: &str) -> Result<Session> {
        let url = format!("{}/{}?key={}", IDENTITY_TOOLKIT_URL, endpoint, self.api_key);

        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(auth_failure(resp).await);
        }

        let sign_in: SignInResponse = resp.json().await?;
        Ok(self.start_session(sign_in))
    }

    /// Sign in with a federated identity provider credential.
    pub async fn sign_in_with_provider(&self, credential: &ProviderCredential) -> Result<Session> {
        let url = format!(
            "{}/accounts:signInWithIdp?key={}",
            IDENTITY_TOOLKIT_URL, self.api_key
        );

        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "postBody": credential.post_body(),
                "requestUri": "http://localhost",
                "returnSecureToken": true,
                "returnIdpCredential": true
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(auth_failure(resp).await);
        }

        let sign_in: SignInResponse = resp.json().await?;
        Ok(self.start_session(sign_in))
    }

    /// Resume a session from a stored refresh token.
    pub async fn restore(&self, refresh_token: String) -> Result<Session> {
        let session = Session {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            user: Arc::new(Mutex::new(None)),
            refresh_token: Arc::new(Mutex::new(refresh_token)),
            cached_token: Arc::new(Mutex::new(None)),
        };
        let token = session.refresh_id_token().await?;
        let uid = uid_from_jwt(&token)?;
        let user = AuthUser {
            uid,
            email: None,
            display_name: None,
        };
        *session.user.lock().await = Some(user.clone());
        self.current.send_replace(Some(user));
        Ok(session)
    }

    /// Clear the current user. Sessions handed out earlier stop being usable.
    pub async fn sign_out(&self, session: &Session) {
        session.invalidate().await;
        self.current.send_replace(None);
        tracing::info!("signed out");
    }

    fn start_session(&self, sign_in: SignInResponse) -> Session {
        let user = AuthUser {
            uid: sign_in.local_id,
            email: sign_in.email,
            display_name: sign_in.display_name,
        };
        tracing::info!(uid = %user.uid, "signed in");

        let session = Session {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            user: Arc::new(Mutex::new(Some(user.clone()))),
            refresh_token: Arc::new(Mutex::new(sign_in.refresh_token)),
            cached_token: Arc::new(Mutex::new(Some(CachedToken {
                id_token: sign_in.id_token,
                expires_at: expiry_from(&sign_in.expires_in),
            }))),
        };
        self.current.send_replace(Some(user));
        session
    }
}

/// The signed-in user and their tokens. Passed explicitly to every client
/// that talks to the backend on the user's behalf.
#[derive(Clone)]
pub struct Session {
    client: Client,
    api_key: String,
    user: Arc<Mutex<Option<AuthUser>>>,
    refresh_token: Arc<Mutex<String>>,
    cached_token: Arc<Mutex<Option<CachedToken>>>,
}

impl Session {
    pub async fn user(&self) -> Result<AuthUser> {
        self.user
            .lock()
            .await
            .clone()
            .ok_or_else(|| AuthError::SignedOut.into())
    }

    pub async fn uid(&self) -> Result<String> {
        Ok(self.user().await?.uid)
    }

    /// Current refresh token, for persisting the session.
    pub async fn refresh_token(&self) -> String {
        self.refresh_token.lock().await.clone()
    }

    pub async fn id_token(&self) -> Result<String> {
        if self.user.lock().await.is_none() {
            return Err(AuthError::SignedOut.into());
        }

        {
            let cached = self.cached_token.lock().await;
            if let Some(ref token) = *cached {
                if token.expires_at > Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) {
                    return Ok(token.id_token.clone());
                }
            }
        }

        self.refresh_id_token().await
    }

    async fn refresh_id_token(&self) -> Result<String> {
        let refresh_token = self.refresh_token.lock().await.clone();
        let url = format!("{}?key={}", SECURE_TOKEN_URL, self.api_key);

        let resp = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &refresh_token),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(auth_failure(resp).await);
        }

        let token_resp: RefreshTokenResponse = resp.json().await?;
        tracing::debug!(user_id = ?token_resp.user_id, "refreshed id token");

        *self.refresh_token.lock().await = token_resp.refresh_token;

        let id_token = token_resp.id_token.clone();
        *self.cached_token.lock().await = Some(CachedToken {
            id_token: token_resp.id_token,
            expires_at: expiry_from(&token_resp.expires_in),
        });

        Ok(id_token)
    }

    async fn invalidate(&self) {
        *self.user.lock().await = None;
        *self.cached_token.lock().await = None;
        self.refresh_token.lock().await.clear();
    }
}

/// Read the user id claim from a JWT without verifying it.
pub fn uid_from_jwt(token: &str) -> Result<String> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(anyhow!("Invalid JWT format"));
    }

    let decoded = URL_SAFE_NO_PAD.decode(parts[1].trim_end_matches('='))?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded)?;
    claims["user_id"]
        .as_str()
        .or_else(|| claims["sub"].as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("No user_id or sub claim in token"))
}
