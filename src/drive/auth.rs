//! OAuth credentials and access-token management for Google Drive.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::types::{provider_message, TokenResponse};
use crate::config::Config;
use crate::error::{AppError, Result};

/// Google's OAuth 2.0 authorization endpoint.
pub const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google's OAuth 2.0 token endpoint.
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Token bundle stored on the user's profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveCredentials {
    /// Access token
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Access token expiry, when known
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl DriveCredentials {
    pub fn is_empty(&self) -> bool {
        self.token.is_empty() && self.refresh_token.is_none()
    }

    /// Expired or about to expire (with 5 minute buffer).
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => Utc::now() + Duration::minutes(5) >= expiry,
            None => false,
        }
    }

    fn from_token_response(response: TokenResponse, fallback_scopes: &[String]) -> Self {
        let scopes = match response.scope {
            Some(scope) => scope.split_whitespace().map(str::to_owned).collect(),
            None => fallback_scopes.to_vec(),
        };
        Self {
            token: response.access_token,
            refresh_token: response.refresh_token,
            scopes,
            expiry: response
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// Lifecycle of a user's drive credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// No credentials stored
    Unlinked,
    /// Credentials from the OAuth flow, not yet refreshed
    Linked,
    /// Access token refreshed during this session
    Refreshed,
    /// Provider rejected the credentials
    Revoked,
}

/// The registered OAuth client application.
#[derive(Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub token_uri: String,
}

impl OAuthApp {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_redirect_uri.clone(),
            scopes: config.google_scopes.clone(),
            token_uri: TOKEN_URI.to_string(),
        }
    }

    /// URL the user visits to grant offline drive access.
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let scope = self.scopes.join(" ");
        let url = Url::parse_with_params(
            AUTH_URI,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("include_granted_scopes", "true"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Invalid authorization URL: {}", e)))?;
        Ok(url.into())
    }

    /// Trade an authorization code for a credential bundle.
    pub async fn exchange_code(
        &self,
        http_client: &Client,
        code: &str,
    ) -> Result<DriveCredentials> {
        tracing::info!("Exchanging OAuth authorization code");
        let response = http_client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let data = token_endpoint_result(response).await?;
        Ok(DriveCredentials::from_token_response(data, &self.scopes))
    }

    async fn refresh(&self, http_client: &Client, refresh_token: &str) -> Result<TokenResponse> {
        let response = http_client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        token_endpoint_result(response).await
    }
}

impl std::fmt::Debug for OAuthApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthApp")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Map a token endpoint response: 400/401 mean the grant is no longer valid.
async fn token_endpoint_result(response: reqwest::Response) -> Result<TokenResponse> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let message = provider_message(&body).unwrap_or_else(|| status.to_string());
    if status.as_u16() == 400 || status.as_u16() == 401 {
        return Err(AppError::AuthRequired(message));
    }
    Err(AppError::ExternalService {
        status: Some(status.as_u16()),
        message,
    })
}

#[derive(Debug)]
struct TokenState {
    credentials: DriveCredentials,
    phase: CredentialState,
}

/// Per-user token manager that refreshes the access token when needed.
#[derive(Clone)]
pub struct TokenManager {
    app: Arc<OAuthApp>,
    http_client: Client,
    state: Arc<RwLock<TokenState>>,
}

impl TokenManager {
    pub fn new(app: Arc<OAuthApp>, http_client: Client, credentials: DriveCredentials) -> Self {
        let phase = if credentials.is_empty() {
            CredentialState::Unlinked
        } else {
            CredentialState::Linked
        };
        Self {
            app,
            http_client,
            state: Arc::new(RwLock::new(TokenState { credentials, phase })),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_token(&self) -> Result<String> {
        let refresh_token = {
            let state = self.state.read();
            match state.phase {
                CredentialState::Unlinked => {
                    return Err(AppError::AuthRequired(
                        "Google Drive not connected".to_string(),
                    ))
                }
                CredentialState::Revoked => {
                    return Err(AppError::AuthRequired(
                        "Google Drive access was revoked".to_string(),
                    ))
                }
                CredentialState::Linked | CredentialState::Refreshed => {}
            }

            match (&state.credentials.refresh_token, state.credentials.is_expired()) {
                (Some(refresh_token), true) => refresh_token.clone(),
                _ => return Ok(state.credentials.token.clone()),
            }
        };

        self.refresh_token(&refresh_token).await
    }

    /// Force refresh the access token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<String> {
        tracing::info!("Refreshing Google Drive access token");

        let data = match self.app.refresh(&self.http_client, refresh_token).await {
            Ok(data) => data,
            Err(AppError::AuthRequired(reason)) => {
                self.mark_revoked(&reason);
                return Err(AppError::AuthRequired(reason));
            }
            Err(e) => return Err(e),
        };

        let access_token = data.access_token.clone();
        let expiry = data
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));

        {
            let mut state = self.state.write();
            state.credentials.token = data.access_token;
            state.credentials.expiry = expiry;
            if let Some(new_refresh) = data.refresh_token {
                state.credentials.refresh_token = Some(new_refresh);
            }
            state.phase = CredentialState::Refreshed;
        }

        tracing::info!("Successfully refreshed access token, expires at {:?}", expiry);
        Ok(access_token)
    }

    /// Record that the provider rejected the credentials.
    pub fn mark_revoked(&self, reason: &str) {
        let mut state = self.state.write();
        if state.phase != CredentialState::Revoked {
            tracing::warn!("Google Drive credentials revoked: {}", reason);
        }
        state.phase = CredentialState::Revoked;
    }

    pub fn state(&self) -> CredentialState {
        self.state.read().phase
    }

    /// Credentials worth persisting after a refresh.
    pub fn refreshed_credentials(&self) -> Option<DriveCredentials> {
        let state = self.state.read();
        (state.phase == CredentialState::Refreshed).then(|| state.credentials.clone())
    }

    /// Get the HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("app", &self.app)
            .field("state", &self.state())
            .field("credentials", &"[REDACTED]")
            .finish()
    }
}
