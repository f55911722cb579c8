//! Bearer tokens for API callers and signed OAuth `state` values.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::error::{AppError, Result};
use crate::store::entity::user;

/// Lifetime of the `state` parameter handed to Google.
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    OAuthState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
    pub token_type: TokenType,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Malformed token subject".to_string()))
    }
}

/// Issues and verifies HS256 tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::minutes(access_ttl_minutes),
        }
    }

    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    pub fn issue_access(&self, user: &user::Model) -> Result<String> {
        self.issue(user.id, &user.username, TokenType::Access, self.access_ttl)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        self.verify(token, TokenType::Access)
    }

    /// `state` value binding an OAuth round trip to the user who started it.
    pub fn issue_oauth_state(&self, user_id: i64, username: &str) -> Result<String> {
        self.issue(
            user_id,
            username,
            TokenType::OAuthState,
            Duration::minutes(OAUTH_STATE_TTL_MINUTES),
        )
    }

    pub fn verify_oauth_state(&self, state: &str) -> Result<i64> {
        self.verify(state, TokenType::OAuthState)
            .map_err(|e| AppError::Validation(format!("Invalid OAuth state: {}", e)))?
            .user_id()
    }

    fn issue(
        &self,
        user_id: i64,
        username: &str,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    fn verify(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?
            .claims;

        if claims.token_type != expected {
            return Err(AppError::Unauthorized(format!(
                "Invalid token type: expected {:?}",
                expected
            )));
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .finish()
    }
}

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?
            .to_str()
            .map_err(|_| AppError::Unauthorized("Malformed Authorization header".to_string()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Expected a bearer token".to_string()))?;

        let claims = state.tokens.verify_access(token.trim())?;
        Ok(CurrentUser {
            id: claims.user_id()?,
            username: claims.username,
        })
    }
}
