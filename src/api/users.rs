//! Account, profile and Google Drive link handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use std::sync::Arc;

use super::types::{
    AccessTokenResponse, AuthorizationUrlResponse, LoginRequest, OAuthCallbackQuery,
    ProfileResponse, RegisterRequest, RegisterResponse,
};
use super::extract::{AppJson, AppQuery};
use super::{AppState, CurrentUser};
use crate::drive::DriveGateway;
use crate::error::{AppError, Result};
use crate::store::entity::user;
use crate::store::ProfileUpdate;

fn access_token(state: &AppState, user: &user::Model) -> Result<AccessTokenResponse> {
    Ok(AccessTokenResponse {
        access: state.tokens.issue_access(user)?,
        token_type: "Bearer",
        expires_in: state.tokens.access_ttl_seconds(),
    })
}

/// POST /users/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let (user, profile) = state
        .users
        .register(&request.username, request.email.as_deref(), &request.password)
        .await?;
    let token = access_token(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user,
            profile: profile.into(),
            token,
        }),
    ))
}

/// POST /users/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let user = state
        .users
        .authenticate(&request.username, &request.password)
        .await?;
    tracing::info!("User '{}' logged in", user.username);
    Ok(Json(access_token(&state, &user)?))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    let profile = state.profiles.get_for_user(user.id).await?;
    Ok(Json(ProfileResponse::from(profile)))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppJson(update): AppJson<ProfileUpdate>,
) -> Result<impl IntoResponse> {
    let profile = state.profiles.update(user.id, update).await?;
    Ok(Json(ProfileResponse::from(profile)))
}

/// GET /users/google/auth - Start linking the caller's Google Drive.
pub async fn google_auth(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    let oauth_state = state.tokens.issue_oauth_state(user.id, &user.username)?;
    let authorization_url = state.connector.authorization_url(&oauth_state)?;
    Ok(Json(AuthorizationUrlResponse { authorization_url }))
}

/// GET /users/google/callback - Finish the OAuth flow started by `google_auth`.
///
/// Exchanges the code, makes sure the drive root folder exists and stores
/// both on the profile of the user named in `state`.
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<OAuthCallbackQuery>,
) -> Result<impl IntoResponse> {
    if let Some(error) = query.error {
        tracing::warn!("Google authorization was refused: {}", error);
        return Err(AppError::Validation("Authorization failed".to_string()));
    }
    let oauth_state = query
        .state
        .ok_or_else(|| AppError::Validation("Missing OAuth state".to_string()))?;
    let code = query
        .code
        .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;

    let user_id = state.tokens.verify_oauth_state(&oauth_state)?;
    // Profile must exist before anything is created on the drive.
    state.profiles.get_for_user(user_id).await?;

    let credentials = state.connector.exchange_code(&code).await?;
    let gateway = DriveGateway::new(state.connector.connect(credentials.clone()), None);
    let root_folder_id = gateway
        .ensure_root_folder(&state.settings.drive_root_folder_name)
        .await?;

    let credentials = gateway.refreshed_credentials().unwrap_or(credentials);
    state
        .profiles
        .link_drive(user_id, &credentials, &root_folder_id)
        .await?;

    let target = format!(
        "{}/files?status=success",
        state.settings.frontend_url.trim_end_matches('/')
    );
    Ok(Redirect::to(&target))
}
