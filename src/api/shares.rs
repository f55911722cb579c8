use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::drive_proxy::attachment;
use super::extract::AppPath;
use super::types::ShareLinkResponse;
use super::{AppState, CurrentUser};
use crate::error::{AppError, Result};

/// GET /share/ - Links minted by the caller.
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    let links = state.links.list_for_user(user.id).await?;
    let links: Vec<ShareLinkResponse> = links.into_iter().map(ShareLinkResponse::new).collect();
    Ok(Json(links))
}

/// GET /share/:id/ - Public download through a share link.
///
/// Expired and deactivated links answer 404. The access is recorded only
/// once the content has been fetched.
pub async fn shared_download(
    State(state): State<Arc<AppState>>,
    AppPath(link_id): AppPath<Uuid>,
) -> Result<Response> {
    let link = state.links.get(link_id).await?;
    if !link.is_usable() {
        tracing::debug!("Share link {} is no longer usable", link_id);
        return Err(AppError::NotFound(format!(
            "Share link {} not found",
            link_id
        )));
    }
    let file_ref = link
        .file_ref
        .as_deref()
        .ok_or_else(|| AppError::NotFound(format!("Share link {} has no file", link_id)))?;

    let gateway = state.drive_for(link.created_by).await?;
    let (file, data) = gateway.download(file_ref).await?;
    state.persist_refresh(link.created_by, &gateway).await?;

    state.links.record_access(link_id).await?;
    Ok(attachment(&file, data))
}

/// POST /share/:id/deactivate/
pub async fn deactivate(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppPath(link_id): AppPath<Uuid>,
) -> Result<impl IntoResponse> {
    let link = state.links.deactivate(link_id, user.id).await?;
    Ok(Json(ShareLinkResponse::new(link)))
}
