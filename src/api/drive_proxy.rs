//! Handlers proxying the caller's Google Drive.
//!
//! Changes made on the drive are mirrored into the local node tree on a best
//! effort basis: a mirroring failure is logged and the drive result returned.

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::Duration;
use std::sync::Arc;

use super::types::{
    CreateDriveFolderRequest, DriveFolderResponse, DriveUploadResponse, ListDriveQuery,
    MoveRequest, MoveResponse, RenameRequest, ShareLinkResponse, ShareQuery, ShareResponse,
    TotalSharedResponse,
};
use super::extract::{AppJson, AppPath, AppQuery};
use super::{AppState, CurrentUser, UploadForm};
use crate::drive::{DriveFile, Grantee, TransferOp};
use crate::error::{AppError, Result};

/// Build an attachment response for downloaded content.
pub(crate) fn attachment(file: &DriveFile, data: Bytes) -> Response {
    let content_type = if file.mime_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        file.mime_type.clone()
    };
    let file_name: String = file
        .name
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect();
    let disposition = format!("attachment; filename=\"{}\"", file_name);

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response()
}

/// GET /drive/totalShared/ - Usable share links across all users.
pub async fn total_shared(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let total_shared_files = state.links.total_usable().await?;
    Ok(Json(TotalSharedResponse { total_shared_files }))
}

/// GET /drive/list/?folder_id=
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppQuery(query): AppQuery<ListDriveQuery>,
) -> Result<impl IntoResponse> {
    let gateway = state.drive_for(user.id).await?;
    let listing = gateway.list(query.folder_id.as_deref()).await?;
    state.persist_refresh(user.id, &gateway).await?;
    Ok(Json(listing))
}

/// POST /drive/upload - Multipart upload straight to the drive.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let upload = UploadForm::read(multipart).await?.into_upload()?;
    let gateway = state.drive_for(user.id).await?;
    let placed = gateway
        .upload(
            upload.data,
            &upload.name,
            &upload.mime_type,
            upload.parent_id.as_deref(),
        )
        .await?;
    state.persist_refresh(user.id, &gateway).await?;

    tracing::info!(
        "Uploaded '{}' as {} into {:?}",
        upload.name,
        placed.file.id,
        placed.parent_id
    );
    Ok((
        StatusCode::CREATED,
        Json(DriveUploadResponse {
            file_id: placed.file.id,
            parent_id: placed.parent_id,
            name: upload.name,
        }),
    ))
}

/// POST /drive/folder
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppJson(request): AppJson<CreateDriveFolderRequest>,
) -> Result<impl IntoResponse> {
    let gateway = state.drive_for(user.id).await?;
    let placed = gateway
        .create_folder(&request.name, request.parent_id.as_deref())
        .await?;
    state.persist_refresh(user.id, &gateway).await?;

    Ok((
        StatusCode::CREATED,
        Json(DriveFolderResponse {
            folder_id: placed.file.id,
            parent_id: placed.parent_id,
            name: placed.file.name,
        }),
    ))
}

/// POST /drive/move/ - Move or copy a file into another folder.
pub async fn move_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppJson(request): AppJson<MoveRequest>,
) -> Result<impl IntoResponse> {
    let gateway = state.drive_for(user.id).await?;
    let placed = gateway
        .move_or_copy(&request.file_id, &request.destination_id, request.operation)
        .await?;
    state.persist_refresh(user.id, &gateway).await?;

    if request.operation == TransferOp::Move {
        if let Err(e) = state
            .nodes
            .mirror_remote_move(&request.file_id, placed.parent_id.as_deref(), user.id)
            .await
        {
            tracing::warn!("Failed to mirror move of {}: {}", request.file_id, e);
        }
    }

    Ok(Json(MoveResponse {
        file: placed.file,
        destination_id: placed.parent_id,
    }))
}

/// PATCH /drive/:file_id/rename/
pub async fn rename(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppPath(file_id): AppPath<String>,
    AppJson(request): AppJson<RenameRequest>,
) -> Result<impl IntoResponse> {
    let gateway = state.drive_for(user.id).await?;
    let file = gateway.rename(&file_id, &request.new_name).await?;
    state.persist_refresh(user.id, &gateway).await?;

    if let Err(e) = state
        .nodes
        .mirror_remote_rename(&file_id, &file.name, user.id)
        .await
    {
        tracing::warn!("Failed to mirror rename of {}: {}", file_id, e);
    }

    Ok(Json(file))
}

/// GET /drive/:file_id/download/
pub async fn download(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppPath(file_id): AppPath<String>,
) -> Result<Response> {
    let gateway = state.drive_for(user.id).await?;
    let (file, data) = gateway.download(&file_id).await?;
    state.persist_refresh(user.id, &gateway).await?;
    Ok(attachment(&file, data))
}

/// DELETE /drive/:file_id/
pub async fn delete(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppPath(file_id): AppPath<String>,
) -> Result<impl IntoResponse> {
    let gateway = state.drive_for(user.id).await?;
    gateway.delete(&file_id).await?;
    state.persist_refresh(user.id, &gateway).await?;
    tracing::info!("Deleted drive file {} for user {}", file_id, user.id);

    if let Err(e) = state.nodes.mirror_remote_delete(&file_id, user.id).await {
        tracing::warn!("Failed to mirror delete of {}: {}", file_id, e);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// GET|POST /drive/:file_id/shareable/ - Grant access and mint a share link.
pub async fn make_shareable(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppPath(file_id): AppPath<String>,
    AppQuery(query): AppQuery<ShareQuery>,
) -> Result<impl IntoResponse> {
    let grantee = match query.email {
        Some(email) => Grantee::User { email },
        None => Grantee::Anyone,
    };
    let ttl = match query.ttl_hours {
        Some(hours) if hours <= 0 => {
            return Err(AppError::Validation(
                "ttl_hours must be positive".to_string(),
            ))
        }
        Some(hours) => Some(Duration::hours(hours)),
        None => None,
    };

    let gateway = state.drive_for(user.id).await?;
    let links = gateway.make_shareable(&file_id, &grantee, query.role).await?;
    state.persist_refresh(user.id, &gateway).await?;

    let share_link = state.links.create(Some(&file_id), user.id, ttl).await?;

    Ok(Json(ShareResponse {
        message: "File is now shareable",
        view_link: links.view_link,
        download_link: links.download_link,
        share_link: ShareLinkResponse::new(share_link),
    }))
}
