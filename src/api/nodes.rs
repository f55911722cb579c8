//! Handlers for the local node tree.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::types::{
    CreateFolderRequest, CreateNodeRequest, NodeDetail, PathResponse, UpdateNodeRequest,
};
use super::extract::{AppJson, AppPath};
use super::{AppState, CurrentUser, UploadForm};
use crate::error::{AppError, Result};
use crate::store::nodes::validate_name;
use crate::store::{NewFileRecord, NodeUpdate};

/// GET /nodes/ - List every node owned by the caller.
pub async fn list_nodes(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    let nodes = state.nodes.list_for_owner(user.id).await?;
    Ok(Json(nodes))
}

/// POST /nodes/ - Create a folder or a file record.
pub async fn create_node(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppJson(request): AppJson<CreateNodeRequest>,
) -> Result<impl IntoResponse> {
    let node = if request.is_folder {
        state
            .nodes
            .create_folder(&request.name, request.parent_id, user.id)
            .await?
    } else {
        let record = NewFileRecord {
            name: request.name,
            remote_id: request.remote_id,
            mime_type: request.mime_type,
            view_link: request.view_link,
            size: request.size,
            parent_id: request.parent_id,
        };
        state.nodes.create_file_record(record, user.id).await?
    };

    Ok((StatusCode::CREATED, Json(node)))
}

/// GET /nodes/:id/ - Node with its path and direct children.
pub async fn get_node(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse> {
    let node = state.nodes.get(id, user.id).await?;
    let path = state.nodes.get_path(id, user.id).await?;
    let children = if node.is_folder {
        state.nodes.list_children(id, user.id).await?
    } else {
        Vec::new()
    };

    Ok(Json(NodeDetail {
        node,
        path,
        children,
    }))
}

/// PUT /nodes/:id/ - Rename and/or move a node.
pub async fn update_node(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppPath(id): AppPath<i64>,
    AppJson(request): AppJson<UpdateNodeRequest>,
) -> Result<impl IntoResponse> {
    let update = NodeUpdate {
        name: request.name,
        parent_id: request.parent_id,
    };
    let node = state.nodes.update(id, user.id, update).await?;
    Ok(Json(node))
}

/// DELETE /nodes/:id/ - Delete a node, its subtree and their share links.
pub async fn delete_node(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse> {
    tracing::info!("Deleting node {} for user {}", id, user.id);
    let summary = state.nodes.delete(id, user.id).await?;
    Ok(Json(summary))
}

/// GET /folders/:id/children/ - Direct children of a folder.
pub async fn folder_children(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse> {
    let children = state.nodes.list_children(id, user.id).await?;
    Ok(Json(children))
}

/// POST /folders/create/ - Create a local folder.
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppJson(request): AppJson<CreateFolderRequest>,
) -> Result<impl IntoResponse> {
    let folder = state
        .nodes
        .create_folder(&request.name, request.parent_id, user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

/// POST /files/upload/ - Upload to the linked drive, then record the file.
///
/// `parent_id` is a local folder id; the file lands in that folder's remote
/// counterpart.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let upload = UploadForm::read(multipart).await?.into_upload()?;
    let name = validate_name(&upload.name)?;

    let parent = match upload.parent_id.as_deref() {
        Some(raw) => {
            let parent_id: i64 = raw
                .parse()
                .map_err(|_| AppError::Validation(format!("Invalid parent_id: {}", raw)))?;
            Some(state.nodes.get(parent_id, user.id).await?)
        }
        None => None,
    };
    if parent.as_ref().is_some_and(|p| !p.is_folder) {
        return Err(AppError::Validation("Parent must be a folder".to_string()));
    }

    let requested_remote_parent = parent.as_ref().and_then(|p| p.remote_id.clone());

    tracing::info!(
        "Uploading '{}' ({} bytes) for user {}",
        name,
        upload.data.len(),
        user.id
    );

    let gateway = state.drive_for(user.id).await?;
    let placed = gateway
        .upload(
            upload.data,
            &name,
            &upload.mime_type,
            requested_remote_parent.as_deref(),
        )
        .await?;

    // The gateway may have fallen back to the drive root folder.
    let local_parent = match (&parent, &requested_remote_parent) {
        (Some(p), Some(remote)) if placed.parent_id.as_deref() == Some(remote.as_str()) => {
            Some(p.id)
        }
        (Some(p), None) => Some(p.id),
        (Some(p), Some(_)) => {
            tracing::warn!(
                "Upload to folder {} landed in {:?}, recording it at the root",
                p.id,
                placed.parent_id
            );
            None
        }
        (None, _) => None,
    };

    let file = placed.file;
    let record = NewFileRecord {
        name: if file.name.is_empty() {
            name
        } else {
            file.name.clone()
        },
        remote_id: Some(file.id.clone()),
        mime_type: Some(file.mime_type.clone()).filter(|m| !m.is_empty()),
        view_link: file.web_view_link.clone(),
        size: file.size_bytes(),
        parent_id: local_parent,
    };
    let node = match state.nodes.create_file_record(record, user.id).await {
        Ok(node) => node,
        Err(e) => {
            // Remove the remote copy so the drive does not keep a file with no node.
            if let Err(cleanup) = gateway.delete(&file.id).await {
                tracing::warn!(
                    "Failed to remove uploaded file {} after record error: {}",
                    file.id,
                    cleanup
                );
            }
            return Err(e);
        }
    };

    // Best effort once the node is recorded.
    if let Err(e) = state.persist_refresh(user.id, &gateway).await {
        tracing::warn!(
            "Failed to persist refreshed credentials for user {}: {}",
            user.id,
            e
        );
    }

    Ok((StatusCode::CREATED, Json(node)))
}

/// GET /path/:id/ - Full path of a node.
pub async fn node_path(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse> {
    let path = state.nodes.get_path(id, user.id).await?;
    Ok(Json(PathResponse { path }))
}
