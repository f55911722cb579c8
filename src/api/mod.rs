//! HTTP surface: the local node tree, the Google Drive proxy, share links and
//! user accounts.

pub mod auth;
pub mod drive_proxy;
pub mod extract;
pub mod nodes;
pub mod shares;
pub mod types;
pub mod users;

use axum::{
    extract::{DefaultBodyLimit, Multipart},
    routing::{get, patch, post},
    Router,
};
use bytes::Bytes;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::drive::{DriveConnector, DriveGateway};
use crate::error::{AppError, Result};
use crate::store::{NodeStore, ProfileStore, ShareLinkManager, UserStore};

pub use auth::{CurrentUser, TokenIssuer};

/// Largest accepted request body (uploads).
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Settings the handlers need beyond the stores.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub frontend_url: String,
    pub drive_root_folder_name: String,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub nodes: NodeStore,
    pub links: ShareLinkManager,
    pub profiles: ProfileStore,
    pub users: UserStore,
    pub connector: Arc<dyn DriveConnector>,
    pub tokens: TokenIssuer,
    pub settings: ApiSettings,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        connector: Arc<dyn DriveConnector>,
        tokens: TokenIssuer,
        settings: ApiSettings,
    ) -> Self {
        Self {
            nodes: NodeStore::new(db.clone()),
            links: ShareLinkManager::new(db.clone()),
            profiles: ProfileStore::new(db.clone()),
            users: UserStore::new(db),
            connector,
            tokens,
            settings,
        }
    }

    /// Gateway for `user_id`, built from the credentials on their profile.
    pub async fn drive_for(&self, user_id: i64) -> Result<DriveGateway> {
        let profile = self.profiles.get_for_user(user_id).await?;
        DriveGateway::for_profile(self.connector.as_ref(), &profile)
    }

    /// Persist credentials the gateway refreshed while serving a request.
    pub async fn persist_refresh(&self, user_id: i64, gateway: &DriveGateway) -> Result<()> {
        if let Some(credentials) = gateway.refreshed_credentials() {
            self.profiles
                .store_refreshed_credentials(user_id, &credentials)
                .await?;
        }
        Ok(())
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Accounts
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route(
            "/users/profile/",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/users/google/auth", get(users::google_auth))
        .route("/users/google/callback", get(users::google_callback))
        // Local node tree
        .route("/nodes/", get(nodes::list_nodes).post(nodes::create_node))
        .route(
            "/nodes/:id/",
            get(nodes::get_node)
                .put(nodes::update_node)
                .delete(nodes::delete_node),
        )
        .route("/folders/:id/children/", get(nodes::folder_children))
        .route("/folders/create/", post(nodes::create_folder))
        .route("/files/upload/", post(nodes::upload_file))
        .route("/path/:id/", get(nodes::node_path))
        // Google Drive proxy
        .route("/drive/totalShared/", get(drive_proxy::total_shared))
        .route("/drive/list/", get(drive_proxy::list_files))
        .route("/drive/upload", post(drive_proxy::upload))
        .route("/drive/folder", post(drive_proxy::create_folder))
        .route("/drive/move/", post(drive_proxy::move_file))
        .route("/drive/:file_id/rename/", patch(drive_proxy::rename))
        .route("/drive/:file_id/download/", get(drive_proxy::download))
        .route("/drive/:file_id/", axum::routing::delete(drive_proxy::delete))
        .route(
            "/drive/:file_id/shareable/",
            get(drive_proxy::make_shareable).post(drive_proxy::make_shareable),
        )
        // Share links
        .route("/share/", get(shares::list_links))
        .route("/share/:id/", get(shares::shared_download))
        .route("/share/:id/deactivate/", post(shares::deactivate))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

// ============================================================================
// Multipart uploads
// ============================================================================

/// File part of an upload form.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Fields of an upload form: `name`, `parent_id` and `file`.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub name: Option<String>,
    pub parent_id: Option<String>,
    pub file: Option<UploadedFile>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e)))?
        {
            let field_name = field.name().unwrap_or_default().to_string();
            match field_name.as_str() {
                "file" => {
                    let file_name = field.file_name().map(str::to_owned);
                    let content_type = field.content_type().map(str::to_owned);
                    let data = field.bytes().await.map_err(|e| {
                        AppError::Validation(format!("Failed to read uploaded file: {}", e))
                    })?;
                    form.file = Some(UploadedFile {
                        file_name,
                        content_type,
                        data,
                    });
                }
                "name" | "parent_id" => {
                    let value = field.text().await.map_err(|e| {
                        AppError::Validation(format!("Failed to read field {}: {}", field_name, e))
                    })?;
                    let value = Some(value).filter(|v| !v.trim().is_empty());
                    if field_name == "name" {
                        form.name = value;
                    } else {
                        form.parent_id = value;
                    }
                }
                other => tracing::debug!("Ignoring multipart field '{}'", other),
            }
        }

        Ok(form)
    }

    /// Validate the form into an upload: a file is required, the name falls
    /// back to the client file name.
    pub fn into_upload(self) -> Result<Upload> {
        let file = self
            .file
            .ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;
        let name = self
            .name
            .or_else(|| file.file_name.clone())
            .ok_or_else(|| AppError::Validation("File name is required".to_string()))?;
        let mime_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Ok(Upload {
            data: file.data,
            name,
            mime_type,
            parent_id: self.parent_id,
        })
    }
}

/// A validated upload.
#[derive(Debug)]
pub struct Upload {
    pub data: Bytes,
    pub name: String,
    pub mime_type: String,
    pub parent_id: Option<String>,
}
