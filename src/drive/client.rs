//! Google Drive v3 client.

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use reqwest::{Client, RequestBuilder, Response};
use std::sync::Arc;

use super::auth::{DriveCredentials, OAuthApp, TokenManager};
use super::types::*;
use super::{DriveApi, DriveConnector, REQUEST_TIMEOUT};
use crate::error::{AppError, Result};

/// Base URL for Drive metadata calls.
pub const API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Base URL for media uploads.
pub const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

const PAGE_SIZE: &str = "100";

const UPLOAD_BOUNDARY: &str = "cts_drive_upload_boundary";

/// Drive client acting on behalf of one user.
#[derive(Clone)]
pub struct GoogleDrive {
    token_manager: TokenManager,
    api_base: String,
    upload_base: String,
}

impl GoogleDrive {
    pub fn new(token_manager: TokenManager) -> Self {
        Self::with_base_urls(token_manager, API_BASE, UPLOAD_BASE)
    }

    /// Client talking to another Drive-compatible endpoint.
    pub fn with_base_urls(token_manager: TokenManager, api_base: &str, upload_base: &str) -> Self {
        Self {
            token_manager,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.token_manager
    }

    /// Attach a fresh bearer token, send, and map non-2xx answers.
    /// 401/403 mean the credentials are no longer honoured.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.token_manager.get_token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = provider_message(&body).unwrap_or_else(|| status.to_string());
        tracing::debug!("Drive API answered {}: {}", status, body);

        if status.as_u16() == 401 || status.as_u16() == 403 {
            self.token_manager.mark_revoked(&message);
            return Err(AppError::AuthRequired(message));
        }

        Err(AppError::ExternalService {
            status: Some(status.as_u16()),
            message,
        })
    }

    async fn json<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    fn http(&self) -> &Client {
        self.token_manager.http_client()
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.api_base)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.api_base, file_id)
    }
}

#[async_trait]
impl DriveApi for GoogleDrive {
    async fn get(&self, file_id: &str) -> Result<DriveFile> {
        let request = self
            .http()
            .get(self.file_url(file_id))
            .query(&[("fields", FILE_FIELDS)]);
        self.json(request).await
    }

    async fn list(&self, parent_id: Option<&str>) -> Result<Vec<DriveFile>> {
        let query = children_query(parent_id);
        let fields = format!("nextPageToken, files({})", FILE_FIELDS);
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http().get(self.files_url()).query(&[
                ("q", query.as_str()),
                ("fields", fields.as_str()),
                ("orderBy", "folder,name"),
                ("pageSize", PAGE_SIZE),
            ]);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let page: DriveFileList = self.json(request).await?;
            all_files.extend(page.files);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(
            "Listed {} files under {}",
            all_files.len(),
            parent_id.unwrap_or("root")
        );
        Ok(all_files)
    }

    async fn find_folder(&self, name: &str) -> Result<Option<DriveFile>> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query_value(name),
            FOLDER_MIME_TYPE
        );
        let fields = format!("files({})", FILE_FIELDS);
        let request = self.http().get(self.files_url()).query(&[
            ("q", query.as_str()),
            ("spaces", "drive"),
            ("fields", fields.as_str()),
        ]);

        let list: DriveFileList = self.json(request).await?;
        Ok(list.files.into_iter().next())
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<DriveFile> {
        tracing::debug!("Creating folder '{}' in {:?}", name, parent_id);
        let body = FileMetadataRequest {
            name: name.to_string(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: parent_id.map(str::to_owned).into_iter().collect(),
        };
        let request = self
            .http()
            .post(self.files_url())
            .query(&[("fields", FILE_FIELDS)])
            .json(&body);

        let folder: DriveFile = self.json(request).await?;
        tracing::info!("Created folder '{}' with id {}", name, folder.id);
        Ok(folder)
    }

    async fn upload(
        &self,
        data: Bytes,
        name: &str,
        mime_type: &str,
        parent_id: Option<&str>,
    ) -> Result<DriveFile> {
        tracing::debug!(
            "Uploading file '{}' ({} bytes) to {:?}",
            name,
            data.len(),
            parent_id
        );

        let md5_hash = format!("{:x}", md5::compute(&data));
        let metadata = FileMetadataRequest {
            name: name.to_string(),
            mime_type: Some(mime_type.to_string()),
            parents: parent_id.map(str::to_owned).into_iter().collect(),
        };
        let body = related_body(
            UPLOAD_BOUNDARY,
            &serde_json::to_string(&metadata)?,
            mime_type,
            &data,
        );

        let request = self
            .http()
            .post(format!("{}/files", self.upload_base))
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", UPLOAD_BOUNDARY),
            )
            .body(body);

        let file: DriveFile = self.json(request).await?;

        if let Some(remote_md5) = file.md5_checksum.as_deref() {
            if remote_md5 != md5_hash {
                return Err(AppError::ExternalService {
                    status: None,
                    message: format!(
                        "Checksum mismatch for '{}': sent {}, stored {}",
                        name, md5_hash, remote_md5
                    ),
                });
            }
        }

        tracing::info!("Uploaded file '{}' with id {}", name, file.id);
        Ok(file)
    }

    async fn move_file(&self, file_id: &str, new_parent_id: &str) -> Result<DriveFile> {
        let current = self.get(file_id).await?;
        let previous_parents = current.parents.join(",");

        let request = self
            .http()
            .patch(self.file_url(file_id))
            .query(&[
                ("addParents", new_parent_id),
                ("removeParents", previous_parents.as_str()),
                ("fields", FILE_FIELDS),
            ])
            .json(&serde_json::json!({}));

        let moved: DriveFile = self.json(request).await?;
        tracing::info!("Moved file {} to {}", file_id, new_parent_id);
        Ok(moved)
    }

    async fn copy(&self, file_id: &str, new_parent_id: Option<&str>) -> Result<DriveFile> {
        let body = CopyRequest {
            parents: new_parent_id.map(str::to_owned).into_iter().collect(),
        };
        let request = self
            .http()
            .post(format!("{}/copy", self.file_url(file_id)))
            .query(&[("fields", FILE_FIELDS)])
            .json(&body);

        let copied: DriveFile = self.json(request).await?;
        tracing::info!("Copied file {} to {}", file_id, copied.id);
        Ok(copied)
    }

    async fn rename(&self, file_id: &str, new_name: &str) -> Result<DriveFile> {
        let request = self
            .http()
            .patch(self.file_url(file_id))
            .query(&[("fields", FILE_FIELDS)])
            .json(&RenameRequest {
                name: new_name.to_string(),
            });

        let renamed: DriveFile = self.json(request).await?;
        tracing::info!("Renamed file {} to '{}'", file_id, new_name);
        Ok(renamed)
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        self.send(self.http().delete(self.file_url(file_id))).await?;
        tracing::info!("Deleted file {}", file_id);
        Ok(())
    }

    async fn grant_permission(&self, file_id: &str, grantee: &Grantee, role: Role) -> Result<()> {
        let request = self
            .http()
            .post(format!("{}/permissions", self.file_url(file_id)))
            .query(&[("fields", "id")])
            .json(&PermissionRequest::new(grantee, role));

        self.send(request).await?;
        tracing::info!("Granted {:?} access on {} to {:?}", role, file_id, grantee);
        Ok(())
    }

    async fn download(&self, file_id: &str) -> Result<Bytes> {
        let request = self
            .http()
            .get(self.file_url(file_id))
            .query(&[("alt", "media")]);
        let response = self.send(request).await?;
        Ok(response.bytes().await?)
    }

    fn refreshed_credentials(&self) -> Option<DriveCredentials> {
        self.token_manager.refreshed_credentials()
    }
}

impl std::fmt::Debug for GoogleDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDrive")
            .field("token_manager", &self.token_manager)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Creates [`GoogleDrive`] clients sharing one HTTP connection pool.
#[derive(Clone, Debug)]
pub struct GoogleConnector {
    app: Arc<OAuthApp>,
    http_client: Client,
}

impl GoogleConnector {
    pub fn new(app: OAuthApp) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            app: Arc::new(app),
            http_client,
        })
    }
}

#[async_trait]
impl DriveConnector for GoogleConnector {
    fn connect(&self, credentials: DriveCredentials) -> Arc<dyn DriveApi> {
        let tokens = TokenManager::new(self.app.clone(), self.http_client.clone(), credentials);
        Arc::new(GoogleDrive::new(tokens))
    }

    fn authorization_url(&self, state: &str) -> Result<String> {
        self.app.authorization_url(state)
    }

    async fn exchange_code(&self, code: &str) -> Result<DriveCredentials> {
        self.app.exchange_code(&self.http_client, code).await
    }
}

/// `files.list` query for the non-trashed children of a folder.
pub fn children_query(parent_id: Option<&str>) -> String {
    match parent_id {
        Some(parent) => format!(
            "trashed = false and '{}' in parents",
            escape_query_value(parent)
        ),
        None => "trashed = false".to_string(),
    }
}

/// Escape a value embedded in a single-quoted Drive query literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Build a `multipart/related` body: JSON metadata part, then the media part.
pub fn related_body(boundary: &str, metadata_json: &str, mime_type: &str, data: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(data.len() + metadata_json.len() + 256);
    body.put_slice(format!("--{}\r\n", boundary).as_bytes());
    body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.put_slice(metadata_json.as_bytes());
    body.put_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.put_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    body.put_slice(data);
    body.put_slice(format!("\r\n--{}--", boundary).as_bytes());
    body.freeze()
}
