//! Store-level drive operations on top of a [`DriveApi`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::types::{DriveFile, Grantee, Role, ShareableLinks};
use super::{DriveApi, DriveConnector, DriveCredentials};
use crate::error::{AppError, Result};
use crate::store::entity::profile;

/// Whether `move_or_copy` relocates the file or duplicates it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOp {
    #[default]
    Move,
    Copy,
}

/// A folder's contents together with the folder actually listed.
#[derive(Debug, Clone, Serialize)]
pub struct FolderListing {
    pub files: Vec<DriveFile>,
    pub current_folder_id: Option<String>,
    pub root_folder_id: Option<String>,
}

/// Result of an operation that targets a parent folder, with the parent that
/// was really used after fallback.
#[derive(Debug, Clone, Serialize)]
pub struct Placed {
    pub file: DriveFile,
    pub parent_id: Option<String>,
}

/// One user's view of their drive.
#[derive(Clone)]
pub struct DriveGateway {
    api: Arc<dyn DriveApi>,
    root_folder_id: Option<String>,
}

impl DriveGateway {
    pub fn new(api: Arc<dyn DriveApi>, root_folder_id: Option<String>) -> Self {
        Self {
            api,
            root_folder_id,
        }
    }

    /// Connect with the credentials stored on `profile`.
    pub fn for_profile(connector: &dyn DriveConnector, profile: &profile::Model) -> Result<Self> {
        let credentials = profile
            .credentials()?
            .ok_or_else(|| AppError::AuthRequired("Google Drive not connected".to_string()))?;
        Ok(Self::new(
            connector.connect(credentials),
            profile.drive_root_folder_id.clone(),
        ))
    }

    pub fn root_folder_id(&self) -> Option<&str> {
        self.root_folder_id.as_deref()
    }

    /// Pick the folder an operation should target.
    ///
    /// The requested folder (or the root folder when none is given) must be
    /// readable; otherwise the root folder is used. Authorization failures are
    /// never swallowed.
    pub async fn resolve_parent(&self, requested: Option<&str>) -> Result<Option<String>> {
        let candidate = requested
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .or_else(|| self.root_folder_id.clone());

        let Some(candidate) = candidate else {
            return Ok(None);
        };

        match self.api.get(&candidate).await {
            Ok(folder) => {
                tracing::debug!("Using folder '{}' ({})", folder.name, candidate);
                Ok(Some(candidate))
            }
            Err(e @ AppError::AuthRequired(_)) => Err(e),
            Err(e) => {
                tracing::warn!(
                    "Folder {} is not accessible ({}), falling back to root folder {:?}",
                    candidate,
                    e,
                    self.root_folder_id
                );
                Ok(self.root_folder_id.clone())
            }
        }
    }

    pub async fn list(&self, folder_id: Option<&str>) -> Result<FolderListing> {
        let current = self.resolve_parent(folder_id).await?;
        let files = self.api.list(current.as_deref()).await?;
        Ok(FolderListing {
            files,
            current_folder_id: current,
            root_folder_id: self.root_folder_id.clone(),
        })
    }

    pub async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<Placed> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Folder name is required".to_string()));
        }
        let parent = self.resolve_parent(parent_id).await?;
        let file = self.api.create_folder(name, parent.as_deref()).await?;
        Ok(Placed {
            file,
            parent_id: parent,
        })
    }

    pub async fn upload(
        &self,
        data: Bytes,
        name: &str,
        mime_type: &str,
        parent_id: Option<&str>,
    ) -> Result<Placed> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("File name is required".to_string()));
        }
        let parent = self.resolve_parent(parent_id).await?;
        let file = self
            .api
            .upload(data, name, mime_type, parent.as_deref())
            .await?;
        Ok(Placed {
            file,
            parent_id: parent,
        })
    }

    pub async fn move_or_copy(
        &self,
        file_id: &str,
        destination_id: &str,
        op: TransferOp,
    ) -> Result<Placed> {
        if file_id.is_empty() || destination_id.is_empty() {
            return Err(AppError::Validation(
                "File ID and destination folder ID are required".to_string(),
            ));
        }

        let destination = self.resolve_parent(Some(destination_id)).await?;
        let file = match (op, destination.as_deref()) {
            (TransferOp::Copy, dest) => self.api.copy(file_id, dest).await?,
            (TransferOp::Move, Some(dest)) => self.api.move_file(file_id, dest).await?,
            (TransferOp::Move, None) => {
                return Err(AppError::Validation(format!(
                    "No accessible destination for moving {}",
                    file_id
                )))
            }
        };

        Ok(Placed {
            file,
            parent_id: destination,
        })
    }

    pub async fn rename(&self, file_id: &str, new_name: &str) -> Result<DriveFile> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(AppError::Validation("New name is required".to_string()));
        }
        self.api.rename(file_id, new_name).await
    }

    pub async fn delete(&self, file_id: &str) -> Result<()> {
        self.api.delete(file_id).await
    }

    /// Grant access and return the file's public links.
    pub async fn make_shareable(
        &self,
        file_id: &str,
        grantee: &Grantee,
        role: Role,
    ) -> Result<ShareableLinks> {
        if let Grantee::User { email } = grantee {
            if email.trim().is_empty() {
                return Err(AppError::Validation(
                    "An email address is required to share with a user".to_string(),
                ));
            }
        }

        self.api.grant_permission(file_id, grantee, role).await?;
        let file = self.api.get(file_id).await?;
        Ok(ShareableLinks {
            view_link: file.web_view_link,
            download_link: file.web_content_link,
        })
    }

    /// Metadata and content of a file.
    pub async fn download(&self, file_id: &str) -> Result<(DriveFile, Bytes)> {
        let file = self.api.get(file_id).await?;
        let data = self.api.download(file_id).await?;
        tracing::debug!("Downloaded '{}' ({} bytes)", file.name, data.len());
        Ok((file, data))
    }

    /// Find the named top-level folder, creating it if it does not exist.
    pub async fn ensure_root_folder(&self, name: &str) -> Result<String> {
        if let Some(existing) = self.api.find_folder(name).await? {
            tracing::info!("Found existing root folder '{}' ({})", name, existing.id);
            return Ok(existing.id);
        }
        let folder = self.api.create_folder(name, None).await?;
        Ok(folder.id)
    }

    pub fn refreshed_credentials(&self) -> Option<DriveCredentials> {
        self.api.refreshed_credentials()
    }
}

impl std::fmt::Debug for DriveGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveGateway")
            .field("root_folder_id", &self.root_folder_id)
            .finish()
    }
}
