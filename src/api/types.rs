//! Request and response bodies of the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::drive::{DriveFile, Role, TransferOp};
use crate::store::entity::{node, profile, share_link, user};

/// Distinguish an absent field from an explicit `null`.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: user::Model,
    pub profile: ProfileResponse,
    #[serde(flatten)]
    pub token: AccessTokenResponse,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: i64,
    pub bio: Option<String>,
    pub logo: Option<String>,
    pub has_drive: bool,
    pub drive_root_folder_id: Option<String>,
}

impl From<profile::Model> for ProfileResponse {
    fn from(profile: profile::Model) -> Self {
        Self {
            user_id: profile.user_id,
            has_drive: profile.has_drive(),
            bio: profile.bio,
            logo: profile.logo,
            drive_root_folder_id: profile.drive_root_folder_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorizationUrlResponse {
    pub authorization_url: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    pub name: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub view_link: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNodeRequest {
    #[serde(default)]
    pub name: Option<String>,
    /// Absent leaves the parent alone, `null` moves the node to the root
    #[serde(default, deserialize_with = "deserialize_some")]
    pub parent_id: Option<Option<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct NodeDetail {
    #[serde(flatten)]
    pub node: node::Model,
    pub path: String,
    pub children: Vec<node::Model>,
}

#[derive(Debug, Serialize)]
pub struct PathResponse {
    pub path: String,
}

// ============================================================================
// Drive proxy
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListDriveQuery {
    pub folder_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDriveFolderRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DriveFolderResponse {
    pub folder_id: String,
    pub parent_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct DriveUploadResponse {
    pub file_id: String,
    pub parent_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub destination_id: String,
    #[serde(default)]
    pub operation: TransferOp,
}

#[derive(Debug, Serialize)]
pub struct MoveResponse {
    #[serde(flatten)]
    pub file: DriveFile,
    pub destination_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    #[serde(default)]
    pub new_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShareQuery {
    /// Share with this user instead of anyone holding the link
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// Share link lifetime; seven days when absent
    pub ttl_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub message: &'static str,
    pub view_link: Option<String>,
    pub download_link: Option<String>,
    pub share_link: ShareLinkResponse,
}

#[derive(Debug, Serialize)]
pub struct TotalSharedResponse {
    pub total_shared_files: usize,
}

// ============================================================================
// Share links
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ShareLinkResponse {
    pub id: Uuid,
    pub file_ref: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub download_count: i32,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub usable: bool,
    pub share_url: String,
}

impl ShareLinkResponse {
    pub fn new(link: share_link::Model) -> Self {
        Self {
            usable: link.is_usable(),
            share_url: format!("/share/{}/", link.id),
            id: link.id,
            file_ref: link.file_ref,
            created_by: link.created_by,
            created_at: link.created_at,
            expires_at: link.expires_at,
            is_active: link.is_active,
            download_count: link.download_count,
            last_accessed_at: link.last_accessed_at,
        }
    }
}
