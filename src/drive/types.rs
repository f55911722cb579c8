//! Google Drive v3 request and response types.

use serde::{Deserialize, Serialize};

/// MIME type Google Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields requested for every file resource.
pub const FILE_FIELDS: &str = "id, name, mimeType, size, modifiedTime, parents, webViewLink, \
                               webContentLink, iconLink, thumbnailLink, md5Checksum";

// ============================================================================
// Files
// ============================================================================

/// A file or folder as returned by the Drive API.
/// Only the fields we request are present; the rest stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    /// Byte count, encoded as a decimal string by the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_content_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5_checksum: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Parsed byte count; folders and Google Docs have none.
    pub fn size_bytes(&self) -> Option<i64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Response of `files.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
}

/// Request body for creating a folder or the metadata part of an upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadataRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

/// Request body for `files.copy`.
#[derive(Debug, Default, Serialize)]
pub struct CopyRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

/// Request body for renaming via `files.update`.
#[derive(Debug, Serialize)]
pub struct RenameRequest {
    pub name: String,
}

// ============================================================================
// Permissions
// ============================================================================

/// Who a permission is granted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grantee {
    Anyone,
    User { email: String },
}

/// Access level granted by a permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Reader,
    Commenter,
    Writer,
}

/// Request body for `permissions.create`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    #[serde(rename = "type")]
    pub grantee_type: &'static str,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

impl PermissionRequest {
    pub fn new(grantee: &Grantee, role: Role) -> Self {
        match grantee {
            Grantee::Anyone => Self {
                grantee_type: "anyone",
                role,
                email_address: None,
            },
            Grantee::User { email } => Self {
                grantee_type: "user",
                role,
                email_address: Some(email.clone()),
            },
        }
    }
}

/// Public links of a file after it was made shareable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareableLinks {
    pub view_link: Option<String>,
    pub download_link: Option<String>,
}

// ============================================================================
// OAuth token endpoint
// ============================================================================

/// Response of the OAuth token endpoint (code exchange and refresh).
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// Pull the human readable message out of a Google error body.
///
/// Drive answers `{"error": {"code": .., "message": ..}}`, the token endpoint
/// answers `{"error": "invalid_grant", "error_description": ..}`.
pub fn provider_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;

    if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
        return Some(message.to_string());
    }

    let code = error.as_str()?;
    match value.get("error_description").and_then(|d| d.as_str()) {
        Some(description) => Some(format!("{}: {}", code, description)),
        None => Some(code.to_string()),
    }
}
