use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Timeout applied to every Google API request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub mod auth;
pub mod client;
pub mod gateway;
pub mod types;

#[cfg(test)]
mod tests;

pub use auth::{CredentialState, DriveCredentials, OAuthApp, TokenManager};
pub use client::{GoogleConnector, GoogleDrive};
pub use gateway::{DriveGateway, FolderListing, Placed, TransferOp};
pub use types::{DriveFile, Grantee, Role, ShareableLinks, FOLDER_MIME_TYPE};

/// The external storage contract. Every call either returns the provider's
/// answer or fails with `ExternalService`/`AuthRequired`; nothing is retried.
#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn get(&self, file_id: &str) -> Result<DriveFile>;

    /// Non-trashed children of `parent_id`; every non-trashed file when `None`.
    async fn list(&self, parent_id: Option<&str>) -> Result<Vec<DriveFile>>;

    async fn find_folder(&self, name: &str) -> Result<Option<DriveFile>>;

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<DriveFile>;

    async fn upload(
        &self,
        data: Bytes,
        name: &str,
        mime_type: &str,
        parent_id: Option<&str>,
    ) -> Result<DriveFile>;

    async fn move_file(&self, file_id: &str, new_parent_id: &str) -> Result<DriveFile>;

    async fn copy(&self, file_id: &str, new_parent_id: Option<&str>) -> Result<DriveFile>;

    async fn rename(&self, file_id: &str, new_name: &str) -> Result<DriveFile>;

    async fn delete(&self, file_id: &str) -> Result<()>;

    async fn grant_permission(&self, file_id: &str, grantee: &Grantee, role: Role) -> Result<()>;

    async fn download(&self, file_id: &str) -> Result<Bytes>;

    /// Credentials refreshed while serving calls, to be persisted by the caller.
    fn refreshed_credentials(&self) -> Option<DriveCredentials>;
}

/// Builds drive clients from explicit credentials and runs the OAuth link flow.
#[async_trait]
pub trait DriveConnector: Send + Sync {
    fn connect(&self, credentials: DriveCredentials) -> Arc<dyn DriveApi>;

    fn authorization_url(&self, state: &str) -> Result<String>;

    async fn exchange_code(&self, code: &str) -> Result<DriveCredentials>;
}
