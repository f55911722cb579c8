//! Per-user profiles and their drive credentials.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use serde::Deserialize;

use super::entity::profile;
use crate::drive::DriveCredentials;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub logo: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ProfileStore {
    db: DatabaseConnection,
}

impl ProfileStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create the empty profile that accompanies a new account.
    pub async fn create_for_user<C>(conn: &C, user_id: i64) -> Result<profile::Model>
    where
        C: ConnectionTrait,
    {
        let profile = profile::ActiveModel {
            user_id: Set(user_id),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        tracing::debug!("Created profile {} for user {}", profile.id, user_id);
        Ok(profile)
    }

    pub async fn get_for_user(&self, user_id: i64) -> Result<profile::Model> {
        profile::Entity::find()
            .filter(profile::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile for user {} not found", user_id)))
    }

    /// Partial update; absent fields are left alone.
    pub async fn update(&self, user_id: i64, update: ProfileUpdate) -> Result<profile::Model> {
        let mut active: profile::ActiveModel = self.get_for_user(user_id).await?.into();
        if let Some(bio) = update.bio {
            active.bio = Set(Some(bio));
        }
        if let Some(logo) = update.logo {
            active.logo = Set(Some(logo));
        }
        Ok(active.update(&self.db).await?)
    }

    /// Store the credentials obtained from a completed OAuth flow.
    pub async fn link_drive(
        &self,
        user_id: i64,
        credentials: &DriveCredentials,
        root_folder_id: &str,
    ) -> Result<profile::Model> {
        if credentials.is_empty() {
            return Err(AppError::Validation(
                "Refusing to link an empty credential bundle".to_string(),
            ));
        }
        let mut active: profile::ActiveModel = self.get_for_user(user_id).await?.into();
        active.drive_credentials = Set(Some(serde_json::to_value(credentials)?));
        active.drive_root_folder_id = Set(Some(root_folder_id.to_string()));
        let profile = active.update(&self.db).await?;
        tracing::info!(
            "Linked Google Drive for user {} (root folder {})",
            user_id,
            root_folder_id
        );
        Ok(profile)
    }

    /// Persist an access token refreshed during a request.
    pub async fn store_refreshed_credentials(
        &self,
        user_id: i64,
        credentials: &DriveCredentials,
    ) -> Result<()> {
        let mut active: profile::ActiveModel = self.get_for_user(user_id).await?.into();
        active.drive_credentials = Set(Some(serde_json::to_value(credentials)?));
        active.update(&self.db).await?;
        tracing::debug!("Stored refreshed drive credentials for user {}", user_id);
        Ok(())
    }
}
