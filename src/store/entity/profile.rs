use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::drive::DriveCredentials;
use crate::error::AppError;

/// Per-user profile holding the linked drive credentials.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub user_id: i64,
    pub bio: Option<String>,
    pub logo: Option<String>,
    /// Token bundle: `token`, `refresh_token`, `scopes`, `expiry`
    #[serde(skip_serializing)]
    pub drive_credentials: Option<Json>,
    pub drive_root_folder_id: Option<String>,
}

impl Model {
    /// True iff a non-empty credential bundle is stored.
    pub fn has_drive(&self) -> bool {
        match &self.drive_credentials {
            None | Some(Json::Null) => false,
            Some(Json::Object(map)) => !map.is_empty(),
            Some(Json::String(s)) => !s.is_empty(),
            Some(Json::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    /// Decoded credential bundle, if the drive is linked.
    pub fn credentials(&self) -> crate::error::Result<Option<DriveCredentials>> {
        if !self.has_drive() {
            return Ok(None);
        }
        let raw = self
            .drive_credentials
            .clone()
            .ok_or_else(|| AppError::Internal("Credential bundle vanished".to_string()))?;
        let credentials: DriveCredentials = serde_json::from_value(raw)?;
        if credentials.is_empty() {
            return Ok(None);
        }
        Ok(Some(credentials))
    }

    pub fn root_folder_id(&self) -> Option<&str> {
        self.drive_root_folder_id.as_deref()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
