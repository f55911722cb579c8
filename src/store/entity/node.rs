use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A file or folder in a user's mirrored drive tree.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "nodes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(indexed)]
    pub name: String,
    pub is_folder: bool,
    /// Google Drive file id, unique when present
    #[sea_orm(unique)]
    pub remote_id: Option<String>,
    pub mime_type: Option<String>,
    pub view_link: Option<String>,
    /// Size in bytes
    pub size: Option<i64>,
    #[sea_orm(indexed)]
    pub parent_id: Option<i64>,
    #[sea_orm(indexed)]
    pub owner_id: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
