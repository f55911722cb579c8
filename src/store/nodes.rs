//! The mirrored file/folder tree.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::entity::{node, share_link};
use super::MAX_TREE_DEPTH;
use crate::error::{AppError, Result};

/// Metadata for a file that already exists on the remote drive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewFileRecord {
    pub name: String,
    pub remote_id: Option<String>,
    pub mime_type: Option<String>,
    pub view_link: Option<String>,
    pub size: Option<i64>,
    pub parent_id: Option<i64>,
}

/// Rename and/or move a node. `parent_id: Some(None)` moves it to the root.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub parent_id: Option<Option<i64>>,
}

/// What a cascading delete removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub nodes_deleted: u64,
    pub share_links_deleted: u64,
    pub remote_ids: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct NodeStore {
    db: DatabaseConnection,
}

impl NodeStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// All nodes owned by `owner`, ordered by name.
    pub async fn list_for_owner(&self, owner: i64) -> Result<Vec<node::Model>> {
        Ok(node::Entity::find()
            .filter(node::Column::OwnerId.eq(owner))
            .order_by_asc(node::Column::Name)
            .all(&self.db)
            .await?)
    }

    /// Fetch a node owned by `owner`; anything else reads as missing.
    pub async fn get(&self, node_id: i64, owner: i64) -> Result<node::Model> {
        find_owned(&self.db, node_id, owner).await
    }

    pub async fn find_by_remote_id(
        &self,
        remote_id: &str,
        owner: i64,
    ) -> Result<Option<node::Model>> {
        Ok(node::Entity::find()
            .filter(node::Column::RemoteId.eq(remote_id))
            .filter(node::Column::OwnerId.eq(owner))
            .one(&self.db)
            .await?)
    }

    /// Create a local folder, at the root when `parent_id` is `None`.
    pub async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<i64>,
        owner: i64,
    ) -> Result<node::Model> {
        let name = validate_name(name)?;
        if let Some(parent_id) = parent_id {
            self.folder_parent(parent_id, owner).await?;
        }

        let now = Utc::now();
        let folder = node::ActiveModel {
            name: Set(name),
            is_folder: Set(true),
            parent_id: Set(parent_id),
            owner_id: Set(owner),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        tracing::info!(
            "Created folder '{}' (id={}, parent={:?}, owner={})",
            folder.name,
            folder.id,
            folder.parent_id,
            owner
        );
        Ok(folder)
    }

    /// Record a file that was uploaded to the remote drive.
    pub async fn create_file_record(
        &self,
        record: NewFileRecord,
        owner: i64,
    ) -> Result<node::Model> {
        let name = validate_name(&record.name)?;
        if let Some(parent_id) = record.parent_id {
            self.folder_parent(parent_id, owner).await?;
        }

        if let Some(remote_id) = record.remote_id.as_deref() {
            let existing = node::Entity::find()
                .filter(node::Column::RemoteId.eq(remote_id))
                .one(&self.db)
                .await?;
            if existing.is_some() {
                return Err(AppError::Validation(format!(
                    "Remote file {} is already recorded",
                    remote_id
                )));
            }
        }

        let now = Utc::now();
        let file = node::ActiveModel {
            name: Set(name),
            is_folder: Set(false),
            remote_id: Set(record.remote_id),
            mime_type: Set(record.mime_type),
            view_link: Set(record.view_link),
            size: Set(record.size),
            parent_id: Set(record.parent_id),
            owner_id: Set(owner),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        tracing::info!(
            "Recorded file '{}' (id={}, remote={:?}, parent={:?})",
            file.name,
            file.id,
            file.remote_id,
            file.parent_id
        );
        Ok(file)
    }

    /// Children of a folder, ordered by name.
    pub async fn list_children(&self, folder_id: i64, owner: i64) -> Result<Vec<node::Model>> {
        let folder = node::Entity::find_by_id(folder_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Folder {} not found", folder_id)))?;

        if folder.owner_id != owner {
            return Err(AppError::Forbidden(format!(
                "Folder {} belongs to another user",
                folder_id
            )));
        }
        if !folder.is_folder {
            return Err(AppError::Validation(format!(
                "Node {} is not a folder",
                folder_id
            )));
        }

        Ok(node::Entity::find()
            .filter(node::Column::ParentId.eq(folder_id))
            .order_by_asc(node::Column::Name)
            .all(&self.db)
            .await?)
    }

    /// `/`-joined names from the top-most ancestor down to the node itself.
    pub async fn get_path(&self, node_id: i64, owner: i64) -> Result<String> {
        let node = find_owned(&self.db, node_id, owner).await?;
        let mut names = vec![node.name.clone()];
        let mut visited = HashSet::from([node.id]);
        let mut next = node.parent_id;

        while let Some(parent_id) = next {
            if !visited.insert(parent_id) || visited.len() > MAX_TREE_DEPTH {
                tracing::error!(
                    "Parent chain of node {} loops back at node {}",
                    node_id,
                    parent_id
                );
                return Err(AppError::Internal(format!(
                    "Cycle detected in parent chain of node {}",
                    node_id
                )));
            }

            let parent = node::Entity::find_by_id(parent_id)
                .one(&self.db)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "Node {} references missing parent {}",
                        node_id, parent_id
                    ))
                })?;
            names.push(parent.name);
            next = parent.parent_id;
        }

        names.reverse();
        Ok(names.join("/"))
    }

    /// Rename and/or move a node within the owner's tree.
    pub async fn update(
        &self,
        node_id: i64,
        owner: i64,
        update: NodeUpdate,
    ) -> Result<node::Model> {
        let node = find_owned(&self.db, node_id, owner).await?;
        let mut active: node::ActiveModel = node.into();

        if let Some(name) = update.name {
            active.name = Set(validate_name(&name)?);
        }

        if let Some(parent_id) = update.parent_id {
            if let Some(parent_id) = parent_id {
                self.folder_parent(parent_id, owner).await?;
                if self.is_self_or_descendant(parent_id, node_id).await? {
                    return Err(AppError::Validation(format!(
                        "Cannot move node {} under itself or one of its descendants",
                        node_id
                    )));
                }
            }
            active.parent_id = Set(parent_id);
        }

        active.updated_at = Set(Utc::now());
        let node = active.update(&self.db).await?;
        tracing::debug!("Updated node {} (parent={:?})", node.id, node.parent_id);
        Ok(node)
    }

    /// Delete a node, all of its descendants and every share link pointing at
    /// one of their remote files, in a single transaction.
    pub async fn delete(&self, node_id: i64, owner: i64) -> Result<DeleteSummary> {
        let root = find_owned(&self.db, node_id, owner).await?;
        let txn = self.db.begin().await?;

        let mut ids = Vec::new();
        let mut remote_ids: Vec<String> = root.remote_id.iter().cloned().collect();
        let mut visited = HashSet::from([root.id]);
        let mut stack = vec![root.id];

        while let Some(id) = stack.pop() {
            ids.push(id);
            let children = node::Entity::find()
                .filter(node::Column::ParentId.eq(id))
                .all(&txn)
                .await?;
            for child in children {
                if !visited.insert(child.id) {
                    tracing::warn!("Skipping already visited node {} during delete", child.id);
                    continue;
                }
                if let Some(remote_id) = child.remote_id {
                    remote_ids.push(remote_id);
                }
                stack.push(child.id);
            }
        }

        let share_links_deleted = if remote_ids.is_empty() {
            0
        } else {
            share_link::Entity::delete_many()
                .filter(share_link::Column::FileRef.is_in(remote_ids.clone()))
                .exec(&txn)
                .await?
                .rows_affected
        };

        let nodes_deleted = node::Entity::delete_many()
            .filter(node::Column::Id.is_in(ids))
            .exec(&txn)
            .await?
            .rows_affected;

        txn.commit().await?;

        tracing::info!(
            "Deleted node {} with {} nodes and {} share links",
            node_id,
            nodes_deleted,
            share_links_deleted
        );

        Ok(DeleteSummary {
            nodes_deleted,
            share_links_deleted,
            remote_ids,
        })
    }

    // ========================================================================
    // Remote mirroring
    // ========================================================================

    /// Apply a rename done on the remote drive to the local record, if any.
    pub async fn mirror_remote_rename(
        &self,
        remote_id: &str,
        new_name: &str,
        owner: i64,
    ) -> Result<Option<node::Model>> {
        let Some(node) = self.find_by_remote_id(remote_id, owner).await? else {
            return Ok(None);
        };
        let update = NodeUpdate {
            name: Some(new_name.to_string()),
            parent_id: None,
        };
        self.update(node.id, owner, update).await.map(Some)
    }

    /// Apply a remote move. A destination without a local folder puts the
    /// node at the root.
    pub async fn mirror_remote_move(
        &self,
        remote_id: &str,
        destination_remote_id: Option<&str>,
        owner: i64,
    ) -> Result<Option<node::Model>> {
        let Some(node) = self.find_by_remote_id(remote_id, owner).await? else {
            return Ok(None);
        };

        let destination = match destination_remote_id {
            Some(dest) => self
                .find_by_remote_id(dest, owner)
                .await?
                .filter(|folder| folder.is_folder)
                .map(|folder| folder.id),
            None => None,
        };

        let update = NodeUpdate {
            name: None,
            parent_id: Some(destination),
        };
        self.update(node.id, owner, update).await.map(Some)
    }

    /// Drop the local record of a file deleted on the remote drive.
    pub async fn mirror_remote_delete(
        &self,
        remote_id: &str,
        owner: i64,
    ) -> Result<Option<DeleteSummary>> {
        match self.find_by_remote_id(remote_id, owner).await? {
            Some(node) => self.delete(node.id, owner).await.map(Some),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn folder_parent(&self, parent_id: i64, owner: i64) -> Result<node::Model> {
        let parent = find_owned(&self.db, parent_id, owner).await?;
        if !parent.is_folder {
            return Err(AppError::Validation(format!(
                "Parent {} is a file, not a folder",
                parent_id
            )));
        }
        Ok(parent)
    }

    /// Whether `candidate` is `node_id` or sits below it.
    async fn is_self_or_descendant(&self, candidate: i64, node_id: i64) -> Result<bool> {
        let mut visited = HashSet::new();
        let mut current = Some(candidate);

        while let Some(id) = current {
            if id == node_id {
                return Ok(true);
            }
            if !visited.insert(id) || visited.len() > MAX_TREE_DEPTH {
                return Err(AppError::Internal(format!(
                    "Cycle detected above node {}",
                    candidate
                )));
            }
            current = node::Entity::find_by_id(id)
                .one(&self.db)
                .await?
                .and_then(|n| n.parent_id);
        }

        Ok(false)
    }
}

async fn find_owned<C>(conn: &C, node_id: i64, owner: i64) -> Result<node::Model>
where
    C: ConnectionTrait,
{
    node::Entity::find_by_id(node_id)
        .filter(node::Column::OwnerId.eq(owner))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Node {} not found", node_id)))
}

pub(crate) fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if name.contains('/') {
        return Err(AppError::Validation(format!(
            "Name '{}' must not contain '/'",
            name
        )));
    }
    Ok(name.to_string())
}
