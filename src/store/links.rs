//! Share links: minting, expiry checks, access accounting.

use chrono::{Duration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::entity::share_link::{self, count_usable_at, default_ttl};
use super::entity::node;
use crate::error::{AppError, Result};

#[derive(Clone, Debug)]
pub struct ShareLinkManager {
    db: DatabaseConnection,
}

impl ShareLinkManager {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Mint a link expiring `ttl` from now (seven days when `None`).
    ///
    /// The remote file does not need a local node; a missing one is only
    /// logged.
    pub async fn create(
        &self,
        file_ref: Option<&str>,
        created_by: i64,
        ttl: Option<Duration>,
    ) -> Result<share_link::Model> {
        if let Some(file_ref) = file_ref {
            let mirrored = node::Entity::find()
                .filter(node::Column::RemoteId.eq(file_ref))
                .one(&self.db)
                .await?;
            if mirrored.is_none() {
                tracing::warn!(
                    "No local node for remote file {}, creating share link anyway",
                    file_ref
                );
            }
        }

        let now = Utc::now();
        let link = share_link::ActiveModel {
            id: Set(Uuid::new_v4()),
            file_ref: Set(file_ref.map(str::to_owned)),
            created_by: Set(created_by),
            created_at: Set(now),
            expires_at: Set(now + ttl.unwrap_or_else(default_ttl)),
            is_active: Set(true),
            download_count: Set(0),
            last_accessed_at: Set(None),
        }
        .insert(&self.db)
        .await?;

        tracing::info!(
            "Created share link {} for {:?} (expires {})",
            link.id,
            link.file_ref,
            link.expires_at
        );
        Ok(link)
    }

    pub async fn get(&self, link_id: Uuid) -> Result<share_link::Model> {
        share_link::Entity::find_by_id(link_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Share link {} not found", link_id)))
    }

    /// Links minted by `user`, newest first.
    pub async fn list_for_user(&self, user: i64) -> Result<Vec<share_link::Model>> {
        Ok(share_link::Entity::find()
            .filter(share_link::Column::CreatedBy.eq(user))
            .order_by_desc(share_link::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Count one successful download through the link.
    pub async fn record_access(&self, link_id: Uuid) -> Result<share_link::Model> {
        let result = share_link::Entity::update_many()
            .col_expr(
                share_link::Column::DownloadCount,
                Expr::col(share_link::Column::DownloadCount).add(1),
            )
            .col_expr(share_link::Column::LastAccessedAt, Expr::value(Utc::now()))
            .filter(share_link::Column::Id.eq(link_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "Share link {} not found",
                link_id
            )));
        }

        let link = self.get(link_id).await?;
        tracing::debug!(
            "Share link {} accessed ({} downloads)",
            link_id,
            link.download_count
        );
        Ok(link)
    }

    /// Turn off a link minted by `user`.
    pub async fn deactivate(&self, link_id: Uuid, user: i64) -> Result<share_link::Model> {
        let link = self.get(link_id).await?;
        if link.created_by != user {
            return Err(AppError::Forbidden(format!(
                "Share link {} belongs to another user",
                link_id
            )));
        }

        let mut active: share_link::ActiveModel = link.into();
        active.is_active = Set(false);
        let link = active.update(&self.db).await?;
        tracing::info!("Deactivated share link {}", link_id);
        Ok(link)
    }

    /// Number of usable links across all users.
    pub async fn total_usable(&self) -> Result<usize> {
        let active = share_link::Entity::find()
            .filter(share_link::Column::IsActive.eq(true))
            .all(&self.db)
            .await?;
        Ok(count_usable_at(&active, Utc::now()))
    }
}
