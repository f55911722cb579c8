use chrono::{Duration, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifetime of a share link created without an explicit TTL.
pub const DEFAULT_TTL_DAYS: i64 = 7;

pub fn default_ttl() -> Duration {
    Duration::days(DEFAULT_TTL_DAYS)
}

/// A revocable, time-bounded capability for one remote file.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "share_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Google Drive file id the link grants access to
    #[sea_orm(indexed)]
    pub file_ref: Option<String>,
    #[sea_orm(indexed)]
    pub created_by: i64,
    pub created_at: DateTimeUtc,
    pub expires_at: DateTimeUtc,
    pub is_active: bool,
    pub download_count: i32,
    pub last_accessed_at: Option<DateTimeUtc>,
}

impl Model {
    /// Whether the link has passed its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTimeUtc) -> bool {
        now > self.expires_at
    }

    /// Active and not yet expired at `now`.
    pub fn is_usable_at(&self, now: DateTimeUtc) -> bool {
        self.is_active && !self.is_expired_at(now)
    }

    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }
}

/// Number of links usable at `now`.
pub fn count_usable_at(links: &[Model], now: DateTimeUtc) -> usize {
    links.iter().filter(|link| link.is_usable_at(now)).count()
}

pub fn count_usable(links: &[Model]) -> usize {
    count_usable_at(links, Utc::now())
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
