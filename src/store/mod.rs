//! Local relational store: the mirrored node tree, share links, users and
//! their drive profiles.

pub mod entity;
pub mod links;
pub mod nodes;
pub mod profiles;
pub mod users;


use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};

use crate::error::Result;

pub use links::ShareLinkManager;
pub use nodes::{DeleteSummary, NewFileRecord, NodeStore, NodeUpdate};
pub use profiles::{ProfileStore, ProfileUpdate};
pub use users::UserStore;

/// Upper bound on parent-chain walks; a deeper chain is treated as corrupt.
pub const MAX_TREE_DEPTH: usize = 1024;

/// Open the database and make sure every table exists.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    tracing::debug!("Connecting to database {}", database_url);
    let db = Database::connect(database_url).await?;
    ensure_schema(&db).await?;
    Ok(db)
}

/// Create tables and indexes from the entity definitions if missing.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<()> {
    create_table(db, entity::user::Entity).await?;
    create_table(db, entity::profile::Entity).await?;
    create_table(db, entity::node::Entity).await?;
    create_table(db, entity::share_link::Entity).await?;
    tracing::info!("Database schema ready");
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut table = schema.create_table_from_entity(entity);
    db.execute(backend.build(table.if_not_exists())).await?;

    for mut index in schema.create_index_from_entity(entity) {
        db.execute(backend.build(index.if_not_exists())).await?;
    }

    Ok(())
}
