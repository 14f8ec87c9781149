//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables and their secondary indexes are generated from the entity definitions with
//! `Schema::create_table_from_entity` / `Schema::create_index_from_entity`, so the schema
//! always matches the Rust structs without hand-written SQL.

use crate::entities::{
    Attendee, Event, EventBudgetAuditLog, EventGroup, Itinerary, Organization,
    OrganizationMember, User,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info, instrument};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/event_travel.sqlite?mode=rwc";

/// Gets the database URL from the environment (including a `.env` file) or returns
/// the default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection using [`get_database_url`] and makes sure every table exists.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {database_url}");
    let db = Database::connect(&database_url).await?;
    create_tables(&db).await?;
    Ok(db)
}

async fn create_table_with_indexes<E, C>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(builder.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(builder.build(&index)).await?;
    }
    Ok(())
}

/// Creates all tables (parents before children) and their indexes.
#[instrument(skip(db))]
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let schema = Schema::new(db.get_database_backend());

    create_table_with_indexes(db, &schema, Organization).await?;
    create_table_with_indexes(db, &schema, User).await?;
    create_table_with_indexes(db, &schema, OrganizationMember).await?;
    create_table_with_indexes(db, &schema, Event).await?;
    create_table_with_indexes(db, &schema, EventGroup).await?;
    create_table_with_indexes(db, &schema, Attendee).await?;
    create_table_with_indexes(db, &schema, Itinerary).await?;
    create_table_with_indexes(db, &schema, EventBudgetAuditLog).await?;

    info!("Database tables ensured.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{EventModel, ItineraryModel};
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<EventModel> = Event::find().limit(1).all(&db).await?;
        let _: Vec<ItineraryModel> = Itinerary::find().limit(1).all(&db).await?;
        let _ = EventBudgetAuditLog::find().limit(1).all(&db).await?;
        let _ = OrganizationMember::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
