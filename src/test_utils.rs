//! Shared test utilities.
//!
//! This module provides helpers for setting up test databases and inserting
//! items with sensible defaults.

use crate::{
    config::database,
    core::item::{self, NewItem},
    entities::shopping_item,
    errors::Result,
};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with the schema prepared.
/// This is the standard setup for data-access tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    database::prepare_schema(&db).await?;
    Ok(db)
}

/// Creates a test item with the default purchase-by date.
pub async fn create_test_item(
    db: &DatabaseConnection,
    title: &str,
    content: &str,
    price: f64,
) -> Result<shopping_item::Model> {
    item::create_item(
        db,
        &NewItem {
            title: title.to_string(),
            content: content.to_string(),
            price,
            purchase_by: None,
        },
    )
    .await
}

/// Inserts `count` items titled `Item 1`, `Item 2`, ... with prices 1.0, 2.0, ...
pub async fn seed_numbered_items(db: &DatabaseConnection, count: u32) -> Result<()> {
    for n in 1..=count {
        create_test_item(db, &format!("Item {n}"), "numbered", f64::from(n)).await?;
    }
    Ok(())
}
