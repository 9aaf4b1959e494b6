//! Database configuration module.
//!
//! This module handles `SQLite` connection creation and the startup schema check.
//! The `ShoppingList` table is generated from the entity definition with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust model.
//! Databases created before the `purchase_by` column existed are upgraded in place
//! by adding the column; nothing is ever dropped or rewritten.

use crate::entities::{ShoppingItem, shopping_item};
use crate::errors::Result;
use sea_orm::sea_query::{ColumnDef, Table};
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityName, IdenStatic, Schema, Statement,
};
use tracing::{debug, info, instrument};

/// Builds the `SeaORM` connection URL for a `SQLite` database file.
///
/// The file is created on first use (`mode=rwc`).
#[must_use]
pub fn get_database_url(database_path: &str) -> String {
    format!("sqlite://{database_path}?mode=rwc")
}

/// Opens a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Opening database connection to: {}", database_url);
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates the `ShoppingList` table from the entity definition if it does not exist yet.
#[instrument(skip(db))]
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut item_table = schema.create_table_from_entity(ShoppingItem);
    item_table.if_not_exists();

    db.execute(builder.build(&item_table)).await?;
    debug!("ShoppingList table ensured.");
    Ok(())
}

/// Returns the column names of the `ShoppingList` table, in declaration order.
pub async fn table_columns(db: &DatabaseConnection) -> Result<Vec<String>> {
    let backend = db.get_database_backend();
    let pragma = format!("PRAGMA table_info(\"{}\")", ShoppingItem.table_name());
    let rows = db
        .query_all(Statement::from_string(backend, pragma))
        .await?;

    rows.iter()
        .map(|row| row.try_get::<String>("", "name").map_err(Into::into))
        .collect()
}

/// Adds the nullable `purchase_by` column when an older table lacks it.
///
/// Returns `true` if the column was added, `false` if it was already present.
#[instrument(skip(db))]
pub async fn ensure_purchase_by_column(db: &DatabaseConnection) -> Result<bool> {
    let purchase_by = shopping_item::Column::PurchaseBy.as_str();
    if table_columns(db).await?.iter().any(|name| name == purchase_by) {
        return Ok(false);
    }

    let builder = db.get_database_backend();
    let alter = Table::alter()
        .table(ShoppingItem)
        .add_column(ColumnDef::new(shopping_item::Column::PurchaseBy).date().null())
        .to_owned();
    db.execute(builder.build(&alter)).await?;

    info!("Added missing `{}` column to ShoppingList.", purchase_by);
    Ok(true)
}

/// Runs the full startup schema check: create the table, then add missing columns.
pub async fn prepare_schema(db: &DatabaseConnection) -> Result<()> {
    create_tables(db).await?;
    ensure_purchase_by_column(db).await?;
    Ok(())
}
