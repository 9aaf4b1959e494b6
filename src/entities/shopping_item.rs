//! Shopping list item entity - one row of the `ShoppingList` table.
//!
//! Items are created by the add form (or its AJAX twin), listed on the index page
//! and through the data-table API, and hard-deleted. There is no update path.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Shopping list item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ShoppingList")]
pub struct Model {
    /// Unique identifier, assigned by the database
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Short name of the thing to buy (e.g., "Gatorade")
    pub title: String,
    /// Free-form description (e.g., "zero orange")
    pub content: String,
    /// Expected price in dollars, 0 when unknown
    pub price: f64,
    /// When the item was added (UTC, second precision)
    pub created: DateTime,
    /// Date the item should be bought by
    pub purchase_by: Option<Date>,
}

/// The table has no relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
