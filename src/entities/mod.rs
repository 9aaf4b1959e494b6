//! Entity module - Contains the `SeaORM` entity definitions for the database.
//! The application stores a single table, `ShoppingList`.

/// The `ShoppingList` table
pub mod shopping_item;

pub use shopping_item::{
    Column as ShoppingItemColumn, Entity as ShoppingItem, Model as ShoppingItemModel,
};
