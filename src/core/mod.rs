//! Core business logic - framework-agnostic shopping list operations.
//!
//! Everything here takes a `DatabaseConnection` and returns crate `Result`s, so it
//! can be driven from HTTP handlers, the seeding binary, or tests alike.

/// Item validation, creation, listing and deletion
pub mod item;
/// Server-side pagination, search and sort for the data-table widget
pub mod query;
/// Random grocery data for development databases
pub mod seed;
