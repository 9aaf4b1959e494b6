//! Route handlers.

/// `GET /api/items` - data-table endpoint
pub mod api;
/// `GET /` - listing page
pub mod index;
/// `/add` and `/delete/{id}`
pub mod items;

pub use api::list_items_page;
pub use index::index;
pub use items::{add_item, add_item_form, delete_item};
