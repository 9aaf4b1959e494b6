//! Item business logic - validation, creation, listing and deletion of shopping list items.
//!
//! Raw user input arrives as an [`ItemDraft`] (all strings, exactly as typed). It is
//! validated into a [`NewItem`] before anything touches the database, so a rejected
//! request never writes a row. Rows leave this module as [`ItemView`]s, the JSON
//! shape shared by the add endpoint and the data-table API.

use crate::{
    entities::{ShoppingItem, shopping_item},
    errors::{Error, Result},
};
use chrono::{Days, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Search page every item links to; the encoded `"{title} {content}"` is appended.
pub const PRODUCT_SEARCH_BASE: &str = "https://www.amazon.com/s?k=";

/// Days between creation and the default purchase-by date.
pub const DEFAULT_PURCHASE_WINDOW_DAYS: u64 = 7;

/// Characters left untouched in a form-encoded query value.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

/// Builds the product search URL for an item.
///
/// The query is `"{title} {content}"` encoded like an HTML form value: spaces become
/// `+` and everything outside ASCII alphanumerics and `_.-~` is percent-encoded.
#[must_use]
pub fn product_search_url(title: &str, content: &str) -> String {
    let query = format!("{title} {content}");
    let encoded = utf8_percent_encode(&query, QUERY_VALUE)
        .to_string()
        .replace("%20", "+");
    format!("{PRODUCT_SEARCH_BASE}{encoded}")
}

/// Unvalidated add-item input, exactly as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDraft {
    /// Item name
    pub title: String,
    /// Free-text description
    pub content: String,
    /// Price as typed, if any
    pub price: Option<String>,
    /// `YYYY-MM-DD` as typed, if any
    pub purchase_by: Option<String>,
}

/// Validated add-item input, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    /// Trimmed, non-empty title
    pub title: String,
    /// Trimmed, non-empty description
    pub content: String,
    /// Finite price, 0 when none was given
    pub price: f64,
    /// `None` means "creation date + 7 days", resolved at insert time
    pub purchase_by: Option<NaiveDate>,
}

/// Parses a submitted price. Missing or blank means 0.
///
/// # Errors
/// Returns [`Error::InvalidPrice`] when the value is not a finite number.
pub fn parse_price(raw: Option<&str>) -> Result<f64> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Ok(0.0);
    }

    match trimmed.parse::<f64>() {
        Ok(price) if price.is_finite() => Ok(price),
        _ => Err(Error::InvalidPrice {
            raw: trimmed.to_string(),
        }),
    }
}

/// Parses a submitted purchase-by date. Missing or blank means "use the default".
///
/// # Errors
/// Returns [`Error::InvalidPurchaseBy`] when the value is not a `YYYY-MM-DD` date.
pub fn parse_purchase_by(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Ok(None);
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| Error::InvalidPurchaseBy {
            raw: trimmed.to_string(),
        })
}

impl ItemDraft {
    /// Trims and validates the draft.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The title or content is empty after trimming
    /// - The price is present but not a finite number
    /// - The purchase-by date is present but not `YYYY-MM-DD`
    pub fn validate(&self) -> Result<NewItem> {
        let title = self.title.trim();
        let content = self.content.trim();
        if title.is_empty() || content.is_empty() {
            return Err(Error::MissingTitleOrContent);
        }

        Ok(NewItem {
            title: title.to_string(),
            content: content.to_string(),
            price: parse_price(self.price.as_deref())?,
            purchase_by: parse_purchase_by(self.purchase_by.as_deref())?,
        })
    }
}

/// Default purchase-by date for an item created at `created`.
#[must_use]
pub fn default_purchase_by(created: NaiveDateTime) -> NaiveDate {
    let created_on = created.date();
    created_on
        .checked_add_days(Days::new(DEFAULT_PURCHASE_WINDOW_DAYS))
        .unwrap_or(created_on)
}

/// JSON representation of an item, as returned by the add endpoint and the data-table API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    /// Row id
    pub id: i64,
    /// Item name
    pub title: String,
    /// Free-text description
    pub content: String,
    /// Price in the list's currency
    pub price: f64,
    /// `YYYY-MM-DD HH:MM:SS`
    pub created: String,
    /// Date the item should be bought by
    pub purchase_by: Option<NaiveDate>,
    /// Product search link for the item
    pub amazon_url: String,
}

impl From<&shopping_item::Model> for ItemView {
    fn from(item: &shopping_item::Model) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            content: item.content.clone(),
            price: item.price,
            created: item.created.format("%Y-%m-%d %H:%M:%S").to_string(),
            purchase_by: item.purchase_by,
            amazon_url: product_search_url(&item.title, &item.content),
        }
    }
}

/// Retrieves every item, oldest first.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn list_items(db: &DatabaseConnection) -> Result<Vec<shopping_item::Model>> {
    ShoppingItem::find()
        .order_by_asc(shopping_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a single item by id.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_item(db: &DatabaseConnection, id: i64) -> Result<Option<shopping_item::Model>> {
    ShoppingItem::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Inserts an already validated item, stamping `created` with the current UTC time.
///
/// # Errors
/// Returns an error if the database insert fails.
#[instrument(skip(db, item), fields(title = %item.title))]
pub async fn create_item(db: &DatabaseConnection, item: &NewItem) -> Result<shopping_item::Model> {
    let created = Utc::now().naive_utc().trunc_subsecs(0);
    let purchase_by = item
        .purchase_by
        .unwrap_or_else(|| default_purchase_by(created));

    let model = shopping_item::ActiveModel {
        title: Set(item.title.clone()),
        content: Set(item.content.clone()),
        price: Set(item.price),
        created: Set(created),
        purchase_by: Set(Some(purchase_by)),
        ..Default::default()
    };
    let inserted = model.insert(db).await?;

    info!(id = inserted.id, "Item added");
    Ok(inserted)
}

/// Validates a draft and inserts it.
///
/// # Errors
/// Returns a validation error (nothing is written) or a database error.
pub async fn add_item(db: &DatabaseConnection, draft: &ItemDraft) -> Result<shopping_item::Model> {
    let item = draft.validate()?;
    create_item(db, &item).await
}

/// Hard-deletes the item with the given id and returns the number of rows removed.
///
/// Deleting an id that does not exist is not an error; it removes 0 rows.
///
/// # Errors
/// Returns an error if the database delete fails.
#[instrument(skip(db))]
pub async fn delete_item(db: &DatabaseConnection, id: i64) -> Result<u64> {
    let result = ShoppingItem::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        debug!(id, "Delete matched no item");
    } else {
        info!(id, "Item deleted");
    }
    Ok(result.rows_affected)
}
