//! Development data - fills a database with random grocery items.
//!
//! Used by the `seed_db` binary so the data-table paging, search and sort can be
//! exercised against a realistically sized table.

use crate::{
    entities::{ShoppingItem, shopping_item},
    errors::Result,
};
use chrono::{Days, NaiveDate, SubsecRound, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use sea_orm::{Set, prelude::*};
use tracing::{info, instrument};

/// Rows appended when no count is given.
pub const DEFAULT_SEED_COUNT: usize = 150;

/// Latest purchase-by date a seeded item gets, in days from today.
const MAX_PURCHASE_OFFSET_DAYS: u64 = 21;

/// Product names seeded items are drawn from.
pub const GROCERY_ITEMS: &[&str] = &[
    "Milk",
    "Bread",
    "Eggs",
    "Butter",
    "Cheese",
    "Yogurt",
    "Chicken Breast",
    "Ground Beef",
    "Pasta",
    "Rice",
    "Canned Tomatoes",
    "Onions",
    "Potatoes",
    "Carrots",
    "Apples",
    "Bananas",
    "Oranges",
    "Lettuce",
    "Spinach",
    "Cereal",
    "Oats",
    "Coffee",
    "Tea",
    "Sugar",
    "Salt",
    "Pepper",
    "Olive Oil",
    "Vegetable Oil",
    "Flour",
    "Baking Powder",
    "Yeast",
    "Tomato Sauce",
    "Peanut Butter",
    "Jam",
    "Honey",
    "Granola",
    "Frozen Vegetables",
    "Frozen Pizza",
    "Ice Cream",
];

/// One generated grocery row before insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedItem {
    /// `"{name} #{n}"`
    pub title: String,
    /// Pack size and product name
    pub content: String,
    /// Between 0.99 and 19.99, whole cents
    pub price: f64,
    /// Today up to three weeks out
    pub purchase_by: NaiveDate,
}

/// Generates `count` random items. Titles are numbered from 1 so rows stay distinguishable.
pub fn generate_items<R: Rng + ?Sized>(count: usize, today: NaiveDate, rng: &mut R) -> Vec<SeedItem> {
    (1..=count)
        .map(|n| {
            let name = GROCERY_ITEMS.choose(rng).copied().unwrap_or("Milk");
            let pack = rng.random_range(1..=5);
            let cents: u32 = rng.random_range(99..=1999);
            let offset = rng.random_range(0..=MAX_PURCHASE_OFFSET_DAYS);

            SeedItem {
                title: format!("{name} #{n}"),
                content: format!("Pack of {pack} - {}", name.to_lowercase()),
                price: f64::from(cents) / 100.0,
                purchase_by: today.checked_add_days(Days::new(offset)).unwrap_or(today),
            }
        })
        .collect()
}

/// Appends `count` random grocery items and returns how many rows were inserted.
///
/// # Errors
/// Returns an error if the database insert fails.
#[instrument(skip(db))]
pub async fn seed_items(db: &DatabaseConnection, count: usize) -> Result<usize> {
    if count == 0 {
        return Ok(0);
    }

    let now = Utc::now().naive_utc().trunc_subsecs(0);
    let items = generate_items(count, now.date(), &mut rand::rng());

    let models = items.into_iter().map(|item| shopping_item::ActiveModel {
        title: Set(item.title),
        content: Set(item.content),
        price: Set(item.price),
        created: Set(now),
        purchase_by: Set(Some(item.purchase_by)),
        ..Default::default()
    });
    ShoppingItem::insert_many(models).exec(db).await?;

    info!(count, "Seeded grocery items");
    Ok(count)
}
