//! Server-side processing for the data-table widget.
//!
//! The widget sends `draw`, `start`, `length`, `search[value]`, `order[0][column]` and
//! `order[0][dir]` as query parameters and expects back the `draw` counter, the total
//! and filtered row counts, and one page of rows.
//!
//! The sort column is resolved through [`SortColumn`], a closed enumeration, so no
//! client-supplied text ever reaches the ORDER BY clause.

use crate::{
    core::item::ItemView,
    entities::{ShoppingItem, shopping_item},
    errors::{Error, Result},
};
use sea_orm::{Condition, Order, PaginatorTrait, QueryOrder, QuerySelect, prelude::*};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Page size used when the widget does not send `length`.
pub const DEFAULT_PAGE_LENGTH: u64 = 25;

/// Largest LIMIT `SQLite` accepts; used for "all rows".
const UNBOUNDED_LIMIT: u64 = i64::MAX.unsigned_abs();

/// Columns the table can be sorted by, indexed the way the widget numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    /// Column 0
    Title,
    /// Column 1
    Content,
    /// Column 2
    Price,
    /// Column 3
    PurchaseBy,
    /// Column 4, and the fallback for unknown indexes
    Created,
}

impl SortColumn {
    /// Maps a widget column index. Unknown indexes sort by creation time.
    #[must_use]
    pub const fn from_index(index: i64) -> Self {
        match index {
            0 => Self::Title,
            1 => Self::Content,
            2 => Self::Price,
            3 => Self::PurchaseBy,
            _ => Self::Created,
        }
    }

    /// Parses the raw `order[0][column]` parameter.
    ///
    /// Absent means column 0; anything that is not a known index, including
    /// non-numeric text, means [`SortColumn::Created`].
    #[must_use]
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            None => Self::Title,
            Some(text) => text
                .trim()
                .parse::<i64>()
                .map_or(Self::Created, Self::from_index),
        }
    }

    /// The table column this sorts by.
    #[must_use]
    pub const fn column(self) -> shopping_item::Column {
        match self {
            Self::Title => shopping_item::Column::Title,
            Self::Content => shopping_item::Column::Content,
            Self::Price => shopping_item::Column::Price,
            Self::PurchaseBy => shopping_item::Column::PurchaseBy,
            Self::Created => shopping_item::Column::Created,
        }
    }
}

/// Sort order requested by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Asc,
    /// Largest first
    Desc,
}

impl SortDirection {
    /// `desc` (any case) sorts descending; everything else ascending.
    #[must_use]
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            Some(dir) if dir.trim().eq_ignore_ascii_case("desc") => Self::Desc,
            _ => Self::Asc,
        }
    }
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Self::Asc,
            SortDirection::Desc => Self::Desc,
        }
    }
}

/// A parsed data-table request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTableRequest {
    /// Opaque counter echoed back to the widget
    pub draw: i64,
    /// Row offset
    pub start: u64,
    /// Page size; `None` means every remaining row
    pub length: Option<u64>,
    /// Free-text filter; `None` when empty
    pub search: Option<String>,
    /// Column to sort by
    pub order_column: SortColumn,
    /// Sort order
    pub order_direction: SortDirection,
}

impl Default for DataTableRequest {
    fn default() -> Self {
        Self {
            draw: 1,
            start: 0,
            length: Some(DEFAULT_PAGE_LENGTH),
            search: None,
            order_column: SortColumn::Title,
            order_direction: SortDirection::Asc,
        }
    }
}

fn parse_int(params: &HashMap<String, String>, name: &'static str) -> Result<Option<i64>> {
    params
        .get(name)
        .map(|raw| {
            raw.trim().parse::<i64>().map_err(|_| Error::InvalidQueryParam {
                name,
                value: raw.clone(),
            })
        })
        .transpose()
}

impl DataTableRequest {
    /// Builds a request from raw query parameters, applying defaults for anything absent.
    ///
    /// # Errors
    /// Returns [`Error::InvalidQueryParam`] if `draw`, `start` or `length` is present
    /// but not an integer.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();

        let draw = parse_int(params, "draw")?.unwrap_or(defaults.draw);
        let start = parse_int(params, "start")?.map_or(0, |s| u64::try_from(s).unwrap_or(0));
        // A negative length is the widget's "All" option
        let length = match parse_int(params, "length")? {
            None => defaults.length,
            Some(len) => u64::try_from(len).ok(),
        };

        let search = params
            .get("search[value]")
            .filter(|term| !term.is_empty())
            .cloned();

        Ok(Self {
            draw,
            start,
            length,
            search,
            order_column: SortColumn::from_param(
                params.get("order[0][column]").map(String::as_str),
            ),
            order_direction: SortDirection::from_param(
                params.get("order[0][dir]").map(String::as_str),
            ),
        })
    }
}

/// Response envelope the widget expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTablePage {
    /// Echo of the request's `draw`
    pub draw: i64,
    /// Rows in the table
    pub records_total: u64,
    /// Rows matching the search
    pub records_filtered: u64,
    /// The requested page
    pub data: Vec<ItemView>,
}

/// Filter for a search term: title or content contains it (case-insensitive for
/// ASCII, as `SQLite`'s LIKE is), or the price equals it when it reads as a number.
#[must_use]
pub fn search_condition(term: &str) -> Condition {
    let mut condition = Condition::any()
        .add(shopping_item::Column::Title.contains(term))
        .add(shopping_item::Column::Content.contains(term));

    match term.trim().parse::<f64>() {
        Ok(price) if price.is_finite() => {
            condition = condition.add(shopping_item::Column::Price.eq(price));
        }
        _ => {}
    }
    condition
}

/// Runs a data-table request: counts, filter, sort and page.
///
/// # Errors
/// Returns an error if any of the database queries fail.
#[instrument(skip(db))]
pub async fn fetch_page(db: &DatabaseConnection, request: &DataTableRequest) -> Result<DataTablePage> {
    let records_total = ShoppingItem::find().count(db).await?;

    let mut select = ShoppingItem::find();
    let records_filtered = match request.search.as_deref() {
        Some(term) => {
            select = select.filter(search_condition(term));
            select.clone().count(db).await?
        }
        None => records_total,
    };

    let rows = select
        .order_by(request.order_column.column(), request.order_direction.into())
        .order_by_asc(shopping_item::Column::Id)
        .offset(request.start)
        .limit(request.length.unwrap_or(UNBOUNDED_LIMIT))
        .all(db)
        .await?;

    debug!(
        records_total,
        records_filtered,
        returned = rows.len(),
        "Data-table page fetched"
    );

    Ok(DataTablePage {
        draw: request.draw,
        records_total,
        records_filtered,
        data: rows.iter().map(ItemView::from).collect(),
    })
}
