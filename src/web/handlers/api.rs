use crate::{
    core::query::{self, DataTablePage, DataTableRequest},
    errors::Result,
    web::AppState,
};
use axum::Json;
use axum::extract::{Query, State};
use std::collections::HashMap;

/// Serves one page of the data-table widget.
///
/// Parameter keys use the widget's bracket syntax (`search[value]`,
/// `order[0][column]`), so they are taken as a flat map and parsed by
/// [`DataTableRequest::from_params`].
pub async fn list_items_page(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<DataTablePage>> {
    let request = DataTableRequest::from_params(&params)?;
    let page = state
        .store
        .scoped(|db| async move { query::fetch_page(&db, &request).await })
        .await?;
    Ok(Json(page))
}
