use crate::{
    core::item::{self, ItemView},
    errors::Result,
    web::{AppState, session::Session, templates::INDEX_TEMPLATE},
};
use axum::Extension;
use axum::extract::State;
use axum::response::Html;

/// Renders the full listing with the session's pending flash messages.
pub async fn index(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Html<String>> {
    let items = state
        .store
        .scoped(|db| async move { item::list_items(&db).await })
        .await?;
    let views: Vec<ItemView> = items.iter().map(ItemView::from).collect();
    let flashes = state.sessions.take_flashes(&session.id).await;

    let mut ctx = tera::Context::new();
    ctx.insert("items", &views);
    ctx.insert("flashes", &flashes);
    ctx.insert("csrf_token", &session.csrf_token);

    Ok(Html(state.templates.render(INDEX_TEMPLATE, &ctx)?))
}
