//! State-changing routes. Both answer browsers with a redirect to `/` plus a flash
//! message, and AJAX callers with JSON.

use crate::{
    core::item::{self, ItemView},
    errors::{Error, Result},
    web::{
        AppState,
        payload::{AddItemPayload, CsrfPayload, Payload, is_ajax},
        session::{Flash, Session, submitted_token, verify_csrf},
    },
};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use tracing::warn;

/// Turns a rejected request into a flash + redirect, or a JSON 400 for AJAX callers.
async fn reject(state: &AppState, session: &Session, error: Error, ajax: bool) -> Response {
    warn!(error = %error, ajax, "Rejected request");
    if ajax {
        return error.into_response();
    }
    state
        .sessions
        .push_flash(&session.id, Flash::error(error.to_string()))
        .await;
    Redirect::to("/").into_response()
}

fn check_csrf(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
    body_token: Option<&str>,
) -> Result<()> {
    let token = submitted_token(headers, body_token);
    verify_csrf(state.config.disable_csrf, session, token.as_deref())
}

/// `GET /add`: the form lives on the index page.
pub async fn add_item_form() -> Redirect {
    Redirect::to("/")
}

/// `POST /add`
pub async fn add_item(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    Payload(payload): Payload<AddItemPayload>,
) -> Result<Response> {
    let ajax = is_ajax(&headers);

    if let Err(e) = check_csrf(&state, &session, &headers, payload.csrf_token.as_deref()) {
        return Ok(reject(&state, &session, e, ajax).await);
    }

    let new_item = match payload.to_draft().validate() {
        Ok(new_item) => new_item,
        Err(e) => return Ok(reject(&state, &session, e, ajax).await),
    };

    let created = state
        .store
        .scoped(|db| async move { item::create_item(&db, &new_item).await })
        .await?;

    state
        .sessions
        .push_flash(&session.id, Flash::success("Item added successfully!"))
        .await;

    if ajax {
        return Ok((StatusCode::CREATED, Json(ItemView::from(&created))).into_response());
    }
    Ok(Redirect::to("/").into_response())
}

/// `POST /delete/{id}`. A missing id is not an error.
pub async fn delete_item(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Payload(payload): Payload<CsrfPayload>,
) -> Result<Response> {
    let ajax = is_ajax(&headers);

    if let Err(e) = check_csrf(&state, &session, &headers, payload.csrf_token.as_deref()) {
        return Ok(reject(&state, &session, e, ajax).await);
    }

    state
        .store
        .scoped(|db| async move { item::delete_item(&db, id).await })
        .await?;

    state
        .sessions
        .push_flash(&session.id, Flash::success("Item deleted successfully!"))
        .await;

    if ajax {
        return Ok(Json(serde_json::json!({ "status": "ok" })).into_response());
    }
    Ok(Redirect::to("/").into_response())
}
