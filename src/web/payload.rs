//! Request body handling shared by the state-changing routes.
//!
//! Browser forms post `application/x-www-form-urlencoded`; the page's AJAX code
//! posts JSON. [`Payload`] accepts either, and an empty body deserializes to the
//! payload's default so a bare `POST /delete/{id}` still reaches the handler.

use crate::core::item::ItemDraft;
use axum::extract::{FromRequest, Request};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Whether the client expects JSON back rather than a redirect.
#[must_use]
pub fn is_ajax(headers: &HeaderMap) -> bool {
    let json_body = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    let xhr = headers
        .get("x-requested-with")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    json_body || xhr
}

/// A form-encoded or JSON request body.
#[derive(Debug, Clone, Default)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default + Send,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self(value));
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self(value));
        }

        Ok(Self(T::default()))
    }
}

/// A price as submitted: forms always send text, JSON clients may send a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PriceField {
    /// JSON number
    Number(f64),
    /// Form or JSON string
    Text(String),
}

/// Body of `POST /add`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddItemPayload {
    /// Item name
    #[serde(default)]
    pub title: String,
    /// Free-text description
    #[serde(default)]
    pub content: String,
    /// Optional price
    #[serde(default)]
    pub price: Option<PriceField>,
    /// Optional `YYYY-MM-DD` date
    #[serde(default)]
    pub purchase_by: Option<String>,
    /// Token from the hidden form field or JSON body
    #[serde(default)]
    pub csrf_token: Option<String>,
}

impl AddItemPayload {
    /// Converts the body into an unvalidated draft, leaving out the CSRF token.
    #[must_use]
    pub fn to_draft(&self) -> ItemDraft {
        ItemDraft {
            title: self.title.clone(),
            content: self.content.clone(),
            price: self.price.as_ref().map(|price| match price {
                PriceField::Number(n) => n.to_string(),
                PriceField::Text(text) => text.clone(),
            }),
            purchase_by: self.purchase_by.clone(),
        }
    }
}

/// Body of `POST /delete/{id}`; only the token matters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsrfPayload {
    /// Token from the hidden form field or JSON body
    #[serde(default)]
    pub csrf_token: Option<String>,
}
