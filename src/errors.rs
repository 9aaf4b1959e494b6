//! Unified error type for the shopping list application.
//!
//! Validation variants carry the exact message shown to the user (as a flash
//! message or a JSON `error` field). Store and template failures are not
//! meant to be shown; they turn into a logged, generic 500 response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Title or content was missing or blank after trimming
    #[error("Title and description are required!")]
    MissingTitleOrContent,

    /// The price field did not parse as a finite number
    #[error("Price must be a number (e.g. 2.99)")]
    InvalidPrice {
        /// The raw value that was supplied
        raw: String,
    },

    /// The purchase-by field was not an ISO date
    #[error("Purchase-by date must be a date (YYYY-MM-DD)")]
    InvalidPurchaseBy {
        /// The raw value that was supplied
        raw: String,
    },

    /// A data-table query parameter was not an integer
    #[error("Query parameter `{name}` must be an integer, got {value:?}")]
    InvalidQueryParam {
        /// Parameter name
        name: &'static str,
        /// The raw value that was supplied
        value: String,
    },

    /// A state-changing request carried no token or the wrong one
    #[error("Invalid CSRF token")]
    InvalidCsrfToken,

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Template rendering failed
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    /// Socket or file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is caused by bad client input rather than a server fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingTitleOrContent
                | Self::InvalidPrice { .. }
                | Self::InvalidPurchaseBy { .. }
                | Self::InvalidQueryParam { .. }
                | Self::InvalidCsrfToken
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            let body = axum::Json(serde_json::json!({ "error": self.to_string() }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        tracing::error!(error = %self, "Request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
