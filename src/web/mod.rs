//! Web layer - router, shared state and server lifecycle.
//!
//! Routes:
//! - `GET /` listing page
//! - `GET|POST /add` create an item (form or JSON)
//! - `POST /delete/{id}` delete an item
//! - `GET /api/items` data-table paging, search and sort

/// Route handlers
pub mod handlers;
/// Form/JSON request bodies
pub mod payload;
/// Sessions, flash messages and the CSRF guard
pub mod session;
/// Embedded page templates
pub mod templates;

use crate::config::AppConfig;
use crate::errors::Result;
use crate::store::Store;
use axum::extract::FromRef;
use axum::http::{HeaderValue, header};
use axum::routing::{get, post};
use axum::{Router, middleware};
use axum_extra::extract::cookie::Key;
use session::SessionStore;
use sha2::{Digest, Sha512};
use std::sync::Arc;
use tera::Tera;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared data available to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Resolved settings
    pub config: Arc<AppConfig>,
    /// Database access
    pub store: Store,
    /// Live sessions
    pub sessions: SessionStore,
    /// Compiled page templates
    pub templates: Arc<Tera>,
    cookie_key: Key,
}

impl AppState {
    /// Builds the state: database store, empty session store, compiled templates and
    /// the cookie-signing key derived from the configured secret.
    pub fn new(config: AppConfig) -> Result<Self> {
        let cookie_key = derive_cookie_key(&config.secret_key);
        Ok(Self {
            store: Store::new(&config.database_path)?,
            sessions: SessionStore::new(),
            templates: Arc::new(templates::load_templates()?),
            config: Arc::new(config),
            cookie_key,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Stretches a secret of any length into the 64-byte key cookie signing needs.
#[must_use]
pub fn derive_cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Creates the router with all routes and middleware attached.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/add", get(handlers::add_item_form).post(handlers::add_item))
        .route("/delete/{id}", post(handlers::delete_item))
        .route("/api/items", get(handlers::list_items_page))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_layer,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections.");
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::{item::ItemDraft, seed};
    use crate::entities::ShoppingItem;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use chrono::{Days, NaiveDate};
    use sea_orm::{EntityTrait, PaginatorTrait};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        _dir: TempDir,
        state: AppState,
        app: Router,
    }

    async fn test_app(disable_csrf: bool) -> Result<TestApp> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test_database.db");
        let config = AppConfig::for_database(path.to_string_lossy().into_owned(), disable_csrf);
        let state = AppState::new(config)?;
        state.store.prepare().await?;
        let app = router(state.clone());
        Ok(TestApp {
            _dir: dir,
            state,
            app,
        })
    }

    impl TestApp {
        async fn send(&self, request: Request<Body>) -> Response {
            self.app
                .clone()
                .oneshot(request)
                .await
                .unwrap_or_else(|never| match never {})
        }

        async fn row_count(&self) -> Result<u64> {
            self.state
                .store
                .scoped(|db| async move { Ok(ShoppingItem::find().count(&db).await?) })
                .await
        }

        async fn insert(&self, title: &str, content: &str, price: &str) -> Result<i64> {
            let draft = ItemDraft {
                title: title.to_string(),
                content: content.to_string(),
                price: Some(price.to_string()),
                purchase_by: None,
            };
            let item = self
                .state
                .store
                .scoped(|db| async move { crate::core::item::add_item(&db, &draft).await })
                .await?;
            Ok(item.id)
        }

        /// Opens a session the way a browser would and returns (cookie, csrf token).
        async fn open_session(&self) -> (String, String) {
            let response = self.send(get_request("/", None)).await;
            assert_eq!(response.status(), StatusCode::OK);
            let cookie = session_cookie(&response);
            let html = body_text(response).await;
            (cookie, csrf_from_page(&html))
        }
    }

    fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn json_post(uri: &str, body: &Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn session_cookie(response: &Response) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn csrf_from_page(html: &str) -> String {
        let marker = r#"<meta name="csrf-token" content=""#;
        let start = html.find(marker).unwrap() + marker.len();
        let end = start + html[start..].find('"').unwrap();
        html[start..end].to_string()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[test]
    fn test_derive_cookie_key_is_deterministic() {
        assert_eq!(
            derive_cookie_key("a").master(),
            derive_cookie_key("a").master()
        );
        assert_ne!(
            derive_cookie_key("a").master(),
            derive_cookie_key("b").master()
        );
    }

    #[tokio::test]
    async fn test_index_sets_session_cookie_and_security_headers() -> Result<()> {
        let t = test_app(true).await?;
        t.insert("Gatorade", "zero orange", "0").await?;

        let response = t.send(get_request("/", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");

        let cookie = session_cookie(&response);
        assert!(cookie.starts_with("session="));
        let html = body_text(response).await;
        assert!(html.contains("Gatorade"));

        // A returning browser keeps its session and gets no new cookie
        let response = t.send(get_request("/", Some(&cookie))).await;
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(t.state.sessions.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_item_form_flow() -> Result<()> {
        let t = test_app(true).await?;
        let (cookie, _) = t.open_session().await;

        let response = t
            .send(form_post(
                "/add",
                "title=Test+Item&content=Test+desc&price=3.50",
                Some(&cookie),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let html = body_text(t.send(get_request("/", Some(&cookie))).await).await;
        assert!(html.contains("Item added successfully!"));
        assert!(html.contains("Test desc"));

        // Flash messages are shown once
        let html = body_text(t.send(get_request("/", Some(&cookie))).await).await;
        assert!(!html.contains("Item added successfully!"));

        let items = t
            .state
            .store
            .scoped(|db| async move { crate::core::item::list_items(&db).await })
            .await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Test Item");
        assert_eq!(items[0].content, "Test desc");
        assert_eq!(items[0].price, 3.5);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_item_json_scenario() -> Result<()> {
        let t = test_app(true).await?;

        let response = t
            .send(json_post(
                "/add",
                &serde_json::json!({
                    "title": "Gatorade",
                    "content": "zero orange",
                    "price": "2.49"
                }),
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = body_json(response).await;
        assert_eq!(json["title"], "Gatorade");
        assert_eq!(json["content"], "zero orange");
        assert_eq!(json["price"], 2.49);
        assert!(
            json["amazon_url"]
                .as_str()
                .unwrap()
                .contains("Gatorade+zero+orange")
        );

        let created = json["created"].as_str().unwrap();
        let created_on = NaiveDate::parse_from_str(&created[..10], "%Y-%m-%d").unwrap();
        let expected = created_on.checked_add_days(Days::new(7)).unwrap();
        assert_eq!(
            json["purchase_by"],
            expected.format("%Y-%m-%d").to_string().as_str()
        );

        assert_eq!(t.row_count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_item_validation_writes_nothing() -> Result<()> {
        let t = test_app(true).await?;
        let (cookie, _) = t.open_session().await;

        let response = t
            .send(form_post("/add", "title=&content=desc", Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let html = body_text(t.send(get_request("/", Some(&cookie))).await).await;
        assert!(html.contains("Title and description are required!"));

        let response = t
            .send(form_post(
                "/add",
                "title=Milk&content=whole&price=cheap",
                Some(&cookie),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let html = body_text(t.send(get_request("/", Some(&cookie))).await).await;
        assert!(html.contains("Price must be a number (e.g. 2.99)"));

        let response = t
            .send(json_post(
                "/add",
                &serde_json::json!({ "title": "Milk", "content": "   " }),
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Title and description are required!"
        );

        assert_eq!(t.row_count().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_add_redirects_home() -> Result<()> {
        let t = test_app(true).await?;
        let response = t.send(get_request("/add", None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_item_flows() -> Result<()> {
        let t = test_app(true).await?;
        let keep = t.insert("Keep", "me", "1").await?;
        let doomed = t.insert("ToDelete", "temp", "1.0").await?;

        let response = t
            .send(
                Request::builder()
                    .method("POST")
                    .uri(format!("/delete/{doomed}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(t.row_count().await?, 1);

        // Missing id: still a success, nothing changes
        let response = t
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/delete/424242")
                    .header("x-requested-with", "XMLHttpRequest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({ "status": "ok" }));
        assert_eq!(t.row_count().await?, 1);

        let remaining = t
            .state
            .store
            .scoped(|db| async move { crate::core::item::get_item(&db, keep).await })
            .await?;
        assert!(remaining.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_csrf_guard_blocks_mutations() -> Result<()> {
        let t = test_app(false).await?;
        let existing = t.insert("Bread", "rye", "2").await?;
        let (cookie, token) = t.open_session().await;

        // No token at all
        let response = t
            .send(form_post("/add", "title=Milk&content=whole", Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let html = body_text(t.send(get_request("/", Some(&cookie))).await).await;
        assert!(html.contains("Invalid CSRF token"));

        // Wrong token over AJAX
        let response = t
            .send(json_post(
                "/add",
                &serde_json::json!({ "title": "Milk", "content": "whole", "csrf_token": "nope" }),
                Some(&cookie),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid CSRF token");

        // A valid token from a different session does not count
        let response = t
            .send(form_post(
                "/add",
                &format!("title=Milk&content=whole&csrf_token={token}"),
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = t
            .send(
                Request::builder()
                    .method("POST")
                    .uri(format!("/delete/{existing}"))
                    .header(header::COOKIE, &cookie)
                    .header("x-requested-with", "XMLHttpRequest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(t.row_count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_csrf_guard_accepts_matching_tokens() -> Result<()> {
        let t = test_app(false).await?;
        let (cookie, token) = t.open_session().await;

        let response = t
            .send(form_post(
                "/add",
                &format!("title=Milk&content=whole&csrf_token={token}"),
                Some(&cookie),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(t.row_count().await?, 1);

        let response = t
            .send(json_post(
                "/add",
                &serde_json::json!({ "title": "Eggs", "content": "dozen", "csrf_token": token }),
                Some(&cookie),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_i64().unwrap();
        assert_eq!(t.row_count().await?, 2);

        let response = t
            .send(
                Request::builder()
                    .method("POST")
                    .uri(format!("/delete/{id}"))
                    .header(header::COOKIE, &cookie)
                    .header(session::CSRF_HEADER, &token)
                    .header("x-requested-with", "XMLHttpRequest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(t.row_count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_form_delete_with_csrf_field() -> Result<()> {
        let t = test_app(false).await?;
        let keep = t.insert("Keep", "me", "1").await?;
        let doomed = t.insert("ToDelete", "temp", "1.0").await?;
        let (cookie, token) = t.open_session().await;

        let response = t
            .send(form_post(
                &format!("/delete/{doomed}"),
                &format!("csrf_token={token}"),
                Some(&cookie),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let html = body_text(t.send(get_request("/", Some(&cookie))).await).await;
        assert!(html.contains("Item deleted successfully!"));

        let ids: Vec<i64> = t
            .state
            .store
            .scoped(|db| async move { crate::core::item::list_items(&db).await })
            .await?
            .iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec![keep]);
        Ok(())
    }

    #[tokio::test]
    async fn test_cookieless_clients_do_not_grow_sessions() -> Result<()> {
        let mut t = test_app(true).await?;
        t.state.sessions = SessionStore::with_limits(50, session::DEFAULT_IDLE_TIMEOUT);
        t.app = router(t.state.clone());

        let (cookie, _) = t.open_session().await;
        for _ in 0..500 {
            let response = t.send(get_request("/api/items", None)).await;
            assert_eq!(response.status(), StatusCode::OK);
            // Keep the browser session active while the pollers churn
            t.send(get_request("/api/items", Some(&cookie))).await;
        }

        assert!(t.state.sessions.len().await <= 50);

        // The active browser session survived the churn
        let response = t.send(get_request("/", Some(&cookie))).await;
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_api_items_first_page() -> Result<()> {
        let t = test_app(true).await?;
        t.state
            .store
            .scoped(|db| async move { seed::seed_items(&db, seed::DEFAULT_SEED_COUNT).await })
            .await?;

        let response = t
            .send(get_request("/api/items?draw=1&start=0&length=10", None))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["draw"], 1);
        assert_eq!(json["data"].as_array().unwrap().len(), 10);
        assert_eq!(json["recordsTotal"], 150);
        assert_eq!(json["recordsFiltered"], 150);
        Ok(())
    }

    #[tokio::test]
    async fn test_api_items_search() -> Result<()> {
        let t = test_app(true).await?;
        t.insert("Milk", "whole", "3.49").await?;
        t.insert("Oat drink", "like milk", "2.99").await?;
        t.insert("Bread", "rye", "2.50").await?;

        let response = t
            .send(get_request("/api/items?search%5Bvalue%5D=Milk", None))
            .await;
        let json = body_json(response).await;

        let rows = json["data"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(json["recordsFiltered"], 2);
        assert_eq!(json["recordsTotal"], 3);
        for row in rows {
            let text = format!("{} {}", row["title"], row["content"]).to_lowercase();
            assert!(text.contains("milk"));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_api_items_sort_by_price_desc() -> Result<()> {
        let t = test_app(true).await?;
        t.insert("A", "a", "1.25").await?;
        t.insert("B", "b", "8").await?;
        t.insert("C", "c", "3.5").await?;

        let response = t
            .send(get_request(
                "/api/items?order%5B0%5D%5Bcolumn%5D=2&order%5B0%5D%5Bdir%5D=desc",
                None,
            ))
            .await;
        let json = body_json(response).await;

        let prices: Vec<f64> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["price"].as_f64().unwrap())
            .collect();
        assert_eq!(prices, vec![8.0, 3.5, 1.25]);
        Ok(())
    }

    #[tokio::test]
    async fn test_api_items_rejects_malformed_numbers() -> Result<()> {
        let t = test_app(true).await?;
        let response = t.send(get_request("/api/items?start=abc", None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
