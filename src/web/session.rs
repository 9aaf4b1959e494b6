//! Sessions, flash messages and the CSRF guard.
//!
//! Every visitor gets a session on their first request. The session id travels in a
//! signed cookie; everything else (the CSRF token and pending flash messages) stays
//! server-side in a [`SessionStore`]. State-changing handlers call [`verify_csrf`]
//! with whatever token the request carried.

use crate::errors::{Error, Result};
use crate::web::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Cookie carrying the signed session id.
pub const SESSION_COOKIE: &str = "session";

/// Header AJAX clients put the CSRF token in.
pub const CSRF_HEADER: &str = "x-csrf-token";

const TOKEN_BYTES: usize = 32;

/// Generates a URL-safe random token from 32 bytes of OS-seeded randomness.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether a flash message reports success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    /// The action went through
    Success,
    /// The action was rejected
    Error,
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    /// Styling of the message
    pub kind: FlashKind,
    /// Text shown to the user
    pub message: String,
}

impl Flash {
    /// A success message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    /// An error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// The current request's session, placed in request extensions by [`session_layer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Random id carried in the signed cookie
    pub id: String,
    /// Token state-changing requests must echo back
    pub csrf_token: String,
}

/// Most sessions kept at once; the least recently seen one makes room for a new one.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Sessions not seen for this long are forgotten.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Clone)]
struct SessionData {
    csrf_token: String,
    flashes: Vec<Flash>,
    last_seen: Instant,
}

/// Server-side session state keyed by session id.
///
/// The store is bounded: idle sessions expire after `idle_timeout`, and at most
/// `max_sessions` are held. Clients that never send the cookie back (scripts,
/// pollers, forged cookies) therefore cannot grow it without limit.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_SESSIONS, DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    /// A store with [`DEFAULT_MAX_SESSIONS`] and [`DEFAULT_IDLE_TIMEOUT`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding at most `max_sessions` (minimum 1) sessions, each expiring
    /// after `idle_timeout` without a request.
    #[must_use]
    pub fn with_limits(max_sessions: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            max_sessions: max_sessions.max(1),
            idle_timeout,
        }
    }

    /// Resolves the session for a request.
    ///
    /// A known, unexpired `existing` id is reused and its idle clock restarted.
    /// Otherwise a fresh session with a new id and CSRF token is created. The
    /// boolean is `true` when the session is new and the cookie must be (re)issued.
    pub async fn establish(&self, existing: Option<&str>) -> (Session, bool) {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        if let Some(id) = existing {
            let fresh = sessions
                .get(id)
                .map(|data| now.duration_since(data.last_seen) <= self.idle_timeout);
            match fresh {
                Some(true) => {
                    if let Some(data) = sessions.get_mut(id) {
                        data.last_seen = now;
                        trace!("Reusing session");
                        return (
                            Session {
                                id: id.to_string(),
                                csrf_token: data.csrf_token.clone(),
                            },
                            false,
                        );
                    }
                }
                Some(false) => {
                    sessions.remove(id);
                    debug!("Session expired");
                }
                None => {}
            }
        }

        self.make_room(&mut sessions, now);

        let session = Session {
            id: generate_token(),
            csrf_token: generate_token(),
        };
        sessions.insert(
            session.id.clone(),
            SessionData {
                csrf_token: session.csrf_token.clone(),
                flashes: Vec::new(),
                last_seen: now,
            },
        );
        debug!(live = sessions.len(), "Started new session");
        (session, true)
    }

    /// Frees a slot when the store is full: expired sessions go first, then the
    /// least recently seen ones.
    fn make_room(&self, sessions: &mut HashMap<String, SessionData>, now: Instant) {
        if sessions.len() < self.max_sessions {
            return;
        }

        let idle_timeout = self.idle_timeout;
        sessions.retain(|_, data| now.duration_since(data.last_seen) <= idle_timeout);

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, data)| data.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }
        debug!(live = sessions.len(), "Evicted sessions to stay under the cap");
    }

    /// Queues a flash message for the session's next rendered page.
    pub async fn push_flash(&self, id: &str, flash: Flash) {
        if let Some(data) = self.sessions.write().await.get_mut(id) {
            data.flashes.push(flash);
        }
    }

    /// Removes and returns the session's pending flash messages.
    pub async fn take_flashes(&self, id: &str) -> Vec<Flash> {
        self.sessions
            .write()
            .await
            .get_mut(id)
            .map(|data| std::mem::take(&mut data.flashes))
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Middleware that attaches a [`Session`] to every request and issues the signed
/// session cookie when a new session was started.
pub async fn session_layer(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string());
    let (session, is_new) = state.sessions.establish(existing.as_deref()).await;
    let session_id = session.id.clone();

    request.extensions_mut().insert(session);
    let response = next.run(request).await;

    if !is_new {
        return response;
    }

    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    (jar.add(cookie), response).into_response()
}

/// Picks the submitted token: the body field wins, then the `X-CSRF-Token` header.
#[must_use]
pub fn submitted_token(headers: &HeaderMap, body_token: Option<&str>) -> Option<String> {
    body_token
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(CSRF_HEADER)
                .and_then(|value| value.to_str().ok())
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
}

/// Checks a submitted token against the session's token.
///
/// # Errors
/// Returns [`Error::InvalidCsrfToken`] when the token is missing or does not match,
/// unless `disabled` is set.
pub fn verify_csrf(disabled: bool, session: &Session, submitted: Option<&str>) -> Result<()> {
    if disabled {
        return Ok(());
    }
    match submitted {
        Some(token) if token == session.csrf_token => Ok(()),
        _ => Err(Error::InvalidCsrfToken),
    }
}
