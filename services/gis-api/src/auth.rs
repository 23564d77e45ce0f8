//! Session gate backed by an external auth service.
//!
//! Every gated request forwards its `Cookie` header to
//! `GET {auth_base}/api/auth/check`; the service answers
//! `{ "isAuthenticated": bool, ... }`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, OriginalUri, Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, warn};

use crate::state::AppState;

const AUTH_CHECK_PATH: &str = "/api/auth/check";
const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// The signed-in user, available to handlers as a request extension.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    /// Payload returned by the auth service.
    #[serde(flatten)]
    pub session: Map<String, Value>,
    pub ip: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub forwarded_for: Option<String>,
}

/// Result of a session check.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCheck {
    Authenticated(Map<String, Value>),
    Anonymous,
}

/// Why a session check could not be answered.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthFailure {
    /// The auth service answered 404 for the check endpoint.
    EndpointNotFound,
    /// Network error, timeout, other status or malformed body.
    Unavailable(String),
}

/// Ask the auth service whether `cookie` belongs to a signed-in session.
pub async fn check_session(
    client: &reqwest::Client,
    auth_base: &str,
    cookie: &str,
) -> Result<SessionCheck, AuthFailure> {
    let response = client
        .get(format!("{}{}", auth_base, AUTH_CHECK_PATH))
        .header("Cookie", cookie)
        .header("X-Requested-With", "XMLHttpRequest")
        .timeout(AUTH_TIMEOUT)
        .send()
        .await
        .map_err(|e| AuthFailure::Unavailable(e.to_string()))?;

    let status = response.status();
    if status.as_u16() == 404 {
        return Err(AuthFailure::EndpointNotFound);
    }
    if !status.is_success() {
        return Err(AuthFailure::Unavailable(format!(
            "Auth check returned {}",
            status
        )));
    }

    let body: Map<String, Value> = response
        .json()
        .await
        .map_err(|e| AuthFailure::Unavailable(format!("Invalid auth response: {}", e)))?;

    if body.get("isAuthenticated") == Some(&Value::Bool(true)) {
        Ok(SessionCheck::Authenticated(body))
    } else {
        Ok(SessionCheck::Anonymous)
    }
}

/// Login page that returns the browser to `original_uri` afterwards.
pub fn login_url(auth_base: &str, original_uri: &str) -> String {
    format!(
        "{}/Account/Login?returnUrl={}",
        auth_base,
        urlencoding::encode(original_uri)
    )
}

/// Middleware rejecting requests without a valid session.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let auth_base = state.config.auth.base_url.as_str();
    let cookie = request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    match check_session(&state.http, auth_base, &cookie).await {
        Ok(SessionCheck::Authenticated(session)) => {
            let ip = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string());
            let forwarded_for = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .or_else(|| ip.clone());

            request.extensions_mut().insert(AuthenticatedUser {
                session,
                ip,
                timestamp: Utc::now(),
                forwarded_for,
            });
            next.run(request).await
        }
        Ok(SessionCheck::Anonymous) => {
            let uri = request
                .extensions()
                .get::<OriginalUri>()
                .map(|OriginalUri(uri)| uri)
                .unwrap_or_else(|| request.uri());
            let original_uri = uri
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "message": "Unauthorized",
                    "loginUrl": login_url(auth_base, original_uri),
                    "code": "AUTH_REQUIRED",
                })),
            )
                .into_response()
        }
        Err(AuthFailure::EndpointNotFound) => {
            error!(
                method = %request.method(),
                path = %request.uri().path(),
                "Auth verification failed: endpoint not found"
            );
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "message": "Authentication endpoint not found",
                    "endpoint": format!("{}{}", auth_base, AUTH_CHECK_PATH),
                    "solution": "Verify: 1) the auth service is running, 2) the route is registered, 3) CORS is configured",
                })),
            )
                .into_response()
        }
        Err(AuthFailure::Unavailable(reason)) => {
            warn!(
                method = %request.method(),
                path = %request.uri().path(),
                error = %reason,
                "Auth verification failed"
            );
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "message": "Authentication service unavailable" })),
            )
                .into_response()
        }
    }
}
