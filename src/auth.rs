use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;

pub const ANONYMOUS_USER: &str = "anonymous";

/// Authenticated caller, inserted into request extensions by [`require_identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

/// Bearer token to user id table used by the identity gate.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    tokens: Arc<HashMap<String, String>>,
}

impl AuthState {
    /// Parses `token=user_id` pairs separated by commas. A bare token is its
    /// own user id.
    pub fn from_pairs(raw: &str) -> Self {
        let tokens = raw
            .split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| match pair.split_once('=') {
                Some((token, user)) => {
                    let token = token.trim();
                    let user = user.trim();
                    if token.is_empty() || user.is_empty() {
                        None
                    } else {
                        Some((token.to_string(), user.to_string()))
                    }
                }
                None => Some((pair.to_string(), pair.to_string())),
            })
            .collect();
        Self {
            tokens: Arc::new(tokens),
        }
    }

    /// Reads `MEDIA_VALUE_API_KEYS`. With no keys the gate lets every caller
    /// through as [`ANONYMOUS_USER`].
    pub fn from_env() -> Self {
        let raw = std::env::var("MEDIA_VALUE_API_KEYS").unwrap_or_default();
        let state = AuthState::from_pairs(&raw);
        if !state.enabled() {
            tracing::warn!("MEDIA_VALUE_API_KEYS not set; requests run as the anonymous user");
        }
        state
    }

    pub fn enabled(&self) -> bool {
        !self.tokens.is_empty()
    }

    pub fn user_for(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }
}

pub async fn require_identity(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let identity = if auth.enabled() {
        let user = extract_bearer_token(req.headers().get(AUTHORIZATION))
            .and_then(|token| auth.user_for(token));
        match user {
            Some(user) => Identity(user.to_string()),
            None => {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "error": "Authentication required" })),
                )
                    .into_response();
            }
        }
    } else {
        Identity(ANONYMOUS_USER.to_string())
    };

    req.extensions_mut().insert(identity);
    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
