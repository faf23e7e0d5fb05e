//! Authentication demonstration endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use fluxdemo_core::Principal;
use serde::Serialize;

pub const PUBLIC_MESSAGE: &str = "This is a public endpoint - no authentication required";
pub const PROTECTED_MESSAGE: &str = "This is a protected endpoint - authentication required";
pub const ADMIN_MESSAGE: &str = "This is an admin endpoint - ADMIN role required";

pub async fn public_endpoint() -> &'static str {
    PUBLIC_MESSAGE
}

pub async fn protected_endpoint() -> &'static str {
    PROTECTED_MESSAGE
}

pub async fn admin_endpoint() -> &'static str {
    ADMIN_MESSAGE
}

#[derive(Debug, Serialize)]
struct Authority {
    authority: String,
}

#[derive(Debug, Serialize)]
struct Me {
    username: String,
    authorities: Vec<Authority>,
    authenticated: bool,
}

/// `GET /api/auth/me`: the authenticated caller, or an empty 200 when
/// security is disabled and no principal exists.
pub async fn current_user(principal: Option<Extension<Principal>>) -> Response {
    let Some(Extension(principal)) = principal else {
        return StatusCode::OK.into_response();
    };
    Json(Me {
        authorities: principal
            .roles
            .iter()
            .map(|role| Authority {
                authority: role.authority(),
            })
            .collect(),
        username: principal.username,
        authenticated: true,
    })
    .into_response()
}
