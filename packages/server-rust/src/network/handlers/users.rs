//! Users API: streamed list, lookup, simulated create/delete, and the two
//! demonstration failure endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use fluxdemo_core::{User, UserDirectory};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tracing::info;

use super::{parse_id, AppState};
use crate::network::error::ApiError;
use crate::service::{Deferred, StreamingEmitter};

/// `GET /api/users`: the directory as Server-Sent Events, one user per
/// event, each preceded by the stream delay. A disconnecting client drops
/// the stream and the remaining emissions never happen.
pub async fn list_users(
    State(state): State<AppState>,
) -> Sse<BoxStream<'static, Result<Event, axum::Error>>> {
    let users = UserDirectory::api().users().to_vec();
    let stream = StreamingEmitter::new(users, state.config.stream_delay)
        .into_stream()
        .map(|user: User| {
            info!(user = %user.name, "Streaming user: {}", user.name);
            Event::default().json_data(&user)
        })
        .boxed();
    Sse::new(stream)
}

/// `GET /api/users/{id}`: the user as JSON, or 200 with an empty body.
pub async fn get_user(id: Result<Path<String>, PathRejection>) -> Result<Response, ApiError> {
    let id = parse_id(id)?;
    Ok(match UserDirectory::api().find(id) {
        Some(user) => Json(user.clone()).into_response(),
        None => StatusCode::OK.into_response(),
    })
}

/// `POST /api/users`: echoes the body after the create delay. Nothing is stored.
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<User>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let Json(user) =
        payload.map_err(|rejection| ApiError::input(rejection.body_text(), rejection))?;
    let user = Deferred::new(user, state.config.create_delay).resolve().await;
    Ok(Json(user))
}

/// `DELETE /api/users/{id}`: accepted and ignored.
pub async fn delete_user(id: Result<Path<String>, PathRejection>) -> Result<StatusCode, ApiError> {
    let id = parse_id(id)?;
    info!(id, "delete requested; directory is immutable");
    Ok(StatusCode::OK)
}

pub async fn test_error() -> Result<String, ApiError> {
    Err(ApiError::runtime("This is a test error for demonstration"))
}

pub async fn test_bad_request() -> Result<String, ApiError> {
    Err(ApiError::bad_request("Invalid parameter provided"))
}

/// Fallback for unmatched paths; rendered by the boundary intercept.
pub async fn route_not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::route_not_found(&method, uri.path())
}

/// Fallback for matched paths with an unsupported method.
pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::method_not_allowed(&method)
}
