//! HTTP dispatcher: every request not served by the common routes goes through the entry point.

use crate::error::AppError;
use crate::handlers::Request;
use crate::response::Reply;
use crate::routes::common_routes;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{Method, Uri},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::{Map, Value};
use tower_http::limit::RequestBodyLimitLayer;

/// POST and PUT need a JSON object body.
fn parse_body(method: &Method, body: &[u8]) -> Result<Option<Map<String, Value>>, AppError> {
    if *method != Method::POST && *method != Method::PUT {
        return Ok(None);
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::BadRequest("request body is required".into()));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
        Err(e) => Err(AppError::BadRequest(format!("invalid JSON body: {}", e))),
    }
}

async fn handle(state: &AppState, method: &Method, path: &str, body: &[u8]) -> Result<Reply, AppError> {
    let matched = state.entry.resolve(method, path)?;
    let mut req = Request::new(matched.params);
    if let Some(map) = parse_body(method, body)? {
        req = req.with_body(map);
    }
    let reply = matched.handler.call(state, req).await?;
    Ok(if *method == Method::POST { reply.created() } else { reply })
}

pub async fn dispatch(State(state): State<AppState>, method: Method, uri: Uri, body: Bytes) -> Response {
    let path = uri.path();
    let response = match handle(&state, &method, path, &body).await {
        Ok(reply) => reply.into_response(),
        Err(e) => e.into_response(),
    };
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        tracing::warn!(method = %method, path = %path, status = status.as_u16(), "request");
    } else {
        tracing::info!(method = %method, path = %path, status = status.as_u16(), "request");
    }
    response
}

/// Common routes plus the dispatcher as fallback, with the request body capped at `body_limit` bytes.
pub fn app(state: AppState, body_limit: usize) -> Router {
    let dispatcher = Router::new().fallback(dispatch).with_state(state.clone());
    common_routes(state)
        .merge(dispatcher)
        .layer(RequestBodyLimitLayer::new(body_limit))
}
