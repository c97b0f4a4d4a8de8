//! Static files and the server-render fallback.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{
            ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE,
        },
        uri::PathAndQuery,
    },
    response::{IntoResponse, Response},
};
use tower_http::services::fs::ServeFileSystemResponseBody;

use crate::{ProxyError, ProxyState};

/// Prefix of content-hashed build output.
pub const ASSET_PREFIX: &str = "/assets";
/// Cache policy for content-hashed files.
pub const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";
/// Largest request body passed to the render origin.
const MAX_RENDER_BODY: usize = 10 * 1024 * 1024;

/// Long-lived cache header for successfully served hashed assets.
pub fn immutable_cache(response: &Response<ServeFileSystemResponseBody>) -> Option<HeaderValue> {
    response
        .status()
        .is_success()
        .then(|| HeaderValue::from_static(IMMUTABLE_CACHE))
}

/// Handler for everything no static file answers.
///
/// Without a configured render origin this is a plain 404.
pub async fn render_fallback(State(state): State<Arc<ProxyState>>, req: Request) -> Response {
    let Some(origin) = state.config.ssr_origin.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match render(&state.http, origin, req).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Server-render request failed: {e}");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

async fn render(http: &reqwest::Client, origin: &str, req: Request) -> Result<Response, ProxyError> {
    let (parts, body) = req.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map_or("/", PathAndQuery::as_str);
    let url = format!("{}{path}", origin.trim_end_matches('/'));
    let body = axum::body::to_bytes(body, MAX_RENDER_BODY)
        .await
        .map_err(|e| ProxyError::Body(e.to_string()))?;

    let mut forwarded = HeaderMap::new();
    for name in [ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE] {
        for value in parts.headers.get_all(&name) {
            forwarded.append(name.clone(), value.clone());
        }
    }

    tracing::debug!(method = %parts.method, %url, "Rendering on origin");
    let upstream = http
        .request(parts.method, url)
        .headers(forwarded)
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let mut headers = HeaderMap::new();
    for name in [CONTENT_TYPE, CACHE_CONTROL, LOCATION, SET_COOKIE] {
        for value in upstream.headers().get_all(&name) {
            headers.append(name.clone(), value.clone());
        }
    }
    let body: Bytes = upstream.bytes().await?;
    Ok((status, headers, body).into_response())
}
