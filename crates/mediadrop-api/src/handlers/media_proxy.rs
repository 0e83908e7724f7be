//! Media proxy
//!
//! `GET /proxy/{*url}` serves remote media through the on-disk cache. The
//! target may be written `https://host/p`, `https:/host/p` or `https/host/p`;
//! the inbound query string is passed through to the target.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, RawQuery, Request, State},
    http::{header, HeaderMap, HeaderName},
    response::Response,
};
use mediadrop_services::{normalize_target_url, CachedMedia};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Upstream headers that describe the upstream connection rather than the media.
const DROPPED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

fn is_forwardable(name: &HeaderName) -> bool {
    !DROPPED_HEADERS.contains(&name.as_str())
}

fn forward_headers(upstream: &HeaderMap, response: &mut HeaderMap) {
    for (name, value) in upstream.iter().filter(|(name, _)| is_forwardable(name)) {
        response.append(name.clone(), value.clone());
    }
}

#[tracing::instrument(skip(state, request))]
pub async fn proxy_media(
    State(state): State<Arc<AppState>>,
    Path(url): Path<String>,
    RawQuery(query): RawQuery,
    request: Request,
) -> Result<Response, HttpAppError> {
    let target = normalize_target_url(&url, query.as_deref())?;

    let mut response = match state.proxy.cache.fetch_or_serve(&target).await? {
        CachedMedia::Hit { path, content_type } => {
            let mime: mime::Mime = content_type
                .parse()
                .expect("cached content type is a valid MIME type");
            // ServeFile answers Range and conditional requests from the cached file.
            let served = match ServeFile::new_with_mime(&path, &mime).oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            served.map(Body::new)
        }
        CachedMedia::Fetched {
            status,
            headers,
            body,
            commit: _,
        } => {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            forward_headers(&headers, response.headers_mut());
            response
        }
    };

    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, state.proxy.cache_control.clone());

    Ok(response)
}
