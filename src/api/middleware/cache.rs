//! Response cache middleware
//!
//! Mount per route with `route_layer(from_fn_with_state(policy, cache_response))`.
//! GET responses with status 200 and a JSON body are stored under
//! `METHOD:user:original_url`; later identical requests are answered from the
//! cache without running the handler. Bodies are stored as the exact bytes the
//! handler produced. The cache never fails or alters a request.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{OriginalUri, State},
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use futures::stream::{self, StreamExt};
use serde::de::IgnoredAny;
use tracing::{debug, info, warn};

use crate::domain::cache::{KeySelector, ResponseCacheKey};
use crate::infrastructure::observability::{
    record_cache_bypass, record_cache_invalidation, record_cache_lookup, record_cache_store,
};
use crate::infrastructure::services::CacheService;

/// Largest response body buffered for caching (1 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Identity of the caller, inserted as a request extension by the auth layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
}

impl AuthenticatedUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Per-route caching policy
#[derive(Debug, Clone)]
pub struct CachePolicy {
    cache: Arc<CacheService>,
    ttl: Duration,
    max_body_bytes: usize,
}

impl CachePolicy {
    /// Policy using the service's default TTL
    pub fn new(cache: Arc<CacheService>) -> Self {
        let ttl = cache.default_ttl();
        Self {
            cache,
            ttl,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Responses larger than this stream through without being cached
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}

/// Serves cached GET responses and stores fresh successful JSON ones
pub async fn cache_response(
    State(policy): State<CachePolicy>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    if !policy.cache.is_connected() {
        record_cache_bypass();
        return next.run(request).await;
    }

    let key = cache_key(&request).to_string();

    match policy.cache.get_raw(&key).await {
        Some(body) if is_valid_json(&body) => {
            record_cache_lookup(true);
            debug!(key = %key, "Serving response from cache");
            return cached_response(body);
        }
        Some(_) => warn!(key = %key, "Cached entry is not valid JSON, refreshing"),
        None => {}
    }

    record_cache_lookup(false);

    let response = next.run(request).await;

    if response.status() != StatusCode::OK || !is_json(&response) {
        return response;
    }

    if declared_length(&response).is_some_and(|len| len > policy.max_body_bytes) {
        debug!(key = %key, "Response body over the cache limit, not caching");
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match buffer_body(body, policy.max_body_bytes).await {
        Buffered::Complete(bytes) => bytes,
        Buffered::Passthrough(body) => {
            debug!(key = %key, "Response body not buffered, not caching");
            return Response::from_parts(parts, body);
        }
    };

    match std::str::from_utf8(&bytes) {
        Ok(text) if is_valid_json(text) => {
            let cache = Arc::clone(&policy.cache);
            let ttl = policy.ttl;
            let text = text.to_owned();

            tokio::spawn(async move {
                if cache.set_raw(&key, &text, Some(ttl)).await {
                    record_cache_store();
                }
            });
        }
        _ => debug!(key = %key, "Response is not valid JSON, not caching"),
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// Deletes every entry matching `pattern`, returning how many were removed
pub async fn invalidate_cache(cache: &CacheService, pattern: &str) -> usize {
    let deleted = cache.del(pattern).await;
    record_cache_invalidation(deleted);

    info!(pattern = %pattern, deleted, "Invalidated cached responses");
    deleted
}

/// Deletes every entry cached for `user_id`, across methods and endpoints
pub async fn invalidate_user_cache(cache: &CacheService, user_id: &str) -> usize {
    invalidate_selected(cache, KeySelector::User(user_id.to_string())).await
}

/// Deletes every GET entry whose URL starts with `endpoint`, for all users
pub async fn invalidate_endpoint_cache(cache: &CacheService, endpoint: &str) -> usize {
    invalidate_selected(cache, KeySelector::Endpoint(endpoint.to_string())).await
}

async fn invalidate_selected(cache: &CacheService, selector: KeySelector) -> usize {
    let deleted = cache.del_selected(&selector).await;
    record_cache_invalidation(deleted);

    info!(pattern = %selector.pattern(), deleted, "Invalidated cached responses");
    deleted
}

fn cache_key(request: &Request<Body>) -> ResponseCacheKey {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or_else(|| request.uri());

    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.id.as_str());

    ResponseCacheKey::new(request.method().as_str(), user, url)
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

fn is_valid_json(text: &str) -> bool {
    serde_json::from_str::<IgnoredAny>(text).is_ok()
}

fn declared_length(response: &Response) -> Option<usize> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

enum Buffered {
    Complete(Bytes),
    /// Over the limit or failed mid-stream; replays what was read, then the rest
    Passthrough(Body),
}

/// Reads at most `limit` bytes; anything else is handed back as an equivalent body
async fn buffer_body(body: Body, limit: usize) -> Buffered {
    let mut rest = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut size = 0usize;

    while let Some(frame) = rest.next().await {
        match frame {
            Ok(chunk) => {
                size += chunk.len();
                chunks.push(chunk);

                if size > limit {
                    let read = stream::iter(chunks.into_iter().map(Ok));
                    return Buffered::Passthrough(Body::from_stream(read.chain(rest)));
                }
            }
            Err(e) => {
                debug!(error = %e, "Response body failed while buffering");
                let read = chunks.into_iter().map(Ok).chain(std::iter::once(Err(e)));
                return Buffered::Passthrough(Body::from_stream(stream::iter(read)));
            }
        }
    }

    Buffered::Complete(Bytes::from(chunks.concat()))
}

fn cached_response(body: String) -> Response {
    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    response
}
