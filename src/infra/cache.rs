use std::{num::NonZeroUsize, sync::Arc};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use lru::LruCache;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::application::purge::PurgeAction;

/// Rendered public responses keyed by path and query.
///
/// Holds at most `limit` entries; the least recently used one is evicted
/// when a new key arrives at capacity.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<RwLock<LruCache<String, CachedResponse>>>,
}

impl ResponseCache {
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(LruCache::new(limit))),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Response<Body>> {
        // LRU bookkeeping mutates on read.
        let mut guard = self.entries.write().await;
        guard.get(key).cloned().map(CachedResponse::into_response)
    }

    pub async fn put(&self, key: String, response: CachedResponse) {
        let mut guard = self.entries.write().await;
        let evicted = guard
            .push(key.clone(), response)
            .map(|(evicted, _)| evicted)
            .filter(|evicted| *evicted != key);
        if let Some(evicted) = evicted {
            debug!(
                target = "remote_purge::cache",
                evicted = %evicted,
                "response cache at capacity"
            );
        }
    }

    pub async fn store_response(
        &self,
        key: &str,
        response: Response,
    ) -> Result<Response, (Response, CacheStoreError)> {
        match buffer_response(response).await {
            Ok((rebuilt, cached)) => {
                self.put(key.to_string(), cached).await;
                Ok(rebuilt)
            }
            Err((rebuilt, error)) => Err((rebuilt, error)),
        }
    }

    /// Drop every entry, returning how many were evicted.
    pub async fn invalidate_all(&self) -> usize {
        let mut guard = self.entries.write().await;
        let evicted = guard.len();
        guard.clear();
        evicted
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[derive(Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &axum::http::HeaderMap, body: Bytes) -> Self {
        let mut stored_headers = Vec::with_capacity(headers.len());
        for (name, value) in headers.iter() {
            stored_headers.push((name.clone(), value.clone()));
        }

        Self {
            status,
            headers: stored_headers,
            body,
        }
    }

    fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.clear();
        for (name, value) in self.headers {
            headers.append(name, value);
        }

        response
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

pub fn should_store_response(response: &Response) -> bool {
    use axum::http::header;

    if !response.status().is_success() {
        return false;
    }

    if response.headers().contains_key(header::SET_COOKIE) {
        return false;
    }

    if response
        .headers()
        .get(header::CACHE_CONTROL)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("no-store"))
    {
        return false;
    }

    true
}

pub async fn buffer_response(
    response: Response,
) -> Result<(Response, CachedResponse), (Response, CacheStoreError)> {
    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let cached = CachedResponse::new(parts.status, &parts.headers, bytes.clone());
            let rebuilt = Response::from_parts(parts, Body::from(bytes));
            Ok((rebuilt, cached))
        }
        Err(error) => {
            let rebuilt = Response::from_parts(parts, Body::empty());
            Err((rebuilt, CacheStoreError::Buffer(error.to_string())))
        }
    }
}

/// Purge action that empties the local response cache.
#[derive(Clone)]
pub struct ResponseCachePurge {
    cache: ResponseCache,
}

impl ResponseCachePurge {
    pub fn new(cache: ResponseCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl PurgeAction for ResponseCachePurge {
    async fn trigger(&self) {
        let evicted = self.cache.invalidate_all().await;
        info!(
            target = "remote_purge::cache",
            evicted, "response cache invalidated"
        );
    }
}
