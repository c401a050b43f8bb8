//! API Handlers
//!
//! HTTP request handlers for the cache admin endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use regex::Regex;

use crate::error::{CacheError, Result};
use crate::models::{
    CacheListResponse, CleanupResponse, DeleteResponse, GetResponse, HealthResponse,
    InvalidateRequest, KeysQuery, KeysResponse, MessageResponse, SetRequest, SetResponse,
    StatsResponse, TouchQuery,
};
use crate::registry::{CacheRegistry, SharedCache};

/// Number of most-read keys included in stats responses.
pub const TOP_KEYS_LIMIT: usize = 10;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CacheRegistry>,
}

impl AppState {
    pub fn new(registry: CacheRegistry) -> Self {
        Self::from_shared(Arc::new(registry))
    }

    /// Wraps a registry that other tasks (e.g. the cleanup sweep) also hold.
    pub fn from_shared(registry: Arc<CacheRegistry>) -> Self {
        Self { registry }
    }

    fn cache(&self, name: &str) -> Result<SharedCache> {
        self.registry
            .get(name)
            .ok_or_else(|| CacheError::UnknownCache(name.to_string()))
    }
}

async fn stats_for(cache: &SharedCache) -> StatsResponse {
    let cache = cache.read().await;
    StatsResponse {
        namespace: cache.namespace().to_string(),
        persistent: cache.is_persistent(),
        report: cache.stats(),
        top_keys: cache.top_keys(TOP_KEYS_LIMIT),
    }
}

/// Handler for GET /caches
pub async fn list_caches_handler(State(state): State<AppState>) -> Json<CacheListResponse> {
    let mut caches = Vec::with_capacity(state.registry.len());
    for (_, cache) in state.registry.iter() {
        caches.push(stats_for(cache).await);
    }
    Json(CacheListResponse { caches })
}

/// Handler for GET /caches/:name/stats
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StatsResponse>> {
    let cache = state.cache(&name)?;
    Ok(Json(stats_for(&cache).await))
}

/// Handler for GET /caches/:name/keys
///
/// `pattern` is a regular expression; an invalid one is a 400.
pub async fn keys_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<KeysQuery>,
) -> Result<Json<KeysResponse>> {
    let cache = state.cache(&name)?;
    let pattern = query
        .pattern
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| CacheError::InvalidRequest(format!("Invalid key pattern: {}", e)))?;

    let keys = cache.read().await.get_keys(pattern.as_ref());
    Ok(Json(KeysResponse {
        namespace: name,
        keys,
    }))
}

/// Handler for PUT /caches/:name/entries
pub async fn set_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let cache = state.cache(&name)?;
    let ttl = req.ttl();
    cache
        .write()
        .await
        .set_with_tags(req.key.clone(), req.value, ttl, req.tags)
        .await;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /caches/:name/entries/:key
///
/// Counts as a read: updates hit/miss stats and recency.
pub async fn get_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    let cache = state.cache(&name)?;
    let mut cache = cache.write().await;
    let value = cache
        .get(&key)
        .await
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;
    let ttl_remaining_ms = cache.ttl_remaining_ms(&key).unwrap_or(0);

    Ok(Json(GetResponse::new(key, value, ttl_remaining_ms)))
}

/// Handler for DELETE /caches/:name/entries/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    let cache = state.cache(&name)?;
    if !cache.write().await.delete(&key).await {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /caches/:name/entries/:key/touch
pub async fn touch_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
    Query(query): Query<TouchQuery>,
) -> Result<Json<MessageResponse>> {
    let cache = state.cache(&name)?;
    if !cache.write().await.touch(&key, query.ttl()).await {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(MessageResponse::new(format!(
        "Key '{}' refreshed",
        key
    ))))
}

/// Handler for POST /caches/:name/clear
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>> {
    let cache = state.cache(&name)?;
    cache.write().await.clear().await;

    Ok(Json(MessageResponse::new(format!(
        "Cache '{}' cleared",
        name
    ))))
}

/// Handler for POST /caches/:name/cleanup
pub async fn cleanup_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CleanupResponse>> {
    let cache = state.cache(&name)?;
    let removed = cache.write().await.cleanup().await;

    Ok(Json(CleanupResponse {
        namespace: name,
        removed,
    }))
}

/// Handler for POST /caches/:name/invalidate
///
/// Drops every entry carrying any of the given tags.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<CleanupResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let cache = state.cache(&name)?;
    let removed = cache.write().await.clear_by_tags(&req.tags).await;

    Ok(Json(CleanupResponse {
        namespace: name,
        removed,
    }))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
