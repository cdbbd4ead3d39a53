use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use media_core::canonicalize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CacheQuery {
    pub url: Option<String>,
}

#[derive(Serialize)]
pub struct CacheEntryResponse {
    pub url: String,
    pub canonical_url: String,
    pub loaded: bool,
}

#[derive(Serialize)]
pub struct InvalidateResponse {
    pub message: String,
    pub removed: usize,
}

/// GET /api/v1/cache?url=
pub async fn get_cache_entry(
    State(state): State<AppState>,
    Query(query): Query<CacheQuery>,
) -> Result<Json<CacheEntryResponse>, ApiError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("url query parameter is required".into()))?;

    let loaded = state.engine.cache().has_loaded(&url);
    Ok(Json(CacheEntryResponse {
        canonical_url: canonicalize(&url),
        url,
        loaded,
    }))
}

/// DELETE /api/v1/cache[?url=]
///
/// Without `url`, every entry is dropped.
pub async fn invalidate_cache(
    State(state): State<AppState>,
    Query(query): Query<CacheQuery>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let cache = state.engine.cache();

    match query.url {
        Some(url) => {
            if !cache.has_loaded(&url) {
                return Err(ApiError::NotFound(format!(
                    "No cache entry for {}",
                    canonicalize(&url)
                )));
            }
            cache.invalidate(&url);
            info!(url = %canonicalize(&url), "Cache entry invalidated via API");
            Ok(Json(InvalidateResponse {
                message: "Cache entry invalidated".into(),
                removed: 1,
            }))
        }
        None => {
            let removed = cache.len();
            cache.clear();
            info!(removed, "Success cache cleared via API");
            Ok(Json(InvalidateResponse {
                message: "Cache cleared".into(),
                removed,
            }))
        }
    }
}
