pub mod cache;
pub mod media;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/resolve", post(media::resolve_media))
        .route("/classify", post(media::classify_url))
        .route("/check", post(media::check_media))
        .route("/check/batch", post(media::check_batch))
        .route(
            "/cache",
            get(cache::get_cache_entry).delete(cache::invalidate_cache),
        )
}
