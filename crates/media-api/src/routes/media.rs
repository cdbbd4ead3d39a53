use axum::extract::{Query, State};
use axum::Json;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use media_core::{
    canonicalize, classify, AssetKind, LoadState, MediaEngine, MediaSource, MountOptions,
    ProductMedia,
};

use crate::error::ApiError;
use crate::state::AppState;

const MAX_BATCH: usize = 200;

#[derive(Serialize)]
pub struct ResolveResponse {
    pub source: MediaSource,
    pub kind: AssetKind,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub url: String,
}

#[derive(Serialize)]
pub struct ClassifyResponse {
    pub url: String,
    pub canonical_url: String,
    pub kind: AssetKind,
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub product_id: i64,
    pub source: MediaSource,
    pub kind: AssetKind,
    /// `none` when the product has no media, otherwise the load status.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<LoadState>,
    pub settled: bool,
    pub retry_allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-request overrides for `check` and `check/batch`.
#[derive(Debug, Default, Deserialize)]
pub struct CheckQuery {
    pub load_timeout_ms: Option<u64>,
}

impl CheckQuery {
    fn mount_options(&self) -> MountOptions {
        match self.load_timeout_ms {
            Some(ms) => MountOptions::default().with_load_timeout(ms),
            None => MountOptions::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchCheckRequest {
    pub products: Vec<ProductMedia>,
}

#[derive(Serialize)]
pub struct BatchCheckResponse {
    pub results: Vec<CheckResponse>,
}

/// POST /api/v1/resolve
pub async fn resolve_media(
    State(state): State<AppState>,
    Json(product): Json<ProductMedia>,
) -> Json<ResolveResponse> {
    let resolved = state.engine.resolve(&product);
    let url = state.engine.request_url(&resolved);
    Json(ResolveResponse {
        source: resolved.source,
        kind: resolved.kind,
        url,
    })
}

/// POST /api/v1/classify
pub async fn classify_url(Json(body): Json<ClassifyRequest>) -> Result<Json<ClassifyResponse>, ApiError> {
    if body.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url must not be empty".into()));
    }
    Ok(Json(ClassifyResponse {
        kind: classify(&body.url),
        canonical_url: canonicalize(&body.url),
        url: body.url,
    }))
}

/// POST /api/v1/check[?load_timeout_ms=]
pub async fn check_media(
    State(state): State<AppState>,
    Query(query): Query<CheckQuery>,
    Json(product): Json<ProductMedia>,
) -> Json<CheckResponse> {
    Json(check_product(&state.engine, &product, query.mount_options()).await)
}

/// POST /api/v1/check/batch[?load_timeout_ms=]
pub async fn check_batch(
    State(state): State<AppState>,
    Query(query): Query<CheckQuery>,
    Json(body): Json<BatchCheckRequest>,
) -> Result<Json<BatchCheckResponse>, ApiError> {
    if body.products.is_empty() {
        return Err(ApiError::BadRequest("products array must not be empty".into()));
    }
    if body.products.len() > MAX_BATCH {
        return Err(ApiError::BadRequest(format!(
            "at most {} products per batch",
            MAX_BATCH
        )));
    }

    let options = query.mount_options();
    let results = join_all(
        body.products
            .iter()
            .map(|p| check_product(&state.engine, p, options)),
    )
    .await;

    Ok(Json(BatchCheckResponse { results }))
}

async fn check_product(
    engine: &MediaEngine,
    product: &ProductMedia,
    options: MountOptions,
) -> CheckResponse {
    let resolved = engine.resolve(product);
    let product_id = product.id.get();

    let Some(session) = engine.mount_resolved_with(&resolved, options) else {
        return CheckResponse {
            product_id,
            source: resolved.source,
            kind: resolved.kind,
            status: "none".into(),
            state: None,
            settled: true,
            retry_allowed: false,
            message: Some("No media available".into()),
        };
    };

    let state = match tokio::time::timeout(engine.settle_budget_with(options), session.settled()).await {
        Ok(state) => state,
        Err(_) => {
            warn!(product_id, "Asset check did not settle within budget");
            session.state()
        }
    };

    CheckResponse {
        product_id,
        source: resolved.source,
        kind: resolved.kind,
        status: state.status.to_string(),
        settled: state.is_settled(),
        retry_allowed: state.retry_allowed(),
        message: state.error_kind.map(|k| k.message().to_string()),
        state: Some(state),
    }
}
