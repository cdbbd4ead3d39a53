use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use media_core::{
    canonicalize, classify, resolve, AssetKind, AssetProbe, AssetRenderer, BlobKind, EngineConfig,
    ErrorKind, FailureReason, LoadStatus, MediaEngine, MediaSource, MemorySuccessCache,
    MountOptions, ProbeError, ProbeResponse, ProductId, ProductMedia, RenderOutcome, SuccessCache,
};

/// Renders by canonical URL; anything unlisted never completes.
#[derive(Default)]
struct MapRenderer {
    outcomes: Mutex<HashMap<String, RenderOutcome>>,
    calls: AtomicUsize,
}

impl MapRenderer {
    fn with(self, url: &str, outcome: RenderOutcome) -> Self {
        self.outcomes.lock().unwrap().insert(url.to_string(), outcome);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetRenderer for MapRenderer {
    async fn render(&self, url: &str, _kind: AssetKind) -> RenderOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcomes.lock().unwrap().get(&canonicalize(url)).cloned();
        match outcome {
            Some(o) => o,
            None => std::future::pending().await,
        }
    }
}

struct StaticProbe {
    status: u16,
    content_type: Option<&'static str>,
    calls: AtomicUsize,
}

impl StaticProbe {
    fn new(status: u16, content_type: Option<&'static str>) -> Self {
        Self {
            status,
            content_type,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AssetProbe for StaticProbe {
    async fn probe(&self, _url: &str) -> Result<ProbeResponse, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProbeResponse::new(self.status, self.content_type))
    }
}

const ORIGIN: &str = "https://shop.example.com";

fn engine(
    renderer: Arc<MapRenderer>,
    probe: Arc<StaticProbe>,
    cache: Arc<dyn SuccessCache>,
) -> MediaEngine {
    let config = EngineConfig::default()
        .with_origin(ORIGIN)
        .with_load_timeout(3000);
    MediaEngine::new(config, cache, renderer, probe)
}

fn pid(id: i64) -> ProductId {
    ProductId::new(id).unwrap()
}

fn product_from_mask(mask: u8) -> ProductMedia {
    let mut p = ProductMedia::new(pid(77));
    if mask & 0b00001 != 0 {
        p = p.with_image_file("/static/a.jpg");
    }
    if mask & 0b00010 != 0 {
        p = p.with_image_data();
    }
    if mask & 0b00100 != 0 {
        p = p.with_pdf_file("/static/manual.pdf");
    }
    if mask & 0b01000 != 0 {
        p = p.with_pdf_data();
    }
    if mask & 0b10000 != 0 {
        p = p.with_storage_url("http://cdn.example.com/b.png");
    }
    p
}

fn expected_for_mask(mask: u8) -> MediaSource {
    match mask.trailing_zeros() {
        0 => MediaSource::LocalFile { path: "/static/a.jpg".into() },
        1 => MediaSource::DatabaseBlob { product_id: pid(77), kind: BlobKind::Image },
        2 => MediaSource::LocalFile { path: "/static/manual.pdf".into() },
        3 => MediaSource::DatabaseBlob { product_id: pid(77), kind: BlobKind::Document },
        4 => MediaSource::ExternalUrl { url: "http://cdn.example.com/b.png".into() },
        _ => MediaSource::None,
    }
}

#[test]
fn priority_holds_for_every_field_combination() {
    for mask in 0u8..32 {
        let product = product_from_mask(mask);
        let resolved = resolve(&product);
        assert_eq!(resolved.source, expected_for_mask(mask), "mask {:05b}", mask);
        assert_eq!(resolve(&product), resolved, "mask {:05b} not idempotent", mask);
    }
}

#[test]
fn resolved_kind_follows_field() {
    assert_eq!(resolve(&product_from_mask(0b00001)).kind, AssetKind::Image);
    assert_eq!(resolve(&product_from_mask(0b00010)).kind, AssetKind::Image);
    assert_eq!(resolve(&product_from_mask(0b00100)).kind, AssetKind::Document);
    assert_eq!(resolve(&product_from_mask(0b01000)).kind, AssetKind::Document);
    assert_eq!(resolve(&product_from_mask(0b10000)).kind, AssetKind::Image);
    assert_eq!(resolve(&product_from_mask(0)).kind, AssetKind::Unknown);
}

#[test]
fn local_file_beats_storage_url() {
    let product = ProductMedia::new(pid(1))
        .with_image_file("/a.jpg")
        .with_storage_url("http://x/b.jpg");
    let resolved = resolve(&product);
    assert_eq!(resolved.source, MediaSource::LocalFile { path: "/a.jpg".into() });
    assert_eq!(resolved.kind, AssetKind::Image);
}

#[test]
fn storage_url_document() {
    let product = ProductMedia::new(pid(1)).with_storage_url("http://cdn/doc.pdf");
    let resolved = resolve(&product);
    assert_eq!(
        resolved.source,
        MediaSource::ExternalUrl { url: "http://cdn/doc.pdf".into() }
    );
    assert_eq!(classify("http://cdn/doc.pdf"), AssetKind::Document);
}

#[tokio::test(start_paused = true)]
async fn html_fallback_from_probe_is_not_found() {
    let url = format!("{}/api/products/3/img", ORIGIN);
    let renderer = Arc::new(
        MapRenderer::default().with(&url, RenderOutcome::Failure(FailureReason::Decode("bad".into()))),
    );
    let probe = Arc::new(StaticProbe::new(200, Some("text/html")));
    let engine = engine(renderer, probe.clone(), Arc::new(MemorySuccessCache::new()));

    let product = ProductMedia::new(pid(3)).with_image_data();
    let session = engine.mount(&product).expect("product has media");
    let state = session.settled().await;

    assert_eq!(state.status, LoadStatus::Error);
    assert_eq!(state.error_kind, Some(ErrorKind::NotFound));
    assert!(!state.retry_allowed());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn remount_with_cache_buster_hits_cache() {
    let url = format!("{}/static/a.jpg", ORIGIN);
    let renderer = Arc::new(MapRenderer::default().with(&url, RenderOutcome::Success));
    let probe = Arc::new(StaticProbe::new(200, Some("image/jpeg")));
    let engine = engine(renderer.clone(), probe, Arc::new(MemorySuccessCache::new()));

    let first = engine.mount_url(url.clone(), AssetKind::Image);
    assert_eq!(first.settled().await.status, LoadStatus::Loaded);
    drop(first);
    assert_eq!(renderer.calls(), 1);

    let second = engine.mount_url(format!("{}?v=999", url), AssetKind::Image);
    let mut rx = second.subscribe();
    let state = second.settled().await;
    assert_eq!(state.status, LoadStatus::Loaded);
    assert_eq!(renderer.calls(), 1);
    assert_ne!(rx.borrow_and_update().status, LoadStatus::Loading);

    let stats = engine.stats().snapshot();
    assert_eq!(stats.mounts, 2);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.loads, 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_sessions_time_out_independently() {
    let renderer = Arc::new(
        MapRenderer::default().with(&format!("{}/fast.jpg", ORIGIN), RenderOutcome::Success),
    );
    let probe = Arc::new(StaticProbe::new(404, None));
    let engine = engine(renderer, probe, Arc::new(MemorySuccessCache::new()));

    let sessions: Vec<_> = (0..8)
        .map(|i| {
            let path = if i == 0 { "fast.jpg".to_string() } else { format!("slow-{}.jpg", i) };
            engine.mount_url(format!("{}/{}", ORIGIN, path), AssetKind::Image)
        })
        .collect();

    let states = futures::future::join_all(sessions.iter().map(|s| s.settled())).await;
    assert_eq!(states[0].status, LoadStatus::Loaded);
    for state in &states[1..] {
        assert_eq!(state.error_kind, Some(ErrorKind::Timeout));
    }
    assert_eq!(engine.stats().snapshot().timeouts, 7);
}

#[tokio::test(start_paused = true)]
async fn manual_retry_after_regression_invalidates_cache() {
    let url = format!("{}/static/a.jpg", ORIGIN);
    let cache: Arc<dyn SuccessCache> = Arc::new(MemorySuccessCache::new());
    cache.mark_loaded(&url);
    let renderer = Arc::new(MapRenderer::default().with(
        &url,
        RenderOutcome::Failure(FailureReason::Network("connection reset".into())),
    ));
    let probe = Arc::new(StaticProbe::new(503, None));
    let engine = engine(renderer, probe, cache.clone());

    let session = engine.mount_url(url.clone(), AssetKind::Image);
    assert_eq!(session.settled().await.status, LoadStatus::Loaded);

    assert!(session.retry());
    let state = session
        .wait_until(|s| s.retry_count == 1 && s.is_settled())
        .await;
    assert_eq!(state.error_kind, Some(ErrorKind::Unknown));
    assert!(state.retry_allowed());
    assert!(!cache.has_loaded(&url));
}

#[tokio::test(start_paused = true)]
async fn product_without_media_has_no_session() {
    let engine = engine(
        Arc::new(MapRenderer::default()),
        Arc::new(StaticProbe::new(200, None)),
        Arc::new(MemorySuccessCache::new()),
    );
    assert!(engine.mount(&ProductMedia::new(pid(5))).is_none());
}

fn assert_elapsed(start: tokio::time::Instant, budget_ms: u64) {
    let elapsed = start.elapsed().as_millis() as u64;
    assert!(
        (budget_ms..budget_ms + 50).contains(&elapsed),
        "settled after {}ms, budget {}ms",
        elapsed,
        budget_ms
    );
}

#[tokio::test(start_paused = true)]
async fn mounts_on_one_engine_time_out_at_their_own_budgets() {
    let engine = engine(
        Arc::new(MapRenderer::default()),
        Arc::new(StaticProbe::new(200, None)),
        Arc::new(MemorySuccessCache::new()),
    );
    let start = tokio::time::Instant::now();

    let thumbnail = engine.mount_url_with(
        format!("{}/thumb.jpg", ORIGIN),
        AssetKind::Image,
        MountOptions::default().with_load_timeout(1000),
    );
    let viewer = engine.mount_url_with(
        format!("{}/full.jpg", ORIGIN),
        AssetKind::Image,
        MountOptions::default().with_load_timeout(5000),
    );
    let fallback = engine.mount_url(format!("{}/plain.jpg", ORIGIN), AssetKind::Image);

    let thumb_state = thumbnail.settled().await;
    assert_eq!(thumb_state.error_kind, Some(ErrorKind::Timeout));
    assert_elapsed(start, 1000);
    assert_eq!(viewer.state().status, LoadStatus::Loading);
    assert_eq!(fallback.state().status, LoadStatus::Loading);

    let fallback_state = fallback.settled().await;
    assert_eq!(fallback_state.error_kind, Some(ErrorKind::Timeout));
    assert_elapsed(start, 3000);
    assert_eq!(viewer.state().status, LoadStatus::Loading);

    let viewer_state = viewer.settled().await;
    assert_eq!(viewer_state.error_kind, Some(ErrorKind::Timeout));
    assert_elapsed(start, 5000);
}
