use std::fmt::Write;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use media_core::ErrorKind;

use crate::state::AppState;

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut out = String::with_capacity(2048);
    let engine = &state.engine;
    let stats = engine.stats().snapshot();
    let config = engine.config();

    writeln!(out, "# TYPE media_engine_info info").unwrap();
    writeln!(out, "# HELP media_engine_info Information about the media engine").unwrap();
    writeln!(
        out,
        "media_engine_info{{origin=\"{}\",proxy_external_images=\"{}\",created=\"{}\"}} 1",
        config.origin,
        config.proxy_external_images,
        engine.created_at().to_rfc3339()
    )
    .unwrap();

    let counters = [
        ("media_engine_mounts", "Asset sessions mounted", stats.mounts),
        ("media_engine_cache_hits", "Mounts served from the success cache", stats.cache_hits),
        ("media_engine_loads", "Attempts that finished rendering", stats.loads),
        ("media_engine_retries", "Retries, manual and automatic", stats.retries),
        ("media_engine_probes", "Diagnostic probes issued", stats.probes),
    ];
    for (name, help, value) in counters {
        writeln!(out, "# TYPE {} counter", name).unwrap();
        writeln!(out, "# HELP {} {}", name, help).unwrap();
        writeln!(out, "{}_total {}", name, value).unwrap();
    }

    writeln!(out, "# TYPE media_engine_errors counter").unwrap();
    writeln!(out, "# HELP media_engine_errors Settled errors by kind").unwrap();
    for kind in ErrorKind::ALL {
        writeln!(
            out,
            "media_engine_errors_total{{kind=\"{}\"}} {}",
            kind.as_str(),
            stats.errors(kind)
        )
        .unwrap();
    }

    writeln!(out, "# TYPE media_engine_cache_entries gauge").unwrap();
    writeln!(out, "# HELP media_engine_cache_entries URLs known to have loaded").unwrap();
    writeln!(out, "media_engine_cache_entries {}", engine.cache().len()).unwrap();

    writeln!(out, "# TYPE media_engine_uptime_seconds gauge").unwrap();
    writeln!(out, "# HELP media_engine_uptime_seconds Time since the engine was created").unwrap();
    let uptime = (chrono::Utc::now() - engine.created_at()).num_milliseconds() as f64 / 1000.0;
    writeln!(out, "media_engine_uptime_seconds {:.3}", uptime).unwrap();

    writeln!(out, "# EOF").unwrap();

    (
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        out,
    )
}
