mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, EnvFilter};

use media_core::{
    classify, AssetKind, EngineConfig, LoadState, LoadStatus, MediaEngine, MediaSource,
    ProductMedia, ResolvedMedia, MAX_AUTO_RETRY_LIMIT,
};

fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");

    // Called once by clap; the string lives for the whole process anyway.
    if GIT_HASH.is_empty() {
        VERSION
    } else {
        Box::leak(format!("{VERSION} ({GIT_HASH})").into_boxed_str())
    }
}

/// Product media engine: resolve, load and diagnose storefront assets.
#[derive(Parser)]
#[command(name = "media-engine", version = version_string(), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Listen address (e.g. 0.0.0.0:8080). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Load one asset and report how it settles (no API server).
    Check {
        /// Asset URL to load.
        #[arg(required_unless_present = "product", conflicts_with = "product")]
        url: Option<String>,

        /// Product media record as JSON, resolved before loading.
        #[arg(long)]
        product: Option<String>,

        /// Origin serving static files and product media endpoints.
        #[arg(long)]
        origin: Option<String>,

        /// Load timeout in milliseconds.
        #[arg(long, default_value_t = 5000)]
        timeout: u64,

        /// Probe timeout in milliseconds.
        #[arg(long, default_value_t = 5000)]
        probe_timeout: u64,

        /// Automatic retries for timeouts and unclassified failures (0-10).
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_AUTO_RETRY_LIMIT)))]
        retries: u32,

        /// Fetch external images directly instead of through the proxy.
        #[arg(long, default_value_t = false)]
        no_proxy: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, config } => {
            run_serve(listen, config).await;
        }
        Commands::Check {
            url,
            product,
            origin,
            timeout,
            probe_timeout,
            retries,
            no_proxy,
        } => {
            fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .init();

            let mut config = EngineConfig::default()
                .with_load_timeout(timeout)
                .with_probe_timeout(probe_timeout)
                .with_auto_retry_limit(retries)
                .with_proxy_external_images(!no_proxy);
            if let Some(origin) = origin {
                if let Err(e) = config::validate_origin(&origin) {
                    eprintln!("{} {}", style("error:").red().bold(), e);
                    std::process::exit(2);
                }
                config = config.with_origin(origin);
            }

            let target = match (url, product) {
                (Some(url), _) => CheckTarget::Url(url),
                (None, Some(json)) => match serde_json::from_str::<ProductMedia>(&json) {
                    Ok(p) => CheckTarget::Product(p),
                    Err(e) => {
                        eprintln!("{} invalid product JSON: {}", style("error:").red().bold(), e);
                        std::process::exit(2);
                    }
                },
                (None, None) => {
                    eprintln!("{} a url or --product is required", style("error:").red().bold());
                    std::process::exit(2);
                }
            };

            let code = run_check(config, target).await;
            std::process::exit(code);
        }
    }
}

async fn run_serve(listen_override: Option<SocketAddr>, config_path: Option<PathBuf>) {
    let app_config = if let Some(ref path) = config_path {
        match config::AppConfig::load(path) {
            Ok(c) => {
                init_tracing(&c.server.log_format);
                tracing::info!(path = %path.display(), "Loaded config file");
                c
            }
            Err(e) => {
                init_tracing("pretty");
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        }
    } else {
        init_tracing("pretty");
        config::AppConfig::default()
    };

    let listen = listen_override.unwrap_or(app_config.server.listen);
    let engine_config = app_config.engine.to_engine_config();
    let state = media_api::state::AppState::with_config(engine_config);

    tracing::info!(%listen, "Starting media engine API server");
    if let Err(e) = media_api::serve_with_state(listen, state, media_api::shutdown_signal()).await
    {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }

    tracing::info!("Shutdown complete");
}

enum CheckTarget {
    Url(String),
    Product(ProductMedia),
}

/// Returns the process exit code: 0 when the asset loaded.
async fn run_check(config: EngineConfig, target: CheckTarget) -> i32 {
    let engine = MediaEngine::from_config(config);

    println!("{} {}", style("media-engine").bold(), style(env!("CARGO_PKG_VERSION")).dim());

    let (session, url) = match target {
        CheckTarget::Url(url) => {
            let kind = classify(&url);
            println!("  {} {}", style("kind:   ").dim(), kind);
            (engine.mount_url(url.clone(), kind), url)
        }
        CheckTarget::Product(product) => {
            let resolved = engine.resolve(&product);
            println!("  {} {}", style("product:").dim(), product.id);
            println!("  {} {}", style("source: ").dim(), describe_source(&resolved));
            println!("  {} {}", style("kind:   ").dim(), resolved.kind);
            match (engine.mount_resolved(&resolved), engine.request_url(&resolved)) {
                (Some(session), Some(url)) => (session, url),
                _ => {
                    println!();
                    println!("  {}", style("No media available").yellow());
                    return 1;
                }
            }
        }
    };
    println!("  {} {}", style("url:    ").dim(), style(&url).bold());
    println!();

    let spinner = ProgressBar::new_spinner();
    if let Ok(s) = ProgressStyle::with_template("  {spinner} {wide_msg}") {
        spinner.set_style(s);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));

    let started = Instant::now();
    let mut rx = session.subscribe();
    let deadline = tokio::time::sleep(engine.settle_budget());
    tokio::pin!(deadline);
    let shutdown = media_api::shutdown_signal();
    tokio::pin!(shutdown);

    let state = loop {
        let current = rx.borrow_and_update().clone();
        spinner.set_message(describe_progress(&current));
        if current.is_settled() {
            break current;
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break session.state();
                }
            }
            _ = &mut deadline => break session.state(),
            _ = &mut shutdown => {
                spinner.finish_and_clear();
                println!("{}", style("Check cancelled.").dim());
                return 130;
            }
        }
    };
    spinner.finish_and_clear();

    let elapsed = started.elapsed().as_millis();
    match (state.status, state.error_kind) {
        (LoadStatus::Loaded, _) => {
            println!(
                "  {} in {}ms (retries: {})",
                style("LOADED").green().bold(),
                elapsed,
                state.retry_count
            );
            0
        }
        (LoadStatus::Error, Some(kind)) => {
            println!(
                "  {} {}  {}",
                style("ERROR").red().bold(),
                style(kind).red(),
                kind.message()
            );
            if let Some(ref reason) = state.failure {
                println!("  {} {}", style("cause:").dim(), reason);
            }
            let hint = if state.retry_allowed() {
                "retry may help"
            } else {
                "retrying will not help"
            };
            println!(
                "  {} settled after {}ms and {} retries, {}",
                style("note: ").dim(),
                elapsed,
                state.retry_count,
                hint
            );
            1
        }
        (status, _) => {
            println!(
                "  {} asset still {} after {}ms",
                style("UNSETTLED").yellow().bold(),
                status,
                elapsed
            );
            1
        }
    }
}

fn describe_source(resolved: &ResolvedMedia) -> String {
    match &resolved.source {
        MediaSource::LocalFile { path } => format!("local file {}", path),
        MediaSource::DatabaseBlob { product_id, kind } => {
            format!("database blob ({}) of product {}", AssetKind::from(*kind), product_id)
        }
        MediaSource::ExternalUrl { url } => format!("external url {}", url),
        MediaSource::None => "none".to_string(),
    }
}

fn describe_progress(state: &LoadState) -> String {
    match state.status {
        LoadStatus::Idle => "mounting".to_string(),
        LoadStatus::Loading if state.retry_count == 0 => "loading".to_string(),
        LoadStatus::Loading => format!("loading (retry {})", state.retry_count),
        LoadStatus::Loaded => "loaded".to_string(),
        LoadStatus::Error if state.probing => "failed, probing cause".to_string(),
        LoadStatus::Error => "failed".to_string(),
    }
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format {
        "json" => {
            fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt().with_env_filter(filter).init();
        }
    }
}
