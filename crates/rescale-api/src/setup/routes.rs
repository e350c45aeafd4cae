//! Route configuration and setup.

use crate::handlers::{health, upscale};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use rescale_core::Config;
use rescale_infra::{request_id_middleware, security_headers_middleware, SecurityHeadersConfig};
use std::sync::Arc;
use std::time::Duration;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    let security_headers_config = Arc::new(SecurityHeadersConfig::new(config.is_production()));

    let upload_limit = config.max_upload_size_bytes();
    let http_concurrency_limit = config.base.http_concurrency_limit;
    let request_timeout_secs = config.base.request_timeout_secs;
    tracing::info!(
        upload_limit,
        http_concurrency_limit,
        request_timeout_secs,
        "HTTP limits configured"
    );

    let app = Router::new()
        .route("/upscale", post(upscale::upscale_archive))
        .route("/health", get(health::health_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(TimeoutLayer::new(Duration::from_secs(request_timeout_secs)))
        .layer(RequestBodyLimitLayer::new(upload_limit))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn_with_state(
            security_headers_config,
            security_headers_middleware,
        ))
        .with_state(state);

    Ok(app)
}

/// Browser clients need these to read the download name and batch summary
fn exposed_headers() -> [HeaderName; 5] {
    [
        header::CONTENT_DISPOSITION,
        HeaderName::from_static("x-items-succeeded"),
        HeaderName::from_static("x-items-skipped"),
        HeaderName::from_static("x-items-failed"),
        HeaderName::from_static("x-request-id"),
    ]
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new().allow_origin(Any)
    } else {
        // "null" is the Origin sent by pages opened from file://
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    Ok(cors
        .allow_methods(methods)
        .allow_headers(Any)
        .expose_headers(exposed_headers()))
}
