use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    limit::RequestBodyLimitLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::config::Config;
use crate::errors::AppError;
use crate::handlers::{self, AppState};
use crate::security::{self, OriginAllowList};

/// Builds the HTTP surface: `/api/*` behind body-size and rate limits, the
/// health check outside them, and origin enforcement, CORS, security headers
/// and tracing around everything.
///
/// Rate limiting keys on the peer IP, so the router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_router(state: Arc<AppState>, config: &Config) -> Result<Router, AppError> {
    // Replenish one request every window/max; a full window's quota may burst.
    let window_ms = config
        .rate_limit_window_secs
        .checked_mul(1000)
        .ok_or_else(|| {
            AppError::Configuration("RATE_LIMIT_WINDOW_SECS is too large".to_string())
        })?;
    let replenish_ms = (window_ms / u64::from(config.rate_limit_max)).max(1);
    // Key on the socket peer; forwarding headers are client-controlled.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(replenish_ms)
            .burst_size(config.rate_limit_max)
            .key_extractor(PeerIpKeyExtractor)
            .use_headers()
            .finish()
            .ok_or_else(|| {
                AppError::Configuration("Invalid rate limit configuration".to_string())
            })?,
    );

    let allow_list = Arc::new(OriginAllowList::new(config.allowed_origins.iter().cloned()));
    let cors = allow_list.cors_layer()?;

    let api_routes = Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/lead", post(handlers::lead))
        .layer(
            ServiceBuilder::new()
                // Request size limit (prevents memory exhaustion)
                .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
                // Rate limiting per client IP
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        )
        .layer(from_fn(security::rate_limit_json_body));

    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .with_state(state)
        .layer(cors)
        .layer(from_fn_with_state(allow_list, security::enforce_origin));

    for (name, value) in security::security_headers() {
        app = app.layer(SetResponseHeaderLayer::if_not_present(name, value));
    }

    Ok(app.layer(TraceLayer::new_for_http()))
}
