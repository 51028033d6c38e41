//! HTTP handlers for the valet REST endpoints

pub mod admin;
pub mod auth;
pub mod health;
pub mod openapi;
pub mod records;
pub mod system;

use std::time::Duration;

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts},
    http::{
        header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE},
        request::Parts,
        HeaderName, HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::{
    config::{CorsConfig, RateLimitConfig},
    error::{AppError, AppResult},
    models::agent::Agent,
    services::local_time,
    AppState,
};

/// Header carrying the shared secret of external schedulers
pub const CRON_KEY_HEADER: &str = "x-cron-key";

/// Room for the text fields sent alongside the photo
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Stored photo names are unique per record and never rewritten
const UPLOADS_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Added to every response that does not already carry them
const SECURITY_HEADERS: [(&str, &str); 7] = [
    (
        "content-security-policy",
        "default-src 'self'; img-src 'self' data:; script-src 'self'; \
         style-src 'self' 'unsafe-inline'; connect-src 'self'",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
];

static LOCALHOST_ORIGIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(localhost|127\.0\.0\.1)(:\d{1,5})?$").expect("valid localhost pattern")
});

/// Extractor for the agent behind a bearer token
pub struct AuthenticatedAgent(pub Agent);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedAgent {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let agent = state.services.auth.authenticate_token(token.trim()).await?;
        Ok(AuthenticatedAgent(agent))
    }
}

/// Extractor for an authenticated agent holding the manager flag
pub struct ManagerAgent(pub Agent);

#[async_trait]
impl FromRequestParts<AppState> for ManagerAgent {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedAgent(agent) = AuthenticatedAgent::from_request_parts(parts, state).await?;
        agent.require_manager()?;
        Ok(ManagerAgent(agent))
    }
}

/// Parse an optional `date` parameter, defaulting to today at the hotel
pub(crate) fn date_or_today(state: &AppState, date: Option<&str>) -> AppResult<NaiveDate> {
    match date.map(str::trim).filter(|d| !d.is_empty()) {
        Some(date) => local_time::parse_date(date),
        None => Ok(local_time::local_today(
            Utc::now(),
            state.services.reports.timezone(),
        )),
    }
}

/// Parse the mandatory `date` parameter of the report downloads
pub(crate) fn required_date(date: Option<&str>) -> AppResult<NaiveDate> {
    match date.map(str::trim).filter(|d| !d.is_empty()) {
        Some(date) => local_time::parse_date(date),
        None => Err(AppError::BadRequest(
            "date query param is required (YYYY-MM-DD)".to_string(),
        )),
    }
}

fn origin_allowed(config: &CorsConfig, origin: &str) -> bool {
    config.origins.iter().any(|allowed| allowed == origin)
        || (config.allow_localhost && LOCALHOST_ORIGIN.is_match(origin))
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let config = config.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &Parts| {
            origin
                .to_str()
                .map(|origin| origin_allowed(&config, origin))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(CRON_KEY_HEADER),
        ])
}

/// Limit requests per client address; clients are keyed by forwarding headers,
/// falling back to the peer address
fn with_rate_limit(api: Router, settings: &RateLimitConfig) -> Router {
    if settings.per_minute == 0 {
        return api;
    }

    let Some(config) = GovernorConfigBuilder::default()
        .per_millisecond(60_000 / u64::from(settings.per_minute))
        .burst_size(settings.per_minute)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
    else {
        tracing::warn!(per_minute = settings.per_minute, "Unusable rate limit; requests are not limited");
        return api;
    };
    let config: &'static _ = Box::leak(Box::new(config));

    let limiter = config.limiter().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            limiter.retain_recent();
        }
    });

    api.layer(GovernorLayer { config })
}

/// Build the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.config.uploads.max_image_bytes() + MULTIPART_OVERHEAD_BYTES;

    let api = Router::new()
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/me", get(auth::me))
        // Ticket lifecycle
        .route(
            "/arrivals",
            post(records::create_arrival).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/records/search", get(records::search_records))
        .route("/departures", post(records::record_departure))
        // Manager
        .route("/admin/records", get(admin::list_records))
        .route("/admin/reports/daily", get(admin::daily_report_csv))
        .route("/admin/reports/daily/html", get(admin::daily_report_html))
        // External scheduler
        .route("/system/reports/daily", post(system::run_daily_report))
        .route("/healthz", get(health::healthz))
        .with_state(state.clone());
    let api = with_rate_limit(api, &state.config.rate_limit);

    let uploads = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(UPLOADS_CACHE_CONTROL),
        ))
        .service(ServeDir::new(&state.config.uploads.dir));

    let mut app = Router::new()
        .nest("/api", api)
        .nest_service("/uploads", uploads)
        .merge(openapi::create_openapi_router());
    for (name, value) in SECURITY_HEADERS {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }

    app.layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors))
}
