//! cairn-api - HTTP API server for cairn

mod auth;
mod error;
mod handlers;

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use governor::{Quota, RateLimiter};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use cairn_core::{defaults, AnalysisQueue, SessionRepository};
use cairn_db::{Database, FilesystemBackend};
use cairn_jobs::{AnalysisWorker, ImageAnalysisHandler, WorkerConfig};
use cairn_vision::provider_from_env;

pub use error::ApiError;

use handlers::attachments::{delete_image, download_image, get_image, upload_image};
use handlers::auth::{me, refresh, signin, signout, signup};
use handlers::notes::{create_note, delete_note, get_note, list_notes, update_note};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so request ids sort chronologically in
/// logs and stay cheap to correlate across restarts.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE & OPENAPI
// =============================================================================

/// Global rate limiter type (direct quota, no keyed bucketing).
type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
    /// Global rate limiter (None if rate limiting is disabled).
    rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

/// OpenAPI documentation, generated from the handler annotations and served
/// through Swagger UI at `/docs`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cairn API",
        description = "Notes backend with asynchronous image analysis"
    ),
    paths(
        handlers::auth::signup,
        handlers::auth::signin,
        handlers::auth::refresh,
        handlers::auth::signout,
        handlers::auth::me,
        handlers::notes::list_notes,
        handlers::notes::create_note,
        handlers::notes::get_note,
        handlers::notes::update_note,
        handlers::notes::delete_note,
        handlers::attachments::upload_image,
        handlers::attachments::get_image,
        handlers::attachments::download_image,
        handlers::attachments::delete_image,
        health_check,
    ),
    components(schemas(
        handlers::auth::SignUpRequest,
        handlers::auth::SignInRequest,
        handlers::auth::RefreshTokenRequest,
        handlers::auth::SessionResponse,
        handlers::auth::RefreshResponse,
        handlers::notes::CreateNotePayload,
        handlers::notes::UpdateNotePayload,
        handlers::attachments::UploadImageRequest,
        handlers::attachments::AttachmentResponse,
        cairn_core::UserProfile,
        cairn_core::Note,
        cairn_core::NoteWithAttachment,
        cairn_core::AttachmentSummary,
        cairn_core::AnalysisStatus,
    )),
    tags(
        (name = "Auth", description = "Accounts and token sessions"),
        (name = "Notes", description = "Note CRUD operations"),
        (name = "Attachments", description = "Note images and analysis results"),
        (name = "System", description = "Health checks and system info")
    )
)]
struct ApiDoc;

// =============================================================================
// CORS CONFIGURATION HELPER
// =============================================================================

/// Parse allowed origins from the comma-separated `ALLOWED_ORIGINS` variable.
///
/// Defaults to the local frontend dev servers when unset or empty. Origins
/// that fail to parse are skipped with a warning rather than aborting
/// startup.
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

    if origins_str.trim().is_empty() {
        // Default origins
        return vec![
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ];
    }

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "cairn_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cairn_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("cairn-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/cairn".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);

    // Rate limiting configuration
    // RATE_LIMIT_REQUESTS: requests per period (default: 100)
    // RATE_LIMIT_PERIOD_SECS: period in seconds (default: 60 = 1 minute)
    let rate_limit_requests: u64 = std::env::var("RATE_LIMIT_REQUESTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::RATE_LIMIT_REQUESTS);
    let rate_limit_period_secs: u64 = std::env::var("RATE_LIMIT_PERIOD_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::RATE_LIMIT_PERIOD_SECS);
    let rate_limit_enabled: bool = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    info!(
        "Rate limiting: {} ({} requests per {} seconds)",
        if rate_limit_enabled {
            "enabled"
        } else {
            "disabled"
        },
        rate_limit_requests,
        rate_limit_period_secs
    );

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    cairn_db::log_pool_metrics(db.pool());
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Sweep session rows past their audit window. Not fatal if it fails,
    // the access-token check filters expired sessions anyway.
    match db.sessions.cleanup_expired().await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Expired sessions removed"),
        Err(e) => warn!(error = %e, "Session cleanup failed"),
    }

    // Initialize attachment byte storage
    let storage_path = std::env::var(defaults::ENV_STORAGE_PATH)
        .unwrap_or_else(|_| defaults::DEFAULT_STORAGE_PATH.to_string());
    let db = db.with_storage_path(&storage_path);
    if let Err(e) = FilesystemBackend::new(&storage_path).validate().await {
        anyhow::bail!("Storage backend at {} is not usable: {}", storage_path, e);
    }
    info!("File storage initialized at {}", storage_path);

    // Start the analysis worker. Provider selection and the disabled case
    // are logged by the worker itself.
    let provider = provider_from_env();
    let analysis_handler = Arc::new(ImageAnalysisHandler::new(db.clone(), provider));
    let _worker_handle =
        AnalysisWorker::new(db.clone(), WorkerConfig::from_env(), analysis_handler).start();

    // Create rate limiter if enabled
    let rate_limiter = if rate_limit_enabled {
        let quota = Quota::with_period(std::time::Duration::from_secs(rate_limit_period_secs))
            .expect("Rate limit period must be non-zero")
            .allow_burst(
                NonZeroU32::new(rate_limit_requests as u32).expect("Rate limit must be non-zero"),
            );
        Some(Arc::new(RateLimiter::direct(quota)))
    } else {
        None
    };

    // Create app state
    let state = AppState { db, rate_limiter };

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // OpenAPI / Swagger UI
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Auth
        .route("/api/v1/auth/signup", post(signup))
        .route("/api/v1/auth/signin", post(signin))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/signout", post(signout))
        .route("/api/v1/auth/me", get(me))
        // Notes CRUD
        .route("/api/v1/notes", get(list_notes).post(create_note))
        .route(
            "/api/v1/notes/:note_id",
            get(get_note).patch(update_note).delete(delete_note),
        )
        // Note image attachment
        .route(
            "/api/v1/notes/:note_id/image",
            post(upload_image).get(get_image).delete(delete_image),
        )
        .route("/api/v1/notes/:note_id/image/data", get(download_image))
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        // Outside the trace layer so a panicking handler still produces a
        // 500 with the request id attached.
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(defaults::CORS_MAX_AGE_SECS))
        })
        // Body cap leaves room for a maximal image after base64 inflation
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_SIZE_BYTES))
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// RATE LIMITING MIDDLEWARE
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    // If rate limiting is disabled, pass through
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!("Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

/// Service health: database reachability, storage writability, queue depth.
#[utoipa::path(get, path = "/health", tag = "System",
    responses(
        (status = 200, description = "All dependencies reachable"),
        (status = 503, description = "Database or storage unavailable"),
    ))]
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match sqlx::query("SELECT 1").execute(state.db.pool()).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::error!(error = %e, "Health check: database unreachable");
            "unavailable"
        }
    };

    let storage = match FilesystemBackend::new(state.db.storage_path())
        .validate()
        .await
    {
        Ok(()) => "ok",
        Err(e) => {
            tracing::error!(error = %e, "Health check: storage not writable");
            "unavailable"
        }
    };

    let queue = state.db.queue.queue_stats().await.ok();

    let healthy = database == "ok" && storage == "ok";
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "database": database,
            "storage": storage,
            "queue": queue,
        })),
    )
}
