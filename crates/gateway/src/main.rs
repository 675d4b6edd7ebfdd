//! UnitForge Gateway
//!
//! Serves the unit JSON API and the admin pages.
//! Handles:
//! - Request routing
//! - Rate limiting
//! - Schema bootstrap
//! - Observability (logging, metrics)

mod actions;
mod flash;
mod forms;
mod handlers;
mod middleware;
mod views;

use axum::{
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::Redirect,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Notify;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use unitforge_common::{
    config::{AppConfig, ObservabilityConfig},
    db::{schema::ensure_schema, DbPool},
    metrics,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config.observability);

    info!("Starting UnitForge gateway v{}", unitforge_common::VERSION);
    let config = Arc::new(config);

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!(%addr, "Prometheus exporter listening");
    }
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.auto_migrate {
        ensure_schema(db.write()).await?;
    }

    let state = AppState {
        config: config.clone(),
        db,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    // Open connections get `shutdown_timeout` to drain after the signal
    let signalled = Arc::new(Notify::new());
    let notify = signalled.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            notify.notify_one();
        })
        .into_future();
    let drain_limit = config.shutdown_timeout();

    tokio::select! {
        result = server => result?,
        _ = async {
            signalled.notified().await;
            tokio::time::sleep(drain_limit).await;
        } => warn!("Shutdown timeout reached, dropping open connections"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        .route(
            "/",
            get(handlers::units::list_units).post(handlers::units::create_unit),
        )
        .route("/default", get(handlers::units::get_default))
        .route("/options", get(handlers::units::get_options))
        .route("/install", post(handlers::units::install_units))
        .route(
            "/{id}",
            get(handlers::units::get_unit)
                .put(handlers::units::update_unit)
                .delete(handlers::units::delete_unit),
        )
        .route("/{id}/default", post(handlers::units::set_default))
        .layer(cors);

    let admin_routes = Router::new()
        .route(
            "/",
            get(handlers::admin::list_page).post(handlers::admin::create),
        )
        .route("/install", post(handlers::admin::install))
        .route(
            "/{id}",
            get(handlers::admin::detail_page).post(handlers::admin::edit),
        )
        .route("/{id}/default", post(handlers::admin::set_default))
        .route("/{id}/delete", post(handlers::admin::delete));

    let mut app = Router::new()
        .nest("/api/units", api_routes)
        .nest("/admin/units", admin_routes);

    if config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        );
        app = app.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Health endpoints stay outside the rate limit
    Router::new()
        .route("/", get(|| async { Redirect::to("/admin/units") }))
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(app)
        .layer(from_fn(middleware::track_metrics))
        .layer(timeout_layer(&config))
        .layer(GlobalConcurrencyLimitLayer::new(config.server.max_concurrent_requests))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Requests running past the configured limit answer 408
fn timeout_layer(config: &AppConfig) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod test_support {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, HeaderMap, Request, StatusCode};
    use tower::ServiceExt;
    use unitforge_common::config::{DatabaseConfig, RateLimitConfig};

    pub fn test_config(rate_limit: RateLimitConfig) -> AppConfig {
        AppConfig {
            database: DatabaseConfig::in_memory(),
            rate_limit,
            ..Default::default()
        }
    }

    pub async fn app_with(config: AppConfig) -> Router {
        let db = DbPool::new(&config.database).await.unwrap();
        ensure_schema(db.write()).await.unwrap();
        create_router(AppState {
            config: Arc::new(config),
            db,
        })
    }

    pub async fn test_app() -> Router {
        app_with(test_config(RateLimitConfig {
            enabled: false,
            ..Default::default()
        }))
        .await
    }

    pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn form_request(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn send_raw(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    /// Send and parse the JSON body (`Null` when empty)
    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, _, body) = send_raw(app, request).await;
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&body).unwrap()
        };
        (status, json)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::timeout_layer;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use unitforge_common::config::RateLimitConfig;

    #[tokio::test]
    async fn test_root_redirects_to_admin() {
        let app = test_app().await;

        let (status, headers, _) =
            send_raw(&app, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers[header::LOCATION], "/admin/units");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = test_app().await;

        let (_, headers, _) =
            send_raw(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_burst_overflow() {
        let app = app_with(test_config(RateLimitConfig {
            requests_per_second: 1,
            burst: 1,
            enabled: true,
        }))
        .await;

        let get = || Request::get("/api/units").body(Body::empty()).unwrap();
        let (status, _) = send(&app, get()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");

        // health is not limited
        let (status, _) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let mut config = test_config(RateLimitConfig::default());
        config.server.request_timeout_secs = 1;

        let app = axum::Router::new()
            .route(
                "/slow",
                axum::routing::get(|| async {
                    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                    "done"
                }),
            )
            .layer(timeout_layer(&config));

        let (status, _, _) =
            send_raw(&app, Request::get("/slow").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    }
}
