//! # Portal Gate HTTP Server
//!
//! HTTP front for the portal authorization core. Every route resolves the
//! bearer token into an identity, then runs the gate/scope/guard pipeline.
//!
//! ## Endpoints
//!
//! - `GET  /v1/users` - Scoped user listing (staff and above)
//! - `POST /v1/users/:id/role` - Change a user's role (admin and above)
//! - `POST /v1/users/:id/active` - Toggle a user's active flag (admin and above)
//! - `GET  /health` - Health check
//! - `GET  /metrics` - Prometheus metrics (separate listener)
//!
//! ## Configuration
//!
//! Environment variables:
//! - `PORT` - HTTP server port (default: 8080)
//! - `METRICS_PORT` - Metrics server port (default: 9090)
//! - `RUST_LOG` - Log level (default: info)
//! - `DATABASE_URL` - PostgreSQL connection string (postgres feature only;
//!   falls back to the in-memory store when unset)
//! - `BOOTSTRAP_ADMIN_EMAIL` - Seed super admin for the in-memory store

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    serve, Router,
};
use portal_gate::{
    session, AdminService, GateError, Identity, InMemoryUserStore, OrderBy, Role, TracingRevalidator,
    UserPredicate, UserRecord, UserStore,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Decision counters exposed on the metrics listener
#[derive(Default)]
struct DecisionCounters {
    allowed: AtomicU64,
    denied: AtomicU64,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    service: Arc<AdminService>,
    counters: Arc<DecisionCounters>,
    start_time: std::time::Instant,
}

impl AppState {
    fn record<T>(&self, result: &Result<T, AppError>) {
        match result {
            Ok(_) => self.counters.allowed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.counters.denied.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Application error type
#[derive(Debug)]
enum AppError {
    Gate(GateError),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Gate(err) => {
                let status = match &err {
                    GateError::Unauthenticated => StatusCode::UNAUTHORIZED,
                    GateError::Inactive
                    | GateError::InsufficientRole { .. }
                    | GateError::TargetOutranksActor { .. }
                    | GateError::CannotGrantSuperAdmin => StatusCode::FORBIDDEN,
                    GateError::TargetNotFound(_) => StatusCode::NOT_FOUND,
                    GateError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let code = match &err {
                    GateError::Unauthenticated => "unauthenticated",
                    GateError::Inactive => "inactive",
                    GateError::InsufficientRole { .. } => "insufficient_role",
                    GateError::TargetNotFound(_) => "not_found",
                    GateError::TargetOutranksActor { .. } => "target_outranks_actor",
                    GateError::CannotGrantSuperAdmin => "cannot_grant_super_admin",
                    GateError::Persistence(_) => "internal_error",
                };
                (status, code, err.public_message())
            }
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        AppError::Gate(err)
    }
}

/// Extract the bearer token from the Authorization header
fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolve the request's identity from its bearer token
fn identity_from(headers: &HeaderMap) -> Result<Identity, AppError> {
    Ok(session::resolve(bearer(headers))?)
}

/// Listing query parameters
#[derive(Debug, Deserialize)]
struct ListParams {
    role: Option<Role>,
    active: Option<bool>,
    q: Option<String>,
    #[serde(default)]
    order: OrderBy,
}

/// GET /v1/users - scoped user listing
async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<UserRecord>>, AppError> {
    let result = async {
        let identity = identity_from(&headers)?;

        let mut predicate = UserPredicate::all();
        predicate.role = params.role;
        predicate.active = params.active;
        predicate.search = params.q;

        let users = state
            .service
            .list_users(&identity, predicate, params.order)
            .await?;
        Ok(Json(users))
    }
    .await;

    state.record(&result);
    result
}

/// Body for POST /v1/users/:id/role
#[derive(Debug, Deserialize)]
struct SetRoleBody {
    role: Role,
}

/// POST /v1/users/:id/role - guarded role change
async fn set_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<SetRoleBody>,
) -> Result<Json<UserRecord>, AppError> {
    let result = async {
        let identity = identity_from(&headers)?;
        let updated = state.service.set_role(&identity, id, body.role).await?;
        Ok(Json(updated))
    }
    .await;

    state.record(&result);
    result
}

/// POST /v1/users/:id/active - guarded active-flag toggle
async fn toggle_active(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<UserRecord>, AppError> {
    let result = async {
        let identity = identity_from(&headers)?;
        let updated = state.service.toggle_active(&identity, id).await?;
        Ok(Json(updated))
    }
    .await;

    state.record(&result);
    result
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// GET /health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();

    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: uptime,
        version: portal_gate::VERSION.to_string(),
    })
}

/// Metrics response (Prometheus format)
struct MetricsResponse {
    metrics: String,
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            self.metrics,
        )
            .into_response()
    }
}

/// GET /metrics - Prometheus metrics endpoint
async fn metrics(State(state): State<AppState>) -> MetricsResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let allowed = state.counters.allowed.load(Ordering::Relaxed);
    let denied = state.counters.denied.load(Ordering::Relaxed);

    let metrics = format!(
        "# HELP gate_uptime_seconds Server uptime in seconds\n\
         # TYPE gate_uptime_seconds gauge\n\
         gate_uptime_seconds {}\n\
         \n\
         # HELP gate_requests_total Gated requests by outcome\n\
         # TYPE gate_requests_total counter\n\
         gate_requests_total{{outcome=\"allow\"}} {}\n\
         gate_requests_total{{outcome=\"deny\"}} {}\n\
         \n\
         # HELP gate_version Server version info\n\
         # TYPE gate_version gauge\n\
         gate_version{{version=\"{}\"}} 1\n",
        uptime,
        allowed,
        denied,
        portal_gate::VERSION
    );

    MetricsResponse { metrics }
}

/// Create the HTTP router with all endpoints
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/v1/users", get(list_users))
        .route("/v1/users/:id/role", post(set_role))
        .route("/v1/users/:id/active", post(toggle_active))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
        .with_state(state)
}

/// Create the metrics router
fn create_metrics_router(state: AppState) -> Router {
    Router::new().route("/metrics", get(metrics)).with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

/// Build the user store from the environment.
///
/// With the `postgres` feature and `DATABASE_URL` set, connects to PostgreSQL
/// and runs migrations; otherwise an in-memory store is seeded with one
/// bootstrap super admin so the portal is reachable on first start.
async fn build_store() -> anyhow::Result<Arc<dyn UserStore>> {
    #[cfg(feature = "postgres")]
    if let Ok(url) = std::env::var("DATABASE_URL") {
        info!("Connecting to PostgreSQL user store");
        let store = portal_gate::store::PostgresUserStore::new(&url).await?;
        store.run_migrations().await?;
        return Ok(Arc::new(store));
    }

    let email = std::env::var("BOOTSTRAP_ADMIN_EMAIL")
        .unwrap_or_else(|_| "admin@portal.local".to_string());
    info!(email = %email, "Using in-memory user store with bootstrap super admin");

    let store = InMemoryUserStore::new();
    store
        .insert(UserRecord::new("Bootstrap Admin", email, Role::SuperAdmin))
        .await;
    Ok(Arc::new(store))
}

/// Main server entrypoint
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Portal Gate Server v{}", portal_gate::VERSION);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let metrics_port: u16 = std::env::var("METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9090);

    info!("Configuration:");
    info!("  Port: {}", port);
    info!("  Metrics Port: {}", metrics_port);

    let store = build_store().await?;
    let service = Arc::new(AdminService::new(store, Arc::new(TracingRevalidator)));

    let state = AppState {
        service,
        counters: Arc::new(DecisionCounters::default()),
        start_time: std::time::Instant::now(),
    };

    let app = create_router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let metrics_app = create_metrics_router(state.clone());
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));

    info!("Starting HTTP server on {}", addr);
    info!("Starting metrics server on {}", metrics_addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind HTTP server: {}", e);
            return Err(e.into());
        }
    };

    let metrics_listener = match tokio::net::TcpListener::bind(metrics_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server: {}", e);
            return Err(e.into());
        }
    };

    let server = serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal());
    let metrics_server =
        serve(metrics_listener, metrics_app.into_make_service()).with_graceful_shutdown(shutdown_signal());

    let result = tokio::try_join!(
        async {
            server.await.map_err(|e| {
                error!("HTTP server error: {}", e);
                e
            })
        },
        async {
            metrics_server.await.map_err(|e| {
                error!("Metrics server error: {}", e);
                e
            })
        }
    );

    match result {
        Ok(_) => {
            info!("Servers shut down gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Server error: {}", e);
            Err(e.into())
        }
    }
}
