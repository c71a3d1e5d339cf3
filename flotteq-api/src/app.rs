/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use flotteq_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = flotteq_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{auth::jwt_auth_layer, security::SecurityHeadersLayer},
    routes,
    storage::Storage,
};
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Room for multipart framing around the largest accepted file
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Upload directory
    pub storage: Storage,

    /// Outbound HTTP client (Google sign-in)
    pub http: reqwest::Client,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config) -> Self {
        let storage = Storage::new(config.uploads.dir.clone(), config.uploads.max_bytes);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            db,
            config: Arc::new(config),
            storage,
            http,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                                   (public)
/// └── /api/
///     ├── /auth/        register, login, refresh, google, google/callback (public), me
///     ├── /users/       tenant user management
///     ├── /vehicles/    vehicles and their records
///     │   └── /:id/     maintenances (+ parts), invoices (+ document),
///     │                 inspections (+ report), photos (+ file)
///     ├── /subscriptions/  plans, current, subscribe, cancel, history, usage
///     └── /admin/       tenants, plans, analytics (internal staff)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Request tracing (tower-http TraceLayer)
/// 4. Response compression (gzip, brotli)
/// 5. Body limit
/// 6. Authentication (everything except /health and the public auth routes)
pub fn build_router(state: AppState) -> Router {
    let public_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/google", get(routes::auth::google_authorize))
        .route("/google/callback", post(routes::auth::google_callback));

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users).post(routes::users::create_user))
        .route(
            "/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route("/:id/roles", put(routes::users::set_roles));

    let vehicle_routes = Router::new()
        .route("/", get(routes::vehicles::list_vehicles).post(routes::vehicles::create_vehicle))
        .route(
            "/:id",
            get(routes::vehicles::get_vehicle)
                .put(routes::vehicles::update_vehicle)
                .delete(routes::vehicles::delete_vehicle),
        )
        .route(
            "/:id/maintenances",
            get(routes::maintenances::list_maintenances).post(routes::maintenances::create_maintenance),
        )
        .route(
            "/:id/maintenances/:maintenance_id",
            get(routes::maintenances::get_maintenance)
                .put(routes::maintenances::update_maintenance)
                .delete(routes::maintenances::delete_maintenance),
        )
        .route(
            "/:id/maintenances/:maintenance_id/parts",
            post(routes::maintenances::add_part),
        )
        .route(
            "/:id/maintenances/:maintenance_id/parts/:part_id",
            axum::routing::delete(routes::maintenances::delete_part),
        )
        .route(
            "/:id/invoices",
            get(routes::invoices::list_invoices).post(routes::invoices::create_invoice),
        )
        .route(
            "/:id/invoices/:invoice_id",
            get(routes::invoices::get_invoice)
                .put(routes::invoices::update_invoice)
                .delete(routes::invoices::delete_invoice),
        )
        .route(
            "/:id/invoices/:invoice_id/document",
            get(routes::invoices::download_document).post(routes::invoices::upload_document),
        )
        .route(
            "/:id/inspections",
            get(routes::inspections::list_inspections).post(routes::inspections::create_inspection),
        )
        .route(
            "/:id/inspections/:inspection_id",
            get(routes::inspections::get_inspection)
                .put(routes::inspections::update_inspection)
                .delete(routes::inspections::delete_inspection),
        )
        .route(
            "/:id/inspections/:inspection_id/report",
            get(routes::inspections::download_report).post(routes::inspections::upload_report),
        )
        .route(
            "/:id/photos",
            get(routes::photos::list_photos).post(routes::photos::upload_photo),
        )
        .route(
            "/:id/photos/:photo_id",
            get(routes::photos::get_photo).delete(routes::photos::delete_photo),
        )
        .route("/:id/photos/:photo_id/file", get(routes::photos::download_photo));

    let subscription_routes = Router::new()
        .route("/", post(routes::subscriptions::subscribe))
        .route("/plans", get(routes::subscriptions::list_plans))
        .route("/current", get(routes::subscriptions::current))
        .route("/cancel", post(routes::subscriptions::cancel))
        .route("/history", get(routes::subscriptions::history))
        .route("/usage", get(routes::subscriptions::usage));

    let admin_routes = Router::new()
        .route(
            "/tenants",
            get(routes::admin::list_tenants).post(routes::admin::create_tenant),
        )
        .route(
            "/tenants/:id",
            get(routes::admin::get_tenant)
                .put(routes::admin::update_tenant)
                .delete(routes::admin::delete_tenant),
        )
        .route("/plans", get(routes::admin::list_plans).post(routes::admin::create_plan))
        .route("/plans/:id", put(routes::admin::update_plan))
        .route("/analytics/overview", get(routes::admin::analytics_overview))
        .route("/analytics/revenue", get(routes::admin::analytics_revenue))
        .route("/analytics/tenants", get(routes::admin::analytics_tenants));

    // Everything below requires a valid access token
    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .nest("/users", user_routes)
        .nest("/vehicles", vehicle_routes)
        .nest("/subscriptions", subscription_routes)
        .nest("/admin", admin_routes)
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let api_routes = Router::new()
        .nest("/auth", public_auth_routes)
        .merge(protected_routes);

    let body_limit = state.config.uploads.max_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        user_id = tracing::field::Empty,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
