//! Crosscut Admin Backend
//!
//! REST service behind the catchment admin UI. It creates and lists catchment jobs on
//! the Crosscut job service and publishes their catchments into a DHIS2 instance.

mod api;
mod auth;
mod clients;
mod config;
mod errors;
mod models;
mod workflow;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clients::{PrimaryClient, SecondaryClient};
use config::Config;
use workflow::PublishTracker;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub primary: Arc<PrimaryClient>,
    pub secondary: Arc<SecondaryClient>,
    pub tracker: Arc<PublishTracker>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, http: reqwest::Client) -> Self {
        let primary = PrimaryClient::new(
            http.clone(),
            config.crosscut_api_url.clone(),
            config.boundary_version.clone(),
        );
        let secondary = SecondaryClient::new(
            http,
            config.dhis2_base_url.clone(),
            config.dhis2_auth.clone(),
        );

        Self {
            primary: Arc::new(primary),
            secondary: Arc::new(secondary),
            tracker: Arc::new(PublishTracker::new()),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Crosscut Admin Backend");
    tracing::info!("Crosscut API: {}", config.crosscut_api_url);
    tracing::info!("DHIS2 API: {}", config.dhis2_base_url);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.admin_psk.is_none() {
        tracing::warn!("No admin PSK configured (CROSSCUT_ADMIN_PSK). Authentication is disabled!");
    }
    if config.dhis2_auth == config::Dhis2Auth::None {
        tracing::warn!("No DHIS2 credentials configured (DHIS2_USERNAME or DHIS2_TOKEN)");
    }

    let bind_addr = config.bind_addr;
    let state = AppState::new(config, clients::http_client()?);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.admin_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Catchment jobs
        .route("/jobs", get(api::list_jobs).post(api::create_job))
        .route(
            "/jobs/error-table/remove-errors",
            post(api::remove_error_rows),
        )
        .route("/jobs/{id}", get(api::get_job).delete(api::delete_job))
        .route("/jobs/{id}/geojson", get(api::get_job_geojson))
        .route("/jobs/{id}/item", put(api::update_job_item))
        // Publishing
        .route("/jobs/{id}/publish", post(api::publish_job))
        .route("/jobs/{id}/unpublish", post(api::unpublish_job))
        .route("/jobs/{id}/publish-status", get(api::get_publish_status))
        .route("/boundaries", get(api::list_boundaries))
        // DHIS2 hierarchy
        .route("/org-unit-levels", get(api::list_org_unit_levels))
        .route("/org-unit-groups", get(api::list_org_unit_groups))
        .route("/org-units", get(api::list_org_units))
        .route("/attributes", get(api::list_attributes))
        .route("/geo-features", get(api::get_geo_features))
        .route("/valid-points", get(api::get_valid_points))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
