//! Server initialization and routing

use crate::api;
use crate::config::Config;
use crate::directory::IpaDirectory;
use crate::repository::FileConfigRepository;
use crate::service::{
    ApplicationProvisioner, ApplicationService, ExpirationSweeper, ObjectGraphBuilder,
    SystemService, TemporaryAccessService,
};
use crate::state::HasServices;
use anyhow::Result;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub application_service: Arc<ApplicationService<FileConfigRepository>>,
    pub provisioner: Arc<ApplicationProvisioner<IpaDirectory, FileConfigRepository>>,
    pub temporary_access_service: Arc<TemporaryAccessService<IpaDirectory, FileConfigRepository>>,
    pub system_service: Arc<SystemService<IpaDirectory, FileConfigRepository>>,
}

impl HasServices for AppState {
    type Directory = IpaDirectory;
    type ConfigRepo = FileConfigRepository;

    fn config(&self) -> &Config {
        &self.config
    }

    fn application_service(&self) -> &ApplicationService<FileConfigRepository> {
        &self.application_service
    }

    fn provisioner(&self) -> &ApplicationProvisioner<IpaDirectory, FileConfigRepository> {
        &self.provisioner
    }

    fn temporary_access_service(&self) -> &TemporaryAccessService<IpaDirectory, FileConfigRepository> {
        &self.temporary_access_service
    }

    fn system_service(&self) -> &SystemService<IpaDirectory, FileConfigRepository> {
        &self.system_service
    }
}

impl AppState {
    /// Wire the directory gateway and configuration store into every service
    pub async fn build(config: Config) -> Result<Self> {
        let directory = Arc::new(IpaDirectory::new(&config.directory));
        let repo = Arc::new(FileConfigRepository::open(config.store.clone()).await?);
        let builder = Arc::new(ObjectGraphBuilder::new(
            directory.clone(),
            config.directory.hbac_service.clone(),
        ));

        let application_service = Arc::new(ApplicationService::new(repo.clone()));
        let provisioner = Arc::new(ApplicationProvisioner::new(
            builder.clone(),
            repo.clone(),
            config.provisioning.max_concurrency,
        ));
        let temporary_access_service = Arc::new(TemporaryAccessService::new(
            builder,
            repo.clone(),
            config.lifecycle.max_grant_hours,
        ));
        let system_service = Arc::new(SystemService::new(
            directory,
            repo,
            config.directory.hbac_service.clone(),
            config.store.config_path.display().to_string(),
        ));

        Ok(Self {
            config: Arc::new(config),
            application_service,
            provisioner,
            temporary_access_service,
            system_service,
        })
    }
}

/// Run the HTTP server and the expiration sweeper until Ctrl-C
pub async fn run(config: Config, prometheus_handle: Option<PrometheusHandle>) -> Result<()> {
    let http_addr = config.http_addr();
    let sweep_interval = config.lifecycle.sweep_interval();
    let state = AppState::build(config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = ExpirationSweeper::new(state.temporary_access_service.clone(), sweep_interval)
        .start(shutdown_rx);

    let app = build_router(state).merge(metrics_router(prometheus_handle));

    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, waiting for expiration sweeper");
    let _ = shutdown_tx.send(true);
    sweeper.await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// `/metrics` with its own state
pub fn metrics_router(handle: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/metrics", get(api::metrics::metrics_handler))
        .with_state(Arc::new(handle))
}

/// Build the HTTP router with generic state type
///
/// This function is generic over the state type, allowing it to work with
/// both production `AppState` and test implementations that implement `HasServices`.
pub fn build_router<S: HasServices>(state: S) -> Router {
    let cors = cors_layer(&state.config().cors_origins);

    Router::new()
        // Health endpoint
        .route("/api/health", get(api::health::health))
        // Directory introspection
        .route("/api/trusts", get(api::system::trusts::<S>))
        .route("/api/status", get(api::system::status::<S>))
        .route("/api/test", post(api::system::test_access::<S>))
        .route("/api/export", get(api::system::export::<S>))
        // Applications
        .route(
            "/api/applications",
            get(api::application::list::<S>).post(api::application::create::<S>),
        )
        .route(
            "/api/applications/{name}",
            get(api::application::get::<S>).delete(api::application::delete::<S>),
        )
        .route(
            "/api/applications/{name}/apply",
            post(api::application::apply::<S>),
        )
        // Temporary access
        .route(
            "/api/temporary-access",
            get(api::temporary_access::list::<S>).post(api::temporary_access::grant::<S>),
        )
        .route(
            "/api/temporary-access/requests",
            post(api::temporary_access::request::<S>),
        )
        .route(
            "/api/temporary-access/sweep",
            post(api::temporary_access::sweep::<S>),
        )
        .route(
            "/api/temporary-access/{id}",
            get(api::temporary_access::get::<S>),
        )
        .route(
            "/api/temporary-access/{id}/approve",
            post(api::temporary_access::approve::<S>),
        )
        .route(
            "/api/temporary-access/{id}/deny",
            post(api::temporary_access::deny::<S>),
        )
        .route(
            "/api/temporary-access/{id}/revoke",
            post(api::temporary_access::revoke::<S>),
        )
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Any origin when none are configured, otherwise the listed origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(allowed)
    }
}
