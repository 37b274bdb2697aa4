//! Application startup and lifecycle management.

use crate::config::{AdminConfig, SubscriptionConfig};
use crate::handlers::{self, admin, history, webhooks};
use crate::services::{init_metrics, Database, KiwifyClient, Reconciler};
use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SubscriptionConfig>,
    pub db: Arc<Database>,
    pub kiwify: KiwifyClient,
    pub reconciler: Reconciler<Database>,
}

impl FromRef<AppState> for AdminConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.admin.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/webhooks/kiwify", post(webhooks::kiwify_webhook))
        .route("/admin/subscriptions/sync", post(admin::sync_subscriptions))
        .route("/admin/users/:user_id/plan", get(admin::get_user_plan))
        .route("/meal-history", get(history::meal_history))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: SubscriptionConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: SubscriptionConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(
        config: SubscriptionConfig,
        run_migrations: bool,
    ) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let db = Arc::new(db);

        let kiwify = KiwifyClient::new(config.kiwify.clone());
        if !kiwify.is_configured() {
            tracing::warn!("Kiwify API credentials not set, admin sync is disabled");
        }
        if config.plans.is_empty() {
            tracing::info!("No explicit plan map configured, using keyword matching only");
        }

        let reconciler = Reconciler::new(Arc::clone(&db), config.plans.clone());

        let http_addr = config.common.bind_address();
        let http_listener = TcpListener::bind(&http_addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %http_addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Subscription service listener bound");

        let state = AppState {
            config: Arc::new(config),
            db,
            kiwify,
            reconciler,
        };

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = router(self.state.clone());

        tracing::info!(
            service = %self.state.config.service_name,
            version = %self.state.config.service_version,
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(self.http_listener, router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
