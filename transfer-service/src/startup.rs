//! Application startup and lifecycle management.

use crate::config::{StoreBackend, TransferConfig};
use crate::handlers::{
    accounts, health_check, metrics_handler, readiness_check, transfers,
};
use crate::services::{AccountService, LedgerMetrics, LedgerObserver, TransferEngine};
use crate::store::{InMemoryLedgerStore, LedgerStore, PgLedgerStore};
use axum::{
    Router,
    extract::Request,
    middleware,
    routing::{get, post},
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id, request_id_middleware};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TransferConfig>,
    pub store: Arc<dyn LedgerStore>,
    pub engine: TransferEngine,
    pub accounts: AccountService,
    pub metrics: Arc<LedgerMetrics>,
}

impl AppState {
    /// Wire the services over `store`, reporting into a fresh metrics registry.
    pub fn new(config: TransferConfig, store: Arc<dyn LedgerStore>) -> Result<Self, AppError> {
        let metrics = Arc::new(LedgerMetrics::new().map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to register metrics: {}", e))
        })?);
        let observer: Arc<dyn LedgerObserver> = metrics.clone();

        let engine = TransferEngine::new(store.clone(), observer.clone())
            .with_timeout(config.transfer_timeout);
        let accounts = AccountService::new(store.clone(), observer);

        Ok(Self {
            config: Arc::new(config),
            store,
            engine,
            accounts,
            metrics,
        })
    }
}

/// HTTP routes with request-id, tracing and metrics layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/accounts",
            post(accounts::create_account).get(accounts::list_accounts),
        )
        .route("/api/accounts/:id", get(accounts::get_account))
        .route(
            "/api/accounts/:id/transactions",
            get(accounts::list_transactions),
        )
        .route("/api/accounts/:id/deposits", post(accounts::deposit))
        .route("/api/accounts/:id/withdrawals", post(accounts::withdraw))
        .route("/api/transfers", post(transfers::create_transfer))
        .route("/api/transfers/:id", get(transfers::get_transfer))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            tracing::info_span!(
                "http_request",
                method = %req.method(),
                uri = %req.uri(),
                request_id = request_id(req.headers()).unwrap_or("-"),
            )
        }))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            metrics_middleware::<LedgerMetrics>,
        ))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Open the store the configuration asks for.
async fn connect_store(config: &TransferConfig) -> Result<Arc<dyn LedgerStore>, AppError> {
    match (config.store, &config.database) {
        (StoreBackend::Postgres, Some(database)) => {
            let store = PgLedgerStore::connect(
                &database.url,
                database.max_connections,
                database.min_connections,
            )
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                e
            })?;

            store.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;

            Ok(Arc::new(store))
        }
        (StoreBackend::Postgres, None) => Err(AppError::ConfigError(anyhow::anyhow!(
            "postgres store selected without database settings"
        ))),
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using in-memory store; data is lost on shutdown");
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: TransferConfig) -> Result<Self, AppError> {
        let store = connect_store(&config).await?;
        Self::build_with_store(config, store).await
    }

    /// Build the application over an already opened store.
    pub async fn build_with_store(
        config: TransferConfig,
        store: Arc<dyn LedgerStore>,
    ) -> Result<Self, AppError> {
        let addr = config.common.bind_address();
        let state = AppState::new(config, store)?;

        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Transfer service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            service = %self.state.config.service_name,
            version = %self.state.config.service_version,
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router(self.state)).await
    }
}
