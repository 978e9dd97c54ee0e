use crate::config::{StoreBackend, SurveyConfig};
use crate::handlers::{self, pages, products, survey};
use crate::models::{Product, PRODUCTS_COLLECTION};
use crate::services::{DocumentStore, InMemoryStore, MongoStore};
use axum::{
    middleware::from_fn,
    routing::{delete, get, post, put},
    Router,
};
use mongodb::bson::doc;
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: SurveyConfig,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(config: SurveyConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self { config, store }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        // Status-code demonstrations
        .route("/old-shop", get(pages::old_shop))
        .route("/dashboard", get(pages::dashboard))
        .route("/admin", get(pages::admin))
        .route("/crash", get(pages::crash))
        // Catalog
        .route("/api/product", post(products::create_product))
        .route("/product/:id", get(products::get_product))
        .route("/search", get(products::search_products))
        // Survey records
        .route("/add-sm-data", post(survey::add_sm_data))
        .route("/add-sm-data/bulk", post(survey::add_sm_data_bulk))
        .route("/get-sm-user/:user_id", get(survey::get_sm_user))
        .route("/sm-users", get(survey::list_sm_users))
        .route("/update-sm-data/:user_id", put(survey::update_sm_data))
        .route("/delete-sm-user/:user_id", delete(survey::delete_sm_user))
        .fallback(pages::not_found)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .layer(CatchPanicLayer::custom(pages::handle_panic))
        .with_state(state)
}

/// Open the store selected by configuration.
pub async fn connect_store(config: &SurveyConfig) -> Result<Arc<dyn DocumentStore>, AppError> {
    match config.store {
        StoreBackend::Mongo => {
            let store = MongoStore::connect(&config.mongodb).await?;
            store.health_check().await.map_err(|e| {
                tracing::error!("MongoDB is not reachable: {}", e);
                e
            })?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

/// Insert the starter products when the catalog is empty.
pub async fn seed_catalog(store: &dyn DocumentStore) -> Result<usize, AppError> {
    if store.find_one(PRODUCTS_COLLECTION, doc! {}).await?.is_some() {
        return Ok(0);
    }

    let documents = Product::starter_catalog()
        .iter()
        .map(Product::to_document)
        .collect::<Result<Vec<_>, _>>()?;
    let inserted = store.insert_many(PRODUCTS_COLLECTION, documents).await?;

    tracing::info!(count = inserted.len(), "Seeded product catalog");
    Ok(inserted.len())
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    pub async fn build(config: SurveyConfig) -> Result<Self, AppError> {
        let store = connect_store(&config).await?;
        Self::build_with_store(config, store).await
    }

    pub async fn build_with_store(
        config: SurveyConfig,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, AppError> {
        if config.catalog.seed {
            seed_catalog(store.as_ref()).await?;
        }

        let state = AppState::new(config.clone(), store);
        let router = build_router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            router,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.state.store.clone()
    }

    /// Serve until Ctrl+C/SIGTERM, then close the store.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let Self {
            listener,
            router,
            state,
            ..
        } = self;

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        state.store.close().await;
        result
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
