use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::{Backend, ServerConfig};
use crate::db::json_store::JsonFileRecordStore;
use crate::db::repository::RecordStore;
use crate::error::AppError;
use crate::lifecycle::DocumentManager;
use crate::storage::client::AttachmentStore;
use crate::storage::local::{LocalAttachmentStore, UPLOADS_ROUTE};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: DocumentManager,
}

impl AppState {
    pub fn new(records: Arc<dyn RecordStore>, attachments: Arc<dyn AttachmentStore>) -> Self {
        Self {
            manager: DocumentManager::new(records, attachments),
        }
    }
}

/// Construct the configured stores once and wire them into the manager.
pub async fn init_state(config: &ServerConfig) -> Result<AppState, AppError> {
    let (records, attachments) = match config.backend {
        Backend::Local => local_stores(config).await?,
        Backend::Managed => managed_stores().await?,
    };

    Ok(AppState::new(records, attachments))
}

type Stores = (Arc<dyn RecordStore>, Arc<dyn AttachmentStore>);

async fn local_stores(config: &ServerConfig) -> Result<Stores, AppError> {
    let records = JsonFileRecordStore::open(config.data_dir.clone()).await?;
    let attachments = LocalAttachmentStore::new(config.uploads_dir.clone());

    tracing::info!(path = %config.uploads_dir.display(), "Using local attachment store");

    Ok((Arc::new(records), Arc::new(attachments)))
}

#[cfg(feature = "managed")]
async fn managed_stores() -> Result<Stores, AppError> {
    use crate::config::{MongoConfig, S3Config};
    use crate::db::repository::MongoRecordStore;
    use crate::storage::client::S3AttachmentStore;

    let mongo_config = MongoConfig::from_env()?;
    let s3_config = S3Config::from_env()?;

    let records = MongoRecordStore::connect(&mongo_config).await?;
    tracing::info!(database = %mongo_config.database, "Connected to MongoDB");

    let attachments = S3AttachmentStore::from_config(&s3_config).await;
    tracing::info!(bucket = %s3_config.bucket, "S3 attachment store initialized");

    Ok((Arc::new(records), Arc::new(attachments)))
}

#[cfg(not(feature = "managed"))]
async fn managed_stores() -> Result<Stores, AppError> {
    Err(AppError::Config(
        "the managed backend requires building with the `managed` feature".into(),
    ))
}

/// Build the Axum router: the document API, attachment serving, the local
/// uploads directory and an optional static site root.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let mut router: Router<AppState> = Router::new()
        .route(
            "/api/documents",
            get(api::documents::list_documents_handler)
                .post(api::documents::save_document_handler),
        )
        .route(
            "/api/documents/{id}",
            delete(api::documents::delete_document_handler),
        )
        .route(
            "/api/attachments/{name}",
            get(api::attachments::serve_attachment_handler),
        );

    if config.backend == Backend::Local {
        router = router.nest_service(
            &format!("/{UPLOADS_ROUTE}"),
            ServeDir::new(&config.uploads_dir),
        );
    }

    if let Some(static_dir) = &config.static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .with_state(state)
}
