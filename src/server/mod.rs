use crate::auth::{elevate, AuthorizationContext, ServiceAuthorization, ELEVATION_REASON};
use crate::blob::{copy_file_to_attachment, BlobStore, FsBlobStore};
use crate::config::Config;
use crate::delivery::DeliveryEngine;
use crate::mime::MimeResolver;
use crate::profiles::Profiles;
use crate::registry::{Registry, SqliteRegistry};
use crate::transform::{backend_from_config, TransformBackend, TransformPipeline};
use crate::variants::VariantCache;
use anyhow::{Context, Result};
use assetforged_common::{Attachment, AttachmentId};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod routes_attachments;

pub use error::AppError;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub registry: Arc<dyn Registry>,
    pub blobs: Arc<dyn BlobStore>,
    pub auth: Arc<dyn AuthorizationContext>,
    pub variants: VariantCache,
    pub delivery: DeliveryEngine,
}

impl AppContext {
    /// Wire the core components around the given collaborators.
    pub fn new(
        config: Config,
        registry: Arc<dyn Registry>,
        blobs: Arc<dyn BlobStore>,
        auth: Arc<dyn AuthorizationContext>,
        backend: Arc<dyn TransformBackend>,
    ) -> Result<Self> {
        let profiles = Profiles::from_config(&config.profiles).context("Invalid profiles")?;

        let pipeline = TransformPipeline::new(
            registry.clone(),
            blobs.clone(),
            auth.clone(),
            backend,
        );
        let variants = VariantCache::new(
            registry.clone(),
            blobs.clone(),
            auth.clone(),
            pipeline,
            Arc::new(profiles),
        );
        let delivery = DeliveryEngine::new(
            registry.clone(),
            blobs.clone(),
            auth.clone(),
            config.delivery.passthrough,
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            blobs,
            auth,
            variants,
            delivery,
        })
    }

    /// Open the on-disk registry and blob store named in `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let data_dir = &config.storage.data_dir;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let db_path = config.storage.db_path();
        let pool = assetforged_db::pool::init_pool(&db_path.to_string_lossy())
            .with_context(|| format!("Failed to open registry: {:?}", db_path))?;

        let backend = backend_from_config(&config.transform)
            .context("Failed to initialise transform backend")?;
        tracing::info!("Using {} transform backend", backend.name());

        let blobs = Arc::new(FsBlobStore::new(config.storage.blob_dir()));

        Self::new(
            config,
            Arc::new(SqliteRegistry::new(pool)),
            blobs,
            Arc::new(ServiceAuthorization::new()),
            backend,
        )
    }

    /// Register `file` as a new attachment, optionally under `parent`.
    ///
    /// When `parent` already has a child at `location`, that child's content
    /// is replaced instead. Otherwise the mime type is resolved from the file
    /// itself and the new row is removed again if its blob cannot be written.
    pub fn import(
        &self,
        file: &Path,
        parent: Option<AttachmentId>,
        title: Option<&str>,
        location: Option<&str>,
    ) -> assetforged_common::Result<Attachment> {
        if let Some(parent) = parent {
            self.registry.get(parent)?;
            if let Some(location) = location {
                if let Some(existing) = self.registry.find_by_location(parent, location)? {
                    return self.replace(existing.id, file);
                }
            }
        }

        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                assetforged_common::Error::invalid_input(format!(
                    "{} has no file name",
                    file.display()
                ))
            })?;
        let mime_type = MimeResolver::new().resolve(file);

        let _elevated = elevate(self.auth.as_ref(), ELEVATION_REASON);
        let mut att = self.registry.create_attachment(
            parent,
            &name,
            title.unwrap_or(&name),
            &mime_type,
        )?;
        att.location = location.map(str::to_string);

        if let Err(e) =
            copy_file_to_attachment(self.blobs.as_ref(), self.registry.as_ref(), file, &mut att)
        {
            if let Err(cleanup) = self.registry.delete(att.id) {
                tracing::warn!("Failed to delete attachment row {}: {}", att.id, cleanup);
            }
            return Err(e);
        }

        tracing::info!("Imported {} as {} ({})", file.display(), att.id, att.mime_type);
        Ok(att)
    }

    /// Copy `file` over the content of attachment `id`, advancing its
    /// revision. Name, title and mime type are kept.
    pub fn replace(&self, id: AttachmentId, file: &Path) -> assetforged_common::Result<Attachment> {
        let mut att = self.registry.get(id)?;

        let _elevated = elevate(self.auth.as_ref(), ELEVATION_REASON);
        copy_file_to_attachment(self.blobs.as_ref(), self.registry.as_ref(), file, &mut att)?;

        tracing::info!(
            "Replaced content of {} from {} ({} bytes)",
            att.id,
            file.display(),
            att.size
        );
        Ok(att)
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(routes_attachments::attachment_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port)
        .parse()
        .context("Invalid server address")?;

    tracing::info!(
        "Serving {} profile(s), passthrough {}, cache redirect {}",
        ctx.variants.profiles().len(),
        ctx.config.delivery.passthrough,
        ctx.config.delivery.cache
    );

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
