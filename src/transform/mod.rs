//! Transform pipeline.
//!
//! Turns a source attachment and a profile into a new variant attachment:
//! the backend writes into a transient staging file, the staging file is
//! streamed into the blob store, and the variant's metadata is persisted
//! under elevated privilege.

mod backend;
mod magick;
pub mod tools;

pub use backend::{essence, NativeBackend, TransformBackend};
pub use magick::{filter_args, MagickBackend};

use std::path::Path;
use std::sync::Arc;

use assetforged_common::{Attachment, Error, Result};
use chrono::Duration;
use tempfile::NamedTempFile;

use crate::auth::{elevate, AuthorizationContext, ELEVATION_REASON};
use crate::blob::{copy_file_to_attachment, BlobStore};
use crate::config::{BackendKind, TransformConfig};
use crate::mime::MimeResolver;
use crate::profiles::Profile;
use crate::registry::Registry;

/// Build the backend selected in configuration.
pub fn backend_from_config(config: &TransformConfig) -> Result<Arc<dyn TransformBackend>> {
    match config.backend {
        BackendKind::Native => Ok(Arc::new(NativeBackend::new())),
        BackendKind::ImageMagick => Ok(Arc::new(MagickBackend::discover(
            config.tool_path.as_deref(),
        )?)),
    }
}

/// Generates variant attachments through a [`TransformBackend`].
#[derive(Clone)]
pub struct TransformPipeline {
    registry: Arc<dyn Registry>,
    blobs: Arc<dyn BlobStore>,
    auth: Arc<dyn AuthorizationContext>,
    backend: Arc<dyn TransformBackend>,
    mime: MimeResolver,
}

impl TransformPipeline {
    pub fn new(
        registry: Arc<dyn Registry>,
        blobs: Arc<dyn BlobStore>,
        auth: Arc<dyn AuthorizationContext>,
        backend: Arc<dyn TransformBackend>,
    ) -> Self {
        Self {
            registry,
            blobs,
            auth,
            backend,
            mime: MimeResolver::new(),
        }
    }

    /// Generate a new variant of `source` for `profile`.
    ///
    /// On any failure no variant row is left behind and the staging file
    /// is removed.
    pub fn generate(&self, source: &Attachment, profile: &Profile) -> Result<Attachment> {
        let source_path = self.blobs.path_of(source)?;
        let source = self.ensure_mime_type(source, &source_path)?;

        if !self.backend.supports(&source.mime_type) {
            return Err(Error::generation(format!(
                "{} backend cannot transform {} ({})",
                self.backend.name(),
                source.mime_type,
                source.id
            )));
        }

        let staging = tempfile::Builder::new()
            .prefix(&format!("{}_{}", source.id, profile.name()))
            .tempfile()?;

        tracing::info!(
            "Generating variant {} of {} with {} backend",
            profile.name(),
            source.id,
            self.backend.name()
        );

        self.backend.transform(
            &source_path,
            &source.mime_type,
            profile.filters(),
            staging.path(),
        )?;

        let produced = std::fs::metadata(staging.path())?.len();
        if produced == 0 {
            return Err(Error::generation(format!(
                "{} backend produced no output for {} of {}",
                self.backend.name(),
                profile.name(),
                source.id
            )));
        }

        let variant = self.store_variant(&source, profile, &staging)?;
        close_staging(staging);
        Ok(variant)
    }

    /// Create the child row and fill its blob; the row is removed again if
    /// the blob cannot be written.
    fn store_variant(
        &self,
        source: &Attachment,
        profile: &Profile,
        staging: &NamedTempFile,
    ) -> Result<Attachment> {
        let _elevated = elevate(self.auth.as_ref(), ELEVATION_REASON);

        let mut variant = self.registry.create_child(
            source.id,
            profile.name(),
            &source.title,
            &source.mime_type,
        )?;

        let stored = copy_file_to_attachment(
            self.blobs.as_ref(),
            self.registry.as_ref(),
            staging.path(),
            &mut variant,
        )
        .and_then(|()| {
            // Clock skew must not make a brand-new variant look stale.
            if !variant.is_fresher_than(source) {
                variant.revised = source.revised + Duration::nanoseconds(1);
                self.registry.update(&variant)?;
            }
            Ok(())
        });

        if let Err(e) = stored {
            tracing::warn!("Discarding half-written variant {}: {}", variant.id, e);
            if let Err(cleanup) = self.registry.delete(variant.id) {
                tracing::warn!("Failed to delete variant row {}: {}", variant.id, cleanup);
            }
            if let Err(cleanup) = self.blobs.remove(&variant) {
                tracing::warn!("Failed to remove variant blob {}: {}", variant.id, cleanup);
            }
            return Err(e);
        }

        tracing::debug!(
            "Stored variant {} ({} bytes) for {}",
            variant.id,
            variant.size,
            source.id
        );
        Ok(variant)
    }

    /// Resolve and persist a missing mime type on the source.
    fn ensure_mime_type(&self, source: &Attachment, path: &Path) -> Result<Attachment> {
        let mut source = source.clone();
        if source.mime_type.is_empty() {
            source.mime_type = self.mime.resolve_named(path, &source.name);
            tracing::warn!(
                "Source {} had no mime type, resolved {}",
                source.id,
                source.mime_type
            );
            let _elevated = elevate(self.auth.as_ref(), ELEVATION_REASON);
            self.registry.set_mime_type(source.id, &source.mime_type)?;
        }
        Ok(source)
    }
}

fn close_staging(staging: NamedTempFile) {
    let path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        tracing::warn!("Failed to remove staging file {}: {}", path.display(), e);
    }
}
