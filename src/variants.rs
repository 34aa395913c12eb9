//! Variant cache manager.
//!
//! Variants are invalidated lazily: staleness is detected when a variant is
//! read, and a stale variant is deleted and regenerated on the spot. There
//! is no background sweep and no lock around the (source, profile) slot;
//! concurrent readers may both regenerate.

use std::sync::Arc;

use assetforged_common::{Attachment, AttachmentId, Error, Result};

use crate::auth::{elevate, AuthorizationContext, ELEVATION_REASON};
use crate::blob::BlobStore;
use crate::profiles::{Profile, Profiles};
use crate::registry::Registry;
use crate::transform::TransformPipeline;

/// Decides whether a cached variant is fresh and drives regeneration.
#[derive(Clone)]
pub struct VariantCache {
    registry: Arc<dyn Registry>,
    blobs: Arc<dyn BlobStore>,
    auth: Arc<dyn AuthorizationContext>,
    pipeline: TransformPipeline,
    profiles: Arc<Profiles>,
}

impl VariantCache {
    pub fn new(
        registry: Arc<dyn Registry>,
        blobs: Arc<dyn BlobStore>,
        auth: Arc<dyn AuthorizationContext>,
        pipeline: TransformPipeline,
        profiles: Arc<Profiles>,
    ) -> Self {
        Self {
            registry,
            blobs,
            auth,
            pipeline,
            profiles,
        }
    }

    pub fn profiles(&self) -> &Profiles {
        &self.profiles
    }

    /// Return a fresh variant of `source_id` for `profile_name`, generating
    /// it if it is missing or stale.
    pub fn resolve(&self, source_id: AttachmentId, profile_name: &str) -> Result<Attachment> {
        let profile = self.profiles.get(profile_name)?;
        let source = self.registry.get(source_id)?;
        self.resolve_for(&source, profile)
    }

    /// Resolve a variant of the attachment tagged `location` under `parent_id`.
    pub fn resolve_by_location(
        &self,
        parent_id: AttachmentId,
        location: &str,
        profile_name: &str,
    ) -> Result<Attachment> {
        let profile = self.profiles.get(profile_name)?;
        let source = self
            .registry
            .find_by_location(parent_id, location)?
            .ok_or_else(|| {
                Error::not_found(format!("no attachment at {} under {}", location, parent_id))
            })?;
        self.resolve_for(&source, profile)
    }

    /// Newest existing variant, fresh or not. Never generates.
    pub fn get_variant(
        &self,
        source_id: AttachmentId,
        profile_name: &str,
    ) -> Result<Option<Attachment>> {
        let profile = self.profiles.get(profile_name)?;
        Ok(self
            .registry
            .children_matching(source_id, profile.name())?
            .into_iter()
            .next())
    }

    pub fn is_fresh(&self, variant: &Attachment, source: &Attachment) -> bool {
        variant.is_fresher_than(source)
    }

    /// Configured output size of a profile, available before generation.
    pub fn declared_size(&self, profile_name: &str) -> Result<(u32, u32)> {
        Ok(self.profiles.get(profile_name)?.declared_size())
    }

    fn resolve_for(&self, source: &Attachment, profile: &Profile) -> Result<Attachment> {
        let existing = self
            .registry
            .children_matching(source.id, profile.name())?;

        if let Some(newest) = existing.first() {
            if self.is_fresh(newest, source) {
                tracing::debug!("Variant {} of {} is fresh", profile.name(), source.id);
                return Ok(newest.clone());
            }
        }

        if !existing.is_empty() {
            self.discard(source, &existing)?;
        }

        self.pipeline.generate(source, profile)
    }

    /// Delete stale variants. Rows go first so no reader picks them up;
    /// blob removal is best effort.
    fn discard(&self, source: &Attachment, stale: &[Attachment]) -> Result<()> {
        {
            let _elevated = elevate(self.auth.as_ref(), ELEVATION_REASON);
            for variant in stale {
                tracing::info!(
                    "Deleting stale variant {} ({}) of {}",
                    variant.id,
                    variant.name,
                    source.id
                );
                self.registry.delete(variant.id)?;
            }
        }

        for variant in stale {
            if let Err(e) = self.blobs.remove(variant) {
                tracing::warn!("Failed to remove blob of variant {}: {}", variant.id, e);
            }
        }
        Ok(())
    }
}
