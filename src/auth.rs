//! Privilege elevation for registry writes.
//!
//! Metadata writes and deletes run under elevated privilege. Elevation is
//! always taken through [`elevate`], whose guard leaves on drop, so every
//! exit path (including `?` and panics) releases it.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Reason recorded for every elevation performed by this crate.
pub const ELEVATION_REASON: &str = "assetforged";

/// Host authorization hook used around writes and deletes.
pub trait AuthorizationContext: Send + Sync {
    fn enter_elevated(&self, reason: &str);
    fn leave_elevated(&self);
}

/// Scoped elevation; leaves the elevated state when dropped.
#[must_use = "elevation ends as soon as the guard is dropped"]
pub struct Elevated<'a> {
    ctx: &'a dyn AuthorizationContext,
}

/// Enter elevated privilege for the lifetime of the returned guard.
pub fn elevate<'a>(ctx: &'a dyn AuthorizationContext, reason: &str) -> Elevated<'a> {
    ctx.enter_elevated(reason);
    Elevated { ctx }
}

impl Drop for Elevated<'_> {
    fn drop(&mut self) {
        self.ctx.leave_elevated();
    }
}

/// Process-wide authorization context for the service itself.
///
/// Tracks nesting depth so unbalanced use is visible in logs, and counts
/// every elevation granted.
#[derive(Debug, Default)]
pub struct ServiceAuthorization {
    depth: AtomicUsize,
    entries: AtomicUsize,
}

impl ServiceAuthorization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_elevated(&self) -> bool {
        self.depth() > 0
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Total number of elevations entered so far.
    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::SeqCst)
    }
}

impl AuthorizationContext for ServiceAuthorization {
    fn enter_elevated(&self, reason: &str) {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        let entries = self.entries.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(reason, depth, entries, "Entered elevated privilege");
    }

    fn leave_elevated(&self) {
        let previous = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1));
        match previous {
            Ok(d) => tracing::trace!(depth = d - 1, "Left elevated privilege"),
            Err(_) => tracing::warn!("leave_elevated called without matching enter_elevated"),
        }
    }
}
