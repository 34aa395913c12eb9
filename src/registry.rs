//! Attachment registry.
//!
//! The registry owns attachment metadata. [`SqliteRegistry`] is the
//! production implementation over `assetforged_db`; the core only sees the
//! [`Registry`] trait.

use assetforged_common::{Attachment, AttachmentId, Error, Result};
use assetforged_db::pool::{get_conn, DbPool};
use assetforged_db::queries::attachments;

/// Attachment metadata store.
pub trait Registry: Send + Sync {
    /// Fetch an attachment; `Error::NotFound` if it does not exist.
    fn get(&self, id: AttachmentId) -> Result<Attachment>;

    /// Children of `parent_id` named `name`, newest revision first.
    fn children_matching(&self, parent_id: AttachmentId, name: &str) -> Result<Vec<Attachment>>;

    /// First child of `parent_id` tagged with `location`.
    fn find_by_location(&self, parent_id: AttachmentId, location: &str)
        -> Result<Option<Attachment>>;

    fn delete(&self, id: AttachmentId) -> Result<()>;

    /// Register a new attachment with an empty blob.
    fn create_attachment(
        &self,
        parent_id: Option<AttachmentId>,
        name: &str,
        title: &str,
        mime_type: &str,
    ) -> Result<Attachment>;

    /// Persist the record as given; the revision is not advanced here.
    fn update(&self, att: &Attachment) -> Result<()>;

    /// Store a resolved mime type without touching any other field.
    fn set_mime_type(&self, id: AttachmentId, mime_type: &str) -> Result<()>;

    fn create_child(
        &self,
        parent_id: AttachmentId,
        name: &str,
        title: &str,
        mime_type: &str,
    ) -> Result<Attachment> {
        self.create_attachment(Some(parent_id), name, title, mime_type)
    }
}

/// SQLite-backed registry.
#[derive(Clone)]
pub struct SqliteRegistry {
    pool: DbPool,
}

impl SqliteRegistry {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl Registry for SqliteRegistry {
    fn get(&self, id: AttachmentId) -> Result<Attachment> {
        let conn = get_conn(&self.pool)?;
        attachments::get_attachment(&conn, id)?
            .ok_or_else(|| Error::not_found(format!("attachment {}", id)))
    }

    fn children_matching(&self, parent_id: AttachmentId, name: &str) -> Result<Vec<Attachment>> {
        let conn = get_conn(&self.pool)?;
        attachments::children_named(&conn, parent_id, name)
    }

    fn find_by_location(
        &self,
        parent_id: AttachmentId,
        location: &str,
    ) -> Result<Option<Attachment>> {
        let conn = get_conn(&self.pool)?;
        attachments::get_by_location(&conn, parent_id, location)
    }

    fn delete(&self, id: AttachmentId) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        if !attachments::delete_attachment(&conn, id)? {
            tracing::debug!("Attachment {} was already gone", id);
        }
        Ok(())
    }

    fn create_attachment(
        &self,
        parent_id: Option<AttachmentId>,
        name: &str,
        title: &str,
        mime_type: &str,
    ) -> Result<Attachment> {
        let att = Attachment::new(parent_id, name, title, mime_type);
        let conn = get_conn(&self.pool)?;
        attachments::insert_attachment(&conn, &att)?;
        Ok(att)
    }

    fn update(&self, att: &Attachment) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        attachments::update_attachment(&conn, att)
    }

    fn set_mime_type(&self, id: AttachmentId, mime_type: &str) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        attachments::set_mime_type(&conn, id, mime_type)
    }
}
