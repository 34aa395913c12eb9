//! Core type definitions for attachments.
//!
//! An [`Attachment`] is both an original upload and a generated variant:
//! a variant is simply an attachment whose `name` is a profile name and whose
//! parent is the source attachment.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::AttachmentId;

/// IMF-fixdate layout used for `Last-Modified` and validator folding.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// A named, binary-content-bearing record with an optional parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub parent_id: Option<AttachmentId>,
    pub name: String,
    pub title: String,
    /// May be empty when the uploader did not supply one.
    pub mime_type: String,
    pub size: u64,
    /// Revision timestamp; advances whenever the blob content changes.
    pub revised: DateTime<Utc>,
    /// Optional location tag used to address an attachment within its parent.
    pub location: Option<String>,
}

impl Attachment {
    /// Create a new, empty attachment record stamped with the current time.
    pub fn new(
        parent_id: Option<AttachmentId>,
        name: impl Into<String>,
        title: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: AttachmentId::new(),
            parent_id,
            name: name.into(),
            title: title.into(),
            mime_type: mime_type.into(),
            size: 0,
            revised: Utc::now(),
            location: None,
        }
    }

    /// Advance the revision timestamp after a content change.
    ///
    /// The new timestamp is strictly greater than the previous one even if
    /// the wall clock has not moved.
    pub fn touch(&mut self) {
        let floor = self.revised + Duration::nanoseconds(1);
        self.revised = Utc::now().max(floor);
    }

    /// Whether this attachment is a child of `source`.
    pub fn is_variant_of(&self, source: &Attachment) -> bool {
        self.parent_id == Some(source.id)
    }

    /// A variant is fresh iff it was revised strictly after its source.
    pub fn is_fresher_than(&self, source: &Attachment) -> bool {
        self.revised > source.revised
    }

    /// Revision timestamp in HTTP date form, as sent in `Last-Modified`.
    pub fn formatted_revision(&self) -> String {
        format_http_date(&self.revised)
    }
}

/// Format a timestamp as an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn format_http_date(ts: &DateTime<Utc>) -> String {
    ts.format(HTTP_DATE_FORMAT).to_string()
}
