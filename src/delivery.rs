//! Conditional delivery engine.
//!
//! One pass per request: hash the blob, compare validators, then answer
//! either "not modified" or with full content. The outcome is returned as
//! data; turning it into a network response is the transport's job.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use assetforged_common::{Attachment, Result};
use sha2::{Digest, Sha256};

use crate::auth::{elevate, AuthorizationContext, ELEVATION_REASON};
use crate::blob::{BlobStore, COPY_CHUNK};
use crate::mime::MimeResolver;
use crate::registry::Registry;

pub const STATUS_OK: u16 = 200;
pub const STATUS_NOT_MODIFIED: u16 = 304;

/// Header used to hand transmission off to the front-end server.
pub const SENDFILE_HEADER: &str = "X-Sendfile";

/// Conditional request headers, passed verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

/// Validators computed for one attachment revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    pub etag: String,
    pub last_modified: String,
}

impl Validators {
    /// Both comparisons are exact string equality.
    pub fn evaluate(&self, request: &DeliveryRequest) -> Outcome {
        let etag_matches = request.if_none_match.as_deref() == Some(self.etag.as_str());
        let date_matches =
            request.if_modified_since.as_deref() == Some(self.last_modified.as_str());

        if etag_matches || date_matches {
            Outcome::NotModified
        } else {
            Outcome::FullSend
        }
    }
}

/// Terminal state of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NotModified,
    FullSend,
}

/// Where the response body comes from.
pub enum DeliveryBody {
    Empty,
    /// The transport sends the file at this path itself.
    Passthrough(PathBuf),
    Stream(Box<dyn Read + Send>),
}

impl fmt::Debug for DeliveryBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Passthrough(path) => f.debug_tuple("Passthrough").field(path).finish(),
            Self::Stream(_) => write!(f, "Stream(..)"),
        }
    }
}

/// Result of [`DeliveryEngine::deliver`].
#[derive(Debug)]
pub struct Delivery {
    pub outcome: Outcome,
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: DeliveryBody,
}

impl Delivery {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Answers delivery requests for attachments.
#[derive(Clone)]
pub struct DeliveryEngine {
    registry: Arc<dyn Registry>,
    blobs: Arc<dyn BlobStore>,
    auth: Arc<dyn AuthorizationContext>,
    mime: MimeResolver,
    passthrough: bool,
}

impl DeliveryEngine {
    pub fn new(
        registry: Arc<dyn Registry>,
        blobs: Arc<dyn BlobStore>,
        auth: Arc<dyn AuthorizationContext>,
        passthrough: bool,
    ) -> Self {
        Self {
            registry,
            blobs,
            auth,
            mime: MimeResolver::new(),
            passthrough,
        }
    }

    /// Composite ETag: SHA-256 over the full blob, then the formatted
    /// revision. Returns the hex digest and the number of blob bytes read.
    pub fn compute_etag(&self, att: &Attachment) -> Result<(String, u64)> {
        let mut reader = self.blobs.open_read(att)?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut total = 0u64;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        hasher.update(att.formatted_revision().as_bytes());
        Ok((hex::encode(hasher.finalize()), total))
    }

    /// Answer a request for `att`.
    ///
    /// When the stored mime type is empty and full content is sent, the
    /// resolved type is written back to `att` and persisted.
    pub fn deliver(&self, att: &mut Attachment, request: &DeliveryRequest) -> Result<Delivery> {
        let (etag, length) = self.compute_etag(att)?;
        let validators = Validators {
            etag,
            last_modified: att.formatted_revision(),
        };

        match validators.evaluate(request) {
            Outcome::NotModified => {
                tracing::debug!("Attachment {} not modified", att.id);
                Ok(Delivery {
                    outcome: Outcome::NotModified,
                    status: STATUS_NOT_MODIFIED,
                    headers: vec![
                        ("ETag", validators.etag),
                        ("Last-Modified", validators.last_modified),
                    ],
                    body: DeliveryBody::Empty,
                })
            }
            Outcome::FullSend => self.full_send(att, validators, length),
        }
    }

    fn full_send(
        &self,
        att: &mut Attachment,
        validators: Validators,
        length: u64,
    ) -> Result<Delivery> {
        let path = self.blobs.path_of(att)?;
        if att.mime_type.is_empty() {
            att.mime_type = self.mime.resolve_named(&path, &att.name);
            tracing::warn!(
                "Attachment {} had no mime type, resolved {}",
                att.id,
                att.mime_type
            );
            // The caller's record may predate a content write.
            let _elevated = elevate(self.auth.as_ref(), ELEVATION_REASON);
            self.registry.set_mime_type(att.id, &att.mime_type)?;
        }

        let mut headers = vec![
            ("Content-Type", att.mime_type.clone()),
            ("ETag", validators.etag),
            ("Last-Modified", validators.last_modified),
        ];

        let body = if self.passthrough {
            headers.push((SENDFILE_HEADER, path.display().to_string()));
            DeliveryBody::Passthrough(path)
        } else {
            headers.push(("Content-Length", length.to_string()));
            DeliveryBody::Stream(self.blobs.open_read(att)?)
        };

        Ok(Delivery {
            outcome: Outcome::FullSend,
            status: STATUS_OK,
            headers,
            body,
        })
    }
}
