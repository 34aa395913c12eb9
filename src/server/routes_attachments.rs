//! Attachment and variant serving routes.
//!
//! Handlers are thin: parse the path, run the blocking core on the
//! blocking pool, and translate the resulting [`Delivery`] into a response.

use std::io::Read;

use assetforged_common::{AttachmentId, Error};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{AppContext, AppError};
use crate::blob::COPY_CHUNK;
use crate::delivery::{Delivery, DeliveryBody, DeliveryRequest};

/// Chunks buffered between the blob reader and the response body.
const STREAM_BUFFER: usize = 8;

/// Create attachment-serving routes.
pub fn attachment_routes() -> Router<AppContext> {
    Router::new()
        .route("/attachments/:id/:name", get(serve_attachment))
        .route("/attachments/:id/:variant/:name", get(serve_variant))
}

// ============================================================================
// Handlers
// ============================================================================

/// Serve an attachment by id. The trailing name is cosmetic.
async fn serve_attachment(
    State(ctx): State<AppContext>,
    Path((id, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let id: AttachmentId = id.parse()?;

    if ctx.config.delivery.cache {
        return Ok(cache_redirect(&ctx, id, &name));
    }

    let request = delivery_request(&headers);
    let registry = ctx.registry.clone();
    let engine = ctx.delivery.clone();

    let delivery = tokio::task::spawn_blocking(move || {
        let mut att = registry.get(id)?;
        engine.deliver(&mut att, &request)
    })
    .await??;

    into_response(delivery)
}

/// Serve the variant of an attachment for a profile, generating it first
/// when it is missing or stale.
async fn serve_variant(
    State(ctx): State<AppContext>,
    Path((id, variant, name)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let id: AttachmentId = id.parse()?;

    if !ctx.variants.profiles().contains(&variant) {
        return Err(Error::not_found(format!("no variant named {}", variant)).into());
    }

    let request = delivery_request(&headers);
    let variants = ctx.variants.clone();
    let engine = ctx.delivery.clone();
    let redirect = ctx.config.delivery.cache;

    let outcome = tokio::task::spawn_blocking(move || {
        let mut att = variants.resolve(id, &variant)?;
        if redirect {
            return Ok(Err(att.id));
        }
        engine.deliver(&mut att, &request).map(Ok)
    })
    .await??;

    match outcome {
        Ok(delivery) => into_response(delivery),
        Err(variant_id) => Ok(cache_redirect(&ctx, variant_id, &name)),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn delivery_request(headers: &HeaderMap) -> DeliveryRequest {
    let value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    DeliveryRequest {
        if_none_match: value(header::IF_NONE_MATCH),
        if_modified_since: value(header::IF_MODIFIED_SINCE),
    }
}

fn cache_redirect(ctx: &AppContext, id: AttachmentId, name: &str) -> Response {
    let prefix = ctx.config.delivery.cache_url_prefix.trim_end_matches('/');
    let location = format!("{}/{}/{}", prefix, id, name);
    tracing::debug!("Redirecting {} to attachment cache at {}", id, location);
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

fn into_response(delivery: Delivery) -> Result<Response, AppError> {
    let status = StatusCode::from_u16(delivery.status)
        .map_err(|e| Error::io(format!("invalid delivery status: {}", e)))?;

    let mut builder = Response::builder().status(status);
    for (name, value) in &delivery.headers {
        builder = builder.header(*name, value.as_str());
    }

    let body = match delivery.body {
        DeliveryBody::Empty | DeliveryBody::Passthrough(_) => Body::empty(),
        DeliveryBody::Stream(reader) => Body::from_stream(stream_blob(reader)),
    };

    builder
        .body(body)
        .map_err(|e| Error::io(format!("failed to build response: {}", e)).into())
}

/// Read a blob on the blocking pool and feed it to the response in chunks.
fn stream_blob(mut reader: Box<dyn Read + Send>) -> ReceiverStream<std::io::Result<Bytes>> {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);

    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; COPY_CHUNK];
        loop {
            let chunk = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => Err(e),
            };
            let failed = chunk.is_err();
            // A closed channel means the client went away.
            if tx.blocking_send(chunk).is_err() || failed {
                break;
            }
        }
    });

    ReceiverStream::new(rx)
}
