//! Integration tests for conditional delivery.

mod common;

use std::io::Read;

use assert_matches::assert_matches;
use assetforged::delivery::{DeliveryBody, DeliveryRequest, Outcome};
use common::{jpeg_bytes, png_bytes, TestHarness};

fn body_bytes(body: DeliveryBody) -> Vec<u8> {
    match body {
        DeliveryBody::Stream(mut reader) => {
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
            out
        }
        other => panic!("expected streamed body, got {:?}", other),
    }
}

#[test]
fn etag_is_pure_for_unchanged_attachment() {
    let h = TestHarness::new();
    let att = h.import("photo.png", &png_bytes(40, 40));

    let (first, _) = h.ctx.delivery.compute_etag(&att).unwrap();
    let (second, _) = h.ctx.delivery.compute_etag(&att).unwrap();
    assert_eq!(first, second);
}

#[test]
fn etag_changes_with_content() {
    let h = TestHarness::new();
    let mut att = h.import("photo.png", &png_bytes(40, 40));
    let (before, _) = h.ctx.delivery.compute_etag(&att).unwrap();

    h.replace_content(&mut att, &png_bytes(41, 41));
    let (after, _) = h.ctx.delivery.compute_etag(&att).unwrap();
    assert_ne!(before, after);
}

#[test]
fn matching_if_none_match_is_not_modified() {
    let h = TestHarness::new();
    let mut att = h.import("photo.png", &png_bytes(40, 40));
    let (etag, _) = h.ctx.delivery.compute_etag(&att).unwrap();

    let delivery = h
        .ctx
        .delivery
        .deliver(
            &mut att,
            &DeliveryRequest {
                if_none_match: Some(etag),
                if_modified_since: None,
            },
        )
        .unwrap();

    assert_eq!(delivery.outcome, Outcome::NotModified);
    assert_eq!(delivery.status, 304);
    assert_matches!(delivery.body, DeliveryBody::Empty);
}

#[test]
fn non_matching_request_gets_full_content() {
    let h = TestHarness::new();
    let content = png_bytes(40, 40);
    let mut att = h.import("photo.png", &content);
    let (etag, _) = h.ctx.delivery.compute_etag(&att).unwrap();

    for request in [
        DeliveryRequest::default(),
        DeliveryRequest {
            if_none_match: Some(format!("\"{}\"", etag)),
            if_modified_since: None,
        },
    ] {
        let delivery = h.ctx.delivery.deliver(&mut att, &request).unwrap();
        assert_eq!(delivery.outcome, Outcome::FullSend);
        assert_eq!(delivery.status, 200);
        assert_eq!(delivery.header("Content-Type"), Some("image/png"));
        assert_eq!(delivery.header("ETag"), Some(etag.as_str()));
        assert_eq!(body_bytes(delivery.body), content);
    }
}

#[test]
fn if_modified_since_requires_exact_match() {
    let h = TestHarness::new();
    let mut att = h.import("photo.png", &png_bytes(40, 40));

    let exact = DeliveryRequest {
        if_none_match: None,
        if_modified_since: Some(att.formatted_revision()),
    };
    assert_eq!(
        h.ctx.delivery.deliver(&mut att, &exact).unwrap().outcome,
        Outcome::NotModified
    );

    let newer = DeliveryRequest {
        if_none_match: None,
        if_modified_since: Some("Fri, 31 Dec 9999 23:59:59 GMT".to_string()),
    };
    assert_eq!(
        h.ctx.delivery.deliver(&mut att, &newer).unwrap().outcome,
        Outcome::FullSend
    );
}

#[test]
fn empty_mime_is_resolved_from_signature_and_persisted() {
    let h = TestHarness::new();
    let mut att = h.insert_without_mime("upload", &jpeg_bytes(16, 16));

    let delivery = h
        .ctx
        .delivery
        .deliver(&mut att, &DeliveryRequest::default())
        .unwrap();

    assert_eq!(delivery.header("Content-Type"), Some("image/jpeg"));
    assert_eq!(h.ctx.registry.get(att.id).unwrap().mime_type, "image/jpeg");
    assert!(!h.auth.is_elevated());
}

#[test]
fn mime_healing_keeps_variants_fresh() {
    let h = TestHarness::new();
    let mut att = h.insert_without_mime("upload", &png_bytes(60, 60));
    let variant = h.ctx.variants.resolve(att.id, "thumb").unwrap();
    let revised = h.ctx.registry.get(att.id).unwrap().revised;

    h.ctx
        .delivery
        .deliver(&mut att, &DeliveryRequest::default())
        .unwrap();

    assert_eq!(h.ctx.registry.get(att.id).unwrap().revised, revised);
    assert_eq!(h.ctx.variants.resolve(att.id, "thumb").unwrap(), variant);
}

#[test]
fn mime_healing_from_stale_record_keeps_current_revision() {
    let h = TestHarness::new();
    let mut current = h.insert_without_mime("upload", &png_bytes(60, 60));
    let mut stale = current.clone();
    let variant = h.ctx.variants.resolve(current.id, "thumb").unwrap();
    h.replace_content(&mut current, &png_bytes(80, 80));

    h.ctx
        .delivery
        .deliver(&mut stale, &DeliveryRequest::default())
        .unwrap();

    let stored = h.ctx.registry.get(current.id).unwrap();
    assert_eq!(stored.revised, current.revised);
    assert_eq!(stored.size, current.size);
    assert_eq!(stored.mime_type, "image/png");
    assert!(!h.ctx.variants.is_fresh(&variant, &stored));
}

#[test]
fn empty_mime_is_resolved_from_name() {
    let h = TestHarness::new();
    let mut att = h.insert_without_mime("notes.txt", b"hello plain text\n");

    let delivery = h
        .ctx
        .delivery
        .deliver(&mut att, &DeliveryRequest::default())
        .unwrap();

    assert_eq!(delivery.header("Content-Type"), Some("text/plain"));
    assert_eq!(body_bytes(delivery.body), b"hello plain text\n");
}

#[test]
fn unreadable_blob_is_io_error() {
    let h = TestHarness::new();
    let mut att = h.import("photo.png", &png_bytes(10, 10));
    std::fs::remove_file(h.ctx.blobs.path_of(&att).unwrap()).unwrap();

    assert_matches!(
        h.ctx.delivery.deliver(&mut att, &DeliveryRequest::default()),
        Err(assetforged_common::Error::Io(_))
    );
}
