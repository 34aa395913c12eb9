//! Mime type resolution.
//!
//! A fallback chain, each step only tried when the previous one came up
//! empty:
//!
//! 1. platform content-type lookup by file extension, preferring the
//!    attachment's name since stored blobs carry none
//! 2. magic-byte signature inspection
//! 3. image header sniffing
//! 4. a fixed constant for unknown binary content

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Returned when nothing in the chain recognises the content.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Bytes read from the head of a file for signature checks.
const SNIFF_LEN: usize = 512;

/// Known content signatures: (offset, magic bytes, mime type).
const SIGNATURES: &[(usize, &[u8], &str)] = &[
    (0, b"%PDF-", "application/pdf"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"\x1f\x8b", "application/gzip"),
    (0, b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    (0, b"Rar!\x1a\x07", "application/vnd.rar"),
    (0, b"\x7fELF", "application/x-executable"),
    (0, b"OggS", "audio/ogg"),
    (0, b"fLaC", "audio/flac"),
    (0, b"ID3", "audio/mpeg"),
    (0, b"\x1a\x45\xdf\xa3", "video/x-matroska"),
    (4, b"ftyp", "video/mp4"),
    (0, b"{\\rtf", "application/rtf"),
    (0, b"<?xml", "application/xml"),
    (0, b"%!PS", "application/postscript"),
];

/// Which step of the chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeSource {
    Platform,
    Signature,
    ImageHeader,
    Fallback,
}

/// Stateless mime resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeResolver;

impl MimeResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the mime type of the file at `path`.
    pub fn resolve(&self, path: &Path) -> String {
        self.resolve_with_source(path, None).0
    }

    /// Resolve the content at `path`, using `name` for the extension lookup.
    pub fn resolve_named(&self, path: &Path, name: &str) -> String {
        self.resolve_with_source(path, Some(name)).0
    }

    /// Resolve and report which step of the chain answered.
    pub fn resolve_with_source(&self, path: &Path, name: Option<&str>) -> (String, MimeSource) {
        let by_extension = name
            .and_then(|n| platform_lookup(Path::new(n)))
            .or_else(|| platform_lookup(path));
        if let Some(mime) = by_extension {
            return (mime, MimeSource::Platform);
        }

        let head = match read_head(path) {
            Ok(head) => head,
            Err(e) => {
                tracing::debug!("Cannot sniff {}: {}", path.display(), e);
                Vec::new()
            }
        };

        if let Some(mime) = signature_lookup(&head) {
            return (mime.to_string(), MimeSource::Signature);
        }

        if let Some(mime) = image_header_lookup(&head) {
            return (mime.to_string(), MimeSource::ImageHeader);
        }

        (FALLBACK_MIME_TYPE.to_string(), MimeSource::Fallback)
    }
}

/// Extension-based lookup against the platform mime table.
fn platform_lookup(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
}

fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(head)
}

fn signature_lookup(head: &[u8]) -> Option<&'static str> {
    SIGNATURES.iter().find_map(|(offset, magic, mime)| {
        head.get(*offset..)
            .filter(|rest| rest.starts_with(magic))
            .map(|_| *mime)
    })
}

fn image_header_lookup(head: &[u8]) -> Option<&'static str> {
    image::guess_format(head).ok().map(|f| f.to_mime_type())
}
