//! Shared fixtures for unit tests.

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assetforged_common::{Attachment, Result};
use assetforged_db::pool::init_memory_pool;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use tempfile::TempDir;

use crate::auth::ServiceAuthorization;
use crate::blob::{BlobStore, FsBlobStore};
use crate::profiles::Filter;
use crate::registry::{Registry, SqliteRegistry};
use crate::transform::{NativeBackend, TransformBackend};

pub struct Fixture {
    pub dir: TempDir,
    pub registry: Arc<SqliteRegistry>,
    pub blobs: Arc<FsBlobStore>,
    pub auth: Arc<ServiceAuthorization>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")));
        Self {
            registry: Arc::new(SqliteRegistry::new(init_memory_pool().unwrap())),
            blobs,
            auth: Arc::new(ServiceAuthorization::new()),
            dir,
        }
    }

    /// Register a top-level attachment holding `content`.
    pub fn add_source(&self, name: &str, mime_type: &str, content: &[u8]) -> Attachment {
        let mut att = self
            .registry
            .create_attachment(None, name, name, mime_type)
            .unwrap();
        self.write_blob(&mut att, content);
        att
    }

    /// Replace an attachment's content, advancing its revision.
    pub fn write_blob(&self, att: &mut Attachment, content: &[u8]) {
        let mut sink = self.blobs.open_write(att).unwrap();
        sink.write_all(content).unwrap();
        att.size = sink.commit().unwrap();
        att.touch();
        self.registry.update(att).unwrap();
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Decode an image by sniffing its content; blob paths have no extension.
pub fn decode(path: &Path) -> DynamicImage {
    ImageReader::open(path)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .decode()
        .unwrap()
}

/// Native backend that counts how often it was invoked.
#[derive(Default)]
pub struct CountingBackend {
    inner: NativeBackend,
    pub calls: AtomicUsize,
}

impl CountingBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TransformBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn supports(&self, mime_type: &str) -> bool {
        self.inner.supports(mime_type)
    }

    fn transform(
        &self,
        source: &Path,
        mime_type: &str,
        filters: &[Filter],
        dest: &Path,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.transform(source, mime_type, filters, dest)
    }
}

/// Backend that accepts everything and writes nothing.
pub struct SilentBackend;

impl TransformBackend for SilentBackend {
    fn name(&self) -> &str {
        "silent"
    }

    fn supports(&self, _mime_type: &str) -> bool {
        true
    }

    fn transform(
        &self,
        _source: &Path,
        _mime_type: &str,
        _filters: &[Filter],
        _dest: &Path,
    ) -> Result<()> {
        Ok(())
    }
}
