//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates an in-memory registry, a
//! temporary blob directory and a full [`AppContext`] using the native
//! backend. The [`with_server`](TestHarness::with_server) constructors start
//! Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetforged::auth::ServiceAuthorization;
use assetforged::blob::{copy_file_to_attachment, FsBlobStore};
use assetforged::config::{parse_config, Config};
use assetforged::registry::SqliteRegistry;
use assetforged::server::{create_router, AppContext};
use assetforged::transform::NativeBackend;
use assetforged_common::{Attachment, AttachmentId};
use assetforged_db::pool::init_memory_pool;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use tempfile::TempDir;

/// Profiles used across the integration tests.
pub const TEST_CONFIG: &str = r#"
[profiles.thumb]
filters = [{ op = "scale_exact", width = 100, height = 100 }]

[profiles.fit]
filters = [
    { op = "grayscale" },
    { op = "scale", width = 64, height = 64 },
]
"#;

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub auth: Arc<ServiceAuthorization>,
    pub blobs: Arc<FsBlobStore>,
    pub dir: TempDir,
}

impl TestHarness {
    /// Create a new harness with the test profiles.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a new harness with a custom configuration.
    pub fn with_config(config: Config) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let pool = init_memory_pool().expect("failed to create in-memory pool");
        let auth = Arc::new(ServiceAuthorization::new());
        let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")));

        let ctx = AppContext::new(
            config,
            Arc::new(SqliteRegistry::new(pool)),
            blobs.clone(),
            auth.clone(),
            Arc::new(NativeBackend::new()),
        )
        .expect("failed to build app context");

        Self {
            ctx,
            auth,
            blobs,
            dir,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_config(test_config()).await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = create_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Import `content` as a top-level attachment named `name`.
    pub fn import(&self, name: &str, content: &[u8]) -> Attachment {
        self.import_under(None, name, content)
    }

    pub fn import_under(
        &self,
        parent: Option<AttachmentId>,
        name: &str,
        content: &[u8],
    ) -> Attachment {
        let path = self.stage(name, content);
        self.ctx.import(&path, parent, None, None).unwrap()
    }

    /// Write `content` to an upload file named `name` and return its path.
    pub fn stage(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join("incoming").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Replace an attachment's content, advancing its revision.
    pub fn replace_content(&self, att: &mut Attachment, content: &[u8]) {
        let path = self.dir.path().join("replacement");
        std::fs::write(&path, content).unwrap();
        copy_file_to_attachment(
            self.ctx.blobs.as_ref(),
            self.ctx.registry.as_ref(),
            &path,
            att,
        )
        .unwrap();
    }

    /// Register an attachment with no stored mime type.
    pub fn insert_without_mime(&self, name: &str, content: &[u8]) -> Attachment {
        let mut att = self
            .ctx
            .registry
            .create_attachment(None, name, name, "")
            .unwrap();
        self.replace_content(&mut att, content);
        att
    }
}

pub fn test_config() -> Config {
    parse_config(TEST_CONFIG).expect("test config must parse")
}

/// Decode a stored blob, detecting the format from its content.
pub fn decode_image(path: &Path) -> DynamicImage {
    ImageReader::open(path)
        .expect("failed to open image")
        .with_guessed_format()
        .expect("failed to sniff image format")
        .decode()
        .expect("failed to decode image")
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}
