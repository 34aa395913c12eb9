//! Blob storage backing attachments.
//!
//! Blobs live on the filesystem under `{base_dir}/{id[0..2]}/{id}`. Writes
//! go to a temporary sibling and are renamed into place on commit, so a
//! reader never observes a partially written blob.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use assetforged_common::{Attachment, Result};
use tempfile::NamedTempFile;

use crate::registry::Registry;

/// Chunk size used when streaming files into blobs.
pub const COPY_CHUNK: usize = 128 * 1024;

/// A byte sink whose content becomes visible only after [`commit`](BlobSink::commit).
pub trait BlobSink: Write + Send {
    /// Publish the written bytes; returns the blob size.
    fn commit(self: Box<Self>) -> Result<u64>;
}

/// Storage for attachment payloads.
pub trait BlobStore: Send + Sync {
    fn open_read(&self, att: &Attachment) -> Result<Box<dyn Read + Send>>;
    fn open_write(&self, att: &Attachment) -> Result<Box<dyn BlobSink>>;
    /// Filesystem path of the blob, for backends and passthrough offload.
    fn path_of(&self, att: &Attachment) -> Result<PathBuf>;
    /// Remove the blob; a missing blob is not an error.
    fn remove(&self, att: &Attachment) -> Result<()>;
}

/// Filesystem blob store.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    base_dir: PathBuf,
}

impl FsBlobStore {
    /// Create a new `FsBlobStore` rooted at `base_dir`.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn blob_path(&self, att: &Attachment) -> PathBuf {
        let id = att.id.to_string();
        self.base_dir.join(&id[..2]).join(id)
    }
}

impl BlobStore for FsBlobStore {
    fn open_read(&self, att: &Attachment) -> Result<Box<dyn Read + Send>> {
        let file = File::open(self.blob_path(att))?;
        Ok(Box::new(BufReader::with_capacity(COPY_CHUNK, file)))
    }

    fn open_write(&self, att: &Attachment) -> Result<Box<dyn BlobSink>> {
        let dest = self.blob_path(att);
        let dir = dest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone());
        std::fs::create_dir_all(&dir)?;

        let tmp = NamedTempFile::new_in(&dir)?;
        Ok(Box::new(FsBlobSink {
            tmp,
            dest,
            written: 0,
        }))
    }

    fn path_of(&self, att: &Attachment) -> Result<PathBuf> {
        Ok(self.blob_path(att))
    }

    fn remove(&self, att: &Attachment) -> Result<()> {
        match std::fs::remove_file(self.blob_path(att)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

struct FsBlobSink {
    tmp: NamedTempFile,
    dest: PathBuf,
    written: u64,
}

impl Write for FsBlobSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.tmp.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.tmp.flush()
    }
}

impl BlobSink for FsBlobSink {
    fn commit(self: Box<Self>) -> Result<u64> {
        let FsBlobSink {
            mut tmp,
            dest,
            written,
        } = *self;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| e.error)?;
        Ok(written)
    }
}

/// Stream a file into an attachment's blob and persist the new metadata.
///
/// Advances the attachment's revision timestamp and records the new size.
/// The caller is responsible for elevation around the registry write.
pub fn copy_file_to_attachment(
    blobs: &dyn BlobStore,
    registry: &dyn Registry,
    file: &Path,
    att: &mut Attachment,
) -> Result<()> {
    let mut src = BufReader::with_capacity(COPY_CHUNK, File::open(file)?);
    let mut sink = blobs.open_write(att)?;
    std::io::copy(&mut src, &mut sink)?;
    att.size = sink.commit()?;
    att.touch();
    registry.update(att)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_path_layout() {
        let store = FsBlobStore::new(PathBuf::from("/data/blobs"));
        let att = Attachment::new(None, "a.jpg", "A", "image/jpeg");
        let id = att.id.to_string();
        let expected = PathBuf::from(format!("/data/blobs/{}/{}", &id[..2], id));
        assert_eq!(store.path_of(&att).unwrap(), expected);
    }

    #[test]
    fn test_write_commit_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf());
        let att = Attachment::new(None, "a.txt", "A", "text/plain");

        let mut sink = store.open_write(&att).unwrap();
        sink.write_all(b"hello blob").unwrap();
        assert_eq!(sink.commit().unwrap(), 10);

        let mut content = String::new();
        store
            .open_read(&att)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello blob");
    }

    #[test]
    fn test_uncommitted_write_is_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf());
        let att = Attachment::new(None, "a.txt", "A", "text/plain");

        {
            let mut sink = store.open_write(&att).unwrap();
            sink.write_all(b"partial").unwrap();
        }

        assert!(!store.path_of(&att).unwrap().exists());
        assert!(store.open_read(&att).is_err());
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf());
        let att = Attachment::new(None, "a.txt", "A", "text/plain");
        store.remove(&att).unwrap();
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf());
        let att = Attachment::new(None, "a.txt", "A", "text/plain");

        let mut sink = store.open_write(&att).unwrap();
        sink.write_all(b"x").unwrap();
        sink.commit().unwrap();

        store.remove(&att).unwrap();
        assert!(!store.path_of(&att).unwrap().exists());
    }
}
