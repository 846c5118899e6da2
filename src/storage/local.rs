//! Local filesystem blob store.
//!
//! Blobs live under a configurable root directory at their storage key
//! (`hh/hh/rest`).  Writes go to a sibling temp file with the `.tmp`
//! suffix and are published with a same-directory rename after fsync, so
//! a reader never observes a partially written blob.  A crash can only
//! leave a `.tmp` file behind, which the startup sweep reclaims.

use bytes::Bytes;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};

use super::backend::{check_range, BlobReader, BlobSink, BlobStore, StorageError};

/// Stores blobs on the local filesystem.
pub struct LocalBlobStore {
    /// Root directory for all stored blobs.
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a new store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Resolve a storage key to an absolute file path.
    ///
    /// Keys are relative paths by construction; reject anything that
    /// could escape the root.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(key);
        if rel.is_absolute() {
            return Err(StorageError::Backend(format!(
                "absolute storage key rejected: {key}"
            )));
        }
        for component in rel.components() {
            if matches!(component, std::path::Component::ParentDir) {
                return Err(StorageError::Backend(format!(
                    "path traversal detected in storage key: {key}"
                )));
            }
        }
        Ok(self.root.join(rel))
    }

    /// Sibling temp path for an in-flight write.
    fn temp_path(path: &Path) -> PathBuf {
        let mut os = path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }

    fn map_open_err(key: &str, err: io::Error) -> StorageError {
        if err.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(err)
        }
    }
}

/// In-flight write to a local temp file.
struct LocalSink {
    file: Option<fs::File>,
    temp: PathBuf,
    dest: PathBuf,
}

impl BlobSink for LocalSink {
    fn write(
        &mut self,
        chunk: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
        Box::pin(async move {
            let file = self
                .file
                .as_mut()
                .expect("write after commit/abort");
            file.write_all(&chunk).await?;
            Ok(())
        })
    }

    fn commit(
        mut self: Box<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send>> {
        Box::pin(async move {
            let mut file = self.file.take().expect("commit after commit/abort");
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&self.temp, &self.dest).await?;
            Ok(())
        })
    }

    fn abort(
        mut self: Box<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send>> {
        Box::pin(async move {
            drop(self.file.take());
            match fs::remove_file(&self.temp).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}

impl BlobStore for LocalBlobStore {
    fn open_write(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn BlobSink>, StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let dest = self.resolve(&key)?;
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).await?;
            }
            let temp = Self::temp_path(&dest);
            let file = fs::File::create(&temp).await?;
            Ok(Box::new(LocalSink {
                file: Some(file),
                temp,
                dest,
            }) as Box<dyn BlobSink>)
        })
    }

    fn read(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<BlobReader, StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.resolve(&key)?;
            let file = fs::File::open(&path)
                .await
                .map_err(|e| Self::map_open_err(&key, e))?;
            Ok(Box::new(BufReader::new(file)) as BlobReader)
        })
    }

    fn read_range(
        &self,
        key: &str,
        start: u64,
        end: u64,
    ) -> Pin<Box<dyn Future<Output = Result<BlobReader, StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.resolve(&key)?;
            let mut file = fs::File::open(&path)
                .await
                .map_err(|e| Self::map_open_err(&key, e))?;
            let size = file.metadata().await?.len();
            check_range(start, end, size)?;
            file.seek(io::SeekFrom::Start(start)).await?;
            let len = end - start + 1;
            Ok(Box::new(BufReader::new(file).take(len)) as BlobReader)
        })
    }

    fn stat(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.resolve(&key)?;
            let meta = fs::metadata(&path)
                .await
                .map_err(|e| Self::map_open_err(&key, e))?;
            Ok(meta.len())
        })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.resolve(&key)?;
            match fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn rename(
        &self,
        src: &str,
        dst: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
        let src = src.to_string();
        let dst = dst.to_string();
        Box::pin(async move {
            let src_path = self.resolve(&src)?;
            let dst_path = self.resolve(&dst)?;
            if let Some(parent) = dst_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::rename(&src_path, &dst_path)
                .await
                .map_err(|e| Self::map_open_err(&src, e))?;
            Ok(())
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, LocalBlobStore) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let store = LocalBlobStore::new(dir.path()).expect("failed to create store");
        (dir, store)
    }

    async fn write_blob(store: &LocalBlobStore, key: &str, data: &[u8]) {
        let mut sink = store.open_write(key).await.unwrap();
        sink.write(Bytes::copy_from_slice(data)).await.unwrap();
        sink.commit().await.unwrap();
    }

    async fn read_all(mut reader: BlobReader) -> Vec<u8> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_write_commit_read_roundtrip() {
        let (_dir, store) = test_store();
        write_blob(&store, "aa/bb/blob1", b"hello world").await;

        let reader = store.read("aa/bb/blob1").await.unwrap();
        assert_eq!(read_all(reader).await, b"hello world");
        assert_eq!(store.stat("aa/bb/blob1").await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_write_in_chunks() {
        let (_dir, store) = test_store();
        let mut sink = store.open_write("aa/bb/chunked").await.unwrap();
        sink.write(Bytes::from_static(b"hello ")).await.unwrap();
        sink.write(Bytes::from_static(b"world")).await.unwrap();
        sink.commit().await.unwrap();

        let reader = store.read("aa/bb/chunked").await.unwrap();
        assert_eq!(read_all(reader).await, b"hello world");
    }

    #[tokio::test]
    async fn test_uncommitted_write_is_invisible() {
        let (dir, store) = test_store();
        let mut sink = store.open_write("aa/bb/pending").await.unwrap();
        sink.write(Bytes::from_static(b"partial")).await.unwrap();

        // The final key does not exist; only the temp file does.
        assert!(matches!(
            store.read("aa/bb/pending").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(dir.path().join("aa/bb/pending.tmp").exists());

        sink.commit().await.unwrap();
        assert!(!dir.path().join("aa/bb/pending.tmp").exists());
        assert!(dir.path().join("aa/bb/pending").exists());
    }

    #[tokio::test]
    async fn test_abort_removes_temp() {
        let (dir, store) = test_store();
        let mut sink = store.open_write("aa/bb/aborted").await.unwrap();
        sink.write(Bytes::from_static(b"doomed")).await.unwrap();
        sink.abort().await.unwrap();

        assert!(!dir.path().join("aa/bb/aborted.tmp").exists());
        assert!(matches!(
            store.read("aa/bb/aborted").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_read_range_inclusive() {
        let (_dir, store) = test_store();
        write_blob(&store, "aa/bb/range", b"0123456789").await;

        let reader = store.read_range("aa/bb/range", 2, 5).await.unwrap();
        assert_eq!(read_all(reader).await, b"2345");

        let reader = store.read_range("aa/bb/range", 0, 9).await.unwrap();
        assert_eq!(read_all(reader).await, b"0123456789");

        let reader = store.read_range("aa/bb/range", 9, 9).await.unwrap();
        assert_eq!(read_all(reader).await, b"9");
    }

    #[tokio::test]
    async fn test_read_range_rejects_out_of_bounds() {
        let (_dir, store) = test_store();
        write_blob(&store, "aa/bb/short", b"0123456").await;

        assert!(matches!(
            store.read_range("aa/bb/short", 0, 7).await,
            Err(StorageError::RangeInvalid { .. })
        ));
        assert!(matches!(
            store.read_range("aa/bb/short", 7, 7).await,
            Err(StorageError::RangeInvalid { .. })
        ));
        assert!(matches!(
            store.read_range("aa/bb/short", 5, 2).await,
            Err(StorageError::RangeInvalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_nonexistent_is_not_found() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.read("aa/bb/missing").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.stat("aa/bb/missing").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = test_store();
        write_blob(&store, "aa/bb/gone", b"x").await;

        store.delete("aa/bb/gone").await.unwrap();
        assert!(matches!(
            store.read("aa/bb/gone").await,
            Err(StorageError::NotFound(_))
        ));

        // Second delete succeeds too.
        store.delete("aa/bb/gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_moves_blob() {
        let (_dir, store) = test_store();
        write_blob(&store, "aa/bb/src", b"moved").await;

        store.rename("aa/bb/src", "cc/dd/dst").await.unwrap();
        assert!(matches!(
            store.read("aa/bb/src").await,
            Err(StorageError::NotFound(_))
        ));
        let reader = store.read("cc/dd/dst").await.unwrap();
        assert_eq!(read_all(reader).await, b"moved");
    }

    #[tokio::test]
    async fn test_rename_missing_source() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.rename("aa/bb/nope", "cc/dd/dst").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let (_dir, store) = test_store();
        assert!(store.read("../outside").await.is_err());
        assert!(store.open_write("aa/../../outside").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_blob() {
        let (_dir, store) = test_store();
        let sink = store.open_write("aa/bb/empty").await.unwrap();
        sink.commit().await.unwrap();

        assert_eq!(store.stat("aa/bb/empty").await.unwrap(), 0);
        let reader = store.read("aa/bb/empty").await.unwrap();
        assert_eq!(read_all(reader).await, b"");
    }
}
