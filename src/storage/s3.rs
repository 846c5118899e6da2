//! S3-compatible gateway blob store.
//!
//! Proxies blob operations to an S3-compatible bucket (AWS, MinIO,
//! LocalStack) so Teledrop can run without local blob storage.
//!
//! Writes spool to a local temp file first and upload on `commit`, which
//! keeps the sink's memory bounded and gives aborts nothing to undo
//! remotely.  Credentials resolve via the standard AWS credential chain
//! unless explicit keys are configured.

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::operation::copy_object::CopyObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::backend::{check_range, BlobReader, BlobSink, BlobStore, StorageError};
use crate::config::S3StorageConfig;

/// Gateway store that forwards blob operations to an S3 bucket.
pub struct S3BlobStore {
    /// AWS S3 SDK client.
    client: Client,
    /// The remote bucket name.
    bucket: String,
    /// Key prefix for all blobs in the bucket.
    prefix: String,
    /// Local directory for spooling in-flight uploads.
    spool: PathBuf,
}

impl S3BlobStore {
    /// Create a new S3 gateway store.
    ///
    /// Loads credentials from the default chain (environment variables,
    /// `~/.aws/credentials`, IAM role) unless the config carries explicit
    /// keys, and honors custom endpoints for S3-compatible stores.
    pub async fn new(cfg: &S3StorageConfig, spool: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(cfg.region.clone()));

        if !cfg.endpoint_url.is_empty() {
            config_loader = config_loader.endpoint_url(&cfg.endpoint_url);
        }

        if !cfg.access_key_id.is_empty() && !cfg.secret_access_key.is_empty() {
            let creds = aws_sdk_s3::config::Credentials::new(
                &cfg.access_key_id,
                &cfg.secret_access_key,
                None, // session_token
                None, // expiry
                "teledrop-config",
            );
            config_loader = config_loader.credentials_provider(creds);
        }

        let sdk_config = config_loader.load().await;
        let s3_config_builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(cfg.use_path_style);
        let client = Client::from_conf(s3_config_builder.build());

        let spool = spool.into();
        std::fs::create_dir_all(&spool)?;

        info!(
            "S3 gateway store initialized: bucket={} prefix='{}'",
            cfg.bucket, cfg.prefix
        );

        Ok(Self {
            client,
            bucket: cfg.bucket.clone(),
            prefix: cfg.prefix.clone(),
            spool,
        })
    }

    /// Map a storage key to the upstream S3 key.
    fn s3_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Spool path for an in-flight upload.
    fn spool_path(&self) -> PathBuf {
        self.spool
            .join(format!("{}.tmp", uuid::Uuid::new_v4()))
    }

    /// Map an AWS SDK error to a [`StorageError`] with context.
    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> StorageError {
        StorageError::Backend(format!("S3 {context}: {err}"))
    }

    /// Map a `copy_object` failure.  A missing source key comes back as
    /// an unmodeled `NoSuchKey` on this operation rather than a typed
    /// variant, so match on the error code.
    fn map_copy_error(src: &str, err: CopyObjectError) -> StorageError {
        if err.code() == Some("NoSuchKey") {
            StorageError::NotFound(src.to_string())
        } else {
            Self::map_sdk_error("copy_object", err)
        }
    }
}

/// In-flight write spooled to a local temp file.
struct S3Sink {
    client: Client,
    bucket: String,
    s3_key: String,
    spool_path: PathBuf,
    file: Option<fs::File>,
}

impl S3Sink {
    async fn discard_spool(path: &PathBuf) {
        let _ = fs::remove_file(path).await;
    }
}

impl BlobSink for S3Sink {
    fn write(
        &mut self,
        chunk: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
        Box::pin(async move {
            let file = self.file.as_mut().expect("write after commit/abort");
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

            debug!("S3 put_object: bucket={} key={}", self.bucket, self.s3_key);
            let body = ByteStream::from_path(&self.spool_path)
                .await
                .map_err(|e| S3BlobStore::map_sdk_error("spool read", e))?;
            let result = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&self.s3_key)
                .body(body)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| S3BlobStore::map_sdk_error("put_object", e));

            Self::discard_spool(&self.spool_path).await;
            result
        })
    }

    fn abort(
        mut self: Box<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send>> {
        Box::pin(async move {
            drop(self.file.take());
            Self::discard_spool(&self.spool_path).await;
            Ok(())
        })
    }
}

impl BlobStore for S3BlobStore {
    fn open_write(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn BlobSink>, StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let spool_path = self.spool_path();
            let file = fs::File::create(&spool_path).await?;
            Ok(Box::new(S3Sink {
                client: self.client.clone(),
                bucket: self.bucket.clone(),
                s3_key: self.s3_key(&key),
                spool_path,
                file: Some(file),
            }) as Box<dyn BlobSink>)
        })
    }

    fn read(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<BlobReader, StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let s3_key = self.s3_key(&key);
            debug!("S3 get_object: bucket={} key={}", self.bucket, s3_key);

            let resp = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&s3_key)
                .send()
                .await
                .map_err(|e| {
                    let service_err = e.into_service_error();
                    if service_err.is_no_such_key() {
                        StorageError::NotFound(key.clone())
                    } else {
                        Self::map_sdk_error("get_object", service_err)
                    }
                })?;

            Ok(Box::new(resp.body.into_async_read()) as BlobReader)
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
            // Validate against the actual size first so an over-long range
            // surfaces as RangeInvalid, not a service error.
            let size = self.stat(&key).await?;
            check_range(start, end, size)?;

            let s3_key = self.s3_key(&key);
            debug!(
                "S3 get_object range={}-{}: bucket={} key={}",
                start, end, self.bucket, s3_key
            );

            let resp = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&s3_key)
                .range(format!("bytes={start}-{end}"))
                .send()
                .await
                .map_err(|e| {
                    let service_err = e.into_service_error();
                    if service_err.is_no_such_key() {
                        StorageError::NotFound(key.clone())
                    } else {
                        Self::map_sdk_error("get_object", service_err)
                    }
                })?;

            Ok(Box::new(resp.body.into_async_read()) as BlobReader)
        })
    }

    fn stat(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let s3_key = self.s3_key(&key);
            debug!("S3 head_object: bucket={} key={}", self.bucket, s3_key);

            let resp = self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(&s3_key)
                .send()
                .await
                .map_err(|e| {
                    let service_err = e.into_service_error();
                    if service_err.is_not_found() {
                        StorageError::NotFound(key.clone())
                    } else {
                        Self::map_sdk_error("head_object", service_err)
                    }
                })?;

            let len = resp.content_length().unwrap_or(0);
            u64::try_from(len)
                .map_err(|_| StorageError::Backend(format!("negative content length for {key}")))
        })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let s3_key = self.s3_key(&key);
            debug!("S3 delete_object: bucket={} key={}", self.bucket, s3_key);

            // S3 delete_object is idempotent -- no error for missing keys.
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&s3_key)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_object", e))?;
            Ok(())
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
            let src_s3_key = self.s3_key(&src);
            let dst_s3_key = self.s3_key(&dst);
            debug!(
                "S3 copy_object: src={}/{} dst={}/{}",
                self.bucket, src_s3_key, self.bucket, dst_s3_key
            );

            let copy_source = format!("{}/{}", self.bucket, src_s3_key);
            self.client
                .copy_object()
                .bucket(&self.bucket)
                .key(&dst_s3_key)
                .copy_source(&copy_source)
                .send()
                .await
                .map_err(|e| Self::map_copy_error(&src, e.into_service_error()))?;

            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&src_s3_key)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_object", e))?;
            Ok(())
        })
    }
}

// -- Tests -------------------------------------------------------------------
