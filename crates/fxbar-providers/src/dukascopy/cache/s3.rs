//! S3 object-store cache tier.
//!
//! The store boundary is three operations (`head`, `get`, `put`) with a
//! missing key modeled as an explicit variant rather than an error, so the
//! read-through tier never uses exceptions for control flow. The production
//! implementation wraps the AWS SDK client and drives it from a dedicated
//! blocking runtime.

use crate::dukascopy::cache::{ContentKind, TickFileCache, TierCache, TierStore};
use crate::dukascopy::errors::DukascopyError;
use aws_sdk_s3::primitives::ByteStream;
use std::sync::Arc;
use tracing::{debug, info};

const TO_KB: usize = 1_024;

/// Minimal object-store contract used by the S3 tier.
pub trait ObjectStore: Send + Sync {
    /// Whether the key exists.
    fn head(&self, bucket: &str, key: &str) -> Result<bool, DukascopyError>;

    /// The object payload, or `None` when the key does not exist.
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, DukascopyError>;

    /// Store a payload with explicit content metadata.
    fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
        content_disposition: &str,
    ) -> Result<(), DukascopyError>;
}

/// Storage backend binding an [`ObjectStore`] to one bucket.
pub struct S3Store {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl S3Store {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str) -> Self {
        S3Store {
            store,
            bucket: bucket.to_string(),
        }
    }
}

impl TierStore for S3Store {
    fn name(&self) -> &'static str {
        "S3Cache"
    }

    fn bar_name(&self) -> &'static str {
        "S3BarCache"
    }

    fn check(&self, path: &str) -> Result<Option<Vec<u8>>, DukascopyError> {
        let found = self.store.get(&self.bucket, path)?;
        if found.is_some() {
            info!("retrieving s3://{}/{path}", self.bucket);
        } else {
            debug!("{path} is not in s3://{}", self.bucket);
        }
        Ok(found)
    }

    fn exists(&self, path: &str) -> Result<bool, DukascopyError> {
        self.store.head(&self.bucket, path)
    }

    fn save(&self, path: &str, data: &[u8], kind: ContentKind) -> Result<(), DukascopyError> {
        info!(
            "saving to s3://{}/{path} size {} KB",
            self.bucket,
            data.len() / TO_KB
        );
        self.store
            .put(&self.bucket, path, data, kind.content_type(), path)
    }
}

/// S3-backed tick cache tier with a fallback chain.
pub type S3Cache = TierCache<S3Store>;

impl S3Cache {
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        bucket: &str,
        fallback: Arc<dyn TickFileCache>,
    ) -> Self {
        TierCache::new(S3Store::new(store, bucket), fallback)
    }
}

/// [`ObjectStore`] over the AWS SDK.
///
/// The SDK is async-only; call sites in the cache pipeline are blocking, so
/// this store owns a small runtime and drives each request to completion on
/// it.
pub struct AwsObjectStore {
    client: aws_sdk_s3::Client,
    runtime: tokio::runtime::Runtime,
}

impl AwsObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Result<Self, DukascopyError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(DukascopyError::Io)?;
        Ok(AwsObjectStore { client, runtime })
    }
}

impl ObjectStore for AwsObjectStore {
    fn head(&self, bucket: &str, key: &str) -> Result<bool, DukascopyError> {
        let result = self.runtime.block_on(
            self.client
                .head_object()
                .bucket(bucket)
                .key(key)
                .send(),
        );
        match result {
            Ok(_) => Ok(true),
            Err(error) => {
                let missing = error
                    .as_service_error()
                    .map(|service| service.is_not_found())
                    .unwrap_or(false);
                if missing {
                    Ok(false)
                } else {
                    Err(DukascopyError::ObjectStore(error.to_string()))
                }
            }
        }
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, DukascopyError> {
        let result = self
            .runtime
            .block_on(self.client.get_object().bucket(bucket).key(key).send());
        let output = match result {
            Ok(output) => output,
            Err(error) => {
                let missing = error
                    .as_service_error()
                    .map(|service| service.is_no_such_key())
                    .unwrap_or(false);
                return if missing {
                    Ok(None)
                } else {
                    Err(DukascopyError::ObjectStore(error.to_string()))
                };
            }
        };
        let body = self
            .runtime
            .block_on(output.body.collect())
            .map_err(|error| DukascopyError::ObjectStore(error.to_string()))?;
        Ok(Some(body.into_bytes().to_vec()))
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
        content_disposition: &str,
    ) -> Result<(), DukascopyError> {
        self.runtime
            .block_on(
                self.client
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .content_type(content_type)
                    .content_disposition(content_disposition)
                    .content_length(data.len() as i64)
                    .body(ByteStream::from(data.to_vec()))
                    .send(),
            )
            .map_err(|error| DukascopyError::ObjectStore(error.to_string()))?;
        Ok(())
    }
}
