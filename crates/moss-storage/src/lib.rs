//! ---
//! moss_section: "07-storage-archival"
//! moss_subsection: "module"
//! moss_type: "source"
//! moss_scope: "code"
//! moss_description: "Archive bucket handle and object stores for data products."
//! moss_version: "v0.0.0-prealpha"
//! moss_owner: "tbd"
//! ---
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use moss_common::StoragePartition;

/// Environment variable naming the S3-compatible gateway endpoint used when
/// mock mode is off. In production the gateway and bucket already exist.
pub const ENV_S3_ENDPOINT: &str = "MOSS_S3_ENDPOINT";

const BUCKET_PREFIX: &str = "rubinobs-lfa";

/// Errors raised by archive storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{ENV_S3_ENDPOINT} is not set; cannot reach the object storage service")]
    EndpointUnset,
    #[error("bucket {bucket} does not exist")]
    BucketMissing { bucket: String },
    #[error("object {key} not found in bucket {bucket}")]
    ObjectNotFound { bucket: String, key: String },
    #[error("object storage request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Object storage backend behind an [`ArchiveBucket`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError>;
    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), StorageError>;
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;
}

/// In-process store used in mock mode.
#[derive(Default)]
struct MemoryObjectStore {
    buckets: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let mut buckets = self.buckets.lock().await;
        buckets.entry(bucket.to_owned()).or_default();
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let mut buckets = self.buckets.lock().await;
        let Some(objects) = buckets.get_mut(bucket) else {
            return Err(StorageError::BucketMissing {
                bucket: bucket.to_owned(),
            });
        };
        objects.insert(key.to_owned(), data);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let buckets = self.buckets.lock().await;
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| StorageError::ObjectNotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            })
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        let buckets = self.buckets.lock().await;
        Ok(buckets
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key)))
    }
}

/// Store backed by an S3-compatible HTTP gateway (path-style addressing).
struct HttpObjectStore {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpObjectStore {
    fn from_env() -> Result<Self, StorageError> {
        let endpoint = std::env::var(ENV_S3_ENDPOINT)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(StorageError::EndpointUnset)?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            client: reqwest::Client::new(),
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, bucket, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let url = format!("{}/{}", self.endpoint, bucket);
        let response = self.client.put(&url).send().await?;
        // 409 means the bucket already exists, which satisfies create-if-absent.
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }
        response.error_for_status()?;
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let response = self
            .client
            .put(self.object_url(bucket, key))
            .body(data)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::BucketMissing {
                bucket: bucket.to_owned(),
            });
        }
        response.error_for_status()?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.client.get(self.object_url(bucket, key)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::ObjectNotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            });
        }
        let bytes = response.error_for_status()?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        let response = self.client.head(self.object_url(bucket, key)).send().await?;
        Ok(response.status().is_success())
    }
}

/// Handle to the archive bucket for one storage partition.
///
/// Created lazily, once per process, on first entry into an operating state;
/// the orchestrator keeps it for the remainder of the process lifetime.
pub struct ArchiveBucket {
    name: String,
    mock: bool,
    store: Box<dyn ObjectStore>,
}

impl std::fmt::Debug for ArchiveBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveBucket")
            .field("name", &self.name)
            .field("mock", &self.mock)
            .finish()
    }
}

impl ArchiveBucket {
    /// Canonical bucket name for a storage partition.
    pub fn make_bucket_name(partition: StoragePartition) -> String {
        format!("{BUCKET_PREFIX}-{partition}")
    }

    /// Obtain the archive bucket handle for `partition`.
    ///
    /// `mock` routes all operations to an in-process store. `create`
    /// provisions the bucket when absent; production buckets must already
    /// exist, so `create` is only used under simulation.
    pub async fn obtain(
        partition: StoragePartition,
        create: bool,
        mock: bool,
    ) -> Result<Self, StorageError> {
        let name = Self::make_bucket_name(partition);
        let store: Box<dyn ObjectStore> = if mock {
            Box::new(MemoryObjectStore::default())
        } else {
            Box::new(HttpObjectStore::from_env()?)
        };
        if create {
            store.create_bucket(&name).await?;
        }
        debug!(bucket = %name, create, mock, "archive bucket handle obtained");
        Ok(Self { name, mock, store })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_mock(&self) -> bool {
        self.mock
    }

    pub async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        self.store.put_object(&self.name, key, data).await
    }

    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.store.get_object(&self.name, key).await
    }

    pub async fn object_exists(&self, key: &str) -> Result<bool, StorageError> {
        self.store.object_exists(&self.name, key).await
    }
}

/// Object key for an archived data product, grouped by instance, product
/// generator, and observation date.
pub fn make_object_key(sal_index: u32, generator: &str, taken_at: DateTime<Utc>) -> String {
    format!(
        "MOSS:{sal_index}/{generator}/{}/{generator}_{}.dat",
        taken_at.format("%Y/%m/%d"),
        taken_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
    )
}
