/// Object storage client for project buckets
///
/// Every project gets its own bucket (`project-<slug>`), created during
/// provisioning. The platform proxies all object access through this client,
/// so the S3 credentials never leave the backend.
///
/// Built on `aws-sdk-s3` against any S3-compatible endpoint. Path-style
/// addressing is forced because MinIO and friends do not resolve
/// virtual-hosted bucket names.
///
/// # Example
///
/// ```no_run
/// use plinth_shared::storage::{ObjectStore, StorageConfig};
/// use bytes::Bytes;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = StorageConfig {
///     endpoint: "http://localhost:9000".to_string(),
///     region: "us-east-1".to_string(),
///     access_key: "minioadmin".to_string(),
///     secret_key: "minioadmin".to_string(),
/// };
///
/// let store = ObjectStore::connect(&config).await;
///
/// store.create_bucket("project-demo-1a2b3c4d").await?;
/// store
///     .upload(
///         "project-demo-1a2b3c4d",
///         "docs/readme.txt",
///         Bytes::from_static(b"hello"),
///         Some("text/plain"),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Maximum length of an object key
pub const MAX_OBJECT_KEY_LENGTH: usize = 1024;

/// Error type for object storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Object key failed validation
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Bucket does not exist
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// Underlying S3 request failed
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Connection settings for the S3-compatible backend
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Endpoint URL (e.g. "http://localhost:9000" for MinIO)
    pub endpoint: String,

    /// Region name; MinIO accepts any value
    pub region: String,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,
}

impl StorageConfig {
    /// Loads storage settings from the environment
    ///
    /// Reads `STORAGE_ENDPOINT`, `STORAGE_REGION`, `STORAGE_ACCESS_KEY`, and
    /// `STORAGE_SECRET_KEY`. Region defaults to `us-east-1` when unset.
    ///
    /// # Errors
    ///
    /// Returns the name of the first missing required variable
    pub fn from_env() -> Result<Self, String> {
        let endpoint =
            std::env::var("STORAGE_ENDPOINT").map_err(|_| "STORAGE_ENDPOINT".to_string())?;
        let region = std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let access_key =
            std::env::var("STORAGE_ACCESS_KEY").map_err(|_| "STORAGE_ACCESS_KEY".to_string())?;
        let secret_key =
            std::env::var("STORAGE_SECRET_KEY").map_err(|_| "STORAGE_SECRET_KEY".to_string())?;

        Ok(StorageConfig {
            endpoint,
            region,
            access_key,
            secret_key,
        })
    }
}

/// An object as reported by the bucket listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    /// Object key within the bucket
    pub key: String,

    /// Size in bytes
    pub size: i64,

    /// Last modification time, if the backend reports one
    pub last_modified: Option<DateTime<Utc>>,
}

/// Validates a user-supplied object key
///
/// Keys must be non-empty, at most 1024 bytes, must not start with `/`, and
/// must not contain `..` path segments. Everything else is passed through to
/// the backend as-is.
///
/// # Example
///
/// ```
/// use plinth_shared::storage::validate_object_key;
///
/// assert!(validate_object_key("docs/readme.txt").is_ok());
/// assert!(validate_object_key("/absolute").is_err());
/// assert!(validate_object_key("a/../b").is_err());
/// assert!(validate_object_key("").is_err());
/// ```
pub fn validate_object_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LENGTH {
        return Err(StorageError::InvalidKey(key.to_string()));
    }

    if key.starts_with('/') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }

    if key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }

    Ok(())
}

/// S3-compatible object store client
///
/// Cheap to clone; the inner SDK client is reference-counted.
#[derive(Clone)]
pub struct ObjectStore {
    client: aws_sdk_s3::Client,
}

impl ObjectStore {
    /// Builds a client against the configured endpoint
    pub async fn connect(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "plinth-storage",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        // MinIO does not resolve virtual-hosted bucket names
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        ObjectStore {
            client: aws_sdk_s3::Client::from_conf(s3_config),
        }
    }

    /// Creates a bucket, tolerating one that this deployment already owns
    ///
    /// Provisioning retries make duplicate creation attempts normal, so
    /// "already owned by you" is treated as success.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the request for any other
    /// reason
    pub async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let result = self.client.create_bucket().bucket(bucket).send().await;

        match result {
            Ok(_) => {
                info!(bucket = bucket, "Created storage bucket");
                Ok(())
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_bucket_already_owned_by_you() {
                    debug!(bucket = bucket, "Bucket already exists, continuing");
                    Ok(())
                } else {
                    Err(StorageError::Backend(service_err.to_string()))
                }
            }
        }
    }

    /// Checks whether a bucket exists
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::Backend(service_err.to_string()))
                }
            }
        }
    }

    /// Deletes a bucket and everything in it
    ///
    /// S3 refuses to delete non-empty buckets, so all objects are removed
    /// first. Used when a project is deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or deletion fails partway; the bucket may
    /// be left partially emptied
    pub async fn delete_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let objects = self.list(bucket, None).await?;

        for object in &objects {
            self.client
                .delete_object()
                .bucket(bucket)
                .key(&object.key)
                .send()
                .await
                .map_err(|err| StorageError::Backend(err.into_service_error().to_string()))?;
        }

        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| StorageError::Backend(err.into_service_error().to_string()))?;

        info!(
            bucket = bucket,
            objects = objects.len(),
            "Deleted storage bucket"
        );

        Ok(())
    }

    /// Uploads an object
    ///
    /// # Arguments
    ///
    /// * `bucket` - Target bucket
    /// * `key` - Object key, validated before the request
    /// * `body` - Object contents
    /// * `content_type` - MIME type to store with the object
    ///
    /// # Returns
    ///
    /// The stored object's key and size
    ///
    /// # Errors
    ///
    /// Returns an error if the key fails validation or the upload fails
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<StoredObject, StorageError> {
        validate_object_key(key)?;

        let size = body.len() as i64;

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|err| StorageError::Backend(err.into_service_error().to_string()))?;

        debug!(bucket = bucket, key = key, size = size, "Uploaded object");

        Ok(StoredObject {
            key: key.to_string(),
            size,
            last_modified: Some(Utc::now()),
        })
    }

    /// Downloads an object
    ///
    /// # Returns
    ///
    /// The object body and stored content type, or None if the key does not
    /// exist
    pub async fn download(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<(Bytes, Option<String>)>, StorageError> {
        validate_object_key(key)?;

        let result = self.client.get_object().bucket(bucket).key(key).send().await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(StorageError::Backend(service_err.to_string()));
            }
        };

        let content_type = output.content_type().map(|ct| ct.to_string());

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?
            .into_bytes();

        Ok(Some((body, content_type)))
    }

    /// Lists objects in a bucket
    ///
    /// Follows continuation tokens until the listing is exhausted.
    ///
    /// # Arguments
    ///
    /// * `bucket` - Bucket to list
    /// * `prefix` - Optional key prefix filter
    pub async fn list(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<StoredObject>, StorageError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);

            if let Some(prefix) = prefix {
                request = request.prefix(prefix);
            }

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_bucket() {
                    StorageError::BucketNotFound(bucket.to_string())
                } else {
                    StorageError::Backend(service_err.to_string())
                }
            })?;

            for item in output.contents() {
                let Some(key) = item.key() else {
                    continue;
                };

                objects.push(StoredObject {
                    key: key.to_string(),
                    size: item.size().unwrap_or(0),
                    last_modified: item.last_modified().and_then(|t| {
                        DateTime::from_timestamp(t.secs(), t.subsec_nanos())
                    }),
                });
            }

            continuation_token = output.next_continuation_token().map(|t| t.to_string());
            if continuation_token.is_none() {
                break;
            }
        }

        Ok(objects)
    }

    /// Deletes an object
    ///
    /// # Returns
    ///
    /// `true` if the object existed and was deleted, `false` if it did not
    /// exist
    pub async fn delete(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        validate_object_key(key)?;

        let existed = match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => true,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    false
                } else {
                    return Err(StorageError::Backend(service_err.to_string()));
                }
            }
        };

        if !existed {
            return Ok(false);
        }

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| StorageError::Backend(err.into_service_error().to_string()))?;

        debug!(bucket = bucket, key = key, "Deleted object");

        Ok(true)
    }

    /// Measures total bytes stored in a bucket
    ///
    /// Sums object sizes from a full listing. Quota checks run this before
    /// every upload, which is fine at project scale but worth caching if
    /// buckets grow past a few thousand objects.
    pub async fn usage(&self, bucket: &str) -> Result<i64, StorageError> {
        let objects = self.list(bucket, None).await?;
        let total = objects.iter().map(|o| o.size).sum();

        if objects.len() >= 10_000 {
            warn!(
                bucket = bucket,
                objects = objects.len(),
                "Large bucket listing for usage measurement"
            );
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_object_key_accepts_normal_keys() {
        assert!(validate_object_key("readme.txt").is_ok());
        assert!(validate_object_key("docs/2024/report.pdf").is_ok());
        assert!(validate_object_key("with spaces.png").is_ok());
        assert!(validate_object_key("trailing/").is_ok());
    }

    #[test]
    fn test_validate_object_key_rejects_empty_and_overlong() {
        assert!(validate_object_key("").is_err());

        let long = "a".repeat(MAX_OBJECT_KEY_LENGTH + 1);
        assert!(validate_object_key(&long).is_err());

        let max = "a".repeat(MAX_OBJECT_KEY_LENGTH);
        assert!(validate_object_key(&max).is_ok());
    }

    #[test]
    fn test_validate_object_key_rejects_traversal() {
        assert!(validate_object_key("/absolute/path").is_err());
        assert!(validate_object_key("..").is_err());
        assert!(validate_object_key("a/../b").is_err());
        assert!(validate_object_key("../escape").is_err());
        assert!(validate_object_key("nested/..").is_err());

        // Dots inside a segment are fine
        assert!(validate_object_key("archive..tar").is_ok());
        assert!(validate_object_key(".hidden").is_ok());
    }

    #[test]
    fn test_stored_object_serialization() {
        let object = StoredObject {
            key: "docs/readme.txt".to_string(),
            size: 1024,
            last_modified: None,
        };

        let json = serde_json::to_value(&object).unwrap();
        assert_eq!(json["key"], "docs/readme.txt");
        assert_eq!(json["size"], 1024);
    }

    #[test]
    fn test_storage_config_from_env_missing() {
        std::env::remove_var("STORAGE_ENDPOINT");
        let err = StorageConfig::from_env().unwrap_err();
        assert_eq!(err, "STORAGE_ENDPOINT");
    }
}

// Integration tests against a real MinIO instance are in the tests/ directory.
