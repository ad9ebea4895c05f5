use async_trait::async_trait;

use crate::error::AppError;

/// Trait for attachment blob storage.
///
/// Abstracted as a trait so the local and S3 backends are interchangeable and
/// tests can use a mock without a real bucket.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store an attachment under a name derived from `suggested_name`.
    ///
    /// Returns the reference (relative path or URL) to record on the
    /// document as `attachmentPath`.
    async fn store(&self, suggested_name: &str, content: Vec<u8>) -> Result<String, AppError>;

    /// Retrieve an attachment by the name `store` generated. Returns `None`
    /// if it doesn't exist.
    async fn fetch(&self, name: &str) -> Result<Option<Vec<u8>>, AppError>;
}

/// Build a unique stored file name: `<stem>-<unix millis>-<random><.ext>`.
///
/// The stem is the part of the client's file name before the first dot; the
/// extension is the last one. Both are restricted to `[A-Za-z0-9_-]`.
pub fn attachment_file_name(suggested_name: &str) -> String {
    let base = suggested_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(suggested_name);

    let stem = match base.split('.').next() {
        Some(stem) if !stem.is_empty() => sanitize(stem),
        _ => "attachment".to_string(),
    };
    let extension = std::path::Path::new(base)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", sanitize(ext)))
        .unwrap_or_default();

    format!(
        "{}-{}-{}{}",
        stem,
        chrono::Utc::now().timestamp_millis(),
        rand::random_range(0..1_000_000_000u32),
        extension
    )
}

/// Whether `name` is a plain file name that cannot escape the store root.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && !name.contains(|c: char| c == '/' || c == '\\')
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// S3 implementation of AttachmentStore.
///
/// Only available when the `managed` feature is enabled.
#[cfg(feature = "managed")]
pub struct S3AttachmentStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    public_url: Option<String>,
}

#[cfg(feature = "managed")]
impl S3AttachmentStore {
    /// Create a client from `S3Config`. Credentials come from the standard
    /// AWS provider chain.
    pub async fn from_config(config: &crate::config::S3Config) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            config_loader = config_loader.region(aws_config::Region::new(region.clone()));
        }

        // Support custom S3 endpoint (for MinIO, LocalStack, etc.)
        if let Some(endpoint) = &config.endpoint {
            config_loader = config_loader.endpoint_url(endpoint);
        }

        let sdk_config = config_loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        Self::new(
            aws_sdk_s3::Client::from_conf(s3_config),
            config.bucket.clone(),
            config.prefix.clone(),
            config.public_url.clone(),
        )
    }

    /// Create with explicit values (useful for testing / DI).
    pub fn new(
        client: aws_sdk_s3::Client,
        bucket: String,
        prefix: String,
        public_url: Option<String>,
    ) -> Self {
        Self {
            client,
            bucket,
            prefix,
            public_url,
        }
    }

    fn key(&self, name: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        }
    }

    fn reference(&self, name: &str) -> String {
        match &self.public_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), self.key(name)),
            None => format!("/api/attachments/{name}"),
        }
    }
}

#[cfg(feature = "managed")]
#[async_trait]
impl AttachmentStore for S3AttachmentStore {
    async fn store(&self, suggested_name: &str, content: Vec<u8>) -> Result<String, AppError> {
        let name = attachment_file_name(suggested_name);
        let key = self.key(&name);
        let content_type = mime_guess::from_path(&name).first_or_octet_stream();
        let size = content.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type.essence_str())
            .body(content.into())
            .send()
            .await
            .map_err(|e| {
                AppError::AttachmentStoreUnavailable(format!(
                    "Failed to put object '{}': {}",
                    key,
                    e.into_service_error()
                ))
            })?;

        tracing::debug!(bucket = %self.bucket, key = %key, size, "Attachment stored");

        Ok(self.reference(&name))
    }

    async fn fetch(&self, name: &str) -> Result<Option<Vec<u8>>, AppError> {
        if !is_safe_name(name) {
            return Ok(None);
        }
        let key = self.key(name);

        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => {
                let bytes = output.body.collect().await.map_err(|e| {
                    AppError::AttachmentStoreUnavailable(format!("Failed to read body: {}", e))
                })?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(AppError::AttachmentStoreUnavailable(format!(
                        "Failed to get object '{}': {}",
                        key, service_err
                    )))
                }
            }
        }
    }
}
