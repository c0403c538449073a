use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::debug;

use crate::config::{S3Config, StorageConfig};

/// Backend for uploaded media. `key` is a flat object name such as
/// `1718000000000-<uuid>.jpg`.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// Reference path handed back to clients and stored on diaries.
    fn public_path(&self, key: &str) -> String;
}

pub async fn from_config(cfg: &StorageConfig) -> anyhow::Result<std::sync::Arc<dyn StorageClient>> {
    Ok(match cfg {
        StorageConfig::Local { dir } => std::sync::Arc::new(LocalStorage::new(dir.clone()).await?),
        StorageConfig::S3(s3) => std::sync::Arc::new(S3Storage::new(s3, "us-east-1").await?),
    })
}

/// Files in a directory served under `/uploads`.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub async fn new(root: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(
            !key.is_empty() && !key.contains(['/', '\\']) && !key.starts_with('.'),
            "invalid object key {key:?}"
        );
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        debug!(key, bytes = body.len(), "stored upload on disk");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove {}", path.display()))?;
        Ok(())
    }

    fn public_path(&self, key: &str) -> String {
        format!("/uploads/{}", key)
    }
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    endpoint: String,
}

impl S3Storage {
    pub async fn new(cfg: &S3Config, region: &str) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    fn public_path(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("travel-diary-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn local_storage_writes_and_deletes_files() {
        let dir = scratch_dir();
        let storage = LocalStorage::new(dir.clone()).await.expect("create dir");

        storage
            .put_object("1-abc.png", Bytes::from_static(b"png"), "image/png")
            .await
            .expect("put");
        let on_disk = tokio::fs::read(dir.join("1-abc.png")).await.expect("read");
        assert_eq!(on_disk, b"png");
        assert_eq!(storage.public_path("1-abc.png"), "/uploads/1-abc.png");

        storage.delete_object("1-abc.png").await.expect("delete");
        assert!(!dir.join("1-abc.png").exists());

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn local_storage_rejects_path_traversal() {
        let dir = scratch_dir();
        let storage = LocalStorage::new(dir.clone()).await.expect("create dir");

        for key in ["../escape.jpg", "nested/file.jpg", ".hidden", ""] {
            assert!(
                storage
                    .put_object(key, Bytes::from_static(b"x"), "image/jpeg")
                    .await
                    .is_err(),
                "key {key:?} should be rejected"
            );
        }

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
