use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;

/// Blob storage for uploaded images, addressed by a flat key.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes) -> anyhow::Result<()>;
    /// Removing a key that does not exist is not an error.
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    fn public_url(&self, key: &str) -> String;
}

/// Files under a fixed public directory, served elsewhere under `base_url`.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(is_flat_key(key), "invalid object key {:?}", key);
        Ok(self.root.join(key))
    }
}

fn is_flat_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\', '\0'])
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create image dir {}", self.root.display()))?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}
