use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{CollaboratorFuture, ObjectStore};

/// Object store on the local filesystem. Objects land in `base_dir` and are
/// addressed as `{base_url}/{object_name}`; the server mounts `base_dir`
/// under that prefix.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_dir: PathBuf,
    base_url: String,
}

impl LocalStore {
    pub fn new(base_dir: PathBuf, base_url: String) -> Self {
        Self {
            base_dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn object_path(&self, object_name: &str) -> Result<PathBuf> {
        if object_name.is_empty()
            || object_name.contains(['/', '\\'])
            || object_name.starts_with('.')
        {
            return Err(anyhow!("invalid object name: {:?}", object_name));
        }
        Ok(self.base_dir.join(object_name))
    }

    fn object_name_of<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.base_url.as_str())?.strip_prefix('/')
    }
}

impl ObjectStore for LocalStore {
    fn upload(&self, bytes: Vec<u8>, object_name: String) -> CollaboratorFuture<String> {
        let this = self.clone();
        Box::pin(async move {
            let path = this.object_path(&object_name)?;
            let url = format!("{}/{}", this.base_url, object_name);
            tokio::task::spawn_blocking(move || -> Result<()> {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create store dir: {}", parent.display())
                    })?;
                }
                fs::write(&path, &bytes)
                    .with_context(|| format!("failed to write object: {}", path.display()))
            })
            .await
            .context("store task panicked")??;
            debug!("stored {}", url);
            Ok(url)
        })
    }

    fn fetch(&self, url: &str) -> CollaboratorFuture<Option<Vec<u8>>> {
        let this = self.clone();
        let name = self.object_name_of(url).map(str::to_string);
        Box::pin(async move {
            let Some(name) = name else {
                return Ok(None);
            };
            let path = this.object_path(&name)?;
            tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>> {
                if !path.exists() {
                    return Ok(None);
                }
                let bytes = fs::read(&path)
                    .with_context(|| format!("failed to read object: {}", path.display()))?;
                Ok(Some(bytes))
            })
            .await
            .context("store task panicked")?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn uploads_are_fetchable_by_url() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("objects"), "/files/".to_string());
        let url = store.upload(vec![1, 2, 3], "abc.png".to_string()).await.unwrap();
        assert_eq!(url, "/files/abc.png");
        assert_eq!(store.fetch(&url).await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.fetch("/files/missing.png").await.unwrap(), None);
        assert_eq!(store.fetch("https://elsewhere/abc.png").await.unwrap(), None);
    }

    #[tokio::test]
    async fn path_escapes_are_rejected() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf(), "/files".to_string());
        assert!(store.upload(vec![0], "../evil.png".to_string()).await.is_err());
        assert!(store.fetch("/files/../secret").await.is_err());
    }
}
