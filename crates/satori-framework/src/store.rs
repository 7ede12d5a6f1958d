//! JSON file storage shared by the ban and admin stores.
//!
//! Every file path maps to exactly one `tokio::sync::Mutex` for the whole
//! process, so two stores opened on the same file still serialize their
//! read-modify-write cycles.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{FrameworkError, FrameworkResult};

static FILE_LOCKS: LazyLock<parking_lot::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(Default::default);

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    FILE_LOCKS
        .lock()
        .entry(path.to_path_buf())
        .or_default()
        .clone()
}

/// A JSON document on disk holding one `T`.
///
/// A missing file reads as `T::default()` and is created on first access.
pub struct JsonFile<T> {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = lock_for(&path);
        Self {
            path,
            lock,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current document.
    pub async fn read(&self) -> FrameworkResult<T> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Applies `f` to the document and writes the result back.
    ///
    /// The file stays locked for the whole cycle.
    pub async fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> FrameworkResult<R> {
        let _guard = self.lock.lock().await;
        let mut value = self.load().await?;
        let result = f(&mut value);
        self.save(&value).await?;
        Ok(result)
    }

    async fn load(&self) -> FrameworkResult<T> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| FrameworkError::Json {
                path: self.path.display().to_string(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Creating store file");
                let value = T::default();
                self.save(&value).await?;
                Ok(value)
            }
            Err(source) => Err(self.io_error(source)),
        }
    }

    async fn save(&self, value: &T) -> FrameworkResult<()> {
        let json = serde_json::to_vec_pretty(value).map_err(|source| FrameworkError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> FrameworkError {
        FrameworkError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl<T> std::fmt::Debug for JsonFile<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFile").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Vec<String>> = JsonFile::new(dir.path().join("nested/list.json"));

        assert!(file.read().await.unwrap().is_empty());
        assert!(file.path().exists());
    }

    #[tokio::test]
    async fn test_update_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        let file: JsonFile<Vec<String>> = JsonFile::new(&path);

        let len = file
            .update(|list| {
                list.push("a".into());
                list.len()
            })
            .await
            .unwrap();
        assert_eq!(len, 1);

        let reopened: JsonFile<Vec<String>> = JsonFile::new(&path);
        assert_eq!(reopened.read().await.unwrap(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_lose_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let file: JsonFile<Vec<u32>> = JsonFile::new(&path);
                tokio::spawn(async move { file.update(|list| list.push(i)).await })
            })
            .collect();
        for task in tasks {
            tokio_test::assert_ok!(task.await.unwrap());
        }

        let file: JsonFile<Vec<u32>> = JsonFile::new(&path);
        assert_eq!(file.read().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let file: JsonFile<Vec<String>> = JsonFile::new(&path);
        assert!(matches!(
            file.read().await,
            Err(FrameworkError::Json { .. })
        ));
    }
}
