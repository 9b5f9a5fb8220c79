use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::fs;

use super::{StorageAdapter, StoreName};
use crate::{error::CoreError, paths::Layout};

/// One JSON file per record under the layout's stores directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(layout: &Layout) -> Self {
        Self { root: layout.stores_dir().to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: StoreName) -> PathBuf {
        let file = match name {
            StoreName::Location => "locations.json",
            StoreName::Translation => "translations.json",
            StoreName::Settings => "settings.json",
        };
        self.root.join(file)
    }
}

impl StorageAdapter for FileStorage {
    async fn get(&self, name: StoreName) -> Result<Option<String>, CoreError> {
        let path = self.path_for(name);
        match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CoreError::ReadStore { path, source }),
        }
    }

    async fn set(&self, name: StoreName, blob: String) -> Result<(), CoreError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| CoreError::CreateDirectory { path: self.root.clone(), source })?;
        let path = self.path_for(name);
        fs::write(&path, blob).await.map_err(|source| CoreError::WriteStore { path, source })
    }

    async fn remove(&self, name: StoreName) -> Result<(), CoreError> {
        let path = self.path_for(name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CoreError::RemoveStore { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn writes_one_file_per_record() {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let dir = tempdir().unwrap();
            let layout = Layout::new(dir.path().to_path_buf());
            let storage = FileStorage::new(&layout);

            assert_eq!(storage.get(StoreName::Settings).await.unwrap(), None);
            storage.set(StoreName::Settings, "{}".into()).await.unwrap();
            assert!(storage.path_for(StoreName::Settings).ends_with("stores/settings.json"));
            assert_eq!(storage.get(StoreName::Settings).await.unwrap().as_deref(), Some("{}"));

            storage.remove(StoreName::Settings).await.unwrap();
            storage.remove(StoreName::Settings).await.unwrap();
            assert_eq!(storage.get(StoreName::Settings).await.unwrap(), None);
        });
    }
}
