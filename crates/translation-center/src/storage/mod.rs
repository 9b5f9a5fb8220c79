//! Named, versioned state records behind a storage capability.

use std::{collections::HashMap, fmt, future::Future, str::FromStr};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tracing::info;

use crate::{entries::default_languages, error::CoreError, locations::Location, settings::Settings};

mod file;

pub use file::FileStorage;

/// Version written by this build. Older records are upgraded on load.
pub const CURRENT_STORE_VERSION: u32 = 1;

/// The three persisted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreName {
    Location,
    Translation,
    Settings,
}

impl StoreName {
    pub const ALL: [StoreName; 3] = [StoreName::Location, StoreName::Translation, StoreName::Settings];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreName::Location => "location_store",
            StoreName::Translation => "translation_store",
            StoreName::Settings => "settings_store",
        }
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "location_store" => Ok(StoreName::Location),
            "translation_store" => Ok(StoreName::Translation),
            "settings_store" => Ok(StoreName::Settings),
            other => Err(CoreError::UnknownStore { name: other.to_string() }),
        }
    }
}

/// Get/set/remove of opaque blobs by record name.
pub trait StorageAdapter: Send + Sync {
    fn get(&self, name: StoreName) -> impl Future<Output = Result<Option<String>, CoreError>> + Send;

    fn set(&self, name: StoreName, blob: String) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn remove(&self, name: StoreName) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Adapter keeping blobs in memory; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<StoreName, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageAdapter for MemoryStorage {
    async fn get(&self, name: StoreName) -> Result<Option<String>, CoreError> {
        Ok(self.blobs.lock().await.get(&name).cloned())
    }

    async fn set(&self, name: StoreName, blob: String) -> Result<(), CoreError> {
        self.blobs.lock().await.insert(name, blob);
        Ok(())
    }

    async fn remove(&self, name: StoreName) -> Result<(), CoreError> {
        self.blobs.lock().await.remove(&name);
        Ok(())
    }
}

/// Envelope written for every record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRecord<T> {
    pub state: T,
    #[serde(default)]
    pub version: u32,
}

/// Migration hook for records read with an older version.
pub trait StoreUpgrade {
    fn upgrade(&mut self, _from_version: u32) {}
}

/// Persisted registry and active pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationStoreState {
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub last_selected_location: Option<String>,
}

impl StoreUpgrade for LocationStoreState {}

/// Persisted language list. Entries are re-fetched on activation instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationStoreState {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

impl Default for TranslationStoreState {
    fn default() -> Self {
        Self { languages: default_languages() }
    }
}

impl StoreUpgrade for TranslationStoreState {
    fn upgrade(&mut self, _from_version: u32) {
        if self.languages.is_empty() {
            self.languages = default_languages();
        }
    }
}

impl StoreUpgrade for Settings {
    fn upgrade(&mut self, _from_version: u32) {
        if self.translation.default_language.trim().is_empty() {
            self.translation.default_language = Settings::default().translation.default_language;
        }
    }
}

/// Load a record, falling back to its default when absent. Old versions are
/// upgraded in memory; the upgraded form is written on the next save.
pub async fn load_record<T, S>(storage: &S, name: StoreName) -> Result<T, CoreError>
where
    T: DeserializeOwned + Default + StoreUpgrade,
    S: StorageAdapter + ?Sized,
{
    let Some(blob) = storage.get(name).await? else {
        return Ok(T::default());
    };
    let mut record: StoreRecord<T> = serde_json::from_str(&blob)
        .map_err(|source| CoreError::ParseStore { name: name.to_string(), source })?;
    if record.version < CURRENT_STORE_VERSION {
        info!(store = %name, from = record.version, to = CURRENT_STORE_VERSION, "upgrading store record");
        record.state.upgrade(record.version);
    }
    Ok(record.state)
}

pub async fn save_record<T, S>(storage: &S, name: StoreName, state: &T) -> Result<(), CoreError>
where
    T: Serialize,
    S: StorageAdapter + ?Sized,
{
    let record = StoreRecord { state, version: CURRENT_STORE_VERSION };
    let blob = serde_json::to_string_pretty(&record)
        .map_err(|source| CoreError::SerialiseStore { name: name.to_string(), source })?;
    storage.set(name, blob).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locations::LocationTag;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Runtime::new().unwrap()
    }

    #[test]
    fn missing_records_load_defaults() {
        runtime().block_on(async {
            let storage = MemoryStorage::new();
            let translations: TranslationStoreState =
                load_record(&storage, StoreName::Translation).await.unwrap();
            assert_eq!(translations.languages.len(), 34);
            let settings: Settings = load_record(&storage, StoreName::Settings).await.unwrap();
            assert_eq!(settings.translation.default_language, "en-GB");
        });
    }

    #[test]
    fn round_trips_location_store() {
        runtime().block_on(async {
            let storage = MemoryStorage::new();
            let state = LocationStoreState {
                locations: vec![Location::new("web", "/repo/web", LocationTag::Frontend)],
                last_selected_location: Some("web".into()),
            };
            save_record(&storage, StoreName::Location, &state).await.unwrap();
            let blob = storage.get(StoreName::Location).await.unwrap().unwrap();
            assert!(blob.contains("\"version\": 1"));

            let loaded: LocationStoreState =
                load_record(&storage, StoreName::Location).await.unwrap();
            assert_eq!(loaded, state);

            storage.remove(StoreName::Location).await.unwrap();
            let reset: LocationStoreState = load_record(&storage, StoreName::Location).await.unwrap();
            assert!(reset.locations.is_empty());
        });
    }

    #[test]
    fn upgrades_old_records() {
        runtime().block_on(async {
            let storage = MemoryStorage::new();
            storage
                .set(StoreName::Translation, r#"{"state":{"languages":[]},"version":0}"#.into())
                .await
                .unwrap();
            let loaded: TranslationStoreState =
                load_record(&storage, StoreName::Translation).await.unwrap();
            assert_eq!(loaded.languages, default_languages());
        });
    }

    #[test]
    fn rejects_unknown_store_names() {
        assert_eq!("settings_store".parse::<StoreName>().unwrap(), StoreName::Settings);
        let err = "statistics_store".parse::<StoreName>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownStore { .. }));
    }
}
