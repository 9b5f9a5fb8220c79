use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

use super::{GatewayError, SyncGateway, UpdatedKeyValues};
use crate::{
    entries::TranslationEntry,
    locations::{LocationTag, ScanSummary},
};

/// In-process backend keeping translation files as entry lists per path.
///
/// Used by tests and by `serve --demo`. Every call is recorded so callers can
/// assert which operations reached the backend.
#[derive(Debug)]
pub struct MemoryGateway {
    default_language: String,
    inner: Mutex<MemoryBackend>,
}

#[derive(Debug, Default)]
struct MemoryBackend {
    files: HashMap<String, Vec<TranslationEntry>>,
    fail_next: Option<String>,
    calls: Vec<&'static str>,
}

impl MemoryBackend {
    fn begin(&mut self, operation: &'static str) -> Result<(), GatewayError> {
        self.calls.push(operation);
        match self.fail_next.take() {
            Some(message) => {
                debug!(operation, %message, "memory gateway failing call on request");
                Err(GatewayError::Rejected { message })
            }
            None => Ok(()),
        }
    }

    fn file(&mut self, path: &str) -> Result<&mut Vec<TranslationEntry>, GatewayError> {
        self.files
            .get_mut(path)
            .ok_or_else(|| GatewayError::Rejected { message: format!("unknown location {path}") })
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new("en-GB")
    }
}

impl MemoryGateway {
    pub fn new(default_language: impl Into<String>) -> Self {
        Self { default_language: default_language.into(), inner: Mutex::new(MemoryBackend::default()) }
    }

    pub fn with_location(mut self, path: &str, entries: Vec<TranslationEntry>) -> Self {
        self.inner.get_mut().files.insert(path.to_string(), entries);
        self
    }

    /// Replace the files of `path`, as an edit outside the client would.
    pub async fn set_entries(&self, path: &str, entries: Vec<TranslationEntry>) {
        self.inner.lock().await.files.insert(path.to_string(), entries);
    }

    pub async fn entries(&self, path: &str) -> Option<Vec<TranslationEntry>> {
        self.inner.lock().await.files.get(path).cloned()
    }

    /// Make the next call fail with `message`.
    pub async fn fail_next(&self, message: impl Into<String>) {
        self.inner.lock().await.fail_next = Some(message.into());
    }

    /// Names of the operations received so far.
    pub async fn calls(&self) -> Vec<&'static str> {
        self.inner.lock().await.calls.clone()
    }

    fn summarise(&self, entries: &[TranslationEntry]) -> ScanSummary {
        let untranslated =
            entries.iter().filter(|entry| entry.is_untranslated(&self.default_language)).count();
        ScanSummary { keys: entries.len() as u32, untranslated_keys: untranslated as u32 }
    }
}

impl SyncGateway for MemoryGateway {
    async fn list_translations(&self, path: &str) -> Result<Vec<TranslationEntry>, GatewayError> {
        let mut inner = self.inner.lock().await;
        inner.begin("list_translations")?;
        Ok(inner.file(path)?.clone())
    }

    async fn add_key(
        &self,
        path: &str,
        ts_key: &str,
        json_key: &str,
        value: &str,
    ) -> Result<Vec<TranslationEntry>, GatewayError> {
        let mut inner = self.inner.lock().await;
        inner.begin("add_key")?;
        let file = inner.file(path)?;
        if file.iter().any(|entry| entry.key == ts_key || entry.value == json_key) {
            return Err(GatewayError::Rejected { message: format!("key {ts_key} already exists") });
        }
        file.push(
            TranslationEntry::new(ts_key, json_key).with_translation(&self.default_language, value),
        );
        Ok(file.clone())
    }

    async fn remove_keys(
        &self,
        path: &str,
        ts_keys: &[String],
        json_keys: &[String],
    ) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().await;
        inner.begin("remove_keys")?;
        inner
            .file(path)?
            .retain(|entry| !ts_keys.contains(&entry.key) && !json_keys.contains(&entry.value));
        Ok(())
    }

    async fn update_keys(&self, path: &str, key: &UpdatedKeyValues) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().await;
        inner.begin("update_keys")?;
        let entry = inner
            .file(path)?
            .iter_mut()
            .find(|entry| entry.key == key.ts_key && entry.value == key.json_key)
            .ok_or_else(|| GatewayError::Rejected {
                message: format!("key {} not found", key.ts_key),
            })?;
        for (language, text) in &key.translation_values {
            entry.translations.insert(language.clone(), text.clone());
        }
        Ok(())
    }

    async fn add_location(&self, path: &str, _name: &str) -> Result<ScanSummary, GatewayError> {
        let mut inner = self.inner.lock().await;
        inner.begin("add_location")?;
        let entries = inner.files.entry(path.to_string()).or_default().clone();
        Ok(self.summarise(&entries))
    }

    async fn rescan_location(
        &self,
        path: &str,
        _tag: LocationTag,
    ) -> Result<ScanSummary, GatewayError> {
        let mut inner = self.inner.lock().await;
        inner.begin("rescan_location")?;
        let entries = inner.file(path)?.clone();
        Ok(self.summarise(&entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_and_fails_on_request() {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let gateway = MemoryGateway::default().with_location(
                "/repo/web",
                vec![TranslationEntry::new("A", "a").with_translation("en-GB", "Hello")],
            );

            gateway.fail_next("disk full").await;
            let err = gateway
                .remove_keys("/repo/web", &["A".to_string()], &["a".to_string()])
                .await;
            assert!(matches!(err, Err(GatewayError::Rejected { .. })));
            assert_eq!(gateway.entries("/repo/web").await.unwrap().len(), 1);

            let entries = gateway.add_key("/repo/web", "B", "b", "Bye").await.unwrap();
            assert_eq!(entries.len(), 2);
            let summary = gateway.rescan_location("/repo/web", LocationTag::Frontend).await.unwrap();
            assert_eq!(summary, ScanSummary { keys: 2, untranslated_keys: 2 });

            assert_eq!(gateway.calls().await, ["remove_keys", "add_key", "rescan_location"]);
        });
    }
}
