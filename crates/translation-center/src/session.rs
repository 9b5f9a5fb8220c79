//! The editor context: one owner for the entry cache, the location registry
//! and the view projection of the running application.
//!
//! State lives behind a single async mutex that is never held across a
//! gateway call. Every fetch-and-reconcile carries a [`FetchTicket`]; a
//! response whose ticket is no longer the latest, or whose location is no
//! longer active, is dropped instead of overwriting newer state.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use specta::Type;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    entries::{Duplicate, EntryStore, TranslationEntry, check_unique},
    error::{CoreError, SyncOperation},
    gateway::{SyncGateway, UpdatedKeyValues},
    locations::{Location, LocationRegistry, LocationTag, ScanSummary},
    reconcile::{Divergence, changed_translations, reconcile},
    settings::Settings,
    storage::{
        LocationStoreState, StorageAdapter, StoreName, TranslationStoreState, load_record,
        save_record,
    },
    view::{ViewMetrics, ViewProjection},
};

/// Upper bound for keys, values and location names.
pub const MAX_FIELD_LEN: usize = 255;

/// Identifies one fetch. Only the latest ticket may write to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    path: String,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Type)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Applied {
        added: Vec<String>,
        removed: Vec<String>,
        divergences: Vec<Divergence>,
        /// Set when the backend returned a repeated key or value.
        #[serde(skip_serializing_if = "Option::is_none")]
        duplicate: Option<Duplicate>,
    },
    Stale,
}

impl FetchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, FetchOutcome::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Type)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Nothing differed from the cached entry; the backend was not called.
    Unchanged,
    Updated { languages: Vec<String>, fetch: FetchOutcome },
}

/// Owned copy of the current page, safe to hand out past the state lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Type)]
pub struct PageSnapshot {
    pub location: Option<String>,
    pub filter: String,
    pub entries: Vec<TranslationEntry>,
    pub page_index: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub filtered_count: usize,
    pub total_count: usize,
    pub untranslated_count: usize,
    pub selected: Vec<String>,
    pub page_selected: bool,
}

#[derive(Debug)]
struct EditorState {
    store: EntryStore,
    registry: LocationRegistry,
    view: ViewProjection,
    settings: Settings,
    generation: u64,
}

impl EditorState {
    fn active_path(&self) -> Result<String, CoreError> {
        self.registry.active().map(|loc| loc.path.clone()).ok_or(CoreError::NoActiveLocation)
    }

    fn issue_ticket(&mut self, path: String) -> FetchTicket {
        self.generation += 1;
        FetchTicket { generation: self.generation, path }
    }

    fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
            && self.registry.active().is_some_and(|loc| loc.path == ticket.path)
    }

    fn reset_entries(&mut self) {
        self.store.replace_all(Vec::new());
        self.view.clear_selection();
        self.view.set_page(0);
        self.view.sync(&self.store);
    }

    fn location_record(&self) -> LocationStoreState {
        LocationStoreState {
            locations: self.registry.list().to_vec(),
            last_selected_location: self.registry.active_name().map(str::to_string),
        }
    }
}

pub struct EditorContext<G, S> {
    gateway: G,
    storage: S,
    state: Mutex<EditorState>,
}

impl<G, S> EditorContext<G, S>
where
    G: SyncGateway,
    S: StorageAdapter,
{
    pub fn new(gateway: G, storage: S, metrics: ViewMetrics) -> Self {
        Self {
            gateway,
            storage,
            state: Mutex::new(EditorState {
                store: EntryStore::default(),
                registry: LocationRegistry::new(),
                view: ViewProjection::new(metrics),
                settings: Settings::default(),
                generation: 0,
            }),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Load the persisted records. Entries are not fetched; call
    /// [`Self::refresh`] once the active location should be shown.
    pub async fn restore(&self) -> Result<(), CoreError> {
        let locations: LocationStoreState = load_record(&self.storage, StoreName::Location).await?;
        let translations: TranslationStoreState =
            load_record(&self.storage, StoreName::Translation).await?;
        let settings: Settings = load_record(&self.storage, StoreName::Settings).await?;

        let mut state = self.state.lock().await;
        state.registry = LocationRegistry::from_parts(
            locations.locations,
            locations.last_selected_location,
        );
        state.store = EntryStore::new(translations.languages);
        state.settings = settings;
        state.generation += 1;
        let EditorState { view, store, .. } = &mut *state;
        view.clear_selection();
        view.sync(store);
        info!(
            locations = state.registry.len(),
            active = state.registry.active_name(),
            "restored editor state"
        );
        Ok(())
    }

    // ---- locations ---------------------------------------------------------

    pub async fn locations(&self) -> Vec<Location> {
        self.state.lock().await.registry.list().to_vec()
    }

    pub async fn active_location(&self) -> Option<Location> {
        self.state.lock().await.registry.active().cloned()
    }

    /// Register a new location after the backend has scanned it.
    pub async fn add_location(
        &self,
        name: &str,
        path: &str,
        tag: LocationTag,
    ) -> Result<Location, CoreError> {
        let name = name.trim();
        let path = path.trim();
        validate_field("name", name)?;
        if path.is_empty() {
            return Err(CoreError::EmptyField { field: "path" });
        }
        {
            let state = self.state.lock().await;
            if state.registry.get(name).is_some() {
                return Err(CoreError::DuplicateLocationName { name: name.to_string() });
            }
            if state.registry.find_by_path(path).is_some() {
                return Err(CoreError::DuplicateLocationPath { path: path.to_string() });
            }
        }

        let summary = self
            .gateway
            .add_location(path, name)
            .await
            .map_err(|source| CoreError::sync(SyncOperation::AddLocation, source))?;

        let location = Location::new(name, path, tag).with_summary(summary);
        let record = {
            let mut state = self.state.lock().await;
            state.registry.add(location.clone())?;
            state.location_record()
        };
        info!(location = name, path, keys = summary.keys, "location added");
        self.persist(StoreName::Location, &record).await;
        Ok(location)
    }

    /// Remove a location. Removing the active one also empties the entry cache.
    pub async fn remove_location(&self, name: &str) -> Result<Location, CoreError> {
        let (removed, record) = {
            let mut state = self.state.lock().await;
            let was_active = state.registry.active_name() == Some(name);
            let removed = state
                .registry
                .remove(name)
                .ok_or_else(|| CoreError::LocationNotFound { name: name.to_string() })?;
            if was_active {
                state.generation += 1;
                state.reset_entries();
            }
            (removed, state.location_record())
        };
        info!(location = name, "location removed");
        self.persist(StoreName::Location, &record).await;
        Ok(removed)
    }

    pub async fn toggle_favourite(&self, name: &str) -> Result<bool, CoreError> {
        let (favourite, record) = {
            let mut state = self.state.lock().await;
            let favourite = state.registry.toggle_favourite(name)?;
            (favourite, state.location_record())
        };
        self.persist(StoreName::Location, &record).await;
        Ok(favourite)
    }

    /// Point the editor at `name`: reset the cache and fetch its entries.
    /// Fetches still in flight for the previous location become stale.
    pub async fn activate_location(&self, name: &str) -> Result<FetchOutcome, CoreError> {
        let (ticket, record) = {
            let mut state = self.state.lock().await;
            let path = state.registry.set_active(name)?.path.clone();
            state.reset_entries();
            let ticket = state.issue_ticket(path);
            (ticket, state.location_record())
        };
        info!(location = name, generation = ticket.generation, "location activated");
        self.persist(StoreName::Location, &record).await;
        self.fetch(ticket).await
    }

    /// Ask the backend to rescan the active location, update its counters and
    /// reconcile the cache with the rescanned files.
    pub async fn rescan(&self) -> Result<(ScanSummary, FetchOutcome), CoreError> {
        let (name, path, tag) = {
            let state = self.state.lock().await;
            let location = state.registry.active().ok_or(CoreError::NoActiveLocation)?;
            (location.name.clone(), location.path.clone(), location.tag)
        };
        let summary = self
            .gateway
            .rescan_location(&path, tag)
            .await
            .map_err(|source| CoreError::sync(SyncOperation::RescanLocation, source))?;

        let record = {
            let mut state = self.state.lock().await;
            match state.registry.update_summary(&name, summary) {
                Ok(()) => Some(state.location_record()),
                Err(_) => {
                    debug!(location = %name, "location removed during rescan, counters dropped");
                    None
                }
            }
        };
        if let Some(record) = record {
            self.persist(StoreName::Location, &record).await;
        }
        let outcome = self.refresh().await?;
        Ok((summary, outcome))
    }

    // ---- fetch & reconcile -------------------------------------------------

    /// Issue a ticket for the active location, superseding older ones.
    pub async fn begin_fetch(&self) -> Result<FetchTicket, CoreError> {
        let mut state = self.state.lock().await;
        let path = state.active_path()?;
        Ok(state.issue_ticket(path))
    }

    /// Reconcile `fresh` into the cache if `ticket` is still current.
    pub async fn apply_fetch(
        &self,
        ticket: &FetchTicket,
        fresh: Vec<TranslationEntry>,
    ) -> FetchOutcome {
        let (outcome, languages) = {
            let mut state = self.state.lock().await;
            if !state.is_current(ticket) {
                debug!(
                    generation = ticket.generation,
                    latest = state.generation,
                    path = %ticket.path,
                    "discarding stale fetch"
                );
                return FetchOutcome::Stale;
            }

            let duplicate = check_unique(&fresh);
            if let Some(duplicate) = &duplicate {
                warn!(
                    path = %ticket.path,
                    ?duplicate,
                    entries = fresh.len(),
                    "backend returned entries that are not unique"
                );
            }
            let result = reconcile(state.store.entries(), &fresh);
            for divergence in &result.divergences {
                info!(
                    key = %divergence.key,
                    languages = divergence.changes.len(),
                    path = %ticket.path,
                    "translations changed outside the editor"
                );
            }
            if state.store.entries() != result.merged.as_slice() {
                state.store.replace_all(result.merged);
            }
            let grew = state.store.extend_languages_from_entries();
            let EditorState { view, store, .. } = &mut *state;
            view.sync(store);

            let languages = grew
                .then(|| TranslationStoreState { languages: state.store.languages().to_vec() });
            let outcome = FetchOutcome::Applied {
                added: result.added,
                removed: result.removed,
                divergences: result.divergences,
                duplicate,
            };
            (outcome, languages)
        };

        if let Some(record) = languages {
            self.persist(StoreName::Translation, &record).await;
        }
        outcome
    }

    /// Fetch the full entry set of the active location and reconcile it.
    pub async fn refresh(&self) -> Result<FetchOutcome, CoreError> {
        let ticket = self.begin_fetch().await?;
        self.fetch(ticket).await
    }

    async fn fetch(&self, ticket: FetchTicket) -> Result<FetchOutcome, CoreError> {
        let fresh = self
            .gateway
            .list_translations(&ticket.path)
            .await
            .map_err(|source| CoreError::sync(SyncOperation::ListTranslations, source))?;
        Ok(self.apply_fetch(&ticket, fresh).await)
    }

    // ---- mutations ---------------------------------------------------------

    /// Create a key whose default-language text is `value`. Duplicates are
    /// rejected before the backend is contacted.
    pub async fn add_key(
        &self,
        ts_key: &str,
        json_key: &str,
        value: &str,
    ) -> Result<FetchOutcome, CoreError> {
        validate_field("ts_key", ts_key)?;
        validate_field("json_key", json_key)?;
        validate_field("value", value)?;

        let ticket = {
            let mut state = self.state.lock().await;
            let path = state.active_path()?;
            let language = state.settings.default_language().to_string();
            if state.store.contains_key(ts_key) {
                return Err(CoreError::DuplicateKey { key: ts_key.to_string() });
            }
            if state.store.contains_value(json_key) {
                return Err(CoreError::DuplicateValue { value: json_key.to_string() });
            }
            if state.store.has_translation(&language, value) {
                return Err(CoreError::DuplicateTranslation { language, text: value.to_string() });
            }
            state.issue_ticket(path)
        };

        let fresh = self
            .gateway
            .add_key(&ticket.path, ts_key, json_key, value)
            .await
            .map_err(|source| CoreError::sync(SyncOperation::AddKey, source))?;
        info!(key = ts_key, path = %ticket.path, "key added");
        Ok(self.apply_fetch(&ticket, fresh).await)
    }

    /// Delete `keys` on the backend, then from the cache. Keys not in the
    /// cache are ignored. Returns the number of removed entries.
    pub async fn remove_keys(&self, keys: &[String]) -> Result<usize, CoreError> {
        let (path, ts_keys, json_keys) = {
            let state = self.state.lock().await;
            let path = state.active_path()?;
            let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
            let (ts_keys, json_keys): (Vec<String>, Vec<String>) = state
                .store
                .entries()
                .iter()
                .filter(|entry| wanted.contains(entry.key.as_str()))
                .map(|entry| (entry.key.clone(), entry.value.clone()))
                .unzip();
            (path, ts_keys, json_keys)
        };
        self.remove_pairs(path, ts_keys, json_keys).await
    }

    /// Delete every selected entry.
    pub async fn remove_selected(&self) -> Result<usize, CoreError> {
        let (path, ts_keys, json_keys) = {
            let mut state = self.state.lock().await;
            let path = state.active_path()?;
            let EditorState { view, store, .. } = &mut *state;
            let (ts_keys, json_keys) = view.selected_pairs(store);
            (path, ts_keys, json_keys)
        };
        self.remove_pairs(path, ts_keys, json_keys).await
    }

    async fn remove_pairs(
        &self,
        path: String,
        ts_keys: Vec<String>,
        json_keys: Vec<String>,
    ) -> Result<usize, CoreError> {
        if ts_keys.is_empty() {
            return Ok(0);
        }
        self.gateway
            .remove_keys(&path, &ts_keys, &json_keys)
            .await
            .map_err(|source| CoreError::sync(SyncOperation::RemoveKeys, source))?;

        let mut state = self.state.lock().await;
        if state.registry.active().map(|loc| loc.path.as_str()) != Some(path.as_str()) {
            debug!(path = %path, "location changed during remove, cache left alone");
            return Ok(0);
        }
        let keys: HashSet<String> = ts_keys.into_iter().collect();
        let removed = state.store.remove_by_keys(&keys);
        let EditorState { view, store, .. } = &mut *state;
        view.sync(store);
        info!(removed, path = %path, "keys removed");
        Ok(removed)
    }

    /// Send the languages of `edited` that differ from the cached entry, then
    /// re-fetch. An edit with no differences does not reach the backend.
    pub async fn update_key(
        &self,
        key: &str,
        edited: &BTreeMap<String, String>,
    ) -> Result<UpdateOutcome, CoreError> {
        let (path, payload) = {
            let state = self.state.lock().await;
            let path = state.active_path()?;
            let entry = state
                .store
                .get(key)
                .ok_or_else(|| CoreError::EntryNotFound { key: key.to_string() })?;
            let changed =
                changed_translations(&entry.translations, edited, state.store.languages());
            if changed.is_empty() {
                debug!(key, "update without changes skipped");
                return Ok(UpdateOutcome::Unchanged);
            }
            let payload = UpdatedKeyValues {
                ts_key: entry.key.clone(),
                json_key: entry.value.clone(),
                translation_values: changed,
            };
            (path, payload)
        };

        self.gateway
            .update_keys(&path, &payload)
            .await
            .map_err(|source| CoreError::sync(SyncOperation::UpdateKeys, source))?;
        let languages: Vec<String> = payload.translation_values.keys().cloned().collect();
        info!(key, languages = languages.len(), "key updated");

        let fetch = self.refresh().await?;
        Ok(UpdateOutcome::Updated { languages, fetch })
    }

    // ---- view --------------------------------------------------------------

    pub async fn page(&self) -> PageSnapshot {
        let mut state = self.state.lock().await;
        let location = state.registry.active_name().map(str::to_string);
        let EditorState { view, store, settings, .. } = &mut *state;
        let untranslated_count = store.untranslated_count(settings.default_language());
        let page_selected = view.is_page_selected(store);
        let selected = view.selection().iter().cloned().collect();
        let page = view.page(store);
        PageSnapshot {
            location,
            filter: view.filter().to_string(),
            entries: page.entries.into_iter().cloned().collect(),
            page_index: page.page_index,
            page_size: page.page_size,
            page_count: page.page_count,
            filtered_count: page.filtered_count,
            total_count: page.total_count,
            untranslated_count,
            selected,
            page_selected,
        }
    }

    /// Apply filter, viewport height and page in one step, clamping the page
    /// into range afterwards.
    pub async fn navigate(
        &self,
        filter: Option<&str>,
        height: Option<u32>,
        page: Option<usize>,
    ) -> PageSnapshot {
        {
            let mut state = self.state.lock().await;
            let EditorState { view, store, .. } = &mut *state;
            if let Some(filter) = filter {
                view.set_filter(filter);
            }
            if let Some(height) = height {
                view.resize(height);
            }
            if let Some(page) = page {
                view.set_page(page);
            }
            view.clamp_page(store);
        }
        self.page().await
    }

    pub async fn toggle_selection(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        let EditorState { view, store, .. } = &mut *state;
        view.toggle(store, key)
    }

    pub async fn select_page(&self) -> Vec<String> {
        let mut state = self.state.lock().await;
        let EditorState { view, store, .. } = &mut *state;
        view.select_all(store);
        view.selection().iter().cloned().collect()
    }

    pub async fn clear_selection(&self) {
        self.state.lock().await.view.clear_selection();
    }

    pub async fn selection(&self) -> Vec<String> {
        self.state.lock().await.view.selection().iter().cloned().collect()
    }

    // ---- languages & settings ----------------------------------------------

    pub async fn languages(&self) -> Vec<String> {
        self.state.lock().await.store.languages().to_vec()
    }

    /// Replace the language set. Codes are trimmed and repeats dropped,
    /// keeping first occurrence order.
    pub async fn set_languages(&self, languages: Vec<String>) -> Result<Vec<String>, CoreError> {
        let mut seen = HashSet::new();
        let mut cleaned = Vec::with_capacity(languages.len());
        for language in languages {
            let language = language.trim().to_string();
            validate_field("language", &language)?;
            if seen.insert(language.clone()) {
                cleaned.push(language);
            }
        }
        let record = {
            let mut state = self.state.lock().await;
            state.store.set_languages(cleaned);
            TranslationStoreState { languages: state.store.languages().to_vec() }
        };
        self.persist(StoreName::Translation, &record).await;
        Ok(record.languages)
    }

    pub async fn settings(&self) -> Settings {
        self.state.lock().await.settings.clone()
    }

    pub async fn update_settings(&self, mut settings: Settings) -> Result<Settings, CoreError> {
        let language = settings.translation.default_language.trim().to_string();
        validate_field("default_language", &language)?;
        settings.translation.default_language = language;
        self.state.lock().await.settings = settings.clone();
        self.persist(StoreName::Settings, &settings).await;
        info!(default_language = settings.default_language(), "settings updated");
        Ok(settings)
    }

    /// Best effort: a failed write is logged and memory is kept as is.
    async fn persist<T: Serialize + Sync>(&self, name: StoreName, record: &T) {
        if let Err(err) = save_record(&self.storage, name, record).await {
            warn!(store = %name, error = %err, "failed to persist store");
        }
    }
}

fn validate_field(field: &'static str, text: &str) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::EmptyField { field });
    }
    if text.chars().count() > MAX_FIELD_LEN {
        return Err(CoreError::FieldTooLong { field, max: MAX_FIELD_LEN });
    }
    Ok(())
}
