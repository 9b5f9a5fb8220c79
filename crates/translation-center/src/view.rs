//! Filter → pagination → selection state for the editor table.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use specta::Type;

use crate::entries::{EntryStore, TranslationEntry};

/// Pixel metrics used to derive the page size from the viewport height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(default)]
pub struct ViewMetrics {
    pub row_height: u32,
    pub header_height: u32,
    pub margin: u32,
}

impl Default for ViewMetrics {
    fn default() -> Self {
        Self { row_height: 80, header_height: 0, margin: 0 }
    }
}

impl ViewMetrics {
    /// Rows that fit into `height`, never less than one.
    pub fn page_size_for_height(&self, height: u32) -> usize {
        let available = height.saturating_sub(self.header_height).saturating_sub(self.margin);
        let rows = available / self.row_height.max(1);
        (rows as usize).max(1)
    }
}

pub fn total_pages(filtered: usize, page_size: usize) -> usize {
    filtered.div_ceil(page_size.max(1))
}

/// Case-insensitive substring match on key, value and every translation.
/// `needle` must already be lowercase.
fn matches(entry: &TranslationEntry, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    entry.key.to_lowercase().contains(needle)
        || entry.value.to_lowercase().contains(needle)
        || entry.translations.values().any(|text| text.to_lowercase().contains(needle))
}

/// Indices into `entries` of the rows passing `filter`.
pub fn filter_indices(entries: &[TranslationEntry], filter: &str) -> Vec<usize> {
    let needle = filter.trim().to_lowercase();
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| matches(entry, &needle))
        .map(|(index, _)| index)
        .collect()
}

#[derive(Debug, Clone)]
struct FilterMemo {
    revision: u64,
    filter: String,
    indices: Vec<usize>,
}

/// One rendered page of the projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<'a> {
    pub entries: Vec<&'a TranslationEntry>,
    pub page_index: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub filtered_count: usize,
    pub total_count: usize,
}

/// Derived view state over an [`EntryStore`].
///
/// The filtered row set is memoised on `(store revision, filter)` and the
/// selection is pruned against it on every recomputation, so a selected key
/// never outlives its row in the filtered set.
#[derive(Debug, Clone)]
pub struct ViewProjection {
    metrics: ViewMetrics,
    filter: String,
    page_index: usize,
    page_size: usize,
    selection: BTreeSet<String>,
    memo: Option<FilterMemo>,
}

impl Default for ViewProjection {
    fn default() -> Self {
        Self::new(ViewMetrics::default())
    }
}

impl ViewProjection {
    /// Starts with the page size of a 720px viewport.
    pub fn new(metrics: ViewMetrics) -> Self {
        Self {
            page_size: metrics.page_size_for_height(720),
            metrics,
            filter: String::new(),
            page_index: 0,
            selection: BTreeSet::new(),
            memo: None,
        }
    }

    pub fn metrics(&self) -> ViewMetrics {
        self.metrics
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_filter(&mut self, filter: &str) {
        if self.filter != filter {
            self.filter.clear();
            self.filter.push_str(filter);
        }
    }

    /// Set the page index as requested. Not clamped; see [`Self::clamp_page`].
    pub fn set_page(&mut self, page_index: usize) {
        self.page_index = page_index;
    }

    /// Recompute the page size from the viewport height. Returns true if it
    /// changed. The page index is left alone.
    pub fn resize(&mut self, height: u32) -> bool {
        let page_size = self.metrics.page_size_for_height(height);
        if page_size == self.page_size {
            return false;
        }
        self.page_size = page_size;
        true
    }

    /// Bring the page index back into `0..page_count`.
    pub fn clamp_page(&mut self, store: &EntryStore) -> usize {
        let pages = self.page_count(store);
        self.page_index = if pages == 0 { 0 } else { self.page_index.min(pages - 1) };
        self.page_index
    }

    /// Refresh the memoised filter result and prune the selection.
    pub fn sync(&mut self, store: &EntryStore) {
        let fresh = match &self.memo {
            Some(memo) => memo.revision != store.revision() || memo.filter != self.filter,
            None => true,
        };
        if !fresh {
            return;
        }
        let indices = filter_indices(store.entries(), &self.filter);
        self.memo = Some(FilterMemo { revision: store.revision(), filter: self.filter.clone(), indices });
        self.prune_selection(store);
    }

    fn indices(&mut self, store: &EntryStore) -> &[usize] {
        self.sync(store);
        self.memo.as_ref().map(|memo| memo.indices.as_slice()).unwrap_or_default()
    }

    pub fn filtered_count(&mut self, store: &EntryStore) -> usize {
        self.indices(store).len()
    }

    pub fn page_count(&mut self, store: &EntryStore) -> usize {
        let page_size = self.page_size;
        total_pages(self.filtered_count(store), page_size)
    }

    pub fn filtered<'a>(&mut self, store: &'a EntryStore) -> Vec<&'a TranslationEntry> {
        let entries = store.entries();
        self.indices(store).iter().map(|&index| &entries[index]).collect()
    }

    /// The rows of the current page. An out-of-range page index yields an
    /// empty page.
    pub fn page<'a>(&mut self, store: &'a EntryStore) -> Page<'a> {
        let page_index = self.page_index;
        let page_size = self.page_size;
        let entries = store.entries();
        let indices = self.indices(store);
        let filtered_count = indices.len();
        let start = page_index.saturating_mul(page_size).min(filtered_count);
        let end = start.saturating_add(page_size).min(filtered_count);
        Page {
            entries: indices[start..end].iter().map(|&index| &entries[index]).collect(),
            page_index,
            page_size,
            page_count: total_pages(filtered_count, page_size),
            filtered_count,
            total_count: entries.len(),
        }
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.selection.contains(key)
    }

    pub fn some_selected(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Select `key` if it is currently in the filtered set.
    pub fn select(&mut self, store: &EntryStore, key: &str) -> bool {
        let entries = store.entries();
        let visible = self.indices(store).iter().any(|&index| entries[index].key == key);
        if visible {
            self.selection.insert(key.to_string());
        }
        visible
    }

    pub fn deselect(&mut self, key: &str) -> bool {
        self.selection.remove(key)
    }

    /// Flip selection of `key`; returns whether it is selected afterwards.
    pub fn toggle(&mut self, store: &EntryStore, key: &str) -> bool {
        if self.deselect(key) {
            return false;
        }
        self.select(store, key)
    }

    /// Select exactly the rows of the current page.
    pub fn select_all(&mut self, store: &EntryStore) {
        let keys: BTreeSet<String> =
            self.page(store).entries.iter().map(|entry| entry.key.clone()).collect();
        self.selection = keys;
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// True if every row on the current page is selected.
    pub fn is_page_selected(&mut self, store: &EntryStore) -> bool {
        let selection = self.selection.clone();
        let page = self.page(store);
        !page.entries.is_empty() && page.entries.iter().all(|entry| selection.contains(&entry.key))
    }

    /// `(key, value)` pairs of the selected rows, in store order.
    pub fn selected_pairs(&mut self, store: &EntryStore) -> (Vec<String>, Vec<String>) {
        self.sync(store);
        store
            .entries()
            .iter()
            .filter(|entry| self.selection.contains(&entry.key))
            .map(|entry| (entry.key.clone(), entry.value.clone()))
            .unzip()
    }

    fn prune_selection(&mut self, store: &EntryStore) {
        if self.selection.is_empty() {
            return;
        }
        let Some(memo) = &self.memo else {
            return;
        };
        let entries = store.entries();
        let visible: BTreeSet<&str> =
            memo.indices.iter().map(|&index| entries[index].key.as_str()).collect();
        self.selection.retain(|key| visible.contains(key.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(count: usize) -> EntryStore {
        let mut store = EntryStore::default();
        store.replace_all(
            (0..count)
                .map(|i| {
                    TranslationEntry::new(format!("key_{i:02}"), format!("json.{i:02}"))
                        .with_translation("en-GB", format!("Text {i}"))
                })
                .collect(),
        );
        store
    }

    #[test]
    fn page_size_from_viewport_height() {
        let metrics = ViewMetrics::default();
        assert_eq!(metrics.page_size_for_height(720), 9);
        assert_eq!(total_pages(20, 9), 3);
        assert_eq!(total_pages(0, 9), 0);

        let padded = ViewMetrics { row_height: 80, header_height: 60, margin: 20 };
        assert_eq!(padded.page_size_for_height(720), 8);
        assert_eq!(padded.page_size_for_height(10), 1);
    }

    #[test]
    fn twenty_rows_make_three_pages() {
        let store = store_with(20);
        let mut view = ViewProjection::default();
        assert_eq!(view.page_size(), 9);
        assert_eq!(view.page_count(&store), 3);

        view.set_page(2);
        let page = view.page(&store);
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.filtered_count, 20);
    }

    #[test]
    fn filter_is_case_insensitive_over_all_fields() {
        let mut store = EntryStore::default();
        store.replace_all(vec![
            TranslationEntry::new("greeting", "home.title").with_translation("de-DE", "Hallo Welt"),
            TranslationEntry::new("farewell", "home.bye").with_translation("en-GB", "Goodbye"),
        ]);
        let mut view = ViewProjection::default();

        view.set_filter("WELT");
        assert_eq!(view.filtered(&store)[0].key, "greeting");
        view.set_filter("HOME.BYE");
        assert_eq!(view.filtered(&store)[0].key, "farewell");
        view.set_filter("GREET");
        assert_eq!(view.filtered_count(&store), 1);
        view.set_filter("");
        assert_eq!(view.filtered_count(&store), 2);
    }

    #[test]
    fn resize_does_not_clamp_page_index() {
        let store = store_with(20);
        let mut view = ViewProjection::default();
        view.set_page(2);

        assert!(view.resize(1600));
        assert_eq!(view.page_size(), 20);
        assert_eq!(view.page_index(), 2);
        assert!(view.page(&store).entries.is_empty());

        assert_eq!(view.clamp_page(&store), 0);
        assert!(!view.resize(1600));
    }

    #[test]
    fn select_all_only_takes_current_page() {
        let store = store_with(20);
        let mut view = ViewProjection::default();
        view.set_page(1);
        view.select_all(&store);
        assert_eq!(view.selection().len(), 9);
        assert!(view.is_selected("key_09"));
        assert!(!view.is_selected("key_00"));
        assert!(view.is_page_selected(&store));
    }

    #[test]
    fn selection_is_pruned_when_filtered_set_shrinks() {
        let mut store = store_with(5);
        let mut view = ViewProjection::default();
        view.select_all(&store);
        assert_eq!(view.selection().len(), 5);

        view.set_filter("key_0");
        view.set_filter("text 1");
        view.sync(&store);
        assert_eq!(view.selection().iter().collect::<Vec<_>>(), ["key_01"]);

        view.set_filter("");
        view.select_all(&store);
        store.remove_by_keys(&["key_02".to_string(), "key_03".to_string()].into_iter().collect());
        view.sync(&store);
        let filtered: BTreeSet<String> =
            view.filtered(&store).iter().map(|entry| entry.key.clone()).collect();
        assert!(view.selection().is_subset(&filtered));
        assert_eq!(view.selection().len(), 3);
    }

    #[test]
    fn selecting_hidden_rows_is_refused() {
        let store = store_with(3);
        let mut view = ViewProjection::default();
        view.set_filter("key_01");
        assert!(!view.select(&store, "key_02"));
        assert!(view.toggle(&store, "key_01"));
        assert!(!view.toggle(&store, "key_01"));
        assert!(!view.some_selected());
    }

    #[test]
    fn selected_pairs_follow_store_order() {
        let store = store_with(4);
        let mut view = ViewProjection::default();
        view.select(&store, "key_03");
        view.select(&store, "key_01");
        let (keys, values) = view.selected_pairs(&store);
        assert_eq!(keys, ["key_01", "key_03"]);
        assert_eq!(values, ["json.01", "json.03"]);
    }

    #[test]
    fn memo_recomputes_only_on_change() {
        let mut store = store_with(3);
        let mut view = ViewProjection::default();
        view.sync(&store);
        let revision = view.memo.as_ref().unwrap().revision;
        view.sync(&store);
        assert_eq!(view.memo.as_ref().unwrap().revision, revision);

        store.replace_all(Vec::new());
        assert_eq!(view.filtered_count(&store), 0);
        assert_ne!(view.memo.as_ref().unwrap().revision, revision);
    }
}
