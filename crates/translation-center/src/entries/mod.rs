//! Cached translation entries for the active location.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use specta::Type;

/// Language codes used when no language list has been persisted yet.
pub const DEFAULT_LANGUAGES: [&str; 34] = [
    "de-DE", "de-AT", "de-CH", "de-LU", "nl-NL", "nl-BE", "en-GB", "en-US", "es-ES", "fr-FR",
    "fr-BE", "fr-CH", "it-IT", "it-CH", "pl-PL", "pt-PT", "hu-HU", "hr-HR", "sr-La", "sl-SI",
    "el-GR", "bg-BG", "ro-RO", "tr-TR", "da-DK", "fi-FI", "nb-NO", "sv-SE", "sk-SK", "cs-CZ",
    "uk-UA", "et-EE", "lt-LT", "lv-LV",
];

pub fn default_languages() -> Vec<String> {
    DEFAULT_LANGUAGES.iter().map(|code| code.to_string()).collect()
}

/// A single translatable string of a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct TranslationEntry {
    /// Identifier used in source code (the `ts_key`).
    #[serde(default)]
    pub key: String,
    /// Identifier used inside the translation files (the `json_key`).
    #[serde(default)]
    pub value: String,
    /// Language code to translated text. Missing languages are untranslated.
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
    /// Whether the key is referenced in source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_use: Option<bool>,
}

impl TranslationEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into(), translations: BTreeMap::new(), in_use: None }
    }

    pub fn with_translation(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        self.translations.insert(language.into(), text.into());
        self
    }

    pub fn translation(&self, language: &str) -> Option<&str> {
        self.translations.get(language).map(String::as_str)
    }

    /// An entry counts as untranslated when every language other than the
    /// default one is missing or blank.
    pub fn is_untranslated(&self, default_language: &str) -> bool {
        self.translations
            .iter()
            .all(|(language, text)| language == default_language || text.trim().is_empty())
    }
}

/// First uniqueness violation found in an entry set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Type)]
#[serde(rename_all = "snake_case")]
pub enum Duplicate {
    Key(String),
    Value(String),
}

/// Return the first duplicated `key` or `value`, if any.
pub fn check_unique(entries: &[TranslationEntry]) -> Option<Duplicate> {
    let mut keys = HashSet::with_capacity(entries.len());
    let mut values = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !keys.insert(entry.key.as_str()) {
            return Some(Duplicate::Key(entry.key.clone()));
        }
        if !values.insert(entry.value.as_str()) {
            return Some(Duplicate::Value(entry.value.clone()));
        }
    }
    None
}

/// Ordered entry collection plus the language set of the active location.
#[derive(Debug, Clone)]
pub struct EntryStore {
    entries: Vec<TranslationEntry>,
    languages: Vec<String>,
    revision: u64,
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new(default_languages())
    }
}

impl EntryStore {
    pub fn new(languages: Vec<String>) -> Self {
        Self { entries: Vec::new(), languages, revision: 0 }
    }

    pub fn entries(&self) -> &[TranslationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bumped on every mutation of the entry collection.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, key: &str) -> Option<&TranslationEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry.key == key)
    }

    pub fn contains_value(&self, value: &str) -> bool {
        self.entries.iter().any(|entry| entry.value == value)
    }

    pub fn has_translation(&self, language: &str, text: &str) -> bool {
        self.entries.iter().any(|entry| entry.translation(language) == Some(text))
    }

    pub fn untranslated_count(&self, default_language: &str) -> usize {
        self.entries.iter().filter(|entry| entry.is_untranslated(default_language)).count()
    }

    /// Discard the current collection and install `entries`.
    pub fn replace_all(&mut self, entries: Vec<TranslationEntry>) {
        self.entries = entries;
        self.revision += 1;
    }

    /// Remove every entry whose key is in `keys`. Unknown keys are ignored.
    /// Returns the number of removed entries.
    pub fn remove_by_keys(&mut self, keys: &HashSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !keys.contains(&entry.key));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.revision += 1;
        }
        removed
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn set_languages(&mut self, languages: Vec<String>) {
        self.languages = languages;
    }

    /// Append languages that appear in the cached entries but are unknown,
    /// in first-seen order. Returns true if the set grew.
    pub fn extend_languages_from_entries(&mut self) -> bool {
        let mut known: HashSet<String> = self.languages.iter().cloned().collect();
        let mut grew = false;
        for entry in &self.entries {
            for language in entry.translations.keys() {
                if known.insert(language.clone()) {
                    self.languages.push(language.clone());
                    grew = true;
                }
            }
        }
        grew
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &str, text: &str) -> TranslationEntry {
        TranslationEntry::new(key, value).with_translation("en-GB", text)
    }

    #[test]
    fn remove_by_keys_ignores_missing_keys() {
        let mut store = EntryStore::default();
        store.replace_all(vec![entry("A", "a", "Hello"), entry("B", "b", "Bye")]);
        let revision = store.revision();

        let keys: HashSet<String> = ["A".to_string(), "C".to_string()].into_iter().collect();
        assert_eq!(store.remove_by_keys(&keys), 1);
        assert!(!store.contains_key("A"));
        assert!(store.contains_key("B"));
        assert!(store.revision() > revision);

        let revision = store.revision();
        assert_eq!(store.remove_by_keys(&keys), 0);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn remove_does_not_touch_languages() {
        let mut store = EntryStore::new(vec!["en-GB".into(), "de-DE".into()]);
        store.replace_all(vec![entry("A", "a", "Hello")]);
        store.remove_by_keys(&["A".to_string()].into_iter().collect());
        assert_eq!(store.languages(), ["en-GB".to_string(), "de-DE".to_string()]);
    }

    #[test]
    fn detects_duplicate_keys_and_values() {
        assert_eq!(check_unique(&[entry("A", "a", "x"), entry("B", "b", "y")]), None);
        assert_eq!(
            check_unique(&[entry("A", "a", "x"), entry("A", "b", "y")]),
            Some(Duplicate::Key("A".into()))
        );
        assert_eq!(
            check_unique(&[entry("A", "a", "x"), entry("B", "a", "y")]),
            Some(Duplicate::Value("a".into()))
        );
    }

    #[test]
    fn untranslated_ignores_default_language() {
        let only_default = entry("A", "a", "Hello");
        assert!(only_default.is_untranslated("en-GB"));

        let blank = entry("B", "b", "Hi").with_translation("de-DE", "  ");
        assert!(blank.is_untranslated("en-GB"));

        let translated = entry("C", "c", "Hi").with_translation("de-DE", "Hallo");
        assert!(!translated.is_untranslated("en-GB"));

        let mut store = EntryStore::default();
        store.replace_all(vec![only_default, blank, translated]);
        assert_eq!(store.untranslated_count("en-GB"), 2);
    }

    #[test]
    fn extends_languages_in_first_seen_order() {
        let mut store = EntryStore::new(vec!["en-GB".into()]);
        store.replace_all(vec![
            entry("A", "a", "x").with_translation("xx-XX", "1"),
            entry("B", "b", "y").with_translation("aa-AA", "2").with_translation("xx-XX", "3"),
        ]);
        assert!(store.extend_languages_from_entries());
        assert_eq!(store.languages(), ["en-GB", "xx-XX", "aa-AA"]);
        assert!(!store.extend_languages_from_entries());
    }
}
