//! Merge of a freshly fetched, authoritative entry set into the cached one.
//!
//! The backend owns the translation files, so the fresh set always decides
//! which keys exist, their order, and their translations. The cached version
//! of an entry is kept only when its translations are structurally equal to
//! the fresh ones, so anything keyed on the cached value stays stable.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use specta::Type;

use crate::entries::TranslationEntry;

/// One language whose text differs between the cached and fresh entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Type)]
pub struct LanguageChange {
    pub language: String,
    pub cached: Option<String>,
    pub fresh: Option<String>,
}

/// A key whose translations changed outside this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Type)]
pub struct Divergence {
    pub key: String,
    pub changes: Vec<LanguageChange>,
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation {
    /// New store content, in the order of the fresh set.
    pub merged: Vec<TranslationEntry>,
    /// Keys present in both sets with different translations.
    pub divergences: Vec<Divergence>,
    /// Keys only present in the fresh set.
    pub added: Vec<String>,
    /// Keys only present in the cached set, dropped from `merged`.
    pub removed: Vec<String>,
}

impl Reconciliation {
    /// True when the merge left the cached content unchanged.
    pub fn is_unchanged(&self) -> bool {
        self.divergences.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

/// Merge `fresh` into `cached`. Pure and deterministic.
pub fn reconcile(cached: &[TranslationEntry], fresh: &[TranslationEntry]) -> Reconciliation {
    let cached_by_key: HashMap<&str, &TranslationEntry> =
        cached.iter().map(|entry| (entry.key.as_str(), entry)).collect();

    let mut merged = Vec::with_capacity(fresh.len());
    let mut divergences = Vec::new();
    let mut added = Vec::new();

    for incoming in fresh {
        match cached_by_key.get(incoming.key.as_str()) {
            None => {
                added.push(incoming.key.clone());
                merged.push(incoming.clone());
            }
            Some(existing) if existing.translations == incoming.translations => {
                merged.push((*existing).clone());
            }
            Some(existing) => {
                divergences.push(Divergence {
                    key: incoming.key.clone(),
                    changes: diff_translations(&existing.translations, &incoming.translations),
                });
                merged.push(incoming.clone());
            }
        }
    }

    let fresh_keys: BTreeSet<&str> = fresh.iter().map(|entry| entry.key.as_str()).collect();
    let removed = cached
        .iter()
        .filter(|entry| !fresh_keys.contains(entry.key.as_str()))
        .map(|entry| entry.key.clone())
        .collect();

    Reconciliation { merged, divergences, added, removed }
}

fn diff_translations(
    cached: &BTreeMap<String, String>,
    fresh: &BTreeMap<String, String>,
) -> Vec<LanguageChange> {
    let languages: BTreeSet<&String> = cached.keys().chain(fresh.keys()).collect();
    languages
        .into_iter()
        .filter_map(|language| {
            let before = cached.get(language);
            let after = fresh.get(language);
            (before != after).then(|| LanguageChange {
                language: language.clone(),
                cached: before.cloned(),
                fresh: after.cloned(),
            })
        })
        .collect()
}

/// Languages whose text in `edited` differs from `original`, restricted to
/// `languages` when that list is non-empty. Used to build minimal update
/// payloads.
pub fn changed_translations(
    original: &BTreeMap<String, String>,
    edited: &BTreeMap<String, String>,
    languages: &[String],
) -> BTreeMap<String, String> {
    edited
        .iter()
        .filter(|(language, _)| languages.is_empty() || languages.contains(*language))
        .filter(|(language, text)| original.get(*language) != Some(*text))
        .map(|(language, text)| (language.clone(), text.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &str, text: &str) -> TranslationEntry {
        TranslationEntry::new(key, value).with_translation("en-GB", text)
    }

    #[test]
    fn fresh_translation_wins_and_divergence_is_reported() {
        let cached = vec![entry("A", "a", "Hello")];
        let fresh = vec![entry("A", "a", "Hi")];

        let result = reconcile(&cached, &fresh);
        assert_eq!(result.merged, fresh);
        assert_eq!(
            result.divergences,
            vec![Divergence {
                key: "A".into(),
                changes: vec![LanguageChange {
                    language: "en-GB".into(),
                    cached: Some("Hello".into()),
                    fresh: Some("Hi".into()),
                }],
            }]
        );
    }

    #[test]
    fn keys_missing_from_fresh_are_dropped_silently() {
        let a = entry("A", "a", "Hello");
        let b = entry("B", "b", "Bye");
        let result = reconcile(&[a.clone(), b], &[a.clone()]);
        assert_eq!(result.merged, vec![a]);
        assert!(result.divergences.is_empty());
        assert_eq!(result.removed, vec!["B".to_string()]);
    }

    #[test]
    fn keeps_cached_entry_when_translations_match() {
        let mut cached = entry("A", "a", "Hello");
        cached.in_use = Some(true);
        let fresh = entry("A", "a", "Hello");

        let result = reconcile(&[cached.clone()], &[fresh]);
        assert_eq!(result.merged, vec![cached]);
        assert!(result.is_unchanged());
    }

    #[test]
    fn follows_fresh_order_and_reports_new_keys() {
        let cached = vec![entry("A", "a", "1"), entry("B", "b", "2")];
        let fresh = vec![entry("C", "c", "3"), entry("B", "b", "2"), entry("A", "a", "1")];
        let result = reconcile(&cached, &fresh);
        let keys: Vec<_> = result.merged.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["C", "B", "A"]);
        assert_eq!(result.added, vec!["C".to_string()]);
    }

    #[test]
    fn deterministic_and_idempotent() {
        let cached = vec![
            entry("A", "a", "Hello").with_translation("de-DE", "Hallo"),
            entry("B", "b", "Bye"),
            entry("D", "d", "Gone"),
        ];
        let fresh = vec![
            entry("B", "b", "Goodbye"),
            entry("A", "a", "Hello"),
            entry("C", "c", "New"),
        ];

        let first = reconcile(&cached, &fresh);
        let second = reconcile(&cached, &fresh);
        assert_eq!(first, second);

        let again = reconcile(&first.merged, &fresh);
        assert_eq!(again.merged, first.merged);
        assert!(again.is_unchanged());

        assert!(first.merged.iter().all(|e| e.key != "D"));
        let divergent: Vec<_> = first.divergences.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(divergent, ["B", "A"]);
    }

    #[test]
    fn reports_added_and_missing_languages() {
        let cached = vec![entry("A", "a", "Hello").with_translation("fr-FR", "Bonjour")];
        let fresh = vec![entry("A", "a", "Hello").with_translation("de-DE", "Hallo")];
        let result = reconcile(&cached, &fresh);
        let changes = &result.divergences[0].changes;
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].language, "de-DE");
        assert_eq!(changes[0].cached, None);
        assert_eq!(changes[1].language, "fr-FR");
        assert_eq!(changes[1].fresh, None);
    }

    #[test]
    fn changed_translations_only_keeps_modified_known_languages() {
        let original: BTreeMap<String, String> =
            [("en-GB".to_string(), "Hello".to_string()), ("de-DE".to_string(), "Hallo".to_string())]
                .into_iter()
                .collect();
        let mut edited = original.clone();
        edited.insert("de-DE".into(), "Servus".into());
        edited.insert("xx-XX".into(), "??".into());
        edited.insert("fr-FR".into(), "Bonjour".into());

        let languages = vec!["en-GB".to_string(), "de-DE".to_string(), "fr-FR".to_string()];
        let diff = changed_translations(&original, &edited, &languages);
        let expected: BTreeMap<String, String> = [
            ("de-DE".to_string(), "Servus".to_string()),
            ("fr-FR".to_string(), "Bonjour".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(diff, expected);

        assert!(changed_translations(&original, &original, &languages).is_empty());
    }
}
