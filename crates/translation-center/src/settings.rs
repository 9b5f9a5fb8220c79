//! User settings persisted in the `settings_store` record.

use serde::{Deserialize, Serialize};
use specta::Type;

pub const DEFAULT_LANGUAGE: &str = "en-GB";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct NotificationTypes {
    #[serde(default)]
    pub file_changes: bool,
    #[serde(default)]
    pub finished_translation: bool,
    #[serde(default)]
    pub finished_scan: bool,
}

/// Translation behaviour. `default_language` is the source language of every
/// new key and the one ignored when counting untranslated entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct TranslationSettings {
    #[serde(default)]
    pub translate_new_strings: bool,
    #[serde(default)]
    pub translate_updated_strings: bool,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default)]
    pub translation_command: String,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            translate_new_strings: false,
            translate_updated_strings: false,
            default_language: default_language(),
            translation_command: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub nav_open: bool,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub enabled_notification_types: NotificationTypes,
    #[serde(default, rename = "translation_settings")]
    pub translation: TranslationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            nav_open: true,
            theme: Theme::default(),
            notifications_enabled: false,
            enabled_notification_types: NotificationTypes::default(),
            translation: TranslationSettings::default(),
        }
    }
}

impl Settings {
    pub fn default_language(&self) -> &str {
        &self.translation.default_language
    }
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_records_take_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"theme":"dark","translation_settings":{}}"#).unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert!(settings.nav_open);
        assert_eq!(settings.default_language(), "en-GB");
    }
}
