use std::{
    io,
    path::{Path, PathBuf},
};

use serde_json::Error as JsonError;
use thiserror::Error;
use toml_edit::{de::Error as TomlDeError, ser::Error as TomlSerError};

use crate::gateway::GatewayError;

/// Operation names used when reporting a failed gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    ListTranslations,
    AddKey,
    RemoveKeys,
    UpdateKeys,
    AddLocation,
    RescanLocation,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::ListTranslations => "list_translations",
            SyncOperation::AddKey => "add_key",
            SyncOperation::RemoveKeys => "remove_keys",
            SyncOperation::UpdateKeys => "update_keys",
            SyncOperation::AddLocation => "add_location",
            SyncOperation::RescanLocation => "rescan_location",
        }
    }
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("a key named '{key}' already exists")]
    DuplicateKey { key: String },

    #[error("a json key named '{value}' already exists")]
    DuplicateValue { value: String },

    #[error("a translation '{text}' already exists for language {language}")]
    DuplicateTranslation { language: String, text: String },

    #[error("a location named '{name}' already exists")]
    DuplicateLocationName { name: String },

    #[error("a location for path '{path}' already exists")]
    DuplicateLocationPath { path: String },

    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("{field} exceeds {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("no location is active")]
    NoActiveLocation,

    #[error("location '{name}' not found")]
    LocationNotFound { name: String },

    #[error("translation key '{key}' not found")]
    EntryNotFound { key: String },

    #[error("{operation} failed")]
    Sync {
        operation: SyncOperation,
        #[source]
        source: GatewayError,
    },

    #[error("unknown store '{name}'")]
    UnknownStore { name: String },

    #[error("failed to create directory {path}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read store file {path}")]
    ReadStore {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write store file {path}")]
    WriteStore {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove store file {path}")]
    RemoveStore {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse store '{name}'")]
    ParseStore {
        name: String,
        #[source]
        source: JsonError,
    },

    #[error("failed to serialise store '{name}'")]
    SerialiseStore {
        name: String,
        #[source]
        source: JsonError,
    },

    #[error("failed to read config file {path}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write config file {path}")]
    WriteConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: TomlDeError,
    },

    #[error("failed to serialise config to TOML")]
    SerialiseConfig {
        #[source]
        source: TomlSerError,
    },

    #[error("invalid backend url '{url}'")]
    BackendUrlInvalid {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unable to determine user home directory for TRANSLATION_CENTER_ROOT")]
    HomeDirectoryUnknown,
}

impl CoreError {
    pub(crate) fn sync(operation: SyncOperation, source: GatewayError) -> Self {
        CoreError::Sync { operation, source }
    }

    /// Errors rejected locally before any gateway call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::DuplicateKey { .. }
                | CoreError::DuplicateValue { .. }
                | CoreError::DuplicateTranslation { .. }
                | CoreError::DuplicateLocationName { .. }
                | CoreError::DuplicateLocationPath { .. }
                | CoreError::EmptyField { .. }
                | CoreError::FieldTooLong { .. }
        )
    }

    /// Failures the user may retry by repeating the action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Sync { .. })
    }

    pub fn message_key(&self) -> &'static str {
        match self {
            CoreError::DuplicateKey { .. } => "validation.duplicate_key",
            CoreError::DuplicateValue { .. } => "validation.duplicate_value",
            CoreError::DuplicateTranslation { .. } => "validation.duplicate_translation",
            CoreError::DuplicateLocationName { .. } => "validation.duplicate_location_name",
            CoreError::DuplicateLocationPath { .. } => "validation.duplicate_location_path",
            CoreError::EmptyField { .. } => "validation.empty_field",
            CoreError::FieldTooLong { .. } => "validation.field_too_long",
            CoreError::NoActiveLocation => "core.no_active_location",
            CoreError::LocationNotFound { .. } => "core.location_not_found",
            CoreError::EntryNotFound { .. } => "core.entry_not_found",
            CoreError::Sync { .. } => "sync.failed",
            CoreError::UnknownStore { .. } => "storage.unknown_store",
            CoreError::CreateDirectory { .. } => "storage.create_dir_failed",
            CoreError::ReadStore { .. } => "storage.read_failed",
            CoreError::WriteStore { .. } => "storage.write_failed",
            CoreError::RemoveStore { .. } => "storage.remove_failed",
            CoreError::ParseStore { .. } => "storage.parse_failed",
            CoreError::SerialiseStore { .. } => "storage.serialise_failed",
            CoreError::ReadConfig { .. } => "config.read_failed",
            CoreError::WriteConfig { .. } => "config.write_failed",
            CoreError::ParseConfig { .. } => "config.parse_failed",
            CoreError::SerialiseConfig { .. } => "config.serialise_failed",
            CoreError::BackendUrlInvalid { .. } => "config.backend_url_invalid",
            CoreError::HomeDirectoryUnknown => "core.home_dir_unknown",
        }
    }

    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        match self {
            CoreError::DuplicateKey { key } | CoreError::EntryNotFound { key } => {
                vec![("key", key.clone())]
            }
            CoreError::DuplicateValue { value } => vec![("value", value.clone())],
            CoreError::DuplicateTranslation { language, text } => {
                vec![("language", language.clone()), ("text", text.clone())]
            }
            CoreError::DuplicateLocationName { name } | CoreError::LocationNotFound { name } => {
                vec![("name", name.clone())]
            }
            CoreError::DuplicateLocationPath { path } => vec![("path", path.clone())],
            CoreError::EmptyField { field } => vec![("field", field.to_string())],
            CoreError::FieldTooLong { field, max } => {
                vec![("field", field.to_string()), ("max", max.to_string())]
            }
            CoreError::Sync { operation, source } => {
                vec![("operation", operation.to_string()), ("error", source.to_string())]
            }
            CoreError::UnknownStore { name } => vec![("name", name.clone())],
            CoreError::CreateDirectory { path, source }
            | CoreError::ReadStore { path, source }
            | CoreError::WriteStore { path, source }
            | CoreError::RemoveStore { path, source }
            | CoreError::ReadConfig { path, source }
            | CoreError::WriteConfig { path, source } => {
                vec![("path", display_path(path)), ("error", source.to_string())]
            }
            CoreError::ParseStore { name, source } | CoreError::SerialiseStore { name, source } => {
                vec![("name", name.clone()), ("error", source.to_string())]
            }
            CoreError::ParseConfig { path, source } => {
                vec![("path", display_path(path)), ("error", source.to_string())]
            }
            CoreError::SerialiseConfig { source } => vec![("error", source.to_string())],
            CoreError::BackendUrlInvalid { url, source } => {
                vec![("url", url.clone()), ("error", source.to_string())]
            }
            CoreError::NoActiveLocation | CoreError::HomeDirectoryUnknown => Vec::new(),
        }
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
