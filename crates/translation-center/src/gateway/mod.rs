//! Contract with the backend that scans locations and mutates translation files.

use std::{collections::BTreeMap, future::Future};

use serde::{Deserialize, Serialize};
use specta::Type;
use thiserror::Error;

use crate::{
    entries::TranslationEntry,
    locations::{LocationTag, ScanSummary},
};

pub mod http;
pub mod memory;

pub use http::HttpGateway;
pub use memory::MemoryGateway;

/// Payload of an update: only the languages whose text changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct UpdatedKeyValues {
    pub ts_key: String,
    pub json_key: String,
    pub translation_values: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend responded with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("backend rejected the request: {message}")]
    Rejected { message: String },

    #[error("invalid backend response: {message}")]
    InvalidResponse { message: String },
}

/// Backend operations. Every call either returns the authoritative result or
/// fails without side effects on the client.
pub trait SyncGateway: Send + Sync {
    fn list_translations(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Vec<TranslationEntry>, GatewayError>> + Send;

    fn add_key(
        &self,
        path: &str,
        ts_key: &str,
        json_key: &str,
        value: &str,
    ) -> impl Future<Output = Result<Vec<TranslationEntry>, GatewayError>> + Send;

    fn remove_keys(
        &self,
        path: &str,
        ts_keys: &[String],
        json_keys: &[String],
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn update_keys(
        &self,
        path: &str,
        key: &UpdatedKeyValues,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn add_location(
        &self,
        path: &str,
        name: &str,
    ) -> impl Future<Output = Result<ScanSummary, GatewayError>> + Send;

    fn rescan_location(
        &self,
        path: &str,
        tag: LocationTag,
    ) -> impl Future<Output = Result<ScanSummary, GatewayError>> + Send;
}
