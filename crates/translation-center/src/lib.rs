//! Translation entry cache, reconciliation and editor view state for
//! translation projects, plus the daemon that serves them over HTTP.

pub mod config;
pub mod entries;
pub mod error;
pub mod gateway;
pub mod locations;
pub mod paths;
pub mod reconcile;
pub mod session;
pub mod settings;
pub mod storage;
pub mod view;

pub use config::AppConfig;
pub use entries::{EntryStore, TranslationEntry};
pub use error::CoreError;
pub use gateway::{GatewayError, HttpGateway, MemoryGateway, SyncGateway};
pub use locations::{Location, LocationRegistry, LocationTag};
pub use paths::{Layout, default_root};
pub use session::{EditorContext, FetchOutcome, FetchTicket};
pub use storage::{FileStorage, MemoryStorage, StorageAdapter, StoreName};

// Daemon 模块
pub mod daemon {
    // Serve command (daemon entry point)
    pub mod serve;
}

// Web / HTTP 模块
pub mod web {
    pub mod http;
}
