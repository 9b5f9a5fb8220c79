//! Daemon configuration stored in `<root>/config/config.toml`.

mod app;

pub use app::{AppConfig, DEFAULT_BACKEND_URL, DEFAULT_HTTP_BIND, HTTP_TOKEN_ENV_KEY};
