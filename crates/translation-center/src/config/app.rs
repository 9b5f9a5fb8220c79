use std::{
    fs,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{error::CoreError, paths::Layout, view::ViewMetrics};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:4000/api";
pub const DEFAULT_HTTP_BIND: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8797));

/// Environment variable that overrides `http_token`.
pub const HTTP_TOKEN_ENV_KEY: &str = "TRANSLATION_CENTER_HTTP_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the scanner backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Bearer token sent to the scanner backend.
    #[serde(default)]
    pub backend_token: Option<String>,
    /// Bind address for the HTTP API, `DEFAULT_HTTP_BIND` when unset.
    #[serde(default)]
    pub http_bind: Option<SocketAddr>,
    /// Bearer token required by the HTTP API.
    #[serde(default)]
    pub http_token: Option<String>,
    #[serde(default)]
    pub view: ViewMetrics,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            backend_token: None,
            http_bind: None,
            http_token: None,
            view: ViewMetrics::default(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|source| CoreError::ReadConfig { path: path.to_path_buf(), source })?;
        let mut config: AppConfig = toml_edit::de::from_str(&content)
            .map_err(|source| CoreError::ParseConfig { path: path.to_path_buf(), source })?;

        config.backend_url = config.backend_url.trim().to_string();
        config.backend_token = non_empty(config.backend_token.take());
        config.http_token = non_empty(config.http_token.take());
        config.validate()?;
        Ok(config)
    }

    /// Load the layout's config file, falling back to defaults when missing.
    pub fn load(layout: &Layout) -> Result<Self, CoreError> {
        let path = layout.config_path();
        if !path.exists() {
            debug!(path = %path.display(), "config file missing, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// Persist to TOML format.
    pub fn to_toml_string(&self) -> Result<String, CoreError> {
        toml_edit::ser::to_string_pretty(self).map_err(|source| CoreError::SerialiseConfig { source })
    }

    /// Write the config file, creating the config directory if needed.
    pub fn write(&self, layout: &Layout) -> Result<PathBuf, CoreError> {
        let dir = layout.config_dir();
        fs::create_dir_all(dir)
            .map_err(|source| CoreError::CreateDirectory { path: dir.to_path_buf(), source })?;
        let path = layout.config_path();
        fs::write(&path, self.to_toml_string()?)
            .map_err(|source| CoreError::WriteConfig { path: path.clone(), source })?;
        Ok(path)
    }

    pub fn http_bind_or_default(&self) -> SocketAddr {
        self.http_bind.unwrap_or(DEFAULT_HTTP_BIND)
    }

    /// Token from the environment when set, else the configured one.
    pub fn effective_http_token(&self) -> Option<String> {
        std::env::var(HTTP_TOKEN_ENV_KEY)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| self.http_token.clone())
    }

    fn validate(&self) -> Result<(), CoreError> {
        Url::parse(&self.backend_url).map_err(|source| CoreError::BackendUrlInvalid {
            url: self.backend_url.clone(),
            source,
        })?;
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf());
        let config = AppConfig::load(&layout).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.view.row_height, 80);
    }

    #[test]
    fn reads_partial_file() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf());
        layout.ensure().unwrap();
        fs::write(
            layout.config_path(),
            "backend_url = \"http://scanner.local:9000\"\nhttp_token = \"  \"\n\n[view]\nrow_height = 40\nheader_height = 60\n",
        )
        .unwrap();

        let config = AppConfig::load(&layout).unwrap();
        assert_eq!(config.backend_url, "http://scanner.local:9000");
        assert_eq!(config.http_token, None);
        assert_eq!(config.view, ViewMetrics { row_height: 40, header_height: 60, margin: 0 });
    }

    #[test]
    fn written_file_loads_back() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf());
        let config = AppConfig {
            http_bind: Some("127.0.0.1:8797".parse().unwrap()),
            ..AppConfig::default()
        };
        let path = config.write(&layout).unwrap();
        assert_eq!(AppConfig::from_file(path).unwrap(), config);
    }

    #[test]
    fn rejects_invalid_backend_url() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf());
        layout.ensure().unwrap();
        fs::write(layout.config_path(), "backend_url = \"scanner\"\n").unwrap();
        let err = AppConfig::load(&layout).unwrap_err();
        assert!(matches!(err, CoreError::BackendUrlInvalid { .. }));
    }
}
