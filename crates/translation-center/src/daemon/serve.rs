//! translation-center daemon: editor context behind the HTTP API.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Args;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{
    AppConfig, EditorContext, FileStorage, HttpGateway, Layout, LocationTag, MemoryGateway,
    MemoryStorage, TranslationEntry, default_root,
    gateway::SyncGateway,
    paths::user_home_dir,
    storage::StorageAdapter,
    web::http::{self, HttpState},
};

const DEMO_LOCATION: &str = "demo";
const DEMO_PATH: &str = "/demo/web";

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Bind address for the HTTP API (e.g. 127.0.0.1:8797).
    #[arg(long, value_name = "ADDR")]
    pub http_bind: Option<SocketAddr>,
    /// Authentication token required for HTTP API (fallback env TRANSLATION_CENTER_HTTP_TOKEN).
    #[arg(long, value_name = "TOKEN")]
    pub http_auth_token: Option<String>,
    /// Base URL of the scanner backend, overriding the config file.
    #[arg(long, value_name = "URL")]
    pub backend_url: Option<String>,
    /// Serve an in-memory backend with sample entries; nothing is persisted.
    #[arg(long)]
    pub demo: bool,
}

pub async fn run(root: Option<PathBuf>, args: ServeArgs) -> Result<()> {
    let layout = resolve_layout(root)?;
    layout.ensure()?;
    let _tracing_guard = init_tracing(&layout)?;

    if let Err(err) = run_impl(layout, args).await {
        error!(error = ?err, "daemon terminated with error");
        return Err(err);
    }
    info!("daemon exited cleanly");
    Ok(())
}

async fn run_impl(layout: Layout, args: ServeArgs) -> Result<()> {
    let config = AppConfig::load(&layout)?;
    let ServeArgs { http_bind, http_auth_token, backend_url, demo } = args;
    let http_bind = http_bind.unwrap_or_else(|| config.http_bind_or_default());
    let auth = http::HttpAuth::new(http_auth_token.or_else(|| config.effective_http_token()));

    if demo {
        let context = EditorContext::new(demo_gateway(), MemoryStorage::new(), config.view);
        context.add_location(DEMO_LOCATION, DEMO_PATH, LocationTag::Frontend).await?;
        context.activate_location(DEMO_LOCATION).await?;
        info!(location = DEMO_LOCATION, "demo backend ready");
        return serve_context(layout, context, auth, http_bind).await;
    }

    let backend_url = backend_url.unwrap_or_else(|| config.backend_url.clone());
    let gateway = HttpGateway::new(&backend_url, config.backend_token.clone())?;
    let context = EditorContext::new(gateway, FileStorage::new(&layout), config.view);
    context.restore().await?;
    if context.active_location().await.is_some() {
        if let Err(err) = context.refresh().await {
            warn!(error = %err, backend = %backend_url, "initial fetch failed");
        }
    }
    serve_context(layout, context, auth, http_bind).await
}

async fn serve_context<G, S>(
    layout: Layout,
    context: EditorContext<G, S>,
    auth: http::HttpAuth,
    http_bind: SocketAddr,
) -> Result<()>
where
    G: SyncGateway + 'static,
    S: StorageAdapter + 'static,
{
    let state = HttpState { context: Arc::new(context), auth };
    let http_handle = http::spawn_http_server(state, http_bind).await?;

    let pid_path = layout.daemon_pid_path();
    if let Err(err) = std::fs::write(&pid_path, std::process::id().to_string()) {
        warn!(error = %err, path = %pid_path.display(), "failed to write pid file");
    }

    info!(http_addr = %http_handle.addr(), "daemon ready");

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    match (&mut ctrl_c).await {
        Ok(()) => {
            info!("received Ctrl+C, shutting down daemon");
        }
        Err(err) => {
            warn!(error = ?err, "failed to listen for Ctrl+C");
        }
    }

    http_handle.shutdown();
    if pid_path.exists() {
        let _ = std::fs::remove_file(&pid_path);
    }

    info!("daemon stopped cleanly");
    Ok(())
}

fn demo_gateway() -> MemoryGateway {
    let sample = |key: &str, value: &str, en: &str, de: &str| {
        let entry = TranslationEntry::new(key, value).with_translation("en-GB", en);
        if de.is_empty() { entry } else { entry.with_translation("de-DE", de) }
    };
    MemoryGateway::default().with_location(
        DEMO_PATH,
        vec![
            sample("common.save", "save", "Save", "Speichern"),
            sample("common.cancel", "cancel", "Cancel", "Abbrechen"),
            sample("common.delete", "delete", "Delete", ""),
            sample("nav.home", "home", "Home", "Startseite"),
            sample("nav.settings", "settings", "Settings", ""),
            sample("editor.empty", "empty_state", "No translations yet", ""),
        ],
    )
}

pub fn resolve_layout(root_override: Option<PathBuf>) -> Result<Layout> {
    let root = match root_override {
        Some(path) => expand_tilde(path)?,
        None => default_root()?,
    };
    debug!(root = %root.display(), "resolved workspace root");
    Ok(Layout::new(root))
}

fn expand_tilde(path: PathBuf) -> Result<PathBuf> {
    if let Some(str_path) = path.to_str() {
        if let Some(stripped) = str_path.strip_prefix('~') {
            let home = user_home_dir().context("cannot expand '~', HOME unset")?;
            if stripped.is_empty() {
                return Ok(home);
            }
            let stripped = stripped.strip_prefix('/').unwrap_or(stripped);
            return Ok(home.join(stripped));
        }
    }
    Ok(path)
}

fn init_tracing(layout: &Layout) -> Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to build log filter")?;

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let daemon_log_dir = layout.logs_dir().join("daemon");
    std::fs::create_dir_all(&daemon_log_dir).with_context(|| {
        format!("failed to create daemon log directory {}", daemon_log_dir.display())
    })?;
    let file_appender = rolling::hourly(daemon_log_dir, "daemon.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
