use std::{collections::BTreeMap, convert::Infallible, net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, Method, Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
};
use serde::{Deserialize, Serialize};
use specta::Type;
use tokio::{net::TcpListener, task::JoinHandle};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
    CoreError,
    gateway::SyncGateway,
    locations::{Location, LocationTag, ScanSummary},
    session::{EditorContext, FetchOutcome, PageSnapshot, UpdateOutcome},
    settings::Settings,
    storage::StorageAdapter,
};

const CLIENT_HEADER: &str = "x-translation-client";
const TOKEN_HEADER: &str = "x-translation-token";

pub struct HttpState<G, S> {
    pub context: Arc<EditorContext<G, S>>,
    pub auth: HttpAuth,
}

impl<G, S> Clone for HttpState<G, S> {
    fn clone(&self) -> Self {
        Self { context: self.context.clone(), auth: self.auth.clone() }
    }
}

#[derive(Debug)]
pub struct HttpServerHandle {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl HttpServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize, Type)]
pub struct LocationListResponse {
    pub locations: Vec<Location>,
    pub active: Option<String>,
}

#[derive(Serialize, Type)]
pub struct ActivateResponse {
    pub location: String,
    pub fetch: FetchOutcome,
}

#[derive(Serialize, Type)]
pub struct FavouriteResponse {
    pub name: String,
    pub is_favourite: bool,
}

#[derive(Serialize, Type)]
pub struct RescanResponse {
    pub summary: ScanSummary,
    pub fetch: FetchOutcome,
}

#[derive(Serialize, Type)]
pub struct RemoveEntriesResponse {
    pub removed: usize,
}

#[derive(Serialize, Type)]
pub struct ToggleSelectionResponse {
    pub key: String,
    pub selected: bool,
}

#[derive(Serialize, Type)]
pub struct SelectionResponse {
    pub selected: Vec<String>,
}

#[derive(Serialize, Type)]
pub struct LanguagesResponse {
    pub languages: Vec<String>,
    pub default_language: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String, &'static str),
    BadRequest(String, &'static str),
    Conflict(String, &'static str),
    Unauthorized(String),
    BadGateway(String, &'static str),
    Internal(String, &'static str),
}

impl ApiError {
    fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = err.message_key();
        let message = match &err {
            CoreError::Sync { source, .. } => format!("{err}: {source}"),
            _ => err.to_string(),
        };
        match err {
            CoreError::LocationNotFound { .. } | CoreError::EntryNotFound { .. } => {
                ApiError::NotFound(message, code)
            }
            CoreError::DuplicateKey { .. }
            | CoreError::DuplicateValue { .. }
            | CoreError::DuplicateTranslation { .. }
            | CoreError::DuplicateLocationName { .. }
            | CoreError::DuplicateLocationPath { .. }
            | CoreError::NoActiveLocation => ApiError::Conflict(message, code),
            CoreError::EmptyField { .. }
            | CoreError::FieldTooLong { .. }
            | CoreError::UnknownStore { .. }
            | CoreError::BackendUrlInvalid { .. } => ApiError::BadRequest(message, code),
            CoreError::Sync { .. } => ApiError::BadGateway(message, code),
            _ => ApiError::Internal(message, code),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, code) = match self {
            ApiError::NotFound(message, code) => (StatusCode::NOT_FOUND, message, code),
            ApiError::BadRequest(message, code) => (StatusCode::BAD_REQUEST, message, code),
            ApiError::Conflict(message, code) => (StatusCode::CONFLICT, message, code),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message, "http.unauthorized"),
            ApiError::BadGateway(message, code) => (StatusCode::BAD_GATEWAY, message, code),
            ApiError::Internal(message, code) => (StatusCode::INTERNAL_SERVER_ERROR, message, code),
        };
        let body = Json(ErrorResponse { error, code });
        (status, body).into_response()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub enum ClientKind {
    #[default]
    Unknown,
    Web,
    Desktop,
}

impl ClientKind {
    fn from_headers(headers: &HeaderMap) -> Self {
        let value = headers.get(CLIENT_HEADER).and_then(|val| val.to_str().ok());
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(ref value) if value == "web" => ClientKind::Web,
            Some(ref value) if value == "desktop" => ClientKind::Desktop,
            _ => ClientKind::Unknown,
        }
    }
}

async fn attach_client_kind(mut req: Request<Body>, next: Next) -> Result<Response, Infallible> {
    let kind = ClientKind::from_headers(req.headers());
    req.extensions_mut().insert(kind);
    Ok(next.run(req).await)
}

#[derive(Clone, Default)]
pub struct HttpAuth {
    token: Option<String>,
}

impl HttpAuth {
    pub fn new(token: Option<String>) -> Self {
        Self { token: token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) }
    }

    fn verify(&self, kind: ClientKind, req: &Request<Body>) -> Result<(), ApiError> {
        let Some(expected) = self.token.as_deref() else {
            return Ok(());
        };

        let matches_authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|value| value.trim() == expected);

        let matches_custom = req
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim() == expected);

        if matches_authorization || matches_custom {
            return Ok(());
        }

        let client = match kind {
            ClientKind::Web => "Web",
            ClientKind::Desktop => "Desktop",
            ClientKind::Unknown => "Unknown",
        };

        Err(ApiError::unauthorized(format!("{client} client missing valid authentication token")))
    }
}

pub fn build_router<G, S>(state: HttpState<G, S>) -> Router
where
    G: SyncGateway + 'static,
    S: StorageAdapter + 'static,
{
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            HeaderName::from_static(CLIENT_HEADER),
            header::AUTHORIZATION,
            HeaderName::from_static(TOKEN_HEADER),
        ])
        .allow_origin(Any);

    let auth_state = state.auth.clone();

    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/locations", get(list_locations::<G, S>).post(add_location::<G, S>))
        .route("/api/locations/:name", delete(remove_location::<G, S>))
        .route("/api/locations/:name/activate", post(activate_location::<G, S>))
        .route("/api/locations/:name/favourite", post(toggle_favourite::<G, S>))
        .route("/api/locations/:name/rescan", post(rescan_location::<G, S>))
        .route(
            "/api/entries",
            get(list_entries::<G, S>).post(add_entry::<G, S>).delete(remove_entries::<G, S>),
        )
        .route("/api/entries/:key", patch(update_entry::<G, S>))
        .route("/api/selection", get(get_selection::<G, S>).delete(clear_selection::<G, S>))
        .route("/api/selection/page", post(select_page::<G, S>))
        .route("/api/selection/keys/:key", post(toggle_selection::<G, S>))
        .route("/api/languages", get(list_languages::<G, S>).put(set_languages::<G, S>))
        .route("/api/settings", get(get_settings::<G, S>).put(update_settings::<G, S>))
        .layer(middleware::from_fn_with_state(auth_state, authenticate))
        .layer(middleware::from_fn(attach_client_kind))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

async fn authenticate(
    State(auth): State<HttpAuth>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let kind = req.extensions().get::<ClientKind>().copied().unwrap_or_default();
    auth.verify(kind, &req)?;
    Ok(next.run(req).await)
}

pub async fn spawn_http_server<G, S>(
    state: HttpState<G, S>,
    addr: SocketAddr,
) -> Result<HttpServerHandle>
where
    G: SyncGateway + 'static,
    S: StorageAdapter + 'static,
{
    let router = build_router(state);
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("HTTP server listening on {}", local_addr);

    let task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            error!("HTTP server terminated with error: {err}");
        }
    });

    Ok(HttpServerHandle { addr: local_addr, task })
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn list_locations<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
) -> Json<LocationListResponse> {
    let locations = state.context.locations().await;
    let active = state.context.active_location().await.map(|loc| loc.name);
    Json(LocationListResponse { locations, active })
}

#[derive(Deserialize, Type)]
pub struct AddLocationRequest {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub tag: LocationTag,
}

async fn add_location<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
    Json(body): Json<AddLocationRequest>,
) -> Result<(StatusCode, Json<Location>), ApiError> {
    let location = state.context.add_location(&body.name, &body.path, body.tag).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

async fn remove_location<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
    Path(name): Path<String>,
) -> Result<Json<Location>, ApiError> {
    Ok(Json(state.context.remove_location(&name).await?))
}

async fn activate_location<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
    Path(name): Path<String>,
) -> Result<Json<ActivateResponse>, ApiError> {
    let fetch = state.context.activate_location(&name).await?;
    Ok(Json(ActivateResponse { location: name, fetch }))
}

async fn toggle_favourite<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
    Path(name): Path<String>,
) -> Result<Json<FavouriteResponse>, ApiError> {
    let is_favourite = state.context.toggle_favourite(&name).await?;
    Ok(Json(FavouriteResponse { name, is_favourite }))
}

async fn rescan_location<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
    Path(name): Path<String>,
) -> Result<Json<RescanResponse>, ApiError> {
    let active = state.context.active_location().await.map(|loc| loc.name);
    if active.as_deref() != Some(name.as_str()) {
        let known = state.context.locations().await.iter().any(|loc| loc.name == name);
        return Err(match (known, active) {
            (false, _) => CoreError::LocationNotFound { name }.into(),
            (true, None) => CoreError::NoActiveLocation.into(),
            (true, Some(_)) => ApiError::Conflict(
                format!("location '{name}' is not the active location"),
                "http.location_not_active",
            ),
        });
    }
    let (summary, fetch) = state.context.rescan().await?;
    Ok(Json(RescanResponse { summary, fetch }))
}

#[derive(Deserialize)]
struct EntriesQuery {
    filter: Option<String>,
    page: Option<usize>,
    height: Option<u32>,
}

async fn list_entries<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
    Query(query): Query<EntriesQuery>,
) -> Json<PageSnapshot> {
    let snapshot =
        state.context.navigate(query.filter.as_deref(), query.height, query.page).await;
    Json(snapshot)
}

#[derive(Deserialize, Type)]
pub struct AddEntryRequest {
    pub ts_key: String,
    pub json_key: String,
    pub value: String,
}

async fn add_entry<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
    Json(body): Json<AddEntryRequest>,
) -> Result<(StatusCode, Json<FetchOutcome>), ApiError> {
    let outcome = state.context.add_key(&body.ts_key, &body.json_key, &body.value).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Deserialize, Type)]
pub struct RemoveEntriesRequest {
    #[serde(default)]
    pub keys: Vec<String>,
    /// Remove the current selection instead of `keys`.
    #[serde(default)]
    pub selected: bool,
}

async fn remove_entries<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
    Json(body): Json<RemoveEntriesRequest>,
) -> Result<Json<RemoveEntriesResponse>, ApiError> {
    let removed = if body.selected {
        state.context.remove_selected().await?
    } else {
        state.context.remove_keys(&body.keys).await?
    };
    Ok(Json(RemoveEntriesResponse { removed }))
}

#[derive(Deserialize, Type)]
pub struct UpdateEntryRequest {
    pub translations: BTreeMap<String, String>,
}

async fn update_entry<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
    Path(key): Path<String>,
    Json(body): Json<UpdateEntryRequest>,
) -> Result<Json<UpdateOutcome>, ApiError> {
    Ok(Json(state.context.update_key(&key, &body.translations).await?))
}

async fn list_languages<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
) -> Json<LanguagesResponse> {
    let languages = state.context.languages().await;
    let default_language = state.context.settings().await.default_language().to_string();
    Json(LanguagesResponse { languages, default_language })
}

async fn get_selection<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
) -> Json<SelectionResponse> {
    Json(SelectionResponse { selected: state.context.selection().await })
}

async fn toggle_selection<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
    Path(key): Path<String>,
) -> Json<ToggleSelectionResponse> {
    let selected = state.context.toggle_selection(&key).await;
    Json(ToggleSelectionResponse { key, selected })
}

/// Select exactly the rows of the current page.
async fn select_page<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
) -> Json<SelectionResponse> {
    Json(SelectionResponse { selected: state.context.select_page().await })
}

async fn clear_selection<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
) -> StatusCode {
    state.context.clear_selection().await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize, Type)]
pub struct SetLanguagesRequest {
    pub languages: Vec<String>,
}

async fn set_languages<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
    Json(body): Json<SetLanguagesRequest>,
) -> Result<Json<LanguagesResponse>, ApiError> {
    let languages = state.context.set_languages(body.languages).await?;
    let default_language = state.context.settings().await.default_language().to_string();
    Ok(Json(LanguagesResponse { languages, default_language }))
}

async fn get_settings<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
) -> Json<Settings> {
    Json(state.context.settings().await)
}

async fn update_settings<G: SyncGateway, S: StorageAdapter>(
    State(state): State<HttpState<G, S>>,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.context.update_settings(settings).await?))
}
