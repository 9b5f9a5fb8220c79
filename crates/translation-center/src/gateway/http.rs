use std::time::Duration;

use reqwest::{Client as ReqwestClient, Response};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::debug;
use url::Url;

use super::{GatewayError, SyncGateway, UpdatedKeyValues};
use crate::{
    entries::TranslationEntry,
    error::CoreError,
    locations::{LocationTag, ScanSummary},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway talking JSON over HTTP to the scanner backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: ReqwestClient,
    base: Url,
    token: Option<String>,
}

impl HttpGateway {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, CoreError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        // Url::join drops the last segment unless the base ends with '/'.
        let base = Url::parse(&format!("{trimmed}/"))
            .map_err(|source| CoreError::BackendUrlInvalid { url: base_url.to_string(), source })?;
        let client = ReqwestClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| ReqwestClient::new());
        Ok(Self { client, base, token: token.filter(|t| !t.trim().is_empty()) })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let response = self.send(route, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| GatewayError::InvalidResponse { message: err.to_string() })
    }

    async fn post_ack<B: Serialize>(&self, route: &str, body: &B) -> Result<(), GatewayError> {
        self.send(route, body).await.map(|_| ())
    }

    async fn send<B: Serialize>(&self, route: &str, body: &B) -> Result<Response, GatewayError> {
        let url = self
            .base
            .join(route)
            .map_err(|err| GatewayError::InvalidResponse { message: err.to_string() })?;
        debug!(%url, "backend request");
        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(GatewayError::Status { status: status.as_u16(), message })
    }
}

#[derive(Serialize)]
struct RemoveKeysBody<'a> {
    path: &'a str,
    ts_key: &'a [String],
    json_key: &'a [String],
}

#[derive(Serialize)]
struct UpdateKeysBody<'a> {
    path: &'a str,
    key: &'a UpdatedKeyValues,
}

impl SyncGateway for HttpGateway {
    async fn list_translations(&self, path: &str) -> Result<Vec<TranslationEntry>, GatewayError> {
        self.post("translations/get", &json!({ "path": path })).await
    }

    async fn add_key(
        &self,
        path: &str,
        ts_key: &str,
        json_key: &str,
        value: &str,
    ) -> Result<Vec<TranslationEntry>, GatewayError> {
        let body = json!({ "path": path, "ts_key": ts_key, "json_key": json_key, "value": value });
        self.post("translations/add", &body).await
    }

    async fn remove_keys(
        &self,
        path: &str,
        ts_keys: &[String],
        json_keys: &[String],
    ) -> Result<(), GatewayError> {
        let body = RemoveKeysBody { path, ts_key: ts_keys, json_key: json_keys };
        self.post_ack("translations/remove", &body).await
    }

    async fn update_keys(&self, path: &str, key: &UpdatedKeyValues) -> Result<(), GatewayError> {
        self.post_ack("translations/update", &UpdateKeysBody { path, key }).await
    }

    async fn add_location(&self, path: &str, name: &str) -> Result<ScanSummary, GatewayError> {
        self.post("locations/add", &json!({ "path": path, "name": name })).await
    }

    async fn rescan_location(
        &self,
        path: &str,
        tag: LocationTag,
    ) -> Result<ScanSummary, GatewayError> {
        self.post("locations/rescan", &json!({ "path": path, "tag": tag })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_routes_below_base_path() {
        let gateway = HttpGateway::new("http://127.0.0.1:4000/api", None).unwrap();
        assert_eq!(gateway.base_url().as_str(), "http://127.0.0.1:4000/api/");
        let url = gateway.base_url().join("translations/get").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:4000/api/translations/get");
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = HttpGateway::new("not a url", None).unwrap_err();
        assert!(matches!(err, CoreError::BackendUrlInvalid { .. }));
    }
}
