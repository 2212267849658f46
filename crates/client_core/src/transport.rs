//! reqwest-backed [`InventoryService`] talking to the remote inventory API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::InventoryItem,
    error::describe_error_body,
    protocol::{
        CreateItemRequest, Recipe, RecipeSuggestions, SimulateRequest, SimulateResponse,
        UpdateQuantityRequest, UpdateQuantityResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    error::{StoreError, StoreResult},
    InventoryService,
};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const INVENTORY_PATH: &str = "inventory";

#[derive(Debug, Clone)]
pub struct HttpInventoryService {
    http: Client,
    base_url: Url,
}

impl HttpInventoryService {
    pub fn new(base_url: &str) -> StoreResult<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> StoreResult<Self> {
        let base_url = parse_base_url(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Transport(format!("failed to build http client: {err}")))?;
        Ok(Self { http, base_url })
    }

    /// Appends `segments` to the base path. Each segment is percent-encoded on
    /// its own, so an item name containing `/` stays a single segment.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(service_error(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> StoreResult<T> {
        let response = self.send(request).await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| StoreError::Service {
            status: status.as_u16(),
            message: format!("malformed response body: {err}"),
        })
    }
}

fn parse_base_url(raw: &str) -> StoreResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|err| StoreError::Validation(format!("invalid api url '{raw}': {err}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(StoreError::Validation(format!(
            "api url '{raw}' must be an absolute http(s) url"
        )));
    }
    Ok(url)
}

pub(crate) fn service_error(status: StatusCode, body: &str) -> StoreError {
    let message = describe_error_body(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    StoreError::Service {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl InventoryService for HttpInventoryService {
    async fn list(&self) -> StoreResult<Vec<InventoryItem>> {
        let url = self.endpoint(&[INVENTORY_PATH]);
        debug!(%url, "GET inventory");
        self.send_json(self.http.get(url)).await
    }

    async fn create(&self, request: CreateItemRequest) -> StoreResult<InventoryItem> {
        let url = self.endpoint(&[INVENTORY_PATH]);
        debug!(%url, item = %request.item_name, "POST inventory");
        self.send_json(self.http.post(url).json(&request)).await
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        let url = self.endpoint(&[INVENTORY_PATH, name]);
        debug!(%url, "DELETE inventory item");
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    async fn update_quantity(&self, name: &str, quantity: i64) -> StoreResult<Option<i64>> {
        let url = self.endpoint(&[INVENTORY_PATH, name]);
        debug!(%url, quantity, "PUT inventory item");
        let response = self
            .send(self.http.put(url).json(&UpdateQuantityRequest { quantity }))
            .await?;
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        // The status already confirmed the update; an unexpected body only
        // means the requested quantity is the confirmed one.
        match serde_json::from_slice::<UpdateQuantityResponse>(&bytes) {
            Ok(body) => Ok(body.quantity),
            Err(err) => {
                debug!(%err, "ignoring unparseable quantity update body");
                Ok(None)
            }
        }
    }

    async fn suggest_recipes(&self) -> StoreResult<Vec<String>> {
        let url = self.endpoint(&["recipes"]);
        let body: RecipeSuggestions = self.send_json(self.http.get(url)).await?;
        Ok(body.suggested_recipes)
    }

    async fn recipe(&self) -> StoreResult<Recipe> {
        let url = self.endpoint(&["recipe"]);
        self.send_json(self.http.get(url)).await
    }

    async fn simulate(&self, image_folder: &str) -> StoreResult<Vec<String>> {
        let url = self.endpoint(&["simulate"]);
        debug!(%url, image_folder, "POST simulate");
        let body: SimulateResponse = self
            .send_json(self.http.post(url).json(&SimulateRequest {
                image_folder: image_folder.to_string(),
            }))
            .await?;
        Ok(body.detected_items)
    }
}
