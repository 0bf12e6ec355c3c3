//! REST client for the spot data source and the remote bookmark store.
//!
//! This module provides:
//! - Connection pooling shared by every call
//! - URL joining that tolerates stray slashes and absolute endpoints
//! - Uniform response handling: empty body = JSON `null`, unparseable body =
//!   [`RemoteError::Malformed`], non-2xx = [`RemoteError::Rejected`] carrying the
//!   server's `message`/`error` field
//! - A [`BookmarkApi`] implementation usable by [`crate::BookmarkStore`]

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{ActorId, BookmarkApi, BookmarkKind, BookmarkResponse, Deal, RemoteError, Spot};

const DEFAULT_BASE_URL: &str = "http://localhost:3001/api";
const API_URL_ENV: &str = "SPOT_API_URL";

const SPOTS_ENDPOINT: &str = "/spots";
const DEALS_ENDPOINT: &str = "/local-deals";
const BOOKMARK_STATUS_ENDPOINT: &str = "/bookmarks/status";
const BOOKMARK_TOGGLE_ENDPOINT: &str = "/bookmarks/toggle";

/// Connection settings for [`SpotApiClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// API root including the `/api` prefix.
    /// Default: http://localhost:3001/api
    pub base_url: String,

    /// Per-request timeout in seconds.
    /// Default: 30
    pub timeout_secs: u64,

    /// Idle pooled connections kept per host.
    /// Default: 16
    pub max_idle_connections: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            max_idle_connections: 16,
        }
    }
}

impl ApiConfig {
    /// Configuration for a backend origin; `/api` is appended.
    pub fn with_origin(origin: &str) -> Self {
        Self {
            base_url: format!("{}/api", origin.trim().trim_end_matches('/')),
            ..Self::default()
        }
    }

    /// Read the backend origin from `SPOT_API_URL`, falling back to the local dev server.
    pub fn from_env() -> Self {
        match std::env::var(API_URL_ENV) {
            Ok(origin) if !origin.trim().is_empty() => Self::with_origin(&origin),
            _ => Self::default(),
        }
    }
}

/// Join an endpoint onto a base URL without doubling slashes.
///
/// Absolute `http(s)://` endpoints are returned unchanged.
pub fn join_url(base: &str, endpoint: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return endpoint.to_string();
    }
    let base = base.trim_end_matches('/');
    if endpoint.starts_with('/') {
        format!("{}{}", base, endpoint)
    } else {
        format!("{}/{}", base, endpoint)
    }
}

/// Read an explicit JSON `null` as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Keep any JSON value as text: strings verbatim, other values as compact JSON.
pub(crate) fn opaque_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

/// Collections come either bare or wrapped in `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { data: items } => items,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleRequest<'a> {
    user_id: &'a str,
    target_id: &'a str,
    target_type: BookmarkKind,
}

/// Message of a failed response: `message`, then `error`, then the status text.
fn error_message(status: StatusCode, body: &Value) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string())
}

/// Decode a response body the way every endpoint shares.
fn decode_body<T: DeserializeOwned>(
    status: StatusCode,
    text: &str,
    url: &str,
) -> Result<T, RemoteError> {
    let data: Value = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(text).map_err(|e| {
            warn!("[SpotApi] {} returned unparseable body ({}): {}", url, status, e);
            RemoteError::Malformed(format!("HTTP {} from {}: {}", status.as_u16(), url, e))
        })?
    };

    if !status.is_success() {
        let msg = error_message(status, &data);
        warn!("[SpotApi] {} failed: {} - {}", url, status.as_u16(), msg);
        return Err(RemoteError::Rejected(format!("HTTP {}: {}", status.as_u16(), msg)));
    }

    serde_json::from_value(data)
        .map_err(|e| RemoteError::Malformed(format!("unexpected shape from {}: {}", url, e)))
}

/// Client for the spot backend.
#[derive(Debug, Clone)]
pub struct SpotApiClient {
    client: Client,
    base_url: String,
}

impl SpotApiClient {
    /// Create a client with pooled connections.
    pub fn new(config: &ApiConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.max_idle_connections)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        join_url(&self.base_url, endpoint)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, RemoteError> {
        let start = Instant::now();
        let response = request
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| RemoteError::Transport(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            RemoteError::Transport(format!("Body download from {} failed: {}", url, e))
        })?;

        debug!(
            "[SpotApi] {} -> {} ({} bytes) in {:?}",
            url,
            status.as_u16(),
            text.len(),
            start.elapsed()
        );

        decode_body(status, &text, url)
    }

    /// Fetch the full spot collection.
    pub async fn fetch_spots(&self) -> Result<Vec<Spot>, RemoteError> {
        let url = self.url(SPOTS_ENDPOINT);
        let listing: Listing<Spot> = self.send(self.client.get(&url), &url).await?;
        let spots = listing.into_vec();
        info!("[SpotApi] Fetched {} spots", spots.len());
        Ok(spots)
    }

    /// Fetch the deal collection, keeping only active deals.
    pub async fn fetch_active_deals(&self) -> Result<Vec<Deal>, RemoteError> {
        let url = self.url(DEALS_ENDPOINT);
        let listing: Listing<Deal> = self.send(self.client.get(&url), &url).await?;
        let deals: Vec<Deal> = listing.into_vec().into_iter().filter(|d| d.is_active).collect();
        info!("[SpotApi] Fetched {} active deals", deals.len());
        Ok(deals)
    }
}

#[async_trait]
impl BookmarkApi for SpotApiClient {
    async fn resolve_bookmark(
        &self,
        actor: &ActorId,
        target_id: &str,
        kind: BookmarkKind,
    ) -> Result<BookmarkResponse, RemoteError> {
        let url = self.url(BOOKMARK_STATUS_ENDPOINT);
        let request = self
            .client
            .get(&url)
            .header("x-user-id", actor.as_str())
            .query(&[
                ("userId", actor.as_str()),
                ("targetId", target_id),
                ("targetType", kind.as_str()),
            ]);
        self.send(request, &url).await
    }

    async fn toggle_bookmark(
        &self,
        actor: &ActorId,
        target_id: &str,
        kind: BookmarkKind,
    ) -> Result<BookmarkResponse, RemoteError> {
        let url = self.url(BOOKMARK_TOGGLE_ENDPOINT);
        let body = ToggleRequest {
            user_id: actor.as_str(),
            target_id,
            target_type: kind,
        };
        let request = self
            .client
            .post(&url)
            .header("x-user-id", actor.as_str())
            .json(&body);
        self.send(request, &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Category;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h/api/", "/spots"), "http://h/api/spots");
        assert_eq!(join_url("http://h/api", "spots"), "http://h/api/spots");
        assert_eq!(join_url("http://h/api//", "bookmarks/toggle"), "http://h/api/bookmarks/toggle");
        assert_eq!(join_url("http://h/api", "HTTPS://other/x"), "HTTPS://other/x");
    }

    #[test]
    fn test_config_with_origin() {
        assert_eq!(
            ApiConfig::with_origin("https://spots.example.com/").base_url,
            "https://spots.example.com/api"
        );
        assert_eq!(ApiConfig::default().base_url, "http://localhost:3001/api");
    }

    #[test]
    fn test_decode_bookmark_response() {
        let ok: BookmarkResponse =
            decode_body(StatusCode::OK, r#"{"success":true,"isBookmarked":true}"#, "u").unwrap();
        assert_eq!(ok, BookmarkResponse::bookmarked(true));

        let body = r#"{"success":false,"error":"no such spot"}"#;
        let failed: BookmarkResponse = decode_body(StatusCode::OK, body, "u").unwrap();
        assert_eq!(failed.into_result(), Err(RemoteError::Rejected("no such spot".to_string())));
    }

    #[test]
    fn test_decode_unparseable_body_is_malformed() {
        let result: Result<BookmarkResponse, _> = decode_body(StatusCode::OK, "<html>", "u");
        assert!(matches!(result, Err(RemoteError::Malformed(_))));
    }

    #[test]
    fn test_decode_wrong_shape_is_malformed() {
        let result: Result<BookmarkResponse, _> = decode_body(StatusCode::OK, "", "u");
        assert!(matches!(result, Err(RemoteError::Malformed(_))));
    }

    #[test]
    fn test_decode_error_status_uses_server_message() {
        let body = r#"{"success":false,"message":"Route not found"}"#;
        let result: Result<BookmarkResponse, _> = decode_body(StatusCode::NOT_FOUND, body, "u");
        assert_eq!(result, Err(RemoteError::Rejected("HTTP 404: Route not found".to_string())));

        let result: Result<BookmarkResponse, _> =
            decode_body(StatusCode::INTERNAL_SERVER_ERROR, "", "u");
        assert_eq!(
            result,
            Err(RemoteError::Rejected("HTTP 500: Internal Server Error".to_string()))
        );
    }

    #[test]
    fn test_decode_spot_listing_shapes() {
        let bare = r#"[{"id":"s1","latitude":37.5,"longitude":127.0,"category":"cafe"}]"#;
        let spots: Listing<Spot> = decode_body(StatusCode::OK, bare, "u").unwrap();
        let spots = spots.into_vec();
        assert_eq!(spots.len(), 1);
        assert_eq!(spots[0].category, Category::Cafe);
        assert_eq!(spots[0].rating, None);
        assert!(spots[0].images.is_empty());

        let wrapped = r#"{"data":[{"id":"s2","name":"Hanok stay","latitude":37.5,"longitude":127.0,
            "category":"lodging","rating":4.5,"review_count":12,"images":["a.jpg"]}]}"#;
        let spots: Listing<Spot> = decode_body(StatusCode::OK, wrapped, "u").unwrap();
        let spots = spots.into_vec();
        assert_eq!(spots[0].category, Category::Other);
        assert_eq!(spots[0].review_count, Some(12));
    }

    #[test]
    fn test_decode_spot_tolerates_null_images_and_structured_hours() {
        let body = r#"[
            {"id":"s1","latitude":37.5,"longitude":127.0,"category":"cafe","images":null,
             "operating_hours":{"mon":"09:00-18:00"}},
            {"id":"s2","name":null,"latitude":37.5,"longitude":127.0,"category":"culture",
             "operating_hours":"10:00-22:00"},
            {"id":"s3","latitude":37.5,"longitude":127.0,"category":"experience",
             "operating_hours":null}
        ]"#;
        let spots: Listing<Spot> = decode_body(StatusCode::OK, body, "u").unwrap();
        let spots = spots.into_vec();

        assert_eq!(spots.len(), 3);
        assert!(spots[0].images.is_empty());
        assert_eq!(spots[0].operating_hours.as_deref(), Some(r#"{"mon":"09:00-18:00"}"#));
        assert_eq!(spots[1].name, "");
        assert_eq!(spots[1].operating_hours.as_deref(), Some("10:00-22:00"));
        assert_eq!(spots[2].operating_hours, None);
    }

    #[test]
    fn test_toggle_request_wire_format() {
        let body = ToggleRequest {
            user_id: "actor-1",
            target_id: "s1",
            target_type: BookmarkKind::MapPlace,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"userId": "actor-1", "targetId": "s1", "targetType": "map-place"})
        );
    }
}
