//! HTTP adapter for the content delivery API
//!
//! Implements both [`ChangeFeedSource`] and [`ContentResolver`]:
//!
//! - `GET {base}/{project}/change-feed` with the `X-Continuation` header
//!   (absent on bootstrap); the successor cursor comes back in the same header
//! - `GET {base}/{project}/items/{codename}?language=..&depth=..`; the
//!   response's `modular_content` pool is walked to build the subtree

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::DeliveryConfig;
use crate::domain::{ChangeRecord, ContentItem, Cursor, ResolvedSubtree};
use crate::error::PortError;
use crate::ports::{ChangeFeedSource, ContentResolver, FeedBatch, FeedRequest, PortResult};

pub const CONTINUATION_HEADER: &str = "x-continuation";

/// Body of the single-item endpoint
#[derive(Debug, Deserialize)]
struct ItemResponse {
    item: ContentItem,
    #[serde(default)]
    modular_content: HashMap<String, ContentItem>,
}

pub struct DeliveryClient {
    client: Client,
    base_url: String,
    project_id: String,
    api_key: Option<String>,
    depth: u32,
}

impl DeliveryClient {
    pub fn new(config: &DeliveryConfig) -> PortResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                PortError::new(format!("Failed to build HTTP client: {}", e)).with_source(e)
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
            depth: config.depth,
        })
    }

    fn change_feed_url(&self) -> String {
        format!("{}/{}/change-feed", self.base_url, self.project_id)
    }

    fn item_url(&self, codename: &str) -> String {
        format!("{}/{}/items/{}", self.base_url, self.project_id, codename)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

fn request_error(url: &str) -> impl Fn(reqwest::Error) -> PortError + '_ {
    move |e| PortError::new(format!("Request to {} failed: {}", url, e)).with_source(e)
}

#[async_trait]
impl ChangeFeedSource for DeliveryClient {
    async fn fetch(&self, request: &FeedRequest) -> PortResult<FeedBatch> {
        let url = self.change_feed_url();
        let mut builder = self.authorized(self.client.get(&url));
        if let FeedRequest::Continue(cursor) = request {
            builder = builder.header(CONTINUATION_HEADER, cursor.as_str());
        }

        let response = builder.send().await.map_err(request_error(&url))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PortError::new(format!("Change feed returned {}", status)));
        }

        let next_cursor = response
            .headers()
            .get(CONTINUATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(Cursor::new)
            .ok_or_else(|| PortError::new("Change feed response has no continuation header"))?;

        let records = match request {
            // the bootstrap read only establishes a position
            FeedRequest::Bootstrap => Vec::new(),
            FeedRequest::Continue(_) => {
                let body = response.text().await.map_err(request_error(&url))?;
                if body.trim().is_empty() {
                    Vec::new()
                } else {
                    serde_json::from_str::<Vec<ChangeRecord>>(&body)?
                }
            }
        };

        debug!("Change feed returned {} records", records.len());
        Ok(FeedBatch {
            records,
            next_cursor,
        })
    }
}

#[async_trait]
impl ContentResolver for DeliveryClient {
    async fn resolve(&self, codename: &str, language: &str) -> PortResult<Option<ResolvedSubtree>> {
        let url = self.item_url(codename);
        let depth = self.depth.to_string();
        let response = self
            .authorized(self.client.get(&url))
            .query(&[("language", language), ("depth", depth.as_str())])
            .send()
            .await
            .map_err(request_error(&url))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(PortError::new(format!(
                    "Item {}/{} returned {}",
                    codename, language, status
                )));
            }
            _ => {}
        }

        let body = response.text().await.map_err(request_error(&url))?;
        let parsed: ItemResponse = serde_json::from_str(&body)?;
        Ok(Some(ResolvedSubtree::from_linked(
            parsed.item,
            &parsed.modular_content,
        )))
    }
}
